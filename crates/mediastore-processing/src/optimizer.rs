//! Binary image optimizers.
//!
//! Optimizers operate on filesystem paths, not streams, for compatibility
//! with the external optimization tools. The processor feeds them an encoded
//! temp file and streams the optimized output file to the backend.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

#[async_trait]
pub trait Optimizer: Send + Sync {
    /// Read the image at `input` and write an optimized copy to `output`.
    async fn optimize(&self, input: &Path, output: &Path) -> anyhow::Result<()>;
}

/// Pass-through optimizer: copies the input unchanged.
///
/// Default for hosts without the optimization binaries installed.
pub struct NoopOptimizer;

#[async_trait]
impl Optimizer for NoopOptimizer {
    async fn optimize(&self, input: &Path, output: &Path) -> anyhow::Result<()> {
        tokio::fs::copy(input, output).await?;
        Ok(())
    }
}

/// Optimizer shelling out to the usual per-format binaries.
pub struct CommandOptimizer {
    jpeg_tool: String,
    png_tool: String,
    gif_tool: String,
}

impl Default for CommandOptimizer {
    fn default() -> Self {
        CommandOptimizer {
            jpeg_tool: "jpegoptim".to_string(),
            png_tool: "optipng".to_string(),
            gif_tool: "gifsicle".to_string(),
        }
    }
}

impl CommandOptimizer {
    pub fn new() -> Self {
        CommandOptimizer::default()
    }

    /// Override individual tool binaries; `None` keeps the default.
    pub fn from_tools(
        jpeg_tool: Option<String>,
        png_tool: Option<String>,
        gif_tool: Option<String>,
    ) -> Self {
        let defaults = CommandOptimizer::default();
        CommandOptimizer {
            jpeg_tool: jpeg_tool.unwrap_or(defaults.jpeg_tool),
            png_tool: png_tool.unwrap_or(defaults.png_tool),
            gif_tool: gif_tool.unwrap_or(defaults.gif_tool),
        }
    }

    async fn run(tool: &str, args: &[&str]) -> anyhow::Result<()> {
        let output = Command::new(tool)
            .args(args)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to execute {}: {}", tool, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow::anyhow!("{} failed: {}", tool, stderr));
        }

        Ok(())
    }
}

#[async_trait]
impl Optimizer for CommandOptimizer {
    async fn optimize(&self, input: &Path, output: &Path) -> anyhow::Result<()> {
        // The tools rewrite files in place, so work on a copy at the output
        // path.
        tokio::fs::copy(input, output).await?;

        let target = output.to_string_lossy();
        let extension = input
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "jpg" | "jpeg" => Self::run(&self.jpeg_tool, &["--strip-all", "--quiet", &target]).await,
            "png" => Self::run(&self.png_tool, &["-quiet", "-o2", &target]).await,
            "gif" => Self::run(&self.gif_tool, &["--batch", "-O3", &target]).await,
            other => {
                tracing::debug!(extension = %other, "no optimizer for extension, passing through");
                Ok(())
            }
        }
    }
}
