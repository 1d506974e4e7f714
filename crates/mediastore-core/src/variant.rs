//! Variant descriptors and the fluent pipeline builder.
//!
//! An [`ImageVariant`] accumulates named operations for one derived output
//! (a thumbnail, a cropped avatar, ...). Operations form an ordered mapping
//! keyed by operation name: declaring the same operation twice overwrites the
//! earlier arguments rather than appending a second step. A finished
//! [`ImageVariantCollection`] serializes into the variants mapping carried by
//! a [`crate::FileRecord`], at which point the pipelines are frozen data.

use crate::error::VariantError;
use crate::map::OrderedMap;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Anchor used by crop and cover operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Position {
    #[default]
    Center,
    TopCenter,
    BottomCenter,
    LeftTop,
    RightTop,
    LeftCenter,
    RightCenter,
    LeftBottom,
    RightBottom,
}

impl Position {
    pub fn as_str(self) -> &'static str {
        match self {
            Position::Center => "center",
            Position::TopCenter => "top-center",
            Position::BottomCenter => "bottom-center",
            Position::LeftTop => "left-top",
            Position::RightTop => "right-top",
            Position::LeftCenter => "left-center",
            Position::RightCenter => "right-center",
            Position::LeftBottom => "left-bottom",
            Position::RightBottom => "right-bottom",
        }
    }
}

impl FromStr for Position {
    type Err = VariantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "center" => Ok(Position::Center),
            "top-center" => Ok(Position::TopCenter),
            "bottom-center" => Ok(Position::BottomCenter),
            "left-top" => Ok(Position::LeftTop),
            "right-top" => Ok(Position::RightTop),
            "left-center" => Ok(Position::LeftCenter),
            "right-center" => Ok(Position::RightCenter),
            "left-bottom" => Ok(Position::LeftBottom),
            "right-bottom" => Ok(Position::RightBottom),
            other => Err(VariantError::InvalidPosition(other.to_string())),
        }
    }
}

/// Mirror axis for flip operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlipDirection {
    Horizontal,
    Vertical,
}

impl FlipDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            FlipDirection::Horizontal => "h",
            FlipDirection::Vertical => "v",
        }
    }
}

impl FromStr for FlipDirection {
    type Err = VariantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "h" => Ok(FlipDirection::Horizontal),
            "v" => Ok(FlipDirection::Vertical),
            other => Err(VariantError::InvalidDirection(other.to_string())),
        }
    }
}

/// Escape-hatch hook applied to the loaded image handle.
///
/// Registered on the pipeline at build time; carried transiently on the
/// descriptor and never serialized.
#[derive(Clone)]
pub struct ImageCallback(Arc<dyn Fn(&mut DynamicImage, &JsonValue) -> anyhow::Result<()> + Send + Sync>);

impl ImageCallback {
    pub fn new<F>(hook: F) -> Self
    where
        F: Fn(&mut DynamicImage, &JsonValue) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        ImageCallback(Arc::new(hook))
    }

    pub fn invoke(&self, image: &mut DynamicImage, args: &JsonValue) -> anyhow::Result<()> {
        (self.0)(image, args)
    }
}

impl fmt::Debug for ImageCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ImageCallback")
    }
}

/// One variant's persisted state: its declared operations plus the path/URL
/// populated after a successful processing run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VariantData {
    #[serde(default)]
    pub operations: OrderedMap<JsonValue>,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub optimize: bool,
    #[serde(skip)]
    pub callback: Option<ImageCallback>,
}

impl PartialEq for VariantData {
    fn eq(&self, other: &Self) -> bool {
        // The callback hook is transient and has no meaningful equality.
        self.operations == other.operations
            && self.path == other.path
            && self.url == other.url
            && self.optimize == other.optimize
    }
}

/// Fluent builder for one variant's operation pipeline.
#[derive(Debug, Clone)]
pub struct ImageVariant {
    name: String,
    data: VariantData,
}

impl ImageVariant {
    pub fn create(name: impl Into<String>) -> Self {
        ImageVariant {
            name: name.into(),
            data: VariantData::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &VariantData {
        &self.data
    }

    /// Run the optimizer pass on this variant's encoded output.
    pub fn optimize(&mut self) -> &mut Self {
        self.data.optimize = true;
        self
    }

    /// Cut a `width` x `height` window out of the image, anchored at the
    /// center.
    pub fn crop(&mut self, width: u32, height: u32) -> &mut Self {
        self.data.operations.insert(
            "crop",
            json!({ "width": width, "height": height }),
        );
        self
    }

    /// Cut a `width` x `height` window with an explicit offset from the
    /// anchor.
    pub fn crop_at(&mut self, width: u32, height: u32, x: u32, y: u32) -> &mut Self {
        self.data.operations.insert(
            "crop",
            json!({ "width": width, "height": height, "x": x, "y": y }),
        );
        self
    }

    pub fn sharpen(&mut self, amount: u32) -> &mut Self {
        self.data
            .operations
            .insert("sharpen", json!({ "amount": amount }));
        self
    }

    pub fn rotate(&mut self, angle: i64) -> &mut Self {
        self.data
            .operations
            .insert("rotate", json!({ "angle": angle }));
        self
    }

    /// Resize to the given height, preserving aspect ratio.
    pub fn heighten(&mut self, height: u32, prevent_upscale: bool) -> &mut Self {
        self.data.operations.insert(
            "heighten",
            json!({ "height": height, "preventUpscale": prevent_upscale }),
        );
        self
    }

    /// Resize to the given width, preserving aspect ratio.
    pub fn widen(&mut self, width: u32, prevent_upscale: bool) -> &mut Self {
        self.data.operations.insert(
            "widen",
            json!({ "width": width, "preventUpscale": prevent_upscale }),
        );
        self
    }

    /// Resize to exact dimensions; does not preserve aspect ratio.
    pub fn resize(&mut self, width: u32, height: u32, prevent_upscale: bool) -> &mut Self {
        self.data.operations.insert(
            "resize",
            json!({ "width": width, "height": height, "preventUpscale": prevent_upscale }),
        );
        self
    }

    /// Scale to fit within the given box, preserving aspect ratio.
    pub fn scale(&mut self, width: u32, height: u32, prevent_upscale: bool) -> &mut Self {
        self.data.operations.insert(
            "scale",
            json!({ "width": width, "height": height, "preventUpscale": prevent_upscale }),
        );
        self
    }

    pub fn flip_horizontal(&mut self) -> &mut Self {
        self.data.operations.insert(
            "flipHorizontal",
            json!({ "direction": FlipDirection::Horizontal.as_str() }),
        );
        self
    }

    pub fn flip_vertical(&mut self) -> &mut Self {
        self.data.operations.insert(
            "flipVertical",
            json!({ "direction": FlipDirection::Vertical.as_str() }),
        );
        self
    }

    /// Flip along the given axis, `"h"` or `"v"`.
    pub fn flip(&mut self, direction: &str) -> Result<&mut Self, VariantError> {
        let direction = FlipDirection::from_str(direction)?;
        self.data
            .operations
            .insert("flip", json!({ "direction": direction.as_str() }));
        Ok(self)
    }

    /// Scale and crop so the result fills exactly `width` x `height`.
    pub fn cover(&mut self, width: u32, height: u32) -> &mut Self {
        self.cover_positioned(width, height, Position::Center, false)
    }

    pub fn cover_positioned(
        &mut self,
        width: u32,
        height: u32,
        position: Position,
        prevent_upscale: bool,
    ) -> &mut Self {
        self.data.operations.insert(
            "cover",
            json!({
                "width": width,
                "height": height,
                "position": position.as_str(),
                "preventUpscale": prevent_upscale,
            }),
        );
        self
    }

    /// Register an escape-hatch hook that receives the loaded image handle
    /// and this operation's argument mapping.
    pub fn callback(&mut self, hook: ImageCallback) -> &mut Self {
        self.data.operations.insert("callback", json!({}));
        self.data.callback = Some(hook);
        self
    }

    /// Freeze the pipeline into its descriptor.
    pub fn to_data(&self) -> VariantData {
        self.data.clone()
    }
}

/// Named set of variant pipelines, one per desired output.
#[derive(Debug, Clone, Default)]
pub struct ImageVariantCollection {
    variants: Vec<ImageVariant>,
}

impl ImageVariantCollection {
    pub fn create() -> Self {
        ImageVariantCollection::default()
    }

    /// Create and register a new pipeline under `name`.
    ///
    /// Registering a name twice fails with
    /// [`VariantError::DuplicateVariant`].
    pub fn add_new(&mut self, name: impl Into<String>) -> Result<&mut ImageVariant, VariantError> {
        let name = name.into();
        if self.has(&name) {
            return Err(VariantError::DuplicateVariant(name));
        }
        self.variants.push(ImageVariant::create(name));
        let index = self.variants.len() - 1;
        Ok(&mut self.variants[index])
    }

    pub fn add(&mut self, variant: ImageVariant) -> Result<(), VariantError> {
        if self.has(variant.name()) {
            return Err(VariantError::DuplicateVariant(variant.name().to_string()));
        }
        self.variants.push(variant);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ImageVariant> {
        self.variants.iter().find(|v| v.name() == name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.variants.iter().any(|v| v.name() == name)
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ImageVariant> {
        self.variants.iter()
    }

    /// Serialize the collection into the mapping consumed by
    /// [`crate::FileRecord::with_variants`].
    pub fn to_variants(&self) -> OrderedMap<VariantData> {
        self.variants
            .iter()
            .map(|v| (v.name().to_string(), v.to_data()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_chains_and_serializes() {
        let mut collection = ImageVariantCollection::create();
        collection
            .add_new("thumbnail")
            .unwrap()
            .scale(300, 300, false)
            .optimize();
        collection
            .add_new("resizeAndFlip")
            .unwrap()
            .flip_horizontal()
            .resize(300, 300, false);

        let variants = collection.to_variants();
        let names: Vec<&String> = variants.keys().collect();
        assert_eq!(names, ["thumbnail", "resizeAndFlip"]);

        let thumb = variants.get("thumbnail").unwrap();
        assert!(thumb.optimize);
        assert_eq!(
            thumb.operations.get("scale").unwrap()["width"],
            json!(300)
        );
        assert!(thumb.path.is_empty());

        let flip = variants.get("resizeAndFlip").unwrap();
        let ops: Vec<&String> = flip.operations.keys().collect();
        assert_eq!(ops, ["flipHorizontal", "resize"]);
    }

    #[test]
    fn test_duplicate_variant_fails() {
        let mut collection = ImageVariantCollection::create();
        collection.add_new("thumb").unwrap();

        let err = collection.add_new("thumb").unwrap_err();
        assert!(matches!(err, VariantError::DuplicateVariant(name) if name == "thumb"));
    }

    #[test]
    fn test_same_operation_overwrites() {
        let mut variant = ImageVariant::create("thumb");
        variant.scale(100, 100, false).scale(200, 200, true);

        let data = variant.to_data();
        assert_eq!(data.operations.len(), 1);
        let scale = data.operations.get("scale").unwrap();
        assert_eq!(scale["width"], json!(200));
        assert_eq!(scale["preventUpscale"], json!(true));
    }

    #[test]
    fn test_flip_validates_direction() {
        let mut variant = ImageVariant::create("mirror");
        assert!(variant.flip("h").is_ok());

        let err = variant.flip("z").unwrap_err();
        assert!(matches!(err, VariantError::InvalidDirection(d) if d == "z"));
    }

    #[test]
    fn test_callback_is_transient() {
        let mut variant = ImageVariant::create("custom");
        variant.callback(ImageCallback::new(|_, _| Ok(())));

        let data = variant.to_data();
        assert!(data.callback.is_some());
        assert!(data.operations.contains_key("callback"));

        let json = serde_json::to_string(&data).unwrap();
        let back: VariantData = serde_json::from_str(&json).unwrap();
        assert!(back.callback.is_none());
        assert!(back.operations.contains_key("callback"));
    }

    #[test]
    fn test_position_round_trip() {
        for position in [
            "center",
            "top-center",
            "bottom-center",
            "left-top",
            "right-top",
            "left-center",
            "right-center",
            "left-bottom",
            "right-bottom",
        ] {
            assert_eq!(Position::from_str(position).unwrap().as_str(), position);
        }
        assert!(Position::from_str("middle").is_err());
    }
}
