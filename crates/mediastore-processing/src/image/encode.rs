//! Image encoding keyed by file extension.
//!
//! JPEG goes through mozjpeg for quality-controlled, progressive output; the
//! lossless formats go through the `image` crate's encoders and ignore the
//! quality setting.

use crate::error::{ProcessorError, ProcessorResult};
use bytes::Bytes;
use image::{DynamicImage, GenericImageView, ImageFormat};
use std::io::Cursor;

/// Encode the image for the given file extension.
pub fn encode_by_extension(
    image: &DynamicImage,
    extension: &str,
    quality: u8,
) -> ProcessorResult<Bytes> {
    match extension.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => {
            encode_jpeg(image, quality).map_err(|e| ProcessorError::Encode(e.to_string()))
        }
        "png" => encode_with(image, ImageFormat::Png),
        "gif" => encode_with(image, ImageFormat::Gif),
        "webp" => encode_with(image, ImageFormat::WebP),
        other => Err(ProcessorError::UnsupportedFormat(other.to_string())),
    }
}

fn encode_with(image: &DynamicImage, format: ImageFormat) -> ProcessorResult<Bytes> {
    let (width, height) = image.dimensions();
    let estimated_size = (width * height * 3) as usize;
    let mut buffer = Vec::with_capacity(estimated_size);
    let mut cursor = Cursor::new(&mut buffer);
    image.write_to(&mut cursor, format)?;
    Ok(Bytes::from(buffer))
}

fn encode_jpeg(image: &DynamicImage, quality: u8) -> anyhow::Result<Bytes> {
    let rgb_img = image.to_rgb8();
    let (width, height) = rgb_img.dimensions();

    let mut comp = mozjpeg::Compress::new(mozjpeg::ColorSpace::JCS_RGB);
    comp.set_size(width as usize, height as usize);
    comp.set_quality(quality as f32);
    comp.set_progressive_mode();
    comp.set_optimize_coding(true);

    let mut comp = comp.start_compress(Vec::new())?;
    comp.write_scanlines(&rgb_img)?;
    let jpeg_data = comp.finish()?;

    Ok(Bytes::from(jpeg_data))
}
