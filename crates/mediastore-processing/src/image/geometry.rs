//! Dimension math for the image operations.
//!
//! All functions take the loaded image and return the transformed image;
//! target dimensions are computed here so the operation dispatcher stays a
//! thin translation layer. Filter choice follows the downscale ratio: heavy
//! reductions use cheaper filters, near-1:1 work uses Lanczos.

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use mediastore_core::Position;

/// Select an appropriate filter type based on the resize ratio.
pub fn select_filter(orig_width: u32, orig_height: u32, new_width: u32, new_height: u32) -> FilterType {
    let width_ratio = orig_width as f32 / new_width as f32;
    let height_ratio = orig_height as f32 / new_height as f32;
    let max_ratio = width_ratio.max(height_ratio);

    if max_ratio > 2.0 {
        FilterType::Triangle
    } else if max_ratio > 1.5 {
        FilterType::CatmullRom
    } else {
        FilterType::Lanczos3
    }
}

fn resize_to(image: &DynamicImage, width: u32, height: u32) -> DynamicImage {
    let (orig_width, orig_height) = image.dimensions();
    if (orig_width, orig_height) == (width, height) {
        return image.clone();
    }
    let filter = select_filter(orig_width, orig_height, width, height);
    image.resize_exact(width, height, filter)
}

/// Uniform scale factor fitting the source inside `width` x `height`.
fn contain_ratio(orig: (u32, u32), width: u32, height: u32) -> f64 {
    (width as f64 / orig.0 as f64).min(height as f64 / orig.1 as f64)
}

fn scaled(dim: u32, ratio: f64) -> u32 {
    ((dim as f64 * ratio).round() as u32).max(1)
}

/// Scale to fit within the box, preserving aspect ratio.
pub fn scale(image: &DynamicImage, width: u32, height: u32, prevent_upscale: bool) -> DynamicImage {
    let orig = image.dimensions();
    let mut ratio = contain_ratio(orig, width, height);
    if prevent_upscale {
        ratio = ratio.min(1.0);
    }
    resize_to(image, scaled(orig.0, ratio), scaled(orig.1, ratio))
}

/// Resize to exact dimensions; does not preserve aspect ratio.
pub fn resize(image: &DynamicImage, width: u32, height: u32, prevent_upscale: bool) -> DynamicImage {
    let (orig_width, orig_height) = image.dimensions();
    let (width, height) = if prevent_upscale {
        (width.min(orig_width), height.min(orig_height))
    } else {
        (width, height)
    };
    resize_to(image, width, height)
}

/// Resize to the given height, preserving aspect ratio.
pub fn heighten(image: &DynamicImage, height: u32, prevent_upscale: bool) -> DynamicImage {
    let orig = image.dimensions();
    let mut ratio = height as f64 / orig.1 as f64;
    if prevent_upscale {
        ratio = ratio.min(1.0);
    }
    resize_to(image, scaled(orig.0, ratio), scaled(orig.1, ratio))
}

/// Resize to the given width, preserving aspect ratio.
pub fn widen(image: &DynamicImage, width: u32, prevent_upscale: bool) -> DynamicImage {
    let orig = image.dimensions();
    let mut ratio = width as f64 / orig.0 as f64;
    if prevent_upscale {
        ratio = ratio.min(1.0);
    }
    resize_to(image, scaled(orig.0, ratio), scaled(orig.1, ratio))
}

/// Scale and crop so the result fills exactly `width` x `height`, anchored at
/// `position`. With `prevent_upscale`, a target larger than the source is
/// shrunk to fit inside the source while keeping the target aspect ratio.
pub fn cover(
    image: &DynamicImage,
    width: u32,
    height: u32,
    position: Position,
    prevent_upscale: bool,
) -> DynamicImage {
    let orig = image.dimensions();

    let (width, height) = if prevent_upscale && (width > orig.0 || height > orig.1) {
        let shrink = contain_ratio((width, height), orig.0, orig.1);
        (scaled(width, shrink), scaled(height, shrink))
    } else {
        (width, height)
    };

    let ratio = (width as f64 / orig.0 as f64).max(height as f64 / orig.1 as f64);
    let scaled_width = ((orig.0 as f64 * ratio).ceil() as u32).max(width);
    let scaled_height = ((orig.1 as f64 * ratio).ceil() as u32).max(height);

    let resized = resize_to(image, scaled_width, scaled_height);
    let (x, y) = anchor(position, (scaled_width, scaled_height), (width, height));
    resized.crop_imm(x, y, width, height)
}

/// Cut a `width` x `height` window out of the image. The window is anchored
/// at `position` and shifted by the `x`/`y` offsets, clamped to stay inside
/// the source.
pub fn crop(
    image: &DynamicImage,
    width: u32,
    height: u32,
    x: i64,
    y: i64,
    position: Position,
) -> DynamicImage {
    let (orig_width, orig_height) = image.dimensions();
    let width = width.min(orig_width);
    let height = height.min(orig_height);

    let (base_x, base_y) = anchor(position, (orig_width, orig_height), (width, height));
    let max_x = (orig_width - width) as i64;
    let max_y = (orig_height - height) as i64;
    let offset_x = (base_x as i64 + x).clamp(0, max_x) as u32;
    let offset_y = (base_y as i64 + y).clamp(0, max_y) as u32;

    image.crop_imm(offset_x, offset_y, width, height)
}

/// Top-left corner of a `window` placed inside `container` at `position`.
fn anchor(position: Position, container: (u32, u32), window: (u32, u32)) -> (u32, u32) {
    let (cw, ch) = container;
    let (w, h) = window;
    let left = 0;
    let center_x = (cw - w) / 2;
    let right = cw - w;
    let top = 0;
    let center_y = (ch - h) / 2;
    let bottom = ch - h;

    match position {
        Position::Center => (center_x, center_y),
        Position::TopCenter => (center_x, top),
        Position::BottomCenter => (center_x, bottom),
        Position::LeftTop => (left, top),
        Position::RightTop => (right, top),
        Position::LeftCenter => (left, center_y),
        Position::RightCenter => (right, center_y),
        Position::LeftBottom => (left, bottom),
        Position::RightBottom => (right, bottom),
    }
}
