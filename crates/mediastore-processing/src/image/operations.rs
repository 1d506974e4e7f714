//! Operation dispatcher.
//!
//! Translates one `(operation name, argument mapping)` pair from a variant's
//! declared pipeline into calls against the loaded image. Arguments are
//! validated in full before the image is touched, so an invalid operation is
//! never partially applied. Unknown names fail with
//! [`ProcessorError::UnsupportedOperation`].

use crate::error::{ProcessorError, ProcessorResult};
use crate::image::geometry;
use mediastore_core::{FlipDirection, ImageCallback, Position};
use image::DynamicImage;
use serde_json::Value as JsonValue;
use std::str::FromStr;

/// A validated image operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Crop {
        width: u32,
        height: u32,
        x: i64,
        y: i64,
        position: Position,
    },
    Cover {
        width: u32,
        height: u32,
        position: Position,
        prevent_upscale: bool,
    },
    Resize {
        width: u32,
        height: u32,
        prevent_upscale: bool,
    },
    Scale {
        width: u32,
        height: u32,
        prevent_upscale: bool,
    },
    Rotate {
        /// Normalized to 0, 90, 180 or 270.
        angle: i64,
    },
    Sharpen {
        amount: u32,
    },
    Flip {
        direction: FlipDirection,
    },
    Heighten {
        height: u32,
        prevent_upscale: bool,
    },
    Widen {
        width: u32,
        prevent_upscale: bool,
    },
    Callback,
}

impl Operation {
    /// Validate a named operation and its argument mapping.
    pub fn parse(name: &str, args: &JsonValue) -> ProcessorResult<Self> {
        match name {
            "crop" => Ok(Operation::Crop {
                width: require_u32(name, args, "width")?,
                height: require_u32(name, args, "height")?,
                x: opt_i64(name, args, "x")?.unwrap_or(0),
                y: opt_i64(name, args, "y")?.unwrap_or(0),
                position: opt_position(name, args)?,
            }),
            "cover" => Ok(Operation::Cover {
                width: require_u32(name, args, "width")?,
                height: require_u32(name, args, "height")?,
                position: opt_position(name, args)?,
                prevent_upscale: opt_bool(name, args, "preventUpscale")?,
            }),
            "resize" => {
                let width = require_u32(name, args, "width")?;
                let height = require_u32(name, args, "height")?;
                let prevent_upscale = opt_bool(name, args, "preventUpscale")?;
                // Deprecated: an `aspectRatio` key coming from the old API
                // redirects the whole call to `scale`.
                if matches!(args.get("aspectRatio"), Some(v) if !v.is_null()) {
                    return Ok(Operation::Scale {
                        width,
                        height,
                        prevent_upscale,
                    });
                }
                Ok(Operation::Resize {
                    width,
                    height,
                    prevent_upscale,
                })
            }
            "scale" => Ok(Operation::Scale {
                width: require_u32(name, args, "width")?,
                height: require_u32(name, args, "height")?,
                prevent_upscale: opt_bool(name, args, "preventUpscale")?,
            }),
            "rotate" => {
                let angle = require_i64(name, args, "angle")?;
                let normalized = angle.rem_euclid(360);
                if normalized % 90 != 0 {
                    return Err(ProcessorError::InvalidArgument {
                        operation: name.to_string(),
                        argument: "angle".to_string(),
                        message: format!("{} is not a multiple of 90 degrees", angle),
                    });
                }
                Ok(Operation::Rotate { angle: normalized })
            }
            "sharpen" => Ok(Operation::Sharpen {
                amount: require_u32(name, args, "amount")?,
            }),
            "flipHorizontal" => Ok(Operation::Flip {
                direction: FlipDirection::Horizontal,
            }),
            "flipVertical" => Ok(Operation::Flip {
                direction: FlipDirection::Vertical,
            }),
            "flip" => {
                let direction = require_str(name, args, "direction")?;
                let direction = FlipDirection::from_str(&direction).map_err(|_| {
                    ProcessorError::InvalidArgument {
                        operation: name.to_string(),
                        argument: "direction".to_string(),
                        message: format!("`{}` is invalid, provide `h` or `v`", direction),
                    }
                })?;
                Ok(Operation::Flip { direction })
            }
            "heighten" => Ok(Operation::Heighten {
                height: require_u32(name, args, "height")?,
                prevent_upscale: opt_bool(name, args, "preventUpscale")?,
            }),
            "widen" => Ok(Operation::Widen {
                width: require_u32(name, args, "width")?,
                prevent_upscale: opt_bool(name, args, "preventUpscale")?,
            }),
            "callback" => Ok(Operation::Callback),
            other => Err(ProcessorError::UnsupportedOperation(other.to_string())),
        }
    }

    /// Apply the operation to the loaded image.
    pub fn apply(
        &self,
        image: &mut DynamicImage,
        args: &JsonValue,
        callback: Option<&ImageCallback>,
    ) -> ProcessorResult<()> {
        match *self {
            Operation::Crop {
                width,
                height,
                x,
                y,
                position,
            } => {
                *image = geometry::crop(image, width, height, x, y, position);
            }
            Operation::Cover {
                width,
                height,
                position,
                prevent_upscale,
            } => {
                *image = geometry::cover(image, width, height, position, prevent_upscale);
            }
            Operation::Resize {
                width,
                height,
                prevent_upscale,
            } => {
                *image = geometry::resize(image, width, height, prevent_upscale);
            }
            Operation::Scale {
                width,
                height,
                prevent_upscale,
            } => {
                *image = geometry::scale(image, width, height, prevent_upscale);
            }
            Operation::Rotate { angle } => match angle {
                90 => *image = image.rotate90(),
                180 => *image = image.rotate180(),
                270 => *image = image.rotate270(),
                _ => {}
            },
            Operation::Sharpen { amount } => {
                *image = image.unsharpen(amount as f32 / 10.0, 1);
            }
            Operation::Flip { direction } => match direction {
                FlipDirection::Horizontal => *image = image.fliph(),
                FlipDirection::Vertical => *image = image.flipv(),
            },
            Operation::Heighten {
                height,
                prevent_upscale,
            } => {
                *image = geometry::heighten(image, height, prevent_upscale);
            }
            Operation::Widen {
                width,
                prevent_upscale,
            } => {
                *image = geometry::widen(image, width, prevent_upscale);
            }
            Operation::Callback => {
                let hook = callback.ok_or_else(|| ProcessorError::MissingArgument {
                    operation: "callback".to_string(),
                    argument: "callback".to_string(),
                })?;
                hook.invoke(image, args)
                    .map_err(|e| ProcessorError::Callback(e.to_string()))?;
            }
        }
        Ok(())
    }
}

/// One-shot dispatcher: validate and apply a named operation.
pub struct Operations;

impl Operations {
    pub fn apply(
        image: &mut DynamicImage,
        name: &str,
        args: &JsonValue,
        callback: Option<&ImageCallback>,
    ) -> ProcessorResult<()> {
        let operation = Operation::parse(name, args)?;
        tracing::debug!(operation = %name, "applying image operation");
        operation.apply(image, args, callback)
    }
}

fn missing(operation: &str, argument: &str) -> ProcessorError {
    ProcessorError::MissingArgument {
        operation: operation.to_string(),
        argument: argument.to_string(),
    }
}

fn invalid(operation: &str, argument: &str, value: &JsonValue) -> ProcessorError {
    ProcessorError::InvalidArgument {
        operation: operation.to_string(),
        argument: argument.to_string(),
        message: format!("unexpected value {}", value),
    }
}

fn require_u32(operation: &str, args: &JsonValue, key: &str) -> ProcessorResult<u32> {
    match args.get(key) {
        None | Some(JsonValue::Null) => Err(missing(operation, key)),
        Some(value) => value
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| invalid(operation, key, value)),
    }
}

fn require_i64(operation: &str, args: &JsonValue, key: &str) -> ProcessorResult<i64> {
    match args.get(key) {
        None | Some(JsonValue::Null) => Err(missing(operation, key)),
        Some(value) => value.as_i64().ok_or_else(|| invalid(operation, key, value)),
    }
}

fn require_str(operation: &str, args: &JsonValue, key: &str) -> ProcessorResult<String> {
    match args.get(key) {
        None | Some(JsonValue::Null) => Err(missing(operation, key)),
        Some(value) => value
            .as_str()
            .map(String::from)
            .ok_or_else(|| invalid(operation, key, value)),
    }
}

fn opt_i64(operation: &str, args: &JsonValue, key: &str) -> ProcessorResult<Option<i64>> {
    match args.get(key) {
        None | Some(JsonValue::Null) => Ok(None),
        Some(value) => value
            .as_i64()
            .map(Some)
            .ok_or_else(|| invalid(operation, key, value)),
    }
}

fn opt_bool(operation: &str, args: &JsonValue, key: &str) -> ProcessorResult<bool> {
    match args.get(key) {
        None | Some(JsonValue::Null) => Ok(false),
        Some(value) => value
            .as_bool()
            .ok_or_else(|| invalid(operation, key, value)),
    }
}

fn opt_position(operation: &str, args: &JsonValue) -> ProcessorResult<Position> {
    match args.get("position") {
        None | Some(JsonValue::Null) => Ok(Position::default()),
        Some(value) => {
            let raw = value
                .as_str()
                .ok_or_else(|| invalid(operation, "position", value))?;
            Position::from_str(raw).map_err(|_| ProcessorError::InvalidArgument {
                operation: operation.to_string(),
                argument: "position".to_string(),
                message: format!("`{}` is not a valid position", raw),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgba, RgbaImage};
    use serde_json::json;

    fn image_of(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([0, 128, 0, 255])))
    }

    #[test]
    fn test_crop_defaults() {
        let op = Operation::parse("crop", &json!({ "width": 100, "height": 50 })).unwrap();
        assert_eq!(
            op,
            Operation::Crop {
                width: 100,
                height: 50,
                x: 0,
                y: 0,
                position: Position::Center,
            }
        );
    }

    #[test]
    fn test_crop_null_offsets_default_to_zero() {
        let op = Operation::parse(
            "crop",
            &json!({ "width": 100, "height": 50, "x": null, "y": null }),
        )
        .unwrap();
        assert!(matches!(op, Operation::Crop { x: 0, y: 0, .. }));
    }

    #[test]
    fn test_crop_missing_dimension_fails() {
        let err = Operation::parse("crop", &json!({ "width": 100 })).unwrap_err();
        assert!(matches!(
            err,
            ProcessorError::MissingArgument { operation, argument }
                if operation == "crop" && argument == "height"
        ));
    }

    #[test]
    fn test_cover_missing_dimension_fails() {
        let err = Operation::parse("cover", &json!({ "height": 100 })).unwrap_err();
        assert!(matches!(
            err,
            ProcessorError::MissingArgument { argument, .. } if argument == "width"
        ));
    }

    #[test]
    fn test_rotate_requires_angle() {
        let err = Operation::parse("rotate", &json!({})).unwrap_err();
        assert!(matches!(
            err,
            ProcessorError::MissingArgument { argument, .. } if argument == "angle"
        ));

        let op = Operation::parse("rotate", &json!({ "angle": -90 })).unwrap();
        assert_eq!(op, Operation::Rotate { angle: 270 });

        let err = Operation::parse("rotate", &json!({ "angle": 45 })).unwrap_err();
        assert!(matches!(err, ProcessorError::InvalidArgument { .. }));
    }

    #[test]
    fn test_sharpen_requires_amount() {
        let err = Operation::parse("sharpen", &json!({})).unwrap_err();
        assert!(matches!(
            err,
            ProcessorError::MissingArgument { argument, .. } if argument == "amount"
        ));
    }

    #[test]
    fn test_flip_shorthand_matches_explicit_flip() {
        let explicit = Operation::parse("flip", &json!({ "direction": "h" })).unwrap();
        let shorthand = Operation::parse("flipHorizontal", &json!({})).unwrap();
        assert_eq!(explicit, shorthand);

        let explicit = Operation::parse("flip", &json!({ "direction": "v" })).unwrap();
        let shorthand = Operation::parse("flipVertical", &json!({})).unwrap();
        assert_eq!(explicit, shorthand);
    }

    #[test]
    fn test_flip_invalid_direction_fails() {
        let err = Operation::parse("flip", &json!({ "direction": "z" })).unwrap_err();
        assert!(matches!(
            err,
            ProcessorError::InvalidArgument { operation, argument, .. }
                if operation == "flip" && argument == "direction"
        ));
    }

    #[test]
    fn test_legacy_aspect_ratio_redirects_resize_to_scale() {
        let legacy = Operation::parse(
            "resize",
            &json!({ "width": 300, "height": 300, "aspectRatio": true }),
        )
        .unwrap();
        let scale = Operation::parse("scale", &json!({ "width": 300, "height": 300 })).unwrap();
        assert_eq!(legacy, scale);

        // A null aspectRatio key does not trigger the redirect.
        let plain = Operation::parse(
            "resize",
            &json!({ "width": 300, "height": 300, "aspectRatio": null }),
        )
        .unwrap();
        assert!(matches!(plain, Operation::Resize { .. }));
    }

    #[test]
    fn test_unknown_operation_fails() {
        let err = Operation::parse("warp", &json!({})).unwrap_err();
        assert!(matches!(
            err,
            ProcessorError::UnsupportedOperation(name) if name == "warp"
        ));
    }

    #[test]
    fn test_invalid_argument_type_fails_before_apply() {
        let err = Operation::parse("scale", &json!({ "width": "wide", "height": 10 })).unwrap_err();
        assert!(matches!(
            err,
            ProcessorError::InvalidArgument { argument, .. } if argument == "width"
        ));
    }

    #[test]
    fn test_apply_resize_changes_dimensions() {
        let mut image = image_of(40, 20);
        Operations::apply(&mut image, "resize", &json!({ "width": 10, "height": 10 }), None)
            .unwrap();
        assert_eq!(image.dimensions(), (10, 10));
    }

    #[test]
    fn test_apply_rotate_swaps_dimensions() {
        let mut image = image_of(40, 20);
        Operations::apply(&mut image, "rotate", &json!({ "angle": 90 }), None).unwrap();
        assert_eq!(image.dimensions(), (20, 40));
    }

    #[test]
    fn test_callback_without_hook_fails() {
        let mut image = image_of(4, 4);
        let err = Operations::apply(&mut image, "callback", &json!({}), None).unwrap_err();
        assert!(matches!(
            err,
            ProcessorError::MissingArgument { operation, .. } if operation == "callback"
        ));
    }

    #[test]
    fn test_callback_receives_image_and_args() {
        let mut image = image_of(40, 20);
        let hook = ImageCallback::new(|image, args| {
            let size = args["size"].as_u64().unwrap() as u32;
            *image = image.resize_exact(size, size, image::imageops::FilterType::Nearest);
            Ok(())
        });
        Operations::apply(&mut image, "callback", &json!({ "size": 8 }), Some(&hook)).unwrap();
        assert_eq!(image.dimensions(), (8, 8));
    }
}
