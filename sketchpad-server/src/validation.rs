//! Input validation for untrusted data.
//!
//! All client-supplied input MUST be validated before use. Draw payloads arrive
//! as raw JSON values so that every malformed shape (missing fields, strings
//! where numbers belong, empty point lists) is rejected here rather than by the
//! deserializer.

use serde_json::Value;
use sketchpad_core::{Point, Stroke, Tool};
use thiserror::Error;

use crate::protocol::StrokeCandidate;

/// Maximum length for room IDs.
pub const MAX_ROOM_ID_LEN: usize = 64;
/// Maximum length for display names (in characters).
pub const MAX_USERNAME_LEN: usize = 32;
/// Display name used when a client supplies none.
pub const DEFAULT_USERNAME: &str = "Anonymous";
/// Maximum points in a single stroke.
pub const MAX_POINTS_PER_STROKE: usize = 10_000;
/// Minimum stroke width in pixels (inclusive).
pub const MIN_STROKE_WIDTH: f64 = 1.0;
/// Maximum stroke width in pixels (inclusive).
pub const MAX_STROKE_WIDTH: f64 = 50.0;
/// Maximum WebSocket message size.
pub const MAX_WS_MESSAGE_SIZE: usize = 1_048_576; // 1MB

/// Validation error types.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Room ID exceeds maximum length.
    #[error("room_id too long (max {MAX_ROOM_ID_LEN} chars)")]
    RoomIdTooLong,
    /// Room ID is empty or contains invalid characters.
    #[error("room_id contains invalid characters")]
    RoomIdInvalidChars,
    /// Stroke has no `points` field.
    #[error("points missing")]
    PointsMissing,
    /// `points` is not an array.
    #[error("points is not a sequence")]
    PointsNotSequence,
    /// `points` is an empty array.
    #[error("points is empty")]
    PointsEmpty,
    /// Stroke has more points than allowed.
    #[error("too many points (max {MAX_POINTS_PER_STROKE})")]
    TooManyPoints,
    /// A point is not an object with finite numeric `x` and `y`.
    #[error("invalid point at index {0}")]
    InvalidPoint(usize),
    /// Tool missing or not one of `brush`, `eraser`.
    #[error("unknown tool")]
    InvalidTool,
    /// Stroke width missing or not a number.
    #[error("strokeWidth is not numeric")]
    StrokeWidthNotNumeric,
    /// Stroke width outside the allowed range.
    #[error("strokeWidth out of range ({MIN_STROKE_WIDTH}..={MAX_STROKE_WIDTH})")]
    StrokeWidthOutOfRange,
    /// Color missing or not a `#RRGGBB` string on a non-eraser stroke.
    #[error("color must be #RRGGBB")]
    InvalidColor,
    /// WebSocket message exceeds maximum size.
    #[error("message too large (max {MAX_WS_MESSAGE_SIZE} bytes)")]
    MessageTooLarge,
}

impl ValidationError {
    /// Short label used for metrics and logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::RoomIdTooLong | Self::RoomIdInvalidChars => "room_id",
            Self::PointsMissing
            | Self::PointsNotSequence
            | Self::PointsEmpty
            | Self::TooManyPoints
            | Self::InvalidPoint(_) => "points",
            Self::InvalidTool => "tool",
            Self::StrokeWidthNotNumeric | Self::StrokeWidthOutOfRange => "stroke_width",
            Self::InvalidColor => "color",
            Self::MessageTooLarge => "message_size",
        }
    }
}

/// Check if a character is valid for IDs (alphanumeric, hyphen, or underscore).
fn is_valid_id_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

/// Validate a room ID.
///
/// Valid room IDs:
/// - 1-64 characters
/// - Alphanumeric, hyphen, underscore only
///
/// # Errors
///
/// Returns [`ValidationError::RoomIdTooLong`] if the ID exceeds 64 characters.
/// Returns [`ValidationError::RoomIdInvalidChars`] if the ID is empty or contains invalid characters.
pub fn validate_room_id(id: &str) -> Result<(), ValidationError> {
    if id.chars().count() > MAX_ROOM_ID_LEN {
        return Err(ValidationError::RoomIdTooLong);
    }
    if id.is_empty() || !id.chars().all(is_valid_id_char) {
        return Err(ValidationError::RoomIdInvalidChars);
    }
    Ok(())
}

/// Normalize a display name.
///
/// Control characters are stripped, surrounding whitespace trimmed and the
/// result truncated to [`MAX_USERNAME_LEN`] characters. Missing or blank names
/// become [`DEFAULT_USERNAME`].
#[must_use]
pub fn normalize_username(name: Option<&str>) -> String {
    let cleaned: String = name
        .unwrap_or_default()
        .chars()
        .filter(|c| !c.is_control())
        .collect();
    let trimmed: String = cleaned.trim().chars().take(MAX_USERNAME_LEN).collect();
    let trimmed = trimmed.trim_end();
    if trimmed.is_empty() {
        DEFAULT_USERNAME.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Whether `color` is `#` followed by exactly six hex digits (any case).
#[must_use]
pub fn is_hex_color(color: &str) -> bool {
    color
        .strip_prefix('#')
        .is_some_and(|hex| hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Validate an untrusted draw payload and turn it into a typed stroke.
///
/// For eraser strokes the color is neither required nor kept.
///
/// # Errors
///
/// Returns the first [`ValidationError`] found: points are checked first,
/// then tool, stroke width and color.
pub fn validate_stroke(candidate: &StrokeCandidate) -> Result<Stroke, ValidationError> {
    let points = parse_points(candidate.points.as_ref())?;

    let tool = candidate
        .tool
        .as_ref()
        .and_then(Value::as_str)
        .and_then(Tool::from_name)
        .ok_or(ValidationError::InvalidTool)?;

    let stroke_width = candidate
        .stroke_width
        .as_ref()
        .and_then(Value::as_f64)
        .ok_or(ValidationError::StrokeWidthNotNumeric)?;
    if !(MIN_STROKE_WIDTH..=MAX_STROKE_WIDTH).contains(&stroke_width) {
        return Err(ValidationError::StrokeWidthOutOfRange);
    }

    let color = match tool {
        Tool::Eraser => None,
        Tool::Brush => {
            let color = candidate
                .color
                .as_ref()
                .and_then(Value::as_str)
                .filter(|c| is_hex_color(c))
                .ok_or(ValidationError::InvalidColor)?;
            Some(color.to_string())
        }
    };

    Ok(Stroke {
        points,
        tool,
        color,
        stroke_width,
    })
}

fn parse_points(points: Option<&Value>) -> Result<Vec<Point>, ValidationError> {
    let items = match points {
        None | Some(Value::Null) => return Err(ValidationError::PointsMissing),
        Some(Value::Array(items)) => items,
        Some(_) => return Err(ValidationError::PointsNotSequence),
    };
    if items.is_empty() {
        return Err(ValidationError::PointsEmpty);
    }
    if items.len() > MAX_POINTS_PER_STROKE {
        return Err(ValidationError::TooManyPoints);
    }

    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let coordinate = |key: &str| item.get(key).and_then(Value::as_f64);
            match (coordinate("x"), coordinate("y")) {
                (Some(x), Some(y)) if x.is_finite() && y.is_finite() => Ok(Point::new(x, y)),
                _ => Err(ValidationError::InvalidPoint(index)),
            }
        })
        .collect()
}

/// Validate WebSocket message size.
///
/// # Errors
///
/// Returns [`ValidationError::MessageTooLarge`] if the message exceeds 1MB.
pub fn validate_message_size(size: usize) -> Result<(), ValidationError> {
    if size > MAX_WS_MESSAGE_SIZE {
        return Err(ValidationError::MessageTooLarge);
    }
    Ok(())
}
