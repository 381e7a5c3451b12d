//! Stroke operations - the immutable records that make up a room's history.

use std::borrow::Borrow;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an operation.
///
/// Always generated by the authority when a stroke is ingested; ids supplied
/// by clients are never trusted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(String);

impl OperationId {
    /// Create a new unique operation ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Borrow the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for OperationId {
    fn default() -> Self {
        Self::new()
    }
}

impl Borrow<str> for OperationId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for OperationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl std::fmt::Display for OperationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A point on the drawing surface, in canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position.
    pub x: f64,
    /// Vertical position.
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Whether both coordinates are finite real numbers.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Drawing tool used for a stroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    /// Paints with a color.
    Brush,
    /// Erases whatever lies under the stroke; carries no color.
    Eraser,
}

impl Tool {
    /// Parse a tool name as it appears on the wire.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "brush" => Some(Self::Brush),
            "eraser" => Some(Self::Eraser),
            _ => None,
        }
    }

    /// Wire name of the tool.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Brush => "brush",
            Self::Eraser => "eraser",
        }
    }
}

impl std::fmt::Display for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The drawable content of a stroke, before the authority stamps it.
///
/// Produced by validating an untrusted draw intent.
#[derive(Debug, Clone, PartialEq)]
pub struct Stroke {
    /// Ordered points of the stroke (never empty once validated).
    pub points: Vec<Point>,
    /// Tool used.
    pub tool: Tool,
    /// Hex color (`#RRGGBB`); ignored for the eraser.
    pub color: Option<String>,
    /// Stroke width in pixels.
    pub stroke_width: f64,
}

/// One completed stroke, stamped with identity and time by the authority.
///
/// Operations are immutable: they are appended, removed or moved between the
/// history and the undo stack, but never modified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    id: OperationId,
    user_id: String,
    timestamp: u64,
    points: Vec<Point>,
    tool: Tool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    color: Option<String>,
    stroke_width: f64,
}

impl Operation {
    /// Stamp a stroke with a fresh id, the author and the current time.
    #[must_use]
    pub fn stamp(stroke: Stroke, user_id: impl Into<String>) -> Self {
        Self::with_timestamp(stroke, user_id, Self::now())
    }

    /// Stamp a stroke with a fresh id, the author and an explicit timestamp.
    ///
    /// An eraser stroke never keeps a color.
    #[must_use]
    pub fn with_timestamp(stroke: Stroke, user_id: impl Into<String>, timestamp: u64) -> Self {
        let color = match stroke.tool {
            Tool::Brush => stroke.color,
            Tool::Eraser => None,
        };
        Self {
            id: OperationId::new(),
            user_id: user_id.into(),
            timestamp,
            points: stroke.points,
            tool: stroke.tool,
            color,
            stroke_width: stroke.stroke_width,
        }
    }

    /// Operation id.
    #[must_use]
    pub fn id(&self) -> &OperationId {
        &self.id
    }

    /// Connection id of the author.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Authority-assigned timestamp (ms since epoch).
    #[must_use]
    pub const fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Points of the stroke.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Tool used.
    #[must_use]
    pub const fn tool(&self) -> Tool {
        self.tool
    }

    /// Stroke color, absent for erasers.
    #[must_use]
    pub fn color(&self) -> Option<&str> {
        self.color.as_deref()
    }

    /// Stroke width in pixels.
    #[must_use]
    pub const fn stroke_width(&self) -> f64 {
        self.stroke_width
    }

    /// Get the current timestamp in milliseconds since epoch.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // Timestamps won't exceed u64 for billions of years
    pub fn now() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}
