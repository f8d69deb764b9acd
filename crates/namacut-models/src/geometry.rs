//! Rectangles, rotation, and display geometry.
//!
//! Two coordinate spaces appear throughout the export core:
//! - **Display space**: floating-point pixels of the on-screen viewport,
//!   including letterbox/pillarbox bars, after rotation and flips.
//! - **Source space**: integer pixels of the original, unrotated frame.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A rectangle in display space (top-left origin).
///
/// While the user is dragging, `width`/`height` may be negative to encode the
/// drag direction. Consumers must call [`Rect::normalized`] before reading it.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    /// Create a new rectangle.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle spanning two corner points, in any order.
    pub fn from_corners(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self::new(x1, y1, x2 - x1, y2 - y1).normalized()
    }

    /// Make width and height non-negative, moving the origin accordingly.
    pub fn normalized(&self) -> Self {
        let mut rect = *self;
        if rect.width < 0.0 {
            rect.x += rect.width;
            rect.width = -rect.width;
        }
        if rect.height < 0.0 {
            rect.y += rect.height;
            rect.height = -rect.height;
        }
        rect
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Whether the rectangle covers no area.
    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }

    /// Intersection with `other`, or `None` if they do not overlap.
    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let a = self.normalized();
        let b = other.normalized();
        let x1 = a.x.max(b.x);
        let y1 = a.y.max(b.y);
        let x2 = a.right().min(b.right());
        let y2 = a.bottom().min(b.bottom());
        if x2 > x1 && y2 > y1 {
            Some(Rect::new(x1, y1, x2 - x1, y2 - y1))
        } else {
            None
        }
    }

    /// Whether `other` lies entirely inside this rectangle.
    pub fn contains(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }
}

/// A crop rectangle in source-pixel space, ready for the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Whether both dimensions are even (required by 4:2:0 encoders).
    pub fn has_even_dimensions(&self) -> bool {
        self.width % 2 == 0 && self.height % 2 == 0
    }

    /// Whether the rectangle fits inside a `width` x `height` frame.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.x as u64 + self.width as u64 <= width as u64
            && self.y as u64 + self.height as u64 <= height as u64
    }
}

impl fmt::Display for CropRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}

/// Clockwise rotation applied to the source frame for display and export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub fn degrees(&self) -> i32 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    /// Map any multiple of 90 (negative included) onto a rotation.
    pub fn from_degrees(degrees: i32) -> Option<Self> {
        match degrees.rem_euclid(360) {
            0 => Some(Rotation::Deg0),
            90 => Some(Rotation::Deg90),
            180 => Some(Rotation::Deg180),
            270 => Some(Rotation::Deg270),
            _ => None,
        }
    }

    pub fn clockwise(&self) -> Self {
        Self::from_degrees(self.degrees() + 90).unwrap_or_default()
    }

    pub fn counter_clockwise(&self) -> Self {
        Self::from_degrees(self.degrees() - 90).unwrap_or_default()
    }

    /// Whether the rotation swaps width and height (odd multiple of 90°).
    pub fn swaps_axes(&self) -> bool {
        matches!(self, Rotation::Deg90 | Rotation::Deg270)
    }

    /// Dimensions of a `width` x `height` frame after this rotation.
    pub fn effective_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        if self.swaps_axes() {
            (height, width)
        } else {
            (width, height)
        }
    }
}

impl TryFrom<i32> for Rotation {
    type Error = String;

    fn try_from(degrees: i32) -> Result<Self, Self::Error> {
        Rotation::from_degrees(degrees)
            .ok_or_else(|| format!("rotation must be a multiple of 90, got {}", degrees))
    }
}

impl From<Rotation> for i32 {
    fn from(rotation: Rotation) -> Self {
        rotation.degrees()
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

/// Placement of the (rotated) video inside the playback viewport.
///
/// Invariant: at most one of `pad_x`/`pad_y` is non-zero, and neither is
/// negative. Both are zero when the aspect ratios match exactly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayGeometry {
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub source_width: u32,
    pub source_height: u32,
    /// Rotation the effective dimensions were derived for.
    pub rotation: Rotation,
    pub effective_width: u32,
    pub effective_height: u32,
    pub pad_x: f64,
    pub pad_y: f64,
}

impl DisplayGeometry {
    /// Width of the video-occupied part of the viewport.
    pub fn video_display_width(&self) -> f64 {
        self.viewport_width as f64 - 2.0 * self.pad_x
    }

    /// Height of the video-occupied part of the viewport.
    pub fn video_display_height(&self) -> f64 {
        self.viewport_height as f64 - 2.0 * self.pad_y
    }

    /// The video-occupied region of the viewport (padding bars excluded).
    pub fn video_region(&self) -> Rect {
        Rect::new(
            self.pad_x,
            self.pad_y,
            self.video_display_width(),
            self.video_display_height(),
        )
    }

    /// Whether the geometry can map anything at all.
    pub fn is_degenerate(&self) -> bool {
        self.source_width == 0
            || self.source_height == 0
            || self.video_display_width() <= 0.0
            || self.video_display_height() <= 0.0
    }
}
