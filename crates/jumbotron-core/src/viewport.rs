//! Viewport module: the window into image space.

use kurbo::{Point, Size, Vec2};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Display orientation, in quarter turns clockwise.
///
/// On the wire this is the quarter-turn index (0 = upright, 1 = 90°,
/// 2 = 180°, 3 = 270°).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// All rotations in quarter-turn order.
    pub const ALL: [Rotation; 4] = [
        Rotation::Deg0,
        Rotation::Deg90,
        Rotation::Deg180,
        Rotation::Deg270,
    ];

    /// Quarter-turn index (0..=3).
    pub fn quarter_turns(self) -> u8 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 1,
            Rotation::Deg180 => 2,
            Rotation::Deg270 => 3,
        }
    }

    /// Rotation angle in degrees.
    pub fn degrees(self) -> f64 {
        f64::from(self.quarter_turns()) * 90.0
    }

    /// Whether this rotation swaps the horizontal and vertical axes.
    pub fn is_sideways(self) -> bool {
        matches!(self, Rotation::Deg90 | Rotation::Deg270)
    }

    /// Rotate a screen-space step into image space.
    ///
    /// Screen "right" points along a different image axis once the image has
    /// been turned to fit the display.
    pub fn orient(self, step: Vec2) -> Vec2 {
        let Vec2 { x: dx, y: dy } = step;
        match self {
            Rotation::Deg0 => Vec2::new(dx, dy),
            Rotation::Deg90 => Vec2::new(dy, -dx),
            Rotation::Deg180 => Vec2::new(-dx, -dy),
            Rotation::Deg270 => Vec2::new(-dy, dx),
        }
    }
}

impl TryFrom<u8> for Rotation {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Rotation::Deg0),
            1 => Ok(Rotation::Deg90),
            2 => Ok(Rotation::Deg180),
            3 => Ok(Rotation::Deg270),
            other => Err(format!("invalid rotation index: {}", other)),
        }
    }
}

impl From<Rotation> for u8 {
    fn from(rotation: Rotation) -> Self {
        rotation.quarter_turns()
    }
}

/// A rectangular window into image space, in image pixel coordinates.
///
/// The offset may be negative or run past the image extent; the remote
/// authority reconciles bounds. Width and height are expected to stay
/// positive, which callers maintain by clamping scale factors before
/// calling [`Viewport::scale`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// Left edge in image pixels.
    #[serde(default)]
    pub x: f64,
    /// Top edge in image pixels.
    #[serde(default)]
    pub y: f64,
    /// Visible width in image pixels.
    #[serde(default = "unit_extent")]
    pub width: f64,
    /// Visible height in image pixels.
    #[serde(default = "unit_extent")]
    pub height: f64,
    /// Display orientation.
    #[serde(default)]
    pub rotation: Rotation,
}

fn unit_extent() -> f64 {
    1.0
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: 1.0,
            height: 1.0,
            rotation: Rotation::Deg0,
        }
    }
}

impl Viewport {
    /// Create a viewport from its offset, extent and rotation.
    pub fn new(x: f64, y: f64, width: f64, height: f64, rotation: Rotation) -> Self {
        Self {
            x,
            y,
            width,
            height,
            rotation,
        }
    }

    /// Replace degenerate extents with the unit extent.
    ///
    /// Inbound viewports come from the network; a zero, negative or
    /// non-finite width/height would make every later division meaningless.
    pub fn sanitized(mut self) -> Self {
        if !(self.width.is_finite() && self.width > 0.0) {
            self.width = 1.0;
        }
        if !(self.height.is_finite() && self.height > 0.0) {
            self.height = 1.0;
        }
        if !self.x.is_finite() {
            self.x = 0.0;
        }
        if !self.y.is_finite() {
            self.y = 0.0;
        }
        self
    }

    /// Top-left corner in image space.
    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Extent in image space.
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Extent as seen from the display: swapped when sideways.
    pub fn display_extent(&self) -> Size {
        if self.is_sideways() {
            Size::new(self.height, self.width)
        } else {
            self.size()
        }
    }

    /// Move the viewport by a step in image space.
    pub fn translate(&mut self, dx: f64, dy: f64) {
        self.x += dx;
        self.y += dy;
    }

    /// Scale the viewport about a fixed origin in image space.
    pub fn scale(&mut self, sx: f64, sy: f64, origin_x: f64, origin_y: f64) {
        self.x = (self.x - origin_x) * sx + origin_x;
        self.y = (self.y - origin_y) * sy + origin_y;
        self.width *= sx;
        self.height *= sy;
    }

    /// Whether the display is turned a quarter turn relative to the image.
    pub fn is_sideways(&self) -> bool {
        self.rotation.is_sideways()
    }
}

impl fmt::Display for Viewport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{} {}x{} ({})",
            self.x,
            self.y,
            self.width,
            self.height,
            self.rotation.quarter_turns()
        )
    }
}
