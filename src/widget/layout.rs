//! Zoom, position and size of the floating widget

use crate::models::StoredGeometry;
use crate::paths::{
    DEFAULT_WIDGET_HEIGHT, DEFAULT_WIDGET_WIDTH, MIN_WIDGET_HEIGHT, MIN_WIDGET_WIDTH,
};

pub const MIN_ZOOM: f64 = 0.5;
pub const MAX_ZOOM: f64 = 2.0;
pub const ZOOM_STEP: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Uniform scale applied to the widget, anchored at its top-left corner
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Zoom(f64);

impl Default for Zoom {
    fn default() -> Self {
        Self(1.0)
    }
}

impl Zoom {
    /// Clamps into [0.5, 2.0]; non-finite input resets to 1.0
    pub fn new(level: f64) -> Self {
        if !level.is_finite() {
            return Self::default();
        }
        // Two decimals keep repeated 0.1 steps from drifting
        let rounded = (level * 100.0).round() / 100.0;
        Self(rounded.clamp(MIN_ZOOM, MAX_ZOOM))
    }

    pub fn level(self) -> f64 {
        self.0
    }

    /// Moves `steps` increments of 0.1, positive zooms in
    pub fn stepped(self, steps: i32) -> Self {
        Self::new(self.0 + ZOOM_STEP * f64::from(steps))
    }
}

/// Where the widget's top-left corner is
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Position {
    /// Pinned to the viewport's bottom-right by the stylesheet
    Anchored,
    /// Explicit left/top in viewport pixels; bottom/right are cleared
    Explicit { left: f64, top: f64 },
}

/// Position plus unscaled size
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub position: Position,
    pub size: Size,
}

impl Default for Frame {
    fn default() -> Self {
        Self {
            position: Position::Anchored,
            size: Size::new(DEFAULT_WIDGET_WIDTH, DEFAULT_WIDGET_HEIGHT),
        }
    }
}

impl Frame {
    /// Applies whatever parts of a stored record are readable
    pub fn restore(stored: &StoredGeometry) -> Self {
        let mut frame = Self::default();
        if let Some(width) = parse_px(&stored.width) {
            frame.size.width = width;
        }
        if let Some(height) = parse_px(&stored.height) {
            frame.size.height = height;
        }
        if let (Some(left), Some(top)) = (parse_px(&stored.left), parse_px(&stored.top)) {
            frame.position = Position::Explicit { left, top };
        }
        frame
    }

    /// The record written to local storage; anchored position stores empty strings
    pub fn to_stored(&self) -> StoredGeometry {
        let (left, top) = match self.position {
            Position::Anchored => (String::new(), String::new()),
            Position::Explicit { left, top } => (px(left), px(top)),
        };
        StoredGeometry {
            left,
            top,
            width: px(self.size.width),
            height: px(self.size.height),
        }
    }
}

/// An active header drag
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragSession {
    start_pointer: Point,
    start_origin: Point,
}

impl DragSession {
    /// `origin` is the widget's on-screen top-left when the press happened
    pub fn new(pointer: Point, origin: Point) -> Self {
        Self {
            start_pointer: pointer,
            start_origin: origin,
        }
    }

    /// New left/top keeping the zoomed widget inside `viewport`
    pub fn position_at(&self, pointer: Point, size: Size, zoom: Zoom, viewport: Size) -> Position {
        let left = self.start_origin.x + (pointer.x - self.start_pointer.x);
        let top = self.start_origin.y + (pointer.y - self.start_pointer.y);
        let max_left = (viewport.width - size.width * zoom.level()).max(0.0);
        let max_top = (viewport.height - size.height * zoom.level()).max(0.0);
        Position::Explicit {
            left: left.clamp(0.0, max_left),
            top: top.clamp(0.0, max_top),
        }
    }
}

/// An active corner-handle resize
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResizeSession {
    start_pointer: Point,
    start_size: Size,
}

impl ResizeSession {
    pub fn new(pointer: Point, size: Size) -> Self {
        Self {
            start_pointer: pointer,
            start_size: size,
        }
    }

    /// Pointer movement is divided by the zoom so the edge tracks the cursor
    pub fn size_at(&self, pointer: Point, zoom: Zoom) -> Size {
        let dx = (pointer.x - self.start_pointer.x) / zoom.level();
        let dy = (pointer.y - self.start_pointer.y) / zoom.level();
        Size::new(
            (self.start_size.width + dx).max(MIN_WIDGET_WIDTH),
            (self.start_size.height + dy).max(MIN_WIDGET_HEIGHT),
        )
    }
}

pub fn px(value: f64) -> String {
    format!("{}px", value)
}

/// Parses `"123.5px"` (or a bare number); anything else reads as absent
pub fn parse_px(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    let number = trimmed.strip_suffix("px").unwrap_or(trimmed).trim();
    number.parse::<f64>().ok().filter(|n| n.is_finite())
}
