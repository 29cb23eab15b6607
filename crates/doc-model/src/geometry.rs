//! Screen-space / target-space coordinate mapping.
//!
//! Overlay elements live in screen-pixel space: origin at the top-left of the
//! rendered page, y growing downward. PDF pages use points with the origin at
//! the bottom-left and y growing upward. Everything here is a pure function of
//! the page's recorded screen size and its native size.

use serde::{Deserialize, Serialize};

/// Recorded on-screen pixel size of one page, 1-indexed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageGeometry {
    pub page_number: u32,
    pub screen_width: f64,
    pub screen_height: f64,
}

impl PageGeometry {
    pub fn new(page_number: u32, size: ScreenSize) -> Self {
        Self {
            page_number,
            screen_width: size.width,
            screen_height: size.height,
        }
    }

    pub fn size(&self) -> ScreenSize {
        ScreenSize {
            width: self.screen_width,
            height: self.screen_height,
        }
    }

    pub fn full_page(&self) -> ScreenRect {
        ScreenRect {
            x: 0.0,
            y: 0.0,
            width: self.screen_width,
            height: self.screen_height,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenSize {
    pub width: f64,
    pub height: f64,
}

impl ScreenSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// True when both sides are finite and strictly positive.
    pub fn is_valid(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle in screen pixels, top-left origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ScreenRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Native page size in target units (PDF points).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetSize {
    pub width: f64,
    pub height: f64,
}

impl TargetSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub const LETTER: TargetSize = TargetSize {
        width: 612.0,
        height: 792.0,
    };
}

/// Rectangle in target units, bottom-left origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl TargetBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn top(&self) -> f64 {
        self.y + self.height
    }
}

/// Per-axis scale factors from screen pixels to target units for one page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageTransform {
    geometry: PageGeometry,
    target: TargetSize,
}

impl PageTransform {
    pub fn new(geometry: PageGeometry, target: TargetSize) -> Self {
        Self { geometry, target }
    }

    pub fn scale_x(&self) -> f64 {
        self.target.width / self.geometry.screen_width
    }

    pub fn scale_y(&self) -> f64 {
        self.target.height / self.geometry.screen_height
    }

    /// Uniform factor used for font sizes and stroke widths.
    pub fn uniform_scale(&self) -> f64 {
        self.scale_x().min(self.scale_y())
    }

    pub fn target(&self) -> TargetSize {
        self.target
    }

    pub fn to_target(&self, rect: &ScreenRect) -> TargetBox {
        to_target_space(rect, &self.geometry, self.target)
    }

    pub fn to_screen(&self, target_box: &TargetBox) -> ScreenRect {
        to_screen_space(target_box, &self.geometry, self.target)
    }
}

// Multiply before dividing so a full-page extent maps back onto the exact
// target size for the usual integral page dimensions.
fn rescale(value: f64, target: f64, screen: f64) -> f64 {
    value * target / screen
}

/// Maps a screen rectangle onto the target page. The result is not clamped.
pub fn to_target_space(
    rect: &ScreenRect,
    geometry: &PageGeometry,
    target: TargetSize,
) -> TargetBox {
    let x = rescale(rect.x, target.width, geometry.screen_width);
    let width = rescale(rect.width, target.width, geometry.screen_width);
    let top = rescale(rect.y, target.height, geometry.screen_height);
    let height = rescale(rect.height, target.height, geometry.screen_height);

    TargetBox {
        x,
        y: target.height - top - height,
        width,
        height,
    }
}

/// Inverse of [`to_target_space`].
pub fn to_screen_space(
    target_box: &TargetBox,
    geometry: &PageGeometry,
    target: TargetSize,
) -> ScreenRect {
    let width = rescale(target_box.width, geometry.screen_width, target.width);
    let height = rescale(target_box.height, geometry.screen_height, target.height);
    let x = rescale(target_box.x, geometry.screen_width, target.width);
    let y = rescale(target.height - target_box.top(), geometry.screen_height, target.height);

    ScreenRect {
        x,
        y,
        width,
        height,
    }
}
