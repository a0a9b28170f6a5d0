//! Physical <-> logical coordinate mapping for the selected region.
//!
//! The selection UI reports rectangles in physical (scaled) pixels. Capture
//! and encoding work in logical pixels, so every edge is divided by the
//! display scale factor of the monitor the drag finished on. Rounding is
//! truncation toward zero on both directions, which keeps a physical round
//! trip within one pixel per edge.

use serde::{Deserialize, Serialize};

use crate::errors::RegionError;

/// A rectangle in physical screen pixels, as delivered by the selection UI.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhysicalRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl PhysicalRect {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Normalizes a drag gesture: the rectangle spanned by press and release
    /// points, whichever direction the user dragged.
    pub fn from_drag(start: (i32, i32), end: (i32, i32)) -> Self {
        Self {
            left: start.0.min(end.0),
            top: start.1.min(end.1),
            right: start.0.max(end.0),
            bottom: start.1.max(end.1),
        }
    }
}

/// The logical capture rectangle. Always non-empty, and each side fits in
/// an `i32`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    left: i32,
    top: i32,
    right: i32,
    bottom: i32,
}

impl Region {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Result<Self, RegionError> {
        let width = right as i64 - left as i64;
        let height = bottom as i64 - top as i64;
        if width <= 0 || height <= 0 {
            return Err(RegionError::Empty { width, height });
        }
        if width > i32::MAX as i64 || height > i32::MAX as i64 {
            return Err(RegionError::TooLarge { width, height });
        }
        Ok(Self {
            left,
            top,
            right,
            bottom,
        })
    }

    pub fn left(&self) -> i32 {
        self.left
    }

    pub fn top(&self) -> i32 {
        self.top
    }

    pub fn right(&self) -> i32 {
        self.right
    }

    pub fn bottom(&self) -> i32 {
        self.bottom
    }

    pub fn width(&self) -> u32 {
        (self.right - self.left) as u32
    }

    pub fn height(&self) -> u32 {
        (self.bottom - self.top) as u32
    }

    /// Width and height rounded down to even values, as 4:2:0 codecs require.
    /// Either may be zero for a one-pixel-wide region.
    pub fn even_size(&self) -> (u32, u32) {
        (round_down_to_even(self.width()), round_down_to_even(self.height()))
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({},{})-({},{}) {}x{}",
            self.left,
            self.top,
            self.right,
            self.bottom,
            self.width(),
            self.height()
        )
    }
}

pub fn round_down_to_even(n: u32) -> u32 {
    n & !1
}

fn check_scale(scale: f64) -> Result<f64, RegionError> {
    if !scale.is_finite() || scale <= 0.0 {
        return Err(RegionError::InvalidScale(scale));
    }
    Ok(scale)
}

/// Maps a physical rectangle to logical capture coordinates.
pub fn to_logical(rect: PhysicalRect, scale: f64) -> Result<Region, RegionError> {
    let scale = check_scale(scale)?;
    let map = |edge: i32| (edge as f64 / scale).trunc() as i32;
    Region::new(map(rect.left), map(rect.top), map(rect.right), map(rect.bottom))
}

/// Maps a logical region back to physical pixels, for positioning feedback UI.
pub fn to_physical(region: &Region, scale: f64) -> Result<PhysicalRect, RegionError> {
    let scale = check_scale(scale)?;
    let map = |edge: i32| (edge as f64 * scale).trunc() as i32;
    Ok(PhysicalRect::new(
        map(region.left),
        map(region.top),
        map(region.right),
        map(region.bottom),
    ))
}
