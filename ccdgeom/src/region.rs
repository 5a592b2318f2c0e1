//! Rectangular pixel regions with half-open bounds.
//!
//! `x` is the column axis and `y` the row axis, matching ndarray's
//! `[row, col]` indexing: a region slices an image as
//! `image.slice(s![region.y_range(), region.x_range()])`.

use serde::{Deserialize, Serialize};
use std::ops::Range;

/// A rectangular region of pixels.
///
/// Bounds are half-open: the region covers columns `x0..x0 + width` and
/// rows `y0..y0 + height`. A zero-extent region is empty and contains no
/// pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    /// Leftmost column (inclusive).
    pub x0: usize,
    /// Topmost row (inclusive).
    pub y0: usize,
    /// Extent in columns.
    pub width: usize,
    /// Extent in rows.
    pub height: usize,
}

impl Region {
    /// Create a region from its origin and extent.
    pub const fn new(x0: usize, y0: usize, width: usize, height: usize) -> Self {
        Self {
            x0,
            y0,
            width,
            height,
        }
    }

    /// An empty region at the origin.
    pub const fn empty() -> Self {
        Self::new(0, 0, 0, 0)
    }

    /// One past the rightmost column.
    pub fn x1(&self) -> usize {
        self.x0 + self.width
    }

    /// One past the bottommost row.
    pub fn y1(&self) -> usize {
        self.y0 + self.height
    }

    /// Column range, suitable for ndarray slicing.
    pub fn x_range(&self) -> Range<usize> {
        self.x0..self.x1()
    }

    /// Row range, suitable for ndarray slicing.
    pub fn y_range(&self) -> Range<usize> {
        self.y0..self.y1()
    }

    /// Number of pixels covered.
    pub fn area(&self) -> usize {
        self.width * self.height
    }

    /// True if the region covers no pixels.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// True if the pixel at column `x`, row `y` lies inside the region.
    pub fn contains(&self, x: usize, y: usize) -> bool {
        x >= self.x0 && x < self.x1() && y >= self.y0 && y < self.y1()
    }

    /// True if `other` lies entirely inside this region.
    ///
    /// An empty `other` is contained by any region.
    pub fn contains_region(&self, other: &Self) -> bool {
        other.is_empty()
            || (other.x0 >= self.x0
                && other.x1() <= self.x1()
                && other.y0 >= self.y0
                && other.y1() <= self.y1())
    }

    /// True if the two regions share at least one pixel.
    pub fn overlaps(&self, other: &Self) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.x0 < other.x1()
            && other.x0 < self.x1()
            && self.y0 < other.y1()
            && other.y0 < self.y1()
    }

    /// The overlapping region, or `None` if the regions are disjoint.
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        if !self.overlaps(other) {
            return None;
        }
        let x0 = self.x0.max(other.x0);
        let y0 = self.y0.max(other.y0);
        let x1 = self.x1().min(other.x1());
        let y1 = self.y1().min(other.y1());
        Some(Self::new(x0, y0, x1 - x0, y1 - y0))
    }
}
