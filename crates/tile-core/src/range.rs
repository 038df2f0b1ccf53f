//! Axis-aligned bounding ranges.

use glam::{DAffine3, DVec2, DVec3};

/// A 3D axis-aligned range in double precision.
///
/// A freshly created range is *null*: its low corner is larger than its high
/// corner, so extending it by any point yields a range containing exactly
/// that point.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Range3d {
    pub low: DVec3,
    pub high: DVec3,
}

impl Default for Range3d {
    fn default() -> Self {
        Self::null()
    }
}

impl Range3d {
    /// Create a null range.
    pub const fn null() -> Self {
        Self {
            low: DVec3::splat(f64::MAX),
            high: DVec3::splat(-f64::MAX),
        }
    }

    /// Create a range from two corners, in any order.
    pub fn from_corners(a: DVec3, b: DVec3) -> Self {
        Self {
            low: a.min(b),
            high: a.max(b),
        }
    }

    /// Create the tightest range containing all points.
    pub fn from_points(points: impl IntoIterator<Item = DVec3>) -> Self {
        let mut range = Self::null();
        for point in points {
            range.extend_point(point);
        }
        range
    }

    /// True if the range contains no points.
    pub fn is_null(&self) -> bool {
        self.low.x > self.high.x || self.low.y > self.high.y || self.low.z > self.high.z
    }

    pub fn extend_point(&mut self, point: DVec3) {
        self.low = self.low.min(point);
        self.high = self.high.max(point);
    }

    pub fn extend_range(&mut self, other: &Range3d) {
        if !other.is_null() {
            self.extend_point(other.low);
            self.extend_point(other.high);
        }
    }

    /// Extent along each axis. Zero for a null range.
    pub fn diagonal(&self) -> DVec3 {
        if self.is_null() {
            DVec3::ZERO
        } else {
            self.high - self.low
        }
    }

    pub fn contains_point(&self, point: DVec3) -> bool {
        point.cmpge(self.low).all() && point.cmple(self.high).all()
    }

    /// Translate both corners by `offset`.
    pub fn offset(&self, offset: DVec3) -> Self {
        if self.is_null() {
            return *self;
        }
        Self {
            low: self.low + offset,
            high: self.high + offset,
        }
    }

    /// The range of the eight transformed corners.
    pub fn transformed(&self, transform: &DAffine3) -> Self {
        if self.is_null() {
            return *self;
        }

        let mut result = Self::null();
        for i in 0..8 {
            let corner = DVec3::new(
                if i & 1 == 0 { self.low.x } else { self.high.x },
                if i & 2 == 0 { self.low.y } else { self.high.y },
                if i & 4 == 0 { self.low.z } else { self.high.z },
            );
            result.extend_point(transform.transform_point3(corner));
        }
        result
    }
}

/// A 2D axis-aligned range in double precision.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Range2d {
    pub low: DVec2,
    pub high: DVec2,
}

impl Default for Range2d {
    fn default() -> Self {
        Self::null()
    }
}

impl Range2d {
    /// Create a null range.
    pub const fn null() -> Self {
        Self {
            low: DVec2::splat(f64::MAX),
            high: DVec2::splat(-f64::MAX),
        }
    }

    pub fn from_corners(a: DVec2, b: DVec2) -> Self {
        Self {
            low: a.min(b),
            high: a.max(b),
        }
    }

    pub fn from_points(points: impl IntoIterator<Item = DVec2>) -> Self {
        let mut range = Self::null();
        for point in points {
            range.extend_point(point);
        }
        range
    }

    pub fn is_null(&self) -> bool {
        self.low.x > self.high.x || self.low.y > self.high.y
    }

    pub fn extend_point(&mut self, point: DVec2) {
        self.low = self.low.min(point);
        self.high = self.high.max(point);
    }

    pub fn diagonal(&self) -> DVec2 {
        if self.is_null() {
            DVec2::ZERO
        } else {
            self.high - self.low
        }
    }

    pub fn contains_point(&self, point: DVec2) -> bool {
        point.cmpge(self.low).all() && point.cmple(self.high).all()
    }
}
