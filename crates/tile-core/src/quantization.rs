//! 16-bit fixed-point quantization of 2D and 3D coordinates.
//!
//! A coordinate `p` inside a range is stored as
//! `q = floor(0.5 + (p - origin) * scale)` with `scale = QUANTIZED_MAX / extent`
//! per axis, and reconstructed as `origin + q / scale`. An axis with zero
//! extent has zero scale: every value quantizes to 0 and reconstructs to the
//! origin.

use glam::{DVec2, DVec3};

use crate::range::{Range2d, Range3d};

/// Largest quantized value.
pub const QUANTIZED_MAX: u16 = u16::MAX;

fn compute_scale(extent: f64) -> f64 {
    if extent == 0.0 {
        0.0
    } else {
        QUANTIZED_MAX as f64 / extent
    }
}

/// Quantize a single component. Returns `None` if the value falls outside
/// the quantizable range by more than half a step.
fn quantize_component(value: f64, origin: f64, scale: f64) -> Option<u16> {
    if scale == 0.0 {
        return Some(0);
    }
    let q = (0.5 + (value - origin) * scale).floor();
    if (0.0..=QUANTIZED_MAX as f64).contains(&q) {
        Some(q as u16)
    } else {
        None
    }
}

fn clamp_component(value: f64, origin: f64, scale: f64) -> u16 {
    if scale == 0.0 {
        return 0;
    }
    (0.5 + (value - origin) * scale)
        .floor()
        .clamp(0.0, QUANTIZED_MAX as f64) as u16
}

fn unquantize_component(q: u16, origin: f64, scale: f64) -> f64 {
    if scale == 0.0 {
        origin
    } else {
        origin + q as f64 / scale
    }
}

/// Parameters for quantizing 3D points.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct QParams3d {
    pub origin: DVec3,
    pub scale: DVec3,
}

impl QParams3d {
    /// Parameters mapping `range` onto the full 16-bit domain.
    ///
    /// A null range yields zero origin and zero scale.
    pub fn from_range(range: &Range3d) -> Self {
        if range.is_null() {
            return Self {
                origin: DVec3::ZERO,
                scale: DVec3::ZERO,
            };
        }
        let extent = range.diagonal();
        Self {
            origin: range.low,
            scale: DVec3::new(
                compute_scale(extent.x),
                compute_scale(extent.y),
                compute_scale(extent.z),
            ),
        }
    }

    /// Quantize a point, or `None` if it lies outside the parameters' range.
    pub fn quantize(&self, point: DVec3) -> Option<[u16; 3]> {
        Some([
            quantize_component(point.x, self.origin.x, self.scale.x)?,
            quantize_component(point.y, self.origin.y, self.scale.y)?,
            quantize_component(point.z, self.origin.z, self.scale.z)?,
        ])
    }

    /// Quantize a point, clamping components outside the range.
    pub fn quantize_clamped(&self, point: DVec3) -> [u16; 3] {
        [
            clamp_component(point.x, self.origin.x, self.scale.x),
            clamp_component(point.y, self.origin.y, self.scale.y),
            clamp_component(point.z, self.origin.z, self.scale.z),
        ]
    }

    pub fn unquantize(&self, q: [u16; 3]) -> DVec3 {
        DVec3::new(
            unquantize_component(q[0], self.origin.x, self.scale.x),
            unquantize_component(q[1], self.origin.y, self.scale.y),
            unquantize_component(q[2], self.origin.z, self.scale.z),
        )
    }

    /// The range covered by the full quantized domain.
    pub fn compute_range(&self) -> Range3d {
        Range3d::from_corners(
            self.unquantize([0, 0, 0]),
            self.unquantize([QUANTIZED_MAX; 3]),
        )
    }
}

/// Parameters for quantizing 2D points (texture coordinates).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct QParams2d {
    pub origin: DVec2,
    pub scale: DVec2,
}

impl QParams2d {
    pub fn from_range(range: &Range2d) -> Self {
        if range.is_null() {
            return Self {
                origin: DVec2::ZERO,
                scale: DVec2::ZERO,
            };
        }
        let extent = range.diagonal();
        Self {
            origin: range.low,
            scale: DVec2::new(compute_scale(extent.x), compute_scale(extent.y)),
        }
    }

    pub fn quantize(&self, point: DVec2) -> Option<[u16; 2]> {
        Some([
            quantize_component(point.x, self.origin.x, self.scale.x)?,
            quantize_component(point.y, self.origin.y, self.scale.y)?,
        ])
    }

    pub fn quantize_clamped(&self, point: DVec2) -> [u16; 2] {
        [
            clamp_component(point.x, self.origin.x, self.scale.x),
            clamp_component(point.y, self.origin.y, self.scale.y),
        ]
    }

    pub fn unquantize(&self, q: [u16; 2]) -> DVec2 {
        DVec2::new(
            unquantize_component(q[0], self.origin.x, self.scale.x),
            unquantize_component(q[1], self.origin.y, self.scale.y),
        )
    }

    pub fn compute_range(&self) -> Range2d {
        Range2d::from_corners(self.unquantize([0, 0]), self.unquantize([QUANTIZED_MAX; 2]))
    }
}

/// A flat buffer of quantized 3D points (three `u16` per point).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct QPoint3dList {
    pub params: QParams3d,
    points: Vec<u16>,
}

impl QPoint3dList {
    pub fn new(params: QParams3d) -> Self {
        Self {
            params,
            points: Vec::new(),
        }
    }

    pub fn with_capacity(params: QParams3d, capacity: usize) -> Self {
        Self {
            params,
            points: Vec::with_capacity(capacity * 3),
        }
    }

    /// Quantize `points` with parameters computed from their tight range.
    pub fn from_points(points: &[DVec3]) -> Self {
        let params = QParams3d::from_range(&Range3d::from_points(points.iter().copied()));
        let mut list = Self::with_capacity(params, points.len());
        for point in points {
            list.push_quantized(params.quantize_clamped(*point));
        }
        list
    }

    /// Wrap already-quantized coordinates. Returns `None` unless the
    /// buffer length is a multiple of three.
    pub fn from_quantized(params: QParams3d, points: Vec<u16>) -> Option<Self> {
        (points.len() % 3 == 0).then_some(Self { params, points })
    }

    pub fn push_quantized(&mut self, q: [u16; 3]) {
        self.points.extend_from_slice(&q);
    }

    pub fn len(&self) -> usize {
        self.points.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<[u16; 3]> {
        let start = index * 3;
        self.points
            .get(start..start + 3)
            .map(|p| [p[0], p[1], p[2]])
    }

    pub fn unquantize(&self, index: usize) -> Option<DVec3> {
        self.get(index).map(|q| self.params.unquantize(q))
    }

    /// The raw interleaved coordinates.
    pub fn as_slice(&self) -> &[u16] {
        &self.points
    }

    /// The tight range of the stored points, in unquantized space.
    pub fn compute_range(&self) -> Range3d {
        Range3d::from_points((0..self.len()).filter_map(|i| self.unquantize(i)))
    }
}

/// A flat buffer of quantized 2D points (two `u16` per point).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct QPoint2dList {
    pub params: QParams2d,
    points: Vec<u16>,
}

impl QPoint2dList {
    pub fn new(params: QParams2d) -> Self {
        Self {
            params,
            points: Vec::new(),
        }
    }

    pub fn from_points(points: &[DVec2]) -> Self {
        let params = QParams2d::from_range(&Range2d::from_points(points.iter().copied()));
        let mut list = Self::new(params);
        list.points.reserve(points.len() * 2);
        for point in points {
            list.push_quantized(params.quantize_clamped(*point));
        }
        list
    }

    pub fn from_quantized(params: QParams2d, points: Vec<u16>) -> Option<Self> {
        (points.len() % 2 == 0).then_some(Self { params, points })
    }

    pub fn push_quantized(&mut self, q: [u16; 2]) {
        self.points.extend_from_slice(&q);
    }

    pub fn len(&self) -> usize {
        self.points.len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<[u16; 2]> {
        let start = index * 2;
        self.points.get(start..start + 2).map(|p| [p[0], p[1]])
    }

    pub fn unquantize(&self, index: usize) -> Option<DVec2> {
        self.get(index).map(|q| self.params.unquantize(q))
    }

    pub fn as_slice(&self) -> &[u16] {
        &self.points
    }
}
