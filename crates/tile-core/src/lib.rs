//! tile-core: geometric value types shared by tile decoders and renderers.
//!
//! Decoders produce geometry in a fixed-point representation: coordinates
//! are stored as 16-bit integers together with the origin and scale needed
//! to reconstruct them. This crate provides:
//!
//! - [`Range2d`] / [`Range3d`]: double-precision bounding ranges
//! - [`QParams2d`] / [`QParams3d`]: quantization parameters derived from a range
//! - [`QPoint2dList`] / [`QPoint3dList`]: quantized coordinate buffers
//! - [`OctEncodedNormal`]: 16-bit packed unit vectors
//! - [`ColorDef`]: 8-bit RGBA colors

pub mod color;
pub mod oct_normal;
pub mod quantization;
pub mod range;

pub use color::ColorDef;
pub use oct_normal::OctEncodedNormal;
pub use quantization::{QParams2d, QParams3d, QPoint2dList, QPoint3dList, QUANTIZED_MAX};
pub use range::{Range2d, Range3d};
