//! Vertex attribute reading.
//!
//! Positions and texture coordinates come out quantized to 16 bits together
//! with the parameters needed to reconstruct them. Normals come out
//! oct-encoded. Every reader returns `None` when the attribute is absent or
//! stored in an encoding it does not accept.

use glam::{DVec2, DVec3, Vec3};
use log::trace;
use tile_core::{OctEncodedNormal, QParams2d, QParams3d, QPoint2dList, QPoint3dList, Range2d, Range3d};

use crate::buffer_view::{BufferView, BufferViewResolver, ComponentType};
use crate::draco::DecodedMesh;
use crate::mesh::MeshIndices;
use crate::schema::{GltfId, Primitive, PrimitiveMode, QuantizedAttributes};

pub const ATTRIBUTE_POSITION: &str = "POSITION";
pub const ATTRIBUTE_NORMAL: &str = "NORMAL";
pub const ATTRIBUTE_TEXCOORD: &str = "TEXCOORD_0";

/// Quantized positions and their tight range.
#[derive(Debug, Clone, PartialEq)]
pub struct Positions {
    pub points: QPoint3dList,
    pub range: Range3d,
}

fn quantize_points(points: &[DVec3], params: QParams3d, range: Range3d) -> Positions {
    let mut list = QPoint3dList::with_capacity(params, points.len());
    for point in points {
        list.push_quantized(params.quantize_clamped(*point));
    }
    Positions {
        points: list,
        range,
    }
}

/// Reads primitive attributes through a buffer view resolver.
pub struct AttributeReader<'a> {
    views: BufferViewResolver<'a>,
    pseudo_rtc_bias: Option<DVec3>,
}

impl<'a> AttributeReader<'a> {
    /// `pseudo_rtc_bias` is subtracted from every position read.
    pub fn new(views: BufferViewResolver<'a>, pseudo_rtc_bias: Option<DVec3>) -> Self {
        Self {
            views,
            pseudo_rtc_bias,
        }
    }

    fn bias(&self) -> DVec3 {
        self.pseudo_rtc_bias.unwrap_or(DVec3::ZERO)
    }

    fn decode_range(&self, accessor_id: &GltfId) -> Option<&'a QuantizedAttributes> {
        self.views
            .document()
            .accessors
            .get(accessor_id)?
            .quantized_attributes()
    }

    fn view<'p>(
        &self,
        primitive: &'p Primitive,
        semantic: &str,
    ) -> Option<(BufferView<'a>, &'p GltfId)> {
        let id = primitive.attributes.get(semantic)?;
        Some((self.views.resolve(id)?, id))
    }

    /// Read positions as float or as pre-quantized unsigned shorts.
    pub fn read_positions(&self, primitive: &Primitive) -> Option<Positions> {
        let (view, id) = self.view(primitive, ATTRIBUTE_POSITION)?;
        if view.components < 3 || view.count == 0 {
            return None;
        }

        if let Some(data) = view.as_f32() {
            let bias = self.bias();
            let points: Vec<DVec3> = (0..data.count)
                .map(|i| {
                    DVec3::new(
                        data.get(i, 0).unwrap_or_default() as f64,
                        data.get(i, 1).unwrap_or_default() as f64,
                        data.get(i, 2).unwrap_or_default() as f64,
                    ) - bias
                })
                .collect();
            let range = Range3d::from_points(points.iter().copied());
            return Some(quantize_points(&points, QParams3d::from_range(&range), range));
        }

        if view.component_type != ComponentType::UnsignedShort {
            trace!("positions stored as {:?} are not supported", view.component_type);
            return None;
        }
        let decode = self.decode_range(id)?;
        if decode.decoded_min.len() < 3 || decode.decoded_max.len() < 3 {
            return None;
        }
        let data = view.as_u16()?;
        let range = Range3d::from_corners(
            DVec3::from_slice(&decode.decoded_min[..3]),
            DVec3::from_slice(&decode.decoded_max[..3]),
        )
        .offset(-self.bias());

        let mut quantized = Vec::with_capacity(data.count * 3);
        for i in 0..data.count {
            for c in 0..3 {
                quantized.push(data.get(i, c)?);
            }
        }
        let points = QPoint3dList::from_quantized(QParams3d::from_range(&range), quantized)?;
        Some(Positions { points, range })
    }

    /// Read normals as float vectors or as pre-encoded byte pairs.
    pub fn read_normals(&self, primitive: &Primitive, vertex_count: usize) -> Option<Vec<OctEncodedNormal>> {
        let (view, _) = self.view(primitive, ATTRIBUTE_NORMAL)?;
        if view.count != vertex_count {
            return None;
        }

        if view.components >= 3 {
            let data = view.as_f32()?;
            return (0..data.count)
                .map(|i| {
                    Some(OctEncodedNormal::encode(Vec3::new(
                        data.get(i, 0)?,
                        data.get(i, 1)?,
                        data.get(i, 2)?,
                    )))
                })
                .collect();
        }

        if view.components == 2 {
            let data = view.as_u8()?;
            return (0..data.count)
                .map(|i| Some(OctEncodedNormal::from_bytes(data.get(i, 0)?, data.get(i, 1)?)))
                .collect();
        }
        None
    }

    /// Read texture coordinates as float or as pre-quantized unsigned shorts.
    pub fn read_uvs(&self, primitive: &Primitive, vertex_count: usize) -> Option<QPoint2dList> {
        let (view, id) = self.view(primitive, ATTRIBUTE_TEXCOORD)?;
        if view.count != vertex_count || view.components < 2 {
            return None;
        }

        if let Some(data) = view.as_f32() {
            let points: Option<Vec<DVec2>> = (0..data.count)
                .map(|i| Some(DVec2::new(data.get(i, 0)? as f64, data.get(i, 1)? as f64)))
                .collect();
            return Some(QPoint2dList::from_points(&points?));
        }

        if view.component_type != ComponentType::UnsignedShort {
            return None;
        }
        let decode = self.decode_range(id)?;
        if decode.decoded_min.len() < 2 || decode.decoded_max.len() < 2 {
            return None;
        }
        let data = view.as_u16()?;
        let range = Range2d::from_corners(
            DVec2::from_slice(&decode.decoded_min[..2]),
            DVec2::from_slice(&decode.decoded_max[..2]),
        );
        let mut quantized = Vec::with_capacity(data.count * 2);
        for i in 0..data.count {
            quantized.push(data.get(i, 0)?);
            quantized.push(data.get(i, 1)?);
        }
        QPoint2dList::from_quantized(QParams2d::from_range(&range), quantized)
    }

    /// Read the index list, or synthesize one for non-indexed primitives.
    ///
    /// Non-indexed triangles need a vertex count divisible by three.
    pub fn read_indices(
        &self,
        primitive: &Primitive,
        mode: PrimitiveMode,
        vertex_count: usize,
    ) -> Option<MeshIndices> {
        let Some(id) = &primitive.indices else {
            if mode == PrimitiveMode::Triangles && vertex_count % 3 != 0 {
                trace!("{} non-indexed vertices do not form triangles", vertex_count);
                return None;
            }
            return MeshIndices::sequential(vertex_count);
        };

        let view = self.views.resolve(id)?;
        let indices = if let Some(data) = view.as_u16() {
            MeshIndices::U16((0..data.count).map(|i| data.get(i, 0)).collect::<Option<_>>()?)
        } else {
            let data = view.as_u32()?;
            MeshIndices::from_u32((0..data.count).map(|i| data.get(i, 0)).collect::<Option<_>>()?)
        };

        if indices.iter().any(|i| i as usize >= vertex_count) {
            trace!("index out of range for {} vertices", vertex_count);
            return None;
        }
        Some(indices)
    }
}

/// Attributes taken from a decompressed mesh.
pub struct DecodedAttributes {
    pub positions: Positions,
    pub normals: Option<Vec<OctEncodedNormal>>,
    pub uvs: Option<QPoint2dList>,
    pub indices: MeshIndices,
}

/// Quantize a decompressed mesh.
///
/// The codec's bounding box supplies the quantization parameters when it
/// encloses every position. The reported range is always the tight one.
pub fn read_decoded(mesh: &DecodedMesh, pseudo_rtc_bias: Option<DVec3>) -> DecodedAttributes {
    let bias = pseudo_rtc_bias.unwrap_or(DVec3::ZERO);
    let points: Vec<DVec3> = mesh
        .positions
        .iter()
        .map(|p| DVec3::new(p[0] as f64, p[1] as f64, p[2] as f64) - bias)
        .collect();

    let range = Range3d::from_points(points.iter().copied());
    let params_range = match mesh.bounding_box.map(|b| b.offset(-bias)) {
        Some(hint) if points.iter().all(|&p| hint.contains_point(p)) => hint,
        _ => range,
    };

    let normals = mesh.normals.as_ref().map(|normals| {
        normals
            .iter()
            .map(|n| OctEncodedNormal::encode(Vec3::from_array(*n)))
            .collect()
    });
    let uvs = mesh.uvs.as_ref().map(|uvs| {
        let points: Vec<DVec2> = uvs
            .iter()
            .map(|uv| DVec2::new(uv[0] as f64, uv[1] as f64))
            .collect();
        QPoint2dList::from_points(&points)
    });

    DecodedAttributes {
        positions: quantize_points(&points, QParams3d::from_range(&params_range), range),
        normals,
        uvs,
        indices: MeshIndices::from_u32(mesh.indices.clone()),
    }
}
