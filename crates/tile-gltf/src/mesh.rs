//! Mesh assembly.
//!
//! Turns one glTF primitive into a [`MeshData`]: quantized positions,
//! optional normals and texture coordinates, and a topology with its
//! indices. Compressed primitives take their attributes from the
//! [`DracoCache`] instead of from accessors.

use glam::DVec3;
use log::debug;
use tile_core::{OctEncodedNormal, QPoint2dList, QPoint3dList, Range3d};

use crate::attributes::{read_decoded, AttributeReader};
use crate::draco::DracoCache;
use crate::schema::{Primitive, PrimitiveMode};

/// Vertex indices in the narrowest width that holds them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeshIndices {
    U16(Vec<u16>),
    U32(Vec<u32>),
}

impl MeshIndices {
    /// Narrow to 16 bits when every index fits.
    pub fn from_u32(indices: Vec<u32>) -> Self {
        if indices.iter().all(|&i| i <= u16::MAX as u32) {
            MeshIndices::U16(indices.into_iter().map(|i| i as u16).collect())
        } else {
            MeshIndices::U32(indices)
        }
    }

    /// `0..count`, or `None` for an empty list.
    pub fn sequential(count: usize) -> Option<Self> {
        if count == 0 || count > u32::MAX as usize {
            return None;
        }
        Some(Self::from_u32((0..count as u32).collect()))
    }

    pub fn len(&self) -> usize {
        match self {
            MeshIndices::U16(indices) => indices.len(),
            MeshIndices::U32(indices) => indices.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<u32> {
        match self {
            MeshIndices::U16(indices) => indices.get(index).map(|&i| i as u32),
            MeshIndices::U32(indices) => indices.get(index).copied(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.len()).filter_map(move |i| self.get(i))
    }

    pub fn to_u32(&self) -> Vec<u32> {
        self.iter().collect()
    }
}

/// How a mesh's vertices are connected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeshTopology {
    Triangles(MeshIndices),
    /// Each entry is one connected line string.
    Polylines(Vec<Vec<u32>>),
    Points(Vec<u32>),
}

/// A decoded primitive ready for the renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    pub topology: MeshTopology,
    pub points: QPoint3dList,
    /// One per vertex.
    pub normals: Option<Vec<OctEncodedNormal>>,
    /// One per vertex.
    pub uvs: Option<QPoint2dList>,
    /// Tight range of the positions in mesh coordinates.
    pub range: Range3d,
}

impl MeshData {
    pub fn vertex_count(&self) -> usize {
        self.points.len()
    }

    pub fn triangle_count(&self) -> usize {
        match &self.topology {
            MeshTopology::Triangles(indices) => indices.len() / 3,
            _ => 0,
        }
    }

    /// Give every triangle corner its own vertex.
    ///
    /// Indices become `0..n`. Has no effect on lines and points.
    pub fn deduplicate_vertices(&mut self) {
        let MeshTopology::Triangles(indices) = &self.topology else {
            return;
        };
        let order = indices.to_u32();

        let mut points = QPoint3dList::with_capacity(self.points.params, order.len());
        for &i in &order {
            if let Some(q) = self.points.get(i as usize) {
                points.push_quantized(q);
            }
        }

        let normals = self.normals.as_ref().map(|normals| {
            order
                .iter()
                .filter_map(|&i| normals.get(i as usize).copied())
                .collect()
        });

        let uvs = self.uvs.as_ref().map(|uvs| {
            let mut expanded = QPoint2dList::new(uvs.params);
            for &i in &order {
                if let Some(q) = uvs.get(i as usize) {
                    expanded.push_quantized(q);
                }
            }
            expanded
        });

        if let Some(indices) = MeshIndices::sequential(order.len()) {
            self.topology = MeshTopology::Triangles(indices);
        }
        self.points = points;
        self.normals = normals;
        self.uvs = uvs;
    }
}

fn topology(mode: PrimitiveMode, indices: MeshIndices) -> Option<MeshTopology> {
    match mode {
        PrimitiveMode::Triangles => {
            if indices.is_empty() || indices.len() % 3 != 0 {
                return None;
            }
            Some(MeshTopology::Triangles(indices))
        }
        PrimitiveMode::Lines => {
            let segments: Vec<Vec<u32>> = indices
                .to_u32()
                .chunks_exact(2)
                .map(<[u32]>::to_vec)
                .collect();
            (!segments.is_empty()).then_some(MeshTopology::Polylines(segments))
        }
        PrimitiveMode::LineStrip => {
            (indices.len() >= 2).then(|| MeshTopology::Polylines(vec![indices.to_u32()]))
        }
        PrimitiveMode::Points => Some(MeshTopology::Points(indices.to_u32())),
        _ => None,
    }
}

/// Builds [`MeshData`] from primitives.
pub struct PrimitiveAssembler<'a> {
    attributes: AttributeReader<'a>,
    draco: &'a DracoCache,
    pseudo_rtc_bias: Option<DVec3>,
}

impl<'a> PrimitiveAssembler<'a> {
    pub fn new(
        attributes: AttributeReader<'a>,
        draco: &'a DracoCache,
        pseudo_rtc_bias: Option<DVec3>,
    ) -> Self {
        Self {
            attributes,
            draco,
            pseudo_rtc_bias,
        }
    }

    /// Assemble a primitive, or `None` if it cannot be read.
    pub fn read_primitive(&self, primitive: &Primitive) -> Option<MeshData> {
        let Some(mode) = primitive.mode() else {
            debug!("primitive mode {} is not valid", primitive.mode);
            return None;
        };

        let mesh = if primitive.draco_extension().is_some() {
            self.read_compressed(primitive)
        } else {
            self.read_uncompressed(primitive, mode)
        };
        if mesh.is_none() {
            debug!("dropping {:?} primitive", mode);
        }
        mesh
    }

    fn read_compressed(&self, primitive: &Primitive) -> Option<MeshData> {
        let decoded = read_decoded(self.draco.get(primitive)?, self.pseudo_rtc_bias);
        Some(MeshData {
            topology: topology(PrimitiveMode::Triangles, decoded.indices)?,
            points: decoded.positions.points,
            normals: decoded.normals,
            uvs: decoded.uvs,
            range: decoded.positions.range,
        })
    }

    fn read_uncompressed(&self, primitive: &Primitive, mode: PrimitiveMode) -> Option<MeshData> {
        let positions = self.attributes.read_positions(primitive)?;
        let vertex_count = positions.points.len();
        let indices = self.attributes.read_indices(primitive, mode, vertex_count)?;
        let topology = topology(mode, indices)?;

        let (normals, uvs) = if matches!(topology, MeshTopology::Triangles(_)) {
            (
                self.attributes.read_normals(primitive, vertex_count),
                self.attributes.read_uvs(primitive, vertex_count),
            )
        } else {
            (None, None)
        };

        Some(MeshData {
            topology,
            points: positions.points,
            normals,
            uvs,
            range: positions.range,
        })
    }
}
