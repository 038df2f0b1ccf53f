//! KHR_draco_mesh_compression support.
//!
//! The codec itself is supplied by the caller through [`MeshDecompressor`].
//! Each distinct compressed region is decoded at most once per read; the
//! result, success or failure, is shared by every primitive referencing it.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use futures::future::join_all;
use indexmap::IndexMap;
use log::{debug, warn};
use tile_core::Range3d;

use crate::buffer_view::BufferViewResolver;
use crate::error::{GltfError, Result};
use crate::schema::{DracoExtension, GltfId, Primitive, PrimitiveMode, EXT_DRACO};

/// A boxed future returning a decoded mesh.
pub type DecompressFuture<'a> = Pin<Box<dyn Future<Output = Result<DecodedMesh>> + Send + 'a>>;

/// Topology reported by the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DracoTopology {
    Triangles,
    PointCloud,
}

/// Raw output of a decompression backend.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedMesh {
    pub topology: DracoTopology,
    pub positions: Vec<[f32; 3]>,
    pub normals: Option<Vec<[f32; 3]>>,
    pub uvs: Option<Vec<[f32; 2]>>,
    pub indices: Vec<u32>,
    /// Bounds of `positions`, if the codec reports them.
    pub bounding_box: Option<Range3d>,
}

impl DecodedMesh {
    fn validate(self) -> Result<Self> {
        if self.topology != DracoTopology::Triangles {
            return Err(GltfError::Unsupported(format!("draco topology {:?}", self.topology)));
        }
        let vertex_count = self.positions.len();
        if vertex_count == 0 {
            return Err(GltfError::Decompression("no positions decoded".into()));
        }
        if self.indices.len() % 3 != 0 {
            return Err(GltfError::Decompression(format!(
                "{} indices do not form triangles",
                self.indices.len()
            )));
        }
        if self.indices.iter().any(|&i| i as usize >= vertex_count) {
            return Err(GltfError::Decompression("index out of range".into()));
        }
        if self.normals.as_ref().is_some_and(|n| n.len() != vertex_count)
            || self.uvs.as_ref().is_some_and(|uv| uv.len() != vertex_count)
        {
            return Err(GltfError::Decompression("attribute count mismatch".into()));
        }
        Ok(self)
    }
}

/// A mesh decompression backend.
///
/// `attributes` maps glTF semantics (`POSITION`, `NORMAL`, `TEXCOORD_0`,
/// `_BATCHID`) to the codec's attribute ids.
pub trait MeshDecompressor: Send + Sync {
    fn decode<'a>(&'a self, data: &'a [u8], attributes: &'a IndexMap<String, u32>) -> DecompressFuture<'a>;
}

/// Identifies one compressed region and the attributes requested from it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DracoKey {
    buffer_view: GltfId,
    attributes: Vec<(String, u32)>,
}

impl From<&DracoExtension> for DracoKey {
    fn from(extension: &DracoExtension) -> Self {
        Self {
            buffer_view: extension.buffer_view.clone(),
            attributes: extension
                .attributes
                .iter()
                .map(|(semantic, id)| (semantic.clone(), *id))
                .collect(),
        }
    }
}

/// Decoded meshes for one document, keyed by compressed region.
#[derive(Debug, Default)]
pub struct DracoCache {
    decoded: HashMap<DracoKey, Option<DecodedMesh>>,
}

impl DracoCache {
    /// Decode every compressed primitive in the document.
    ///
    /// Primitives that are not triangle lists fail without reaching the
    /// backend. Without a backend every compressed primitive fails.
    pub async fn decode_all(
        views: &BufferViewResolver<'_>,
        decompressor: Option<&dyn MeshDecompressor>,
        should_abort: &(dyn Fn() -> bool + Sync),
    ) -> Self {
        let mut cache = Self::default();
        let mut pending = Vec::new();

        for (_, mesh) in views.document().meshes.iter() {
            for primitive in &mesh.primitives {
                let Some(extension) = primitive.draco_extension() else {
                    continue;
                };
                let key = DracoKey::from(extension);
                if cache.decoded.contains_key(&key) {
                    continue;
                }
                if primitive.mode() != Some(PrimitiveMode::Triangles) {
                    debug!("draco primitive with mode {} is not supported", primitive.mode);
                    cache.decoded.insert(key, None);
                    continue;
                }
                let Some(decompressor) = decompressor else {
                    warn!("document uses {} but no decompressor is available", EXT_DRACO);
                    cache.decoded.insert(key, None);
                    continue;
                };
                let Some(data) = views.raw_view(&extension.buffer_view) else {
                    debug!("draco buffer view {} is unresolved", extension.buffer_view);
                    cache.decoded.insert(key, None);
                    continue;
                };

                // Reserve the slot so later primitives sharing the region do not decode it again.
                cache.decoded.insert(key.clone(), None);
                pending.push(async move {
                    if should_abort() {
                        return (key, None);
                    }
                    let decoded = decompressor
                        .decode(data, &extension.attributes)
                        .await
                        .and_then(DecodedMesh::validate);
                    match decoded {
                        Ok(mesh) => (key, Some(mesh)),
                        Err(e) => {
                            warn!("draco decode of buffer view {} failed: {}", key.buffer_view, e);
                            (key, None)
                        }
                    }
                });
            }
        }

        for (key, decoded) in join_all(pending).await {
            cache.decoded.insert(key, decoded);
        }
        cache
    }

    /// The decoded mesh for a compressed primitive, or `None` if decoding
    /// failed or the primitive is not compressed.
    pub fn get(&self, primitive: &Primitive) -> Option<&DecodedMesh> {
        let extension = primitive.draco_extension()?;
        self.decoded.get(&DracoKey::from(extension))?.as_ref()
    }

    pub fn len(&self) -> usize {
        self.decoded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoded.is_empty()
    }
}
