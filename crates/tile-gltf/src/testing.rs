//! Shared test fixtures: container builders, an in-memory fetcher, a mock
//! decompressor and a recording renderer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use bytemuck::Pod;
use glam::{DAffine3, DVec3};
use indexmap::IndexMap;
use tile_core::{ColorDef, Range3d};

use crate::container::{GLB_CHUNK_BIN, GLB_CHUNK_JSON, GLB_MAGIC};
use crate::draco::{DecompressFuture, DecodedMesh, DracoTopology, MeshDecompressor};
use crate::error::GltfError;
use crate::mesh::MeshTopology;
use crate::render::{MeshArgs, RenderSystem, TextureParams, TextureRequest};
use crate::resources::{FetchFuture, ResourceFetcher};
use crate::schema::{
    COMPONENT_FLOAT, COMPONENT_UNSIGNED_BYTE, COMPONENT_UNSIGNED_INT, COMPONENT_UNSIGNED_SHORT,
};

/// The eight-byte PNG signature.
pub const PNG_HEADER: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

fn pad_to_four(bytes: &mut Vec<u8>, fill: u8) {
    while bytes.len() % 4 != 0 {
        bytes.push(fill);
    }
}

/// A version 2 container with a JSON chunk and an optional binary chunk.
pub fn glb_v2(json: &[u8], bin: Option<&[u8]>) -> Vec<u8> {
    let mut json = json.to_vec();
    pad_to_four(&mut json, b' ');

    let mut glb = Vec::new();
    glb.extend_from_slice(&GLB_MAGIC.to_le_bytes());
    glb.extend_from_slice(&2u32.to_le_bytes());
    glb.extend_from_slice(&0u32.to_le_bytes());
    glb.extend_from_slice(&(json.len() as u32).to_le_bytes());
    glb.extend_from_slice(&GLB_CHUNK_JSON.to_le_bytes());
    glb.extend_from_slice(&json);

    if let Some(bin) = bin {
        let mut bin = bin.to_vec();
        pad_to_four(&mut bin, 0);
        glb.extend_from_slice(&(bin.len() as u32).to_le_bytes());
        glb.extend_from_slice(&GLB_CHUNK_BIN.to_le_bytes());
        glb.extend_from_slice(&bin);
    }

    let total = glb.len() as u32;
    glb[8..12].copy_from_slice(&total.to_le_bytes());
    glb
}

/// A version 1 container: 20-byte header, scene JSON, then the body.
pub fn glb_v1(json: &[u8], body: &[u8]) -> Vec<u8> {
    let mut glb = Vec::new();
    glb.extend_from_slice(&GLB_MAGIC.to_le_bytes());
    glb.extend_from_slice(&1u32.to_le_bytes());
    glb.extend_from_slice(&((20 + json.len() + body.len()) as u32).to_le_bytes());
    glb.extend_from_slice(&(json.len() as u32).to_le_bytes());
    glb.extend_from_slice(&0u32.to_le_bytes());
    glb.extend_from_slice(json);
    glb.extend_from_slice(body);
    glb
}

fn component_count(accessor_type: &str) -> usize {
    match accessor_type {
        "VEC2" => 2,
        "VEC3" => 3,
        "VEC4" => 4,
        _ => 1,
    }
}

/// Builds a glTF 2.0 document whose accessors share one binary buffer.
#[derive(Debug, Default)]
pub struct FixtureBuilder {
    bin: Vec<u8>,
    views: Vec<serde_json::Value>,
    accessors: Vec<serde_json::Value>,
}

impl FixtureBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push<T: Pod>(
        &mut self,
        data: &[T],
        component_type: u32,
        accessor_type: &str,
        extra: serde_json::Value,
    ) -> usize {
        pad_to_four(&mut self.bin, 0);
        let offset = self.bin.len();
        let bytes: &[u8] = bytemuck::cast_slice(data);
        self.bin.extend_from_slice(bytes);

        self.views.push(serde_json::json!({
            "buffer": 0,
            "byteOffset": offset,
            "byteLength": bytes.len()
        }));

        let mut accessor = serde_json::json!({
            "bufferView": self.views.len() - 1,
            "componentType": component_type,
            "count": data.len() / component_count(accessor_type),
            "type": accessor_type
        });
        if let (Some(target), serde_json::Value::Object(extra)) = (accessor.as_object_mut(), extra) {
            target.extend(extra);
        }
        self.accessors.push(accessor);
        self.accessors.len() - 1
    }

    pub fn push_f32(&mut self, data: &[f32], accessor_type: &str) -> usize {
        self.push(data, COMPONENT_FLOAT, accessor_type, serde_json::Value::Null)
    }

    pub fn push_u8(&mut self, data: &[u8], accessor_type: &str) -> usize {
        self.push(data, COMPONENT_UNSIGNED_BYTE, accessor_type, serde_json::Value::Null)
    }

    pub fn push_u16(&mut self, data: &[u16], accessor_type: &str) -> usize {
        self.push(data, COMPONENT_UNSIGNED_SHORT, accessor_type, serde_json::Value::Null)
    }

    pub fn push_u16_with(
        &mut self,
        data: &[u16],
        accessor_type: &str,
        extra: serde_json::Value,
    ) -> usize {
        self.push(data, COMPONENT_UNSIGNED_SHORT, accessor_type, extra)
    }

    pub fn push_u32(&mut self, data: &[u32], accessor_type: &str) -> usize {
        self.push(data, COMPONENT_UNSIGNED_INT, accessor_type, serde_json::Value::Null)
    }

    /// Raw bytes in their own buffer view, for images and compressed data.
    pub fn push_view(&mut self, bytes: &[u8]) -> usize {
        pad_to_four(&mut self.bin, 0);
        let offset = self.bin.len();
        self.bin.extend_from_slice(bytes);
        self.views.push(serde_json::json!({
            "buffer": 0,
            "byteOffset": offset,
            "byteLength": bytes.len()
        }));
        self.views.len() - 1
    }

    /// The document JSON, with `extra` merged in, and the binary buffer.
    pub fn finish(self, extra: serde_json::Value) -> (serde_json::Value, Vec<u8>) {
        let mut json = serde_json::json!({
            "asset": {"version": "2.0"},
            "buffers": [{"byteLength": self.bin.len()}],
            "bufferViews": self.views,
            "accessors": self.accessors
        });
        if let (Some(target), serde_json::Value::Object(extra)) = (json.as_object_mut(), extra) {
            target.extend(extra);
        }
        (json, self.bin)
    }

    /// A version 2 container holding the document and its buffer.
    pub fn glb(self, extra: serde_json::Value) -> Vec<u8> {
        let (json, bin) = self.finish(extra);
        let json = serde_json::to_vec(&json).unwrap();
        glb_v2(&json, Some(&bin))
    }
}

/// Serves fetches from a map and records every request.
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    files: HashMap<String, Vec<u8>>,
    requests: Mutex<Vec<String>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: &str, bytes: Vec<u8>) -> Self {
        self.files.insert(url.to_string(), bytes);
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl ResourceFetcher for MemoryFetcher {
    fn fetch(&self, url: &str) -> FetchFuture {
        self.requests.lock().unwrap().push(url.to_string());
        let result = self
            .files
            .get(url)
            .cloned()
            .ok_or_else(|| GltfError::fetch(url, "not found"));
        Box::pin(async move { result })
    }
}

/// A single triangle, as a codec would return it.
pub fn triangle_draco_mesh() -> DecodedMesh {
    DecodedMesh {
        topology: DracoTopology::Triangles,
        positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
        normals: Some(vec![[0.0, 0.0, 1.0]; 3]),
        uvs: None,
        indices: vec![0, 1, 2],
        bounding_box: Some(Range3d::from_corners(DVec3::ZERO, DVec3::new(1.0, 1.0, 0.0))),
    }
}

/// Returns a fixed mesh, or fails, and counts calls.
#[derive(Debug)]
pub struct MockDecompressor {
    mesh: Option<DecodedMesh>,
    calls: AtomicUsize,
}

impl MockDecompressor {
    pub fn new(mesh: DecodedMesh) -> Self {
        Self {
            mesh: Some(mesh),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            mesh: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl MeshDecompressor for MockDecompressor {
    fn decode<'a>(
        &'a self,
        _data: &'a [u8],
        _attributes: &'a IndexMap<String, u32>,
    ) -> DecompressFuture<'a> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let result = self
            .mesh
            .clone()
            .ok_or_else(|| GltfError::Decompression("malformed payload".into()));
        Box::pin(async move { result })
    }
}

/// What the recording renderer saw for one mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshRecord {
    pub vertex_count: usize,
    pub triangle_count: usize,
    pub is_polyline: bool,
    pub is_point_string: bool,
    pub color: ColorDef,
    pub is_transparent: bool,
    pub texture: Option<usize>,
    pub normal_map: Option<usize>,
}

/// Graphic handles produced by the recording renderer.
#[derive(Debug, Clone, PartialEq)]
pub enum MockGraphic {
    /// Index into [`RecordingRenderer::meshes`].
    Mesh(usize),
    List(Vec<MockGraphic>),
    Branch(Vec<MockGraphic>, DAffine3),
}

impl MockGraphic {
    /// Number of meshes anywhere beneath this graphic.
    pub fn mesh_count(&self) -> usize {
        match self {
            MockGraphic::Mesh(_) => 1,
            MockGraphic::List(graphics) | MockGraphic::Branch(graphics, _) => {
                graphics.iter().map(MockGraphic::mesh_count).sum()
            }
        }
    }
}

/// Records every request and hands back structural handles.
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    pub textures: Vec<TextureParams>,
    pub meshes: Vec<MeshRecord>,
    /// Transform of every `create_branch` call, including empty ones.
    pub branches: Vec<DAffine3>,
    /// Refuse every mesh, as a renderer out of resources would.
    pub decline_meshes: bool,
}

impl RenderSystem for RecordingRenderer {
    type Graphic = MockGraphic;
    type Texture = usize;

    fn create_texture(&mut self, request: &TextureRequest<'_>) -> Option<usize> {
        self.textures.push(request.params);
        Some(self.textures.len() - 1)
    }

    fn create_mesh(&mut self, args: &MeshArgs<'_, usize>) -> Option<MockGraphic> {
        if self.decline_meshes {
            return None;
        }
        self.meshes.push(MeshRecord {
            vertex_count: args.mesh.vertex_count(),
            triangle_count: args.mesh.triangle_count(),
            is_polyline: matches!(args.mesh.topology, MeshTopology::Polylines(_)),
            is_point_string: matches!(args.mesh.topology, MeshTopology::Points(_)),
            color: args.display.color,
            is_transparent: args.display.is_transparent,
            texture: args.display.texture,
            normal_map: args.display.normal_map,
        });
        Some(MockGraphic::Mesh(self.meshes.len() - 1))
    }

    fn create_graphic_list(&mut self, graphics: Vec<MockGraphic>) -> Option<MockGraphic> {
        match graphics.len() {
            0 => None,
            1 => graphics.into_iter().next(),
            _ => Some(MockGraphic::List(graphics)),
        }
    }

    fn create_branch(
        &mut self,
        graphics: Vec<MockGraphic>,
        transform: DAffine3,
    ) -> Option<MockGraphic> {
        self.branches.push(transform);
        if graphics.is_empty() {
            return None;
        }
        Some(MockGraphic::Branch(graphics, transform))
    }
}
