//! The boundary between the decoder and a renderer.
//!
//! The decoder never touches GPU state. It hands finished meshes and texture
//! requests to a [`RenderSystem`] and composes the opaque handles it gets
//! back into a single graphic.

use glam::{DAffine3, DVec2, DVec3, Vec3};
use serde::{Deserialize, Serialize};
use tile_core::Range3d;

use crate::material::DisplayParams;
use crate::mesh::MeshData;
use crate::resources::ResolvedImage;

/// What a read produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReaderMode {
    /// Hand meshes to the renderer and return one graphic.
    #[default]
    Graphics,
    /// Return content-space triangle geometry. The renderer is not called.
    Geometry,
}

/// Texture coordinate wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WrapMode {
    Repeat,
    ClampToEdge,
    MirroredRepeat,
}

/// Texture sampling filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterMode {
    Nearest,
    Linear,
}

/// Sampling parameters for a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureParams {
    pub wrap_s: WrapMode,
    pub wrap_t: WrapMode,
    pub mag_filter: FilterMode,
    pub min_filter: FilterMode,
    /// True if the texture will be drawn with blending.
    pub is_transparent: bool,
}

impl Default for TextureParams {
    fn default() -> Self {
        Self {
            wrap_s: WrapMode::Repeat,
            wrap_t: WrapMode::Repeat,
            mag_filter: FilterMode::Linear,
            min_filter: FilterMode::Linear,
            is_transparent: false,
        }
    }
}

/// An encoded image and how to sample it.
#[derive(Debug, Clone, Copy)]
pub struct TextureRequest<'a> {
    pub image: &'a ResolvedImage,
    pub params: TextureParams,
}

/// A finished mesh and its appearance.
#[derive(Debug, Clone, Copy)]
pub struct MeshArgs<'a, T> {
    pub mesh: &'a MeshData,
    pub display: &'a DisplayParams<T>,
}

/// Creates renderer-side objects from decoded content.
///
/// Every method may decline by returning `None`. A declined texture leaves
/// the mesh untextured; a declined mesh is left out of the graphic.
pub trait RenderSystem {
    type Graphic;
    type Texture: Clone;

    fn create_texture(&mut self, request: &TextureRequest<'_>) -> Option<Self::Texture>;

    fn create_mesh(&mut self, args: &MeshArgs<'_, Self::Texture>) -> Option<Self::Graphic>;

    /// Combine graphics into one.
    fn create_graphic_list(&mut self, graphics: Vec<Self::Graphic>) -> Option<Self::Graphic>;

    /// Wrap graphics in a transform.
    fn create_branch(
        &mut self,
        graphics: Vec<Self::Graphic>,
        transform: DAffine3,
    ) -> Option<Self::Graphic>;
}

/// A renderer that creates nothing, for geometry extraction.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullRenderSystem;

impl RenderSystem for NullRenderSystem {
    type Graphic = ();
    type Texture = ();

    fn create_texture(&mut self, _request: &TextureRequest<'_>) -> Option<()> {
        None
    }

    fn create_mesh(&mut self, _args: &MeshArgs<'_, ()>) -> Option<()> {
        None
    }

    fn create_graphic_list(&mut self, _graphics: Vec<()>) -> Option<()> {
        None
    }

    fn create_branch(&mut self, _graphics: Vec<()>, _transform: DAffine3) -> Option<()> {
        None
    }
}

/// A triangle mesh in content coordinates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeometryMesh {
    pub positions: Vec<DVec3>,
    pub normals: Option<Vec<Vec3>>,
    pub uvs: Option<Vec<DVec2>>,
    pub indices: Vec<u32>,
}

impl GeometryMesh {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn range(&self) -> Range3d {
        Range3d::from_points(self.positions.iter().copied())
    }
}

/// Geometry extracted from a document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeometryCollection {
    pub meshes: Vec<GeometryMesh>,
}

impl GeometryCollection {
    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    pub fn triangle_count(&self) -> usize {
        self.meshes.iter().map(GeometryMesh::triangle_count).sum()
    }
}
