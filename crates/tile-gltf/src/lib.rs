//! tile-gltf: glTF 1.0 and 2.0 tile content decoder.
//!
//! This crate turns a glTF document (a GLB container, JSON bytes or an
//! already-parsed document) into quantized meshes and hands them to a
//! renderer, or extracts plain triangle geometry.
//!
//! # Supported Content
//!
//! | Feature | Status |
//! |---------|--------|
//! | glTF 2.0 JSON and GLB | Yes |
//! | glTF 1.0 JSON, GLB v1, KHR_binary_glTF | Yes |
//! | KHR_draco_mesh_compression | Via a [`MeshDecompressor`] |
//! | WEB3D_quantized_attributes | Positions and texture coordinates |
//! | CESIUM_RTC | Yes |
//! | KHR_techniques_webgl | Color and texture uniforms |
//!
//! # Quick Start
//!
//! ```ignore
//! use tile_gltf::{GltfInput, GltfReadOptions, GltfReader};
//!
//! let reader = GltfReader::new(GltfReadOptions::new().with_base_url(url))
//!     .with_fetcher(&fetcher);
//! let result = reader.read(GltfInput::Bytes(bytes), &mut renderer, &|| false).await;
//! ```
//!
//! # Architecture
//!
//! ```text
//! bytes ─> container ─> schema ─> resources ─> draco
//!                                     │
//!              traversal ─> mesh assembly ─> RenderSystem
//! ```
//!
//! Decoding never touches GPU state. Renderers implement [`RenderSystem`]
//! and receive finished [`MeshData`] plus material display parameters.

pub mod attributes;
pub mod buffer_view;
pub mod container;
pub mod draco;
pub mod error;
pub mod material;
pub mod mesh;
pub mod reader;
pub mod render;
pub mod resources;
pub mod schema;
pub mod traversal;

#[cfg(test)]
mod testing;

pub use buffer_view::{BufferView, BufferViewResolver, ComponentType};
pub use container::{GltfInput, ParsedGltf};
pub use draco::{DecodedMesh, DecompressFuture, DracoTopology, MeshDecompressor};
pub use error::{GltfError, Result};
pub use material::{DisplayParams, MaterialParams};
pub use mesh::{MeshData, MeshIndices, MeshTopology};
pub use reader::{
    GltfReadOptions, GltfReader, ReadResult, TileReadStatus, PSEUDO_RTC_BIAS_THRESHOLD,
};
pub use render::{
    FilterMode, GeometryCollection, GeometryMesh, MeshArgs, NullRenderSystem, ReaderMode,
    RenderSystem, TextureParams, TextureRequest, WrapMode,
};
pub use resources::{FetchFuture, ResolvedImage, ResourceFetcher};
pub use schema::{GltfDictionary, GltfDocument, GltfId};
