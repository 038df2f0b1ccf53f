//! glTF JSON schema types.
//!
//! One set of types covers both glTF 2.0 and the legacy 1.0 layout: every
//! cross-reference is a [`GltfId`] and every top-level collection is a
//! [`GltfDictionary`]. Fields that exist only in one version are optional.
//! Properties the decoder never reads (animations, skins, cameras) are not
//! modelled and are ignored during deserialization.

mod dictionary;

pub use dictionary::{GltfDictionary, GltfId};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{GltfError, Result};

// Component type constants
pub const COMPONENT_BYTE: u32 = 5120;
pub const COMPONENT_UNSIGNED_BYTE: u32 = 5121;
pub const COMPONENT_SHORT: u32 = 5122;
pub const COMPONENT_UNSIGNED_SHORT: u32 = 5123;
pub const COMPONENT_UNSIGNED_INT: u32 = 5125;
pub const COMPONENT_FLOAT: u32 = 5126;

// WebGL constants used by legacy techniques and KHR_techniques_webgl.
pub const GL_BLEND: u32 = 3042;
pub const GL_FLOAT_VEC4: u32 = 35666;
pub const GL_SAMPLER_2D: u32 = 35678;

// Sampler constants
pub const FILTER_NEAREST: u32 = 9728;
pub const FILTER_NEAREST_MIPMAP_NEAREST: u32 = 9984;
pub const FILTER_NEAREST_MIPMAP_LINEAR: u32 = 9986;
pub const WRAP_CLAMP_TO_EDGE: u32 = 33071;
pub const WRAP_MIRRORED_REPEAT: u32 = 33648;
pub const WRAP_REPEAT: u32 = 10497;

/// Extension names the decoder understands.
pub const EXT_DRACO: &str = "KHR_draco_mesh_compression";
pub const EXT_QUANTIZED_ATTRIBUTES: &str = "WEB3D_quantized_attributes";
pub const EXT_CESIUM_RTC: &str = "CESIUM_RTC";
pub const EXT_TECHNIQUES_WEBGL: &str = "KHR_techniques_webgl";
pub const EXT_BINARY_GLTF: &str = "KHR_binary_glTF";

/// Root glTF object.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GltfDocument {
    /// Asset information. Required for glTF 2.0.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset: Option<Asset>,
    /// Default scene.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scene: Option<GltfId>,
    #[serde(default)]
    pub scenes: GltfDictionary<Scene>,
    #[serde(default)]
    pub nodes: GltfDictionary<Node>,
    #[serde(default)]
    pub meshes: GltfDictionary<Mesh>,
    #[serde(default)]
    pub accessors: GltfDictionary<Accessor>,
    #[serde(default)]
    pub buffer_views: GltfDictionary<BufferView>,
    #[serde(default)]
    pub buffers: GltfDictionary<Buffer>,
    #[serde(default)]
    pub materials: GltfDictionary<Material>,
    #[serde(default)]
    pub textures: GltfDictionary<Texture>,
    #[serde(default)]
    pub images: GltfDictionary<Image>,
    #[serde(default)]
    pub samplers: GltfDictionary<Sampler>,
    /// glTF 1.0 techniques.
    #[serde(default)]
    pub techniques: GltfDictionary<Technique>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<DocumentExtensions>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensions_used: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensions_required: Vec<String>,
}

impl GltfDocument {
    /// Parse and validate a JSON document.
    ///
    /// `legacy_container` is true when the bytes came from a version 1
    /// binary container.
    pub fn from_slice(json: &[u8], legacy_container: bool) -> Result<Self> {
        let document: GltfDocument = serde_json::from_slice(json)?;
        document.validate(legacy_container)?;
        Ok(document)
    }

    /// Parse and validate an already-parsed JSON value.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let document: GltfDocument = serde_json::from_value(value)?;
        document.validate(false)?;
        Ok(document)
    }

    fn validate(&self, legacy_container: bool) -> Result<()> {
        if self.asset.is_none() && !legacy_container && !self.is_legacy() {
            return Err(GltfError::MissingAsset);
        }
        Ok(())
    }

    /// True for glTF 1.0 content.
    pub fn is_legacy(&self) -> bool {
        if let Some(asset) = &self.asset {
            if asset.version.starts_with('1') {
                return true;
            }
        }
        self.nodes.is_keyed()
            || self.meshes.is_keyed()
            || self.accessors.is_keyed()
            || self.buffers.is_keyed()
            || self.materials.is_keyed()
            || matches!(self.scene, Some(GltfId::Name(_)))
    }

    /// The CESIUM_RTC center, if present and non-zero.
    pub fn rtc_center(&self) -> Option<[f64; 3]> {
        let center = self.extensions.as_ref()?.cesium_rtc.as_ref()?.center;
        (center != [0.0; 3]).then_some(center)
    }

    /// Look up a KHR_techniques_webgl technique.
    pub fn webgl_technique(&self, index: usize) -> Option<&Technique> {
        self.extensions
            .as_ref()?
            .techniques_webgl
            .as_ref()?
            .techniques
            .get(index)
    }

    /// True if any primitive uses KHR_draco_mesh_compression.
    pub fn uses_draco(&self) -> bool {
        self.meshes.iter().any(|(_, mesh)| {
            mesh.primitives.iter().any(|p| p.draco_extension().is_some())
        })
    }
}

/// Asset metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    #[serde(default)]
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generator: Option<String>,
}

/// Document-level extensions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentExtensions {
    #[serde(rename = "CESIUM_RTC", skip_serializing_if = "Option::is_none")]
    pub cesium_rtc: Option<CesiumRtc>,
    #[serde(rename = "KHR_techniques_webgl", skip_serializing_if = "Option::is_none")]
    pub techniques_webgl: Option<TechniquesWebgl>,
}

/// Return-to-center translation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CesiumRtc {
    pub center: [f64; 3],
}

/// KHR_techniques_webgl technique list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TechniquesWebgl {
    #[serde(default)]
    pub techniques: Vec<Technique>,
}

/// A scene containing root nodes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scene {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub nodes: Vec<GltfId>,
}

/// A node in the scene graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub children: Vec<GltfId>,
    /// glTF 2.0 mesh.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mesh: Option<GltfId>,
    /// glTF 1.0 meshes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub meshes: Vec<GltfId>,
    /// Local transformation matrix (column-major).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matrix: Option<[f64; 16]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translation: Option<[f64; 3]>,
    /// Rotation quaternion (x, y, z, w).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation: Option<[f64; 4]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<[f64; 3]>,
}

impl Node {
    /// Every mesh this node instantiates, across both versions.
    pub fn mesh_ids(&self) -> impl Iterator<Item = &GltfId> {
        self.mesh.iter().chain(self.meshes.iter())
    }

    /// True if the node declares any local transform.
    pub fn has_transform(&self) -> bool {
        self.matrix.is_some()
            || self.translation.is_some()
            || self.rotation.is_some()
            || self.scale.is_some()
    }
}

/// A mesh containing primitives.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Mesh {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub primitives: Vec<Primitive>,
}

/// Primitive topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveMode {
    Points,
    Lines,
    LineLoop,
    LineStrip,
    Triangles,
    TriangleStrip,
    TriangleFan,
}

impl PrimitiveMode {
    pub fn from_gl(mode: u32) -> Option<Self> {
        match mode {
            0 => Some(PrimitiveMode::Points),
            1 => Some(PrimitiveMode::Lines),
            2 => Some(PrimitiveMode::LineLoop),
            3 => Some(PrimitiveMode::LineStrip),
            4 => Some(PrimitiveMode::Triangles),
            5 => Some(PrimitiveMode::TriangleStrip),
            6 => Some(PrimitiveMode::TriangleFan),
            _ => None,
        }
    }
}

/// A mesh primitive.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Primitive {
    /// Vertex attributes (POSITION, NORMAL, TEXCOORD_0, etc.).
    #[serde(default)]
    pub attributes: IndexMap<String, GltfId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indices: Option<GltfId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub material: Option<GltfId>,
    /// Rendering mode (0=POINTS, 1=LINES, 4=TRIANGLES, etc.).
    #[serde(default = "default_primitive_mode")]
    pub mode: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<PrimitiveExtensions>,
}

fn default_primitive_mode() -> u32 {
    4 // TRIANGLES
}

impl Primitive {
    pub fn mode(&self) -> Option<PrimitiveMode> {
        PrimitiveMode::from_gl(self.mode)
    }

    pub fn draco_extension(&self) -> Option<&DracoExtension> {
        self.extensions.as_ref()?.draco.as_ref()
    }
}

/// Primitive-level extensions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrimitiveExtensions {
    #[serde(rename = "KHR_draco_mesh_compression", skip_serializing_if = "Option::is_none")]
    pub draco: Option<DracoExtension>,
}

/// KHR_draco_mesh_compression primitive extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DracoExtension {
    pub buffer_view: GltfId,
    /// Semantic to draco attribute id.
    #[serde(default)]
    pub attributes: IndexMap<String, u32>,
}

/// An accessor for typed buffer data.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Accessor {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buffer_view: Option<GltfId>,
    #[serde(default)]
    pub byte_offset: usize,
    /// glTF 1.0 stores the stride on the accessor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub byte_stride: Option<usize>,
    /// Component type (5120=BYTE, 5121=UNSIGNED_BYTE, 5122=SHORT, 5123=UNSIGNED_SHORT, 5125=UNSIGNED_INT, 5126=FLOAT).
    pub component_type: u32,
    pub count: usize,
    /// Element type ("SCALAR", "VEC2", "VEC3", "VEC4", "MAT2", "MAT3", "MAT4").
    #[serde(rename = "type")]
    pub accessor_type: String,
    #[serde(default)]
    pub normalized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<AccessorExtensions>,
}

impl Accessor {
    /// Number of components per element.
    pub fn component_count(&self) -> usize {
        match self.accessor_type.as_str() {
            "VEC2" => 2,
            "VEC3" => 3,
            "VEC4" | "MAT2" => 4,
            "MAT3" => 9,
            "MAT4" => 16,
            _ => 1,
        }
    }

    /// The WEB3D_quantized_attributes decode range, if declared.
    pub fn quantized_attributes(&self) -> Option<&QuantizedAttributes> {
        self.extensions.as_ref()?.quantized_attributes.as_ref()
    }
}

/// Accessor-level extensions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessorExtensions {
    #[serde(rename = "WEB3D_quantized_attributes", skip_serializing_if = "Option::is_none")]
    pub quantized_attributes: Option<QuantizedAttributes>,
}

/// Decode range for pre-quantized attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuantizedAttributes {
    pub decoded_min: Vec<f64>,
    pub decoded_max: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decode_matrix: Option<Vec<f64>>,
}

/// A view into a buffer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferView {
    pub buffer: GltfId,
    #[serde(default)]
    pub byte_offset: usize,
    #[serde(default)]
    pub byte_length: usize,
    /// Byte stride for vertex data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub byte_stride: Option<usize>,
    /// Target (34962=ARRAY_BUFFER, 34963=ELEMENT_ARRAY_BUFFER).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<u32>,
}

/// A buffer containing binary data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Buffer {
    #[serde(default)]
    pub byte_length: usize,
    /// URI (data URI or external file).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

/// A material, in either the glTF 1.0 or the 2.0 layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// glTF 1.0 technique.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub technique: Option<GltfId>,
    /// glTF 1.0 technique parameter values.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<IndexMap<String, MaterialValue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pbr_metallic_roughness: Option<PbrMetallicRoughness>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normal_texture: Option<TextureInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emissive_texture: Option<TextureInfo>,
    /// Alpha mode ("OPAQUE", "MASK", "BLEND").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alpha_mode: Option<String>,
    #[serde(default)]
    pub double_sided: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<MaterialExtensions>,
}

impl Material {
    /// True for the glTF 1.0 layout.
    pub fn is_legacy(&self) -> bool {
        self.technique.is_some() || self.values.is_some()
    }

    /// The KHR_techniques_webgl binding, if any.
    pub fn technique_binding(&self) -> Option<&MaterialTechnique> {
        self.extensions.as_ref()?.techniques_webgl.as_ref()
    }
}

/// Material-level extensions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MaterialExtensions {
    #[serde(rename = "KHR_techniques_webgl", skip_serializing_if = "Option::is_none")]
    pub techniques_webgl: Option<MaterialTechnique>,
}

/// A material's KHR_techniques_webgl technique and uniform values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialTechnique {
    pub technique: usize,
    #[serde(default)]
    pub values: IndexMap<String, MaterialValue>,
}

/// A technique parameter or uniform value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MaterialValue {
    Numbers(Vec<f64>),
    Number(f64),
    /// glTF 1.0 texture id.
    Id(String),
    /// KHR_techniques_webgl sampler value.
    Texture(TextureInfo),
    Other(serde_json::Value),
}

/// PBR metallic-roughness properties.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PbrMetallicRoughness {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_color_factor: Option<[f64; 4]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_color_texture: Option<TextureInfo>,
}

/// Texture reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextureInfo {
    pub index: GltfId,
    #[serde(default)]
    pub tex_coord: u32,
}

/// A glTF 1.0 or KHR_techniques_webgl technique.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Technique {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub states: Option<TechniqueStates>,
    #[serde(default)]
    pub uniforms: IndexMap<String, TechniqueUniform>,
}

impl Technique {
    /// True if the technique enables GL blending.
    pub fn enables_blend(&self) -> bool {
        self.states
            .as_ref()
            .is_some_and(|states| states.enable.contains(&GL_BLEND))
    }
}

/// Render states enabled by a technique.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TechniqueStates {
    #[serde(default)]
    pub enable: Vec<u32>,
}

/// A technique uniform.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TechniqueUniform {
    /// KHR_techniques_webgl uniform definition.
    Definition {
        #[serde(rename = "type")]
        uniform_type: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        value: Option<MaterialValue>,
    },
    /// glTF 1.0 uniform-to-parameter mapping.
    Parameter(String),
}

/// A texture.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Texture {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampler: Option<GltfId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<GltfId>,
}

/// An image.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    /// URI (data URI or external file).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Buffer view holding the encoded image.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buffer_view: Option<GltfId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<ImageExtensions>,
}

impl Image {
    /// The buffer view and declared MIME type of an embedded image, across
    /// both versions.
    pub fn embedded_source(&self) -> Option<(&GltfId, Option<&str>)> {
        if let Some(view) = &self.buffer_view {
            return Some((view, self.mime_type.as_deref()));
        }
        let binary = self.extensions.as_ref()?.binary_gltf.as_ref()?;
        Some((
            &binary.buffer_view,
            binary.mime_type.as_deref().or(self.mime_type.as_deref()),
        ))
    }
}

/// Image-level extensions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageExtensions {
    #[serde(rename = "KHR_binary_glTF", skip_serializing_if = "Option::is_none")]
    pub binary_gltf: Option<BinaryImage>,
}

/// glTF 1.0 KHR_binary_glTF image source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinaryImage {
    pub buffer_view: GltfId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// A texture sampler.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sampler {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mag_filter: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_filter: Option<u32>,
    #[serde(default = "default_wrap_mode")]
    pub wrap_s: u32,
    #[serde(default = "default_wrap_mode")]
    pub wrap_t: u32,
}

impl Default for Sampler {
    fn default() -> Self {
        Self {
            mag_filter: None,
            min_filter: None,
            wrap_s: default_wrap_mode(),
            wrap_t: default_wrap_mode(),
        }
    }
}

fn default_wrap_mode() -> u32 {
    WRAP_REPEAT
}
