//! Material resolution.
//!
//! Reduces a glTF 1.0 or 2.0 material to what the renderer needs: a color,
//! a transparency flag and optional color and normal textures.

use std::collections::HashMap;

use log::debug;
use tile_core::ColorDef;

use crate::render::{FilterMode, RenderSystem, TextureParams, TextureRequest, WrapMode};
use crate::resources::ResolvedImage;
use crate::schema::{
    GltfDocument, GltfId, Material, MaterialValue, Sampler, TechniqueUniform,
    FILTER_NEAREST, FILTER_NEAREST_MIPMAP_LINEAR, FILTER_NEAREST_MIPMAP_NEAREST, GL_FLOAT_VEC4,
    GL_SAMPLER_2D, WRAP_CLAMP_TO_EDGE, WRAP_MIRRORED_REPEAT,
};

/// Legacy material values that hold a color.
const LEGACY_COLOR_VALUES: [&str; 2] = ["color", "diffuse"];
/// Legacy material values that hold a texture id.
const LEGACY_TEXTURE_VALUES: [&str; 2] = ["diffuse", "tex"];

/// Renderer-independent material description.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialParams {
    pub color: ColorDef,
    pub is_transparent: bool,
    pub texture: Option<GltfId>,
    /// Normal map. Only glTF 2.0 materials carry one.
    pub normal_map: Option<GltfId>,
}

impl Default for MaterialParams {
    fn default() -> Self {
        Self {
            color: ColorDef::WHITE,
            is_transparent: false,
            texture: None,
            normal_map: None,
        }
    }
}

/// Material with textures resolved to renderer handles.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayParams<T> {
    pub color: ColorDef,
    pub is_transparent: bool,
    pub texture: Option<T>,
    pub normal_map: Option<T>,
}

fn color_from_value(value: &MaterialValue) -> Option<ColorDef> {
    match value {
        MaterialValue::Numbers(numbers) => ColorDef::from_unit(numbers),
        _ => None,
    }
}

fn texture_from_value(value: &MaterialValue) -> Option<GltfId> {
    match value {
        MaterialValue::Id(id) => Some(GltfId::Name(id.clone())),
        MaterialValue::Texture(info) => Some(info.index.clone()),
        _ => None,
    }
}

/// Resolves material references for one document.
pub struct MaterialResolver<'a> {
    document: &'a GltfDocument,
}

impl<'a> MaterialResolver<'a> {
    pub fn new(document: &'a GltfDocument) -> Self {
        Self { document }
    }

    /// Parameters for a primitive's material reference.
    ///
    /// No reference means the default white material. A reference to a
    /// material that does not exist cannot be resolved.
    pub fn resolve(&self, material_id: Option<&GltfId>) -> Option<MaterialParams> {
        match material_id {
            None => Some(MaterialParams::default()),
            Some(id) => {
                let material = self.document.materials.get(id);
                if material.is_none() {
                    debug!("material {} not found", id);
                }
                material.map(|m| self.params(m))
            }
        }
    }

    pub fn params(&self, material: &Material) -> MaterialParams {
        let is_transparent = self.is_transparent(material);
        let color = self.color(material);
        MaterialParams {
            color: if is_transparent { color } else { color.opaque() },
            is_transparent,
            texture: self.texture_id(material),
            normal_map: if material.is_legacy() {
                None
            } else {
                material.normal_texture.as_ref().map(|info| info.index.clone())
            },
        }
    }

    /// Legacy technique blending, or alpha mode BLEND. MASK is drawn opaque.
    fn is_transparent(&self, material: &Material) -> bool {
        if let Some(technique_id) = &material.technique {
            if let Some(technique) = self.document.techniques.get(technique_id) {
                if technique.enables_blend() {
                    return true;
                }
            }
        }
        material.alpha_mode.as_deref() == Some("BLEND")
    }

    fn color(&self, material: &Material) -> ColorDef {
        if let Some(values) = &material.values {
            let legacy = LEGACY_COLOR_VALUES
                .iter()
                .find_map(|name| values.get(*name).and_then(color_from_value));
            if let Some(color) = legacy {
                return color;
            }
        }

        if let Some(color) = self.technique_uniform(material, GL_FLOAT_VEC4, color_from_value) {
            return color;
        }

        material
            .pbr_metallic_roughness
            .as_ref()
            .and_then(|pbr| pbr.base_color_factor)
            .and_then(|factor| ColorDef::from_unit(&factor))
            .unwrap_or(ColorDef::WHITE)
    }

    fn texture_id(&self, material: &Material) -> Option<GltfId> {
        if let Some(values) = &material.values {
            let legacy = LEGACY_TEXTURE_VALUES
                .iter()
                .find_map(|name| values.get(*name).and_then(texture_from_value));
            if legacy.is_some() {
                return legacy;
            }
        }

        if let Some(id) = self.technique_uniform(material, GL_SAMPLER_2D, texture_from_value) {
            return Some(id);
        }

        if let Some(pbr) = &material.pbr_metallic_roughness {
            if let Some(info) = &pbr.base_color_texture {
                return Some(info.index.clone());
            }
        }
        material.emissive_texture.as_ref().map(|info| info.index.clone())
    }

    /// The first KHR_techniques_webgl uniform of `uniform_type` that
    /// `extract` accepts. Material values override the uniform's default.
    fn technique_uniform<T>(
        &self,
        material: &Material,
        uniform_type: u32,
        extract: impl Fn(&MaterialValue) -> Option<T>,
    ) -> Option<T> {
        let binding = material.technique_binding()?;
        let technique = self.document.webgl_technique(binding.technique)?;

        technique.uniforms.iter().find_map(|(name, uniform)| match uniform {
            TechniqueUniform::Definition {
                uniform_type: ty,
                value,
            } if *ty == uniform_type => binding
                .values
                .get(name)
                .and_then(&extract)
                .or_else(|| value.as_ref().and_then(&extract)),
            _ => None,
        })
    }

    /// Build the renderer request for a texture.
    pub fn texture_request<'i>(
        &self,
        images: &'i HashMap<GltfId, ResolvedImage>,
        texture_id: &GltfId,
        is_transparent: bool,
    ) -> Option<TextureRequest<'i>> {
        let texture = self.document.textures.get(texture_id)?;
        let image = images.get(texture.source.as_ref()?)?;
        let sampler = texture
            .sampler
            .as_ref()
            .and_then(|id| self.document.samplers.get(id));

        let mut params = sampler.map(texture_params).unwrap_or_default();
        params.is_transparent = is_transparent;
        Some(TextureRequest { image, params })
    }
}

fn wrap_mode(value: u32) -> WrapMode {
    match value {
        WRAP_CLAMP_TO_EDGE => WrapMode::ClampToEdge,
        WRAP_MIRRORED_REPEAT => WrapMode::MirroredRepeat,
        _ => WrapMode::Repeat,
    }
}

fn filter_mode(value: Option<u32>) -> FilterMode {
    match value {
        Some(FILTER_NEAREST | FILTER_NEAREST_MIPMAP_NEAREST | FILTER_NEAREST_MIPMAP_LINEAR) => {
            FilterMode::Nearest
        }
        _ => FilterMode::Linear,
    }
}

/// Map a glTF sampler onto renderer texture parameters.
pub fn texture_params(sampler: &Sampler) -> TextureParams {
    TextureParams {
        wrap_s: wrap_mode(sampler.wrap_s),
        wrap_t: wrap_mode(sampler.wrap_t),
        mag_filter: filter_mode(sampler.mag_filter),
        min_filter: filter_mode(sampler.min_filter),
        is_transparent: false,
    }
}

/// Renderer textures for one read, keyed by texture id and transparency.
///
/// Failed creations are cached too, so each key reaches the renderer once.
#[derive(Debug)]
pub struct TextureCache<T> {
    entries: HashMap<(GltfId, bool), Option<T>>,
}

impl<T> Default for TextureCache<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<T: Clone> TextureCache<T> {
    pub fn get_or_create(
        &mut self,
        id: &GltfId,
        is_transparent: bool,
        create: impl FnOnce() -> Option<T>,
    ) -> Option<T> {
        self.entries
            .entry((id.clone(), is_transparent))
            .or_insert_with(create)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Resolve a material's textures through the cache and renderer.
pub fn display_params<R: RenderSystem>(
    materials: &MaterialResolver<'_>,
    images: &HashMap<GltfId, ResolvedImage>,
    cache: &mut TextureCache<R::Texture>,
    renderer: &mut R,
    params: &MaterialParams,
) -> DisplayParams<R::Texture> {
    let mut resolve = |id: &GltfId| {
        cache.get_or_create(id, params.is_transparent, || {
            let request = materials.texture_request(images, id, params.is_transparent);
            if request.is_none() {
                debug!("texture {} is unresolved", id);
            }
            renderer.create_texture(&request?)
        })
    };

    let texture = params.texture.as_ref().and_then(&mut resolve);
    let normal_map = params.normal_map.as_ref().and_then(&mut resolve);
    DisplayParams {
        color: params.color,
        is_transparent: params.is_transparent,
        texture,
        normal_map,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingRenderer, PNG_HEADER};

    fn document(value: serde_json::Value) -> GltfDocument {
        GltfDocument::from_value(value).unwrap()
    }

    #[test]
    fn test_pbr_color_opaque() {
        let doc = document(serde_json::json!({
            "asset": {"version": "2.0"},
            "materials": [
                {"pbrMetallicRoughness": {"baseColorFactor": [1, 0, 0, 0.5]}, "alphaMode": "OPAQUE"},
                {"pbrMetallicRoughness": {"baseColorFactor": [0, 0, 1, 0.5]}, "alphaMode": "BLEND"},
                {"alphaMode": "MASK"}
            ]
        }));
        let resolver = MaterialResolver::new(&doc);

        let opaque = resolver.resolve(Some(&GltfId::Index(0))).unwrap();
        assert_eq!(opaque.color, ColorDef::rgba(255, 0, 0, 255));
        assert!(!opaque.is_transparent);

        let blended = resolver.resolve(Some(&GltfId::Index(1))).unwrap();
        assert_eq!(blended.color, ColorDef::rgba(0, 0, 255, 128));
        assert!(blended.is_transparent);

        let masked = resolver.resolve(Some(&GltfId::Index(2))).unwrap();
        assert_eq!(masked.color, ColorDef::WHITE);
        assert!(!masked.is_transparent);
    }

    #[test]
    fn test_missing_material() {
        let doc = document(serde_json::json!({"asset": {"version": "2.0"}}));
        let resolver = MaterialResolver::new(&doc);
        assert_eq!(resolver.resolve(None), Some(MaterialParams::default()));
        assert!(resolver.resolve(Some(&GltfId::Index(3))).is_none());
    }

    #[test]
    fn test_legacy_material() {
        let doc = document(serde_json::json!({
            "techniques": {"blend": {"states": {"enable": [3042]}}},
            "materials": {
                "m": {
                    "technique": "blend",
                    "values": {"diffuse": "texture_0", "color": [0, 1, 0, 0.25]}
                }
            }
        }));
        let resolver = MaterialResolver::new(&doc);
        let params = resolver.resolve(Some(&GltfId::from("m"))).unwrap();
        assert!(params.is_transparent);
        assert_eq!(params.color, ColorDef::rgba(0, 255, 0, 64));
        assert_eq!(params.texture, Some(GltfId::from("texture_0")));
        assert_eq!(params.normal_map, None);
    }

    #[test]
    fn test_color_precedence() {
        let doc = document(serde_json::json!({
            "asset": {"version": "2.0"},
            "extensions": {"KHR_techniques_webgl": {"techniques": [{
                "uniforms": {
                    "u_color": {"type": 35666, "value": [0, 0, 1, 1]},
                    "u_tex": {"type": 35678}
                }
            }]}},
            "materials": [
                {
                    "extensions": {"KHR_techniques_webgl": {
                        "technique": 0,
                        "values": {"u_color": [0, 1, 0, 1], "u_tex": {"index": 4}}
                    }},
                    "pbrMetallicRoughness": {"baseColorFactor": [1, 0, 0, 1], "baseColorTexture": {"index": 1}}
                },
                {
                    "extensions": {"KHR_techniques_webgl": {"technique": 0}},
                    "pbrMetallicRoughness": {"baseColorFactor": [1, 0, 0, 1]},
                    "emissiveTexture": {"index": 2},
                    "normalTexture": {"index": 3}
                }
            ]
        }));
        let resolver = MaterialResolver::new(&doc);

        let overridden = resolver.resolve(Some(&GltfId::Index(0))).unwrap();
        assert_eq!(overridden.color, ColorDef::rgba(0, 255, 0, 255));
        assert_eq!(overridden.texture, Some(GltfId::Index(4)));

        let defaulted = resolver.resolve(Some(&GltfId::Index(1))).unwrap();
        assert_eq!(defaulted.color, ColorDef::rgba(0, 0, 255, 255));
        assert_eq!(defaulted.texture, Some(GltfId::Index(2)));
        assert_eq!(defaulted.normal_map, Some(GltfId::Index(3)));
    }

    #[test]
    fn test_texture_params() {
        let sampler = Sampler {
            mag_filter: Some(FILTER_NEAREST),
            min_filter: Some(9987),
            wrap_s: WRAP_CLAMP_TO_EDGE,
            wrap_t: WRAP_MIRRORED_REPEAT,
        };
        let params = texture_params(&sampler);
        assert_eq!(params.wrap_s, WrapMode::ClampToEdge);
        assert_eq!(params.wrap_t, WrapMode::MirroredRepeat);
        assert_eq!(params.mag_filter, FilterMode::Nearest);
        assert_eq!(params.min_filter, FilterMode::Linear);
        assert_eq!(texture_params(&Sampler::default()).wrap_s, WrapMode::Repeat);
    }

    #[test]
    fn test_texture_cache_resolves_each_key_once() {
        let doc = document(serde_json::json!({
            "asset": {"version": "2.0"},
            "textures": [{"source": 0, "sampler": 0}, {"source": 5}],
            "samplers": [{"wrapS": 33071}]
        }));
        let images = HashMap::from([(
            GltfId::Index(0),
            ResolvedImage {
                mime_type: Some("image/png".into()),
                bytes: PNG_HEADER.to_vec(),
            },
        )]);
        let resolver = MaterialResolver::new(&doc);
        let mut cache = TextureCache::default();
        let mut renderer = RecordingRenderer::default();

        let params = MaterialParams {
            texture: Some(GltfId::Index(0)),
            ..MaterialParams::default()
        };
        let first = display_params(&resolver, &images, &mut cache, &mut renderer, &params);
        let second = display_params(&resolver, &images, &mut cache, &mut renderer, &params);
        assert!(first.texture.is_some());
        assert_eq!(first.texture, second.texture);
        assert_eq!(renderer.textures.len(), 1);
        assert_eq!(renderer.textures[0].wrap_s, WrapMode::ClampToEdge);

        let transparent = MaterialParams {
            is_transparent: true,
            ..params.clone()
        };
        display_params(&resolver, &images, &mut cache, &mut renderer, &transparent);
        assert_eq!(renderer.textures.len(), 2);

        let unresolved = MaterialParams {
            texture: Some(GltfId::Index(1)),
            ..MaterialParams::default()
        };
        let display = display_params(&resolver, &images, &mut cache, &mut renderer, &unresolved);
        assert!(display.texture.is_none());
        display_params(&resolver, &images, &mut cache, &mut renderer, &unresolved);
        assert_eq!(cache.len(), 3);
        assert_eq!(renderer.textures.len(), 2);
    }
}
