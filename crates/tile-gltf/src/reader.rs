//! The top-level read.
//!
//! A read parses the input, resolves external resources, decompresses
//! compressed primitives, walks the scene graph and hands every usable
//! primitive to an output sink. The sink is chosen by [`ReaderMode`]:
//! renderer graphics, or content-space triangle geometry.

use std::collections::HashMap;

use glam::{DAffine3, DMat3, DVec3};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use tile_core::Range3d;

use crate::attributes::AttributeReader;
use crate::buffer_view::BufferViewResolver;
use crate::container::{GltfInput, ParsedGltf};
use crate::draco::{DracoCache, MeshDecompressor};
use crate::error::Result;
use crate::material::{display_params, MaterialParams, MaterialResolver, TextureCache};
use crate::mesh::{MeshData, MeshTopology, PrimitiveAssembler};
use crate::render::{
    GeometryCollection, GeometryMesh, MeshArgs, NullRenderSystem, ReaderMode, RenderSystem,
};
use crate::resources::{ResolvedImage, ResourceFetcher, ResourceResolver};
use crate::schema::{GltfDocument, GltfId};
use crate::traversal::{local_transform, root_nodes, traverse, TransformChain};

/// Minimum bias magnitude at which the pseudo-origin bias is applied.
pub const PSEUDO_RTC_BIAS_THRESHOLD: f64 = 1.0e5;

/// Rotates Y-up content into a Z-up world.
const Y_UP_TO_Z_UP: DMat3 = DMat3::from_cols(DVec3::X, DVec3::Z, DVec3::NEG_Y);

/// Options for reading tile content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GltfReadOptions {
    /// Base for resolving relative resource URIs.
    pub base_url: Option<String>,
    /// Rotate the content from Y-up to Z-up.
    pub y_axis_up: bool,
    /// Passed through to the result.
    pub is_leaf: bool,
    /// Explicit content range. Disables range computation.
    pub content_range: Option<Range3d>,
    /// Candidate translation subtracted from positions and restored by the
    /// root transform.
    pub pseudo_rtc_bias: Option<[f64; 3]>,
    /// Give every triangle corner its own vertex.
    pub deduplicate_vertices: bool,
    pub mode: ReaderMode,
}

impl Default for GltfReadOptions {
    fn default() -> Self {
        Self {
            base_url: None,
            y_axis_up: true,
            is_leaf: true,
            content_range: None,
            pseudo_rtc_bias: None,
            deduplicate_vertices: false,
            mode: ReaderMode::Graphics,
        }
    }
}

impl GltfReadOptions {
    /// Create default read options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative URIs against `url`.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_y_axis_up(mut self, y_axis_up: bool) -> Self {
        self.y_axis_up = y_axis_up;
        self
    }

    pub fn with_leaf(mut self, is_leaf: bool) -> Self {
        self.is_leaf = is_leaf;
        self
    }

    /// Report `range` instead of computing one.
    pub fn with_content_range(mut self, range: Range3d) -> Self {
        self.content_range = Some(range);
        self
    }

    pub fn with_pseudo_rtc_bias(mut self, bias: DVec3) -> Self {
        self.pseudo_rtc_bias = Some(bias.to_array());
        self
    }

    pub fn with_deduplicated_vertices(mut self, deduplicate: bool) -> Self {
        self.deduplicate_vertices = deduplicate;
        self
    }

    pub fn with_mode(mut self, mode: ReaderMode) -> Self {
        self.mode = mode;
        self
    }
}

/// Terminal state of a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TileReadStatus {
    Success,
    /// The content is malformed or yielded no usable geometry.
    InvalidTileData,
    /// The caller asked the read to stop.
    Canceled,
}

/// Outcome of a read.
#[derive(Debug, Clone)]
pub struct ReadResult<G> {
    pub status: TileReadStatus,
    /// Content range in output coordinates.
    pub range: Option<Range3d>,
    pub is_leaf: bool,
    /// Set in graphics mode.
    pub graphic: Option<G>,
    /// Set in geometry mode.
    pub geometry: Option<GeometryCollection>,
}

impl<G> ReadResult<G> {
    fn failed(status: TileReadStatus, is_leaf: bool) -> Self {
        Self {
            status,
            range: None,
            is_leaf,
            graphic: None,
            geometry: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == TileReadStatus::Success
    }
}

/// Receives the primitives of each visited node.
trait PrimitiveSink {
    type Output;

    /// `meshes` are every usable primitive of one node visit.
    fn add_node(&mut self, meshes: Vec<(MeshData, MaterialParams)>, chain: &TransformChain);

    /// Close the output. `None` if nothing was produced.
    fn finish(self, root: DAffine3) -> Option<Self::Output>;
}

/// Builds one renderer graphic.
struct GraphicsSink<'r, 'a, R: RenderSystem> {
    renderer: &'r mut R,
    materials: MaterialResolver<'a>,
    images: &'a HashMap<GltfId, ResolvedImage>,
    textures: TextureCache<R::Texture>,
    graphics: Vec<R::Graphic>,
}

impl<'r, 'a, R: RenderSystem> GraphicsSink<'r, 'a, R> {
    fn new(
        renderer: &'r mut R,
        document: &'a GltfDocument,
        images: &'a HashMap<GltfId, ResolvedImage>,
    ) -> Self {
        Self {
            renderer,
            materials: MaterialResolver::new(document),
            images,
            textures: TextureCache::default(),
            graphics: Vec::new(),
        }
    }
}

impl<R: RenderSystem> PrimitiveSink for GraphicsSink<'_, '_, R> {
    type Output = R::Graphic;

    fn add_node(&mut self, meshes: Vec<(MeshData, MaterialParams)>, chain: &TransformChain) {
        let mut created = Vec::with_capacity(meshes.len());
        for (mesh, params) in &meshes {
            let display = display_params(
                &self.materials,
                self.images,
                &mut self.textures,
                &mut *self.renderer,
                params,
            );
            match self.renderer.create_mesh(&MeshArgs {
                mesh,
                display: &display,
            }) {
                Some(graphic) => created.push(graphic),
                None => debug!("renderer declined a mesh of {} vertices", mesh.vertex_count()),
            }
        }

        if created.is_empty() {
            return;
        }
        if chain.has_transform() {
            if let Some(branch) = self.renderer.create_branch(created, chain.transform()) {
                self.graphics.push(branch);
            }
        } else {
            self.graphics.extend(created);
        }
    }

    fn finish(self, root: DAffine3) -> Option<R::Graphic> {
        let graphic = self.renderer.create_graphic_list(self.graphics)?;
        if root == DAffine3::IDENTITY {
            Some(graphic)
        } else {
            self.renderer.create_branch(vec![graphic], root)
        }
    }
}

/// Collects triangle meshes in content coordinates.
struct GeometrySink {
    root: DAffine3,
    collection: GeometryCollection,
}

impl GeometrySink {
    fn new(root: DAffine3) -> Self {
        Self {
            root,
            collection: GeometryCollection::default(),
        }
    }

    fn to_content(&self, mesh: &MeshData, transform: DAffine3) -> Option<GeometryMesh> {
        let MeshTopology::Triangles(indices) = &mesh.topology else {
            return None;
        };

        let positions = (0..mesh.points.len())
            .filter_map(|i| mesh.points.unquantize(i))
            .map(|p| transform.transform_point3(p))
            .collect();

        let normal_matrix = transform.matrix3.inverse().transpose();
        let normals = mesh.normals.as_ref().map(|normals| {
            normals
                .iter()
                .map(|n| {
                    (normal_matrix * n.decode().as_dvec3())
                        .normalize_or_zero()
                        .as_vec3()
                })
                .collect()
        });

        let uvs = mesh.uvs.as_ref().map(|uvs| {
            (0..uvs.len())
                .filter_map(|i| uvs.unquantize(i))
                .collect()
        });

        Some(GeometryMesh {
            positions,
            normals,
            uvs,
            indices: indices.to_u32(),
        })
    }
}

impl PrimitiveSink for GeometrySink {
    type Output = GeometryCollection;

    fn add_node(&mut self, meshes: Vec<(MeshData, MaterialParams)>, chain: &TransformChain) {
        let transform = self.root * chain.transform();
        for (mesh, _) in &meshes {
            match self.to_content(mesh, transform) {
                Some(geometry) => self.collection.meshes.push(geometry),
                None => debug!("geometry output skips non-triangle mesh"),
            }
        }
    }

    fn finish(self, _root: DAffine3) -> Option<GeometryCollection> {
        (!self.collection.is_empty()).then_some(self.collection)
    }
}

/// The bias to subtract from positions, if it applies to this document.
///
/// The bias is skipped when the document carries its own center, when the
/// first root node is already transformed, and when it is small.
fn pseudo_rtc_bias(document: &GltfDocument, options: &GltfReadOptions) -> Option<DVec3> {
    let bias = DVec3::from_array(options.pseudo_rtc_bias?);
    if document.rtc_center().is_some() {
        return None;
    }
    if bias.length() < PSEUDO_RTC_BIAS_THRESHOLD {
        debug!("pseudo-origin bias {} is below threshold", bias);
        return None;
    }
    let first_root = root_nodes(document)
        .first()
        .and_then(|id| document.nodes.get(id));
    if first_root.and_then(local_transform).is_some() {
        debug!("first root node is transformed; ignoring pseudo-origin bias");
        return None;
    }
    Some(bias)
}

/// Maps assembled mesh coordinates into output coordinates:
/// return-to-center, then Y-up rotation, then the restored bias.
fn root_transform(document: &GltfDocument, y_axis_up: bool, bias: Option<DVec3>) -> DAffine3 {
    let mut transform = match document.rtc_center() {
        Some(center) => DAffine3::from_translation(DVec3::from_array(center)),
        None => DAffine3::IDENTITY,
    };
    if y_axis_up {
        transform = transform * DAffine3::from_mat3(Y_UP_TO_Z_UP);
    }
    if let Some(bias) = bias {
        transform = transform * DAffine3::from_translation(bias);
    }
    transform
}

/// Reads glTF tile content.
pub struct GltfReader<'a> {
    options: GltfReadOptions,
    fetcher: Option<&'a dyn ResourceFetcher>,
    decompressor: Option<&'a dyn MeshDecompressor>,
}

impl<'a> GltfReader<'a> {
    pub fn new(options: GltfReadOptions) -> Self {
        Self {
            options,
            fetcher: None,
            decompressor: None,
        }
    }

    /// Fetch external buffers and images through `fetcher`.
    pub fn with_fetcher(mut self, fetcher: &'a dyn ResourceFetcher) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Decode compressed primitives through `decompressor`.
    pub fn with_decompressor(mut self, decompressor: &'a dyn MeshDecompressor) -> Self {
        self.decompressor = Some(decompressor);
        self
    }

    pub fn options(&self) -> &GltfReadOptions {
        &self.options
    }

    /// Read `input`, handing meshes to `renderer` in graphics mode.
    ///
    /// `should_abort` is polled between phases. Never panics on malformed
    /// input: every failure is reported through the result status.
    pub async fn read<R: RenderSystem>(
        &self,
        input: GltfInput,
        renderer: &mut R,
        should_abort: &(dyn Fn() -> bool + Sync),
    ) -> ReadResult<R::Graphic> {
        let result = self
            .read_with_mode(input, renderer, self.options.mode, should_abort)
            .await;
        debug!("read finished with {:?}", result.status);
        result
    }

    /// Read `input` as content-space geometry, whatever the configured mode.
    pub async fn read_geometry(
        &self,
        input: GltfInput,
        should_abort: &(dyn Fn() -> bool + Sync),
    ) -> ReadResult<()> {
        self.read_with_mode(input, &mut NullRenderSystem, ReaderMode::Geometry, should_abort)
            .await
    }

    async fn read_with_mode<R: RenderSystem>(
        &self,
        input: GltfInput,
        renderer: &mut R,
        mode: ReaderMode,
        should_abort: &(dyn Fn() -> bool + Sync),
    ) -> ReadResult<R::Graphic> {
        let is_leaf = self.options.is_leaf;
        if should_abort() {
            debug!("read canceled before parsing");
            return ReadResult::failed(TileReadStatus::Canceled, is_leaf);
        }

        let parsed = match ParsedGltf::parse(input) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("invalid tile content: {}", e);
                return ReadResult::failed(TileReadStatus::InvalidTileData, is_leaf);
            }
        };
        debug!("parsed glTF content (container version {})", parsed.version);

        match self
            .read_document(parsed, renderer, mode, should_abort)
            .await
        {
            Ok(result) => result,
            Err(e) => {
                warn!("invalid tile content: {}", e);
                ReadResult::failed(TileReadStatus::InvalidTileData, is_leaf)
            }
        }
    }

    async fn read_document<R: RenderSystem>(
        &self,
        parsed: ParsedGltf,
        renderer: &mut R,
        mode: ReaderMode,
        should_abort: &(dyn Fn() -> bool + Sync),
    ) -> Result<ReadResult<R::Graphic>> {
        let is_leaf = self.options.is_leaf;
        let document = &parsed.document;

        let resources = ResourceResolver::new(
            document,
            self.options.base_url.as_deref(),
            self.fetcher,
            should_abort,
        )
        .resolve(parsed.binary)
        .await;
        if should_abort() {
            debug!("read canceled after resource resolution");
            return Ok(ReadResult::failed(TileReadStatus::Canceled, is_leaf));
        }

        let draco = if document.uses_draco() {
            let views = BufferViewResolver::new(document, &resources.buffers);
            DracoCache::decode_all(&views, self.decompressor, should_abort).await
        } else {
            DracoCache::default()
        };
        if should_abort() {
            debug!("read canceled before traversal");
            return Ok(ReadResult::failed(TileReadStatus::Canceled, is_leaf));
        }

        let bias = pseudo_rtc_bias(document, &self.options);
        let root = root_transform(document, self.options.y_axis_up, bias);
        let assembler = PrimitiveAssembler::new(
            AttributeReader::new(BufferViewResolver::new(document, &resources.buffers), bias),
            &draco,
            bias,
        );

        let (graphic, geometry, range) = match mode {
            ReaderMode::Graphics => {
                let sink = GraphicsSink::new(renderer, document, &resources.images);
                let (graphic, range) = self.assemble(document, &assembler, sink, root)?;
                (graphic, None, range)
            }
            ReaderMode::Geometry => {
                let (geometry, range) =
                    self.assemble(document, &assembler, GeometrySink::new(root), root)?;
                (None, geometry, range)
            }
        };

        if graphic.is_none() && geometry.is_none() {
            warn!("tile content produced no usable geometry");
            return Ok(ReadResult::failed(TileReadStatus::InvalidTileData, is_leaf));
        }

        let range = self
            .options
            .content_range
            .or_else(|| (!range.is_null()).then(|| range.transformed(&root)));

        Ok(ReadResult {
            status: TileReadStatus::Success,
            range,
            is_leaf,
            graphic,
            geometry,
        })
    }

    /// Traverse the scene and feed every usable primitive to `sink`.
    ///
    /// Returns the sink's output and the content range before the root
    /// transform.
    fn assemble<S: PrimitiveSink>(
        &self,
        document: &GltfDocument,
        assembler: &PrimitiveAssembler<'_>,
        mut sink: S,
        root: DAffine3,
    ) -> Result<(Option<S::Output>, Range3d)> {
        let materials = MaterialResolver::new(document);
        let mut range = Range3d::null();
        let mut primitive_count = 0usize;

        traverse(document, |node_id, node, chain| {
            let mut meshes = Vec::new();
            for mesh_id in node.mesh_ids() {
                let Some(mesh) = document.meshes.get(mesh_id) else {
                    debug!("node {} references missing mesh {}", node_id, mesh_id);
                    continue;
                };
                for primitive in &mesh.primitives {
                    let Some(params) = materials.resolve(primitive.material.as_ref()) else {
                        debug!("skipping primitive of mesh {}: unresolved material", mesh_id);
                        continue;
                    };
                    let Some(mut data) = assembler.read_primitive(primitive) else {
                        continue;
                    };
                    if self.options.deduplicate_vertices {
                        data.deduplicate_vertices();
                    }
                    if !data.range.is_null() {
                        range.extend_range(&data.range.transformed(&chain.transform()));
                    }
                    meshes.push((data, params));
                }
            }
            if !meshes.is_empty() {
                primitive_count += meshes.len();
                sink.add_node(meshes, chain);
            }
        })?;

        debug!("assembled {} primitives", primitive_count);
        if primitive_count == 0 {
            return Ok((None, range));
        }
        Ok((sink.finish(root), range))
    }
}
