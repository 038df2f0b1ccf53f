//! Resolution of external and embedded buffers and images.
//!
//! Buffers are resolved first, all fetches in flight together. Images are
//! resolved afterwards because an image may live in a buffer view. A failed
//! fetch leaves the resource unresolved; it never aborts the read.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use base64::Engine;
use futures::future::join_all;
use log::{debug, warn};

use crate::buffer_view::BufferViewResolver;
use crate::error::{GltfError, Result};
use crate::schema::{GltfDocument, GltfId};

/// A boxed, `Send` future returning fetched bytes.
pub type FetchFuture = Pin<Box<dyn Future<Output = Result<Vec<u8>>> + Send>>;

/// Fetches resources by absolute URL.
///
/// Implementations report failure through the returned `Result`; the
/// resolver logs and swallows it.
pub trait ResourceFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> FetchFuture;
}

/// Encoded image bytes and their MIME type.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedImage {
    /// Declared MIME type, or one sniffed from the bytes.
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Every buffer and image that could be resolved.
#[derive(Debug, Clone, Default)]
pub struct ResolvedResources {
    pub buffers: HashMap<GltfId, Vec<u8>>,
    pub images: HashMap<GltfId, ResolvedImage>,
}

/// Buffer ids that name the binary body of a version 1 container.
const LEGACY_BINARY_BUFFER_IDS: [&str; 2] = ["binary_glTF", "KHR_binary_glTF"];

/// Guess an image MIME type from its magic bytes.
pub fn sniff_mime_type(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some("image/png")
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else {
        None
    }
}

/// Decode a `data:` URI into its media type and payload.
///
/// Returns `None` if `uri` is not a data URI.
pub fn decode_data_uri(uri: &str) -> Option<Result<(Option<String>, Vec<u8>)>> {
    let rest = uri.strip_prefix("data:")?;
    let Some((header, data)) = rest.split_once(',') else {
        return Some(Err(GltfError::Unsupported("data URI without payload".into())));
    };

    let (media_type, is_base64) = match header.strip_suffix(";base64") {
        Some(media_type) => (media_type, true),
        None => (header, false),
    };
    let media_type = media_type
        .split(';')
        .next()
        .filter(|m| !m.is_empty())
        .map(str::to_string);

    let bytes = if is_base64 {
        match base64::engine::general_purpose::STANDARD.decode(data) {
            Ok(bytes) => bytes,
            Err(e) => return Some(Err(e.into())),
        }
    } else {
        data.as_bytes().to_vec()
    };
    Some(Ok((media_type, bytes)))
}

fn has_scheme(uri: &str) -> bool {
    match uri.find(':') {
        Some(colon) => {
            let scheme = &uri[..colon];
            !scheme.is_empty()
                && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}

/// Collapse `.` and `..` segments of a `/`-separated path.
fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    let trailing = path.ends_with('/') || path.ends_with("/.") || path.ends_with("/..");
    for segment in path.split('/') {
        match segment {
            "." => {}
            ".." => {
                if segments.len() > 1 || segments.first().is_some_and(|s| !s.is_empty()) {
                    segments.pop();
                }
            }
            _ => segments.push(segment),
        }
    }
    let mut normalized = segments.join("/");
    if trailing && !normalized.ends_with('/') {
        normalized.push('/');
    }
    normalized
}

/// Resolve `uri` against `base`. Absolute URIs are returned unchanged.
pub fn resolve_url(base: Option<&str>, uri: &str) -> String {
    let Some(base) = base else {
        return uri.to_string();
    };
    if has_scheme(uri) {
        return uri.to_string();
    }

    let base = base.split(['?', '#']).next().unwrap_or(base);
    let (origin, path) = match base.find("://") {
        Some(scheme_end) => {
            let authority_start = scheme_end + 3;
            match base[authority_start..].find('/') {
                Some(slash) => base.split_at(authority_start + slash),
                None => (base, "/"),
            }
        }
        None => ("", base),
    };

    if uri.starts_with('/') {
        return format!("{}{}", origin, normalize_path(uri));
    }

    let directory = match path.rfind('/') {
        Some(slash) => &path[..=slash],
        None => "",
    };
    format!("{}{}", origin, normalize_path(&format!("{}{}", directory, uri)))
}

/// Resolves the buffers and images of one document.
pub struct ResourceResolver<'a> {
    document: &'a GltfDocument,
    base_url: Option<&'a str>,
    fetcher: Option<&'a dyn ResourceFetcher>,
    should_abort: &'a (dyn Fn() -> bool + Sync),
}

impl<'a> ResourceResolver<'a> {
    pub fn new(
        document: &'a GltfDocument,
        base_url: Option<&'a str>,
        fetcher: Option<&'a dyn ResourceFetcher>,
        should_abort: &'a (dyn Fn() -> bool + Sync),
    ) -> Self {
        Self {
            document,
            base_url,
            fetcher,
            should_abort,
        }
    }

    /// Resolve everything that can be resolved.
    ///
    /// Stops early, returning what it has, once `should_abort` reports true.
    pub async fn resolve(&self, binary: Option<Vec<u8>>) -> ResolvedResources {
        let mut resources = ResolvedResources::default();
        if (self.should_abort)() {
            return resources;
        }

        resources.buffers = self.resolve_buffers(binary).await;
        if (self.should_abort)() {
            debug!("resource resolution aborted after buffers");
            return resources;
        }

        resources.images = self.resolve_images(&resources.buffers).await;
        resources
    }

    async fn fetch(&self, url: String) -> Option<Vec<u8>> {
        if (self.should_abort)() {
            return None;
        }
        let Some(fetcher) = self.fetcher else {
            warn!("no fetcher available for {}", url);
            return None;
        };
        match fetcher.fetch(&url).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!("failed to fetch {}: {}", url, e);
                None
            }
        }
    }

    /// Decode a data URI or fetch an external one.
    async fn load_uri(&self, uri: &str) -> Option<(Option<String>, Vec<u8>)> {
        match decode_data_uri(uri) {
            Some(Ok(decoded)) => Some(decoded),
            Some(Err(e)) => {
                warn!("invalid data URI: {}", e);
                None
            }
            None => {
                let url = resolve_url(self.base_url, uri);
                self.fetch(url).await.map(|bytes| (None, bytes))
            }
        }
    }

    async fn resolve_buffers(&self, binary: Option<Vec<u8>>) -> HashMap<GltfId, Vec<u8>> {
        let mut binary = binary;
        let mut buffers = HashMap::new();
        let mut pending = Vec::new();

        for (id, buffer) in self.document.buffers.iter() {
            let is_legacy_binary = matches!(
                &id,
                GltfId::Name(name) if LEGACY_BINARY_BUFFER_IDS.contains(&name.as_str())
            );
            if is_legacy_binary || buffer.uri.is_none() {
                match binary.take() {
                    Some(bytes) => {
                        buffers.insert(id, bytes);
                    }
                    None => debug!("buffer {} has no data", id),
                }
                continue;
            }
            if let Some(uri) = &buffer.uri {
                pending.push(async move { (id, self.load_uri(uri).await) });
            }
        }

        for (id, loaded) in join_all(pending).await {
            if let Some((_, bytes)) = loaded {
                buffers.insert(id, bytes);
            }
        }
        buffers
    }

    async fn resolve_images(
        &self,
        buffers: &HashMap<GltfId, Vec<u8>>,
    ) -> HashMap<GltfId, ResolvedImage> {
        let views = BufferViewResolver::new(self.document, buffers);
        let mut images = HashMap::new();
        let mut pending = Vec::new();

        for (id, image) in self.document.images.iter() {
            if let Some((view_id, mime_type)) = image.embedded_source() {
                match views.raw_view(view_id) {
                    Some(bytes) => {
                        images.insert(id, image_from(mime_type.map(str::to_string), bytes.to_vec()));
                    }
                    None => debug!("image {} buffer view {} is unresolved", id, view_id),
                }
                continue;
            }
            if let Some(uri) = &image.uri {
                let declared = image.mime_type.clone();
                pending.push(async move {
                    let loaded = self.load_uri(uri).await;
                    (id, loaded.map(|(media, bytes)| image_from(declared.or(media), bytes)))
                });
            }
        }

        for (id, image) in join_all(pending).await {
            if let Some(image) = image {
                images.insert(id, image);
            }
        }
        images
    }
}

fn image_from(mime_type: Option<String>, bytes: Vec<u8>) -> ResolvedImage {
    let mime_type = mime_type
        .filter(|m| m.starts_with("image/"))
        .or_else(|| sniff_mime_type(&bytes).map(str::to_string));
    ResolvedImage { mime_type, bytes }
}
