//! Error types for tile-gltf.

use thiserror::Error;

/// Result type for tile-gltf operations.
pub type Result<T> = std::result::Result<T, GltfError>;

/// Errors that abort a read, or that a collaborator reports back to the
/// decoder.
///
/// Most per-primitive problems are not errors: a missing attribute or an
/// unresolvable buffer simply drops the primitive.
#[derive(Debug, Error)]
pub enum GltfError {
    /// Malformed binary container header or chunk layout.
    #[error("invalid GLB: {0}")]
    InvalidGlb(String),

    /// The JSON document could not be parsed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A glTF 2.0 document is missing its `asset` property.
    #[error("missing required property: asset")]
    MissingAsset,

    /// Unsupported container version or content format.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// A node is reachable from itself.
    #[error("cyclic node graph at node {0}")]
    CyclicNodeGraph(String),

    /// Base64 decoding error.
    #[error("base64 error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// A resource fetch failed.
    #[error("fetch failed for {url}: {message}")]
    Fetch {
        /// Resolved URL.
        url: String,
        /// Reason reported by the fetcher.
        message: String,
    },

    /// Mesh decompression failed.
    #[error("decompression error: {0}")]
    Decompression(String),
}

impl GltfError {
    /// Create a fetch error.
    pub fn fetch(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fetch {
            url: url.into(),
            message: message.into(),
        }
    }
}
