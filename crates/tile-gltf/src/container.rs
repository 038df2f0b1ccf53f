//! Binary container (GLB) and JSON input handling.

use log::debug;

use crate::error::{GltfError, Result};
use crate::schema::GltfDocument;

/// GLB magic number.
pub const GLB_MAGIC: u32 = 0x46546C67; // "glTF" in little-endian
/// JSON chunk type.
pub const GLB_CHUNK_JSON: u32 = 0x4E4F534A; // "JSON" in little-endian
/// Binary chunk type.
pub const GLB_CHUNK_BIN: u32 = 0x004E4942; // "BIN\0" in little-endian
/// glTF 1.0 content format for JSON scene content.
const GLB_V1_CONTENT_JSON: u32 = 0;

fn read_u32(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset + 4)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Input accepted by the reader.
#[derive(Debug, Clone)]
pub enum GltfInput {
    /// GLB container bytes, or UTF-8 JSON bytes.
    Bytes(Vec<u8>),
    /// An already-parsed JSON document.
    Json(serde_json::Value),
    /// An already-deserialized document.
    Document(GltfDocument),
}

/// A parsed document and its binary chunk, if any.
#[derive(Debug, Clone)]
pub struct ParsedGltf {
    pub document: GltfDocument,
    /// Binary chunk of a GLB container.
    pub binary: Option<Vec<u8>>,
    /// Container version (1 or 2). JSON input reports 1 for legacy content.
    pub version: u32,
}

impl ParsedGltf {
    /// Parse any supported input.
    pub fn parse(input: GltfInput) -> Result<Self> {
        match input {
            GltfInput::Bytes(bytes) => Self::from_bytes(&bytes),
            GltfInput::Json(value) => Self::from_document(GltfDocument::from_value(value)?),
            GltfInput::Document(document) => Self::from_document(document),
        }
    }

    /// Parse a GLB container, falling back to UTF-8 JSON when the magic is
    /// absent or does not match.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        match read_u32(data, 0) {
            Some(GLB_MAGIC) => Self::from_glb(data),
            _ => {
                debug!("no GLB magic; parsing {} bytes as JSON", data.len());
                let document = GltfDocument::from_slice(data, false)?;
                Self::from_document(document)
            }
        }
    }

    fn from_document(document: GltfDocument) -> Result<Self> {
        let version = if document.is_legacy() { 1 } else { 2 };
        Ok(Self {
            document,
            binary: None,
            version,
        })
    }

    fn from_glb(data: &[u8]) -> Result<Self> {
        if data.len() < 12 {
            return Err(GltfError::InvalidGlb("GLB file too short".into()));
        }

        let version = read_u32(data, 4).unwrap_or(0);
        let length = (read_u32(data, 8).unwrap_or(0) as usize).min(data.len());
        match version {
            1 => Self::from_glb_v1(&data[..length]),
            2 => Self::from_glb_v2(&data[..length]),
            _ => Err(GltfError::Unsupported(format!(
                "GLB version {} not supported",
                version
            ))),
        }
    }

    fn from_glb_v1(data: &[u8]) -> Result<Self> {
        let content_length = read_u32(data, 12)
            .ok_or_else(|| GltfError::InvalidGlb("GLB header truncated".into()))?
            as usize;
        let content_format = read_u32(data, 16)
            .ok_or_else(|| GltfError::InvalidGlb("GLB header truncated".into()))?;
        if content_format != GLB_V1_CONTENT_JSON {
            return Err(GltfError::Unsupported(format!(
                "GLB content format {}",
                content_format
            )));
        }

        let json_end = 20 + content_length;
        let json = data
            .get(20..json_end)
            .ok_or_else(|| GltfError::InvalidGlb("scene content extends past end of file".into()))?;
        let document = GltfDocument::from_slice(json, true)?;
        let binary = data.get(json_end..).filter(|body| !body.is_empty());

        debug!("parsed GLB v1 container with {} byte body", binary.map_or(0, |b| b.len()));
        Ok(Self {
            document,
            binary: binary.map(<[u8]>::to_vec),
            version: 1,
        })
    }

    fn from_glb_v2(data: &[u8]) -> Result<Self> {
        let mut offset = 12;
        let mut json_data: Option<&[u8]> = None;
        let mut bin_data: Option<&[u8]> = None;

        while offset + 8 <= data.len() {
            let chunk_length = read_u32(data, offset).unwrap_or(0) as usize;
            let chunk_type = read_u32(data, offset + 4).unwrap_or(0);
            offset += 8;

            let chunk = data.get(offset..offset + chunk_length).ok_or_else(|| {
                GltfError::InvalidGlb("GLB chunk extends past end of file".into())
            })?;

            match chunk_type {
                GLB_CHUNK_JSON if json_data.is_none() => json_data = Some(chunk),
                GLB_CHUNK_BIN if bin_data.is_none() => bin_data = Some(chunk),
                _ => {
                    // Unknown chunk type, skip
                }
            }

            offset += chunk_length;
            // Chunks are 4-byte aligned
            offset = (offset + 3) & !3;
        }

        let json_data =
            json_data.ok_or_else(|| GltfError::InvalidGlb("GLB missing JSON chunk".into()))?;
        let document = GltfDocument::from_slice(json_data, false)?;

        debug!("parsed GLB v2 container with {} byte binary chunk", bin_data.map_or(0, |b| b.len()));
        Ok(Self {
            document,
            binary: bin_data.map(<[u8]>::to_vec),
            version: 2,
        })
    }
}
