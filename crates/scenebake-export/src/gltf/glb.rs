//! GLB container: writer, reader and unpacker

use std::io::Write;
use std::path::Path;

use tracing::debug;

use super::Gltf;
use crate::error::{ExportError, ExportResult};

pub const GLB_MAGIC: u32 = 0x4654_6C67; // "glTF"
pub const GLB_VERSION: u32 = 2;
pub const CHUNK_JSON: u32 = 0x4E4F_534A; // "JSON"
pub const CHUNK_BIN: u32 = 0x004E_4942; // "BIN\0"

const HEADER_LEN: usize = 12;
const CHUNK_HEADER_LEN: usize = 8;

/// Raw chunks of a GLB file
#[derive(Debug, Clone, PartialEq)]
pub struct GlbChunks {
    /// JSON chunk with its trailing space padding
    pub json: Vec<u8>,
    pub bin: Option<Vec<u8>>,
}

fn padding(len: usize) -> usize {
    (4 - len % 4) % 4
}

/// GLB length fields are 32 bits wide
fn length_field(len: usize, path: &Path) -> ExportResult<u32> {
    u32::try_from(len).map_err(|_| ExportError::invalid_glb(path, format!("{len} bytes exceeds the 4 GiB GLB limit")))
}

/// Write `gltf` and one binary payload as a GLB. The caller clears the
/// buffer `uri` beforehand.
pub fn write_glb(path: &Path, gltf: &Gltf, bin: &[u8]) -> ExportResult<()> {
    let json = serde_json::to_vec(gltf)?;
    let json_padding = padding(json.len());
    let bin_padding = padding(bin.len());

    let json_chunk_len = json.len() + json_padding;
    let bin_chunk_len = bin.len() + bin_padding;
    let total_len = HEADER_LEN + CHUNK_HEADER_LEN + json_chunk_len + CHUNK_HEADER_LEN + bin_chunk_len;
    let total_field = length_field(total_len, path)?;
    let json_field = length_field(json_chunk_len, path)?;
    let bin_field = length_field(bin_chunk_len, path)?;

    let mut out = Vec::with_capacity(total_len);
    out.extend_from_slice(&GLB_MAGIC.to_le_bytes());
    out.extend_from_slice(&GLB_VERSION.to_le_bytes());
    out.extend_from_slice(&total_field.to_le_bytes());

    out.extend_from_slice(&json_field.to_le_bytes());
    out.extend_from_slice(&CHUNK_JSON.to_le_bytes());
    out.extend_from_slice(&json);
    out.resize(out.len() + json_padding, b' ');

    out.extend_from_slice(&bin_field.to_le_bytes());
    out.extend_from_slice(&CHUNK_BIN.to_le_bytes());
    out.extend_from_slice(bin);
    out.resize(out.len() + bin_padding, 0);

    let mut file = std::fs::File::create(path)?;
    file.write_all(&out)?;
    debug!(path = %path.display(), bytes = total_len, "wrote glb");
    Ok(())
}

fn read_u32(bytes: &[u8], offset: usize) -> Option<u32> {
    bytes
        .get(offset..offset + 4)
        .and_then(|b| b.try_into().ok())
        .map(u32::from_le_bytes)
}

/// Split a GLB image into its chunks. `path` only labels errors.
pub fn parse_glb(bytes: &[u8], path: &Path) -> ExportResult<GlbChunks> {
    let header = |offset| read_u32(bytes, offset).ok_or_else(|| ExportError::invalid_glb(path, "truncated header"));

    if header(0)? != GLB_MAGIC {
        return Err(ExportError::invalid_glb(path, "bad magic"));
    }
    let version = header(4)?;
    if version != GLB_VERSION {
        return Err(ExportError::invalid_glb(path, format!("unsupported version {version}")));
    }
    let total_len = header(8)? as usize;
    if total_len > bytes.len() {
        return Err(ExportError::invalid_glb(path, "declared length exceeds file size"));
    }
    let bytes = &bytes[..total_len];

    let mut json = None;
    let mut bin = None;
    let mut offset = HEADER_LEN;
    while offset < bytes.len() {
        let (Some(len), Some(kind)) = (read_u32(bytes, offset), read_u32(bytes, offset + 4)) else {
            return Err(ExportError::invalid_glb(path, "truncated chunk header"));
        };
        let start = offset + CHUNK_HEADER_LEN;
        let data = bytes
            .get(start..start + len as usize)
            .ok_or_else(|| ExportError::invalid_glb(path, "chunk runs past end of file"))?;
        match kind {
            CHUNK_JSON if json.is_none() => json = Some(data.to_vec()),
            CHUNK_BIN if json.is_some() && bin.is_none() => bin = Some(data.to_vec()),
            CHUNK_JSON | CHUNK_BIN => {
                return Err(ExportError::invalid_glb(path, "unexpected chunk order"));
            }
            other => debug!(chunk = other, "skipping unknown glb chunk"),
        }
        offset = start + len as usize;
    }

    let json = json.ok_or_else(|| ExportError::invalid_glb(path, "missing JSON chunk"))?;
    Ok(GlbChunks { json, bin })
}

pub fn read_glb(path: &Path) -> ExportResult<GlbChunks> {
    let bytes = std::fs::read(path)?;
    parse_glb(&bytes, path)
}

/// Split `src` into `dst` (JSON) and a sibling `.bin`, pointing buffer 0 at
/// the new file
pub fn unpack_glb(src: &Path, dst: &Path) -> ExportResult<()> {
    let chunks = read_glb(src)?;
    let mut doc: serde_json::Value = serde_json::from_slice(&chunks.json)?;

    if let Some(bin) = &chunks.bin {
        let bin_path = dst.with_extension("bin");
        let uri = bin_path
            .file_name()
            .and_then(|s| s.to_str())
            .ok_or_else(|| ExportError::invalid_glb(src, "output path has no file name"))?
            .to_string();
        let buffer = doc
            .get_mut("buffers")
            .and_then(|buffers| buffers.get_mut(0))
            .and_then(serde_json::Value::as_object_mut)
            .ok_or_else(|| ExportError::invalid_glb(src, "BIN chunk without a buffer entry"))?;
        buffer.insert("uri".to_string(), serde_json::Value::String(uri));
        std::fs::write(&bin_path, bin)?;
    }

    std::fs::write(dst, serde_json::to_string_pretty(&doc)?)?;
    debug!(src = %src.display(), dst = %dst.display(), "unpacked glb");
    Ok(())
}
