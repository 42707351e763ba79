//! Export error type

use std::path::PathBuf;

use crate::codec::CodecError;
use crate::textures::TextureError;

/// Errors raised by a glTF export or a GLB unpack
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid scene: {0}")]
    Scene(#[from] scenebake_core::Error),

    #[error("Compression failed for mesh '{mesh}': {source}")]
    Codec {
        mesh: String,
        #[source]
        source: CodecError,
    },

    #[error("Output mode '{0}' needs a mesh compressor but none was supplied")]
    CodecUnavailable(&'static str),

    #[error("Export produced no binary buffers")]
    EmptyBuffers,

    #[error("GLB output holds exactly one buffer, found {0}")]
    GlbBufferCount(usize),

    #[error("Invalid GLB file {path}: {message}")]
    InvalidGlb { path: PathBuf, message: String },

    #[error("Texture error: {0}")]
    Texture(#[from] TextureError),
}

pub type ExportResult<T> = Result<T, ExportError>;

impl ExportError {
    pub(crate) fn invalid_glb(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        ExportError::InvalidGlb {
            path: path.into(),
            message: message.into(),
        }
    }
}
