//! Mesh compression seam
//!
//! The exporter never encodes geometry itself. A [`MeshCompressor`] turns a
//! mesh into an opaque `KHR_draco_mesh_compression` blob, and the exporter
//! records which attribute ids the blob uses.

use scenebake_core::Mesh;

/// Failure reported by a compressor
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct CodecError(pub String);

impl CodecError {
    pub fn new(message: impl Into<String>) -> Self {
        CodecError(message.into())
    }
}

/// Encodes a whole mesh into one blob
///
/// Implementations must assign attribute ids in the order given by
/// [`attribute_ids`].
pub trait MeshCompressor {
    fn compress(&self, mesh: &Mesh) -> Result<Vec<u8>, CodecError>;
}

impl<F> MeshCompressor for F
where
    F: Fn(&Mesh) -> Result<Vec<u8>, CodecError>,
{
    fn compress(&self, mesh: &Mesh) -> Result<Vec<u8>, CodecError> {
        self(mesh)
    }
}

/// Attribute id assignment inside a compressed blob: POSITION first, then
/// TEXCOORD_0 when present, then NORMAL when present.
pub fn attribute_ids(mesh: &Mesh) -> Vec<(&'static str, u32)> {
    let mut ids = vec![("POSITION", 0)];
    if mesh.has_texcoords() {
        ids.push(("TEXCOORD_0", ids.len() as u32));
    }
    if mesh.has_normals() {
        ids.push(("NORMAL", ids.len() as u32));
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use scenebake_core::{Vec2, Vec3};

    #[test]
    fn test_attribute_ids_with_texcoords() {
        let mesh = Mesh {
            positions: vec![Vec3::ZERO],
            normals: vec![Vec3::ONE],
            texcoords: vec![Vec2::ZERO],
            ..Default::default()
        };
        assert_eq!(attribute_ids(&mesh), [("POSITION", 0), ("TEXCOORD_0", 1), ("NORMAL", 2)]);
    }

    #[test]
    fn test_attribute_ids_positions_only() {
        let mesh = Mesh {
            positions: vec![Vec3::ZERO],
            ..Default::default()
        };
        assert_eq!(attribute_ids(&mesh), [("POSITION", 0)]);
    }

    #[test]
    fn test_closure_compressor() {
        let codec = |mesh: &Mesh| -> Result<Vec<u8>, CodecError> { Ok(vec![mesh.positions.len() as u8]) };
        let mesh = Mesh::new("m");
        assert_eq!(codec.compress(&mesh).unwrap(), vec![0]);
    }
}
