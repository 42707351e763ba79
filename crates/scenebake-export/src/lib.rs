//! scenebake Export Pipeline
//!
//! Converts a [`scenebake_core::SceneNode`] tree into glTF 2.0:
//! - JSON document plus side `.bin` buffers, or a single GLB
//! - optional `KHR_draco_mesh_compression` through a caller-supplied codec
//! - vendor material, UDIM and preload-texture extensions
//! - humanoid avatar metadata (`VRM`)
//! - texture copy with resizing

pub mod codec;
pub mod error;
pub mod gltf;
pub mod options;
pub mod textures;

pub use codec::{attribute_ids, CodecError, MeshCompressor};
pub use error::{ExportError, ExportResult};
pub use gltf::{unpack_glb, ExportSummary, Gltf, GltfExporter};
pub use options::{AllowedUser, CodecFailure, Container, ExportOptions, OutputBuffer, Usage, VrmOptions};
pub use textures::{convert_or_resize_image, ImageFormat, ResizeOptions, TextureError};
