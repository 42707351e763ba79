//! Export configuration
//!
//! Options load from a camelCase JSON document; every field has a default so
//! a partial file is enough.

use serde::{Deserialize, Serialize};

use crate::textures::ResizeOptions;

/// Which binary payloads an export writes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OutputBuffer {
    /// Plain typed arrays only
    #[default]
    Bin,
    /// Codec blobs only
    Draco,
    /// Plain arrays plus codec blobs
    Both,
}

impl OutputBuffer {
    pub fn writes_plain(self) -> bool {
        matches!(self, OutputBuffer::Bin | OutputBuffer::Both)
    }

    pub fn writes_compressed(self) -> bool {
        matches!(self, OutputBuffer::Draco | OutputBuffer::Both)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OutputBuffer::Bin => "bin",
            OutputBuffer::Draco => "draco",
            OutputBuffer::Both => "both",
        }
    }
}

/// What to do when the codec rejects a mesh in compressed-only mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CodecFailure {
    #[default]
    SkipMesh,
    Abort,
}

/// Output container
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Container {
    /// `.gltf` JSON with side `.bin` files
    #[default]
    Gltf,
    /// Single binary `.glb`
    Glb,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AllowedUser {
    OnlyAuthor,
    ExplictlyLicensedPerson,
    #[default]
    Everyone,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Usage {
    #[default]
    Allow,
    Disallow,
}

/// Humanoid avatar metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VrmOptions {
    pub title: String,
    pub version: String,
    pub author: String,
    pub contact_information: String,
    pub reference: String,
    pub allowed_user: AllowedUser,
    pub violent_usage: Usage,
    pub sexual_usage: Usage,
    pub commercial_usage: Usage,
    pub other_permission_url: String,
    pub license_name: String,
    pub other_license_url: String,
}

/// glTF export options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExportOptions {
    pub output_buffer: OutputBuffer,
    /// Union every codec blob into one buffer instead of one buffer per mesh
    pub share_compressed_buffer: bool,
    pub codec_failure: CodecFailure,
    pub container: Container,
    pub pretty_json: bool,
    /// Reject meshes whose arrays disagree in length or index out of range
    pub strict_validation: bool,
    /// Declare the preload URI extension as used and required
    pub make_preload_texture: bool,
    /// Switch a material to BLEND when its base color image carries alpha
    pub detect_texture_alpha: bool,
    /// Copy referenced images next to the output, resizing as configured
    pub textures: Option<ResizeOptions>,
    /// Attach humanoid avatar metadata
    pub vrm: Option<VrmOptions>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            output_buffer: OutputBuffer::Bin,
            share_compressed_buffer: true,
            codec_failure: CodecFailure::SkipMesh,
            container: Container::Gltf,
            pretty_json: true,
            strict_validation: true,
            make_preload_texture: false,
            detect_texture_alpha: false,
            textures: None,
            vrm: None,
        }
    }
}
