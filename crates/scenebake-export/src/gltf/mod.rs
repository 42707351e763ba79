//! glTF 2.0 exporter
//!
//! Exports scene graphs to glTF 2.0 (JSON + BIN, or GLB). The types in this
//! module are the serialized document; registration state lives in
//! [`registerer`].

mod assembler;
mod exporter;
mod glb;
mod material;
mod morph;
mod primitives;
mod registerer;
mod skin;
mod vrm;

pub use assembler::DocumentAssembler;
pub use exporter::{ExportSummary, GltfExporter};
pub use glb::{parse_glb, read_glb, unpack_glb, write_glb, GlbChunks};
pub use material::{LtePbrMaterial, TextureCatalog};
pub use primitives::{
    AccessorKind, Bounds, BufferId, BufferViewId, AccessorId, MeshId, NodeId, SkinId, ViewTarget,
};
pub use registerer::{BufferPolicy, BufferSlot, ObjectRegisterer};
pub use skin::{pack_skin_weights, top_influences};
pub use vrm::{find_bone_node, Vrm, HUMAN_BONES};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// glTF 2.0 root structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gltf {
    pub asset: Asset,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub extensions_used: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub extensions_required: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scene: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub scenes: Vec<Scene>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub nodes: Vec<Node>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub meshes: Vec<Mesh>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub accessors: Vec<Accessor>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub buffer_views: Vec<BufferView>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub buffers: Vec<Buffer>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub skins: Vec<Skin>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub samplers: Vec<Sampler>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub images: Vec<Image>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub textures: Vec<Texture>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub materials: Vec<Material>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<RootExtensions>,
}

/// glTF asset metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generator: Option<String>,
    pub version: String,
}

/// glTF scene
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    #[serde(default)]
    pub nodes: Vec<usize>,
}

/// glTF node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translation: Option<[f32; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation: Option<[f32; 4]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<[f32; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matrix: Option<[f32; 16]>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub children: Vec<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mesh: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skin: Option<usize>,
}

/// glTF mesh
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    pub name: String,
    pub primitives: Vec<Primitive>,
    /// Default morph weights, parallel to the primitive's `targets`
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub weights: Vec<f32>,
}

/// glTF mesh primitive
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Primitive {
    pub attributes: BTreeMap<String, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indices: Option<usize>,
    pub mode: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub material: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub targets: Vec<BTreeMap<String, usize>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<PrimitiveExtensions>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimitiveExtensions {
    #[serde(rename = "KHR_draco_mesh_compression")]
    pub draco: DracoMeshCompression,
}

/// `KHR_draco_mesh_compression` primitive extension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DracoMeshCompression {
    pub buffer_view: usize,
    pub attributes: BTreeMap<String, u32>,
}

/// Accessor min/max payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BoundValues {
    Uint(Vec<u32>),
    Float(Vec<f32>),
}

/// glTF accessor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Accessor {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buffer_view: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub byte_offset: Option<usize>,
    pub component_type: u32,
    pub count: usize,
    #[serde(rename = "type")]
    pub accessor_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<BoundValues>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<BoundValues>,
}

/// glTF buffer view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferView {
    pub buffer: usize,
    pub byte_offset: usize,
    pub byte_length: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<u32>,
}

/// glTF buffer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Buffer {
    pub byte_length: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

/// glTF skin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Skin {
    pub name: String,
    pub joints: Vec<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skeleton: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inverse_bind_matrices: Option<usize>,
}

/// glTF texture sampler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sampler {
    pub mag_filter: u32,
    pub min_filter: u32,
    pub wrap_s: u32,
    pub wrap_t: u32,
}

impl Default for Sampler {
    fn default() -> Self {
        Self {
            mag_filter: FILTER_LINEAR,
            min_filter: FILTER_LINEAR,
            wrap_s: WRAP_CLAMP_TO_EDGE,
            wrap_t: WRAP_CLAMP_TO_EDGE,
        }
    }
}

/// glTF image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub name: String,
    pub uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<ImageExtensions>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageExtensions {
    #[serde(rename = "KSK_preloadUri", skip_serializing_if = "Option::is_none")]
    pub preload_uri: Option<PreloadUri>,
    #[serde(rename = "LTE_UDIM_texture", skip_serializing_if = "Option::is_none")]
    pub udim: Option<UdimTexture>,
}

/// Low-resolution stand-in shown while the full image loads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreloadUri {
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UdimTexture {
    pub tiles: Vec<i32>,
    pub url: String,
}

/// glTF texture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Texture {
    pub sampler: usize,
    pub source: usize,
}

/// Reference from a material to a texture
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TextureInfo {
    pub index: usize,
}

/// glTF material
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    pub name: String,
    pub emissive_factor: [f32; 3],
    pub pbr_metallic_roughness: PbrMetallicRoughness,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normal_texture: Option<TextureInfo>,
    pub alpha_mode: String,
    pub extensions: MaterialExtensions,
}

/// PBR metallic roughness material
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PbrMetallicRoughness {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_color_texture: Option<TextureInfo>,
    pub base_color_factor: [f32; 4],
    pub metallic_factor: f32,
    pub roughness_factor: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialExtensions {
    #[serde(rename = "LTE_PBR_material")]
    pub lte_pbr: LtePbrMaterial,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootExtensions {
    #[serde(rename = "VRM", skip_serializing_if = "Option::is_none")]
    pub vrm: Option<Vrm>,
}

// glTF component type constants
pub const COMPONENT_TYPE_UNSIGNED_SHORT: u32 = 5123;
pub const COMPONENT_TYPE_UNSIGNED_INT: u32 = 5125;
pub const COMPONENT_TYPE_FLOAT: u32 = 5126;

// glTF buffer view target constants
pub const TARGET_ARRAY_BUFFER: u32 = 34962;
pub const TARGET_ELEMENT_ARRAY_BUFFER: u32 = 34963;

// glTF primitive mode constants
pub const MODE_TRIANGLES: u32 = 4;

// Sampler constants
pub const FILTER_LINEAR: u32 = 9729;
pub const WRAP_CLAMP_TO_EDGE: u32 = 33071;

// Extension names
pub const EXT_DRACO: &str = "KHR_draco_mesh_compression";
pub const EXT_PRELOAD_URI: &str = "KSK_preloadUri";
pub const EXT_VRM: &str = "VRM";
pub const EXT_LTE_PBR: &str = "LTE_PBR_material";
pub const EXT_LTE_UDIM: &str = "LTE_UDIM_texture";
