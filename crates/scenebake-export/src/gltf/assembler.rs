//! Document assembly
//!
//! Turns the registerer's arenas into the serializable [`Gltf`] tree. Every
//! cross reference is already an arena index, so assembly is a straight
//! mapping with no lookups.

use std::collections::BTreeMap;

use scenebake_core::{Mat4x4, Quat, Transform, Vec3};

use super::primitives;
use super::registerer::{MeshRecord, NodeRecord, ObjectRegisterer, SkinRecord};
use super::vrm::Vrm;
use super::{
    Accessor, Asset, Buffer, BufferView, DracoMeshCompression, Gltf, Image, Material, Mesh, Node, Primitive,
    PrimitiveExtensions, RootExtensions, Sampler, Scene, Skin, Texture, EXT_DRACO, EXT_LTE_PBR, EXT_LTE_UDIM,
    EXT_PRELOAD_URI, EXT_VRM, MODE_TRIANGLES,
};
use crate::options::{ExportOptions, OutputBuffer};

/// Tolerance below which a transform component counts as its default
const TRANSFORM_EPSILON: f32 = 1e-15;

/// Builds the glTF document of one export
pub struct DocumentAssembler<'a> {
    registerer: &'a ObjectRegisterer,
    options: &'a ExportOptions,
    materials: Vec<Material>,
    images: Vec<Image>,
    textures: Vec<Texture>,
}

impl<'a> DocumentAssembler<'a> {
    pub fn new(registerer: &'a ObjectRegisterer, options: &'a ExportOptions) -> Self {
        Self {
            registerer,
            options,
            materials: Vec::new(),
            images: Vec::new(),
            textures: Vec::new(),
        }
    }

    pub fn with_materials(mut self, materials: Vec<Material>) -> Self {
        self.materials = materials;
        self
    }

    pub fn with_images(mut self, images: Vec<Image>, textures: Vec<Texture>) -> Self {
        self.images = images;
        self.textures = textures;
        self
    }

    pub fn assemble(self) -> Gltf {
        let reg = self.registerer;
        let nodes: Vec<Node> = reg.nodes().iter().map(node_to_gltf).collect();

        let extensions = self.options.vrm.as_ref().map(|vrm| RootExtensions {
            vrm: Some(Vrm::new(
                vrm,
                &reg.nodes().iter().map(|n| n.name.as_str()).collect::<Vec<_>>(),
                &self.materials,
            )),
        });

        let scene_nodes = if nodes.is_empty() { Vec::new() } else { vec![0] };
        let material_count = self.materials.len();

        Gltf {
            asset: Asset {
                generator: Some(format!("scenebake {}", env!("CARGO_PKG_VERSION"))),
                version: "2.0".to_string(),
            },
            extensions_used: self.extensions_used(),
            extensions_required: self.extensions_required(),
            scene: Some(0),
            scenes: vec![Scene { nodes: scene_nodes }],
            nodes,
            meshes: reg.meshes().iter().map(|m| mesh_to_gltf(m, material_count)).collect(),
            accessors: reg.accessors().iter().map(accessor_to_gltf).collect(),
            buffer_views: reg.buffer_views().iter().map(buffer_view_to_gltf).collect(),
            buffers: reg.buffers().iter().map(buffer_to_gltf).collect(),
            skins: reg
                .skins()
                .iter()
                .filter(|skin| !skin.joints.is_empty())
                .map(skin_to_gltf)
                .collect(),
            samplers: vec![Sampler::default()],
            images: self.images,
            textures: self.textures,
            materials: self.materials,
            extensions,
        }
    }

    fn extensions_used(&self) -> Vec<String> {
        let mut used = Vec::new();
        if self.options.output_buffer.writes_compressed() {
            used.push(EXT_DRACO);
        }
        if self.options.make_preload_texture {
            used.push(EXT_PRELOAD_URI);
        }
        if self.options.vrm.is_some() {
            used.push(EXT_VRM);
        }
        used.push(EXT_LTE_PBR);
        used.push(EXT_LTE_UDIM);
        used.into_iter().map(String::from).collect()
    }

    fn extensions_required(&self) -> Vec<String> {
        let mut required = Vec::new();
        if self.options.output_buffer == OutputBuffer::Draco {
            required.push(EXT_DRACO);
        }
        if self.options.make_preload_texture {
            required.push(EXT_PRELOAD_URI);
        }
        required.into_iter().map(String::from).collect()
    }
}

fn differs(a: f32, b: f32) -> bool {
    (a - b).abs() > TRANSFORM_EPSILON
}

fn differs_from(values: &[f32], default: &[f32]) -> bool {
    values.iter().zip(default).any(|(&a, &b)| differs(a, b))
}

/// Node JSON: TRS fields that differ from their defaults, or the matrix when
/// it is not the identity
pub(crate) fn node_to_gltf(record: &NodeRecord) -> Node {
    let mut node = Node {
        name: record.name.clone(),
        children: record.children.iter().map(|c| c.index()).collect(),
        mesh: record.mesh.map(|m| m.index()),
        skin: record.skin.map(|s| s.index()),
        ..Default::default()
    };

    match record.transform {
        Transform::Trs { translation, rotation, scale } => {
            let t = translation.to_array();
            if differs_from(&t, &Vec3::ZERO.to_array()) {
                node.translation = Some(t);
            }
            let r = rotation.to_array();
            if differs_from(&r, &Quat::IDENTITY.to_array()) {
                node.rotation = Some(r);
            }
            let s = scale.to_array();
            if differs_from(&s, &Vec3::ONE.to_array()) {
                node.scale = Some(s);
            }
        }
        Transform::Matrix(matrix) => {
            let m = matrix.to_flat();
            if differs_from(&m, &Mat4x4::IDENTITY.to_flat()) {
                node.matrix = Some(m);
            }
        }
    }
    node
}

/// A primitive references its material only when that material is emitted
fn mesh_to_gltf(record: &MeshRecord, material_count: usize) -> Mesh {
    let attributes = record
        .attributes
        .iter()
        .map(|(name, id)| (name.to_string(), id.index()))
        .collect();

    let targets = record
        .targets
        .iter()
        .map(|target| {
            let mut map = BTreeMap::new();
            if let Some(normal) = target.normal {
                map.insert("NORMAL".to_string(), normal.index());
            }
            map.insert("POSITION".to_string(), target.position.index());
            map
        })
        .collect();

    let extensions = record.compressed.as_ref().map(|compressed| PrimitiveExtensions {
        draco: DracoMeshCompression {
            buffer_view: compressed.buffer_view.index(),
            attributes: compressed
                .attributes
                .iter()
                .map(|(name, id)| (name.to_string(), *id))
                .collect(),
        },
    });

    Mesh {
        name: record.name.clone(),
        primitives: vec![Primitive {
            attributes,
            indices: Some(record.indices.index()),
            mode: MODE_TRIANGLES,
            material: (record.material < material_count).then_some(record.material),
            targets,
            extensions,
        }],
        weights: record.targets.iter().map(|t| t.weight).collect(),
    }
}

fn accessor_to_gltf(accessor: &primitives::Accessor) -> Accessor {
    let (min, max) = accessor.bounds.to_json();
    Accessor {
        buffer_view: accessor.buffer_view.map(|v| v.index()),
        byte_offset: accessor.byte_offset,
        component_type: accessor.kind.component_type(),
        count: accessor.count,
        accessor_type: accessor.kind.type_name().to_string(),
        min,
        max,
    }
}

fn buffer_view_to_gltf(view: &primitives::BufferView) -> BufferView {
    BufferView {
        buffer: view.buffer.index(),
        byte_offset: view.byte_offset,
        byte_length: view.byte_length,
        target: view.target.map(|t| t.gl_enum()),
    }
}

fn buffer_to_gltf(buffer: &primitives::Buffer) -> Buffer {
    Buffer {
        byte_length: buffer.byte_length(),
        uri: Some(buffer.uri()),
    }
}

fn skin_to_gltf(skin: &SkinRecord) -> Skin {
    Skin {
        name: skin.name.clone(),
        joints: skin.joints.iter().map(|j| j.index()).collect(),
        skeleton: skin.root_joint().map(|j| j.index()),
        inverse_bind_matrices: Some(skin.inverse_bind_matrices.index()),
    }
}
