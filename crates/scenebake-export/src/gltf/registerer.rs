//! Object registration: index assignment and data packing
//!
//! [`ObjectRegisterer`] walks the input scene once, creates one output node
//! per input node, then packs each node's mesh into buffers. It owns every
//! arena the document assembler later reads.

use std::collections::BTreeMap;

use scenebake_core::{Mesh, SceneNode, Transform, Vec3};
use tracing::{debug, warn};

use super::morph;
use super::primitives::{
    self, le_bytes, Accessor, AccessorId, AccessorKind, Bounds, BufferId, BufferView, BufferViewId,
    Component, MeshId, NodeId, SkinId, ViewTarget,
};
use super::skin;
use crate::codec::{self, MeshCompressor};
use crate::error::{ExportError, ExportResult};
use crate::options::{CodecFailure, ExportOptions, OutputBuffer};

/// Logical destination of appended bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BufferSlot {
    /// Plain typed arrays
    Plain,
    /// Codec blobs of every mesh
    Compressed,
    /// Codec blob of one mesh
    CompressedMesh(usize),
}

/// Maps registration requests to buffer slots and slots to file names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferPolicy {
    pub mode: OutputBuffer,
    pub share_compressed: bool,
}

impl BufferPolicy {
    pub fn new(mode: OutputBuffer, share_compressed: bool) -> Self {
        Self { mode, share_compressed }
    }

    pub fn from_options(options: &ExportOptions) -> Self {
        Self::new(options.output_buffer, options.share_compressed_buffer)
    }

    /// Slot that receives the codec blob of mesh `mesh_index`
    pub fn codec_slot(&self, mesh_index: usize) -> BufferSlot {
        if self.share_compressed {
            BufferSlot::Compressed
        } else {
            BufferSlot::CompressedMesh(mesh_index)
        }
    }

    /// Slot that receives typed arrays of mesh `mesh_index`
    pub fn plain_slot(&self, mesh_index: usize) -> BufferSlot {
        match self.mode {
            OutputBuffer::Draco => self.codec_slot(mesh_index),
            OutputBuffer::Bin | OutputBuffer::Both => BufferSlot::Plain,
        }
    }

    /// File stem of the buffer behind `slot`
    pub fn buffer_name(&self, slot: BufferSlot, basename: &str) -> String {
        let compressed_stem = match self.mode {
            OutputBuffer::Both => format!("{basename}_draco"),
            OutputBuffer::Bin | OutputBuffer::Draco => basename.to_string(),
        };
        match slot {
            BufferSlot::Plain => basename.to_string(),
            BufferSlot::Compressed => compressed_stem,
            BufferSlot::CompressedMesh(index) => format!("{compressed_stem}_{index:03}"),
        }
    }
}

/// Output node
#[derive(Debug, Clone)]
pub struct NodeRecord {
    pub name: String,
    pub path: String,
    pub transform: Transform,
    pub children: Vec<NodeId>,
    pub mesh: Option<MeshId>,
    pub skin: Option<SkinId>,
}

/// Codec-encoded primitive data
#[derive(Debug, Clone)]
pub struct CompressedPrimitive {
    pub buffer_view: BufferViewId,
    /// Attribute name -> id inside the blob
    pub attributes: Vec<(&'static str, u32)>,
}

/// Morph target deltas of one mesh
#[derive(Debug, Clone)]
pub struct MorphTargetRecord {
    pub normal: Option<AccessorId>,
    pub position: AccessorId,
    pub weight: f32,
}

/// Output mesh with a single triangle primitive
#[derive(Debug, Clone)]
pub struct MeshRecord {
    pub name: String,
    pub attributes: BTreeMap<&'static str, AccessorId>,
    pub indices: AccessorId,
    pub material: usize,
    pub targets: Vec<MorphTargetRecord>,
    pub compressed: Option<CompressedPrimitive>,
}

/// Output skin
#[derive(Debug, Clone)]
pub struct SkinRecord {
    pub name: String,
    pub joints: Vec<NodeId>,
    pub joint_paths: Vec<String>,
    pub inverse_bind_matrices: AccessorId,
}

impl SkinRecord {
    pub fn root_joint(&self) -> Option<NodeId> {
        self.joints.first().copied()
    }

    pub fn joint_index(&self, path: &str) -> Option<usize> {
        self.joint_paths.iter().position(|p| p == path)
    }
}

/// Where vertex attributes of a mesh end up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AttributeSink {
    /// Typed arrays in a buffer, one view per attribute
    Buffer(BufferSlot),
    /// Encoded by the codec; accessors carry metadata only
    Codec,
}

/// Central indexing authority for one export
#[derive(Debug)]
pub struct ObjectRegisterer {
    basename: String,
    policy: BufferPolicy,
    nodes: Vec<NodeRecord>,
    meshes: Vec<MeshRecord>,
    accessors: Vec<Accessor>,
    buffer_views: Vec<BufferView>,
    buffers: Vec<primitives::Buffer>,
    skins: Vec<SkinRecord>,
    slots: BTreeMap<BufferSlot, BufferId>,
}

impl ObjectRegisterer {
    pub fn new(basename: impl Into<String>, policy: BufferPolicy) -> Self {
        Self {
            basename: basename.into(),
            policy,
            nodes: Vec::new(),
            meshes: Vec::new(),
            accessors: Vec::new(),
            buffer_views: Vec::new(),
            buffers: Vec::new(),
            skins: Vec::new(),
            slots: BTreeMap::new(),
        }
    }

    pub fn basename(&self) -> &str {
        &self.basename
    }

    pub fn policy(&self) -> BufferPolicy {
        self.policy
    }

    pub fn nodes(&self) -> &[NodeRecord] {
        &self.nodes
    }

    pub fn meshes(&self) -> &[MeshRecord] {
        &self.meshes
    }

    pub fn accessors(&self) -> &[Accessor] {
        &self.accessors
    }

    pub fn buffer_views(&self) -> &[BufferView] {
        &self.buffer_views
    }

    pub fn buffers(&self) -> &[primitives::Buffer] {
        &self.buffers
    }

    pub fn skins(&self) -> &[SkinRecord] {
        &self.skins
    }

    /// Register everything below `root`: nodes first, then the skin (plain
    /// modes only), then meshes in node-creation order.
    pub fn register_objects(
        &mut self,
        root: &SceneNode,
        compressor: Option<&dyn MeshCompressor>,
        on_failure: CodecFailure,
    ) -> ExportResult<()> {
        let pairs = self.create_nodes(root);

        if self.policy.mode.writes_plain() {
            skin::register_skins(self, root);
        } else if has_skin_weights(root) {
            warn!("skin weights are not exported in draco-only mode");
        }

        for (node, input) in pairs {
            self.register_components(node, input, compressor, on_failure)?;
        }
        Ok(())
    }

    /// Allocate the next node index and copy the authored transform verbatim
    pub fn create_node(&mut self, input: &SceneNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeRecord {
            name: input.name.clone(),
            path: input.path.clone(),
            transform: input.transform,
            children: Vec::new(),
            mesh: None,
            skin: None,
        });
        id
    }

    /// Create nodes depth-first, parent before children, linking children
    pub fn create_nodes<'a>(&mut self, root: &'a SceneNode) -> Vec<(NodeId, &'a SceneNode)> {
        let mut pairs = Vec::new();
        self.create_subtree(root, &mut pairs);
        pairs
    }

    fn create_subtree<'a>(&mut self, input: &'a SceneNode, pairs: &mut Vec<(NodeId, &'a SceneNode)>) -> NodeId {
        let id = self.create_node(input);
        pairs.push((id, input));
        for child in &input.children {
            let child_id = self.create_subtree(child, pairs);
            self.nodes[id.0].children.push(child_id);
        }
        id
    }

    /// Pack the mesh of `input` (if any) and attach it to `node`.
    ///
    /// Returns the mesh index, or `None` when the node has no mesh or the
    /// codec rejected it under [`CodecFailure::SkipMesh`].
    pub fn register_components(
        &mut self,
        node: NodeId,
        input: &SceneNode,
        compressor: Option<&dyn MeshCompressor>,
        on_failure: CodecFailure,
    ) -> ExportResult<Option<MeshId>> {
        let Some(mesh) = &input.mesh else {
            return Ok(None);
        };
        let mesh_index = self.meshes.len();

        let blob = if self.policy.mode.writes_compressed() {
            let compressor =
                compressor.ok_or(ExportError::CodecUnavailable(self.policy.mode.as_str()))?;
            match compressor.compress(mesh) {
                Ok(bytes) => Some(bytes),
                Err(source) => match (self.policy.mode, on_failure) {
                    (OutputBuffer::Draco, CodecFailure::Abort) => {
                        return Err(ExportError::Codec {
                            mesh: mesh.name.clone(),
                            source,
                        });
                    }
                    (OutputBuffer::Draco, CodecFailure::SkipMesh) => {
                        warn!(mesh = %mesh.name, error = %source, "compression failed, mesh skipped");
                        return Ok(None);
                    }
                    _ => {
                        warn!(mesh = %mesh.name, error = %source, "compression failed, writing plain data only");
                        None
                    }
                },
            }
        } else {
            None
        };

        let extras = self.policy.plain_slot(mesh_index);
        let sink = match self.policy.mode {
            OutputBuffer::Draco => AttributeSink::Codec,
            OutputBuffer::Bin | OutputBuffer::Both => AttributeSink::Buffer(extras),
        };

        let mut attributes = BTreeMap::new();

        let indices = self.pack(
            sink,
            AccessorKind::Indices,
            &mesh.indices,
            Bounds::of_indices(&mesh.indices),
            Some(ViewTarget::ElementArrayBuffer),
        );

        if mesh.has_normals() {
            let normals = normalized(&mesh.normals);
            let bounds = Bounds::of_floats(&normals);
            let id = self.pack(sink, AccessorKind::Vec3F32, normals.as_flattened(), bounds, Some(ViewTarget::ArrayBuffer));
            attributes.insert("NORMAL", id);
        }

        let positions: Vec<[f32; 3]> = mesh.positions.iter().map(|p| p.to_array()).collect();
        let bounds = Bounds::of_floats(&positions);
        let id = self.pack(sink, AccessorKind::Vec3F32, positions.as_flattened(), bounds, Some(ViewTarget::ArrayBuffer));
        attributes.insert("POSITION", id);

        if mesh.has_texcoords() {
            let texcoords: Vec<[f32; 2]> = mesh.texcoords.iter().map(|t| t.to_array()).collect();
            let bounds = Bounds::of_floats(&texcoords);
            let id = self.pack(sink, AccessorKind::Vec2F32, texcoords.as_flattened(), bounds, Some(ViewTarget::ArrayBuffer));
            attributes.insert("TEXCOORD_0", id);
        }

        if let (Some(weights), Some(skin_record)) = (&mesh.skin_weights, self.skins.first()) {
            let (joints, weights) = skin::pack_skin_weights(|path| skin_record.joint_index(path), weights);
            if !joints.is_empty() {
                let slot = AttributeSink::Buffer(extras);
                let id = self.pack(slot, AccessorKind::Vec4U16, joints.as_flattened(), Bounds::None, Some(ViewTarget::ArrayBuffer));
                attributes.insert("JOINTS_0", id);
                let id = self.pack(slot, AccessorKind::Vec4F32, weights.as_flattened(), Bounds::None, Some(ViewTarget::ArrayBuffer));
                attributes.insert("WEIGHTS_0", id);
            }
            self.nodes[node.0].skin = Some(SkinId(0));
        }

        let targets = morph::register_morph_targets(self, mesh, extras);

        let codec_slot = self.policy.codec_slot(mesh_index);
        let compressed = blob.map(|bytes| CompressedPrimitive {
            buffer_view: self.add_raw_view(codec_slot, &bytes, None),
            attributes: codec::attribute_ids(mesh),
        });

        let id = MeshId(mesh_index);
        debug!(
            mesh = %mesh.name,
            index = mesh_index,
            vertices = mesh.vertex_count(),
            compressed = compressed.is_some(),
            "registered mesh"
        );
        self.meshes.push(MeshRecord {
            name: mesh.name.clone(),
            attributes,
            indices,
            material: mesh.primary_material(),
            targets,
            compressed,
        });
        self.nodes[node.0].mesh = Some(id);
        Ok(Some(id))
    }

    /// Buffer behind `slot`, created on first use
    pub(crate) fn buffer_for(&mut self, slot: BufferSlot) -> BufferId {
        if let Some(&id) = self.slots.get(&slot) {
            return id;
        }
        let id = BufferId(self.buffers.len());
        let name = self.policy.buffer_name(slot, &self.basename);
        debug!(buffer = %name, index = id.0, "created buffer");
        self.buffers.push(primitives::Buffer::new(name));
        self.slots.insert(slot, id);
        id
    }

    /// Append raw bytes as one view; `byteLength` excludes the padding
    pub(crate) fn add_raw_view(&mut self, slot: BufferSlot, bytes: &[u8], target: Option<ViewTarget>) -> BufferViewId {
        let buffer = self.buffer_for(slot);
        let byte_offset = self.buffers[buffer.0].append(bytes);
        let id = BufferViewId(self.buffer_views.len());
        self.buffer_views.push(BufferView {
            buffer,
            byte_offset,
            byte_length: bytes.len(),
            target,
        });
        id
    }

    pub(crate) fn add_accessor(&mut self, accessor: Accessor) -> AccessorId {
        let id = AccessorId(self.accessors.len());
        self.accessors.push(accessor);
        id
    }

    pub(crate) fn add_skin(&mut self, skin: SkinRecord) -> SkinId {
        let id = SkinId(self.skins.len());
        self.skins.push(skin);
        id
    }

    /// Create an accessor over `data` (flattened components). With a buffer
    /// sink the data gets its own view; with the codec sink only metadata is
    /// recorded.
    pub(crate) fn pack<T: Component>(
        &mut self,
        sink: AttributeSink,
        kind: AccessorKind,
        data: &[T],
        bounds: Bounds,
        target: Option<ViewTarget>,
    ) -> AccessorId {
        let count = data.len() / kind.components();
        let (buffer_view, byte_offset) = match sink {
            AttributeSink::Buffer(slot) => {
                let view = self.add_raw_view(slot, &le_bytes(data), target);
                (Some(view), Some(0))
            }
            AttributeSink::Codec => (None, None),
        };
        self.add_accessor(Accessor {
            buffer_view,
            byte_offset,
            kind,
            count,
            bounds,
        })
    }
}

/// Unit-length copies of `normals`; near-zero vectors pass through
pub fn normalized(normals: &[Vec3]) -> Vec<[f32; 3]> {
    normals
        .iter()
        .map(|n| {
            let len_sq = n.length_squared();
            if len_sq > 1e-6 {
                let inv = 1.0 / len_sq.sqrt();
                [n.x * inv, n.y * inv, n.z * inv]
            } else {
                n.to_array()
            }
        })
        .collect()
}

fn has_skin_weights(root: &SceneNode) -> bool {
    let mut found = false;
    root.walk(&mut |node| {
        found |= node.mesh.as_ref().is_some_and(|m: &Mesh| m.skin_weights.is_some());
    });
    found
}
