//! Buffer, buffer view and accessor records
//!
//! Entities live in arenas owned by the registerer and refer to each other
//! by index. Every index is assigned once at creation.

use std::borrow::Cow;

use super::{
    BoundValues, COMPONENT_TYPE_FLOAT, COMPONENT_TYPE_UNSIGNED_INT, COMPONENT_TYPE_UNSIGNED_SHORT,
    TARGET_ARRAY_BUFFER, TARGET_ELEMENT_ARRAY_BUFFER,
};

macro_rules! arena_id {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
            pub struct $name(pub usize);

            impl $name {
                pub fn index(self) -> usize {
                    self.0
                }
            }
        )*
    };
}

arena_id! {
    /// Index into the buffer arena
    BufferId,
    /// Index into the buffer view arena
    BufferViewId,
    /// Index into the accessor arena
    AccessorId,
    /// Index into the mesh arena
    MeshId,
    /// Index into the skin arena
    SkinId,
    /// Index into the node arena
    NodeId,
}

/// Byte alignment of every append
pub const BUFFER_ALIGNMENT: usize = 4;

/// A growable byte store written to one side file
#[derive(Debug, Clone)]
pub struct Buffer {
    name: String,
    data: Vec<u8>,
}

impl Buffer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn uri(&self) -> String {
        format!("{}.bin", self.name)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn byte_length(&self) -> usize {
        self.data.len()
    }

    /// Append bytes and return the offset they start at. The buffer is then
    /// zero-padded to the next 4-byte boundary.
    pub fn append(&mut self, bytes: &[u8]) -> usize {
        let offset = self.data.len();
        self.data.extend_from_slice(bytes);
        align_buffer(&mut self.data);
        offset
    }
}

/// Pad to the next 4-byte boundary
pub fn align_buffer(data: &mut Vec<u8>) {
    let padding = (BUFFER_ALIGNMENT - data.len() % BUFFER_ALIGNMENT) % BUFFER_ALIGNMENT;
    data.resize(data.len() + padding, 0);
}

/// GPU binding hint of a buffer view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewTarget {
    ArrayBuffer,
    ElementArrayBuffer,
}

impl ViewTarget {
    pub fn gl_enum(self) -> u32 {
        match self {
            ViewTarget::ArrayBuffer => TARGET_ARRAY_BUFFER,
            ViewTarget::ElementArrayBuffer => TARGET_ELEMENT_ARRAY_BUFFER,
        }
    }
}

/// A byte range inside one buffer
#[derive(Debug, Clone, PartialEq)]
pub struct BufferView {
    pub buffer: BufferId,
    pub byte_offset: usize,
    pub byte_length: usize,
    pub target: Option<ViewTarget>,
}

/// The accessor shapes the exporter emits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessorKind {
    /// u32 triangle indices
    Indices,
    Vec2F32,
    Vec3F32,
    Vec4F32,
    /// Joint indices
    Vec4U16,
    Mat4F32,
}

impl AccessorKind {
    pub fn component_type(self) -> u32 {
        match self {
            AccessorKind::Indices => COMPONENT_TYPE_UNSIGNED_INT,
            AccessorKind::Vec4U16 => COMPONENT_TYPE_UNSIGNED_SHORT,
            AccessorKind::Vec2F32
            | AccessorKind::Vec3F32
            | AccessorKind::Vec4F32
            | AccessorKind::Mat4F32 => COMPONENT_TYPE_FLOAT,
        }
    }

    pub fn type_name(self) -> &'static str {
        match self {
            AccessorKind::Indices => "SCALAR",
            AccessorKind::Vec2F32 => "VEC2",
            AccessorKind::Vec3F32 => "VEC3",
            AccessorKind::Vec4F32 | AccessorKind::Vec4U16 => "VEC4",
            AccessorKind::Mat4F32 => "MAT4",
        }
    }

    pub fn components(self) -> usize {
        match self {
            AccessorKind::Indices => 1,
            AccessorKind::Vec2F32 => 2,
            AccessorKind::Vec3F32 => 3,
            AccessorKind::Vec4F32 | AccessorKind::Vec4U16 => 4,
            AccessorKind::Mat4F32 => 16,
        }
    }
}

/// Per-component min/max of the packed elements
#[derive(Debug, Clone, PartialEq)]
pub enum Bounds {
    None,
    Float { min: Vec<f32>, max: Vec<f32> },
    Uint { min: Vec<u32>, max: Vec<u32> },
}

impl Bounds {
    /// Exact bounds of `N`-component float elements; `None` when empty
    pub fn of_floats<const N: usize>(data: &[[f32; N]]) -> Self {
        let Some(first) = data.first() else {
            return Bounds::None;
        };
        let mut min = *first;
        let mut max = *first;
        for element in &data[1..] {
            for i in 0..N {
                min[i] = min[i].min(element[i]);
                max[i] = max[i].max(element[i]);
            }
        }
        Bounds::Float {
            min: min.to_vec(),
            max: max.to_vec(),
        }
    }

    /// Exact bounds of scalar indices; `None` when empty
    pub fn of_indices(data: &[u32]) -> Self {
        match (data.iter().min(), data.iter().max()) {
            (Some(&min), Some(&max)) => Bounds::Uint {
                min: vec![min],
                max: vec![max],
            },
            _ => Bounds::None,
        }
    }

    pub(crate) fn to_json(&self) -> (Option<BoundValues>, Option<BoundValues>) {
        match self {
            Bounds::None => (None, None),
            Bounds::Float { min, max } => (
                Some(BoundValues::Float(min.clone())),
                Some(BoundValues::Float(max.clone())),
            ),
            Bounds::Uint { min, max } => (
                Some(BoundValues::Uint(min.clone())),
                Some(BoundValues::Uint(max.clone())),
            ),
        }
    }
}

/// Typed view over a buffer view, or codec-owned metadata when
/// `buffer_view` is absent
#[derive(Debug, Clone, PartialEq)]
pub struct Accessor {
    pub buffer_view: Option<BufferViewId>,
    pub byte_offset: Option<usize>,
    pub kind: AccessorKind,
    pub count: usize,
    pub bounds: Bounds,
}

/// A scalar that can be written little-endian into a buffer
pub trait Component: bytemuck::Pod {
    fn extend_le(self, out: &mut Vec<u8>);
}

impl Component for f32 {
    fn extend_le(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }
}

impl Component for u16 {
    fn extend_le(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }
}

impl Component for u32 {
    fn extend_le(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }
}

/// Little-endian bytes of a component slice, borrowed on little-endian hosts
pub fn le_bytes<T: Component>(data: &[T]) -> Cow<'_, [u8]> {
    if cfg!(target_endian = "little") {
        Cow::Borrowed(bytemuck::cast_slice(data))
    } else {
        let mut out = Vec::with_capacity(std::mem::size_of_val(data));
        for &value in data {
            value.extend_le(&mut out);
        }
        Cow::Owned(out)
    }
}
