//! Scene-graph input model
//!
//! The exporter consumes these types read-only. A scene is a tree of
//! [`SceneNode`]s; the root node also carries the material list.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::material::Material;
use crate::types::{Mat4x4, Quat, Vec2, Vec3};

/// Local transform of a node, in whichever representation it was authored
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Transform {
    Matrix(Mat4x4),
    Trs {
        translation: Vec3,
        rotation: Quat,
        scale: Vec3,
    },
}

impl Transform {
    pub fn trs(translation: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Transform::Trs { translation, rotation, scale }
    }

    pub fn is_trs(&self) -> bool {
        matches!(self, Transform::Trs { .. })
    }
}

impl Default for Transform {
    fn default() -> Self {
        Transform::Matrix(Mat4x4::IDENTITY)
    }
}

/// Per-vertex skin influences expressed by joint path
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SkinWeights {
    /// One map per vertex: joint path -> weight
    pub weights: Vec<BTreeMap<String, f32>>,
    /// Joint path -> bind matrix
    pub bind_matrices: BTreeMap<String, Mat4x4>,
}

impl SkinWeights {
    /// Every joint path referenced by at least one vertex, in path order
    pub fn referenced_joints(&self) -> BTreeSet<&str> {
        self.weights
            .iter()
            .flat_map(|vertex| vertex.keys().map(String::as_str))
            .collect()
    }
}

/// An alternate vertex state with absolute positions and normals
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MorphTarget {
    pub name: String,
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub weight: f32,
}

/// Triangle mesh attached to a node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Mesh {
    pub name: String,
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub texcoords: Vec<Vec2>,
    /// Triangle list indices into `positions`
    pub indices: Vec<u32>,
    /// Indices into the root node's material list
    pub materials: Vec<usize>,
    pub skin_weights: Option<SkinWeights>,
    pub morph_targets: Vec<MorphTarget>,
}

impl Mesh {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn has_texcoords(&self) -> bool {
        !self.texcoords.is_empty()
    }

    pub fn has_normals(&self) -> bool {
        !self.normals.is_empty()
    }

    /// First assigned material, or 0
    pub fn primary_material(&self) -> usize {
        self.materials.first().copied().unwrap_or(0)
    }

    /// Check that every parallel array matches the position count and that
    /// every index addresses a position.
    pub fn validate(&self) -> Result<()> {
        let n = self.positions.len();
        let ctx = |what: &str| format!("mesh '{}' {}", self.name, what);

        if self.has_normals() && self.normals.len() != n {
            return Err(Error::length_mismatch(ctx("normals"), n, self.normals.len()));
        }
        if self.has_texcoords() && self.texcoords.len() != n {
            return Err(Error::length_mismatch(ctx("texcoords"), n, self.texcoords.len()));
        }
        if self.indices.len() % 3 != 0 {
            return Err(Error::invalid_data(format!(
                "{} is not a triangle list ({} indices)",
                ctx("indices"),
                self.indices.len()
            )));
        }
        if let Some(&index) = self.indices.iter().find(|&&i| i as usize >= n) {
            return Err(Error::IndexOutOfRange {
                what: ctx("indices"),
                index: index as usize,
                len: n,
            });
        }
        if let Some(skin) = &self.skin_weights {
            if skin.weights.len() != n {
                return Err(Error::length_mismatch(ctx("skin weights"), n, skin.weights.len()));
            }
        }
        for target in &self.morph_targets {
            if target.positions.len() != n {
                return Err(Error::length_mismatch(
                    ctx(&format!("morph target '{}' positions", target.name)),
                    n,
                    target.positions.len(),
                ));
            }
            if !target.normals.is_empty() && target.normals.len() != self.normals.len() {
                return Err(Error::length_mismatch(
                    ctx(&format!("morph target '{}' normals", target.name)),
                    self.normals.len(),
                    target.normals.len(),
                ));
            }
        }
        Ok(())
    }

    /// Check that every material index addresses one of `material_count`
    /// root materials. An empty list with no materials is fine.
    pub fn validate_materials(&self, material_count: usize) -> Result<()> {
        match self.materials.iter().find(|&&m| m >= material_count) {
            Some(&index) => Err(Error::IndexOutOfRange {
                what: format!("mesh '{}' materials", self.name),
                index,
                len: material_count,
            }),
            None => Ok(()),
        }
    }
}

/// A node of the input scene graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneNode {
    pub name: String,
    /// Unique hierarchical identifier, used to match skin joints
    pub path: String,
    pub transform: Transform,
    pub mesh: Option<Mesh>,
    /// Material list; only the root's list is exported
    pub materials: Vec<Material>,
    pub children: Vec<SceneNode>,
}

impl SceneNode {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_mesh(mut self, mesh: Mesh) -> Self {
        self.mesh = Some(mesh);
        self
    }

    pub fn with_child(mut self, child: SceneNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_material(mut self, material: Material) -> Self {
        self.materials.push(material);
        self
    }

    /// Depth-first, parent before children
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a SceneNode)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> Mesh {
        Mesh {
            name: "tri".into(),
            positions: vec![Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0)],
            normals: vec![Vec3::new(0.0, 0.0, 1.0); 3],
            indices: vec![0, 1, 2],
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_triangle() {
        assert!(triangle().validate().is_ok());
    }

    #[test]
    fn test_index_out_of_range() {
        let mut mesh = triangle();
        mesh.indices = vec![0, 1, 3];
        assert!(matches!(mesh.validate(), Err(Error::IndexOutOfRange { index: 3, len: 3, .. })));
    }

    #[test]
    fn test_normal_count_mismatch() {
        let mut mesh = triangle();
        mesh.normals.pop();
        assert!(matches!(
            mesh.validate(),
            Err(Error::LengthMismatch { expected: 3, found: 2, .. })
        ));
    }

    #[test]
    fn test_morph_target_mismatch() {
        let mut mesh = triangle();
        mesh.morph_targets.push(MorphTarget {
            name: "smile".into(),
            positions: vec![Vec3::ZERO; 2],
            ..Default::default()
        });
        assert!(mesh.validate().unwrap_err().to_string().contains("smile"));
    }

    #[test]
    fn test_material_index_out_of_range() {
        let mut mesh = triangle();
        assert!(mesh.validate_materials(0).is_ok());

        mesh.materials = vec![0, 2];
        assert!(mesh.validate_materials(3).is_ok());
        assert!(matches!(
            mesh.validate_materials(2),
            Err(Error::IndexOutOfRange { index: 2, len: 2, .. })
        ));
    }

    #[test]
    fn test_walk_order() {
        let root = SceneNode::new("root", "|root")
            .with_child(SceneNode::new("a", "|root|a").with_child(SceneNode::new("b", "|root|a|b")))
            .with_child(SceneNode::new("c", "|root|c"));

        let mut names = Vec::new();
        root.walk(&mut |n| names.push(n.name.as_str()));
        assert_eq!(names, ["root", "a", "b", "c"]);
    }

    #[test]
    fn test_referenced_joints_sorted() {
        let mut skin = SkinWeights::default();
        skin.weights.push(BTreeMap::from([("|b".to_string(), 0.5), ("|a".to_string(), 0.5)]));
        skin.weights.push(BTreeMap::from([("|a".to_string(), 1.0)]));

        let joints: Vec<_> = skin.referenced_joints().into_iter().collect();
        assert_eq!(joints, ["|a", "|b"]);
    }

    #[test]
    fn test_transform_json_shape() {
        let json = r#"{"trs":{"translation":[1,2,3],"rotation":[0,0,0,1],"scale":[1,1,1]}}"#;
        let t: Transform = serde_json::from_str(json).unwrap();
        assert!(t.is_trs());
    }
}
