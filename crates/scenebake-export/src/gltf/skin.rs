//! Skin and joint resolution
//!
//! Skin weights name their joints by path. Registration resolves those paths
//! against the created nodes, orders the joints, and packs per-vertex
//! influences as four joint indices plus four weights.

use std::collections::BTreeMap;

use scenebake_core::{Mat4x4, SceneNode, SkinWeights};
use tracing::{debug, warn};

use super::primitives::{AccessorKind, Bounds, NodeId, SkinId};
use super::registerer::{AttributeSink, BufferSlot, ObjectRegisterer, SkinRecord};

/// Influences kept per vertex
pub const MAX_INFLUENCES: usize = 4;

/// Build the single skin of this export from every skin-weight block below
/// `root`. Returns `None` when no block exists or no joint path resolves.
///
/// Joints are ordered by ascending path length, ties by path. Shorter paths
/// are taken to be ancestors; this is a heuristic, not a hierarchy walk.
pub(crate) fn register_skins(reg: &mut ObjectRegisterer, root: &SceneNode) -> Option<SkinId> {
    let mut blocks = Vec::new();
    root.walk(&mut |node| {
        if let Some(weights) = node.mesh.as_ref().and_then(|m| m.skin_weights.as_ref()) {
            blocks.push(weights);
        }
    });
    if blocks.is_empty() {
        return None;
    }

    let node_by_path: BTreeMap<&str, NodeId> = reg
        .nodes()
        .iter()
        .enumerate()
        .map(|(i, node)| (node.path.as_str(), NodeId(i)))
        .collect();

    let mut resolved: BTreeMap<String, NodeId> = BTreeMap::new();
    let mut bind_matrices: BTreeMap<&str, Mat4x4> = BTreeMap::new();
    for block in &blocks {
        for path in block.referenced_joints() {
            match node_by_path.get(path) {
                Some(&node) => {
                    resolved.insert(path.to_string(), node);
                }
                None => warn!(joint = path, "joint path has no matching node, weights fall back to joint 0"),
            }
        }
        for (path, matrix) in &block.bind_matrices {
            bind_matrices.insert(path.as_str(), *matrix);
        }
    }

    let mut joints: Vec<(String, NodeId)> = resolved.into_iter().collect();
    joints.sort_by_key(|(path, _)| path.len());
    if joints.is_empty() {
        warn!("no skin joint path matched a scene node, skin dropped");
        return None;
    }

    let matrices: Vec<[f32; 16]> = joints
        .iter()
        .map(|(path, _)| {
            bind_matrices
                .get(path.as_str())
                .copied()
                .unwrap_or(Mat4x4::IDENTITY)
                .to_flat()
        })
        .collect();
    let inverse_bind_matrices = reg.pack(
        AttributeSink::Buffer(BufferSlot::Plain),
        AccessorKind::Mat4F32,
        matrices.as_flattened(),
        Bounds::None,
        None,
    );

    let name = format!("skin_{:03}", reg.skins().len());
    debug!(skin = %name, joints = joints.len(), "registered skin");
    let (joint_paths, joint_nodes) = joints.into_iter().unzip();
    Some(reg.add_skin(SkinRecord {
        name,
        joints: joint_nodes,
        joint_paths,
        inverse_bind_matrices,
    }))
}

/// Keep the heaviest four `(joint, weight)` pairs, zero-pad, and rescale the
/// kept weights to sum to one. Equal weights keep their input order.
pub fn top_influences(mut pairs: Vec<(u16, f32)>) -> ([u16; MAX_INFLUENCES], [f32; MAX_INFLUENCES]) {
    pairs.sort_by(|a, b| b.1.total_cmp(&a.1));

    let mut joints = [0u16; MAX_INFLUENCES];
    let mut weights = [0f32; MAX_INFLUENCES];
    for (slot, (joint, weight)) in pairs.into_iter().take(MAX_INFLUENCES).enumerate() {
        joints[slot] = joint;
        weights[slot] = weight;
    }

    let total: f32 = weights.iter().sum();
    let scale = 1.0 / total.max(1e-16);
    for weight in &mut weights {
        *weight *= scale;
    }
    (joints, weights)
}

/// Pack every vertex of `skin` into joint and weight quadruples. Paths that
/// `joint_index` cannot resolve map to joint 0.
pub fn pack_skin_weights<F>(
    joint_index: F,
    skin: &SkinWeights,
) -> (Vec<[u16; MAX_INFLUENCES]>, Vec<[f32; MAX_INFLUENCES]>)
where
    F: Fn(&str) -> Option<usize>,
{
    skin.weights
        .iter()
        .map(|vertex| {
            let pairs = vertex
                .iter()
                .map(|(path, &weight)| {
                    let joint = joint_index(path.as_str())
                        .and_then(|i| u16::try_from(i).ok())
                        .unwrap_or(0);
                    (joint, weight)
                })
                .collect();
            top_influences(pairs)
        })
        .unzip()
}
