//! Morph target packing

use scenebake_core::{Mesh, Vec3};

use super::primitives::{AccessorKind, Bounds, ViewTarget};
use super::registerer::{AttributeSink, BufferSlot, MorphTargetRecord, ObjectRegisterer};

/// Per-vertex `target - base`. Stops at the shorter array.
pub fn deltas(base: &[Vec3], target: &[Vec3]) -> Vec<[f32; 3]> {
    base.iter()
        .zip(target)
        .map(|(&b, &t)| (t - b).to_array())
        .collect()
}

/// Pack every morph target of `mesh` as NORMAL then POSITION delta accessors
pub(crate) fn register_morph_targets(
    reg: &mut ObjectRegisterer,
    mesh: &Mesh,
    slot: BufferSlot,
) -> Vec<MorphTargetRecord> {
    let sink = AttributeSink::Buffer(slot);
    mesh.morph_targets
        .iter()
        .map(|target| {
            let normal = (!target.normals.is_empty() && mesh.has_normals()).then(|| {
                let normals = deltas(&mesh.normals, &target.normals);
                let bounds = Bounds::of_floats(&normals);
                reg.pack(sink, AccessorKind::Vec3F32, normals.as_flattened(), bounds, Some(ViewTarget::ArrayBuffer))
            });

            let positions = deltas(&mesh.positions, &target.positions);
            let bounds = Bounds::of_floats(&positions);
            let position = reg.pack(
                sink,
                AccessorKind::Vec3F32,
                positions.as_flattened(),
                bounds,
                Some(ViewTarget::ArrayBuffer),
            );

            MorphTargetRecord {
                normal,
                position,
                weight: target.weight,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gltf::registerer::BufferPolicy;
    use crate::options::OutputBuffer;
    use scenebake_core::MorphTarget;

    #[test]
    fn test_deltas() {
        let base = [Vec3::new(1.0, 1.0, 1.0), Vec3::ZERO];
        let target = [Vec3::new(1.5, 0.0, 1.0), Vec3::new(0.0, 2.0, 0.0)];
        assert_eq!(deltas(&base, &target), [[0.5, -1.0, 0.0], [0.0, 2.0, 0.0]]);
    }

    #[test]
    fn test_deltas_never_overrun() {
        assert_eq!(deltas(&[Vec3::ZERO; 3], &[Vec3::ONE]).len(), 1);
    }

    #[test]
    fn test_target_without_normals() {
        let mesh = Mesh {
            positions: vec![Vec3::ZERO, Vec3::ONE],
            normals: vec![Vec3::ONE; 2],
            morph_targets: vec![MorphTarget {
                name: "raise".into(),
                positions: vec![Vec3::ONE, Vec3::ONE],
                normals: Vec::new(),
                weight: 0.25,
            }],
            ..Default::default()
        };
        let mut reg = ObjectRegisterer::new("out", BufferPolicy::new(OutputBuffer::Bin, true));
        let targets = register_morph_targets(&mut reg, &mesh, BufferSlot::Plain);

        assert_eq!(targets.len(), 1);
        assert!(targets[0].normal.is_none());
        assert_eq!(targets[0].weight, 0.25);
        let accessor = &reg.accessors()[targets[0].position.0];
        assert_eq!(
            accessor.bounds,
            Bounds::Float { min: vec![0.0; 3], max: vec![1.0; 3] }
        );
    }
}
