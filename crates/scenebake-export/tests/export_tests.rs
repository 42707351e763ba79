//! End-to-end export tests
//!
//! These tests export small scene graphs into a temporary directory and
//! inspect the written files:
//! - document shape for plain, compressed and GLB output
//! - texture de-duplication, preload variants and texture copying
//! - skin weight packing
//! - codec failure policies
//! - byte-identical repeated exports

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::Value;

use scenebake_core::{Material, Mesh, SceneNode, SkinWeights, Texture, TextureSlot, Vec2, Vec3};
use scenebake_export::{
    unpack_glb, CodecError, CodecFailure, Container, ExportError, ExportOptions, GltfExporter, OutputBuffer,
    ResizeOptions, VrmOptions,
};

/// Helper to create a one-triangle mesh
fn triangle(name: &str) -> Mesh {
    Mesh {
        name: name.to_string(),
        positions: vec![Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0)],
        indices: vec![0, 1, 2],
        ..Default::default()
    }
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

/// Bytes behind accessor `index`, read from the side buffer files
fn accessor_bytes(dir: &Path, json: &Value, index: usize) -> Vec<u8> {
    let accessor = &json["accessors"][index];
    let view = &json["bufferViews"][accessor["bufferView"].as_u64().unwrap() as usize];
    let buffer = &json["buffers"][view["buffer"].as_u64().unwrap() as usize];
    let data = std::fs::read(dir.join(buffer["uri"].as_str().unwrap())).unwrap();
    let start = view["byteOffset"].as_u64().unwrap_or(0) as usize;
    let len = view["byteLength"].as_u64().unwrap() as usize;
    data[start..start + len].to_vec()
}

fn floats(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

fn failing_codec(bad: &'static str) -> impl Fn(&Mesh) -> Result<Vec<u8>, CodecError> {
    move |mesh: &Mesh| {
        if mesh.name == bad {
            Err(CodecError::new("unsupported topology"))
        } else {
            Ok(vec![0xD5; 10])
        }
    }
}

fn two_mesh_scene() -> SceneNode {
    SceneNode::new("root", "|root")
        .with_child(SceneNode::new("good", "|root|good").with_mesh(triangle("good")))
        .with_child(SceneNode::new("bad", "|root|bad").with_mesh(triangle("bad")))
}

mod document_tests {
    use super::*;

    #[test]
    fn test_single_triangle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tri.gltf");
        let root = SceneNode::new("root", "|root").with_mesh(triangle("tri"));

        let summary = GltfExporter::new(ExportOptions::default()).export(&root, &path).unwrap();
        assert_eq!(summary.buffers, vec![dir.path().join("tri.bin")]);

        let json = read_json(&path);
        assert_eq!(json["meshes"].as_array().unwrap().len(), 1);
        let primitives = json["meshes"][0]["primitives"].as_array().unwrap();
        assert_eq!(primitives.len(), 1);

        let primitive = &primitives[0];
        let indices = primitive["indices"].as_u64().unwrap() as usize;
        let position = primitive["attributes"]["POSITION"].as_u64().unwrap() as usize;
        assert_eq!(json["accessors"][indices]["count"], 3);
        assert_eq!(json["accessors"][position]["count"], 3);
        assert_eq!(json["accessors"][position]["min"], serde_json::json!([0.0, 0.0, 0.0]));
        assert_eq!(json["accessors"][position]["max"], serde_json::json!([1.0, 1.0, 0.0]));
        assert!(primitive["attributes"].get("TEXCOORD_0").is_none());

        assert_eq!(json["asset"]["version"], "2.0");
        assert_eq!(json["scenes"][0]["nodes"], serde_json::json!([0]));
    }

    #[test]
    fn test_texcoords_and_normals() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("uv.gltf");
        let mut mesh = triangle("uv");
        mesh.texcoords = vec![Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0)];
        mesh.normals = vec![Vec3::new(0.0, 0.0, 2.0); 3];
        let root = SceneNode::new("root", "|root").with_mesh(mesh);

        GltfExporter::new(ExportOptions::default()).export(&root, &path).unwrap();
        let json = read_json(&path);
        let attributes = &json["meshes"][0]["primitives"][0]["attributes"];
        assert!(attributes.get("TEXCOORD_0").is_some());

        let normal = attributes["NORMAL"].as_u64().unwrap() as usize;
        let normals = floats(&accessor_bytes(dir.path(), &json, normal));
        assert_eq!(normals, [0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_scene_without_meshes_fails_after_writing_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.gltf");
        let root = SceneNode::new("root", "|root").with_child(SceneNode::new("locator", "|root|locator"));

        let err = GltfExporter::new(ExportOptions::default()).export(&root, &path).unwrap_err();
        assert!(matches!(err, ExportError::EmptyBuffers));

        let json = read_json(&path);
        assert_eq!(json["nodes"].as_array().unwrap().len(), 2);
        assert!(json.get("buffers").is_none());
    }

    #[test]
    fn test_repeated_export_is_identical() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        let root = two_mesh_scene().with_material(
            Material::new("skin").with_texture(TextureSlot::BaseColor, Texture::new("skin.png")),
        );
        let exporter = GltfExporter::new(ExportOptions::default());

        exporter.export(&root, first.path().join("scene.gltf")).unwrap();
        exporter.export(&root, second.path().join("scene.gltf")).unwrap();

        for name in ["scene.gltf", "scene.bin"] {
            assert_eq!(
                std::fs::read(first.path().join(name)).unwrap(),
                std::fs::read(second.path().join(name)).unwrap(),
                "{name} differs between runs"
            );
        }
    }

    #[test]
    fn test_compact_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("compact.gltf");
        let options = ExportOptions {
            pretty_json: false,
            ..Default::default()
        };
        let root = SceneNode::new("root", "|root").with_mesh(triangle("tri"));

        GltfExporter::new(options).export(&root, &path).unwrap();
        assert!(!std::fs::read_to_string(&path).unwrap().contains('\n'));
    }
}

mod material_tests {
    use super::*;

    #[test]
    fn test_preload_variant_shares_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mat.gltf");
        let root = SceneNode::new("root", "|root")
            .with_mesh(triangle("tri"))
            .with_material(Material::new("low").with_texture(TextureSlot::BaseColor, Texture::new("foo_s0.jpg")))
            .with_material(Material::new("high").with_texture(TextureSlot::BaseColor, Texture::new("foo.jpg")));

        GltfExporter::new(ExportOptions::default()).export(&root, &path).unwrap();
        let json = read_json(&path);

        let images = json["images"].as_array().unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0]["uri"], "foo.jpg");
        assert_eq!(images[0]["extensions"]["KSK_preloadUri"]["uri"], "foo_s0.jpg");
        assert_eq!(json["textures"].as_array().unwrap().len(), 1);
        assert_eq!(json["samplers"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_textures_copied_next_to_output() {
        let src_dir = tempfile::tempdir().unwrap();
        let out_dir = tempfile::tempdir().unwrap();
        let src = src_dir.path().join("Decal.PNG");
        image::RgbaImage::from_pixel(4, 4, image::Rgba([10, 20, 30, 40])).save_with_format(&src, image::ImageFormat::Png).unwrap();
        let missing = src_dir.path().join("gone.png");

        let root = SceneNode::new("root", "|root")
            .with_mesh(triangle("tri"))
            .with_material(Material::new("decal").with_texture(TextureSlot::BaseColor, Texture::new(src.to_str().unwrap())))
            .with_material(Material::new("lost").with_texture(TextureSlot::BaseColor, Texture::new(missing.to_str().unwrap())));
        let options = ExportOptions {
            textures: Some(ResizeOptions::default()),
            detect_texture_alpha: true,
            ..Default::default()
        };
        let path = out_dir.path().join("decal.gltf");

        let summary = GltfExporter::new(options).export(&root, &path).unwrap();
        assert_eq!(summary.textures, vec![out_dir.path().join("Decal.png")]);
        assert!(out_dir.path().join("Decal.png").is_file());

        let json = read_json(&path);
        let uris: Vec<&str> = json["images"].as_array().unwrap().iter().map(|i| i["uri"].as_str().unwrap()).collect();
        assert!(uris.contains(&"Decal.png"));
        assert!(uris.contains(&"gone.png"));

        let decal = json["materials"].as_array().unwrap().iter().find(|m| m["name"] == "decal").unwrap();
        assert_eq!(decal["alphaMode"], "BLEND");
    }
}

mod texture_name_tests {
    use super::*;

    #[test]
    fn test_same_file_name_in_two_directories() {
        let src_dir = tempfile::tempdir().unwrap();
        let out_dir = tempfile::tempdir().unwrap();
        let mut sources = Vec::new();
        for (sub, shade) in [("body", 10u8), ("head", 200u8)] {
            std::fs::create_dir(src_dir.path().join(sub)).unwrap();
            let src = src_dir.path().join(sub).join("diffuse.png");
            image::RgbImage::from_pixel(2, 2, image::Rgb([shade; 3])).save(&src).unwrap();
            sources.push(src);
        }

        let mut root = SceneNode::new("root", "|root").with_mesh(triangle("tri"));
        for (i, src) in sources.iter().enumerate() {
            root = root.with_material(
                Material::new(format!("m{i}")).with_texture(TextureSlot::BaseColor, Texture::new(src.to_str().unwrap())),
            );
        }
        let options = ExportOptions {
            textures: Some(ResizeOptions::default()),
            ..Default::default()
        };
        let path = out_dir.path().join("pair.gltf");

        let summary = GltfExporter::new(options).export(&root, &path).unwrap();
        assert_eq!(summary.textures.len(), 2);

        let json = read_json(&path);
        let uris: Vec<&str> = json["images"].as_array().unwrap().iter().map(|i| i["uri"].as_str().unwrap()).collect();
        assert_eq!(uris, ["diffuse.png", "diffuse_1.png"]);
        for (uri, src) in uris.iter().zip(&sources) {
            assert_eq!(std::fs::read(out_dir.path().join(uri)).unwrap(), std::fs::read(src).unwrap());
        }
    }
}

mod material_index_tests {
    use super::*;

    #[test]
    fn test_no_materials_means_no_primitive_material() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bare.gltf");
        let root = SceneNode::new("root", "|root").with_mesh(triangle("tri"));

        GltfExporter::new(ExportOptions::default()).export(&root, &path).unwrap();
        let json = read_json(&path);
        assert!(json["meshes"][0]["primitives"][0].get("material").is_none());
        assert!(json.get("materials").is_none());
    }

    #[test]
    fn test_dangling_material_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dangling.gltf");
        let mut mesh = triangle("tri");
        mesh.materials = vec![5];
        let root = SceneNode::new("root", "|root").with_mesh(mesh).with_material(Material::new("only"));

        let err = GltfExporter::new(ExportOptions::default()).export(&root, &path).unwrap_err();
        assert!(matches!(err, ExportError::Scene(_)));
        assert!(err.to_string().contains("materials"));
        assert!(!path.exists());

        let lenient = ExportOptions {
            strict_validation: false,
            ..Default::default()
        };
        GltfExporter::new(lenient).export(&root, &path).unwrap();
        let json = read_json(&path);
        assert!(json["meshes"][0]["primitives"][0].get("material").is_none());
        assert_eq!(json["materials"].as_array().unwrap().len(), 1);
    }
}

mod skin_tests {
    use super::*;

    fn skinned_scene() -> SceneNode {
        let joints = ["a", "b", "c", "d", "e"];
        let mut first = BTreeMap::new();
        for (joint, weight) in joints.iter().zip([0.5, 0.3, 0.1, 0.05, 0.05]) {
            first.insert(format!("|root|{joint}"), weight);
        }
        let single = BTreeMap::from([("|root|a".to_string(), 1.0)]);

        let mut mesh = triangle("body");
        mesh.skin_weights = Some(SkinWeights {
            weights: vec![first, single.clone(), single],
            bind_matrices: BTreeMap::new(),
        });

        let mut root = SceneNode::new("root", "|root").with_mesh(mesh);
        for joint in joints {
            root = root.with_child(SceneNode::new(joint, format!("|root|{joint}")));
        }
        root
    }

    #[test]
    fn test_top_four_influences_renormalized() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("skin.gltf");

        let summary = GltfExporter::new(ExportOptions::default()).export(&skinned_scene(), &path).unwrap();
        assert_eq!(summary.skins, 1);

        let json = read_json(&path);
        assert_eq!(json["skins"][0]["joints"].as_array().unwrap().len(), 5);
        assert_eq!(json["nodes"][0]["skin"], 0);

        let attributes = &json["meshes"][0]["primitives"][0]["attributes"];
        let weights_id = attributes["WEIGHTS_0"].as_u64().unwrap() as usize;
        let weights = floats(&accessor_bytes(dir.path(), &json, weights_id));
        assert_eq!(weights.len(), 12);

        let vertex = &weights[..4];
        assert!(vertex.iter().all(|w| *w > 0.0));
        assert!((vertex.iter().sum::<f32>() - 1.0).abs() < 1e-6);
        assert!((vertex[0] - 0.5 / 0.95).abs() < 1e-6);
        assert!((vertex[1] - 0.3 / 0.95).abs() < 1e-6);
        assert_eq!(&weights[4..8], &[1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_skin_dropped_in_draco_only_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("skin.gltf");
        let exporter = GltfExporter::new(ExportOptions {
            output_buffer: OutputBuffer::Draco,
            ..Default::default()
        })
        .with_compressor(failing_codec("none"));

        let summary = exporter.export(&skinned_scene(), &path).unwrap();
        assert_eq!(summary.skins, 0);
        let json = read_json(&path);
        assert!(json["meshes"][0]["primitives"][0]["attributes"].get("JOINTS_0").is_none());
    }
}

mod codec_tests {
    use super::*;

    fn draco_options(on_failure: CodecFailure) -> ExportOptions {
        ExportOptions {
            output_buffer: OutputBuffer::Draco,
            codec_failure: on_failure,
            ..Default::default()
        }
    }

    #[test]
    fn test_failed_mesh_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.gltf");
        let exporter = GltfExporter::new(draco_options(CodecFailure::SkipMesh)).with_compressor(failing_codec("bad"));

        let summary = exporter.export(&two_mesh_scene(), &path).unwrap();
        assert_eq!(summary.meshes, 1);

        let json = read_json(&path);
        assert_eq!(json["meshes"].as_array().unwrap().len(), 1);
        assert_eq!(json["meshes"][0]["name"], "good");
        assert!(json["nodes"][2].get("mesh").is_none());
        assert_eq!(json["extensionsRequired"], serde_json::json!(["KHR_draco_mesh_compression"]));

        let draco = &json["meshes"][0]["primitives"][0]["extensions"]["KHR_draco_mesh_compression"];
        assert_eq!(draco["attributes"]["POSITION"], 0);
        let view = &json["bufferViews"][draco["bufferView"].as_u64().unwrap() as usize];
        assert_eq!(view["byteLength"], 10);
        assert!(view.get("target").is_none());
    }

    #[test]
    fn test_failed_mesh_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.gltf");
        let exporter = GltfExporter::new(draco_options(CodecFailure::Abort)).with_compressor(failing_codec("bad"));

        let err = exporter.export(&two_mesh_scene(), &path).unwrap_err();
        assert!(matches!(err, ExportError::Codec { ref mesh, .. } if mesh == "bad"));
        assert!(!path.exists());
    }

    #[test]
    fn test_per_mesh_compressed_buffers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.gltf");
        let options = ExportOptions {
            share_compressed_buffer: false,
            ..draco_options(CodecFailure::Abort)
        };
        let exporter = GltfExporter::new(options).with_compressor(failing_codec("none"));

        let summary = exporter.export(&two_mesh_scene(), &path).unwrap();
        assert_eq!(
            summary.buffers,
            vec![dir.path().join("scene_000.bin"), dir.path().join("scene_001.bin")]
        );
    }

    #[test]
    fn test_both_mode_falls_back_to_plain() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.gltf");
        let options = ExportOptions {
            output_buffer: OutputBuffer::Both,
            ..Default::default()
        };
        let exporter = GltfExporter::new(options).with_compressor(failing_codec("bad"));

        let summary = exporter.export(&two_mesh_scene(), &path).unwrap();
        assert_eq!(
            summary.buffers,
            vec![dir.path().join("scene.bin"), dir.path().join("scene_draco.bin")]
        );

        let json = read_json(&path);
        let meshes = json["meshes"].as_array().unwrap();
        assert_eq!(meshes.len(), 2);
        assert!(meshes[0]["primitives"][0].get("extensions").is_some());
        assert!(meshes[1]["primitives"][0].get("extensions").is_none());
        assert!(meshes[1]["primitives"][0]["attributes"].get("POSITION").is_some());
        assert!(json.get("extensionsRequired").is_none());
    }
}

mod container_tests {
    use super::*;

    #[test]
    fn test_glb_unpacks_to_plain_export() {
        let dir = tempfile::tempdir().unwrap();
        let root = SceneNode::new("root", "|root").with_mesh(triangle("tri"));

        let plain = dir.path().join("plain.gltf");
        GltfExporter::new(ExportOptions::default()).export(&root, &plain).unwrap();

        let glb = dir.path().join("packed.glb");
        let options = ExportOptions {
            container: Container::Glb,
            ..Default::default()
        };
        let summary = GltfExporter::new(options).export(&root, &glb).unwrap();
        assert!(summary.buffers.is_empty());

        let unpacked = dir.path().join("unpacked.gltf");
        unpack_glb(&glb, &unpacked).unwrap();

        let json = read_json(&unpacked);
        assert_eq!(json["buffers"][0]["uri"], "unpacked.bin");
        let expected = std::fs::read(dir.path().join("plain.bin")).unwrap();
        let bin = std::fs::read(dir.path().join("unpacked.bin")).unwrap();
        assert_eq!(&bin[..expected.len()], expected.as_slice());
        assert_eq!(json["accessors"], read_json(&plain)["accessors"]);
    }
}

mod vrm_tests {
    use super::*;

    #[test]
    fn test_humanoid_bones_map_to_nodes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("avatar.gltf");
        let root = SceneNode::new("Armature", "|Armature")
            .with_mesh(triangle("body"))
            .with_child(
                SceneNode::new("mixamorig_Hips", "|Armature|hips")
                    .with_child(SceneNode::new("mixamorig_Spine", "|Armature|hips|spine")),
            );
        let options = ExportOptions {
            vrm: Some(VrmOptions {
                title: "Avatar".into(),
                ..Default::default()
            }),
            ..Default::default()
        };

        GltfExporter::new(options).export(&root, &path).unwrap();
        let json = read_json(&path);

        let vrm = &json["extensions"]["VRM"];
        assert_eq!(vrm["meta"]["title"], "Avatar");
        let bones = vrm["humanoid"]["humanBones"].as_array().unwrap();
        let node_of = |bone: &str| bones.iter().find(|b| b["bone"] == bone).map(|b| b["node"].clone());
        assert_eq!(node_of("hips"), Some(serde_json::json!(1)));
        assert_eq!(node_of("spine"), Some(serde_json::json!(2)));
        assert!(json["extensionsUsed"].as_array().unwrap().contains(&Value::from("VRM")));
    }
}
