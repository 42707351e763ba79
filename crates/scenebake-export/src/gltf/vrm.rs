//! VRM 0.x humanoid avatar extension
//!
//! Bones are found by substring matching against lower-cased node names.
//! The matching is a heuristic tuned for common DCC rig naming
//! (`mixamorig_LeftUpLeg`, `j_l_upperarm`, ...), not a guarantee.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::Material;
use crate::options::{AllowedUser, Usage, VrmOptions};

/// Humanoid bone names with the node-name aliases that identify them
pub const HUMAN_BONES: [(&str, &[&str]); 55] = [
    ("hips", &["hip", "pelvis"]),
    ("leftUpperLeg", &["upperleg", "upleg"]),
    ("rightUpperLeg", &["upperleg", "upleg"]),
    ("leftLowerLeg", &["lowerleg", "leftleg"]),
    ("rightLowerLeg", &["lowerleg", "rightleg"]),
    ("leftFoot", &["foot"]),
    ("rightFoot", &["foot"]),
    ("spine", &["spine"]),
    ("chest", &["chest", "spine1"]),
    ("neck", &["neck"]),
    ("head", &["head"]),
    ("leftShoulder", &["shoulder"]),
    ("rightShoulder", &["shoulder"]),
    ("leftUpperArm", &["upperarm", "leftarm"]),
    ("rightUpperArm", &["upperarm", "rightarm"]),
    ("leftLowerArm", &["lowerarm", "forearm"]),
    ("rightLowerArm", &["lowerarm", "forearm"]),
    ("leftHand", &["hand"]),
    ("rightHand", &["hand"]),
    ("leftToes", &["toe"]),
    ("rightToes", &["toe"]),
    ("leftEye", &["eye"]),
    ("rightEye", &["eye"]),
    ("jaw", &["jaw"]),
    ("leftThumbProximal", &["thumbproximal", "thumb1"]),
    ("leftThumbIntermediate", &["thumbintermediate", "thumb2"]),
    ("leftThumbDistal", &["thumbdistal", "thumb3"]),
    ("leftIndexProximal", &["indexproximal", "index1"]),
    ("leftIndexIntermediate", &["indexintermediate", "index2"]),
    ("leftIndexDistal", &["indexdistal", "index3"]),
    ("leftMiddleProximal", &["middleproximal", "middle1"]),
    ("leftMiddleIntermediate", &["middleintermediate", "middle2"]),
    ("leftMiddleDistal", &["middledistal", "middle3"]),
    ("leftRingProximal", &["ringproximal", "ring1"]),
    ("leftRingIntermediate", &["ringintermediate", "ring2"]),
    ("leftRingDistal", &["ringdistal", "ring3"]),
    ("leftLittleProximal", &["littleproximal", "little1", "pinkey1"]),
    ("leftLittleIntermediate", &["littleintermediate", "little2", "pinkey2"]),
    ("leftLittleDistal", &["littledistal", "little3", "pinkey3"]),
    ("rightThumbProximal", &["thumbproximal", "thumb1"]),
    ("rightThumbIntermediate", &["thumbintermediate", "thumb2"]),
    ("rightThumbDistal", &["thumbdistal", "thumb3"]),
    ("rightIndexProximal", &["indexproximal", "index1"]),
    ("rightIndexIntermediate", &["indexintermediate", "index2"]),
    ("rightIndexDistal", &["indexdistal", "index3"]),
    ("rightMiddleProximal", &["middleproximal", "middle1"]),
    ("rightMiddleIntermediate", &["middleintermediate", "middle2"]),
    ("rightMiddleDistal", &["middledistal", "middle3"]),
    ("rightRingProximal", &["ringproximal", "ring1"]),
    ("rightRingIntermediate", &["ringintermediate", "ring2"]),
    ("rightRingDistal", &["ringdistal", "ring3"]),
    ("rightLittleProximal", &["littleproximal", "little1", "pinkey1"]),
    ("rightLittleIntermediate", &["littleintermediate", "little2", "pinkey2"]),
    ("rightLittleDistal", &["littledistal", "little3", "pinkey3"]),
    ("upperChest", &["upperchest", "spine2"]),
];

const LEFT_KEYS: [&str; 2] = ["l_", "left"];
const RIGHT_KEYS: [&str; 2] = ["r_", "right"];

const BLEND_SHAPE_PRESETS: [&str; 6] = ["Neutral", "A", "I", "U", "E", "O"];

/// Index of the first node that matches `bone`. `names` must be lower-case.
pub fn find_bone_node<S: AsRef<str>>(names: &[S], bone: &str) -> Option<usize> {
    let (_, aliases) = HUMAN_BONES.iter().find(|(key, _)| *key == bone)?;
    let side_keys: &[&str] = if bone.contains("left") {
        &LEFT_KEYS
    } else if bone.contains("right") {
        &RIGHT_KEYS
    } else {
        &[]
    };

    names.iter().position(|name| {
        let name = name.as_ref();
        if !side_keys.is_empty() && !side_keys.iter().any(|key| name.contains(key)) {
            return false;
        }
        if bone == "spine" && (name.contains("spine1") || name.contains("spine2")) {
            return false;
        }
        aliases.iter().any(|alias| name.contains(&format!("_{alias}")))
    })
}

/// Root `VRM` extension object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vrm {
    pub exporter_version: String,
    pub meta: VrmMeta,
    pub humanoid: Humanoid,
    pub first_person: FirstPerson,
    pub blend_shape_master: BlendShapeMaster,
    pub secondary_animation: SecondaryAnimation,
    pub material_properties: Vec<MaterialProperties>,
}

/// License and authoring metadata. The usage flags are written under both
/// the correct and the misspelled (`Ussage`) keys older readers expect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VrmMeta {
    pub title: String,
    pub version: String,
    pub author: String,
    pub contact_information: String,
    pub reference: String,
    pub texture: usize,
    pub allowed_user_name: AllowedUser,
    pub violent_usage_name: Usage,
    pub violent_ussage_name: Usage,
    pub sexual_usage_name: Usage,
    pub sexual_ussage_name: Usage,
    pub commercial_usage_name: Usage,
    pub commercial_ussage_name: Usage,
    pub other_permission_url: String,
    pub license_name: String,
    pub other_license_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Humanoid {
    pub human_bones: Vec<HumanBone>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HumanBone {
    pub bone: String,
    pub node: usize,
    pub use_default_values: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Offset {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookAtCurve {
    pub x_range: f32,
    pub y_range: f32,
}

impl Default for LookAtCurve {
    fn default() -> Self {
        Self {
            x_range: 90.0,
            y_range: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirstPerson {
    /// Head node, or -1 when no head was matched
    pub first_person_bone: i64,
    pub first_person_bone_offset: Offset,
    pub mesh_annotations: Vec<serde_json::Value>,
    pub look_at_type_name: String,
    pub look_at_horizontal_inner: LookAtCurve,
    pub look_at_horizontal_outer: LookAtCurve,
    pub look_at_vertical_down: LookAtCurve,
    pub look_at_vertical_up: LookAtCurve,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlendShapeMaster {
    pub blend_shape_groups: Vec<BlendShapeGroup>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlendShapeGroup {
    pub name: String,
    pub preset_name: String,
    pub binds: Vec<serde_json::Value>,
    pub material_values: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecondaryAnimation {
    pub bone_groups: Vec<serde_json::Value>,
    pub collider_groups: Vec<serde_json::Value>,
}

/// Unity shader settings for one material
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialProperties {
    pub name: String,
    pub render_queue: u32,
    pub shader: String,
    pub float_properties: BTreeMap<String, f32>,
    pub vector_properties: BTreeMap<String, [f32; 4]>,
    pub texture_properties: BTreeMap<String, usize>,
    pub keyword_map: BTreeMap<String, bool>,
    pub tag_map: BTreeMap<String, String>,
}

impl MaterialProperties {
    fn new(material: &Material) -> Self {
        let [r, g, b] = material.emissive_factor;
        let texture_properties = material
            .pbr_metallic_roughness
            .base_color_texture
            .map(|info| ("_MainTex".to_string(), info.index))
            .into_iter()
            .collect();
        Self {
            name: material.name.clone(),
            render_queue: 2000,
            shader: "Standard".to_string(),
            float_properties: BTreeMap::new(),
            vector_properties: BTreeMap::from([
                ("_Color".to_string(), material.pbr_metallic_roughness.base_color_factor),
                ("_EmissionColor".to_string(), [r, g, b, 1.0]),
            ]),
            texture_properties,
            keyword_map: BTreeMap::from([
                ("_ALPHATEST_ON".to_string(), true),
                ("_NORMALMAP".to_string(), true),
            ]),
            tag_map: BTreeMap::from([("RenderType".to_string(), "TransparentCutout".to_string())]),
        }
    }
}

impl Vrm {
    /// Build the extension from the emitted node names and materials
    pub fn new<S: AsRef<str>>(options: &VrmOptions, node_names: &[S], materials: &[Material]) -> Self {
        let names: Vec<String> = node_names.iter().map(|n| n.as_ref().to_lowercase()).collect();

        let human_bones = HUMAN_BONES
            .iter()
            .filter_map(|(bone, _)| {
                find_bone_node(&names[..], bone).map(|node| HumanBone {
                    bone: bone.to_string(),
                    node,
                    use_default_values: true,
                })
            })
            .collect();

        let head = find_bone_node(&names[..], "head").map_or(-1, |i| i as i64);

        Self {
            exporter_version: format!("scenebake-{}", env!("CARGO_PKG_VERSION")),
            meta: VrmMeta {
                title: options.title.clone(),
                version: options.version.clone(),
                author: options.author.clone(),
                contact_information: options.contact_information.clone(),
                reference: options.reference.clone(),
                texture: 0,
                allowed_user_name: options.allowed_user,
                violent_usage_name: options.violent_usage,
                violent_ussage_name: options.violent_usage,
                sexual_usage_name: options.sexual_usage,
                sexual_ussage_name: options.sexual_usage,
                commercial_usage_name: options.commercial_usage,
                commercial_ussage_name: options.commercial_usage,
                other_permission_url: options.other_permission_url.clone(),
                license_name: options.license_name.clone(),
                other_license_url: options.other_license_url.clone(),
            },
            humanoid: Humanoid { human_bones },
            first_person: FirstPerson {
                first_person_bone: head,
                first_person_bone_offset: Offset { x: 0.0, y: 0.0, z: 0.0 },
                mesh_annotations: Vec::new(),
                look_at_type_name: "Bone".to_string(),
                look_at_horizontal_inner: LookAtCurve::default(),
                look_at_horizontal_outer: LookAtCurve::default(),
                look_at_vertical_down: LookAtCurve::default(),
                look_at_vertical_up: LookAtCurve::default(),
            },
            blend_shape_master: BlendShapeMaster {
                blend_shape_groups: BLEND_SHAPE_PRESETS
                    .iter()
                    .map(|name| BlendShapeGroup {
                        name: name.to_string(),
                        preset_name: "unknown".to_string(),
                        binds: Vec::new(),
                        material_values: Vec::new(),
                    })
                    .collect(),
            },
            secondary_animation: SecondaryAnimation::default(),
            material_properties: materials.iter().map(MaterialProperties::new).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bone_table_is_complete() {
        assert_eq!(HUMAN_BONES.len(), 55);
        assert_eq!(HUMAN_BONES[0].0, "hips");
        assert_eq!(HUMAN_BONES[54].0, "upperChest");
    }

    #[test]
    fn test_side_filter() {
        let names = ["mixamorig_right_upleg", "mixamorig_left_upleg"];
        assert_eq!(find_bone_node(&names, "leftUpperLeg"), Some(1));
        assert_eq!(find_bone_node(&names, "rightUpperLeg"), Some(0));
        assert_eq!(find_bone_node(&names, "hips"), None);
    }

    #[test]
    fn test_spine_skips_numbered_spines() {
        let names = ["j_spine1", "j_spine2", "j_spine"];
        assert_eq!(find_bone_node(&names, "spine"), Some(2));
        assert_eq!(find_bone_node(&names, "chest"), Some(0));
        assert_eq!(find_bone_node(&names, "upperChest"), Some(1));
        assert_eq!(find_bone_node(&["j_spine1"], "spine"), None);
    }

    #[test]
    fn test_unknown_bone() {
        assert_eq!(find_bone_node(&["j_tail"], "tail"), None);
    }

    #[test]
    fn test_vrm_document() {
        let names = ["Root", "J_Hips", "J_Head", "J_L_Hand"];
        let options = VrmOptions {
            title: "Avatar".into(),
            commercial_usage: Usage::Disallow,
            ..Default::default()
        };
        let vrm = Vrm::new(&options, &names, &[]);
        let json = serde_json::to_value(&vrm).unwrap();

        assert_eq!(json["meta"]["title"], "Avatar");
        assert_eq!(json["meta"]["allowedUserName"], "Everyone");
        assert_eq!(json["meta"]["commercialUsageName"], "Disallow");
        assert_eq!(json["meta"]["commercialUssageName"], "Disallow");
        assert_eq!(json["firstPerson"]["firstPersonBone"], 2);
        assert_eq!(json["firstPerson"]["lookAtVerticalUp"]["xRange"], 90.0);

        let bones = json["humanoid"]["humanBones"].as_array().unwrap();
        let found: Vec<(&str, u64)> = bones
            .iter()
            .map(|b| (b["bone"].as_str().unwrap(), b["node"].as_u64().unwrap()))
            .collect();
        assert_eq!(found, [("hips", 1), ("head", 2), ("leftHand", 3)]);

        let groups = json["blendShapeMaster"]["blendShapeGroups"].as_array().unwrap();
        assert_eq!(groups.len(), 6);
        assert_eq!(groups[5]["name"], "O");
    }

    #[test]
    fn test_no_head_gives_minus_one() {
        let vrm = Vrm::new(&VrmOptions::default(), &["root"], &[]);
        assert_eq!(vrm.first_person.first_person_bone, -1);
        assert!(vrm.humanoid.human_bones.is_empty());
    }
}
