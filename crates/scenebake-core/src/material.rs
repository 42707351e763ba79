//! Material and texture input model
//!
//! A [`Material`] holds the glTF core factors plus a layered physically
//! based parameter set that is exported as a vendor extension.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Where a texture is bound on a material
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TextureSlot {
    BaseColor,
    Normal,
    PbrBaseColor,
    SpecularColor,
    TransmissionColor,
    TransmissionScatter,
    SubsurfaceColor,
    SubsurfaceRadius,
    SubsurfaceScale,
    CoatColor,
    EmissionColor,
    Opacity,
}

/// UDIM tiling for a texture
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Udim {
    pub tiles: Vec<i32>,
    /// URL pattern with a tile placeholder, e.g. `skin.<UDIM>.png`
    pub url: String,
}

/// An image file referenced by a material
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Texture {
    pub file_path: String,
    pub udim: Option<Udim>,
}

impl Texture {
    pub fn new(file_path: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            udim: None,
        }
    }

    /// File name without directory or extension
    pub fn stem(&self) -> &str {
        Path::new(&self.file_path)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.file_path)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BaseLayer {
    pub weight: f32,
    pub color: [f32; 3],
    pub diffuse_roughness: f32,
    pub metalness: f32,
}

impl Default for BaseLayer {
    fn default() -> Self {
        Self {
            weight: 1.0,
            color: [0.8, 0.8, 0.8],
            diffuse_roughness: 0.0,
            metalness: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SpecularLayer {
    pub weight: f32,
    pub color: [f32; 3],
    pub roughness: f32,
    pub ior: f32,
    pub rotation: f32,
    pub anisotropy: f32,
}

impl Default for SpecularLayer {
    fn default() -> Self {
        Self {
            weight: 1.0,
            color: [1.0, 1.0, 1.0],
            roughness: 0.2,
            ior: 1.5,
            rotation: 0.0,
            anisotropy: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TransmissionLayer {
    pub weight: f32,
    pub color: [f32; 3],
    pub depth: f32,
    pub scatter: [f32; 3],
    pub scatter_anisotropy: f32,
    pub extra_roughness: f32,
    pub dispersion: f32,
    pub aovs: f32,
}

impl Default for TransmissionLayer {
    fn default() -> Self {
        Self {
            weight: 0.0,
            color: [1.0, 1.0, 1.0],
            depth: 0.0,
            scatter: [0.0, 0.0, 0.0],
            scatter_anisotropy: 0.0,
            extra_roughness: 0.0,
            dispersion: 0.0,
            aovs: 0.0,
        }
    }
}

/// Subsurface scattering model
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SubsurfaceType {
    #[default]
    Diffusion,
    RandomWalk,
}

impl SubsurfaceType {
    pub fn as_str(self) -> &'static str {
        match self {
            SubsurfaceType::Diffusion => "diffusion",
            SubsurfaceType::RandomWalk => "randomwalk",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SubsurfaceLayer {
    pub weight: f32,
    pub color: [f32; 3],
    pub radius: [f32; 3],
    #[serde(rename = "type")]
    pub kind: SubsurfaceType,
    pub scale: f32,
    pub anisotropy: f32,
}

impl Default for SubsurfaceLayer {
    fn default() -> Self {
        Self {
            weight: 0.0,
            color: [1.0, 1.0, 1.0],
            radius: [1.0, 1.0, 1.0],
            kind: SubsurfaceType::Diffusion,
            scale: 1.0,
            anisotropy: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CoatLayer {
    pub weight: f32,
    pub color: [f32; 3],
    pub roughness: f32,
    pub ior: f32,
    pub normal: [f32; 3],
}

impl Default for CoatLayer {
    fn default() -> Self {
        Self {
            weight: 0.0,
            color: [1.0, 1.0, 1.0],
            roughness: 0.1,
            ior: 1.5,
            normal: [0.0, 0.0, 1.0],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EmissionLayer {
    pub weight: f32,
    pub color: [f32; 3],
}

/// Layered physically based parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PbrParameters {
    pub base: BaseLayer,
    pub specular: SpecularLayer,
    pub transmission: TransmissionLayer,
    pub subsurface: SubsurfaceLayer,
    pub coat: CoatLayer,
    pub emission: EmissionLayer,
}

/// A surface material
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Material {
    pub name: String,
    /// Linear RGBA; alpha below 1 means the material blends
    pub base_color_factor: [f32; 4],
    pub emissive_factor: [f32; 3],
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub pbr: PbrParameters,
    pub textures: BTreeMap<TextureSlot, Texture>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: String::new(),
            base_color_factor: [1.0, 1.0, 1.0, 1.0],
            emissive_factor: [0.0, 0.0, 0.0],
            metallic_factor: 0.0,
            roughness_factor: 1.0,
            pbr: PbrParameters::default(),
            textures: BTreeMap::new(),
        }
    }
}

impl Material {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_texture(mut self, slot: TextureSlot, texture: Texture) -> Self {
        self.textures.insert(slot, texture);
        self
    }

    pub fn texture(&self, slot: TextureSlot) -> Option<&Texture> {
        self.textures.get(&slot)
    }

    pub fn is_opaque(&self) -> bool {
        self.base_color_factor[3] >= 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_texture_stem() {
        assert_eq!(Texture::new("maps/skin_s0.jpg").stem(), "skin_s0");
        assert_eq!(Texture::new("plain").stem(), "plain");
    }

    #[test]
    fn test_material_opacity() {
        let mut mat = Material::new("glass");
        assert!(mat.is_opaque());
        mat.base_color_factor[3] = 0.5;
        assert!(!mat.is_opaque());
    }

    #[test]
    fn test_material_from_partial_json() {
        let json = r#"{
            "name": "skin",
            "textures": { "baseColor": { "filePath": "skin.png" } },
            "pbr": { "subsurface": { "weight": 0.3, "type": "randomWalk" } }
        }"#;
        let mat: Material = serde_json::from_str(json).unwrap();

        assert_eq!(mat.texture(TextureSlot::BaseColor).unwrap().file_path, "skin.png");
        assert_eq!(mat.pbr.subsurface.kind.as_str(), "randomwalk");
        assert_eq!(mat.pbr.specular.ior, 1.5);
        assert_eq!(mat.roughness_factor, 1.0);
    }
}
