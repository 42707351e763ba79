//! Materials, images and textures

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use scenebake_core::{self as input, TextureSlot};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{Image, ImageExtensions, Material, MaterialExtensions, PbrMetallicRoughness, PreloadUri, Texture, TextureInfo, UdimTexture};

/// File name infix that marks a low-resolution preload variant
const PRELOAD_MARKER: &str = "_s0.";

/// Path without its extension; directories are kept
fn remove_ext(path: &str) -> &str {
    match path.rfind('.') {
        Some(dot) if !path[dot..].contains(['/', '\\']) => &path[..dot],
        _ => path,
    }
}

/// Deduplicated image list of one export
///
/// Paths are ordered by path. A path containing `_s0.` is not an image of
/// its own; it becomes the preload URI of the path it was derived from.
#[derive(Debug, Clone, Default)]
pub struct TextureCatalog {
    paths: Vec<String>,
    udims: BTreeMap<String, input::Udim>,
    /// Base path without extension -> preload path
    preloads: BTreeMap<String, String>,
}

impl TextureCatalog {
    pub fn new(materials: &[input::Material]) -> Self {
        let mut textures: BTreeMap<&str, &input::Texture> = BTreeMap::new();
        for material in materials {
            for texture in material.textures.values() {
                textures.entry(texture.file_path.as_str()).or_insert(texture);
            }
        }

        let mut catalog = TextureCatalog::default();
        for (path, texture) in textures {
            if path.contains(PRELOAD_MARKER) {
                let base = path.replacen(PRELOAD_MARKER, ".", 1);
                catalog
                    .preloads
                    .insert(remove_ext(&base).to_string(), path.to_string());
                continue;
            }
            if let Some(udim) = &texture.udim {
                catalog.udims.insert(path.to_string(), udim.clone());
            }
            catalog.paths.push(path.to_string());
        }
        catalog
    }

    /// Image paths in emission order
    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Texture index of `path`
    pub fn index_of(&self, path: &str) -> Option<usize> {
        self.paths.binary_search_by(|p| p.as_str().cmp(path)).ok()
    }

    /// Preload variant recorded for `path`
    pub fn preload_of(&self, path: &str) -> Option<&str> {
        self.preloads.get(remove_ext(path)).map(String::as_str)
    }

    /// Texture index bound to `slot` of `material`
    pub fn slot_index(&self, material: &input::Material, slot: TextureSlot) -> Option<usize> {
        material
            .texture(slot)
            .and_then(|texture| self.index_of(&texture.file_path))
    }

    fn info(&self, material: &input::Material, slot: TextureSlot) -> Option<TextureInfo> {
        self.slot_index(material, slot).map(|index| TextureInfo { index })
    }

    /// `images` entries; `uri` maps a source path to the URI written out
    pub fn images(&self, uri: impl Fn(&str) -> String) -> Vec<Image> {
        self.paths
            .iter()
            .map(|path| {
                let preload_uri = self.preload_of(path).map(|preload| PreloadUri { uri: uri(preload) });
                let udim = self.udims.get(path).map(|udim| UdimTexture {
                    tiles: udim.tiles.clone(),
                    url: udim.url.clone(),
                });
                let extensions = (preload_uri.is_some() || udim.is_some())
                    .then_some(ImageExtensions { preload_uri, udim });
                Image {
                    name: input::Texture::new(path.as_str()).stem().to_string(),
                    uri: uri(path),
                    extensions,
                }
            })
            .collect()
    }

    /// `textures` entries: one per image, all on sampler 0
    pub fn textures(&self) -> Vec<Texture> {
        (0..self.paths.len())
            .map(|source| Texture { sampler: 0, source })
            .collect()
    }

    /// Every file an export references: images and their preload variants
    pub fn source_files(&self) -> Vec<&str> {
        let mut files: Vec<&str> = self.paths.iter().map(String::as_str).collect();
        files.extend(self.preloads.values().map(String::as_str));
        files
    }
}

/// File name a texture gets when copied next to the output. Formats the
/// image writer cannot produce (TIFF, GIF, ...) are renamed to PNG.
pub fn copied_texture_name(path: &str) -> String {
    let path = Path::new(path);
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "png" | "jpg" | "jpeg" | "bmp" => format!("{stem}.{ext}"),
        _ => format!("{stem}.png"),
    }
}

/// Copied file name for every source, unique within the output directory.
/// Sources whose names collide (same file name in different directories)
/// get a numeric suffix, in source order.
pub fn copied_texture_names<'a>(sources: &[&'a str]) -> BTreeMap<&'a str, String> {
    let mut taken = BTreeSet::new();
    let mut names = BTreeMap::new();
    for &source in sources {
        let name = copied_texture_name(source);
        let unique = if taken.insert(name.to_ascii_lowercase()) {
            name
        } else {
            let (stem, ext) = name.rsplit_once('.').unwrap_or((name.as_str(), "png"));
            let renamed = (1..)
                .map(|n| format!("{stem}_{n}.{ext}"))
                .find(|candidate| taken.insert(candidate.to_ascii_lowercase()))
                .unwrap_or_default();
            warn!(texture = source, name = %renamed, "texture file name already used, renamed");
            renamed
        };
        names.insert(source, unique);
    }
    names
}

/// `LTE_PBR_material` extension block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LtePbrMaterial {
    pub base_weight: f32,
    pub base_color: [f32; 3],
    pub diffuse_roughness: f32,
    pub metalness: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_color_texture: Option<TextureInfo>,

    pub specular_weight: f32,
    pub specular_color: [f32; 3],
    pub specular_roughness: f32,
    #[serde(rename = "specularIOR")]
    pub specular_ior: f32,
    pub specular_rotation: f32,
    pub specular_anisotropy: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specular_color_texture: Option<TextureInfo>,

    pub transmission_weight: f32,
    pub transmission_color: [f32; 3],
    pub transmission_depth: f32,
    pub transmission_scatter: [f32; 3],
    pub transmission_scatter_anisotropy: f32,
    pub transmission_extra_roughness: f32,
    pub transmission_dispersion: f32,
    pub transmission_aovs: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transmission_color_texture: Option<TextureInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transmission_scatter_texture: Option<TextureInfo>,

    pub subsurface_weight: f32,
    pub subsurface_color: [f32; 3],
    pub subsurface_radius: [f32; 3],
    pub subsurface_type: String,
    pub subsurface_scale: f32,
    pub subsurface_anisotropy: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subsurface_color_texture: Option<TextureInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subsurface_radius_texture: Option<TextureInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subsurface_scale_texture: Option<TextureInfo>,

    pub coat_weight: f32,
    pub coat_color: [f32; 3],
    pub coat_roughness: f32,
    #[serde(rename = "coatIOR")]
    pub coat_ior: f32,
    pub coat_normal: [f32; 3],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coat_color_texture: Option<TextureInfo>,

    pub emission_weight: f32,
    pub emission_color: [f32; 3],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emission_color_texture: Option<TextureInfo>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub opacity_texture: Option<TextureInfo>,
}

impl LtePbrMaterial {
    pub fn new(material: &input::Material, catalog: &TextureCatalog) -> Self {
        let pbr = &material.pbr;
        let tex = |slot| catalog.info(material, slot);
        Self {
            base_weight: pbr.base.weight,
            base_color: pbr.base.color,
            diffuse_roughness: pbr.base.diffuse_roughness,
            metalness: pbr.base.metalness,
            base_color_texture: tex(TextureSlot::PbrBaseColor),

            specular_weight: pbr.specular.weight,
            specular_color: pbr.specular.color,
            specular_roughness: pbr.specular.roughness,
            specular_ior: pbr.specular.ior,
            specular_rotation: pbr.specular.rotation,
            specular_anisotropy: pbr.specular.anisotropy,
            specular_color_texture: tex(TextureSlot::SpecularColor),

            transmission_weight: pbr.transmission.weight,
            transmission_color: pbr.transmission.color,
            transmission_depth: pbr.transmission.depth,
            transmission_scatter: pbr.transmission.scatter,
            transmission_scatter_anisotropy: pbr.transmission.scatter_anisotropy,
            transmission_extra_roughness: pbr.transmission.extra_roughness,
            transmission_dispersion: pbr.transmission.dispersion,
            transmission_aovs: pbr.transmission.aovs,
            transmission_color_texture: tex(TextureSlot::TransmissionColor),
            transmission_scatter_texture: tex(TextureSlot::TransmissionScatter),

            subsurface_weight: pbr.subsurface.weight,
            subsurface_color: pbr.subsurface.color,
            subsurface_radius: pbr.subsurface.radius,
            subsurface_type: pbr.subsurface.kind.as_str().to_string(),
            subsurface_scale: pbr.subsurface.scale,
            subsurface_anisotropy: pbr.subsurface.anisotropy,
            subsurface_color_texture: tex(TextureSlot::SubsurfaceColor),
            subsurface_radius_texture: tex(TextureSlot::SubsurfaceRadius),
            subsurface_scale_texture: tex(TextureSlot::SubsurfaceScale),

            coat_weight: pbr.coat.weight,
            coat_color: pbr.coat.color,
            coat_roughness: pbr.coat.roughness,
            coat_ior: pbr.coat.ior,
            coat_normal: pbr.coat.normal,
            coat_color_texture: tex(TextureSlot::CoatColor),

            emission_weight: pbr.emission.weight,
            emission_color: pbr.emission.color,
            emission_color_texture: tex(TextureSlot::EmissionColor),

            opacity_texture: tex(TextureSlot::Opacity),
        }
    }
}

pub const ALPHA_MODE_OPAQUE: &str = "OPAQUE";
pub const ALPHA_MODE_BLEND: &str = "BLEND";

/// Convert one input material. `force_blend` switches an otherwise opaque
/// material to BLEND (base color image with alpha).
pub(crate) fn convert_material(material: &input::Material, catalog: &TextureCatalog, force_blend: bool) -> Material {
    let alpha_mode = if material.is_opaque() && !force_blend {
        ALPHA_MODE_OPAQUE
    } else {
        ALPHA_MODE_BLEND
    };
    Material {
        name: material.name.clone(),
        emissive_factor: material.emissive_factor,
        pbr_metallic_roughness: PbrMetallicRoughness {
            base_color_texture: catalog.info(material, TextureSlot::BaseColor),
            base_color_factor: material.base_color_factor,
            metallic_factor: material.metallic_factor,
            roughness_factor: material.roughness_factor,
        },
        normal_texture: catalog.info(material, TextureSlot::Normal),
        alpha_mode: alpha_mode.to_string(),
        extensions: MaterialExtensions {
            lte_pbr: LtePbrMaterial::new(material, catalog),
        },
    }
}
