//! glTF exporter implementation

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use scenebake_core::{Material as InputMaterial, Mesh as InputMesh, ResultExt, SceneNode, TextureSlot};
use tracing::{debug, info, info_span, warn};

use super::assembler::DocumentAssembler;
use super::glb;
use super::material::{convert_material, copied_texture_names, TextureCatalog};
use super::registerer::{BufferPolicy, ObjectRegisterer};
use super::Gltf;
use crate::codec::MeshCompressor;
use crate::error::{ExportError, ExportResult};
use crate::options::{Container, ExportOptions};
use crate::textures::{convert_or_resize_image, has_alpha_channel, ResizeOptions};

/// Files and counts produced by one export
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportSummary {
    /// The `.gltf` or `.glb` file
    pub document: PathBuf,
    /// Side buffer files, empty for GLB output
    pub buffers: Vec<PathBuf>,
    /// Textures written next to the document
    pub textures: Vec<PathBuf>,
    pub nodes: usize,
    pub meshes: usize,
    pub accessors: usize,
    pub skins: usize,
}

/// glTF exporter
pub struct GltfExporter {
    options: ExportOptions,
    compressor: Option<Box<dyn MeshCompressor>>,
}

impl GltfExporter {
    /// Create a new glTF exporter
    pub fn new(options: ExportOptions) -> Self {
        Self {
            options,
            compressor: None,
        }
    }

    /// Attach the codec used by the compressed output modes
    pub fn with_compressor(mut self, compressor: impl MeshCompressor + 'static) -> Self {
        self.compressor = Some(Box::new(compressor));
        self
    }

    pub fn options(&self) -> &ExportOptions {
        &self.options
    }

    /// Export the scene below `root` to `output_path`.
    ///
    /// Buffer files are named after the output file stem and written beside
    /// it. Nothing is written when the codec is missing or validation fails.
    pub fn export(&self, root: &SceneNode, output_path: impl AsRef<Path>) -> ExportResult<ExportSummary> {
        let output_path = output_path.as_ref();
        let span = info_span!(
            "export",
            path = %output_path.display(),
            mode = self.options.output_buffer.as_str()
        );
        let _enter = span.enter();

        if self.options.output_buffer.writes_compressed() && self.compressor.is_none() {
            return Err(ExportError::CodecUnavailable(self.options.output_buffer.as_str()));
        }
        self.validate(root)?;

        let basename = output_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("scene");
        let base_dir = output_path.parent().unwrap_or(Path::new(""));

        let mut reg = ObjectRegisterer::new(basename, BufferPolicy::from_options(&self.options));
        reg.register_objects(root, self.compressor.as_deref(), self.options.codec_failure)?;

        let catalog = TextureCatalog::new(&root.materials);
        let copied_names = match &self.options.textures {
            Some(_) => copied_texture_names(&catalog.source_files()),
            None => BTreeMap::new(),
        };
        let textures = match &self.options.textures {
            Some(resize) => copy_textures(&copied_names, base_dir, resize)?,
            None => Vec::new(),
        };
        let images = catalog.images(|path| copied_names.get(path).cloned().unwrap_or_else(|| path.to_string()));
        let materials = root
            .materials
            .iter()
            .map(|material| convert_material(material, &catalog, self.force_blend(material)))
            .collect();

        let gltf = DocumentAssembler::new(&reg, &self.options)
            .with_materials(materials)
            .with_images(images, catalog.textures())
            .assemble();

        let mut summary = ExportSummary {
            document: output_path.to_path_buf(),
            textures,
            nodes: reg.nodes().len(),
            meshes: reg.meshes().len(),
            accessors: reg.accessors().len(),
            skins: gltf.skins.len(),
            ..Default::default()
        };

        match self.options.container {
            Container::Gltf => {
                self.write_json(&gltf, output_path)?;
                summary.buffers = write_buffers(&reg, base_dir)?;
            }
            Container::Glb => write_single_glb(gltf, &reg, output_path)?,
        }

        info!(
            nodes = summary.nodes,
            meshes = summary.meshes,
            buffers = reg.buffers().len(),
            "export finished"
        );
        Ok(summary)
    }

    /// Mesh shape checks: errors when strict, warnings otherwise
    fn validate(&self, root: &SceneNode) -> ExportResult<()> {
        let mut meshes: Vec<(&str, &InputMesh)> = Vec::new();
        root.walk(&mut |node| {
            if let Some(mesh) = &node.mesh {
                meshes.push((node.path.as_str(), mesh));
            }
        });

        for (path, mesh) in meshes {
            let checked = mesh
                .validate()
                .and_then(|()| mesh.validate_materials(root.materials.len()))
                .with_context(|| format!("node '{path}'"));
            if let Err(err) = checked {
                if self.options.strict_validation {
                    return Err(err.into());
                }
                warn!(node = path, error = %err, "exporting malformed mesh");
            }
        }
        Ok(())
    }

    /// Whether an opaque material must blend because its base color image
    /// carries alpha
    fn force_blend(&self, material: &InputMaterial) -> bool {
        if !self.options.detect_texture_alpha || !material.is_opaque() {
            return false;
        }
        let Some(texture) = material.texture(TextureSlot::BaseColor) else {
            return false;
        };
        match has_alpha_channel(Path::new(&texture.file_path)) {
            Ok(alpha) => alpha,
            Err(err) => {
                warn!(texture = %texture.file_path, error = %err, "cannot inspect texture alpha");
                false
            }
        }
    }

    fn write_json(&self, gltf: &Gltf, path: &Path) -> ExportResult<()> {
        let json = if self.options.pretty_json {
            serde_json::to_string_pretty(gltf)?
        } else {
            serde_json::to_string(gltf)?
        };
        std::fs::write(path, json)?;
        debug!(path = %path.display(), "wrote document");
        Ok(())
    }
}

/// Write every buffer beside the document; an export without buffers fails
fn write_buffers(reg: &ObjectRegisterer, base_dir: &Path) -> ExportResult<Vec<PathBuf>> {
    if reg.buffers().is_empty() {
        return Err(ExportError::EmptyBuffers);
    }
    reg.buffers()
        .iter()
        .map(|buffer| {
            let path = base_dir.join(buffer.uri());
            std::fs::write(&path, buffer.data())?;
            debug!(path = %path.display(), bytes = buffer.byte_length(), "wrote buffer");
            Ok(path)
        })
        .collect()
}

fn write_single_glb(mut gltf: Gltf, reg: &ObjectRegisterer, path: &Path) -> ExportResult<()> {
    let [buffer] = reg.buffers() else {
        return Err(ExportError::GlbBufferCount(reg.buffers().len()));
    };
    for entry in &mut gltf.buffers {
        entry.uri = None;
    }
    glb::write_glb(path, &gltf, buffer.data())
}

/// Convert every referenced image into `base_dir`. Missing sources are
/// skipped with a warning.
fn copy_textures(names: &BTreeMap<&str, String>, base_dir: &Path, resize: &ResizeOptions) -> ExportResult<Vec<PathBuf>> {
    let mut written = Vec::new();
    for (&source, name) in names {
        let src = Path::new(source);
        if !src.is_file() {
            warn!(texture = source, "texture not found, reference kept");
            continue;
        }
        let dst = base_dir.join(name);
        if dst == src {
            continue;
        }
        convert_or_resize_image(src, &dst, resize)?;
        debug!(src = source, dst = %dst.display(), "exported texture");
        written.push(dst);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::CodecError;
    use crate::options::OutputBuffer;
    use scenebake_core::{Mesh, Vec3};

    fn scene() -> SceneNode {
        let mesh = Mesh {
            name: "tri".into(),
            positions: vec![Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0)],
            indices: vec![0, 1, 2],
            ..Default::default()
        };
        SceneNode::new("root", "|root").with_mesh(mesh)
    }

    #[test]
    fn test_missing_codec_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = GltfExporter::new(ExportOptions {
            output_buffer: OutputBuffer::Draco,
            ..Default::default()
        });
        let err = exporter.export(&scene(), dir.path().join("out.gltf")).unwrap_err();

        assert!(matches!(err, ExportError::CodecUnavailable("draco")));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_strict_validation_rejects_bad_index() {
        let mut root = scene();
        if let Some(mesh) = root.mesh.as_mut() {
            mesh.indices = vec![0, 1, 7];
        }
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.gltf");

        let err = GltfExporter::new(ExportOptions::default()).export(&root, &path).unwrap_err();
        let ExportError::Scene(inner) = &err else {
            panic!("expected a scene error, got {err}");
        };
        assert!(matches!(inner.root_cause(), scenebake_core::Error::IndexOutOfRange { index: 7, .. }));
        assert!(err.to_string().contains("node '|root'"));
        assert!(!path.exists());

        let lenient = GltfExporter::new(ExportOptions {
            strict_validation: false,
            ..Default::default()
        });
        assert!(lenient.export(&root, &path).is_ok());
    }

    #[test]
    fn test_glb_needs_one_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let codec = |_: &Mesh| -> Result<Vec<u8>, CodecError> { Ok(vec![1, 2, 3]) };
        let exporter = GltfExporter::new(ExportOptions {
            output_buffer: OutputBuffer::Both,
            container: Container::Glb,
            ..Default::default()
        })
        .with_compressor(codec);

        let err = exporter.export(&scene(), dir.path().join("out.glb")).unwrap_err();
        assert!(matches!(err, ExportError::GlbBufferCount(2)));
    }
}
