//! Model export pipeline.
//!
//! For a Trinity model: extract the model and its dependencies to a scratch
//! directory, decode them into a [`SceneModel`], write the model document,
//! convert every BNTX texture to PNG, export the animations found next to
//! the model and finish with a manifest. A `.bch` path skips dependency
//! resolution and exports every model of the container.
//!
//! Output layout of one model:
//!
//! ```text
//! <output>/model.dae
//! <output>/textures/*.png
//! <output>/animations/<clip>.dae
//! <output>/animations/textures/*.png
//! <output>/manifest.json
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use super::dae::{DaeExporter, SceneExporter};
use super::manifest::{Manifest, relative_path};
use super::png::{ImagePngEncoder, PngEncoder};
use super::resolver::{DependencyResolver, ResolvedModel};
use super::types::{
    BatchExportResult, ExportOptions, ExportPhase, ExportProgress, ExportProgressCallback,
    ExportResult,
};
use crate::archive::ArchiveLoader;
use crate::error::{Error, Result};
use crate::formats::bch::BchContainer;
use crate::formats::bntx::{self, TextureCodec};
use crate::formats::trinity::{
    DescriptorKind, DescriptorReader, ModelParts, decode_animation, decode_model,
};
use crate::scene::SceneModel;
use crate::utils::{file_stem, has_extension, parent_dir, resolve_relative};

/// Exports models from one archive.
pub struct ExportOrchestrator<'a> {
    archive: &'a dyn ArchiveLoader,
    reader: &'a dyn DescriptorReader,
    codec: TextureCodec,
    exporter: Box<dyn SceneExporter + 'a>,
    png: Box<dyn PngEncoder + 'a>,
    options: ExportOptions,
}

impl<'a> ExportOrchestrator<'a> {
    /// Orchestrator writing COLLADA and PNG files with default options and no
    /// BC6H decoder.
    #[must_use]
    pub fn new(archive: &'a dyn ArchiveLoader, reader: &'a dyn DescriptorReader) -> Self {
        Self {
            archive,
            reader,
            codec: TextureCodec::new(),
            exporter: Box::new(DaeExporter),
            png: Box::new(ImagePngEncoder),
            options: ExportOptions::default(),
        }
    }

    #[must_use]
    pub fn with_codec(mut self, codec: TextureCodec) -> Self {
        self.codec = codec;
        self
    }

    #[must_use]
    pub fn with_exporter(mut self, exporter: impl SceneExporter + 'a) -> Self {
        self.exporter = Box::new(exporter);
        self
    }

    #[must_use]
    pub fn with_png_encoder(mut self, png: impl PngEncoder + 'a) -> Self {
        self.png = Box::new(png);
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: ExportOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn options(&self) -> &ExportOptions {
        &self.options
    }

    /// Archive paths of every model descriptor, sorted.
    #[must_use]
    pub fn list_models(&self) -> Vec<String> {
        self.archive
            .find_files_by_extension(DescriptorKind::Model.as_str())
            .into_iter()
            .map(|(_, path)| path)
            .collect()
    }

    /// Export every model of the archive, one directory per model named
    /// after its file stem. A failing model is logged and counted; the
    /// remaining models are still exported.
    pub fn export_all(
        &self,
        output_dir: &Path,
        progress: ExportProgressCallback,
    ) -> BatchExportResult {
        let models = self.list_models();
        self.export_batch(&models, output_dir, progress)
    }

    /// Export `models` in order. See [`Self::export_all`].
    pub fn export_batch(
        &self,
        models: &[String],
        output_dir: &Path,
        progress: ExportProgressCallback,
    ) -> BatchExportResult {
        let mut result = BatchExportResult {
            total: models.len(),
            ..BatchExportResult::default()
        };

        for (index, model_path) in models.iter().enumerate() {
            let model_dir = output_dir.join(file_stem(model_path));
            match self.export_model(model_path, &model_dir, progress) {
                Ok(exported) => {
                    result.succeeded += 1;
                    result.warnings.extend(
                        exported
                            .warnings
                            .into_iter()
                            .map(|w| format!("{model_path}: {w}")),
                    );
                }
                Err(err) => {
                    error!("Failed to export {model_path}: {err}");
                    result.failed += 1;
                    result.failures.push((model_path.clone(), err.to_string()));
                }
            }
            progress(&ExportProgress::with_file(
                ExportPhase::ModelFinished,
                index + 1,
                models.len(),
                model_path,
            ));
        }

        info!("Batch export: {}", result.summary());
        progress(&ExportProgress::new(
            ExportPhase::Complete,
            models.len(),
            models.len(),
        ));
        result
    }

    /// Export one model into `output_dir`.
    ///
    /// # Errors
    /// Returns an error if `model_path` is neither a `.trmdl` nor a `.bch`
    /// file, the model descriptor is missing or malformed, the model decodes
    /// to no meshes, or an output file cannot be written.
    /// Missing dependencies, undecodable textures and failing animations are
    /// reported in [`ExportResult::warnings`].
    pub fn export_model(
        &self,
        model_path: &str,
        output_dir: &Path,
        progress: ExportProgressCallback,
    ) -> Result<ExportResult> {
        if has_extension(model_path, "bch") {
            return self.export_bch(model_path, output_dir, progress);
        }
        if !has_extension(model_path, DescriptorKind::Model.as_str()) {
            return Err(Error::UnsupportedModel(model_path.to_string()));
        }

        let scratch = tempfile::Builder::new().prefix("trinket-").tempdir()?;

        progress(&ExportProgress::with_file(
            ExportPhase::ResolvingDependencies,
            0,
            1,
            model_path,
        ));
        let resolved = DependencyResolver::new(self.archive, self.reader)
            .resolve(model_path, scratch.path())?;
        let mut result = ExportResult {
            warnings: resolved.warnings.clone(),
            ..ExportResult::default()
        };

        progress(&ExportProgress::with_file(
            ExportPhase::DecodingModel,
            0,
            1,
            model_path,
        ));
        let name = file_stem(&resolved.model_path).to_string();
        let parts = self.collect_parts(&resolved, &mut result.warnings);
        let model = decode_model(&name, &parts)?;
        if model.meshes.is_empty() {
            return Err(Error::EmptyModel(name));
        }

        fs::create_dir_all(output_dir)?;
        progress(&ExportProgress::with_file(
            ExportPhase::WritingModel,
            0,
            1,
            model_path,
        ));
        let model_file = output_dir.join(format!(
            "{}.{}",
            self.options.model_file_stem,
            self.exporter.extension()
        ));
        self.exporter
            .export_model(&model, &self.options.texture_dir, &model_file)?;
        info!("Exported {model_path} to {}", model_file.display());
        result.model_paths.push(model_file);

        self.convert_textures(&resolved, output_dir, &mut result, progress)?;

        if self.options.export_animations && model.has_skeleton() {
            self.export_animations(&resolved, &model, output_dir, &mut result, progress)?;
        }

        let mut manifest = Manifest::new(name, model_path);
        self.write_manifest(&mut manifest, output_dir, &mut result)?;

        if self.options.keep_scratch {
            let kept = scratch.keep();
            info!("Kept scratch directory {}", kept.display());
        }

        progress(&ExportProgress::with_file(
            ExportPhase::Complete,
            1,
            1,
            model_path,
        ));
        Ok(result)
    }

    /// Export every model of a BCH container as `model.dae`, `model_1.dae`, ...
    fn export_bch(
        &self,
        path: &str,
        output_dir: &Path,
        progress: ExportProgressCallback,
    ) -> Result<ExportResult> {
        let data = self
            .archive
            .extract_file(path)?
            .ok_or_else(|| Error::FileNotFoundInArchive(path.to_string()))?;

        progress(&ExportProgress::with_file(ExportPhase::DecodingModel, 0, 1, path));
        let scene = BchContainer::load(&data)?.decode();
        if scene.models.is_empty() {
            return Err(Error::EmptyModel(file_stem(path).to_string()));
        }

        let mut result = ExportResult {
            warnings: scene.warnings,
            ..ExportResult::default()
        };
        if !scene.textures.is_empty() {
            info!(
                "{path} carries {} texture descriptors; pixel data is not exported",
                scene.textures.len()
            );
        }

        fs::create_dir_all(output_dir)?;
        let total = scene.models.len();
        for (index, model) in scene.models.iter().enumerate() {
            progress(&ExportProgress::with_file(
                ExportPhase::WritingModel,
                index + 1,
                total,
                &model.name,
            ));
            let stem = if index == 0 {
                self.options.model_file_stem.clone()
            } else {
                format!("{}_{index}", self.options.model_file_stem)
            };
            let model_file = output_dir.join(format!("{stem}.{}", self.exporter.extension()));
            self.exporter
                .export_model(model, &self.options.texture_dir, &model_file)?;
            result.model_paths.push(model_file);
        }
        info!("Exported {total} BCH models from {path}");

        let mut manifest = Manifest::new(file_stem(path), path);
        self.write_manifest(&mut manifest, output_dir, &mut result)?;
        progress(&ExportProgress::with_file(ExportPhase::Complete, 1, 1, path));
        Ok(result)
    }

    // ========================================================================
    // Trinity steps
    // ========================================================================

    /// Read an extracted file with `parse`. Files the resolver could not
    /// extract are skipped silently since it already reported them.
    fn load<T>(
        &self,
        resolved: &ResolvedModel,
        path: &str,
        warnings: &mut Vec<String>,
        parse: impl Fn(&[u8]) -> Result<T>,
    ) -> Option<T> {
        let local = resolved.local_path(path)?;
        let parsed = fs::read(local)
            .map_err(Error::from)
            .and_then(|data| parse(&data));
        match parsed {
            Ok(value) => Some(value),
            Err(err) => {
                let message = format!("{path}: {err}");
                if !warnings.contains(&message) {
                    warn!("Skipping {message}");
                    warnings.push(message);
                }
                None
            }
        }
    }

    fn collect_parts(&self, resolved: &ResolvedModel, warnings: &mut Vec<String>) -> ModelParts {
        let base = resolved.model_dir();
        let descriptor = &resolved.model;
        let mut parts = ModelParts::default();

        for mesh_ref in &descriptor.meshes {
            let mesh_path = resolve_relative(base, mesh_ref);
            let Some(mesh) = self.load(resolved, &mesh_path, warnings, |d| self.reader.read_mesh(d))
            else {
                continue;
            };
            let buffer_path = resolve_relative(parent_dir(&mesh_path), &mesh.buffer_name);
            let Some(buffers) = self.load(resolved, &buffer_path, warnings, |d| {
                self.reader.read_mesh_buffer(d)
            }) else {
                continue;
            };
            parts.meshes.push((mesh, buffers));
        }

        parts.skeleton = descriptor.skeleton.as_ref().and_then(|skeleton_ref| {
            let path = resolve_relative(base, skeleton_ref);
            self.load(resolved, &path, warnings, |d| self.reader.read_skeleton(d))
        });

        for material_ref in &descriptor.materials {
            let path = resolve_relative(base, material_ref);
            if let Some(materials) =
                self.load(resolved, &path, warnings, |d| self.reader.read_material(d))
            {
                parts.materials.push(materials);
            }
        }

        parts
    }

    /// Decode every extracted BNTX file into `<output>/<texture_dir>/`.
    ///
    /// A file holding one texture is named after the file, matching material
    /// references; textures of multi-texture files keep their own names.
    fn convert_textures(
        &self,
        resolved: &ResolvedModel,
        output_dir: &Path,
        result: &mut ExportResult,
        progress: ExportProgressCallback,
    ) -> Result<()> {
        let files: Vec<_> = resolved.files_of_kind(DescriptorKind::Texture).collect();
        if files.is_empty() {
            return Ok(());
        }

        let texture_dir = output_dir.join(&self.options.texture_dir);
        fs::create_dir_all(&texture_dir)?;
        let mut written: HashSet<String> = HashSet::new();

        for (index, file) in files.iter().enumerate() {
            progress(&ExportProgress::with_file(
                ExportPhase::ConvertingTextures,
                index + 1,
                files.len(),
                &file.archive_path,
            ));

            let decoded = fs::read(&file.local_path)
                .map_err(Error::from)
                .and_then(|data| bntx::decode(&data, &self.codec));
            let decoded = match decoded {
                Ok(decoded) => decoded,
                Err(err) => {
                    warn!("Skipping texture {}: {err}", file.archive_path);
                    result
                        .warnings
                        .push(format!("{}: {err}", file.archive_path));
                    continue;
                }
            };
            result.warnings.extend(
                decoded
                    .warnings
                    .iter()
                    .map(|w| format!("{}: {w}", file.archive_path)),
            );

            let single = decoded.textures.len() == 1;
            for texture in &decoded.textures {
                let name = if single {
                    file_stem(&file.archive_path).to_string()
                } else {
                    texture.name.clone()
                };
                if !written.insert(name.to_ascii_lowercase()) {
                    continue;
                }
                let path = texture_dir.join(format!("{name}.png"));
                self.png
                    .encode(&texture.rgba, texture.width, texture.height, &path)?;
                info!("Wrote texture {}", path.display());
                result.texture_paths.push(path);
            }
        }
        Ok(())
    }

    /// Animation descriptors in the model's directory.
    fn animation_files(&self, resolved: &ResolvedModel) -> Vec<String> {
        let model_dir = resolved.model_dir().to_ascii_lowercase();
        let extension = &self.options.animation_extension;
        self.archive.find_files(&|path| {
            parent_dir(path).eq_ignore_ascii_case(&model_dir) && has_extension(path, extension)
        })
    }

    fn export_animations(
        &self,
        resolved: &ResolvedModel,
        model: &SceneModel,
        output_dir: &Path,
        result: &mut ExportResult,
        progress: ExportProgressCallback,
    ) -> Result<()> {
        let files = self.animation_files(resolved);
        if files.is_empty() {
            return Ok(());
        }

        let animation_dir = output_dir.join(&self.options.animation_dir);
        fs::create_dir_all(&animation_dir)?;

        for (index, path) in files.iter().enumerate() {
            progress(&ExportProgress::with_file(
                ExportPhase::ExportingAnimations,
                index + 1,
                files.len(),
                path,
            ));

            let clip = self
                .archive
                .extract_file(path)
                .and_then(|data| {
                    data.ok_or_else(|| Error::FileNotFoundInArchive(path.clone()))
                })
                .and_then(|data| self.reader.read_animation(&data))
                .map(|animation| decode_animation(file_stem(path), &animation));
            let clip = match clip {
                Ok(clip) => clip,
                Err(err) => {
                    warn!("Skipping animation {path}: {err}");
                    result.warnings.push(format!("{path}: {err}"));
                    continue;
                }
            };

            let target = animation_dir.join(format!(
                "{}.{}",
                clip.name,
                self.exporter.extension()
            ));
            self.exporter
                .export_animation(model, &clip, &self.options.texture_dir, &target)?;
            info!("Exported animation {}", target.display());
            result.animation_paths.push(target);
        }

        if self.options.duplicate_textures_for_animations && !result.animation_paths.is_empty() {
            copy_textures(&result.texture_paths, &animation_dir.join(&self.options.texture_dir))?;
        }
        Ok(())
    }

    fn write_manifest(
        &self,
        manifest: &mut Manifest,
        output_dir: &Path,
        result: &mut ExportResult,
    ) -> Result<()> {
        let relative = |paths: &[PathBuf]| -> Vec<String> {
            paths.iter().map(|p| relative_path(output_dir, p)).collect()
        };
        manifest.models = relative(&result.model_paths);
        manifest.textures = relative(&result.texture_paths);
        manifest.animations = relative(&result.animation_paths);
        manifest.warnings.clone_from(&result.warnings);

        let path = output_dir.join("manifest.json");
        manifest.write(&path)?;
        result.manifest_path = Some(path);
        Ok(())
    }
}

fn copy_textures(textures: &[PathBuf], target_dir: &Path) -> Result<()> {
    if textures.is_empty() {
        return Ok(());
    }
    fs::create_dir_all(target_dir)?;
    for texture in textures {
        if let Some(name) = texture.file_name() {
            fs::copy(texture, target_dir.join(name))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;
    use crate::archive::MemoryArchive;
    use crate::export::resolver::test_support::{JsonDescriptorReader, json};
    use crate::formats::bntx::test_support::single_texture;
    use crate::formats::trinity::descriptors::{
        AnimationDescriptor, BoneTrackDesc, ModelDescriptor,
    };
    use crate::formats::trinity::scene::test_support::triangle_parts;

    const MODEL: &str = "pm0025/mdl/pm0025.trmdl";

    fn model_archive(prefix: &str) -> MemoryArchive {
        let parts = triangle_parts();
        let (mesh, buffers) = parts.meshes[0].clone();
        let model = ModelDescriptor {
            meshes: vec!["pm0025.trmsh".to_string()],
            skeleton: Some("pm0025.trskl".to_string()),
            materials: vec!["pm0025.trmtr".to_string()],
        };
        let animation = AnimationDescriptor {
            looping: true,
            frame_count: 2,
            fps: 30,
            tracks: vec![BoneTrackDesc {
                bone_name: "root".to_string(),
                translation: vec![[0.0; 3], [0.0, 1.0, 0.0]],
                ..BoneTrackDesc::default()
            }],
        };
        let red = [255u8, 0, 0, 255].repeat(4);

        MemoryArchive::new()
            .with_file(&format!("{prefix}/pm0025.trmdl"), json(&model))
            .with_file(&format!("{prefix}/pm0025.trmsh"), json(&mesh))
            .with_file(&format!("{prefix}/pm.trmbf"), json(&buffers))
            .with_file(&format!("{prefix}/pm0025.trmtr"), json(&parts.materials[0]))
            .with_file(
                &format!("{prefix}/pm0025.trskl"),
                json(&parts.skeleton.unwrap()),
            )
            .with_file(
                &format!("{prefix}/textures/eye_col.bntx"),
                single_texture("eye", 0x0B01, 2, 2, &red),
            )
            .with_file(&format!("{prefix}/idle.tranm"), json(&animation))
    }

    #[test]
    fn test_export_model_layout() {
        let archive = model_archive("pm0025/mdl");
        let out = TempDir::new().unwrap();
        let orchestrator = ExportOrchestrator::new(&archive, &JsonDescriptorReader);

        let result = orchestrator
            .export_model(MODEL, out.path(), &|_| {})
            .unwrap();

        let root = out.path();
        assert!(root.join("model.dae").exists());
        assert!(root.join("textures/eye_col.png").exists());
        assert!(root.join("animations/idle.dae").exists());
        assert!(root.join("animations/textures/eye_col.png").exists());

        let manifest = Manifest::read(&root.join("manifest.json")).unwrap();
        assert_eq!(manifest.models, vec!["model.dae".to_string()]);
        assert_eq!(manifest.textures, vec!["textures/eye_col.png".to_string()]);
        assert_eq!(manifest.animations, vec!["animations/idle.dae".to_string()]);
        // eye_nrm.bntx is referenced but not in the archive
        assert_eq!(
            result.warnings,
            vec!["missing dependency: pm0025/mdl/eye_nrm.bntx".to_string()]
        );
        assert_eq!(manifest.warnings, result.warnings);
    }

    #[test]
    fn test_animations_can_be_disabled() {
        let archive = model_archive("pm0025/mdl");
        let out = TempDir::new().unwrap();
        let orchestrator = ExportOrchestrator::new(&archive, &JsonDescriptorReader)
            .with_options(ExportOptions::new().with_animations(false));

        let result = orchestrator
            .export_model(MODEL, out.path(), &|_| {})
            .unwrap();
        assert!(result.animation_paths.is_empty());
        assert!(!out.path().join("animations").exists());
    }

    #[test]
    fn test_missing_mesh_is_an_empty_model() {
        let mut archive = model_archive("pm0025/mdl");
        archive.insert("pm0025/mdl/pm0025.trmsh", b"not json".to_vec());
        let out = TempDir::new().unwrap();
        let orchestrator = ExportOrchestrator::new(&archive, &JsonDescriptorReader);

        let err = orchestrator
            .export_model(MODEL, out.path(), &|_| {})
            .unwrap_err();
        assert!(matches!(err, Error::EmptyModel(name) if name == "pm0025"));
    }

    #[test]
    fn test_batch_counts_failures() {
        let mut archive = MemoryArchive::new();
        for prefix in ["a/mdl", "b/mdl", "c/mdl"] {
            let single = model_archive(prefix);
            for path in single.find_files(&|_| true) {
                let data = single.extract_file(&path).unwrap().unwrap();
                archive.insert(&path, data);
            }
        }
        archive.insert("b/mdl/pm0025.trmdl", b"broken".to_vec());

        let out = TempDir::new().unwrap();
        let orchestrator = ExportOrchestrator::new(&archive, &JsonDescriptorReader);
        let models = vec![
            "a/mdl/pm0025.trmdl".to_string(),
            "b/mdl/pm0025.trmdl".to_string(),
            "c/mdl/pm0025.trmdl".to_string(),
        ];
        let result = orchestrator.export_batch(&models, out.path(), &|_| {});

        assert_eq!((result.succeeded, result.failed, result.total), (2, 1, 3));
        assert_eq!(result.failures[0].0, "b/mdl/pm0025.trmdl");
        assert_eq!(result.summary(), "2 succeeded / 1 failed / 3 total");
    }

    #[test]
    fn test_unknown_extension_is_unsupported() {
        let archive = model_archive("pm0025/mdl");
        let out = TempDir::new().unwrap();
        let orchestrator = ExportOrchestrator::new(&archive, &JsonDescriptorReader);
        let err = orchestrator
            .export_model("pm0025/mdl/pm0025.trmsh", out.path(), &|_| {})
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedModel(_)));
    }

    #[test]
    fn test_list_models() {
        let archive = model_archive("pm0025/mdl");
        let orchestrator = ExportOrchestrator::new(&archive, &JsonDescriptorReader);
        assert_eq!(orchestrator.list_models(), vec![MODEL.to_string()]);
    }
}
