//! Breadth-first extraction of a Trinity model and everything it references.

use std::collections::{HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::archive::{ArchiveLoader, archive_key};
use crate::error::{Error, Result};
use crate::formats::trinity::{DescriptorKind, DescriptorReader, ModelDescriptor};
use crate::utils::{parent_dir, resolve_relative};

/// A file extracted to the scratch directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFile {
    /// Path inside the archive.
    pub archive_path: String,
    /// Where the file was written.
    pub local_path: PathBuf,
    /// `None` for files with an unrecognized extension.
    pub kind: Option<DescriptorKind>,
}

/// Result of resolving one model.
#[derive(Debug, Clone)]
pub struct ResolvedModel {
    pub model_path: String,
    pub model: ModelDescriptor,
    /// Every extracted file, model first, in extraction order.
    pub files: Vec<ResolvedFile>,
    pub warnings: Vec<String>,
}

impl ResolvedModel {
    /// Scratch location of `archive_path`, if it was extracted.
    #[must_use]
    pub fn local_path(&self, archive_path: &str) -> Option<&Path> {
        let key = archive_key(archive_path);
        self.files
            .iter()
            .find(|f| archive_key(&f.archive_path) == key)
            .map(|f| f.local_path.as_path())
    }

    /// Extracted files of `kind`.
    pub fn files_of_kind(&self, kind: DescriptorKind) -> impl Iterator<Item = &ResolvedFile> {
        self.files.iter().filter(move |f| f.kind == Some(kind))
    }

    /// Archive directory of the model descriptor.
    #[must_use]
    pub fn model_dir(&self) -> &str {
        parent_dir(&self.model_path)
    }
}

/// Walks model references through an archive.
pub struct DependencyResolver<'a> {
    archive: &'a dyn ArchiveLoader,
    reader: &'a dyn DescriptorReader,
}

impl<'a> DependencyResolver<'a> {
    #[must_use]
    pub fn new(archive: &'a dyn ArchiveLoader, reader: &'a dyn DescriptorReader) -> Self {
        Self { archive, reader }
    }

    /// Extract `model_path` and its dependencies below `scratch`.
    ///
    /// Missing dependencies and malformed mesh or material descriptors are
    /// recorded as warnings; the references of a malformed descriptor are
    /// not followed.
    ///
    /// # Errors
    /// Returns an error if the model descriptor is missing or malformed, or a
    /// file cannot be written to `scratch`.
    pub fn resolve(&self, model_path: &str, scratch: &Path) -> Result<ResolvedModel> {
        let model_path = resolve_relative("", model_path);
        let data = self
            .archive
            .extract_file(&model_path)?
            .ok_or_else(|| Error::FileNotFoundInArchive(model_path.clone()))?;
        let model = self.reader.read_model(&data)?;

        let mut resolved = ResolvedModel {
            model_path: model_path.clone(),
            model: model.clone(),
            files: vec![write_scratch(scratch, &model_path, &data)?],
            warnings: Vec::new(),
        };

        let mut seen: HashSet<String> = HashSet::new();
        seen.insert(archive_key(&model_path));

        let base = parent_dir(&model_path);
        let mut queue: VecDeque<String> = model
            .meshes
            .iter()
            .chain(&model.skeleton)
            .chain(&model.materials)
            .map(|reference| resolve_relative(base, reference))
            .collect();

        while let Some(path) = queue.pop_front() {
            if !seen.insert(archive_key(&path)) {
                continue;
            }

            let Some(data) = self.archive.extract_file(&path)? else {
                warn!("Missing dependency {path} of {model_path}");
                resolved
                    .warnings
                    .push(format!("missing dependency: {path}"));
                continue;
            };
            resolved.files.push(write_scratch(scratch, &path, &data)?);

            let dir = parent_dir(&path);
            match DescriptorKind::from_path(&path) {
                Some(DescriptorKind::Mesh) => match self.reader.read_mesh(&data) {
                    Ok(mesh) => queue.push_back(resolve_relative(dir, &mesh.buffer_name)),
                    Err(err) => {
                        warn!("Skipping references of {path}: {err}");
                        resolved.warnings.push(format!("{path}: {err}"));
                    }
                },
                Some(DescriptorKind::Material) => match self.reader.read_material(&data) {
                    Ok(materials) => queue.extend(
                        materials
                            .materials
                            .iter()
                            .flat_map(|m| &m.textures)
                            .filter(|t| !t.file.is_empty())
                            .map(|t| resolve_relative(dir, &t.file)),
                    ),
                    Err(err) => {
                        warn!("Skipping references of {path}: {err}");
                        resolved.warnings.push(format!("{path}: {err}"));
                    }
                },
                _ => {}
            }
        }

        debug!(
            "Resolved {model_path}: {} files, {} warnings",
            resolved.files.len(),
            resolved.warnings.len()
        );
        Ok(resolved)
    }
}

fn write_scratch(scratch: &Path, archive_path: &str, data: &[u8]) -> Result<ResolvedFile> {
    let local_path = scratch.join(archive_path);
    if let Some(parent) = local_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&local_path, data)?;
    Ok(ResolvedFile {
        archive_path: archive_path.to_string(),
        local_path,
        kind: DescriptorKind::from_path(archive_path),
    })
}
