//! Types for model export operations

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::Result;

// ============================================================================
// Progress Types
// ============================================================================

/// Progress callback type for export operations
pub type ExportProgressCallback<'a> = &'a (dyn Fn(&ExportProgress) + Sync + Send);

/// Progress information during an export
#[derive(Debug, Clone)]
pub struct ExportProgress {
    /// Current operation phase
    pub phase: ExportPhase,
    /// Current item number (1-indexed)
    pub current: usize,
    /// Total number of items
    pub total: usize,
    /// Current file being processed (if applicable)
    pub current_file: Option<String>,
}

impl ExportProgress {
    /// Create a new progress update
    #[must_use]
    pub fn new(phase: ExportPhase, current: usize, total: usize) -> Self {
        Self {
            phase,
            current,
            total,
            current_file: None,
        }
    }

    /// Create a progress update with a file/item name
    #[must_use]
    pub fn with_file(
        phase: ExportPhase,
        current: usize,
        total: usize,
        file: impl Into<String>,
    ) -> Self {
        Self {
            phase,
            current,
            total,
            current_file: Some(file.into()),
        }
    }

    /// Get the progress percentage (0.0 - 1.0)
    #[must_use]
    pub fn percentage(&self) -> f32 {
        if self.total == 0 {
            1.0
        } else {
            self.current as f32 / self.total as f32
        }
    }
}

/// Phase of an export
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportPhase {
    /// Extracting the model and its dependencies into scratch space
    ResolvingDependencies,
    /// Decoding descriptors into a scene model
    DecodingModel,
    /// Writing the model document
    WritingModel,
    /// Decoding textures and writing PNGs
    ConvertingTextures,
    /// Writing one document per animation clip
    ExportingAnimations,
    /// One model of a batch finished (current/total count models)
    ModelFinished,
    /// Operation complete
    Complete,
}

impl ExportPhase {
    /// Get a human-readable description of this phase
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ResolvingDependencies => "Resolving dependencies",
            Self::DecodingModel => "Decoding model",
            Self::WritingModel => "Writing model",
            Self::ConvertingTextures => "Converting textures",
            Self::ExportingAnimations => "Exporting animations",
            Self::ModelFinished => "Exported model",
            Self::Complete => "Complete",
        }
    }
}

// ============================================================================
// Result and Options Types
// ============================================================================

/// Result of exporting one model
#[derive(Debug, Clone, Default)]
pub struct ExportResult {
    /// Path of the written model document(s)
    pub model_paths: Vec<PathBuf>,
    /// Paths of the written PNG textures
    pub texture_paths: Vec<PathBuf>,
    /// Paths of the written animation documents
    pub animation_paths: Vec<PathBuf>,
    /// Path of the manifest
    pub manifest_path: Option<PathBuf>,
    /// Recoverable problems (missing dependencies, placeholder textures, ...)
    pub warnings: Vec<String>,
}

/// Result of a batch export
#[derive(Debug, Clone, Default)]
pub struct BatchExportResult {
    /// Number of models exported
    pub succeeded: usize,
    /// Number of models that failed
    pub failed: usize,
    /// Number of models attempted
    pub total: usize,
    /// `(model path, error message)` for each failure
    pub failures: Vec<(String, String)>,
    /// Warnings collected from the successful exports
    pub warnings: Vec<String>,
}

impl BatchExportResult {
    /// `succeeded/failed/total` summary line
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{} succeeded / {} failed / {} total",
            self.succeeded, self.failed, self.total
        )
    }
}

/// Options for model export
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    /// Export one document per animation found next to a skinned model
    pub export_animations: bool,
    /// Copy the textures directory under the animations directory
    pub duplicate_textures_for_animations: bool,
    /// Texture directory name inside the output directory
    pub texture_dir: String,
    /// Animation directory name inside the output directory
    pub animation_dir: String,
    /// File stem of the model document
    pub model_file_stem: String,
    /// Extension of animation descriptors to look for
    pub animation_extension: String,
    /// Keep the scratch extraction directory instead of deleting it
    pub keep_scratch: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            export_animations: true,
            duplicate_textures_for_animations: true,
            texture_dir: "textures".to_string(),
            animation_dir: "animations".to_string(),
            model_file_stem: "model".to_string(),
            animation_extension: "tranm".to_string(),
            keep_scratch: false,
        }
    }
}

impl ExportOptions {
    /// Create options with the default layout.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load options from a TOML file. Missing keys keep their defaults.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is not valid TOML.
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    /// Enable or disable animation export
    #[must_use]
    pub fn with_animations(mut self, enabled: bool) -> Self {
        self.export_animations = enabled;
        self
    }

    /// Enable or disable the texture copy under the animations directory
    #[must_use]
    pub fn with_duplicate_textures(mut self, enabled: bool) -> Self {
        self.duplicate_textures_for_animations = enabled;
        self
    }

    /// Set the texture directory name
    #[must_use]
    pub fn with_texture_dir(mut self, dir: impl Into<String>) -> Self {
        self.texture_dir = dir.into();
        self
    }

    /// Set the animation directory name
    #[must_use]
    pub fn with_animation_dir(mut self, dir: impl Into<String>) -> Self {
        self.animation_dir = dir.into();
        self
    }

    /// Keep the scratch directory after export
    #[must_use]
    pub fn with_keep_scratch(mut self, keep: bool) -> Self {
        self.keep_scratch = keep;
        self
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_default_layout() {
        let options = ExportOptions::new();
        assert!(options.export_animations);
        assert_eq!(options.texture_dir, "textures");
        assert_eq!(options.animation_dir, "animations");
        assert_eq!(options.model_file_stem, "model");
    }

    #[test]
    fn test_toml_overrides_only_given_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trinket.toml");
        std::fs::write(&path, "export_animations = false\ntexture_dir = \"tex\"\n").unwrap();

        let options = ExportOptions::from_toml_file(&path).unwrap();
        assert_eq!(
            options,
            ExportOptions::new()
                .with_animations(false)
                .with_texture_dir("tex")
        );
    }

    #[test]
    fn test_invalid_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "export_animations = \"maybe\"").unwrap();
        assert!(matches!(
            ExportOptions::from_toml_file(&path),
            Err(crate::Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_progress_percentage() {
        assert_eq!(ExportProgress::new(ExportPhase::Complete, 0, 0).percentage(), 1.0);
        assert_eq!(
            ExportProgress::with_file(ExportPhase::ConvertingTextures, 1, 4, "a.bntx").percentage(),
            0.25
        );
    }

    #[test]
    fn test_batch_summary() {
        let result = BatchExportResult {
            succeeded: 2,
            failed: 1,
            total: 3,
            ..BatchExportResult::default()
        };
        assert_eq!(result.summary(), "2 succeeded / 1 failed / 3 total");
    }
}
