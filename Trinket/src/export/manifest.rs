//! `manifest.json` written next to each exported model.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Index of the files of one export. Paths are relative to the manifest's
/// directory and use forward slashes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Model name.
    pub name: String,
    /// Archive path (or file path) the model was exported from.
    pub source: String,
    /// Model documents; more than one for multi-model BCH containers.
    pub models: Vec<String>,
    pub textures: Vec<String>,
    pub animations: Vec<String>,
    pub warnings: Vec<String>,
}

impl Manifest {
    #[must_use]
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            ..Self::default()
        }
    }

    /// Write as pretty-printed JSON.
    pub fn write(&self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}

/// `path` relative to `root` with forward slashes, or the full path if it
/// is not below `root`.
pub(crate) fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    crate::utils::normalize_path(relative)
}
