//! In-memory archive.

use std::collections::BTreeMap;

use super::{ArchiveLoader, archive_key};
use crate::error::Result;
use crate::utils::normalize_path;

/// Archive whose files live in memory. Useful for feeding already-loaded
/// data through the export pipeline.
#[derive(Debug, Clone, Default)]
pub struct MemoryArchive {
    /// Lowercased path to the original path and contents.
    files: BTreeMap<String, (String, Vec<u8>)>,
}

impl MemoryArchive {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a file.
    pub fn insert(&mut self, path: &str, data: impl Into<Vec<u8>>) {
        let path = normalize_path(path);
        self.files.insert(archive_key(&path), (path, data.into()));
    }

    #[must_use]
    pub fn with_file(mut self, path: &str, data: impl Into<Vec<u8>>) -> Self {
        self.insert(path, data);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl ArchiveLoader for MemoryArchive {
    fn extract_file(&self, path: &str) -> Result<Option<Vec<u8>>> {
        Ok(self
            .files
            .get(&archive_key(path))
            .map(|(_, data)| data.clone()))
    }

    fn find_files(&self, predicate: &dyn Fn(&str) -> bool) -> Vec<String> {
        self.files
            .values()
            .map(|(path, _)| path)
            .filter(|path| predicate(path))
            .cloned()
            .collect()
    }
}
