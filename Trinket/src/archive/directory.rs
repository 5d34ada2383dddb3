//! Unpacked archive on disk.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use super::{ArchiveLoader, archive_key};
use crate::error::{Error, Result};
use crate::utils::normalize_path;

/// An archive that has been unpacked into a directory.
///
/// The file list is indexed once when the archive is opened.
#[derive(Debug, Clone)]
pub struct DirectoryArchive {
    root: PathBuf,
    /// Lowercased archive path to the path as found on disk.
    files: BTreeMap<String, String>,
}

impl DirectoryArchive {
    /// Index every file below `root`.
    ///
    /// # Errors
    /// Returns [`Error::ArchiveNotFound`] if `root` is not a directory, or
    /// [`Error::WalkDirError`] if traversal fails.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(Error::ArchiveNotFound {
                path: root.to_path_buf(),
            });
        }

        let mut files = BTreeMap::new();
        for entry in WalkDir::new(root).follow_links(true) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(root)
                .map_err(|_| Error::InvalidPath(entry.path().display().to_string()))?;
            let path = normalize_path(relative);
            files.insert(archive_key(&path), path);
        }

        debug!("Indexed {} files under {}", files.len(), root.display());
        Ok(Self {
            root: root.to_path_buf(),
            files,
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
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

impl ArchiveLoader for DirectoryArchive {
    fn extract_file(&self, path: &str) -> Result<Option<Vec<u8>>> {
        match self.files.get(&archive_key(path)) {
            Some(on_disk) => Ok(Some(std::fs::read(self.root.join(on_disk))?)),
            None => Ok(None),
        }
    }

    fn find_files(&self, predicate: &dyn Fn(&str) -> bool) -> Vec<String> {
        self.files
            .values()
            .filter(|path| predicate(path))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;
    use crate::utils::hash_path;

    fn archive() -> (TempDir, DirectoryArchive) {
        let dir = TempDir::new().unwrap();
        let model_dir = dir.path().join("pokemon").join("PM0025");
        std::fs::create_dir_all(&model_dir).unwrap();
        std::fs::write(model_dir.join("pm0025.trmdl"), b"model").unwrap();
        std::fs::write(model_dir.join("pm0025.trmsh"), b"mesh").unwrap();
        std::fs::write(dir.path().join("readme.txt"), b"text").unwrap();
        let archive = DirectoryArchive::open(dir.path()).unwrap();
        (dir, archive)
    }

    #[test]
    fn test_extract_is_case_insensitive() {
        let (_dir, archive) = archive();
        assert_eq!(archive.len(), 3);
        assert_eq!(
            archive.extract_file("POKEMON\\pm0025\\PM0025.trmdl").unwrap(),
            Some(b"model".to_vec())
        );
        assert_eq!(archive.extract_file("pokemon/missing.trmdl").unwrap(), None);
    }

    #[test]
    fn test_find_files_by_extension() {
        let (_dir, archive) = archive();
        let found = archive.find_files_by_extension("TRMDL");
        assert_eq!(
            found,
            vec![(
                hash_path("pokemon/PM0025/pm0025.trmdl"),
                "pokemon/PM0025/pm0025.trmdl".to_string()
            )]
        );
        assert_eq!(archive.find_files(&|p| p.ends_with(".txt")), vec!["readme.txt"]);
    }

    #[test]
    fn test_missing_root() {
        assert!(matches!(
            DirectoryArchive::open("/definitely/not/here"),
            Err(Error::ArchiveNotFound { .. })
        ));
    }
}
