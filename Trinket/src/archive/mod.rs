//! Archive access.
//!
//! An [`ArchiveLoader`] maps archive paths (forward slashes, matched
//! case-insensitively) to file contents. [`DirectoryArchive`] serves an
//! unpacked archive from disk; [`MemoryArchive`] holds files in memory.

mod directory;
mod memory;

pub use directory::DirectoryArchive;
pub use memory::MemoryArchive;

use crate::error::Result;
use crate::utils::{hash_path, normalize_path};

/// Read access to the files of a game archive.
pub trait ArchiveLoader {
    /// Contents of `path`, or `None` if the archive has no such file.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read.
    fn extract_file(&self, path: &str) -> Result<Option<Vec<u8>>>;

    /// Every path for which `predicate` returns true, sorted.
    fn find_files(&self, predicate: &dyn Fn(&str) -> bool) -> Vec<String>;

    /// `(path hash, path)` of every file with extension `extension`
    /// (without the dot, case-insensitive), sorted by path.
    fn find_files_by_extension(&self, extension: &str) -> Vec<(u64, String)> {
        let suffix = format!(".{}", extension.to_ascii_lowercase());
        self.find_files(&|path| path.to_ascii_lowercase().ends_with(&suffix))
            .into_iter()
            .map(|path| (hash_path(&path), path))
            .collect()
    }
}

/// Lookup key of an archive path.
pub(crate) fn archive_key(path: &str) -> String {
    normalize_path(path)
        .trim_start_matches('/')
        .to_ascii_lowercase()
}
