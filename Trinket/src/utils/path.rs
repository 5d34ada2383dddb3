//! Path utilities

use std::path::Path;

/// Normalize path separators to forward slashes (for archive paths)
pub fn normalize_path<P: AsRef<Path>>(path: P) -> String {
    path.as_ref().to_string_lossy().replace('\\', "/")
}

/// Directory part of an archive path, without the trailing slash.
///
/// Returns an empty string for paths at the archive root.
pub fn parent_dir(path: &str) -> &str {
    path.rfind('/').map_or("", |idx| &path[..idx])
}

/// Resolve `relative` against the archive directory `base_dir`.
///
/// Separators are normalized, `.` segments dropped and `..` segments pop the
/// previous component. A `..` that would climb above the archive root is
/// discarded.
pub fn resolve_relative(base_dir: &str, relative: &str) -> String {
    let relative = normalize_path(relative);
    let base_dir = normalize_path(base_dir);

    let mut parts: Vec<&str> = Vec::new();
    let joined = if relative.starts_with('/') {
        relative.trim_start_matches('/').to_string()
    } else if base_dir.is_empty() {
        relative
    } else {
        format!("{base_dir}/{relative}")
    };

    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }

    parts.join("/")
}

/// File stem of an archive path (name without directory and extension)
pub fn file_stem(path: &str) -> &str {
    let name = path.rsplit('/').next().unwrap_or(path);
    name.rfind('.').map_or(name, |idx| &name[..idx])
}

/// True if `path` ends with the extension `ext` (with or without the dot),
/// compared case-insensitively.
pub fn has_extension(path: &str, ext: &str) -> bool {
    let ext = ext.trim_start_matches('.');
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}
