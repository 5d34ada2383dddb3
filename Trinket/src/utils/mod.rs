//! Utility functions

pub mod hash;
pub mod path;
pub mod reader;

pub use hash::{hash_fnv1a64, hash_path};
pub use path::{file_stem, has_extension, normalize_path, parent_dir, resolve_relative};
pub use reader::ByteReader;
