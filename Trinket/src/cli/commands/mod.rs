//! CLI command implementations

pub mod export;
pub mod list;
