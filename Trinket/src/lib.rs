//! # Trinket
//!
//! A pure-Rust library for decoding console 3D assets and exporting them to
//! COLLADA and PNG.
//!
//! ## Supported Formats
//!
//! - **BCH** - 3DS model containers: relocation, GPU command streams,
//!   skeletons, vertex buffers and materials
//! - **BNTX** - Switch texture containers with block-linear deswizzling
//! - **Trinity** - Switch model descriptors (`.trmdl`, `.trmsh`, `.trmbf`,
//!   `.trmtr`, `.trskl`, `.tranm`)
//!
//! ## Quick Start
//!
//! ### Decoding a BCH container
//!
//! ```no_run
//! use trinket::formats::bch::BchContainer;
//!
//! let data = std::fs::read("pokemon.bch")?;
//! let scene = BchContainer::load(&data)?.decode();
//! for model in &scene.models {
//!     println!("{}: {} meshes, {} bones", model.name, model.meshes.len(), model.bones.len());
//! }
//! # Ok::<(), trinket::Error>(())
//! ```
//!
//! ### Exporting a model from an unpacked archive
//!
//! ```no_run
//! use std::path::Path;
//! use trinket::prelude::*;
//!
//! let archive = DirectoryArchive::open("romfs")?;
//! let orchestrator = ExportOrchestrator::new(&archive, &FlatbufferDescriptorReader);
//! let result = orchestrator.export_model(
//!     "pokemon/pm0025/mdl/pm0025.trmdl",
//!     Path::new("out/pm0025"),
//!     &|progress| println!("{}", progress.phase.as_str()),
//! )?;
//! println!("{} textures", result.texture_paths.len());
//! # Ok::<(), trinket::Error>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` - Enables the `trinket` command-line binary

pub mod archive;
pub mod error;
pub mod export;
pub mod formats;
pub mod scene;
pub mod utils;

// Re-exports for convenience
pub use error::{Error, Result};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::error::{Error, Result};

    pub use crate::archive::{ArchiveLoader, DirectoryArchive, MemoryArchive};
    pub use crate::scene::{AnimationClip, Bone, Material, Mesh, SceneModel, Vertex};

    pub use crate::formats::bch::{BchContainer, BchScene};
    pub use crate::formats::bntx::{Bc6hDecoder, BcdecBc6hDecoder, TextureCodec};
    pub use crate::formats::trinity::{DescriptorReader, FlatbufferDescriptorReader};

    pub use crate::export::{
        BatchExportResult, DaeExporter, ExportOptions, ExportOrchestrator, ExportResult,
        ImagePngEncoder, PngEncoder, SceneExporter,
    };
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// CLI module (feature-gated)
#[cfg(feature = "cli")]
pub mod cli;
