//! Model export: dependency resolution, COLLADA and PNG output, manifests.
//!
//! ```no_run
//! use std::path::Path;
//! use trinket::archive::DirectoryArchive;
//! use trinket::export::ExportOrchestrator;
//! use trinket::formats::trinity::FlatbufferDescriptorReader;
//!
//! let archive = DirectoryArchive::open("romfs")?;
//! let orchestrator = ExportOrchestrator::new(&archive, &FlatbufferDescriptorReader);
//! let result = orchestrator.export_all(Path::new("out"), &|_| {});
//! println!("{}", result.summary());
//! # Ok::<(), trinket::Error>(())
//! ```

pub mod dae;
pub mod manifest;
pub mod orchestrator;
pub mod png;
pub mod resolver;
pub mod types;

pub use dae::{DaeExporter, SceneExporter};
pub use manifest::Manifest;
pub use orchestrator::ExportOrchestrator;
pub use png::{ImagePngEncoder, PngEncoder, rgba_to_png_bytes};
pub use resolver::{DependencyResolver, ResolvedFile, ResolvedModel};
pub use types::{
    BatchExportResult, ExportOptions, ExportPhase, ExportProgress, ExportProgressCallback,
    ExportResult,
};
