//! CLI command for listing the models of an archive

use std::path::Path;

use crate::archive::DirectoryArchive;
use crate::cli::progress::LOOKING_GLASS;
use crate::export::ExportOrchestrator;
use crate::formats::trinity::FlatbufferDescriptorReader;

pub fn execute(arc: &Path) -> anyhow::Result<()> {
    let archive = DirectoryArchive::open(arc)?;
    let orchestrator = ExportOrchestrator::new(&archive, &FlatbufferDescriptorReader);

    println!("{LOOKING_GLASS}Scanning {} ({} files)", arc.display(), archive.len());
    let models = orchestrator.list_models();
    for model in &models {
        println!("{model}");
    }
    println!("\nTotal: {} models", models.len());
    Ok(())
}
