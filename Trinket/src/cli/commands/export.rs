//! CLI commands for exporting one model or a whole archive

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use crate::archive::DirectoryArchive;
use crate::cli::Cli;
use crate::cli::progress::{TRUCK, phase_emoji, print_done, print_step, simple_bar, simple_spinner};
use crate::export::{ExportOptions, ExportOrchestrator, ExportPhase, ExportProgress};
use crate::formats::bntx::{BcdecBc6hDecoder, TextureCodec};
use crate::formats::trinity::FlatbufferDescriptorReader;

/// Options from `--config`, then command-line overrides.
pub fn load_options(cli: &Cli) -> anyhow::Result<ExportOptions> {
    let mut options = match &cli.config {
        Some(path) => ExportOptions::from_toml_file(path)?,
        None => ExportOptions::default(),
    };
    if cli.no_animations {
        options.export_animations = false;
    }
    Ok(options)
}

fn codec() -> TextureCodec {
    TextureCodec::new().with_bc6h_decoder(Arc::new(BcdecBc6hDecoder))
}

/// Export one model.
pub fn execute(
    arc: &Path,
    model: &str,
    output: &Path,
    options: ExportOptions,
    quiet: bool,
) -> anyhow::Result<()> {
    let start = Instant::now();
    let archive = DirectoryArchive::open(arc)?;
    let reader = FlatbufferDescriptorReader;
    let orchestrator = ExportOrchestrator::new(&archive, &reader)
        .with_codec(codec())
        .with_options(options);

    let result = if quiet {
        orchestrator.export_model(model, output, &|_| {})?
    } else {
        let pb = simple_spinner(&format!("Exporting {model}"));
        let result = orchestrator.export_model(model, output, &|progress: &ExportProgress| {
            let mut message = format!("{}{}", phase_emoji(progress.phase), progress.phase.as_str());
            if let Some(file) = &progress.current_file {
                message.push_str(&format!(" {file}"));
            }
            pb.set_message(message);
        });
        pb.finish_and_clear();
        result?
    };

    if !quiet {
        for warning in &result.warnings {
            println!("  warning: {warning}");
        }
        println!(
            "{} model file(s), {} texture(s), {} animation(s) written to {}",
            result.model_paths.len(),
            result.texture_paths.len(),
            result.animation_paths.len(),
            output.display()
        );
        print_done(start.elapsed());
    }
    Ok(())
}

/// Export every model of the archive. Exits with failure only when no model
/// could be exported.
pub fn execute_all(
    arc: &Path,
    output: &Path,
    options: ExportOptions,
    quiet: bool,
) -> anyhow::Result<ExitCode> {
    let start = Instant::now();
    let archive = DirectoryArchive::open(arc)?;
    let reader = FlatbufferDescriptorReader;
    let orchestrator = ExportOrchestrator::new(&archive, &reader)
        .with_codec(codec())
        .with_options(options);

    let models = orchestrator.list_models();
    let result = if quiet {
        orchestrator.export_batch(&models, output, &|_| {})
    } else {
        print_step(1, 1, TRUCK, &format!("Exporting {} models", models.len()));
        let pb = simple_bar(models.len() as u64, "Exporting");
        let result = orchestrator.export_batch(&models, output, &|progress: &ExportProgress| {
            if progress.phase == ExportPhase::ModelFinished {
                pb.set_position(progress.current as u64);
            }
        });
        pb.finish_and_clear();
        result
    };

    for (model, error) in &result.failures {
        eprintln!("  failed: {model}: {error}");
    }
    println!("{}", result.summary());
    if !quiet {
        print_done(start.elapsed());
    }

    if result.total > 0 && result.succeeded == 0 {
        Ok(ExitCode::from(1))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
