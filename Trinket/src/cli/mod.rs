//! Trinket CLI - export console models to COLLADA and PNG

pub mod commands;
pub mod progress;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "trinket", version)]
#[command(about = "Export BCH and Trinity models with their textures and animations", long_about = None)]
pub struct Cli {
    /// Unpacked archive directory
    #[arg(long)]
    pub arc: Option<PathBuf>,

    /// Archive path of the model to export (.trmdl or .bch)
    #[arg(long)]
    pub model: Option<String>,

    /// Output directory
    #[arg(short, long, default_value = "out")]
    pub output: PathBuf,

    /// Export every model of the archive, one directory per model
    #[arg(long, conflicts_with_all = ["model", "list"])]
    pub all: bool,

    /// List the model descriptors of the archive
    #[arg(long, conflicts_with = "model")]
    pub list: bool,

    /// Export options file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Only log warnings and errors, no progress display
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log per-record detail
    #[arg(short, long)]
    pub verbose: bool,

    /// Skip animation export
    #[arg(long)]
    pub no_animations: bool,
}

/// `RUST_LOG` applies unless `--verbose` or `--quiet` is given.
fn init_logging(cli: &Cli) {
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else if cli.quiet {
        EnvFilter::new("warn")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn usage_error(message: &str) -> ExitCode {
    eprintln!("error: {message}\n");
    eprintln!("{}", Cli::command().render_usage());
    ExitCode::from(1)
}

/// Run the Trinket CLI
pub fn run_cli() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(&cli);

    let Some(arc) = cli.arc.as_deref() else {
        return Ok(usage_error("--arc <dir> is required"));
    };

    if cli.list {
        commands::list::execute(arc)?;
        return Ok(ExitCode::SUCCESS);
    }

    let options = commands::export::load_options(&cli)?;
    if cli.all {
        return commands::export::execute_all(arc, &cli.output, options, cli.quiet);
    }

    let Some(model) = cli.model.as_deref() else {
        return Ok(usage_error("--model <path> is required unless --all or --list is given"));
    };
    commands::export::execute(arc, model, &cli.output, options, cli.quiet)?;
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_flags() {
        let cli = Cli::try_parse_from([
            "trinket",
            "--arc",
            "romfs",
            "--all",
            "--output",
            "exported",
            "--no-animations",
        ])
        .unwrap();
        assert!(cli.all);
        assert!(cli.no_animations);
        assert_eq!(cli.output, PathBuf::from("exported"));
        assert!(cli.model.is_none());
    }

    #[test]
    fn test_all_conflicts_with_model() {
        assert!(Cli::try_parse_from(["trinket", "--arc", "a", "--all", "--model", "m.trmdl"]).is_err());
    }
}
