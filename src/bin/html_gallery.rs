/// HTML gallery of the portrait plots in `--outdir`.
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use pmp_workflow::config::WorkflowConfig;
use pmp_workflow::gallery;
use pmp_workflow::logging::{self, LogLevel, Stage};

#[derive(Parser, Debug)]
#[command(name = "html_gallery", about = "Generate the portrait plot gallery")]
struct Args {
    /// Descriptor for the experiment
    #[arg(long)]
    descriptor: Option<String>,
    /// Output directory holding the plots
    #[arg(long)]
    outdir: Option<PathBuf>,
    /// Convention of the model simulation: AMIP or HIST
    #[arg(long)]
    convention: Option<String>,
    /// TOML workflow configuration
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let cli = WorkflowConfig {
        descriptor: args.descriptor.clone(),
        outdir: args.outdir.clone(),
        convention: args.convention.clone(),
        log_file: args.log_file.clone(),
        ..Default::default()
    };
    let cfg = WorkflowConfig::resolve(cli, args.config.as_deref()).context("Failed to resolve configuration")?;

    let log_file = cfg.log_file.as_ref().map(|p| p.to_string_lossy().into_owned());
    logging::init_logger(LogLevel::Info, log_file.as_deref(), true);

    let descriptor = cfg.require_descriptor()?;
    let outdir = cfg.require_outdir()?;
    let convention = cfg.require_convention()?;

    let report = gallery::write_gallery(outdir, descriptor, convention)
        .with_context(|| format!("Failed to write the gallery in {}", outdir.display()))?;
    let total = report.included.len() + report.missing.len();
    logging::log_stage_summary(Stage::Gallery, "Gallery images", total, report.included.len(), report.missing.len());

    Ok(())
}
