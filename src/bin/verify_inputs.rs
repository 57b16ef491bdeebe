/// Preflight check of the workflow inputs.
///
/// Checks every configured input and prints a summary. Exits non-zero if
/// any check failed.
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use pmp_workflow::config::WorkflowConfig;
use pmp_workflow::logging::{self, LogLevel};
use pmp_workflow::verify;

#[derive(Parser, Debug)]
#[command(name = "verify_inputs", about = "Check workflow inputs before a run")]
struct Args {
    #[arg(long)]
    ppdir: Option<PathBuf>,
    #[arg(long)]
    yr1: Option<i32>,
    #[arg(long)]
    yr2: Option<i32>,
    #[arg(long)]
    outdir: Option<PathBuf>,
    #[arg(long)]
    pmp_data_root: Option<PathBuf>,
    #[arg(long)]
    convention: Option<String>,
    /// TOML workflow configuration
    #[arg(long)]
    config: Option<PathBuf>,
    /// Write the report as JSON to this path
    #[arg(long)]
    report: Option<PathBuf>,
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    let cli = WorkflowConfig {
        ppdir: args.ppdir.clone(),
        yr1: args.yr1,
        yr2: args.yr2,
        outdir: args.outdir.clone(),
        pmp_data_root: args.pmp_data_root.clone(),
        convention: args.convention.clone(),
        ..Default::default()
    };
    let cfg = WorkflowConfig::resolve(cli, args.config.as_deref()).context("Failed to resolve configuration")?;

    let log_file = cfg.log_file.as_ref().map(|p| p.to_string_lossy().into_owned());
    logging::init_logger(LogLevel::Info, log_file.as_deref(), false);

    let report = verify::run_verification(&cfg);
    verify::print_summary(&report);

    if let Some(path) = &args.report {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
        fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        println!("\n📄 Report written to {}", path.display());
    }

    if report.summary.failed > 0 {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
