/// Portrait plots of an experiment against the CMIP6 reference library.
///
/// Loads the published PMP results for the convention's ensemble and the
/// experiment's own results from `<outdir>/results`, appends the experiment
/// to the library, and draws the per-season and per-region portrait plots
/// into `--outdir`.
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use pmp_workflow::config::{self, WorkflowConfig};
use pmp_workflow::logging::{self, LogLevel, Stage};
use pmp_workflow::metrics::ResultStore;
use pmp_workflow::plot;

#[derive(Parser, Debug)]
#[command(name = "portrait_plot", about = "Generate portrait plot")]
struct Args {
    /// Output directory holding `results/`; images are written here
    #[arg(long)]
    outdir: Option<PathBuf>,
    /// Root of the PMP reference data (defaults to $PMP_DATA_ROOT)
    #[arg(long)]
    pmp_data_root: Option<PathBuf>,
    /// Convention of the model simulation: AMIP or HIST
    #[arg(long)]
    convention: Option<String>,
    /// TOML workflow configuration
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    log_file: Option<PathBuf>,
    /// Log debug messages
    #[arg(long)]
    verbose: bool,
}

impl Args {
    fn cli_layer(&self) -> WorkflowConfig {
        WorkflowConfig {
            outdir: self.outdir.clone(),
            pmp_data_root: self.pmp_data_root.clone(),
            convention: self.convention.clone(),
            log_file: self.log_file.clone(),
            ..Default::default()
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let cfg = WorkflowConfig::resolve(args.cli_layer(), args.config.as_deref())
        .context("Failed to resolve configuration")?;

    let log_file = cfg.log_file.as_ref().map(|p| p.to_string_lossy().into_owned());
    let level = if args.verbose { LogLevel::Debug } else { LogLevel::Info };
    logging::init_logger(level, log_file.as_deref(), true);

    let outdir = cfg.require_outdir()?;
    let pmp_data_root = cfg.require_pmp_data_root()?;
    let convention = cfg.require_convention()?;

    let library_dir = config::library_dir(pmp_data_root, convention);
    let library = ResultStore::load(library_dir.as_path())
        .with_context(|| format!("Failed to load the {} library from {}", convention, library_dir.display()))?;

    let results_dir = config::results_dir(outdir);
    let experiment = ResultStore::load(results_dir.as_path())
        .with_context(|| format!("Failed to load experiment results from {}", results_dir.display()))?;

    let merged = library.merge(&experiment);
    logging::info(
        Stage::Metrics,
        None,
        &format!(
            "Merged store: {} variables, {} regions, {} statistics",
            merged.variables().len(),
            merged.regions().len(),
            merged.statistics().len()
        ),
    );

    let written = plot::write_portrait_plots(&merged, convention, outdir).context("Failed to draw portrait plots")?;
    logging::log_stage_summary(Stage::Plot, "Portrait plots", written.len(), written.len(), 0);

    Ok(())
}
