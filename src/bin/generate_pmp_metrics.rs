/// Climatology generation for a GFDL experiment.
///
/// This tool:
///   1. Selects the post-processed files of `--ppdir` overlapping `--yr1..--yr2`
///      for every mapped variable
///   2. Reads them as one dataset and builds the monthly annual cycles,
///      stamped with the median year
///   3. Writes `<outdir>/clims/gfdl.experiment.<descriptor>...AC.v<date>.nc`
///      per variable
///
/// It then writes the PMP parameter file that points PMP at those
/// climatologies.
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;

use pmp_workflow::climatology::{self, netcdf_io};
use pmp_workflow::config::{self, WorkflowConfig};
use pmp_workflow::ingest::pp_files;
use pmp_workflow::logging::{self, LogLevel, Stage};
use pmp_workflow::params::PmpParameters;
use pmp_workflow::variables;

#[derive(Parser, Debug)]
#[command(
    name = "generate_pmp_metrics",
    about = "Process climate data and generate PMP parameter file"
)]
struct Args {
    /// Directory of post-processed monthly time series
    #[arg(long)]
    ppdir: Option<PathBuf>,
    /// Experiment descriptor
    #[arg(long)]
    descriptor: Option<String>,
    /// First year of the analysis period
    #[arg(long)]
    yr1: Option<i32>,
    /// Last year of the analysis period
    #[arg(long)]
    yr2: Option<i32>,
    /// Output directory for climatologies and results
    #[arg(long)]
    outdir: Option<PathBuf>,
    /// Root of the PMP reference data (defaults to $PMP_DATA_ROOT)
    #[arg(long)]
    pmp_data_root: Option<PathBuf>,
    /// Where to write the parameter file (default: param.py)
    #[arg(long)]
    param_file: Option<PathBuf>,
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
            ppdir: self.ppdir.clone(),
            descriptor: self.descriptor.clone(),
            yr1: self.yr1,
            yr2: self.yr2,
            outdir: self.outdir.clone(),
            pmp_data_root: self.pmp_data_root.clone(),
            param_file: self.param_file.clone(),
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

    let ppdir = cfg.require_ppdir()?;
    let descriptor = cfg.require_descriptor()?;
    let (yr1, yr2) = cfg.require_years()?;
    let outdir = cfg.require_outdir()?;
    let pmp_data_root = cfg.require_pmp_data_root()?;

    let clim_dir = config::clim_dir(outdir);
    let datestamp = climatology::datestamp_today();
    let mapped = variables::mapped_variables();

    // Every selected file is read into one dataset so all variables share
    // one time range and one median-year axis.
    let mut files = Vec::new();
    let mut pending = Vec::new();
    let mut skipped = 0;
    for mapping in &mapped {
        let Some(gfdl_name) = mapping.gfdl_name else {
            continue;
        };
        let selected = pp_files::select(ppdir, &[gfdl_name], Some(yr1), Some(yr2))
            .with_context(|| format!("Failed to list post-processed files in {}", ppdir.display()))?;
        if selected.is_empty() {
            logging::warn(Stage::Climatology, Some(gfdl_name), "no files in the analysis period");
            skipped += 1;
            continue;
        }
        files.extend(selected);
        pending.push(mapping);
    }
    if files.is_empty() {
        bail!("No post-processed files in {} for {}-{}", ppdir.display(), yr1, yr2);
    }

    let dataset = netcdf_io::read_pp_files(&files)
        .with_context(|| format!("Failed to read post-processed files in {}", ppdir.display()))?;
    let set = climatology::build_climatologies(&dataset, Some(yr1), Some(yr2))
        .context("Failed to compute climatologies")?;
    logging::info(
        Stage::Climatology,
        None,
        &format!("{} files, {} (median year {})", files.len(), set.timerange, set.median_year),
    );

    std::fs::create_dir_all(&clim_dir).with_context(|| format!("Failed to create {}", clim_dir.display()))?;
    let mut written = Vec::new();
    for mapping in pending {
        let Some(field) = set.fields.iter().find(|f| f.name == mapping.cmor_name) else {
            logging::warn(Stage::Climatology, Some(mapping.cmor_name), "variable not present in its files");
            skipped += 1;
            continue;
        };
        let path = clim_dir.join(climatology::climatology_filename(
            descriptor,
            &field.name,
            &set.timerange,
            &datestamp,
        ));
        netcdf_io::write_climatology(&path, &set, field)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        logging::info(Stage::Climatology, Some(&field.name), &format!("-> {}", path.display()));
        written.push(field.name.clone());
    }

    logging::log_stage_summary(Stage::Climatology, "Climatologies", mapped.len(), written.len(), skipped);
    if written.is_empty() {
        bail!("No climatology was produced from {}", ppdir.display());
    }

    let params = PmpParameters {
        descriptor: descriptor.to_string(),
        climatology_vars: written,
        timerange: set.timerange.clone(),
        datestamp,
        clim_dir,
        pmp_data_root: pmp_data_root.to_path_buf(),
        outdir: outdir.to_path_buf(),
    };
    let param_file = cfg.param_file();
    params
        .write(&param_file)
        .with_context(|| format!("Failed to write {}", param_file.display()))?;
    logging::info(Stage::Params, None, &format!("Wrote {}", param_file.display()));

    Ok(())
}
