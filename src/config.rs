//! Workflow configuration.
//!
//! Every binary takes its settings from three layers, highest priority
//! first: command-line flags, an optional TOML file (`--config`), and the
//! environment (`PMP_DATA_ROOT`, also read from `.env`). Each layer is a
//! `WorkflowConfig` with every field optional; the binaries ask for the
//! fields they need with the `require_*` accessors.
//!
//! ```toml
//! ppdir = "/archive/am5/pp/atmos/ts/monthly/5yr"
//! outdir = "/work/pmp/c96L65_am5f7c1r0_amip"
//! descriptor = "c96L65_am5f7c1r0_amip"
//! yr1 = 1980
//! yr2 = 2014
//! pmp_data_root = "/work/pmp_data"
//! convention = "AMIP"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::model::{ConfigError, Convention};

/// Environment variable consulted for the PMP data root.
pub const PMP_DATA_ROOT_ENV: &str = "PMP_DATA_ROOT";

/// Observation climatology version referenced by the parameter file.
pub const OBS_CLIM_VERSION: &str = "v20210804";

/// File name of the generated HTML gallery.
pub const GALLERY_FILE_NAME: &str = "pcmdi_figures_gallery.html";

// ---------------------------------------------------------------------------
// Configuration layer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkflowConfig {
    /// Directory of GFDL post-processed monthly time series.
    pub ppdir: Option<PathBuf>,
    /// Root output directory (climatologies, PMP results, plots, gallery).
    pub outdir: Option<PathBuf>,
    /// Experiment descriptor, e.g. `c96L65_am5f7c1r0_amip`.
    pub descriptor: Option<String>,
    pub yr1: Option<i32>,
    pub yr2: Option<i32>,
    /// Root of the PMP reference data (observations and results archive).
    pub pmp_data_root: Option<PathBuf>,
    /// `AMIP` or `HIST`.
    pub convention: Option<String>,
    /// Where the PMP parameter file is written. Defaults to `param.py`.
    pub param_file: Option<PathBuf>,
    /// Optional log file, appended to.
    pub log_file: Option<PathBuf>,
}

impl WorkflowConfig {
    /// Parse a TOML configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// The environment layer. Loads `.env` from the working directory first,
    /// if there is one.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        WorkflowConfig {
            pmp_data_root: std::env::var_os(PMP_DATA_ROOT_ENV).map(PathBuf::from),
            ..Default::default()
        }
    }

    /// Fill every field that is unset in `self` from `lower`.
    pub fn layered_over(self, lower: WorkflowConfig) -> WorkflowConfig {
        WorkflowConfig {
            ppdir: self.ppdir.or(lower.ppdir),
            outdir: self.outdir.or(lower.outdir),
            descriptor: self.descriptor.or(lower.descriptor),
            yr1: self.yr1.or(lower.yr1),
            yr2: self.yr2.or(lower.yr2),
            pmp_data_root: self.pmp_data_root.or(lower.pmp_data_root),
            convention: self.convention.or(lower.convention),
            param_file: self.param_file.or(lower.param_file),
            log_file: self.log_file.or(lower.log_file),
        }
    }

    /// Resolve the full configuration: `cli` over the optional file over the
    /// environment.
    pub fn resolve(cli: WorkflowConfig, config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let file_layer = match config_file {
            Some(path) => WorkflowConfig::from_file(path)?,
            None => WorkflowConfig::default(),
        };
        Ok(cli.layered_over(file_layer).layered_over(WorkflowConfig::from_env()))
    }

    // -- Required accessors -------------------------------------------------

    pub fn require_ppdir(&self) -> Result<&Path, ConfigError> {
        self.ppdir.as_deref().ok_or(ConfigError::Missing("ppdir"))
    }

    pub fn require_outdir(&self) -> Result<&Path, ConfigError> {
        self.outdir.as_deref().ok_or(ConfigError::Missing("outdir"))
    }

    pub fn require_descriptor(&self) -> Result<&str, ConfigError> {
        self.descriptor.as_deref().ok_or(ConfigError::Missing("descriptor"))
    }

    pub fn require_years(&self) -> Result<(i32, i32), ConfigError> {
        let yr1 = self.yr1.ok_or(ConfigError::Missing("yr1"))?;
        let yr2 = self.yr2.ok_or(ConfigError::Missing("yr2"))?;
        Ok((yr1, yr2))
    }

    pub fn require_pmp_data_root(&self) -> Result<&Path, ConfigError> {
        self.pmp_data_root
            .as_deref()
            .ok_or(ConfigError::Missing("pmp_data_root"))
    }

    pub fn require_convention(&self) -> Result<Convention, ConfigError> {
        self.convention
            .as_deref()
            .ok_or(ConfigError::Missing("convention"))?
            .parse()
    }

    pub fn param_file(&self) -> PathBuf {
        self.param_file
            .clone()
            .unwrap_or_else(|| PathBuf::from("param.py"))
    }
}

// ---------------------------------------------------------------------------
// Derived paths
// ---------------------------------------------------------------------------

/// Directory the climatology files are written to.
pub fn clim_dir(outdir: &Path) -> PathBuf {
    outdir.join("clims")
}

/// Directory PMP writes its JSON results to, and the portrait plot reads.
pub fn results_dir(outdir: &Path) -> PathBuf {
    outdir.join("results")
}

/// Observation climatologies PMP compares against.
pub fn obs_clim_dir(pmp_data_root: &Path) -> PathBuf {
    pmp_data_root.join("obs_clim").join(OBS_CLIM_VERSION)
}

/// Published CMIP6 results for the convention's reference ensemble.
pub fn library_dir(pmp_data_root: &Path, convention: Convention) -> PathBuf {
    pmp_data_root.join(convention.library_subdir())
}

/// Path of the HTML gallery inside the output directory.
pub fn gallery_path(outdir: &Path) -> PathBuf {
    outdir.join(GALLERY_FILE_NAME)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
