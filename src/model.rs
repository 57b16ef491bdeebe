//! Core data types for the PMP post-processing workflow.
//!
//! This module defines the shared vocabulary imported by all other modules:
//! the closed set of seasons PMP reports on, the simulation convention that
//! picks a reference library, and the error enums for each stage. It contains
//! no I/O.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Seasons
// ---------------------------------------------------------------------------

/// Climatological season as keyed in PMP mean-climate results.
///
/// Ordering follows the calendar of the year PMP reports in (`djf` first,
/// annual mean last), which is also the `BTreeMap` order inside a
/// `ResultStore`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Season {
    Djf,
    Mam,
    Jja,
    Son,
    Ann,
}

impl Season {
    /// All seasons, in storage order.
    pub const ALL: [Season; 5] = [Season::Djf, Season::Mam, Season::Jja, Season::Son, Season::Ann];

    /// The four three-month seasons, without the annual mean.
    pub const QUARTERS: [Season; 4] = [Season::Djf, Season::Mam, Season::Jja, Season::Son];

    /// Lowercase key used in PMP JSON (`"djf"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Season::Djf => "djf",
            Season::Mam => "mam",
            Season::Jja => "jja",
            Season::Son => "son",
            Season::Ann => "ann",
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Season {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "djf" => Ok(Season::Djf),
            "mam" => Ok(Season::Mam),
            "jja" => Ok(Season::Jja),
            "son" => Ok(Season::Son),
            "ann" => Ok(Season::Ann),
            other => Err(format!("not a season key: {}", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Simulation convention
// ---------------------------------------------------------------------------

/// Archive root of the published PMP results, relative to the PMP data root.
pub const RESULTS_ARCHIVE: &str =
    "pcmdi_metrics_results_archive/metrics_results/mean_climate/cmip6";

/// The simulation protocol of the experiment being evaluated. Selects which
/// CMIP6 reference ensemble the experiment is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Convention {
    /// Atmosphere-only runs with prescribed SSTs.
    Amip,
    /// Coupled historical runs.
    Hist,
}

impl Convention {
    pub fn as_str(&self) -> &'static str {
        match self {
            Convention::Amip => "AMIP",
            Convention::Hist => "HIST",
        }
    }

    /// Reference library directory under the PMP data root.
    pub fn library_subdir(&self) -> String {
        match self {
            Convention::Amip => format!("{}/amip/v20210830", RESULTS_ARCHIVE),
            Convention::Hist => format!("{}/historical/v20210811", RESULTS_ARCHIVE),
        }
    }
}

impl fmt::Display for Convention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Convention {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AMIP" => Ok(Convention::Amip),
            "HIST" => Ok(Convention::Hist),
            other => Err(ConfigError::InvalidConvention(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised while building or reading a `ResultStore`.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// The single input path given to the store does not exist.
    #[error("Specified path does not exist: {}", .0.display())]
    NotFound(PathBuf),
    /// The input path exists but is neither a regular file nor a directory.
    #[error("Input must either be a single file, directory, or list of files: {}", .0.display())]
    InvalidSource(PathBuf),
    #[error("I/O error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON error in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors raised while computing or writing climatologies.
#[derive(Debug, Error)]
pub enum ClimatologyError {
    #[error("Unsupported time units: '{0}'")]
    UnsupportedUnits(String),
    #[error("Unsupported calendar: '{0}'")]
    UnsupportedCalendar(String),
    #[error("No time steps between {yr1} and {yr2}")]
    EmptySelection { yr1: i32, yr2: i32 },
    #[error("Median year {year} has {steps} monthly steps, expected 12")]
    IncompleteMedianYear { year: i32, steps: usize },
    #[error("Variable '{name}' has {found} values per step, expected {expected}")]
    ShapeMismatch { name: String, expected: usize, found: usize },
    #[error("Missing variable '{0}'")]
    MissingVariable(String),
    #[error("Time axes of the input files disagree: {0}")]
    InconsistentTime(String),
    #[error("No input files to process")]
    NoInputFiles,
    #[error("NetCDF error in {}: {message}", path.display())]
    Netcdf { path: PathBuf, message: String },
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised while laying out or encoding a portrait plot.
#[derive(Debug, Error)]
pub enum PlotError {
    #[error("Portrait plot needs at least one row and one column")]
    Empty,
    #[error("Portrait plot supports 1, 2 or 4 layers, got {0}")]
    LayerCount(usize),
    #[error("Layer {layer} is {rows}x{cols}, expected {expected_rows}x{expected_cols}")]
    ShapeMismatch {
        layer: usize,
        rows: usize,
        cols: usize,
        expected_rows: usize,
        expected_cols: usize,
    },
    #[error("I/O error writing {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("PNG encoding failed: {0}")]
    Encode(#[from] png::EncodingError),
}

/// Errors raised while resolving the workflow configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required setting '{0}' (pass the flag or set it in the config file)")]
    Missing(&'static str),
    #[error("The convention variable is not set correctly. It must be either 'AMIP' or 'HIST', got '{0}'")]
    InvalidConvention(String),
    #[error("Failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
