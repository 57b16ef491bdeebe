//! Post-processing workflow for PCMDI Metrics Package (PMP) mean-climate runs.
//!
//! Three stages share this library:
//! - climatology generation and the PMP parameter file (`generate_pmp_metrics`)
//! - merging result tables into a reference library and drawing portrait
//!   plots (`portrait_plot`)
//! - the static HTML gallery (`html_gallery`)

pub mod climatology;
pub mod config;
pub mod gallery;
pub mod ingest;
pub mod logging;
pub mod metrics;
pub mod model;
pub mod params;
pub mod plot;
pub mod variables;
pub mod verify;
