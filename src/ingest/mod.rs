/// Input discovery and parsing for the workflow.
///
/// Submodules:
/// - `pp_files`: finds GFDL post-processed time series and filters them by year.
/// - `results_json`: parses PMP mean-climate result files.

pub mod pp_files;
pub mod results_json;
