//! PMP mean-climate result files.
//!
//! PMP writes one JSON file per variable, holding every model and run it
//! evaluated:
//!
//! ```text
//! { "Variable": { "id": "ua", "level": 85000.0 },
//!   "RESULTS": {
//!     "<model>": {
//!       "units": "m s-1",
//!       "default": {
//!         "source": "...",
//!         "<run>": { "<region>": { "<stat>": { "djf": "0.51", "ann": 0.42, ... } } } } } } }
//! ```
//!
//! Values are written either as numbers or as numeric strings. Anything that
//! is neither (including `CalendarMonths` lists) is not a seasonal value and
//! is skipped.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::model::{MetricsError, Season};

/// Reference dataset key PMP uses for its primary observations.
pub const DEFAULT_REFERENCE: &str = "default";

/// statistic → season → value, for one region.
pub type StatValues = BTreeMap<String, BTreeMap<Season, f64>>;

/// All results for one variable.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableResults {
    /// Variable id, with the pressure level appended in hPa for 4-D fields
    /// (`ua-850`).
    pub variable: String,
    pub units: Option<String>,
    pub runs: Vec<RunResults>,
}

impl VariableResults {
    /// `"pr [mm/day]"`, or the bare variable id when no units were given.
    pub fn unit_label(&self) -> String {
        match &self.units {
            Some(units) => format!("{} [{}]", self.variable, units),
            None => self.variable.clone(),
        }
    }
}

/// Results of one model run against the reference dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct RunResults {
    pub model: String,
    pub run: String,
    /// region → statistic → season → value
    pub regions: BTreeMap<String, StatValues>,
}

impl RunResults {
    pub fn value(&self, region: &str, stat: &str, season: Season) -> Option<f64> {
        self.regions.get(region)?.get(stat)?.get(&season).copied()
    }
}

#[derive(Debug, Deserialize)]
struct VariableHeader {
    id: String,
    level: Option<f64>,
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Reads and parses one PMP result file.
pub fn read_results_file(path: &Path) -> Result<VariableResults, MetricsError> {
    let text = fs::read_to_string(path).map_err(|source| MetricsError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let fallback = fallback_variable_name(path);
    parse_results(&text, &fallback).map_err(|source| MetricsError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Parses the text of a PMP result file. `fallback_name` is used as the
/// variable id when the file has no `Variable` header.
pub fn parse_results(text: &str, fallback_name: &str) -> Result<VariableResults, serde_json::Error> {
    let root: Value = serde_json::from_str(text)?;

    let variable = match root.get("Variable") {
        Some(header) => {
            let header = VariableHeader::deserialize(header)?;
            match header.level {
                Some(level) => format!("{}-{}", header.id, (level / 100.0) as i64),
                None => header.id,
            }
        }
        None => fallback_name.to_string(),
    };

    let mut units = None;
    let mut runs = Vec::new();

    if let Some(models) = root.get("RESULTS").and_then(Value::as_object) {
        for (model, entry) in models {
            let Some(entry) = entry.as_object() else {
                continue;
            };
            if units.is_none() {
                units = entry.get("units").and_then(Value::as_str).map(String::from);
            }
            let Some(reference) = reference_entry(entry) else {
                continue;
            };
            for (run, regions) in reference {
                let Some(regions) = regions.as_object() else {
                    continue; // "source" and other scalar annotations
                };
                runs.push(RunResults {
                    model: model.clone(),
                    run: run.clone(),
                    regions: parse_regions(regions),
                });
            }
        }
    }

    Ok(VariableResults {
        variable,
        units,
        runs,
    })
}

/// Picks the reference dataset block of a model entry: `default` if
/// present, otherwise the first object-valued key other than `units`.
fn reference_entry(model_entry: &Map<String, Value>) -> Option<&Map<String, Value>> {
    if let Some(default) = model_entry.get(DEFAULT_REFERENCE).and_then(Value::as_object) {
        return Some(default);
    }
    model_entry
        .iter()
        .filter(|(key, _)| key.as_str() != "units")
        .find_map(|(_, value)| value.as_object())
}

fn parse_regions(regions: &Map<String, Value>) -> BTreeMap<String, StatValues> {
    let mut parsed = BTreeMap::new();
    for (region, stats) in regions {
        let Some(stats) = stats.as_object() else {
            continue;
        };
        let mut stat_values = StatValues::new();
        for (stat, seasons) in stats {
            let Some(seasons) = seasons.as_object() else {
                continue;
            };
            let values: BTreeMap<Season, f64> = seasons
                .iter()
                .filter_map(|(key, value)| Some((key.parse::<Season>().ok()?, numeric_value(value))))
                .collect();
            if !values.is_empty() {
                stat_values.insert(stat.clone(), values);
            }
        }
        parsed.insert(region.clone(), stat_values);
    }
    parsed
}

/// Numbers and numeric strings become `f64`; everything else is NaN.
fn numeric_value(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => s.trim().parse().unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}

/// Variable id guessed from a file name such as
/// `pr.cmip6.amip.regrid2.2p5x2p5.v20210830.json` or `ua-850_metrics.json`.
fn fallback_variable_name(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    stem.split(['.', '_']).next().unwrap_or_default().to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
