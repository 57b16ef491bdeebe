//! The `ResultStore`: PMP metric tables keyed by statistic, season and region.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::ingest::results_json::{self, VariableResults};
use crate::logging::{self, Stage};
use crate::metrics::table::MetricsTable;
use crate::model::{MetricsError, Season};

/// region → table
pub type RegionTables = BTreeMap<String, MetricsTable>;
/// season → region → table
pub type SeasonTables = BTreeMap<Season, RegionTables>;

static EMPTY_TABLE: MetricsTable = MetricsTable::new();

// ---------------------------------------------------------------------------
// Input selection
// ---------------------------------------------------------------------------

/// Where a `ResultStore` reads its JSON files from.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultSource {
    /// A single JSON file, or a directory whose `*.json` entries are read.
    Path(PathBuf),
    /// An explicit list of JSON files.
    Files(Vec<PathBuf>),
}

impl From<PathBuf> for ResultSource {
    fn from(path: PathBuf) -> Self {
        ResultSource::Path(path)
    }
}

impl From<&Path> for ResultSource {
    fn from(path: &Path) -> Self {
        ResultSource::Path(path.to_path_buf())
    }
}

impl From<&str> for ResultSource {
    fn from(path: &str) -> Self {
        ResultSource::Path(PathBuf::from(path))
    }
}

impl From<Vec<PathBuf>> for ResultSource {
    fn from(files: Vec<PathBuf>) -> Self {
        ResultSource::Files(files)
    }
}

impl ResultSource {
    /// Expands the source into the list of files to read.
    pub fn resolve(&self) -> Result<Vec<PathBuf>, MetricsError> {
        match self {
            ResultSource::Files(files) => Ok(files.clone()),
            ResultSource::Path(path) => {
                if !path.exists() {
                    return Err(MetricsError::NotFound(path.clone()));
                }
                if path.is_file() {
                    Ok(vec![path.clone()])
                } else if path.is_dir() {
                    json_files_in(path)
                } else {
                    Err(MetricsError::InvalidSource(path.clone()))
                }
            }
        }
    }
}

/// `*.json` files directly inside `dir`, sorted.
pub fn json_files_in(dir: &Path) -> Result<Vec<PathBuf>, MetricsError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).follow_links(true) {
        let entry = entry.map_err(|e| MetricsError::Io {
            path: dir.to_path_buf(),
            source: e.into(),
        })?;
        let is_json = entry.path().extension().is_some_and(|ext| ext == "json");
        if entry.file_type().is_file() && is_json {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

// ---------------------------------------------------------------------------
// ResultStore
// ---------------------------------------------------------------------------

/// Mean-climate metric tables for a set of models.
///
/// `tables[stat][season][region]` holds one row per model run and one
/// column per variable. The derived sets list every variable, unit label,
/// region and statistic the store was built from. A store is read-only
/// once built; `merge` produces a new one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultStore {
    tables: BTreeMap<String, SeasonTables>,
    variables: BTreeSet<String>,
    units: BTreeSet<String>,
    regions: BTreeSet<String>,
    statistics: BTreeSet<String>,
}

impl ResultStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads every JSON file the source names and builds a store from them.
    pub fn load(source: impl Into<ResultSource>) -> Result<Self, MetricsError> {
        let files = source.into().resolve()?;

        let mut results = Vec::with_capacity(files.len());
        for file in &files {
            let parsed = results_json::read_results_file(file)?;
            logging::debug(
                Stage::Metrics,
                Some(&parsed.variable),
                &format!("{} runs from {}", parsed.runs.len(), file.display()),
            );
            results.push(parsed);
        }

        let store = Self::from_results(&results);
        logging::info(
            Stage::Metrics,
            None,
            &format!(
                "Loaded {} files: {} variables, {} model runs",
                files.len(),
                store.variables.len(),
                store.model_run_count()
            ),
        );
        Ok(store)
    }

    /// Builds the tables from parsed result files.
    ///
    /// Every statistic gets a table for every season and every region seen.
    /// Each table has one row per (model, run) across all files, sorted, and
    /// one column per variable, sorted. Values a run does not report are NaN.
    pub fn from_results(results: &[VariableResults]) -> Self {
        let mut store = ResultStore::new();
        let mut runs: BTreeSet<(&str, &str)> = BTreeSet::new();
        // (variable, model, run) → run results
        let mut index: HashMap<(&str, &str, &str), &results_json::RunResults> = HashMap::new();

        for var in results {
            store.variables.insert(var.variable.clone());
            store.units.insert(var.unit_label());
            for run in &var.runs {
                runs.insert((run.model.as_str(), run.run.as_str()));
                index.insert((var.variable.as_str(), run.model.as_str(), run.run.as_str()), run);
                for (region, stats) in &run.regions {
                    store.regions.insert(region.clone());
                    store.statistics.extend(stats.keys().cloned());
                }
            }
        }

        let columns: Vec<String> = store.variables.iter().cloned().collect();

        let mut tables = BTreeMap::new();
        for stat in &store.statistics {
            let mut seasons = SeasonTables::new();
            for season in Season::ALL {
                let mut regions = RegionTables::new();
                for region in &store.regions {
                    let mut table = MetricsTable::with_columns(columns.clone());
                    for &(model, run) in &runs {
                        let values: HashMap<&str, f64> = columns
                            .iter()
                            .filter_map(|var| {
                                let value = index
                                    .get(&(var.as_str(), model, run))?
                                    .value(region, stat, season)?;
                                Some((var.as_str(), value))
                            })
                            .collect();
                        table.push_row(model, run, &values);
                    }
                    regions.insert(region.clone(), table);
                }
                seasons.insert(season, regions);
            }
            tables.insert(stat.clone(), seasons);
        }

        store.tables = tables;
        store
    }

    // -- Lookups ------------------------------------------------------------

    /// The table for `[stat][season][region]`, or an empty table if any key
    /// is absent.
    pub fn table(&self, stat: &str, season: Season, region: &str) -> &MetricsTable {
        self.tables
            .get(stat)
            .and_then(|seasons| seasons.get(&season))
            .and_then(|regions| regions.get(region))
            .unwrap_or(&EMPTY_TABLE)
    }

    pub fn tables(&self) -> &BTreeMap<String, SeasonTables> {
        &self.tables
    }

    pub fn variables(&self) -> &BTreeSet<String> {
        &self.variables
    }

    pub fn units(&self) -> &BTreeSet<String> {
        &self.units
    }

    pub fn regions(&self) -> &BTreeSet<String> {
        &self.regions
    }

    pub fn statistics(&self) -> &BTreeSet<String> {
        &self.statistics
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Number of rows in the first table, i.e. model runs in a store built
    /// from files.
    fn model_run_count(&self) -> usize {
        self.tables
            .values()
            .flat_map(|seasons| seasons.values())
            .flat_map(|regions| regions.values())
            .next()
            .map(MetricsTable::len)
            .unwrap_or(0)
    }

    // -- Merge --------------------------------------------------------------

    /// Combines two stores into a new one.
    ///
    /// At each of the statistic, season and region levels the result has the
    /// union of both stores' keys. Each leaf table is `self`'s table (empty
    /// if absent) followed by `other`'s, with missing cells as NaN. The
    /// derived sets are unioned. Rows are never de-duplicated, so merging a
    /// store with itself doubles every table.
    pub fn merge(&self, other: &ResultStore) -> ResultStore {
        let mut tables = BTreeMap::new();

        let stats: BTreeSet<&String> = self.tables.keys().chain(other.tables.keys()).collect();
        for stat in stats {
            let left = self.tables.get(stat);
            let right = other.tables.get(stat);

            let seasons: BTreeSet<Season> = left
                .into_iter()
                .chain(right)
                .flat_map(|s| s.keys().copied())
                .collect();

            let mut merged_seasons = SeasonTables::new();
            for season in seasons {
                let left_regions = left.and_then(|s| s.get(&season));
                let right_regions = right.and_then(|s| s.get(&season));

                let regions: BTreeSet<&String> = left_regions
                    .into_iter()
                    .chain(right_regions)
                    .flat_map(|r| r.keys())
                    .collect();

                let mut merged_regions = RegionTables::new();
                for region in regions {
                    let a = self.table(stat, season, region);
                    let b = other.table(stat, season, region);
                    merged_regions.insert(region.clone(), a.concat(b));
                }
                merged_seasons.insert(season, merged_regions);
            }
            tables.insert(stat.clone(), merged_seasons);
        }

        ResultStore {
            tables,
            variables: self.variables.union(&other.variables).cloned().collect(),
            units: self.units.union(&other.units).cloned().collect(),
            regions: self.regions.union(&other.regions).cloned().collect(),
            statistics: self.statistics.union(&other.statistics).cloned().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::results_json::RunResults;

    fn run(model: &str, region: &str, stat: &str, season: Season, value: f64) -> RunResults {
        let mut seasons = BTreeMap::new();
        seasons.insert(season, value);
        let mut stats = BTreeMap::new();
        stats.insert(stat.to_string(), seasons);
        let mut regions = BTreeMap::new();
        regions.insert(region.to_string(), stats);
        RunResults {
            model: model.to_string(),
            run: "r1i1p1f1".to_string(),
            regions,
        }
    }

    fn store(var: &str, runs: Vec<RunResults>) -> ResultStore {
        ResultStore::from_results(&[VariableResults {
            variable: var.to_string(),
            units: Some("mm/day".to_string()),
            runs,
        }])
    }

    #[test]
    fn test_from_results_fills_every_season_and_region() {
        let s = store(
            "pr",
            vec![
                run("M1", "global", "rms_xy", Season::Djf, 0.5),
                run("M2", "NHEX", "rms_xy", Season::Jja, 0.9),
            ],
        );

        assert_eq!(s.statistics().iter().collect::<Vec<_>>(), vec!["rms_xy"]);
        assert_eq!(s.regions().len(), 2);
        for season in Season::ALL {
            for region in ["global", "NHEX"] {
                assert_eq!(s.table("rms_xy", season, region).len(), 2);
            }
        }
        let t = s.table("rms_xy", Season::Djf, "global");
        assert_eq!(t.column("pr")[0], 0.5);
        assert!(t.column("pr")[1].is_nan());
        assert!(s.units().contains("pr [mm/day]"));
    }

    #[test]
    fn test_missing_keys_read_as_empty_table() {
        let s = store("pr", vec![run("M1", "global", "rms_xy", Season::Djf, 0.5)]);
        assert!(s.table("bias_xy", Season::Djf, "global").is_empty());
        assert!(s.table("rms_xy", Season::Djf, "TROPICS").is_empty());
        assert!(ResultStore::new().table("rms_xy", Season::Ann, "global").is_empty());
    }

    #[test]
    fn test_merge_concatenates_left_then_right() {
        let a = store("pr", vec![run("M1", "global", "rms_xy", Season::Djf, 0.5)]);
        let b = store("pr", vec![run("M2", "global", "rms_xy", Season::Djf, 0.7)]);

        let merged = a.merge(&b);
        let t = merged.table("rms_xy", Season::Djf, "global");
        assert_eq!(t.model_names(), vec!["M1", "M2"]);
        assert_eq!(t.column("pr"), vec![0.5, 0.7]);
    }

    #[test]
    fn test_merge_keeps_statistic_only_in_right_operand() {
        let a = store("pr", vec![run("M1", "global", "rms_xy", Season::Djf, 0.5)]);
        let b = store("pr", vec![run("M2", "global", "bias_xy", Season::Djf, -0.2)]);

        let merged = a.merge(&b);
        assert!(merged.statistics().contains("bias_xy"));
        assert_eq!(
            merged.tables().keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["bias_xy", "rms_xy"]
        );
        let t = merged.table("bias_xy", Season::Djf, "global");
        assert_eq!(t.model_names(), vec!["M2"]);
        assert_eq!(t.column("pr"), vec![-0.2]);
    }

    #[test]
    fn test_merge_does_not_mutate_operands() {
        let a = store("pr", vec![run("M1", "global", "rms_xy", Season::Djf, 0.5)]);
        let b = store("tas", vec![run("M2", "global", "rms_xy", Season::Djf, 1.5)]);
        let (a_before, b_before) = (a.clone(), b.clone());

        let _ = a.merge(&b);
        assert_eq!(a.table("rms_xy", Season::Djf, "global").len(), 1);
        assert_eq!(b.table("rms_xy", Season::Djf, "global").len(), 1);
        assert_eq!(a.variables(), a_before.variables());
        assert_eq!(b.tables().len(), b_before.tables().len());
    }

    #[test]
    fn test_merge_with_self_duplicates_rows() {
        let a = store("pr", vec![run("M1", "global", "rms_xy", Season::Djf, 0.5)]);
        let merged = a.merge(&a);
        assert_eq!(merged.table("rms_xy", Season::Djf, "global").len(), 2);
        assert_eq!(merged.variables(), a.variables());
    }

    /// Table equality with NaN treated as equal to NaN.
    fn same_table(x: &MetricsTable, y: &MetricsTable) -> bool {
        x.columns() == y.columns()
            && x.len() == y.len()
            && x.rows().iter().zip(y.rows()).all(|(rx, ry)| {
                rx.model == ry.model
                    && rx.run == ry.run
                    && rx
                        .values
                        .iter()
                        .zip(&ry.values)
                        .all(|(a, b)| a == b || (a.is_nan() && b.is_nan()))
            })
    }

    #[test]
    fn test_merge_with_empty_store_is_identity() {
        let a = store(
            "pr",
            vec![
                run("M1", "global", "rms_xy", Season::Djf, 0.5),
                run("M2", "NHEX", "rms_xy", Season::Mam, 0.6),
            ],
        );

        for merged in [a.merge(&ResultStore::new()), ResultStore::new().merge(&a)] {
            assert_eq!(merged.variables(), a.variables());
            assert_eq!(merged.statistics(), a.statistics());
            assert_eq!(
                merged.tables().keys().collect::<Vec<_>>(),
                a.tables().keys().collect::<Vec<_>>()
            );
            for season in Season::ALL {
                for region in ["global", "NHEX"] {
                    assert!(same_table(
                        merged.table("rms_xy", season, region),
                        a.table("rms_xy", season, region)
                    ));
                }
            }
        }
    }

    #[test]
    fn test_load_rejects_missing_path() {
        let err = ResultStore::load("/definitely/not/here").unwrap_err();
        assert!(matches!(err, MetricsError::NotFound(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_load_follows_symlinked_result_files() {
        let archive = tempfile::tempdir().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let target = archive.path().join("pr.json");
        let doc = r#"{"Variable": {"id": "pr"}, "RESULTS": {"M1": {"units": "mm/day",
            "default": {"r1i1p1f1": {"global": {"rms_xy": {"djf": 0.5}}}}}}}"#;
        std::fs::write(&target, doc).unwrap();
        std::os::unix::fs::symlink(&target, dir.path().join("pr.json")).unwrap();

        assert_eq!(json_files_in(dir.path()).unwrap(), vec![dir.path().join("pr.json")]);
        let loaded = ResultStore::load(dir.path()).unwrap();
        assert!(loaded.variables().contains("pr"));
        assert_eq!(loaded.table("rms_xy", Season::Djf, "global").column("pr"), vec![0.5]);
    }
}
