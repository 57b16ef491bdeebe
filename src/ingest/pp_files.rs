//! Discovery of GFDL post-processed monthly time series.
//!
//! Post-processed files are named `<component>.<YYYYMM>-<YYYYMM>.<var>.nc`,
//! e.g. `atmos.198001-198412.pr.nc`. The year range in the second token is
//! used to skip chunks outside the analysis period before any file is opened.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::logging::{self, Stage};
use crate::model::ClimatologyError;

/// A post-processed file that matched one of the requested variables.
#[derive(Debug, Clone, PartialEq)]
pub struct PpFile {
    pub path: PathBuf,
    /// GFDL variable name taken from the file name.
    pub variable: String,
    pub start_year: i32,
    pub end_year: i32,
}

/// Parses the year range from a post-processed file name.
///
/// Only the first four characters of each half are read, so both
/// `198001-198412` and `1980-1984` yield `(1980, 1984)`.
pub fn parse_year_range(file_name: &str) -> Option<(i32, i32)> {
    let token = file_name.split('.').nth(1)?;
    let (start, end) = token.split_once('-')?;
    let year = |s: &str| s.get(0..4)?.parse::<i32>().ok();
    Some((year(start)?, year(end)?))
}

/// Returns `true` if a file covering `start..=end` overlaps the analysis
/// period. A missing bound leaves that side of the period open.
pub fn is_in_range(start: i32, end: i32, yr1: Option<i32>, yr2: Option<i32>) -> bool {
    let yr1 = yr1.unwrap_or(-99999);
    let yr2 = yr2.unwrap_or(99999);
    !(end < yr1 || start > yr2)
}

/// Lists files in `ppdir` (not recursively) named `*.<var>.nc` for any of
/// `variables`, sorted by path.
pub fn discover(ppdir: &Path, variables: &[&str]) -> Result<Vec<PathBuf>, ClimatologyError> {
    let mut files = Vec::new();

    for entry in WalkDir::new(ppdir).min_depth(1).max_depth(1).follow_links(true) {
        let entry = entry.map_err(|e| ClimatologyError::Io {
            path: ppdir.to_path_buf(),
            source: e.into(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if name.starts_with('.') {
            continue;
        }
        if variables.iter().any(|var| name.ends_with(&format!(".{}.nc", var))) {
            files.push(entry.into_path());
        }
    }

    files.sort();
    Ok(files)
}

/// Discovers the post-processed files for `variables` and keeps those that
/// overlap `yr1..=yr2`.
///
/// Files whose names carry no parseable year range are skipped with a warning.
pub fn select(
    ppdir: &Path,
    variables: &[&str],
    yr1: Option<i32>,
    yr2: Option<i32>,
) -> Result<Vec<PpFile>, ClimatologyError> {
    let mut selected = Vec::new();

    for path in discover(ppdir, variables)? {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let Some((start_year, end_year)) = parse_year_range(&name) else {
            logging::warn(Stage::Climatology, Some(&name), "no year range in file name, skipping");
            continue;
        };

        if !is_in_range(start_year, end_year, yr1, yr2) {
            logging::debug(Stage::Climatology, Some(&name), "outside analysis period");
            continue;
        }

        let variable = variables
            .iter()
            .find(|var| name.ends_with(&format!(".{}.nc", var)))
            .map(|var| var.to_string())
            .unwrap_or_default();

        selected.push(PpFile {
            path,
            variable,
            start_year,
            end_year,
        });
    }

    Ok(selected)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_parse_year_range() {
        assert_eq!(parse_year_range("atmos.198001-198412.pr.nc"), Some((1980, 1984)));
        assert_eq!(parse_year_range("atmos.1980-1984.tas.nc"), Some((1980, 1984)));
        assert_eq!(parse_year_range("atmos.static.nc"), None);
        assert_eq!(parse_year_range("nodots"), None);
    }

    #[test]
    fn test_is_in_range_keeps_overlapping_chunks() {
        // Chunk straddling the start of the period.
        assert!(is_in_range(1975, 1979, Some(1979), Some(1990)));
        // Chunk inside.
        assert!(is_in_range(1980, 1984, Some(1979), Some(1990)));
        // Disjoint on either side.
        assert!(!is_in_range(1970, 1974, Some(1979), Some(1990)));
        assert!(!is_in_range(1995, 1999, Some(1979), Some(1990)));
        // Open bounds.
        assert!(is_in_range(1, 2, None, None));
    }

    #[test]
    fn test_select_filters_by_variable_and_years() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "atmos.197501-197912.pr.nc",
            "atmos.198001-198412.pr.nc",
            "atmos.198001-198412.tas.nc",
            "atmos.198001-198412.hur.nc",
            "atmos.static.pr.nc",
            "atmos.199501-199912.tas.nc",
        ] {
            fs::write(dir.path().join(name), b"").unwrap();
        }

        let files = select(dir.path(), &["pr", "tas"], Some(1980), Some(1990)).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|f| f.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();

        assert_eq!(names, vec!["atmos.198001-198412.pr.nc", "atmos.198001-198412.tas.nc"]);
        assert_eq!(files[0].variable, "pr");
        assert_eq!((files[1].start_year, files[1].end_year), (1980, 1984));
    }

    #[cfg(unix)]
    #[test]
    fn test_discover_follows_symlinked_files() {
        let archive = tempfile::tempdir().unwrap();
        let ppdir = tempfile::tempdir().unwrap();
        let target = archive.path().join("atmos.198001-198412.pr.nc");
        fs::write(&target, b"").unwrap();
        std::os::unix::fs::symlink(&target, ppdir.path().join("atmos.198001-198412.pr.nc")).unwrap();

        let files = discover(ppdir.path(), &["pr"]).unwrap();
        assert_eq!(files, vec![ppdir.path().join("atmos.198001-198412.pr.nc")]);
    }
}
