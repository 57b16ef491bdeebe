//! Input Verification Module
//!
//! Preflight checks of the inputs a workflow run depends on: post-processed
//! files, the PMP reference library, observation climatologies and the
//! experiment's PMP results. Each check reports how much of what it expected
//! it found, so a misconfigured path shows up before hours of processing.

use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::config::{self, WorkflowConfig};
use crate::ingest::pp_files;
use crate::logging::{self, Stage};
use crate::metrics::store::json_files_in;
use crate::model::Convention;
use crate::variables;

// ============================================================================
// Verification Results
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub timestamp: String,
    pub checks: Vec<InputCheck>,
    pub summary: VerificationSummary,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VerificationSummary {
    pub total: usize,
    pub working: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputCheck {
    pub name: String,
    pub path: String,
    pub status: VerificationStatus,
    /// Items found (files, variables) out of `expected`.
    pub found: usize,
    pub expected: usize,
    /// Items expected but not found.
    pub missing: Vec<String>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum VerificationStatus {
    Success,
    PartialSuccess,
    Failed,
}

impl InputCheck {
    fn new(name: &str, path: &Path) -> Self {
        InputCheck {
            name: name.to_string(),
            path: path.display().to_string(),
            status: VerificationStatus::Failed,
            found: 0,
            expected: 0,
            missing: Vec::new(),
            error_message: None,
        }
    }

    fn failed(mut self, message: String) -> Self {
        self.status = VerificationStatus::Failed;
        self.error_message = Some(message);
        self
    }

    /// Sets the status from the found/expected counts.
    fn graded(mut self) -> Self {
        self.status = if self.found == 0 {
            VerificationStatus::Failed
        } else if self.found < self.expected {
            VerificationStatus::PartialSuccess
        } else {
            VerificationStatus::Success
        };
        self
    }
}

// ============================================================================
// Checks
// ============================================================================

/// Post-processed directory: at least one in-period file per mapped variable.
pub fn verify_pp_dir(ppdir: &Path, yr1: Option<i32>, yr2: Option<i32>) -> InputCheck {
    let mut check = InputCheck::new("post-processed files", ppdir);
    if !ppdir.is_dir() {
        return check.failed("directory does not exist".to_string());
    }

    let gfdl_names: Vec<&str> = variables::mapped_variables()
        .iter()
        .filter_map(|v| v.gfdl_name)
        .collect();
    check.expected = gfdl_names.len();

    let files = match pp_files::select(ppdir, &gfdl_names, yr1, yr2) {
        Ok(files) => files,
        Err(e) => return check.failed(e.to_string()),
    };
    for name in &gfdl_names {
        if files.iter().any(|f| f.variable == *name) {
            check.found += 1;
        } else {
            check.missing.push(name.to_string());
        }
    }
    check.graded()
}

/// Reference library: the convention's published JSON results.
pub fn verify_library(pmp_data_root: &Path, convention: Convention) -> InputCheck {
    let dir = config::library_dir(pmp_data_root, convention);
    json_check(&format!("{} reference library", convention), &dir)
}

/// Experiment results written by PMP into `<outdir>/results`.
pub fn verify_results(outdir: &Path) -> InputCheck {
    json_check("experiment results", &config::results_dir(outdir))
}

fn json_check(name: &str, dir: &Path) -> InputCheck {
    let mut check = InputCheck::new(name, dir);
    if !dir.is_dir() {
        return check.failed("directory does not exist".to_string());
    }
    match json_files_in(dir) {
        Ok(files) => {
            check.found = files.len();
            check.expected = files.len().max(1);
            check.graded()
        }
        Err(e) => check.failed(e.to_string()),
    }
}

/// Observation climatologies: one entry per variable directory.
pub fn verify_obs_clim(pmp_data_root: &Path) -> InputCheck {
    let dir = config::obs_clim_dir(pmp_data_root);
    let mut check = InputCheck::new("observation climatologies", &dir);
    if !dir.is_dir() {
        return check.failed("directory does not exist".to_string());
    }
    let mut found = 0;
    for entry in WalkDir::new(&dir).min_depth(1).max_depth(1).follow_links(true) {
        if let Err(e) = entry {
            return check.failed(e.to_string());
        }
        found += 1;
    }
    check.found = found;
    check.expected = found.max(1);
    check.graded()
}

// ============================================================================
// Orchestration
// ============================================================================

/// Runs every check whose inputs are configured.
pub fn run_verification(cfg: &WorkflowConfig) -> VerificationReport {
    let mut checks = Vec::new();

    if let Some(ppdir) = cfg.ppdir.as_deref() {
        checks.push(verify_pp_dir(ppdir, cfg.yr1, cfg.yr2));
    }
    if let Some(root) = cfg.pmp_data_root.as_deref() {
        checks.push(verify_obs_clim(root));
        if let Ok(convention) = cfg.require_convention() {
            checks.push(verify_library(root, convention));
        }
    }
    if let Some(outdir) = cfg.outdir.as_deref() {
        checks.push(verify_results(outdir));
    }

    let mut summary = VerificationSummary {
        total: checks.len(),
        ..Default::default()
    };
    for check in &checks {
        match check.status {
            VerificationStatus::Success => {
                logging::info(Stage::Verify, Some(&check.name), &format!("OK ({} found)", check.found));
                summary.working += 1;
            }
            VerificationStatus::PartialSuccess => {
                logging::warn(
                    Stage::Verify,
                    Some(&check.name),
                    &format!("Partial ({}/{}, missing: {:?})", check.found, check.expected, check.missing),
                );
                summary.working += 1;
            }
            VerificationStatus::Failed => {
                logging::error(
                    Stage::Verify,
                    Some(&check.name),
                    &format!("FAILED: {}", check.error_message.as_deref().unwrap_or("nothing found")),
                );
                summary.failed += 1;
            }
        }
    }

    VerificationReport {
        timestamp: Utc::now().to_rfc3339(),
        checks,
        summary,
    }
}

pub fn print_summary(report: &VerificationReport) {
    println!("\n═══════════════════════════════════════════════════════════");
    println!("📊 VERIFICATION SUMMARY");
    println!("═══════════════════════════════════════════════════════════");
    println!();
    for check in &report.checks {
        let mark = match check.status {
            VerificationStatus::Success => "✓",
            VerificationStatus::PartialSuccess => "⚠",
            VerificationStatus::Failed => "✗",
        };
        println!("{} {:<28} {}/{}  {}", mark, check.name, check.found, check.expected, check.path);
    }
    println!();

    let success_rate = if report.summary.total > 0 {
        (report.summary.working as f64 / report.summary.total as f64) * 100.0
    } else {
        0.0
    };
    println!(
        "Overall: {:.1}% ({}/{} inputs usable, {} failed)",
        success_rate, report.summary.working, report.summary.total, report.summary.failed
    );
    println!("═══════════════════════════════════════════════════════════");
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    #[test]
    fn test_missing_directory_fails() {
        let check = verify_pp_dir(Path::new("/nonexistent/pp"), None, None);
        assert_eq!(check.status, VerificationStatus::Failed);
        assert!(check.error_message.is_some());
    }

    #[test]
    fn test_pp_dir_partial_when_variables_missing() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("atmos.198001-198412.pr.nc"), b"").unwrap();
        fs::write(dir.path().join("atmos.185001-185412.tas.nc"), b"").unwrap();

        let check = verify_pp_dir(dir.path(), Some(1980), Some(1984));
        assert_eq!(check.status, VerificationStatus::PartialSuccess);
        assert_eq!(check.found, 1);
        assert!(check.missing.contains(&"tas".to_string()));
        assert_eq!(check.expected, variables::mapped_variables().len());
    }

    #[test]
    fn test_results_dir_counts_json() {
        let dir = tempfile::tempdir().unwrap();
        let results = dir.path().join("results");
        fs::create_dir(&results).unwrap();

        assert_eq!(verify_results(dir.path()).status, VerificationStatus::Failed);

        fs::write(results.join("pr.json"), "{}").unwrap();
        let check = verify_results(dir.path());
        assert_eq!(check.status, VerificationStatus::Success);
        assert_eq!(check.found, 1);
    }

    #[test]
    fn test_run_verification_only_checks_configured_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = WorkflowConfig {
            outdir: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        let report = run_verification(&cfg);
        assert_eq!(report.checks.len(), 1);
        assert_eq!(report.summary, VerificationSummary { total: 1, working: 0, failed: 1 });

        let cfg = WorkflowConfig {
            pmp_data_root: Some(PathBuf::from("/nonexistent")),
            convention: Some("AMIP".into()),
            ..Default::default()
        };
        assert_eq!(run_verification(&cfg).checks.len(), 2);
    }

    #[test]
    fn test_report_serializes() {
        let report = VerificationReport {
            timestamp: "2024-10-01T00:00:00Z".into(),
            checks: vec![verify_results(Path::new("/nonexistent"))],
            summary: VerificationSummary::default(),
        };
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"status\":\"Failed\""));
    }

    #[cfg(unix)]
    #[test]
    fn test_obs_clim_counts_symlinked_dirs_and_fails_on_dangling_links() {
        let root = tempfile::tempdir().unwrap();
        let archive = tempfile::tempdir().unwrap();
        let obs = config::obs_clim_dir(root.path());
        fs::create_dir_all(&obs).unwrap();
        fs::create_dir(obs.join("pr")).unwrap();
        std::os::unix::fs::symlink(archive.path(), obs.join("tas")).unwrap();

        let check = verify_obs_clim(root.path());
        assert_eq!(check.status, VerificationStatus::Success);
        assert_eq!(check.found, 2);

        std::os::unix::fs::symlink(root.path().join("gone"), obs.join("ua")).unwrap();
        let check = verify_obs_clim(root.path());
        assert_eq!(check.status, VerificationStatus::Failed);
        assert!(check.error_message.is_some());
    }
}
