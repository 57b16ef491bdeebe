//! PMP mean-climate parameter file.
//!
//! PMP reads its run configuration from a Python module, so the file is
//! written as `key = value` lines in Python literal syntax.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config;
use crate::variables;

/// A Python literal.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Str(String),
    Bool(bool),
    List(Vec<String>),
    Dict(Vec<(String, Vec<String>)>),
}

fn quoted(s: &str) -> String {
    format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
}

fn list(items: &[String]) -> String {
    let items: Vec<String> = items.iter().map(|s| quoted(s)).collect();
    format!("[{}]", items.join(", "))
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Str(s) => write!(f, "{}", quoted(s)),
            ParamValue::Bool(true) => write!(f, "True"),
            ParamValue::Bool(false) => write!(f, "False"),
            ParamValue::List(items) => write!(f, "{}", list(items)),
            ParamValue::Dict(entries) => {
                let entries: Vec<String> = entries
                    .iter()
                    .map(|(k, v)| format!("{}: {}", quoted(k), list(v)))
                    .collect();
                write!(f, "{{{}}}", entries.join(", "))
            }
        }
    }
}

/// Inputs that vary between runs; everything else in the file is fixed.
#[derive(Debug, Clone)]
pub struct PmpParameters {
    pub descriptor: String,
    /// Climatology variables (CMOR names) actually written.
    pub climatology_vars: Vec<String>,
    /// `YYYYMM-YYYYMM` of the climatologies.
    pub timerange: String,
    /// `YYYYMMDD` version stamp of the climatologies.
    pub datestamp: String,
    pub clim_dir: PathBuf,
    pub pmp_data_root: PathBuf,
    pub outdir: PathBuf,
}

impl PmpParameters {
    /// Parameters in file order.
    pub fn entries(&self) -> Vec<(&'static str, ParamValue)> {
        let s = |v: &str| ParamValue::Str(v.to_string());
        let dir = |p: &Path| ParamValue::Str(format!("{}/", p.display()));

        vec![
            ("case_id", s("metrics")),
            ("test_data_set", ParamValue::List(vec![self.descriptor.clone()])),
            ("vars", ParamValue::List(variables::pmp_variable_list(&self.climatology_vars))),
            ("reference_data_set", ParamValue::List(vec!["all".to_string()])),
            ("target_grid", s("2.5x2.5")),
            ("regrid_tool", s("regrid2")),
            ("regrid_method", s("linear")),
            ("regrid_tool_ocn", s("esmf")),
            ("regrid_method_ocn", s("linear")),
            (
                "filename_template",
                ParamValue::Str(format!(
                    "gfdl.experiment.%(model_version).r1i1p1.mon.%(variable).{}.AC.v{}.nc",
                    self.timerange, self.datestamp
                )),
            ),
            ("sftlf_filename_template", s("sftlf_%(model_version).nc")),
            ("generate_sftlf", ParamValue::Bool(true)),
            (
                "regions",
                ParamValue::Dict(vec![("rsus".to_string(), vec!["Global".to_string()])]),
            ),
            ("test_data_path", ParamValue::Str(self.clim_dir.display().to_string())),
            ("reference_data_path", dir(&config::obs_clim_dir(&self.pmp_data_root))),
            ("metrics_output_path", dir(&config::results_dir(&self.outdir))),
        ]
    }

    pub fn render(&self) -> String {
        self.entries()
            .into_iter()
            .map(|(key, value)| format!("{} = {}\n", key, value))
            .collect()
    }

    pub fn write(&self, path: &Path) -> io::Result<()> {
        fs::write(path, self.render())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PmpParameters {
        PmpParameters {
            descriptor: "c96L65_am5f7c1r0_amip".into(),
            climatology_vars: vec!["ta".into(), "pr".into(), "zg".into()],
            timerange: "198001-198412".into(),
            datestamp: "20241001".into(),
            clim_dir: PathBuf::from("/work/out/clims"),
            pmp_data_root: PathBuf::from("/pmp"),
            outdir: PathBuf::from("/work/out"),
        }
    }

    #[test]
    fn test_python_literals() {
        assert_eq!(ParamValue::Str("x".into()).to_string(), "'x'");
        assert_eq!(ParamValue::Bool(true).to_string(), "True");
        assert_eq!(ParamValue::List(vec!["a".into(), "b".into()]).to_string(), "['a', 'b']");
        assert_eq!(
            ParamValue::Dict(vec![("rsus".into(), vec!["Global".into()])]).to_string(),
            "{'rsus': ['Global']}"
        );
        assert_eq!(ParamValue::Str("it's".into()).to_string(), r"'it\'s'");
    }

    #[test]
    fn test_keys_in_file_order() {
        let keys: Vec<&str> = sample().entries().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys.first(), Some(&"case_id"));
        assert_eq!(keys.last(), Some(&"metrics_output_path"));
        assert_eq!(keys.len(), 16);
    }

    #[test]
    fn test_rendered_file() {
        let text = sample().render();
        assert!(text.starts_with("case_id = 'metrics'\n"));
        assert!(text.contains("vars = ['pr', 'ta_200', 'ta_850', 'zg_500']\n"));
        assert!(text.contains(
            "filename_template = 'gfdl.experiment.%(model_version).r1i1p1.mon.%(variable).198001-198412.AC.v20241001.nc'\n"
        ));
        assert!(text.contains("generate_sftlf = True\n"));
        assert!(text.contains("regions = {'rsus': ['Global']}\n"));
        assert!(text.contains("test_data_path = '/work/out/clims'\n"));
        assert!(text.contains("reference_data_path = '/pmp/obs_clim/v20210804/'\n"));
        assert!(text.contains("metrics_output_path = '/work/out/results/'\n"));
    }

    #[test]
    fn test_write_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("param.py");
        sample().write(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), sample().render());
    }
}
