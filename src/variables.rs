//! Variable registry for GFDL post-processed atmosphere output.
//!
//! Maps the CMOR variable names PMP expects onto the names used in the GFDL
//! post-processing directory. This is the single source of truth for which
//! variables enter the climatology step and how 4-D fields are split into
//! pressure-level variants for the PMP parameter file.

// ---------------------------------------------------------------------------
// Variable metadata
// ---------------------------------------------------------------------------

/// One CMOR variable and its GFDL counterpart.
pub struct VariableMapping {
    /// CMOR name, as used in the climatology file names and by PMP.
    pub cmor_name: &'static str,
    /// Name of the variable in the post-processed files, or `None` when the
    /// model does not produce it (or produces it under an unsupported form).
    pub gfdl_name: Option<&'static str>,
}

/// CMOR variables considered for evaluation, alphabetical.
pub static VARIABLE_REGISTRY: &[VariableMapping] = &[
    VariableMapping { cmor_name: "hur", gfdl_name: None },
    VariableMapping { cmor_name: "hurs", gfdl_name: None },
    VariableMapping { cmor_name: "hus", gfdl_name: None },
    VariableMapping { cmor_name: "huss", gfdl_name: None },
    VariableMapping { cmor_name: "pr", gfdl_name: Some("pr") },
    VariableMapping { cmor_name: "prw", gfdl_name: Some("prw") },
    VariableMapping { cmor_name: "psl", gfdl_name: Some("psl") },
    VariableMapping { cmor_name: "rlds", gfdl_name: Some("rlds") },
    VariableMapping { cmor_name: "rltcre", gfdl_name: None },
    VariableMapping { cmor_name: "rlus", gfdl_name: Some("rlus") },
    VariableMapping { cmor_name: "rlut", gfdl_name: Some("rlut") },
    VariableMapping { cmor_name: "rlutcs", gfdl_name: Some("rlutcs") },
    VariableMapping { cmor_name: "rsds", gfdl_name: Some("rsds") },
    VariableMapping { cmor_name: "rsdscs", gfdl_name: Some("rsdscs") },
    VariableMapping { cmor_name: "rsdt", gfdl_name: Some("rsdt") },
    VariableMapping { cmor_name: "rstcre", gfdl_name: None },
    VariableMapping { cmor_name: "rsus", gfdl_name: Some("rsus") },
    VariableMapping { cmor_name: "rsut", gfdl_name: Some("rsut") },
    VariableMapping { cmor_name: "rsutcs", gfdl_name: Some("rsutcs") },
    VariableMapping { cmor_name: "sfcWind", gfdl_name: Some("sfcWind") },
    VariableMapping { cmor_name: "ta", gfdl_name: Some("ta") },
    VariableMapping { cmor_name: "tas", gfdl_name: Some("tas") },
    VariableMapping { cmor_name: "tauu", gfdl_name: Some("tauu") },
    VariableMapping { cmor_name: "tauv", gfdl_name: Some("tauv") },
    VariableMapping { cmor_name: "ua", gfdl_name: Some("ua") },
    VariableMapping { cmor_name: "va", gfdl_name: Some("va") },
    VariableMapping { cmor_name: "zg", gfdl_name: Some("zg") },
];

/// GFDL bookkeeping variables that are carried in the post-processed files
/// but are not evaluated by PMP.
pub const GFDL_EXCLUSIONS: &[&str] = &["average_DT", "average_T1", "average_T2", "lat_bnds", "lon_bnds"];

/// 4-D variables and the pressure-level suffixes PMP evaluates them on.
pub const LEVEL_VARIANTS: &[(&str, &[&str])] = &[
    ("ta", &["_850", "_200"]),
    ("ua", &["_850", "_200"]),
    ("va", &["_850", "_200"]),
    ("zg", &["_500"]),
];

// ---------------------------------------------------------------------------
// Lookups
// ---------------------------------------------------------------------------

/// Registry entries that have a GFDL counterpart.
pub fn mapped_variables() -> Vec<&'static VariableMapping> {
    VARIABLE_REGISTRY.iter().filter(|v| v.gfdl_name.is_some()).collect()
}

/// Looks up a registry entry by CMOR name. Returns `None` if not found.
pub fn find_variable(cmor_name: &str) -> Option<&'static VariableMapping> {
    VARIABLE_REGISTRY.iter().find(|v| v.cmor_name == cmor_name)
}

/// Returns the CMOR name for a GFDL variable name, if the registry maps it.
pub fn cmor_name_for(gfdl_name: &str) -> Option<&'static str> {
    VARIABLE_REGISTRY
        .iter()
        .find(|v| v.gfdl_name == Some(gfdl_name))
        .map(|v| v.cmor_name)
}

pub fn is_excluded(name: &str) -> bool {
    GFDL_EXCLUSIONS.contains(&name)
}

/// Builds the PMP `vars` list from the climatology variables: 4-D variables
/// are replaced by their pressure-level variants and the result is sorted.
///
/// `["pr", "ta"]` becomes `["pr", "ta_200", "ta_850"]`.
pub fn pmp_variable_list(climatology_vars: &[String]) -> Vec<String> {
    let mut vars: Vec<String> = Vec::new();
    for var in climatology_vars {
        match LEVEL_VARIANTS.iter().find(|(name, _)| *name == var.as_str()) {
            Some((name, levels)) => {
                vars.extend(levels.iter().map(|level| format!("{}{}", name, level)));
            }
            None => vars.push(var.clone()),
        }
    }
    vars.sort();
    vars
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_duplicate_cmor_names() {
        let mut seen = std::collections::HashSet::new();
        for var in VARIABLE_REGISTRY {
            assert!(
                seen.insert(var.cmor_name),
                "duplicate CMOR name '{}' found in VARIABLE_REGISTRY",
                var.cmor_name
            );
        }
    }

    #[test]
    fn test_unmapped_variables_are_skipped() {
        let names: Vec<_> = mapped_variables().iter().map(|v| v.cmor_name).collect();
        assert!(names.contains(&"pr"));
        assert!(!names.contains(&"hur"));
        assert!(!names.contains(&"rstcre"));
        assert_eq!(names.len(), 21);
    }

    #[test]
    fn test_level_variants_refer_to_registered_variables() {
        for (name, _) in LEVEL_VARIANTS {
            let var = find_variable(name).expect("4-D variable should be in registry");
            assert!(var.gfdl_name.is_some(), "'{}' should be mapped", name);
        }
    }

    #[test]
    fn test_pmp_variable_list_expands_levels_and_sorts() {
        let clims = vec!["zg".to_string(), "ta".to_string(), "pr".to_string(), "tas".to_string()];
        assert_eq!(
            pmp_variable_list(&clims),
            vec!["pr", "ta_200", "ta_850", "tas", "zg_500"]
        );
    }

    #[test]
    fn test_exclusions_cover_bounds_and_averaging_fields() {
        assert!(is_excluded("lat_bnds"));
        assert!(is_excluded("average_DT"));
        assert!(!is_excluded("pr"));
        assert_eq!(cmor_name_for("sfcWind"), Some("sfcWind"));
        assert_eq!(cmor_name_for("hur"), None);
    }
}
