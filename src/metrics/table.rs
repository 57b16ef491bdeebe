//! Tabular metric values: model runs by variables.

use std::collections::HashMap;

/// One model run's values, aligned with the owning table's columns.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsRow {
    pub model: String,
    pub run: String,
    pub values: Vec<f64>,
}

impl MetricsRow {
    /// `"<model>_<run>"`, the label PMP uses to tell runs of a model apart.
    pub fn model_run(&self) -> String {
        format!("{}_{}", self.model, self.run)
    }
}

/// A table of metric values for one statistic, season and region.
///
/// Rows are model runs, columns are variables. A missing value is stored
/// as `f64::NAN` so every downstream numeric operation sees the same
/// sentinel.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MetricsTable {
    columns: Vec<String>,
    rows: Vec<MetricsRow>,
}

impl MetricsTable {
    /// An empty table with no columns and no rows.
    pub const fn new() -> Self {
        MetricsTable {
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub fn with_columns(columns: Vec<String>) -> Self {
        MetricsTable {
            columns,
            rows: Vec::new(),
        }
    }

    /// Appends a row. `values` is indexed by column name; columns it does not
    /// mention are NaN and names that are not columns are ignored.
    pub fn push_row(&mut self, model: &str, run: &str, values: &HashMap<&str, f64>) {
        let values = self
            .columns
            .iter()
            .map(|col| values.get(col.as_str()).copied().unwrap_or(f64::NAN))
            .collect();
        self.rows.push(MetricsRow {
            model: model.to_string(),
            run: run.to_string(),
            values,
        });
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[MetricsRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Model names in row order.
    pub fn model_names(&self) -> Vec<String> {
        self.rows.iter().map(|r| r.model.clone()).collect()
    }

    /// Values of one column in row order; all NaN if the column is absent.
    pub fn column(&self, name: &str) -> Vec<f64> {
        match self.column_index(name) {
            Some(idx) => self.rows.iter().map(|r| r.values[idx]).collect(),
            None => vec![f64::NAN; self.rows.len()],
        }
    }

    /// Row-major matrix of the requested columns, in the requested order.
    /// Absent columns are filled with NaN.
    pub fn to_matrix(&self, columns: &[String]) -> Vec<Vec<f64>> {
        let indices: Vec<Option<usize>> = columns.iter().map(|c| self.column_index(c)).collect();
        self.rows
            .iter()
            .map(|row| {
                indices
                    .iter()
                    .map(|idx| idx.map(|i| row.values[i]).unwrap_or(f64::NAN))
                    .collect()
            })
            .collect()
    }

    /// Row-wise concatenation: `self`'s rows followed by `other`'s.
    ///
    /// The result's columns are `self`'s followed by any of `other`'s not
    /// already present. Cells a row did not have become NaN. Neither input
    /// is modified.
    pub fn concat(&self, other: &MetricsTable) -> MetricsTable {
        let mut columns = self.columns.clone();
        for col in &other.columns {
            if !columns.contains(col) {
                columns.push(col.clone());
            }
        }

        let mut rows = Vec::with_capacity(self.rows.len() + other.rows.len());
        for table in [self, other] {
            let mapping: Vec<Option<usize>> = columns.iter().map(|c| table.column_index(c)).collect();
            for row in &table.rows {
                rows.push(MetricsRow {
                    model: row.model.clone(),
                    run: row.run.clone(),
                    values: mapping
                        .iter()
                        .map(|idx| idx.map(|i| row.values[i]).unwrap_or(f64::NAN))
                        .collect(),
                });
            }
        }

        MetricsTable { columns, rows }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn table(columns: &[&str], rows: &[(&str, &[f64])]) -> MetricsTable {
        let mut t = MetricsTable::with_columns(columns.iter().map(|c| c.to_string()).collect());
        for (model, values) in rows {
            let map: HashMap<&str, f64> = columns.iter().copied().zip(values.iter().copied()).collect();
            t.push_row(model, "r1i1p1f1", &map);
        }
        t
    }

    #[test]
    fn test_push_row_fills_missing_columns_with_nan() {
        let mut t = MetricsTable::with_columns(vec!["pr".into(), "tas".into()]);
        let values: HashMap<&str, f64> = [("pr", 0.5), ("psl", 9.0)].into_iter().collect();
        t.push_row("M1", "r1", &values);

        assert_eq!(t.rows()[0].values[0], 0.5);
        assert!(t.rows()[0].values[1].is_nan());
        assert_eq!(t.rows()[0].model_run(), "M1_r1");
    }

    #[test]
    fn test_concat_keeps_left_rows_first() {
        let a = table(&["pr"], &[("M1", &[0.5])]);
        let b = table(&["pr"], &[("M2", &[0.7])]);

        let merged = a.concat(&b);
        assert_eq!(merged.model_names(), vec!["M1", "M2"]);
        assert_eq!(merged.column("pr"), vec![0.5, 0.7]);
    }

    #[test]
    fn test_concat_unions_columns_with_nan_fill() {
        let a = table(&["pr"], &[("M1", &[0.5])]);
        let b = table(&["tas", "pr"], &[("M2", &[1.5, 0.7])]);

        let merged = a.concat(&b);
        assert_eq!(merged.columns(), &["pr".to_string(), "tas".to_string()]);
        assert_eq!(merged.rows()[1].values, vec![0.7, 1.5]);
        assert!(merged.rows()[0].values[1].is_nan());
    }

    #[test]
    fn test_concat_with_empty_table_is_identity() {
        let a = table(&["pr", "tas"], &[("M1", &[0.5, 1.0]), ("M2", &[0.6, 1.1])]);
        assert_eq!(a.concat(&MetricsTable::new()), a);
        assert_eq!(MetricsTable::new().concat(&a), a);
    }

    #[test]
    fn test_to_matrix_orders_columns_and_fills_absent() {
        let t = table(&["pr", "tas"], &[("M1", &[0.5, 1.0])]);
        let m = t.to_matrix(&["tas".to_string(), "zg-500".to_string(), "pr".to_string()]);
        assert_eq!(m[0][0], 1.0);
        assert!(m[0][1].is_nan());
        assert_eq!(m[0][2], 0.5);
    }
}
