//! Normalisation of metric matrices against the ensemble median.

/// Median of the non-NaN values, or NaN if there are none.
pub fn nan_median(values: &[f64]) -> f64 {
    let mut finite: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if finite.is_empty() {
        return f64::NAN;
    }
    finite.sort_by(|a, b| a.total_cmp(b));
    let mid = finite.len() / 2;
    if finite.len() % 2 == 0 {
        (finite[mid - 1] + finite[mid]) / 2.0
    } else {
        finite[mid]
    }
}

/// Normalises a row-major matrix (models × variables) column by column:
/// each cell becomes `(x - median) / median`, where the median is taken over
/// the column's non-NaN values. NaN cells stay NaN, as does every cell of a
/// column with no values.
///
/// A relative error of `0.2` means the model is 20 % worse than the typical
/// member of the ensemble for that variable.
pub fn normalize_by_median(matrix: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let ncols = matrix.first().map(Vec::len).unwrap_or(0);
    let medians: Vec<f64> = (0..ncols)
        .map(|col| {
            let column: Vec<f64> = matrix.iter().map(|row| row[col]).collect();
            nan_median(&column)
        })
        .collect();

    matrix
        .iter()
        .map(|row| {
            row.iter()
                .zip(&medians)
                .map(|(value, median)| (value - median) / median)
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nan_median_skips_missing_values() {
        assert_eq!(nan_median(&[3.0, f64::NAN, 1.0, 2.0]), 2.0);
        assert_eq!(nan_median(&[4.0, 1.0, 2.0, 3.0]), 2.5);
        assert!(nan_median(&[f64::NAN]).is_nan());
        assert!(nan_median(&[]).is_nan());
    }

    #[test]
    fn test_normalize_by_median_per_column() {
        let matrix = vec![vec![1.0, 10.0], vec![2.0, 20.0], vec![3.0, f64::NAN]];
        let normalized = normalize_by_median(&matrix);

        assert_eq!(normalized[0][0], -0.5);
        assert_eq!(normalized[1][0], 0.0);
        assert_eq!(normalized[2][0], 0.5);
        // Column two has median 15.
        assert!((normalized[0][1] - (-1.0 / 3.0)).abs() < 1e-12);
        assert!(normalized[2][1].is_nan());
    }

    #[test]
    fn test_normalize_empty_matrix() {
        assert!(normalize_by_median(&[]).is_empty());
    }
}
