//! Annual-cycle climatologies from monthly model output.
//!
//! The pipeline is: assemble monthly fields from the selected post-processed
//! files (`DatasetBuilder`), subset to the analysis years, average each
//! calendar month across years, and stamp the result with the time axis of
//! the median year. File I/O lives in `netcdf_io` (cargo feature `netcdf`);
//! everything here is pure and works on in-memory fields.
//!
//! Submodules:
//! - `calendar`: CF time decoding for model calendars.
//! - `netcdf_io`: reading post-processed files and writing climatologies.

pub mod calendar;
#[cfg(feature = "netcdf")]
pub mod netcdf_io;

use std::collections::BTreeMap;

use crate::model::ClimatologyError;
use crate::variables;

pub use calendar::{CalendarDate, decode_times};

/// Name of the time coordinate in GFDL post-processed files.
pub const TIME_COORD: &str = "time";

/// Fill value written into climatology files.
pub const OUTPUT_FILL_VALUE: f64 = -999.0;

/// Time-dependent variables that describe the time axis rather than the
/// climate, and are never averaged.
const TIME_BOOKKEEPING: &[&str] = &["time_bnds", "time_bounds", "climatology_bounds"];

// ---------------------------------------------------------------------------
// Fields
// ---------------------------------------------------------------------------

/// A NetCDF attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Text(String),
    Number(f64),
    Numbers(Vec<f64>),
}

/// A named n-dimensional array, flattened in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub dims: Vec<String>,
    pub shape: Vec<usize>,
    pub data: Vec<f64>,
    pub attributes: Vec<(String, AttrValue)>,
}

impl Field {
    pub fn attribute(&self, name: &str) -> Option<&AttrValue> {
        self.attributes.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Number of values per time step (product of the non-time dimensions).
    pub fn step_len(&self) -> usize {
        self.shape.iter().skip(1).product()
    }
}

// ---------------------------------------------------------------------------
// Dataset assembly
// ---------------------------------------------------------------------------

/// Decoded monthly time axis.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeAxis {
    /// Raw offsets, in `units`.
    pub values: Vec<f64>,
    pub units: String,
    pub calendar: String,
    pub dates: Vec<CalendarDate>,
}

impl TimeAxis {
    pub fn decode(values: Vec<f64>, units: &str, calendar: &str) -> Result<Self, ClimatologyError> {
        let dates = decode_times(&values, units, calendar)?;
        Ok(TimeAxis {
            values,
            units: units.to_string(),
            calendar: calendar.to_string(),
            dates,
        })
    }

    /// Indices of the steps falling within `yr1-01-01 ..= yr2-12-31`.
    pub fn select_years(&self, yr1: Option<i32>, yr2: Option<i32>) -> Vec<usize> {
        self.dates
            .iter()
            .enumerate()
            .filter(|(_, d)| yr1.is_none_or(|y| d.year >= y) && yr2.is_none_or(|y| d.year <= y))
            .map(|(i, _)| i)
            .collect()
    }

    fn subset(&self, indices: &[usize]) -> TimeAxis {
        TimeAxis {
            values: indices.iter().map(|&i| self.values[i]).collect(),
            units: self.units.clone(),
            calendar: self.calendar.clone(),
            dates: indices.iter().map(|&i| self.dates[i]).collect(),
        }
    }
}

/// Monthly fields sharing one time axis, plus the time-independent fields
/// (coordinates, cell bounds) that came with them.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyDataset {
    pub time: TimeAxis,
    /// Time-dependent fields; `dims[0]` is the time dimension.
    pub series: BTreeMap<String, Field>,
    pub statics: BTreeMap<String, Field>,
}

struct SeriesChunks {
    dims: Vec<String>,
    step_shape: Vec<usize>,
    attributes: Vec<(String, AttrValue)>,
    /// (time offset, values of that step)
    steps: Vec<(f64, Vec<f64>)>,
}

/// Collects time chunks of variables read from several files into one
/// dataset, outer-joined on the time coordinate.
///
/// Steps a variable does not cover are NaN. Time-independent fields are
/// taken from the first file that has them.
#[derive(Default)]
pub struct DatasetBuilder {
    time_encoding: Option<(String, String)>,
    series: BTreeMap<String, SeriesChunks>,
    statics: BTreeMap<String, Field>,
}

impl DatasetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the time encoding of a file. Every file must agree.
    pub fn set_time_encoding(&mut self, units: &str, calendar: &str) -> Result<(), ClimatologyError> {
        match &self.time_encoding {
            None => {
                self.time_encoding = Some((units.to_string(), calendar.to_string()));
                Ok(())
            }
            Some((u, c)) if u == units && c == calendar => Ok(()),
            Some((u, c)) => Err(ClimatologyError::InconsistentTime(format!(
                "'{}' ({}) vs '{}' ({})",
                u, c, units, calendar
            ))),
        }
    }

    /// Adds one file's worth of a time-dependent variable. `field.dims[0]`
    /// is time and `time_values` holds its coordinate values.
    pub fn add_series(&mut self, field: Field, time_values: &[f64]) -> Result<(), ClimatologyError> {
        let step_len = field.step_len();
        if field.data.len() != step_len * time_values.len() {
            return Err(ClimatologyError::ShapeMismatch {
                name: field.name.clone(),
                expected: step_len * time_values.len(),
                found: field.data.len(),
            });
        }

        let entry = self.series.entry(field.name.clone()).or_insert_with(|| SeriesChunks {
            dims: field.dims.clone(),
            step_shape: field.shape[1..].to_vec(),
            attributes: field.attributes.clone(),
            steps: Vec::new(),
        });
        if entry.step_shape != field.shape[1..] {
            return Err(ClimatologyError::ShapeMismatch {
                name: field.name,
                expected: entry.step_shape.iter().product(),
                found: step_len,
            });
        }

        for (t, chunk) in time_values.iter().zip(field.data.chunks(step_len.max(1))) {
            entry.steps.push((*t, chunk.to_vec()));
        }
        Ok(())
    }

    /// Adds a time-independent field unless one of that name is already present.
    pub fn add_static(&mut self, field: Field) {
        self.statics.entry(field.name.clone()).or_insert(field);
    }

    pub fn finish(self) -> Result<MonthlyDataset, ClimatologyError> {
        let (units, calendar) = self.time_encoding.ok_or(ClimatologyError::NoInputFiles)?;

        let mut axis: Vec<f64> = self
            .series
            .values()
            .flat_map(|s| s.steps.iter().map(|(t, _)| *t))
            .collect();
        axis.sort_by(|a, b| a.total_cmp(b));
        axis.dedup();

        let mut series = BTreeMap::new();
        for (name, chunks) in self.series {
            let step_len: usize = chunks.step_shape.iter().product();
            let mut data = vec![f64::NAN; axis.len() * step_len];
            for (t, values) in chunks.steps {
                if let Ok(idx) = axis.binary_search_by(|probe| probe.total_cmp(&t)) {
                    data[idx * step_len..(idx + 1) * step_len].copy_from_slice(&values);
                }
            }
            let mut shape = vec![axis.len()];
            shape.extend(&chunks.step_shape);
            series.insert(
                name.clone(),
                Field {
                    name,
                    dims: chunks.dims,
                    shape,
                    data,
                    attributes: chunks.attributes,
                },
            );
        }

        Ok(MonthlyDataset {
            time: TimeAxis::decode(axis, &units, &calendar)?,
            series,
            statics: self.statics,
        })
    }
}

// ---------------------------------------------------------------------------
// Climatology
// ---------------------------------------------------------------------------

/// Annual-cycle climatologies for every evaluated variable of a dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct ClimatologySet {
    /// `YYYYMM-YYYYMM` of the first and last steps averaged.
    pub timerange: String,
    pub median_year: i32,
    /// The 12 steps of the median year, used as the climatology time axis.
    pub time: TimeAxis,
    /// One field per variable with a 12-step leading time dimension,
    /// named by CMOR name.
    pub fields: Vec<Field>,
    pub statics: BTreeMap<String, Field>,
}

impl ClimatologySet {
    /// Sorted CMOR names of the climatology variables.
    pub fn variable_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.fields.iter().map(|f| f.name.clone()).collect();
        names.sort();
        names
    }
}

/// Integer part of the median of the years of `dates`.
pub fn median_year(dates: &[CalendarDate]) -> Option<i32> {
    let mut years: Vec<i32> = dates.iter().map(|d| d.year).collect();
    if years.is_empty() {
        return None;
    }
    years.sort_unstable();
    let mid = years.len() / 2;
    let median = if years.len() % 2 == 0 {
        (f64::from(years[mid - 1]) + f64::from(years[mid])) / 2.0
    } else {
        f64::from(years[mid])
    };
    Some(median.trunc() as i32)
}

/// `YYYYMM-YYYYMM` spanning the first and last dates.
pub fn time_range(dates: &[CalendarDate]) -> Option<String> {
    let first = dates.first()?;
    let last = dates.last()?;
    Some(format!("{}-{}", first.year_month(), last.year_month()))
}

/// Averages each calendar month across years, per grid cell, skipping NaN.
///
/// `steps` holds one flattened field per entry of `dates`. Returns 12
/// flattened fields, January first; a month with no valid value in a cell
/// is NaN there.
pub fn annual_cycle(steps: &[&[f64]], dates: &[CalendarDate], step_len: usize) -> Vec<Vec<f64>> {
    let mut sums = vec![vec![0.0; step_len]; 12];
    let mut counts = vec![vec![0u32; step_len]; 12];

    for (step, date) in steps.iter().zip(dates) {
        let m = (date.month as usize).clamp(1, 12) - 1;
        for (cell, value) in step.iter().enumerate() {
            if !value.is_nan() {
                sums[m][cell] += value;
                counts[m][cell] += 1;
            }
        }
    }

    sums.into_iter()
        .zip(counts)
        .map(|(sum, count)| {
            sum.into_iter()
                .zip(count)
                .map(|(s, n)| if n == 0 { f64::NAN } else { s / f64::from(n) })
                .collect()
        })
        .collect()
}

/// Builds annual-cycle climatologies for every evaluated variable.
///
/// Variables are renamed to their CMOR names; GFDL bookkeeping fields and
/// time bounds are dropped. The median year of the selected period must
/// contain all 12 months, since its time stamps label the result.
pub fn build_climatologies(
    dataset: &MonthlyDataset,
    yr1: Option<i32>,
    yr2: Option<i32>,
) -> Result<ClimatologySet, ClimatologyError> {
    let selected = dataset.time.select_years(yr1, yr2);
    if selected.is_empty() {
        return Err(ClimatologyError::EmptySelection {
            yr1: yr1.unwrap_or_default(),
            yr2: yr2.unwrap_or_default(),
        });
    }
    let time = dataset.time.subset(&selected);

    let median = median_year(&time.dates).ok_or(ClimatologyError::EmptySelection {
        yr1: yr1.unwrap_or_default(),
        yr2: yr2.unwrap_or_default(),
    })?;
    let median_steps: Vec<usize> = (0..time.dates.len())
        .filter(|&i| time.dates[i].year == median)
        .collect();
    if median_steps.len() != 12 {
        return Err(ClimatologyError::IncompleteMedianYear {
            year: median,
            steps: median_steps.len(),
        });
    }
    let timerange = time_range(&time.dates).unwrap_or_default();

    let mut fields = Vec::new();
    for field in dataset.series.values() {
        if variables::is_excluded(&field.name) || TIME_BOOKKEEPING.contains(&field.name.as_str()) {
            continue;
        }
        let step_len = field.step_len();
        let steps: Vec<&[f64]> = selected
            .iter()
            .map(|&i| &field.data[i * step_len..(i + 1) * step_len])
            .collect();
        let cycle = annual_cycle(&steps, &time.dates, step_len);

        let mut shape = field.shape.clone();
        shape[0] = 12;
        fields.push(Field {
            name: variables::cmor_name_for(&field.name)
                .map(String::from)
                .unwrap_or_else(|| field.name.clone()),
            dims: field.dims.clone(),
            shape,
            data: cycle.into_iter().flatten().collect(),
            attributes: field.attributes.clone(),
        });
    }

    Ok(ClimatologySet {
        timerange,
        median_year: median,
        time: time.subset(&median_steps),
        fields,
        statics: dataset.statics.clone(),
    })
}

// ---------------------------------------------------------------------------
// Output naming
// ---------------------------------------------------------------------------

/// File name of one variable's climatology, following the PMP
/// `filename_template` written into the parameter file.
pub fn climatology_filename(descriptor: &str, variable: &str, timerange: &str, datestamp: &str) -> String {
    format!(
        "gfdl.experiment.{}.r1i1p1.mon.{}.{}.AC.v{}.nc",
        descriptor, variable, timerange, datestamp
    )
}

/// Today's date as the `vYYYYMMDD` version stamp (without the `v`).
pub fn datestamp_today() -> String {
    chrono::Local::now().format("%Y%m%d").to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// Monthly noleap axis, mid-month stamps, starting January of `first_year`.
    fn monthly_offsets(first_year: i32, years: i32) -> Vec<f64> {
        const MID: [f64; 12] = [15.5, 45.0, 74.5, 105.0, 135.5, 166.0, 196.5, 227.5, 258.0, 288.5, 319.0, 349.5];
        (0..years)
            .flat_map(|y| MID.iter().map(move |m| f64::from(first_year - 1 + y) * 365.0 + m))
            .collect()
    }

    fn series(name: &str, ncells: usize, nsteps: usize, value: impl Fn(usize, usize) -> f64) -> Field {
        Field {
            name: name.to_string(),
            dims: vec!["time".into(), "lat".into(), "lon".into()],
            shape: vec![nsteps, 1, ncells],
            data: (0..nsteps).flat_map(|t| (0..ncells).map(move |c| (t, c))).map(|(t, c)| value(t, c)).collect(),
            attributes: vec![("units".into(), AttrValue::Text("kg m-2 s-1".into()))],
        }
    }

    fn dataset(years: i32) -> MonthlyDataset {
        let offsets = monthly_offsets(1980, years);
        let mut builder = DatasetBuilder::new();
        builder.set_time_encoding("days since 0001-01-01 00:00:00", "noleap").unwrap();
        let n = offsets.len();
        // Value = month index (0..11) + 100 * year index, cell 1 = double.
        builder
            .add_series(
                series("pr", 2, n, |t, c| ((t % 12) as f64 + 100.0 * (t / 12) as f64) * (c + 1) as f64),
                &offsets,
            )
            .unwrap();
        builder
            .add_series(series("average_DT", 2, n, |_, _| 31.0), &offsets)
            .unwrap();
        builder.finish().unwrap()
    }

    #[test]
    fn test_median_year_truncates() {
        let dates: Vec<_> = [1980, 1981, 1982, 1983].iter().map(|&y| CalendarDate::new(y, 1, 16)).collect();
        assert_eq!(median_year(&dates), Some(1981));
        assert_eq!(median_year(&[]), None);
    }

    #[test]
    fn test_annual_cycle_skips_nan() {
        let jan1 = [1.0, f64::NAN];
        let jan2 = [3.0, f64::NAN];
        let dates = [CalendarDate::new(1980, 1, 16), CalendarDate::new(1981, 1, 16)];
        let cycle = annual_cycle(&[&jan1, &jan2], &dates, 2);

        assert_eq!(cycle.len(), 12);
        assert_eq!(cycle[0][0], 2.0);
        assert!(cycle[0][1].is_nan());
        assert!(cycle[5][0].is_nan());
    }

    #[test]
    fn test_builder_outer_joins_time_chunks() {
        let mut builder = DatasetBuilder::new();
        builder.set_time_encoding("days since 2000-01-01", "noleap").unwrap();
        builder.add_series(series("pr", 1, 2, |t, _| t as f64), &[0.0, 31.0]).unwrap();
        builder.add_series(series("tas", 1, 1, |_, _| 7.0), &[31.0]).unwrap();

        let ds = builder.finish().unwrap();
        assert_eq!(ds.time.values, vec![0.0, 31.0]);
        assert!(ds.series["tas"].data[0].is_nan());
        assert_eq!(ds.series["tas"].data[1], 7.0);
    }

    #[test]
    fn test_builder_rejects_mixed_time_encodings() {
        let mut builder = DatasetBuilder::new();
        builder.set_time_encoding("days since 2000-01-01", "noleap").unwrap();
        assert!(builder.set_time_encoding("days since 1850-01-01", "noleap").is_err());
    }

    #[test]
    fn test_build_climatologies_over_three_years() {
        let ds = dataset(3);
        let clim = build_climatologies(&ds, Some(1980), Some(1982)).unwrap();

        assert_eq!(clim.timerange, "198001-198212");
        assert_eq!(clim.median_year, 1981);
        assert_eq!(clim.time.dates.len(), 12);
        assert!(clim.time.dates.iter().all(|d| d.year == 1981));

        // average_DT is GFDL bookkeeping and is dropped.
        assert_eq!(clim.variable_names(), vec!["pr"]);
        let pr = &clim.fields[0];
        assert_eq!(pr.shape, vec![12, 1, 2]);
        // January: mean of 0, 100, 200 = 100; cell 1 doubles it.
        assert_eq!(pr.data[0], 100.0);
        assert_eq!(pr.data[1], 200.0);
        // December: 11 + 100.
        assert_eq!(pr.data[22], 111.0);
    }

    #[test]
    fn test_build_climatologies_subsets_years() {
        let ds = dataset(3);
        let clim = build_climatologies(&ds, Some(1981), Some(1981)).unwrap();
        assert_eq!(clim.timerange, "198101-198112");
        assert_eq!(clim.fields[0].data[0], 100.0);

        let err = build_climatologies(&ds, Some(1990), Some(1995)).unwrap_err();
        assert!(matches!(err, ClimatologyError::EmptySelection { .. }));
    }

    #[test]
    fn test_variables_with_different_coverage_share_one_time_range() {
        let long = monthly_offsets(1980, 3);
        let short = &long[..24];
        let mut builder = DatasetBuilder::new();
        builder.set_time_encoding("days since 0001-01-01 00:00:00", "noleap").unwrap();
        builder.add_series(series("pr", 1, 24, |t, _| (t / 12) as f64), short).unwrap();
        builder.add_series(series("ts", 1, 36, |t, _| (t / 12) as f64), &long).unwrap();
        let ds = builder.finish().unwrap();

        let clim = build_climatologies(&ds, Some(1980), Some(1982)).unwrap();
        assert_eq!(clim.timerange, "198001-198212");
        assert_eq!(clim.median_year, 1981);
        assert_eq!(clim.fields.len(), 2);
        assert!(clim.fields.iter().all(|f| f.shape[0] == 12));
        // Months pr lacks in 1982 are skipped: mean of 0 and 1.
        assert_eq!(clim.fields[0].data[0], 0.5);
        assert_eq!(clim.fields[1].data[0], 1.0);
    }

    #[test]
    fn test_incomplete_median_year_is_an_error() {
        let offsets = &monthly_offsets(1980, 1)[..6];
        let mut builder = DatasetBuilder::new();
        builder.set_time_encoding("days since 0001-01-01", "noleap").unwrap();
        builder.add_series(series("pr", 1, 6, |_, _| 1.0), offsets).unwrap();
        let ds = builder.finish().unwrap();

        let err = build_climatologies(&ds, None, None).unwrap_err();
        assert!(matches!(err, ClimatologyError::IncompleteMedianYear { year: 1980, steps: 6 }));
    }

    #[test]
    fn test_climatology_filename() {
        assert_eq!(
            climatology_filename("c96L65_am5f7c1r0_amip", "pr", "198001-201412", "20241001"),
            "gfdl.experiment.c96L65_am5f7c1r0_amip.r1i1p1.mon.pr.198001-201412.AC.v20241001.nc"
        );
    }
}
