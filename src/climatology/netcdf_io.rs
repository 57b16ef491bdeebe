//! NetCDF reading of GFDL post-processed files and writing of
//! climatology files.
//!
//! Only built with the `netcdf` cargo feature, which links the system
//! netCDF library.

use std::collections::BTreeMap;
use std::path::Path;

use netcdf::AttributeValue;

use super::{
    AttrValue, ClimatologySet, DatasetBuilder, Field, MonthlyDataset, OUTPUT_FILL_VALUE, TIME_COORD,
};
use crate::ingest::pp_files::PpFile;
use crate::logging::{self, Stage};
use crate::model::ClimatologyError;

/// Bounds dimension name in GFDL files, and the name PMP expects.
const GFDL_BOUNDS_DIM: &str = "bnds";
const OUTPUT_BOUNDS_DIM: &str = "bound";

/// Cell-bound variables carried into every climatology file.
const CELL_BOUNDS: &[&str] = &["lat_bnds", "lon_bnds"];

/// Attributes that describe the input encoding and are not copied.
const ENCODING_ATTRS: &[&str] = &["_FillValue", "missing_value"];

fn nc_error(path: &Path) -> impl Fn(netcdf::Error) -> ClimatologyError + '_ {
    move |e| ClimatologyError::Netcdf {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// Reads the selected post-processed files into one monthly dataset.
pub fn read_pp_files(files: &[PpFile]) -> Result<MonthlyDataset, ClimatologyError> {
    if files.is_empty() {
        return Err(ClimatologyError::NoInputFiles);
    }

    let mut builder = DatasetBuilder::new();
    for pp in files {
        read_into(&pp.path, &mut builder)?;
        logging::debug(
            Stage::Climatology,
            Some(&pp.variable),
            &format!("Read {}", pp.path.display()),
        );
    }
    builder.finish()
}

fn read_into(path: &Path, builder: &mut DatasetBuilder) -> Result<(), ClimatologyError> {
    let err = nc_error(path);
    let file = netcdf::open(path).map_err(&err)?;

    let time = file
        .variable(TIME_COORD)
        .ok_or_else(|| ClimatologyError::MissingVariable(format!("{} in {}", TIME_COORD, path.display())))?;
    let time_values: Vec<f64> = time.get_values::<f64, _>(..).map_err(&err)?;
    let units = text_attribute(&time, "units")
        .ok_or_else(|| ClimatologyError::UnsupportedUnits(format!("no time units in {}", path.display())))?;
    let calendar = text_attribute(&time, "calendar").unwrap_or_else(|| "standard".to_string());
    builder.set_time_encoding(&units, &calendar)?;

    for var in file.variables() {
        let name = var.name();
        if name == TIME_COORD {
            continue;
        }
        let dims: Vec<String> = var.dimensions().iter().map(|d| d.name()).collect();
        let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();

        let data = match var.get_values::<f64, _>(..) {
            Ok(values) => values,
            Err(e) => {
                logging::debug(Stage::Climatology, Some(&name), &format!("Skipping non-numeric variable: {}", e));
                continue;
            }
        };

        let attributes: Vec<(String, AttrValue)> = var
            .attributes()
            .filter_map(|attr| Some((attr.name().to_string(), convert_attribute(attr.value().ok()?)?)))
            .collect();

        let mut field = Field {
            name,
            dims,
            shape,
            data,
            attributes,
        };
        mask_fill_values(&mut field);

        if field.dims.first().map(String::as_str) == Some(TIME_COORD) {
            builder.add_series(field, &time_values)?;
        } else {
            builder.add_static(field);
        }
    }
    Ok(())
}

fn text_attribute(var: &netcdf::Variable<'_>, name: &str) -> Option<String> {
    match var.attribute(name)?.value().ok()? {
        AttributeValue::Str(s) => Some(s),
        _ => None,
    }
}

fn convert_attribute(value: AttributeValue) -> Option<AttrValue> {
    Some(match value {
        AttributeValue::Str(s) => AttrValue::Text(s),
        AttributeValue::Strs(s) => AttrValue::Text(s.join(" ")),
        AttributeValue::Double(v) => AttrValue::Number(v),
        AttributeValue::Float(v) => AttrValue::Number(f64::from(v)),
        AttributeValue::Int(v) => AttrValue::Number(f64::from(v)),
        AttributeValue::Short(v) => AttrValue::Number(f64::from(v)),
        AttributeValue::Schar(v) => AttrValue::Number(f64::from(v)),
        AttributeValue::Doubles(v) => AttrValue::Numbers(v),
        AttributeValue::Floats(v) => AttrValue::Numbers(v.into_iter().map(f64::from).collect()),
        AttributeValue::Ints(v) => AttrValue::Numbers(v.into_iter().map(f64::from).collect()),
        AttributeValue::Shorts(v) => AttrValue::Numbers(v.into_iter().map(f64::from).collect()),
        _ => return None,
    })
}

/// Replaces `_FillValue` and `missing_value` entries with NaN.
fn mask_fill_values(field: &mut Field) {
    let fills: Vec<f64> = ENCODING_ATTRS
        .iter()
        .filter_map(|name| match field.attribute(name)? {
            AttrValue::Number(v) => Some(vec![*v]),
            AttrValue::Numbers(v) => Some(v.clone()),
            AttrValue::Text(_) => None,
        })
        .flatten()
        .collect();
    if fills.is_empty() {
        return;
    }
    for value in &mut field.data {
        if fills.iter().any(|f| f == value) {
            *value = f64::NAN;
        }
    }
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

fn output_dim(name: &str) -> &str {
    if name == GFDL_BOUNDS_DIM { OUTPUT_BOUNDS_DIM } else { name }
}

fn to_netcdf_value(value: &AttrValue) -> AttributeValue {
    match value {
        AttrValue::Text(s) => AttributeValue::Str(s.clone()),
        AttrValue::Number(v) => AttributeValue::Double(*v),
        AttrValue::Numbers(v) => AttributeValue::Doubles(v.clone()),
    }
}

/// CF attributes PMP requires on the horizontal coordinates.
fn coordinate_attributes(name: &str) -> Vec<(&'static str, AttrValue)> {
    let text = |s: &str| AttrValue::Text(s.to_string());
    match name {
        "lat" => vec![
            ("units", text("degrees_north")),
            ("standard_name", text("latitude")),
            ("long_name", text("latitude")),
            ("axis", text("Y")),
            ("realtopology", text("linear")),
        ],
        "lon" => vec![
            ("units", text("degrees_east")),
            ("standard_name", text("longitude")),
            ("long_name", text("longitude")),
            ("axis", text("X")),
            ("realtopology", text("circular")),
            ("modulo", AttrValue::Number(360.0)),
        ],
        _ => Vec::new(),
    }
}

/// Writes one variable's climatology to `path`, together with its
/// coordinates, cell bounds and the median-year time axis.
pub fn write_climatology(path: &Path, set: &ClimatologySet, field: &Field) -> Result<(), ClimatologyError> {
    let err = nc_error(path);
    let mut file = netcdf::create(path).map_err(&err)?;

    // Coordinates for every non-time dimension, then cell bounds.
    let mut companions: Vec<&Field> = field
        .dims
        .iter()
        .filter_map(|d| set.statics.get(d))
        .collect();
    companions.extend(CELL_BOUNDS.iter().filter_map(|b| set.statics.get(*b)));

    let mut dims: BTreeMap<String, usize> = BTreeMap::new();
    dims.insert(TIME_COORD.to_string(), set.time.values.len());
    for f in companions.iter().copied().chain(std::iter::once(field)) {
        for (dim, len) in f.dims.iter().zip(&f.shape) {
            dims.entry(output_dim(dim).to_string()).or_insert(*len);
        }
    }
    for (name, len) in &dims {
        file.add_dimension(name, *len).map_err(&err)?;
    }

    {
        let mut time = file.add_variable::<f64>(TIME_COORD, &[TIME_COORD]).map_err(&err)?;
        time.put_attribute("units", set.time.units.as_str()).map_err(&err)?;
        time.put_attribute("calendar", set.time.calendar.as_str()).map_err(&err)?;
        time.put_attribute("axis", "T").map_err(&err)?;
        time.put_values(&set.time.values, ..).map_err(&err)?;
    }

    for companion in companions {
        let dim_names: Vec<&str> = companion.dims.iter().map(|d| output_dim(d)).collect();
        let mut var = file.add_variable::<f64>(&companion.name, &dim_names).map_err(&err)?;
        for (name, value) in &companion.attributes {
            if name != "bounds" && !ENCODING_ATTRS.contains(&name.as_str()) {
                var.put_attribute(name, to_netcdf_value(value)).map_err(&err)?;
            }
        }
        let bounds = format!("{}_bnds", companion.name);
        if set.statics.contains_key(&bounds) {
            var.put_attribute("bounds", bounds.as_str()).map_err(&err)?;
        }
        for (name, value) in coordinate_attributes(&companion.name) {
            var.put_attribute(name, to_netcdf_value(&value)).map_err(&err)?;
        }
        var.put_values(&companion.data, ..).map_err(&err)?;
    }

    let dim_names: Vec<&str> = field.dims.iter().map(|d| output_dim(d)).collect();
    let mut var = file.add_variable::<f64>(&field.name, &dim_names).map_err(&err)?;
    var.set_fill_value(OUTPUT_FILL_VALUE).map_err(&err)?;
    for (name, value) in &field.attributes {
        if !ENCODING_ATTRS.contains(&name.as_str()) {
            var.put_attribute(name, to_netcdf_value(value)).map_err(&err)?;
        }
    }
    let data: Vec<f64> = field
        .data
        .iter()
        .map(|v| if v.is_nan() { OUTPUT_FILL_VALUE } else { *v })
        .collect();
    var.put_values(&data, ..).map_err(&err)?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
