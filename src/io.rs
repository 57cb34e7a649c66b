//! Reading and writing CHUK datasets as NetCDF4 files, and loading with validation.

use std::path::Path;

use ndarray::{ArrayD, IxDyn};
use netcdf::types::{FloatType, IntType, NcVariableType};
use netcdf::AttributeValue;
use tracing::{debug, info, warn};

use crate::builder;
use crate::check::{check_with_options, CheckOptions, CheckReport};
use crate::dataset::{AttrValue, Attributes, DataType, Dataset, Variable};
use crate::error::{ChukError, Result};
use crate::export;
use crate::grid::ChukGrid;

pub const NETCDF_SUFFIXES: [&str; 1] = [".nc"];
pub const GEOTIFF_SUFFIXES: [&str; 4] = [".tif", ".tiff", ".geotif", ".geotiff"];

/// File formats that datasets can be loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    NetCdf,
    GeoTiff,
}

impl FileFormat {
    /// Picks the format from the (case-insensitive) file suffix.
    pub fn from_path(path: &Path) -> Result<Self> {
        let suffix = path
            .extension()
            .and_then(std::ffi::OsStr::to_str)
            .map(|s| format!(".{}", s.to_ascii_lowercase()))
            .unwrap_or_default();
        if NETCDF_SUFFIXES.contains(&suffix.as_str()) {
            Ok(FileFormat::NetCdf)
        } else if GEOTIFF_SUFFIXES.contains(&suffix.as_str()) {
            Ok(FileFormat::GeoTiff)
        } else {
            Err(ChukError::UnsupportedFormat {
                path: path.display().to_string(),
                supported: NETCDF_SUFFIXES
                    .iter()
                    .chain(GEOTIFF_SUFFIXES.iter())
                    .copied()
                    .collect::<Vec<_>>()
                    .join(","),
            })
        }
    }
}

/// What [`load`] does besides reading.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// keep or attach the 2-D `lat`/`lon` arrays; they are dropped otherwise
    pub add_latlon: bool,
    /// keep or attach `lat_bnds`/`lon_bnds`; they are dropped otherwise
    pub add_latlon_bnds: bool,
    pub check: CheckOptions,
}

/// Loads a CHUK dataset from NetCDF4 or GeoTIFF and checks it against the grid.
///
/// Fails with [`ChukError::CheckFailed`] when the check reports errors; otherwise returns the
/// dataset together with the report, whose warnings the caller may inspect.
pub fn load<P: AsRef<Path>>(
    path: P,
    grid: &ChukGrid,
    options: &LoadOptions,
) -> Result<(Dataset, CheckReport)> {
    let path = path.as_ref();
    let mut ds = read(path)?;

    let report = check_with_options(&ds, grid, &options.check).into_result()?;
    if !report.warnings.is_empty() {
        warn!(
            "{} has {} metadata warning(s)",
            path.display(),
            report.warnings.len()
        );
    }

    adjust_latlon(&mut ds, grid, options)?;
    info!("loaded {}", path.display());
    Ok((ds, report))
}

/// Reads a NetCDF4 or GeoTIFF file without checking it.
pub fn read<P: AsRef<Path>>(path: P) -> Result<Dataset> {
    let path = path.as_ref();
    match FileFormat::from_path(path)? {
        FileFormat::NetCdf => read_netcdf(path),
        FileFormat::GeoTiff => export::load_geotiff(path),
    }
}

/// Drops or attaches `lat`/`lon` and their bounds according to `options`.
pub fn adjust_latlon(ds: &mut Dataset, grid: &ChukGrid, options: &LoadOptions) -> Result<()> {
    if options.add_latlon {
        if !ds.contains("lat") || !ds.contains("lon") {
            builder::add_latlon(ds, grid)?;
        }
    } else {
        remove_variables(ds, &["lat", "lon"]);
    }

    if options.add_latlon_bnds {
        if !ds.contains("lat_bnds") || !ds.contains("lon_bnds") {
            builder::add_latlon_bnds(ds, grid)?;
        }
    } else {
        remove_variables(ds, &["lat_bnds", "lon_bnds"]);
    }
    Ok(())
}

// also prunes the removed names from `coordinates` attributes
fn remove_variables(ds: &mut Dataset, names: &[&str]) {
    if !names.iter().any(|n| ds.contains(n)) {
        return;
    }
    for name in names {
        ds.remove(name);
    }
    let with_coordinates: Vec<String> = ds
        .variables()
        .filter(|(_, v)| v.attrs.contains_key("coordinates"))
        .map(|(n, _)| n.clone())
        .collect();
    for var_name in with_coordinates {
        let Some(var) = ds.variable_mut(&var_name) else { continue };
        let kept: Vec<String> = var
            .attr_str("coordinates")
            .unwrap_or_default()
            .split_whitespace()
            .filter(|c| !names.contains(c))
            .map(str::to_string)
            .collect();
        if kept.is_empty() {
            var.attrs.remove("coordinates");
        } else {
            var.attrs
                .insert("coordinates".into(), AttrValue::Str(kept.join(" ")));
        }
    }
}

/// Reads every numeric variable of a NetCDF file. Values equal to a variable's `_FillValue`
/// become NaN, and the storage type follows the type of the variable in the file.
pub fn read_netcdf<P: AsRef<Path>>(path: P) -> Result<Dataset> {
    read_netcdf_where(path.as_ref(), |_| true)
}

/// Reads the global attributes and the numeric variables whose names pass `keep`.
pub fn read_netcdf_where(path: &Path, keep: impl Fn(&str) -> bool) -> Result<Dataset> {
    debug!("reading {}", path.display());
    let file = netcdf::open(path)?;

    let mut ds = Dataset::new();
    for attr in file.attributes() {
        if let Some(value) = attr_from_nc(attr.value()?) {
            ds.attrs.insert(attr.name().to_string(), value);
        }
    }

    for var in file.variables() {
        let name = var.name();
        if !keep(&name) {
            debug!("not reading {name}");
            continue;
        }
        if let Some(variable) = variable_from_nc(&var)? {
            ds.insert(name, variable)?;
        }
    }
    Ok(ds)
}

/// Reads a single variable, `None` when the file has no numeric variable of that name.
pub fn read_netcdf_variable(path: &Path, name: &str) -> Result<Option<Variable>> {
    debug!("reading {name} from {}", path.display());
    let file = netcdf::open(path)?;
    match file.variable(name) {
        Some(var) => variable_from_nc(&var),
        None => Ok(None),
    }
}

fn variable_from_nc(var: &netcdf::Variable<'_>) -> Result<Option<Variable>> {
    let name = var.name();
    let dims: Vec<String> = var.dimensions().iter().map(|d| d.name()).collect();
    let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();

    let values: Vec<f64> = match var.get_values::<f64, _>(..) {
        Ok(values) => values,
        Err(e) => {
            warn!("skipping non-numeric variable {name}: {e}");
            return Ok(None);
        }
    };

    let mut attrs = Attributes::new();
    let mut fill = None;
    for attr in var.attributes() {
        let raw = attr.value()?;
        if attr.name() == "_FillValue" {
            fill = fill_from_nc(&raw);
        }
        if let Some(value) = attr_from_nc(raw) {
            attrs.insert(attr.name().to_string(), value);
        }
    }

    let mut data = ArrayD::from_shape_vec(IxDyn(&shape), values)?;
    if let Some(fill_value) = fill {
        data.mapv_inplace(|v| if v == fill_value { f64::NAN } else { v });
    }

    Ok(Some(Variable {
        dims,
        data,
        attrs,
        dtype: dtype_from_nc(&var.vartype()),
    }))
}

/// Storage type for a NetCDF variable type. `u16` widens to `i32`; wider integers have no
/// lossless integer type here and are kept as `f64`.
fn dtype_from_nc(vartype: &NcVariableType) -> DataType {
    match vartype {
        NcVariableType::Int(IntType::I8) => DataType::I8,
        NcVariableType::Int(IntType::U8) => DataType::U8,
        NcVariableType::Int(IntType::I16) => DataType::I16,
        NcVariableType::Int(IntType::U16 | IntType::I32) => DataType::I32,
        NcVariableType::Float(FloatType::F32) => DataType::F32,
        _ => DataType::F64,
    }
}

/// Writes a dataset to a NetCDF4 file, replacing any existing file.
pub fn save<P: AsRef<Path>>(ds: &Dataset, path: P) -> Result<()> {
    let path = path.as_ref();
    let mut file = netcdf::create(path)?;

    for (name, len) in ds.dimensions() {
        file.add_dimension(&name, len)?;
    }
    for (name, var) in ds.variables() {
        match var.dtype {
            DataType::I8 => put_variable::<i8>(&mut file, name, var, |v| v as i8)?,
            DataType::U8 => put_variable::<u8>(&mut file, name, var, |v| v as u8)?,
            DataType::I16 => put_variable::<i16>(&mut file, name, var, |v| v as i16)?,
            DataType::I32 => put_variable::<i32>(&mut file, name, var, |v| v as i32)?,
            DataType::F32 => put_variable::<f32>(&mut file, name, var, |v| v as f32)?,
            DataType::F64 => put_variable::<f64>(&mut file, name, var, |v| v)?,
        }
    }
    for (name, value) in &ds.attrs {
        file.add_attribute(name, attr_to_nc(value))?;
    }
    info!("saved {}", path.display());
    Ok(())
}

fn put_variable<T>(
    file: &mut netcdf::FileMut,
    name: &str,
    var: &Variable,
    cast: fn(f64) -> T,
) -> Result<()>
where
    T: netcdf::NcTypeDescriptor + Copy,
{
    let dims: Vec<&str> = var.dims.iter().map(String::as_str).collect();
    let fill = var.attr("_FillValue").and_then(AttrValue::as_f64);

    let mut nc_var = file.add_variable::<T>(name, &dims)?;
    // attributes first, the fill value cannot be set once data is written
    for (key, value) in &var.attrs {
        let value = match fill {
            Some(fill) if key == "_FillValue" => fill_to_nc(fill, var.dtype),
            _ => attr_to_nc(value),
        };
        nc_var.put_attribute(key, value)?;
    }

    let values: Vec<T> = var
        .data
        .iter()
        .map(|v| match fill {
            Some(fill) if v.is_nan() => cast(fill),
            _ => cast(*v),
        })
        .collect();
    nc_var.put_values(&values, ..)?;
    Ok(())
}

fn fill_from_nc(value: &AttributeValue) -> Option<f64> {
    match value {
        AttributeValue::Schar(v) => Some(f64::from(*v)),
        AttributeValue::Uchar(v) => Some(f64::from(*v)),
        AttributeValue::Short(v) => Some(f64::from(*v)),
        AttributeValue::Ushort(v) => Some(f64::from(*v)),
        AttributeValue::Int(v) => Some(f64::from(*v)),
        AttributeValue::Uint(v) => Some(f64::from(*v)),
        AttributeValue::Float(v) => Some(f64::from(*v)),
        AttributeValue::Double(v) => Some(*v),
        _ => None,
    }
}

fn fill_to_nc(fill: f64, dtype: DataType) -> AttributeValue {
    match dtype {
        DataType::I8 => AttributeValue::Schar(fill as i8),
        DataType::U8 => AttributeValue::Uchar(fill as u8),
        DataType::I16 => AttributeValue::Short(fill as i16),
        DataType::I32 => AttributeValue::Int(fill as i32),
        DataType::F32 => AttributeValue::Float(fill as f32),
        DataType::F64 => AttributeValue::Double(fill),
    }
}

#[allow(unreachable_patterns)]
fn attr_from_nc(value: AttributeValue) -> Option<AttrValue> {
    let ints = |v: Vec<i64>| Some(AttrValue::Ints(v));
    match value {
        AttributeValue::Str(s) => Some(AttrValue::Str(s)),
        AttributeValue::Strs(v) => Some(AttrValue::Strs(v)),
        AttributeValue::Uchar(v) => Some(AttrValue::Int(v as i64)),
        AttributeValue::Schar(v) => Some(AttrValue::Int(v as i64)),
        AttributeValue::Ushort(v) => Some(AttrValue::Int(v as i64)),
        AttributeValue::Short(v) => Some(AttrValue::Int(v as i64)),
        AttributeValue::Uint(v) => Some(AttrValue::Int(v as i64)),
        AttributeValue::Int(v) => Some(AttrValue::Int(v as i64)),
        AttributeValue::Ulonglong(v) => Some(AttrValue::Int(v as i64)),
        AttributeValue::Longlong(v) => Some(AttrValue::Int(v)),
        AttributeValue::Float(v) => Some(AttrValue::Float(v as f64)),
        AttributeValue::Double(v) => Some(AttrValue::Float(v)),
        AttributeValue::Uchars(v) => ints(v.into_iter().map(i64::from).collect()),
        AttributeValue::Schars(v) => ints(v.into_iter().map(i64::from).collect()),
        AttributeValue::Ushorts(v) => ints(v.into_iter().map(i64::from).collect()),
        AttributeValue::Shorts(v) => ints(v.into_iter().map(i64::from).collect()),
        AttributeValue::Uints(v) => ints(v.into_iter().map(i64::from).collect()),
        AttributeValue::Ints(v) => ints(v.into_iter().map(i64::from).collect()),
        AttributeValue::Ulonglongs(v) => ints(v.into_iter().map(|i| i as i64).collect()),
        AttributeValue::Longlongs(v) => ints(v),
        AttributeValue::Floats(v) => Some(AttrValue::Floats(v.into_iter().map(f64::from).collect())),
        AttributeValue::Doubles(v) => Some(AttrValue::Floats(v)),
        _ => None,
    }
}

fn attr_to_nc(value: &AttrValue) -> AttributeValue {
    match value {
        AttrValue::Str(s) => AttributeValue::Str(s.clone()),
        AttrValue::Strs(v) => AttributeValue::Strs(v.clone()),
        AttrValue::Int(i) => match i32::try_from(*i) {
            Ok(i) => AttributeValue::Int(i),
            Err(_) => AttributeValue::Longlong(*i),
        },
        AttrValue::Ints(v) => match v.iter().map(|i| i32::try_from(*i)).collect() {
            Ok(narrow) => AttributeValue::Ints(narrow),
            Err(_) => AttributeValue::Longlongs(v.clone()),
        },
        AttrValue::Float(f) => AttributeValue::Double(*f),
        AttrValue::Floats(v) => AttributeValue::Doubles(v.clone()),
    }
}
