//! GeoTIFF export of single CHUK variables, and reading such files back into a dataset.
//!
//! The raster is always written north-up on EPSG:27700. Variable and dataset attributes travel
//! in the `__variable__` and `__dataset__` metadata items as JSON.

use std::path::Path;

use gdal::raster::{Buffer, GdalDataType, GdalType};
use gdal::spatial_ref::SpatialRef;
use gdal::{Dataset as GdalDataset, DriverManager, Metadata};
use ndarray::{Array1, Array2, Axis};
use serde_json::Value;
use tracing::{debug, info};

use crate::dataset::{AttrValue, Attributes, DataType, Dataset, Variable};
use crate::error::{ChukError, Result};
use crate::grid::{self, GridGeometry, BRITISH_NATIONAL_GRID, EPSG_CODE, GRID_MAPPING_NAME};
use crate::metadata;

const VARIABLE_TAG: &str = "__variable__";
const DATASET_TAG: &str = "__dataset__";
const DEFAULT_BAND_NAME: &str = "band_1";

/// Writes the `(y, x)` variable `variable` of `ds` to a single-band GeoTIFF.
pub fn save_as_geotiff<P: AsRef<Path>>(ds: &Dataset, variable: &str, path: P) -> Result<()> {
    let path = path.as_ref();
    let var = ds.require(variable)?;
    let values = var.as_grid()?;
    let geometry =
        GridGeometry::from_coordinates(ds.require("x")?.as_vector()?, ds.require("y")?.as_vector()?)?;
    if values.dim() != geometry.shape() {
        return Err(ChukError::ShapeMismatch(format!(
            "{variable} has shape {:?}, x/y give {:?}",
            values.dim(),
            geometry.shape()
        )));
    }

    let mut rows = values.to_owned();
    if geometry.y_ascending() {
        rows.invert_axis(Axis(0));
    }
    if geometry.dx < 0.0 {
        rows.invert_axis(Axis(1));
    }
    let fill = var.attr("_FillValue").and_then(AttrValue::as_f64);
    let data: Vec<f64> = rows
        .iter()
        .map(|v| match fill {
            Some(fill) if v.is_nan() => fill,
            _ => *v,
        })
        .collect();

    // classic GeoTIFF has no signed byte type
    let mut raster = match var.dtype {
        DataType::U8 => write_raster::<u8>(path, &geometry, &data, |v| v as u8)?,
        DataType::I8 | DataType::I16 => write_raster::<i16>(path, &geometry, &data, |v| v as i16)?,
        DataType::I32 => write_raster::<i32>(path, &geometry, &data, |v| v as i32)?,
        DataType::F32 => write_raster::<f32>(path, &geometry, &data, |v| v as f32)?,
        DataType::F64 => write_raster::<f64>(path, &geometry, &data, |v| v)?,
    };

    if let Some(fill) = fill {
        raster.rasterband(1)?.set_no_data_value(Some(fill))?;
    }
    let json = metadata::to_json(ds, variable)?;
    raster.set_metadata_item(VARIABLE_TAG, &json[VARIABLE_TAG].to_string(), "")?;
    raster.set_metadata_item(DATASET_TAG, &json[DATASET_TAG].to_string(), "")?;

    info!("exported {variable} to {}", path.display());
    Ok(())
}

fn write_raster<T: GdalType + Copy>(
    path: &Path,
    geometry: &GridGeometry,
    data: &[f64],
    cast: fn(f64) -> T,
) -> Result<GdalDataset> {
    let (ny, nx) = geometry.shape();
    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let mut raster = driver.create_with_band_type::<T, _>(path, nx as isize, ny as isize, 1)?;
    raster.set_geo_transform(&geometry.north_up_geo_transform())?;
    raster.set_spatial_ref(&SpatialRef::from_epsg(EPSG_CODE)?)?;

    let buffer = Buffer {
        size: (nx, ny),
        data: data.iter().map(|v| cast(*v)).collect(),
    };
    raster.rasterband(1)?.write((0, 0), (nx, ny), &buffer)?;
    Ok(raster)
}

/// Reads a single-band GeoTIFF into a dataset with `x`, `y`, a grid mapping and one variable.
///
/// The variable takes its name and attributes from the `__variable__` tag when present and is
/// called `band_1` otherwise. No-data cells become NaN.
pub fn load_geotiff<P: AsRef<Path>>(path: P) -> Result<Dataset> {
    let path = path.as_ref();
    debug!("reading {}", path.display());
    let raster = GdalDataset::open(path)?;

    let gt = raster.geo_transform()?;
    if gt[2] != 0.0 || gt[4] != 0.0 {
        return Err(ChukError::InvalidGrid(format!(
            "{} has a rotated geotransform",
            path.display()
        )));
    }
    let (nx, ny) = raster.raster_size();

    let band = raster.rasterband(1)?;
    let buffer = band.read_band_as::<f64>()?;
    let mut data = Array2::from_shape_vec((ny, nx), buffer.data)?;
    let no_data = band.no_data_value();
    if let Some(no_data) = no_data {
        data.mapv_inplace(|v| if v == no_data { f64::NAN } else { v });
    }
    let dtype = match band.band_type() {
        GdalDataType::UInt8 => DataType::U8,
        GdalDataType::Int16 => DataType::I16,
        GdalDataType::Int32 => DataType::I32,
        GdalDataType::Float32 => DataType::F32,
        _ => DataType::F64,
    };

    let (name, mut var_attrs) = match raster.metadata_item(VARIABLE_TAG, "") {
        Some(text) => {
            let value: Value = serde_json::from_str(&text)?;
            let (name, attrs) = value
                .as_object()
                .and_then(|m| m.iter().next())
                .ok_or_else(|| {
                    ChukError::InvalidMetadata(format!("empty {VARIABLE_TAG} tag"))
                })?;
            (name.clone(), metadata::attrs_from_json(attrs)?)
        }
        None => (DEFAULT_BAND_NAME.to_string(), Attributes::new()),
    };
    if let Some(no_data) = no_data {
        var_attrs
            .entry("_FillValue".into())
            .or_insert(AttrValue::Float(no_data));
    }

    let global = match raster.metadata_item(DATASET_TAG, "") {
        Some(text) => metadata::attrs_from_json(&serde_json::from_str(&text)?)?,
        None => Attributes::new(),
    };

    let mut ds = Dataset::with_attrs(global);
    let x = Array1::from_iter((0..nx).map(|i| gt[0] + gt[1] * (i as f64 + 0.5)));
    let y = Array1::from_iter((0..ny).map(|j| gt[3] + gt[5] * (j as f64 + 0.5)));
    ds.insert("x", Variable::coordinate("x", x).with_attrs(grid::x_attrs()))?;
    ds.insert("y", Variable::coordinate("y", y).with_attrs(grid::y_attrs()))?;

    if let Ok(srs) = raster.spatial_ref() {
        let mapping_name = var_attrs
            .get("grid_mapping")
            .and_then(AttrValue::as_str)
            .unwrap_or(GRID_MAPPING_NAME)
            .to_string();
        let mut crs = match srs.auth_code() {
            Ok(code) if code as u32 == EPSG_CODE => {
                BRITISH_NATIONAL_GRID.grid_mapping_variable(EPSG_CODE)
            }
            Ok(code) => Variable::scalar(0.0).with_attrs(crate::dataset::attrs([(
                "epsg_code",
                format!("EPSG:{code}"),
            )])),
            Err(_) => Variable::scalar(0.0),
        };
        if let Ok(wkt) = srs.to_wkt() {
            crs.attrs.insert("crs_wkt".into(), AttrValue::Str(wkt));
        }
        ds.insert(mapping_name.as_str(), crs)?;
        var_attrs
            .entry("grid_mapping".into())
            .or_insert(AttrValue::Str(mapping_name));
    }

    let var = Variable::grid(data).with_attrs(var_attrs).with_dtype(dtype);
    ds.insert(name, var)?;
    Ok(ds)
}
