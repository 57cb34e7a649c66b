//! Construction of new CHUK datasets on the reference grid.

use chrono::{SecondsFormat, Utc};
use ndarray::Array2;
use tracing::debug;
use uuid::Uuid;

use crate::dataset::{AttrValue, Attributes, Dataset, Variable};
use crate::error::{ChukError, Result};
use crate::grid::ChukGrid;

/// CF version declared by new datasets.
pub const CONVENTIONS: &str = "CF-1.10";

const LATLON_BOUNDS_ATTRIBUTES: [&str; 4] = [
    "geospatial_lat_min",
    "geospatial_lat_max",
    "geospatial_lon_min",
    "geospatial_lon_max",
];

/// Creates a dataset holding the grid's `x`, `y` and grid mapping variables, with global
/// attributes from `attrs` layered over generated defaults.
///
/// Defaults: `Conventions`, `date_created`, `spatial_resolution`, a fresh UUID for
/// `tracking_id` and `id`, and the `geospatial_*` bounds when the grid carries lat/lon.
pub fn create_new_dataset(grid: &ChukGrid, attrs: Attributes) -> Result<Dataset> {
    let mut global = default_attributes(grid)?;
    global.extend(attrs);
    if !global.contains_key("tracking_id") {
        global.insert("tracking_id".into(), Uuid::new_v4().to_string().into());
    }
    if !global.contains_key("id") {
        if let Some(tracking_id) = global.get("tracking_id").cloned() {
            global.insert("id".into(), tracking_id);
        }
    }

    let mut ds = Dataset::with_attrs(global);
    for name in ["x", "y", grid.crs_name()] {
        let var = grid
            .variable(name)?
            .ok_or_else(|| ChukError::InvalidGrid(format!("grid has no {name} variable")))?;
        ds.insert(name, var.clone())?;
    }
    debug!("created dataset on {}m grid", grid.resolution());
    Ok(ds)
}

fn default_attributes(grid: &ChukGrid) -> Result<Attributes> {
    let mut a = Attributes::new();
    a.insert("Conventions".into(), CONVENTIONS.into());
    a.insert(
        "date_created".into(),
        Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true).into(),
    );
    a.insert(
        "spatial_resolution".into(),
        format!("{}m", grid.resolution()).into(),
    );
    let grid_bounds: Vec<_> = LATLON_BOUNDS_ATTRIBUTES
        .iter()
        .filter_map(|key| Some((*key, grid.dataset().attrs.get(*key)?.clone())))
        .collect();
    if grid_bounds.len() == LATLON_BOUNDS_ATTRIBUTES.len() {
        // published grid files carry these, saving a read of lat/lon
        for (key, value) in grid_bounds {
            a.insert(key.into(), value);
        }
        a.insert("geospatial_lat_units".into(), "degrees_north".into());
        a.insert("geospatial_lon_units".into(), "degrees_east".into());
    } else if let Some((lat, lon)) = grid.latlons()? {
        let bounds = |arr: ndarray::ArrayView2<f64>| {
            arr.iter()
                .filter(|v| v.is_finite())
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                    (lo.min(*v), hi.max(*v))
                })
        };
        let (lat_min, lat_max) = bounds(lat);
        let (lon_min, lon_max) = bounds(lon);
        if lat_min.is_finite() && lon_min.is_finite() {
            a.insert("geospatial_lat_min".into(), AttrValue::Float(lat_min));
            a.insert("geospatial_lat_max".into(), AttrValue::Float(lat_max));
            a.insert("geospatial_lon_min".into(), AttrValue::Float(lon_min));
            a.insert("geospatial_lon_max".into(), AttrValue::Float(lon_max));
            a.insert("geospatial_lat_units".into(), "degrees_north".into());
            a.insert("geospatial_lon_units".into(), "degrees_east".into());
        }
    }
    Ok(a)
}

/// Adds a `(y, x)` variable, which must have the grid's shape. The grid mapping and, when the
/// dataset has lat/lon, the `coordinates` attribute are set unless `attrs` gives them.
pub fn add_variable(
    ds: &mut Dataset,
    grid: &ChukGrid,
    name: &str,
    data: Array2<f64>,
    attrs: Attributes,
) -> Result<()> {
    if data.dim() != grid.shape() {
        return Err(ChukError::ShapeMismatch(format!(
            "variable {name} has shape {:?}, the grid has {:?}",
            data.dim(),
            grid.shape()
        )));
    }
    let mut var = Variable::grid(data);
    var.attrs
        .insert("grid_mapping".into(), grid.crs_name().into());
    if ds.contains("lat") && ds.contains("lon") {
        var.attrs.insert("coordinates".into(), "lat lon".into());
    }
    var.attrs.extend(attrs);
    ds.insert(name, var)
}

/// Copies the 2-D `lat` and `lon` arrays from the grid into the dataset.
pub fn add_latlon(ds: &mut Dataset, grid: &ChukGrid) -> Result<()> {
    copy_from_grid(ds, grid, &["lat", "lon"])?;
    let names: Vec<String> = ds
        .data_variables()
        .into_iter()
        .filter(|(_, v)| v.dims.ends_with(&["y".to_string(), "x".to_string()]))
        .map(|(n, _)| n.clone())
        .collect();
    for name in names {
        if let Some(var) = ds.variable_mut(&name) {
            var.attrs
                .entry("coordinates".into())
                .or_insert_with(|| "lat lon".into());
        }
    }
    Ok(())
}

/// Copies the `lat_bnds` and `lon_bnds` corner arrays from the grid into the dataset.
pub fn add_latlon_bnds(ds: &mut Dataset, grid: &ChukGrid) -> Result<()> {
    copy_from_grid(ds, grid, &["lat_bnds", "lon_bnds"])
}

fn copy_from_grid(ds: &mut Dataset, grid: &ChukGrid, names: &[&str]) -> Result<()> {
    for name in names {
        let var = grid.variable(name)?.ok_or_else(|| {
            ChukError::InvalidGrid(format!("the grid file does not contain {name}"))
        })?;
        ds.insert(*name, var.clone())?;
    }
    Ok(())
}

/// The grid's `(lat, lon)` arrays as owned values.
pub fn grid_latlons(grid: &ChukGrid) -> Result<(Array2<f64>, Array2<f64>)> {
    let (lat, lon) = grid
        .latlons()?
        .ok_or_else(|| ChukError::InvalidGrid("the grid file does not contain lat/lon".into()))?;
    Ok((lat.to_owned(), lon.to_owned()))
}

/// A `(y, x)` variable of the dataset as a 2-D array.
pub fn grid_values(ds: &Dataset, name: &str) -> Result<Array2<f64>> {
    let var = ds.require(name)?;
    Ok(var.as_grid()?.to_owned())
}
