//! The CHUK reference grid: a regular grid of square cells on the British National Grid
//! (EPSG:27700), loaded from a grid reference file or built in memory.

use std::cell::OnceCell;
use std::path::{Path, PathBuf};

use ndarray::{Array1, Array2, Array3, ArrayView1, ArrayView2, Ix2};
use tracing::debug;

use crate::dataset::{attrs, AttrValue, Attributes, Dataset, Variable};
use crate::error::{ChukError, Result};
use crate::io;

/// EPSG code of the British National Grid.
pub const EPSG_CODE: u32 = 27700;

/// Name of the grid mapping variable in CHUK files.
pub const GRID_MAPPING_NAME: &str = "crsOSGB";

/// Resolutions (metres) at which CHUK grid files are published.
pub const SUPPORTED_RESOLUTIONS: [u32; 2] = [100, 1000];

/// CF transverse Mercator parameters of a projected CRS.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransverseMercator {
    pub semi_major_axis: f64,
    pub inverse_flattening: f64,
    pub latitude_of_projection_origin: f64,
    pub longitude_of_central_meridian: f64,
    pub scale_factor_at_central_meridian: f64,
    pub false_easting: f64,
    pub false_northing: f64,
}

/// OSGB36 / British National Grid, Airy 1830 ellipsoid.
pub const BRITISH_NATIONAL_GRID: TransverseMercator = TransverseMercator {
    semi_major_axis: 6377563.396,
    inverse_flattening: 299.3249646,
    latitude_of_projection_origin: 49.0,
    longitude_of_central_meridian: -2.0,
    scale_factor_at_central_meridian: 0.9996012717,
    false_easting: 400000.0,
    false_northing: -100000.0,
};

impl TransverseMercator {
    /// Parameters as `(attribute name, value)` pairs in CF naming.
    pub fn cf_parameters(&self) -> [(&'static str, f64); 7] {
        [
            ("semi_major_axis", self.semi_major_axis),
            ("inverse_flattening", self.inverse_flattening),
            ("latitude_of_projection_origin", self.latitude_of_projection_origin),
            ("longitude_of_central_meridian", self.longitude_of_central_meridian),
            ("scale_factor_at_central_meridian", self.scale_factor_at_central_meridian),
            ("false_easting", self.false_easting),
            ("false_northing", self.false_northing),
        ]
    }

    /// The CF grid mapping variable describing this projection.
    pub fn grid_mapping_variable(&self, epsg: u32) -> Variable {
        let mut a: Attributes = attrs([
            ("grid_mapping_name", "transverse_mercator"),
            ("unit", "metre"),
        ]);
        for (name, value) in self.cf_parameters() {
            a.insert(name.to_string(), AttrValue::Float(value));
        }
        a.insert("longitude_of_prime_meridian".into(), AttrValue::Float(0.0));
        a.insert("epsg_code".into(), AttrValue::Str(format!("EPSG:{epsg}")));
        Variable::scalar(0.0).with_attrs(a)
    }
}

/// Bounds of a grid in projected metres, measured at cell edges.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

/// Geometry of a regular grid, derived from its cell-centre coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridGeometry {
    pub nx: usize,
    pub ny: usize,
    /// centre of the first cell along x
    pub x0: f64,
    /// centre of the first cell along y
    pub y0: f64,
    /// signed step between successive x coordinates
    pub dx: f64,
    /// signed step between successive y coordinates, negative for north-up grids
    pub dy: f64,
}

impl GridGeometry {
    /// Derives the geometry from regular coordinate vectors.
    pub fn from_coordinates(x: ArrayView1<f64>, y: ArrayView1<f64>) -> Result<Self> {
        let dx = regular_spacing(x, 1e-6)
            .ok_or_else(|| ChukError::InvalidGrid("x coordinates are not regularly spaced".into()))?;
        let dy = regular_spacing(y, 1e-6)
            .ok_or_else(|| ChukError::InvalidGrid("y coordinates are not regularly spaced".into()))?;
        Ok(GridGeometry {
            nx: x.len(),
            ny: y.len(),
            x0: x[0],
            y0: y[0],
            dx,
            dy,
        })
    }

    /// `(ny, nx)`, the shape of a `(y, x)` array on this grid.
    pub fn shape(&self) -> (usize, usize) {
        (self.ny, self.nx)
    }

    /// Cell size along x, in metres.
    pub fn resolution(&self) -> f64 {
        self.dx.abs()
    }

    pub fn y_ascending(&self) -> bool {
        self.dy > 0.0
    }

    pub fn extent(&self) -> Extent {
        let x_last = self.x0 + self.dx * (self.nx as f64 - 1.0);
        let y_last = self.y0 + self.dy * (self.ny as f64 - 1.0);
        let (hx, hy) = (self.dx.abs() / 2.0, self.dy.abs() / 2.0);
        Extent {
            x_min: self.x0.min(x_last) - hx,
            x_max: self.x0.max(x_last) + hx,
            y_min: self.y0.min(y_last) - hy,
            y_max: self.y0.max(y_last) + hy,
        }
    }

    pub fn x_coords(&self) -> Array1<f64> {
        Array1::from_iter((0..self.nx).map(|i| self.x0 + self.dx * i as f64))
    }

    pub fn y_coords(&self) -> Array1<f64> {
        Array1::from_iter((0..self.ny).map(|j| self.y0 + self.dy * j as f64))
    }

    /// GDAL geotransform of the grid with the first row at the northern edge.
    pub fn north_up_geo_transform(&self) -> [f64; 6] {
        let extent = self.extent();
        [
            extent.x_min,
            self.dx.abs(),
            0.0,
            extent.y_max,
            0.0,
            -self.dy.abs(),
        ]
    }
}

/// Signed step of a regularly spaced sequence, `None` when the sequence is shorter than two
/// values or deviates from a straight line by more than `rel_tol` of a step.
pub fn regular_spacing(values: ArrayView1<f64>, rel_tol: f64) -> Option<f64> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let step = (values[n - 1] - values[0]) / (n as f64 - 1.0);
    if step == 0.0 || !step.is_finite() {
        return None;
    }
    let tol = rel_tol * step.abs();
    values
        .iter()
        .enumerate()
        .all(|(i, v)| (v - (values[0] + step * i as f64)).abs() <= tol)
        .then_some(step)
}

/// Grid file variables read on first use rather than by [`ChukGrid::load`]. At 100 m they
/// dominate the size of the file.
pub const ON_DEMAND_VARIABLES: [&str; 4] = ["lat", "lon", "lat_bnds", "lon_bnds"];

/// The canonical grid that CHUK datasets are checked against.
#[derive(Debug, Clone)]
pub struct ChukGrid {
    dataset: Dataset,
    geometry: GridGeometry,
    crs_name: String,
    source: Option<PathBuf>,
    on_demand: [OnceCell<Option<Variable>>; 4],
}

impl ChukGrid {
    /// Loads the grid from a CHUK grid reference file. The coordinates, grid mapping and
    /// attributes are read now; lat/lon and their bounds when first asked for.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!("loading CHUK grid from {}", path.display());
        let dataset = io::read_netcdf_where(path, |name| !ON_DEMAND_VARIABLES.contains(&name))?;
        let mut grid = Self::from_dataset(dataset)?;
        grid.source = Some(path.to_path_buf());
        debug!(
            "grid {}x{} at {}m",
            grid.geometry.nx,
            grid.geometry.ny,
            grid.resolution()
        );
        Ok(grid)
    }

    /// Interprets a dataset as a grid. It must contain regular `x` and `y` coordinates and a
    /// grid mapping variable.
    pub fn from_dataset(dataset: Dataset) -> Result<Self> {
        let x = dataset
            .variable("x")
            .ok_or_else(|| ChukError::InvalidGrid("no x coordinate".into()))?;
        let y = dataset
            .variable("y")
            .ok_or_else(|| ChukError::InvalidGrid("no y coordinate".into()))?;
        let geometry = GridGeometry::from_coordinates(x.as_vector()?, y.as_vector()?)?;

        let crs_name = if dataset.contains(GRID_MAPPING_NAME) {
            GRID_MAPPING_NAME.to_string()
        } else {
            dataset
                .grid_mapping_names()
                .into_iter()
                .find(|name| dataset.contains(name))
                .ok_or_else(|| ChukError::InvalidGrid("no grid mapping variable".into()))?
        };

        Ok(ChukGrid {
            dataset,
            geometry,
            crs_name,
            source: None,
            on_demand: Default::default(),
        })
    }

    /// Builds a north-up grid covering `extent` with square cells of `resolution` metres.
    pub fn new(extent: Extent, resolution: f64) -> Result<Self> {
        if resolution <= 0.0 {
            return Err(ChukError::InvalidArgument(format!(
                "resolution must be positive, got {resolution}"
            )));
        }
        let nx = cells_along(extent.x_max - extent.x_min, resolution)?;
        let ny = cells_along(extent.y_max - extent.y_min, resolution)?;
        let geometry = GridGeometry {
            nx,
            ny,
            x0: extent.x_min + resolution / 2.0,
            y0: extent.y_max - resolution / 2.0,
            dx: resolution,
            dy: -resolution,
        };

        let mut dataset = Dataset::new();
        dataset.insert("x", Variable::coordinate("x", geometry.x_coords()).with_attrs(x_attrs()))?;
        dataset.insert("y", Variable::coordinate("y", geometry.y_coords()).with_attrs(y_attrs()))?;
        dataset.insert(
            GRID_MAPPING_NAME,
            BRITISH_NATIONAL_GRID.grid_mapping_variable(EPSG_CODE),
        )?;

        Ok(ChukGrid {
            dataset,
            geometry,
            crs_name: GRID_MAPPING_NAME.to_string(),
            source: None,
            on_demand: Default::default(),
        })
    }

    /// Attaches 2-D latitude and longitude arrays to the grid.
    pub fn with_latlons(mut self, lat: Array2<f64>, lon: Array2<f64>) -> Result<Self> {
        for (name, arr) in [("lat", &lat), ("lon", &lon)] {
            if arr.dim() != self.shape() {
                return Err(ChukError::ShapeMismatch(format!(
                    "{name} has shape {:?}, grid has {:?}",
                    arr.dim(),
                    self.shape()
                )));
            }
        }
        self.dataset.insert(
            "lat",
            Variable::grid(lat).with_attrs(attrs([
                ("standard_name", "latitude"),
                ("long_name", "latitude"),
                ("units", "degrees_north"),
            ])),
        )?;
        self.dataset.insert(
            "lon",
            Variable::grid(lon).with_attrs(attrs([
                ("standard_name", "longitude"),
                ("long_name", "longitude"),
                ("units", "degrees_east"),
            ])),
        )?;
        Ok(self)
    }

    /// Attaches lat/lon cell corner arrays of shape `(ny, nx, 4)`.
    pub fn with_latlon_bnds(mut self, lat_bnds: Array3<f64>, lon_bnds: Array3<f64>) -> Result<Self> {
        let (ny, nx) = self.shape();
        for (name, arr) in [("lat_bnds", lat_bnds), ("lon_bnds", lon_bnds)] {
            if arr.dim() != (ny, nx, 4) {
                return Err(ChukError::ShapeMismatch(format!(
                    "{name} has shape {:?}, expected {:?}",
                    arr.dim(),
                    (ny, nx, 4)
                )));
            }
            self.dataset
                .insert(name, Variable::new(vec!["y", "x", "nv"], arr.into_dyn())?)?;
        }
        Ok(self)
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    pub fn shape(&self) -> (usize, usize) {
        self.geometry.shape()
    }

    pub fn resolution(&self) -> f64 {
        self.geometry.resolution()
    }

    pub fn extent(&self) -> Extent {
        self.geometry.extent()
    }

    pub fn x(&self) -> Result<ArrayView1<'_, f64>> {
        self.dataset.require("x")?.as_vector()
    }

    pub fn y(&self) -> Result<ArrayView1<'_, f64>> {
        self.dataset.require("y")?.as_vector()
    }

    pub fn crs_name(&self) -> &str {
        &self.crs_name
    }

    pub fn crs_variable(&self) -> Result<&Variable> {
        self.dataset.require(&self.crs_name)
    }

    /// Any variable of the grid, such as `lat_bnds`. lat/lon and their bounds are read from the
    /// grid file on first use and must lead with the grid's `(y, x)` shape.
    pub fn variable(&self, name: &str) -> Result<Option<&Variable>> {
        if let Some(var) = self.dataset.variable(name) {
            return Ok(Some(var));
        }
        let (Some(i), Some(path)) = (
            ON_DEMAND_VARIABLES.iter().position(|n| *n == name),
            &self.source,
        ) else {
            return Ok(None);
        };
        if self.on_demand[i].get().is_none() {
            let var = io::read_netcdf_variable(path, name)?;
            if let Some(var) = &var {
                self.check_leading_shape(name, var)?;
            }
            let _ = self.on_demand[i].set(var);
        }
        Ok(self.on_demand[i].get().and_then(Option::as_ref))
    }

    /// The variables read so far: everything except lat/lon and bounds not yet asked for.
    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// The 2-D `(lat, lon)` arrays, when the grid carries them.
    pub fn latlons(&self) -> Result<Option<(ArrayView2<'_, f64>, ArrayView2<'_, f64>)>> {
        let (Some(lat), Some(lon)) = (self.variable("lat")?, self.variable("lon")?) else {
            return Ok(None);
        };
        Ok(Some((
            lat.data.view().into_dimensionality::<Ix2>()?,
            lon.data.view().into_dimensionality::<Ix2>()?,
        )))
    }

    fn check_leading_shape(&self, name: &str, var: &Variable) -> Result<()> {
        let (ny, nx) = self.shape();
        let shape = var.shape();
        if shape.len() < 2 || shape[..2] != [ny, nx] || var.dims[..2] != ["y", "x"] {
            return Err(ChukError::InvalidGrid(format!(
                "{name} has dimensions {:?} and shape {shape:?}, expected leading (y, x) of {:?}",
                var.dims,
                (ny, nx)
            )));
        }
        Ok(())
    }
}

fn cells_along(length: f64, resolution: f64) -> Result<usize> {
    let n = (length / resolution).round();
    if n < 1.0 || (n * resolution - length).abs() > resolution * 1e-6 {
        return Err(ChukError::InvalidArgument(format!(
            "extent length {length} is not a positive multiple of {resolution}"
        )));
    }
    Ok(n as usize)
}

pub(crate) fn x_attrs() -> Attributes {
    attrs([
        ("standard_name", "projection_x_coordinate"),
        ("long_name", "easting"),
        ("units", "m"),
    ])
}

pub(crate) fn y_attrs() -> Attributes {
    attrs([
        ("standard_name", "projection_y_coordinate"),
        ("long_name", "northing"),
        ("units", "m"),
    ])
}
