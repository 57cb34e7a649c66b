//! Shared fixtures for the integration tests: a small synthetic CHUK grid and datasets on it.

#![allow(dead_code)]

use chuk_grid::builder::{add_variable, create_new_dataset};
use chuk_grid::dataset::attrs;
use chuk_grid::grid::{ChukGrid, Extent};
use chuk_grid::{AttrValue, Dataset};
use ndarray::{Array2, Array3};

/// A 6 x 4 cell grid at 100m, north-up.
pub fn small_grid() -> ChukGrid {
    ChukGrid::new(
        Extent {
            x_min: 350000.0,
            x_max: 350600.0,
            y_min: 450000.0,
            y_max: 450400.0,
        },
        100.0,
    )
    .unwrap()
}

/// [`small_grid`] with synthetic lat/lon arrays and cell corners attached.
pub fn small_grid_with_latlons() -> ChukGrid {
    let grid = small_grid();
    let (ny, nx) = grid.shape();
    let lat = Array2::from_shape_fn((ny, nx), |(j, _)| 54.0 - j as f64 * 0.001);
    let lon = Array2::from_shape_fn((ny, nx), |(_, i)| -2.5 + i as f64 * 0.0015);
    let lat_bnds = Array3::from_shape_fn((ny, nx, 4), |(j, _, k)| {
        54.0 - j as f64 * 0.001 + if k < 2 { 0.0005 } else { -0.0005 }
    });
    let lon_bnds = Array3::from_shape_fn((ny, nx, 4), |(_, i, k)| {
        -2.5 + i as f64 * 0.0015 + if k == 0 || k == 3 { -0.00075 } else { 0.00075 }
    });
    grid.with_latlons(lat, lon)
        .unwrap()
        .with_latlon_bnds(lat_bnds, lon_bnds)
        .unwrap()
}

/// A dataset on `grid` with one continuous variable `temperature`.
pub fn temperature_dataset(grid: &ChukGrid) -> Dataset {
    let mut ds = create_new_dataset(
        grid,
        attrs([
            ("title", "Synthetic temperature"),
            ("institution", "Test"),
        ]),
    )
    .unwrap();
    let values = Array2::from_shape_fn(grid.shape(), |(j, i)| 280.0 + j as f64 + 0.5 * i as f64);
    add_variable(
        &mut ds,
        grid,
        "temperature",
        values,
        attrs([
            ("units", AttrValue::from("K")),
            ("standard_name", AttrValue::from("air_temperature")),
            ("valid_range", AttrValue::Floats(vec![200.0, 350.0])),
        ]),
    )
    .unwrap();
    ds
}

/// A dataset on `grid` with a categorical `land_cover` byte variable, 255 marking missing cells.
pub fn land_cover_dataset(grid: &ChukGrid) -> Dataset {
    let mut ds = create_new_dataset(grid, attrs([("title", "Synthetic land cover")])).unwrap();
    let (ny, nx) = grid.shape();
    let values = Array2::from_shape_fn((ny, nx), |(j, i)| {
        if j == 0 && i == 0 {
            f64::NAN
        } else {
            ((j * nx + i) % 4 + 1) as f64
        }
    });
    add_variable(
        &mut ds,
        grid,
        "land_cover",
        values,
        attrs([
            ("units", AttrValue::from("1")),
            ("long_name", AttrValue::from("land cover class")),
            ("flag_values", AttrValue::Ints(vec![1, 2, 3, 4])),
            (
                "flag_meanings",
                AttrValue::from("broadleaf_woodland coniferous_woodland arable water"),
            ),
            ("_FillValue", AttrValue::Int(255)),
        ]),
    )
    .unwrap();
    ds.variable_mut("land_cover").unwrap().dtype = chuk_grid::DataType::U8;
    ds
}
