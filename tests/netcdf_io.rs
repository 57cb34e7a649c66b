mod common;

use chuk_grid::io::{self, LoadOptions};
use chuk_grid::{check, AttrValue, ChukError, ChukGrid, DataType, Variable};
use common::{land_cover_dataset, small_grid, small_grid_with_latlons, temperature_dataset};
use ndarray::Array2;
use tempfile::TempDir;

#[test]
fn test_save_then_read_preserves_dataset() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("temperature.nc");
    let grid = small_grid();
    let ds = temperature_dataset(&grid);

    io::save(&ds, &path).unwrap();
    let back = io::read_netcdf(&path).unwrap();

    let original = ds.variable("temperature").unwrap();
    let read = back.variable("temperature").unwrap();
    assert_eq!(read.dims, original.dims);
    assert_eq!(read.data, original.data);
    assert_eq!(read.attr_str("units"), Some("K"));
    assert_eq!(
        read.attr("valid_range"),
        Some(&AttrValue::Floats(vec![200.0, 350.0]))
    );
    assert_eq!(back.attr_str("title"), Some("Synthetic temperature"));
    assert_eq!(back.attrs.get("tracking_id"), ds.attrs.get("tracking_id"));
    assert_eq!(
        back.require("x").unwrap().data,
        ds.require("x").unwrap().data
    );
    assert!(check(&back, &grid).errors.is_empty());
}

#[test]
fn test_fill_values_round_trip_as_nan() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("land_cover.nc");
    let grid = small_grid();
    io::save(&land_cover_dataset(&grid), &path).unwrap();

    let back = io::read_netcdf(&path).unwrap();
    let var = back.require("land_cover").unwrap();
    assert_eq!(var.dtype, DataType::U8);
    let values = var.as_grid().unwrap();
    assert!(values[[0, 0]].is_nan());
    assert_eq!(values[[0, 1]], 2.0);
    assert_eq!(var.attr("_FillValue").and_then(AttrValue::as_f64), Some(255.0));
}

#[test]
fn test_grid_file_round_trip() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("grid.nc");
    let grid = small_grid_with_latlons();
    io::save(grid.dataset(), &path).unwrap();

    let loaded = ChukGrid::load(&path).unwrap();
    assert_eq!(loaded.shape(), grid.shape());
    assert_eq!(loaded.resolution(), 100.0);
    assert_eq!(loaded.extent(), grid.extent());

    assert!(!loaded.dataset().contains("lat"));
    assert!(!loaded.dataset().contains("lon_bnds"));
    let (lat, _) = loaded.latlons().unwrap().unwrap();
    assert_eq!(lat, grid.latlons().unwrap().unwrap().0);
    let lon_bnds = loaded.variable("lon_bnds").unwrap().unwrap();
    assert_eq!(lon_bnds.shape(), &[4, 6, 4]);
}

#[test]
fn test_grid_latlons_read_on_demand_are_shape_checked() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("bad_grid.nc");
    let grid = small_grid();
    let (ny, nx) = grid.shape();
    let mut file = grid.dataset().clone();
    file.insert(
        "lat",
        Variable::new(vec!["x", "y"], Array2::zeros((nx, ny)).into_dyn()).unwrap(),
    )
    .unwrap();
    io::save(&file, &path).unwrap();

    let loaded = ChukGrid::load(&path).unwrap();
    assert!(matches!(loaded.latlons(), Err(ChukError::InvalidGrid(_))));
    assert!(loaded.variable("lon_bnds").unwrap().is_none());
}

#[test]
fn test_integer_type_without_fill_value_is_kept() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("classes.nc");
    let grid = small_grid();
    let mut ds = temperature_dataset(&grid);
    let mut classes = ds.require("temperature").unwrap().clone();
    classes.data.mapv_inplace(|v| (v % 7.0).floor());
    classes.attrs.remove("_FillValue");
    classes.attrs.remove("valid_range");
    ds.insert("classes", classes.with_dtype(DataType::U8)).unwrap();
    io::save(&ds, &path).unwrap();

    let back = io::read_netcdf(&path).unwrap();
    let read = back.require("classes").unwrap();
    assert_eq!(read.dtype, DataType::U8);
    assert_eq!(read.attr("_FillValue"), None);
    assert_eq!(read.data, ds.require("classes").unwrap().data);
    assert_eq!(back.require("temperature").unwrap().dtype, ds.require("temperature").unwrap().dtype);
}

#[test]
fn test_load_applies_latlon_policy() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("temperature.nc");
    let grid = small_grid_with_latlons();
    io::save(&temperature_dataset(&grid), &path).unwrap();

    let (plain, report) = io::load(&path, &grid, &LoadOptions::default()).unwrap();
    assert!(report.errors.is_empty());
    assert!(!plain.contains("lat") && !plain.contains("lat_bnds"));

    let options = LoadOptions {
        add_latlon: true,
        add_latlon_bnds: true,
        ..Default::default()
    };
    let (with_latlon, _) = io::load(&path, &grid, &options).unwrap();
    assert!(with_latlon.contains("lat") && with_latlon.contains("lon"));
    assert!(with_latlon.contains("lat_bnds") && with_latlon.contains("lon_bnds"));
    assert_eq!(
        with_latlon.require("temperature").unwrap().attr_str("coordinates"),
        Some("lat lon")
    );
}

#[test]
fn test_load_rejects_mismatched_grid() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("coarse.nc");
    let coarse = ChukGrid::new(
        chuk_grid::grid::Extent {
            x_min: 350000.0,
            x_max: 352000.0,
            y_min: 450000.0,
            y_max: 451000.0,
        },
        1000.0,
    )
    .unwrap();
    io::save(&temperature_dataset(&coarse), &path).unwrap();

    let err = io::load(&path, &small_grid(), &LoadOptions::default()).unwrap_err();
    match err {
        ChukError::CheckFailed(report) => assert!(!report.errors.is_empty()),
        other => panic!("expected a check failure, got {other}"),
    }
}

#[test]
fn test_load_rejects_unknown_suffix() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("data.zarr");
    assert!(matches!(
        io::load(&path, &small_grid(), &LoadOptions::default()),
        Err(ChukError::UnsupportedFormat { .. })
    ));
}
