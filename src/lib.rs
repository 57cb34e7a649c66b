//! # chuk_grid
//!
//! `chuk_grid` is a crate for working with CHUK datasets: gridded Earth observation products for
//! the UK on a 100m (or 1000m) British National Grid reference grid (EPSG:27700).
//!
//! It can check a dataset against the reference grid and the CHUK metadata conventions, build
//! new datasets that conform to the grid, export variables to GeoTIFF, derive masks from
//! categorical auxiliary layers and sample datasets down to a coarser resolution.
//!
//! ## Example
//!
//! ```no_run
//! use chuk_grid::{builder, export, ChukGrid};
//! use chuk_grid::dataset::attrs;
//! use ndarray::Array2;
//!
//! let grid = ChukGrid::load("EOCIS-CHUK-GRID-100M-v1.0.nc").unwrap();
//! let mut ds = builder::create_new_dataset(&grid, attrs([("title", "Distances")])).unwrap();
//! builder::add_variable(
//!     &mut ds,
//!     &grid,
//!     "distances",
//!     Array2::zeros(grid.shape()),
//!     attrs([("units", "m"), ("long_name", "distance to coast")]),
//! )
//! .unwrap();
//!
//! let report = chuk_grid::check(&ds, &grid);
//! assert!(report.errors.is_empty());
//! chuk_grid::io::save(&ds, "distances.nc").unwrap();
//! export::save_as_geotiff(&ds, "distances", "distances.tif").unwrap();
//! ```
//!
//! ## Usage
//! ### rust api
//! - [`check`]: validates a dataset against a [`ChukGrid`], returning warnings and errors.
//! - [`io::load`]: reads a NetCDF4 or GeoTIFF file and validates it, failing on errors.
//! - [`builder`]: creates datasets with the grid's coordinates and CHUK global attributes.
//! - [`export::save_as_geotiff`]: writes one variable to a GeoTIFF with its metadata attached.
//! - [`mask`]: category masks over auxiliary layers, combined with and/or/not.
//! - [`sample::sample`]: block-averages a dataset to a coarser resolution.
//!
//! ### Command line
//! the clap framework provides a command line interface, run
//!```zsh
//! cargo run --release -- -h
//!```
//! to get a list of the available commands. The reference grid file can be given with `--grid`
//! or the `CHUK_GRID_PATH` environment variable.
//!
//! ## Installation
//! gdal and netcdf must be installed, build using
//!```zsh
//! cargo build --release
//! cargo install --path .
//! ```

pub mod builder;
pub mod check;
pub mod dataset;
pub mod error;
pub mod export;
pub mod grid;
pub mod io;
pub mod mask;
pub mod metadata;
pub mod sample;

pub use check::{check, check_with_options, CheckOptions, CheckReport, Issue, IssueCode, Severity};
pub use dataset::{AttrValue, Attributes, DataType, Dataset, Variable};
pub use error::{ChukError, Result};
pub use grid::ChukGrid;
pub use io::{load, save, LoadOptions};
pub use mask::{CategoryMask, Mask};
