//! Validation of a dataset against the CHUK reference grid.
//!
//! The checks run in a fixed order: dimensions, `x`/`y` coordinates, coordinate reference
//! system, data variable layout, then metadata rules. Geometry and CRS problems are errors; most
//! metadata gaps are warnings.

use std::fmt;

use gdal::spatial_ref::SpatialRef;
use ndarray::ArrayView1;
use tracing::{debug, info};

use crate::dataset::{Dataset, Variable};
use crate::error::{ChukError, Result};
use crate::grid::{
    regular_spacing, ChukGrid, BRITISH_NATIONAL_GRID, EPSG_CODE, GRID_MAPPING_NAME,
};
use crate::metadata::{self, GLOBAL_ATTRIBUTE_RULES, VARIABLE_ATTRIBUTE_RULES};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// Kind of problem found by a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueCode {
    MissingDimension,
    DimensionSizeMismatch,
    MissingCoordinate,
    IrregularCoordinate,
    ResolutionMismatch,
    ExtentMismatch,
    CoordinateMismatch,
    MissingGridMapping,
    CrsMismatch,
    UnexpectedDimensions,
    MissingGlobalAttribute,
    MissingVariableAttribute,
    InvalidAttributeValue,
}

impl IssueCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueCode::MissingDimension => "missing_dimension",
            IssueCode::DimensionSizeMismatch => "dimension_size_mismatch",
            IssueCode::MissingCoordinate => "missing_coordinate",
            IssueCode::IrregularCoordinate => "irregular_coordinate",
            IssueCode::ResolutionMismatch => "resolution_mismatch",
            IssueCode::ExtentMismatch => "extent_mismatch",
            IssueCode::CoordinateMismatch => "coordinate_mismatch",
            IssueCode::MissingGridMapping => "missing_grid_mapping",
            IssueCode::CrsMismatch => "crs_mismatch",
            IssueCode::UnexpectedDimensions => "unexpected_dimensions",
            IssueCode::MissingGlobalAttribute => "missing_global_attribute",
            IssueCode::MissingVariableAttribute => "missing_variable_attribute",
            IssueCode::InvalidAttributeValue => "invalid_attribute_value",
        }
    }
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One problem found in a dataset. `subject` names the attribute, variable or dimension
/// concerned.
#[derive(Debug, Clone, PartialEq)]
pub struct Issue {
    pub severity: Severity,
    pub code: IssueCode,
    pub subject: String,
    pub message: String,
}

impl Issue {
    pub fn new(
        severity: Severity,
        code: IssueCode,
        subject: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Issue {
            severity,
            code,
            subject: subject.into(),
            message: message.into(),
        }
    }

    pub fn warning(code: IssueCode, subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, code, subject, message)
    }

    pub fn error(code: IssueCode, subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, code, subject, message)
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.code, self.subject, self.message)
    }
}

/// Outcome of checking a dataset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckReport {
    pub warnings: Vec<Issue>,
    pub errors: Vec<Issue>,
}

impl CheckReport {
    pub fn push(&mut self, issue: Issue) {
        match issue.severity {
            Severity::Warning => self.warnings.push(issue),
            Severity::Error => self.errors.push(issue),
        }
    }

    pub fn extend(&mut self, issues: impl IntoIterator<Item = Issue>) {
        for issue in issues {
            self.push(issue);
        }
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// The errors joined into one line.
    pub fn summary(&self) -> String {
        self.errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Returns the report when there are no errors, otherwise fails with
    /// [`ChukError::CheckFailed`].
    pub fn into_result(self) -> Result<CheckReport> {
        if self.is_ok() {
            Ok(self)
        } else {
            Err(ChukError::CheckFailed(Box::new(self)))
        }
    }
}

/// Tuning of the checks.
#[derive(Debug, Clone)]
pub struct CheckOptions {
    /// allowed coordinate deviation as a fraction of the grid resolution
    pub tolerance: f64,
    /// whether the CF/CHUK attribute rules run
    pub check_metadata: bool,
}

impl Default for CheckOptions {
    fn default() -> Self {
        CheckOptions {
            tolerance: 1e-3,
            check_metadata: true,
        }
    }
}

/// Checks `ds` against `grid` with the default options.
pub fn check(ds: &Dataset, grid: &ChukGrid) -> CheckReport {
    check_with_options(ds, grid, &CheckOptions::default())
}

pub fn check_with_options(ds: &Dataset, grid: &ChukGrid, options: &CheckOptions) -> CheckReport {
    let mut report = CheckReport::default();

    check_dimensions(ds, grid, &mut report);
    check_coordinates(ds, grid, options, &mut report);
    check_crs(ds, grid, &mut report);
    check_data_variables(ds, grid, options, &mut report);
    if options.check_metadata {
        report.extend(metadata::check_global_attributes(ds, GLOBAL_ATTRIBUTE_RULES));
    }

    for issue in report.errors.iter().chain(&report.warnings) {
        debug!("{issue}");
    }
    info!(
        "checked dataset: {} warning(s), {} error(s)",
        report.warnings.len(),
        report.errors.len()
    );
    report
}

fn check_dimensions(ds: &Dataset, grid: &ChukGrid, report: &mut CheckReport) {
    let (ny, nx) = grid.shape();
    for (dim, expected) in [("y", ny), ("x", nx)] {
        match ds.dimension_len(dim) {
            None => report.push(Issue::error(
                IssueCode::MissingDimension,
                dim,
                format!("dimension {dim} is missing"),
            )),
            Some(actual) if actual != expected => report.push(Issue::error(
                IssueCode::DimensionSizeMismatch,
                dim,
                format!("dimension {dim} has length {actual}, the grid has {expected}"),
            )),
            Some(_) => {}
        }
    }
}

fn check_coordinates(
    ds: &Dataset,
    grid: &ChukGrid,
    options: &CheckOptions,
    report: &mut CheckReport,
) {
    let geometry = grid.geometry();
    let axes = [
        ("x", geometry.x0, geometry.dx, "projection_x_coordinate"),
        ("y", geometry.y0, geometry.dy, "projection_y_coordinate"),
    ];
    let tolerance = options.tolerance * grid.resolution();

    for (axis, first, step, standard_name) in axes {
        let Some(var) = ds.variable(axis) else {
            report.push(Issue::error(
                IssueCode::MissingCoordinate,
                axis,
                format!("coordinate variable {axis} is missing"),
            ));
            continue;
        };
        if var.dims != [axis] {
            report.push(Issue::error(
                IssueCode::CoordinateMismatch,
                axis,
                format!("coordinate {axis} must be 1-D over dimension {axis}"),
            ));
            continue;
        }
        let values = match var.as_vector() {
            Ok(values) => values,
            Err(_) => continue,
        };
        compare_axis(axis, values, first, step, tolerance, report);

        match var.attr_str("standard_name") {
            None => report.push(Issue::warning(
                IssueCode::MissingVariableAttribute,
                axis,
                format!("coordinate {axis} has no standard_name"),
            )),
            Some(name) if name != standard_name => report.push(Issue::warning(
                IssueCode::InvalidAttributeValue,
                axis,
                format!("coordinate {axis} has standard_name {name}, expected {standard_name}"),
            )),
            Some(_) => {}
        }
        if !var.attrs.contains_key("units") {
            report.push(Issue::warning(
                IssueCode::MissingVariableAttribute,
                axis,
                format!("coordinate {axis} has no units"),
            ));
        }
    }
}

fn compare_axis(
    axis: &str,
    values: ArrayView1<f64>,
    first: f64,
    step: f64,
    tolerance: f64,
    report: &mut CheckReport,
) {
    let n = values.len();
    if n == 0 {
        return;
    }
    if n > 1 {
        let Some(actual_step) = regular_spacing(values, tolerance / step.abs()) else {
            report.push(Issue::error(
                IssueCode::IrregularCoordinate,
                axis,
                format!("coordinate {axis} is not regularly spaced"),
            ));
            return;
        };
        if actual_step.signum() != step.signum() {
            report.push(Issue::error(
                IssueCode::CoordinateMismatch,
                axis,
                format!("coordinate {axis} runs in the opposite direction to the grid"),
            ));
            return;
        }
        // a spacing error accumulates along the axis
        if (actual_step - step).abs() * (n as f64 - 1.0) > tolerance {
            report.push(Issue::error(
                IssueCode::ResolutionMismatch,
                axis,
                format!(
                    "coordinate {axis} has spacing {}, the grid resolution is {}",
                    actual_step.abs(),
                    step.abs()
                ),
            ));
            return;
        }
    }
    let last = first + step * (n as f64 - 1.0);
    if (values[0] - first).abs() > tolerance || (values[n - 1] - last).abs() > tolerance {
        report.push(Issue::error(
            IssueCode::ExtentMismatch,
            axis,
            format!(
                "coordinate {axis} runs from {} to {}, the grid runs from {first} to {last}",
                values[0],
                values[n - 1]
            ),
        ));
    }
}

/// EPSG code described by a grid mapping variable, when it can be identified.
pub fn crs_epsg(var: &Variable) -> Option<u32> {
    if let Some(code) = var.attr_str("epsg_code") {
        let digits = code.trim().trim_start_matches("EPSG:").trim_start_matches("epsg:");
        return digits.parse().ok();
    }
    for key in ["crs_wkt", "spatial_ref"] {
        if let Some(code) = var.attr_str(key).and_then(wkt_epsg) {
            return Some(code);
        }
    }
    if var.attr_str("grid_mapping_name") == Some("transverse_mercator") {
        let matches_bng = BRITISH_NATIONAL_GRID
            .cf_parameters()
            .iter()
            .all(|(name, expected)| {
                var.attr(name)
                    .and_then(|v| v.as_f64())
                    .map(|actual| (actual - expected).abs() <= 1e-6 * expected.abs().max(1.0))
                    .unwrap_or(false)
            });
        if matches_bng {
            return Some(EPSG_CODE);
        }
    }
    None
}

/// EPSG code of a WKT CRS as identified by GDAL. A bound CRS resolves to its source CRS, and
/// WKT without an authority is compared against the British National Grid definition.
fn wkt_epsg(wkt: &str) -> Option<u32> {
    let mut srs = SpatialRef::from_wkt(wkt).ok()?;
    if srs.auth_name().ok().as_deref() == Some("EPSG") {
        if let Ok(code) = srs.auth_code() {
            return u32::try_from(code).ok();
        }
    }
    if srs.auto_identify_epsg().is_ok() {
        if let Ok(code) = srs.auth_code() {
            return u32::try_from(code).ok();
        }
    }
    let bng = SpatialRef::from_epsg(EPSG_CODE).ok()?;
    (srs == bng).then_some(EPSG_CODE)
}

fn check_crs(ds: &Dataset, grid: &ChukGrid, report: &mut CheckReport) {
    let expected = grid.crs_variable().ok().and_then(crs_epsg).unwrap_or(EPSG_CODE);

    for (name, var) in ds.variables() {
        if let Some(mapping) = var.attr_str("grid_mapping") {
            if !ds.contains(mapping) {
                report.push(Issue::error(
                    IssueCode::MissingGridMapping,
                    name.as_str(),
                    format!("variable {name} refers to grid mapping {mapping} which is not in the dataset"),
                ));
            }
        }
    }

    let mut mappings: Vec<String> = ds
        .grid_mapping_names()
        .into_iter()
        .filter(|name| ds.contains(name))
        .collect();
    if mappings.is_empty() && ds.contains(GRID_MAPPING_NAME) {
        mappings.push(GRID_MAPPING_NAME.to_string());
    }
    if mappings.is_empty() {
        report.push(Issue::error(
            IssueCode::MissingGridMapping,
            "crs",
            format!("no grid mapping variable found, expected {GRID_MAPPING_NAME} describing EPSG:{expected}"),
        ));
        return;
    }

    for name in mappings {
        let Some(var) = ds.variable(&name) else { continue };
        match crs_epsg(var) {
            Some(code) if code == expected => {}
            Some(code) => report.push(Issue::error(
                IssueCode::CrsMismatch,
                name.as_str(),
                format!("grid mapping {name} describes EPSG:{code}, the grid uses EPSG:{expected}"),
            )),
            None => report.push(Issue::error(
                IssueCode::CrsMismatch,
                name.as_str(),
                format!("grid mapping {name} does not identify EPSG:{expected}"),
            )),
        }
    }
}

fn check_data_variables(
    ds: &Dataset,
    grid: &ChukGrid,
    options: &CheckOptions,
    report: &mut CheckReport,
) {
    let (ny, nx) = grid.shape();
    for name in ["lat", "lon", "lat_bnds", "lon_bnds"] {
        let Some(var) = ds.variable(name) else { continue };
        let leading_ok = var.dims.len() >= 2
            && var.dims[0] == "y"
            && var.dims[1] == "x"
            && var.shape()[..2] == [ny, nx];
        if !leading_ok {
            report.push(Issue::error(
                IssueCode::UnexpectedDimensions,
                name,
                format!(
                    "{name} has dimensions ({}) and shape {:?}, expected leading (y, x) of {:?}",
                    var.dims.join(", "),
                    var.shape(),
                    (ny, nx)
                ),
            ));
        }
    }

    for (name, var) in ds.data_variables() {
        if var.has_dim("x") || var.has_dim("y") {
            let n = var.dims.len();
            if n < 2 || var.dims[n - 2] != "y" || var.dims[n - 1] != "x" {
                report.push(Issue::error(
                    IssueCode::UnexpectedDimensions,
                    name.as_str(),
                    format!(
                        "variable {name} has dimensions ({}), the last two must be (y, x)",
                        var.dims.join(", ")
                    ),
                ));
            }
        }
        if options.check_metadata {
            report.extend(metadata::check_variable_attributes(
                ds,
                name,
                var,
                VARIABLE_ATTRIBUTE_RULES,
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{attrs, AttrValue};
    use crate::grid::Extent;
    use ndarray::{Array1, Array2};

    fn grid() -> ChukGrid {
        ChukGrid::new(
            Extent {
                x_min: 0.0,
                x_max: 800.0,
                y_min: 0.0,
                y_max: 600.0,
            },
            100.0,
        )
        .unwrap()
    }

    fn dataset_from(grid: &ChukGrid) -> Dataset {
        let mut ds = grid.dataset().clone();
        ds.insert(
            "values",
            Variable::grid(Array2::zeros(grid.shape())).with_attrs(attrs([
                ("units", "1"),
                ("long_name", "values"),
                ("grid_mapping", GRID_MAPPING_NAME),
            ])),
        )
        .unwrap();
        ds
    }

    fn geometry_only() -> CheckOptions {
        CheckOptions {
            check_metadata: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_matching_dataset_has_no_errors() {
        let grid = grid();
        let report = check(&dataset_from(&grid), &grid);
        assert!(report.is_ok(), "{}", report.summary());
        // only the global attribute rules fire
        assert!(report
            .warnings
            .iter()
            .all(|w| w.code == IssueCode::MissingGlobalAttribute));
    }

    #[test]
    fn test_missing_dimension() {
        let grid = grid();
        let mut ds = Dataset::new();
        ds.insert("x", grid.dataset().variable("x").unwrap().clone())
            .unwrap();
        let report = check_with_options(&ds, &grid, &geometry_only());
        assert!(report
            .errors
            .iter()
            .any(|e| e.code == IssueCode::MissingDimension && e.subject == "y"));
        assert!(report
            .errors
            .iter()
            .any(|e| e.code == IssueCode::MissingGridMapping));
    }

    #[test]
    fn test_shifted_origin_is_extent_error() {
        let grid = grid();
        let mut ds = dataset_from(&grid);
        let shifted = grid.x().unwrap().mapv(|v| v + 100.0);
        ds.insert("x", Variable::coordinate("x", shifted)).unwrap();
        let report = check_with_options(&ds, &grid, &geometry_only());
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].code, IssueCode::ExtentMismatch);
    }

    #[test]
    fn test_small_offset_within_tolerance() {
        let grid = grid();
        let mut ds = dataset_from(&grid);
        let nudged = grid.x().unwrap().mapv(|v| v + 0.01);
        ds.insert("x", Variable::coordinate("x", nudged).with_attrs(crate::grid::x_attrs()))
            .unwrap();
        assert!(check_with_options(&ds, &grid, &geometry_only()).is_ok());
    }

    #[test]
    fn test_flipped_axis() {
        let grid = grid();
        let mut ds = dataset_from(&grid);
        let flipped: Array1<f64> = grid.y().unwrap().iter().rev().copied().collect();
        ds.insert("y", Variable::coordinate("y", flipped)).unwrap();
        let report = check_with_options(&ds, &grid, &geometry_only());
        assert!(report
            .errors
            .iter()
            .any(|e| e.code == IssueCode::CoordinateMismatch));
    }

    #[test]
    fn test_irregular_axis() {
        let grid = grid();
        let mut ds = dataset_from(&grid);
        let mut x = grid.x().unwrap().to_owned();
        x[3] += 30.0;
        ds.insert("x", Variable::coordinate("x", x)).unwrap();
        let report = check_with_options(&ds, &grid, &geometry_only());
        assert_eq!(report.errors[0].code, IssueCode::IrregularCoordinate);
    }

    #[test]
    fn test_small_offset_at_one_point_is_regular() {
        let grid = grid();
        let mut ds = dataset_from(&grid);
        let mut x = grid.x().unwrap().to_owned();
        x[4] += 0.01;
        ds.insert("x", Variable::coordinate("x", x).with_attrs(crate::grid::x_attrs()))
            .unwrap();
        assert!(check_with_options(&ds, &grid, &geometry_only()).is_ok());
    }

    #[test]
    fn test_accumulated_spacing_drift() {
        let grid = ChukGrid::new(
            Extent {
                x_min: 0.0,
                x_max: 100_000.0,
                y_min: 0.0,
                y_max: 200.0,
            },
            100.0,
        )
        .unwrap();
        let mut ds = dataset_from(&grid);
        let drifting = Array1::from_iter((0..1000).map(|i| 50.0 + 100.05 * f64::from(i)));
        ds.insert("x", Variable::coordinate("x", drifting).with_attrs(crate::grid::x_attrs()))
            .unwrap();
        let report = check_with_options(&ds, &grid, &geometry_only());
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].code, IssueCode::ResolutionMismatch);
    }

    #[test]
    fn test_latlon_shape_mismatch() {
        let grid = grid();
        let (ny, nx) = grid.shape();

        let mut ds = dataset_from(&grid);
        ds.insert("lat", Variable::new(vec!["x", "y"], Array2::zeros((nx, ny)).into_dyn()).unwrap())
            .unwrap();
        let report = check_with_options(&ds, &grid, &geometry_only());
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].code, IssueCode::UnexpectedDimensions);
        assert_eq!(report.errors[0].subject, "lat");

        let mut ds = dataset_from(&grid);
        ds.insert(
            "lon_bnds",
            Variable::new(vec!["x", "y", "nv"], ndarray::Array3::zeros((nx, ny, 4)).into_dyn())
                .unwrap(),
        )
        .unwrap();
        let report = check_with_options(&ds, &grid, &geometry_only());
        assert_eq!(report.errors[0].code, IssueCode::UnexpectedDimensions);
    }

    #[test]
    fn test_coordinate_bounds_are_not_data() {
        let grid = grid();
        let mut ds = dataset_from(&grid);
        let x = grid.x().unwrap().to_owned();
        let nx = x.len();
        ds.insert(
            "x",
            Variable::coordinate("x", x)
                .with_attrs(crate::grid::x_attrs())
                .with_attrs(attrs([("bounds", "x_bnds")])),
        )
        .unwrap();
        ds.insert(
            "x_bnds",
            Variable::new(vec!["x", "nv"], Array2::zeros((nx, 2)).into_dyn()).unwrap(),
        )
        .unwrap();
        let report = check_with_options(&ds, &grid, &geometry_only());
        assert!(report.errors.is_empty(), "{:?}", report.errors);
    }

    #[test]
    fn test_transposed_variable() {
        let grid = grid();
        let mut ds = dataset_from(&grid);
        let (ny, nx) = grid.shape();
        let transposed = Variable::new(vec!["x", "y"], Array2::<f64>::zeros((nx, ny)).into_dyn())
            .unwrap()
            .with_attrs(attrs([("grid_mapping", GRID_MAPPING_NAME)]));
        ds.insert("transposed", transposed).unwrap();
        let report = check_with_options(&ds, &grid, &geometry_only());
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].code, IssueCode::UnexpectedDimensions);
    }

    #[test]
    fn test_crs_identification() {
        let bng = BRITISH_NATIONAL_GRID.grid_mapping_variable(EPSG_CODE);
        assert_eq!(crs_epsg(&bng), Some(27700));

        let mut params_only = bng.clone();
        params_only.attrs.remove("epsg_code");
        assert_eq!(crs_epsg(&params_only), Some(27700));

        params_only
            .attrs
            .insert("false_easting".into(), AttrValue::Float(500000.0));
        assert_eq!(crs_epsg(&params_only), None);

        let wkt = |key: &str, value: String| Variable::scalar(0.0).with_attrs(attrs([(key, value)]));
        let bng_wkt = SpatialRef::from_epsg(27700).unwrap().to_wkt().unwrap();
        assert_eq!(crs_epsg(&wkt("crs_wkt", bng_wkt)), Some(27700));
        let utm_wkt = SpatialRef::from_epsg(32630).unwrap().to_wkt().unwrap();
        assert_eq!(crs_epsg(&wkt("spatial_ref", utm_wkt)), Some(32630));
    }

    const BNG_WKT2: &str = r#"PROJCRS["OSGB36 / British National Grid",
        BASEGEOGCRS["OSGB36",
            DATUM["Ordnance Survey of Great Britain 1936",
                ELLIPSOID["Airy 1830",6377563.396,299.3249646,LENGTHUNIT["metre",1]]],
            PRIMEM["Greenwich",0,ANGLEUNIT["degree",0.0174532925199433]]],
        CONVERSION["British National Grid",
            METHOD["Transverse Mercator",ID["EPSG",9807]],
            PARAMETER["Latitude of natural origin",49,ANGLEUNIT["degree",0.0174532925199433]],
            PARAMETER["Longitude of natural origin",-2,ANGLEUNIT["degree",0.0174532925199433]],
            PARAMETER["Scale factor at natural origin",0.9996012717,SCALEUNIT["unity",1]],
            PARAMETER["False easting",400000,LENGTHUNIT["metre",1]],
            PARAMETER["False northing",-100000,LENGTHUNIT["metre",1]]],
        CS[Cartesian,2],
            AXIS["easting (E)",east,ORDER[1],LENGTHUNIT["metre",1]],
            AXIS["northing (N)",north,ORDER[2],LENGTHUNIT["metre",1]]"#;

    #[test]
    fn test_bound_crs_resolves_to_source() {
        let bound = format!(
            r#"BOUNDCRS[SOURCECRS[{BNG_WKT2},ID["EPSG",27700]]],
            TARGETCRS[GEOGCRS["WGS 84",
                DATUM["World Geodetic System 1984",
                    ELLIPSOID["WGS 84",6378137,298.257223563,LENGTHUNIT["metre",1]]],
                PRIMEM["Greenwich",0,ANGLEUNIT["degree",0.0174532925199433]],
                CS[ellipsoidal,2],
                    AXIS["latitude",north,ORDER[1],ANGLEUNIT["degree",0.0174532925199433]],
                    AXIS["longitude",east,ORDER[2],ANGLEUNIT["degree",0.0174532925199433]],
                ID["EPSG",4326]]],
            ABRIDGEDTRANSFORMATION["OSGB36 to WGS 84 (6)",
                METHOD["Position Vector transformation (geog2D domain)",ID["EPSG",9606]],
                PARAMETER["X-axis translation",446.448,ID["EPSG",8605]],
                PARAMETER["Y-axis translation",-125.157,ID["EPSG",8606]],
                PARAMETER["Z-axis translation",542.06,ID["EPSG",8607]],
                PARAMETER["X-axis rotation",0.15,ID["EPSG",8608]],
                PARAMETER["Y-axis rotation",0.247,ID["EPSG",8609]],
                PARAMETER["Z-axis rotation",0.842,ID["EPSG",8610]],
                PARAMETER["Scale difference",-20.489,ID["EPSG",8611]],
                ID["EPSG",1314]]]"#
        );
        let var = Variable::scalar(0.0).with_attrs(attrs([("crs_wkt", bound)]));
        assert_eq!(crs_epsg(&var), Some(27700));
    }

    #[test]
    fn test_unidentified_wkt_falls_back_to_parameters() {
        for wkt in [format!("{BNG_WKT2}]"), "not a crs".to_string()] {
            let mut var = BRITISH_NATIONAL_GRID.grid_mapping_variable(EPSG_CODE);
            var.attrs.remove("epsg_code");
            var.attrs.insert("crs_wkt".into(), AttrValue::from(wkt));
            assert_eq!(crs_epsg(&var), Some(27700));
        }
    }

    #[test]
    fn test_wrong_crs_is_error() {
        let grid = grid();
        let mut ds = dataset_from(&grid);
        ds.insert(
            GRID_MAPPING_NAME,
            Variable::scalar(0.0).with_attrs(attrs([("epsg_code", "EPSG:4326")])),
        )
        .unwrap();
        let report = check_with_options(&ds, &grid, &geometry_only());
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].code, IssueCode::CrsMismatch);
    }

    #[test]
    fn test_dangling_grid_mapping() {
        let grid = grid();
        let mut ds = dataset_from(&grid);
        ds.variable_mut("values")
            .unwrap()
            .attrs
            .insert("grid_mapping".into(), "crsWGS84".into());
        let report = check_with_options(&ds, &grid, &geometry_only());
        assert!(report
            .errors
            .iter()
            .any(|e| e.code == IssueCode::MissingGridMapping && e.subject == "values"));
    }

    #[test]
    fn test_into_result() {
        let grid = grid();
        let ok = check(&dataset_from(&grid), &grid).into_result();
        assert!(ok.is_ok());

        let err = check(&Dataset::new(), &grid).into_result();
        assert!(matches!(err, Err(ChukError::CheckFailed(_))));
    }
}
