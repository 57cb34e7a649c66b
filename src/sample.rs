//! Downsampling of CHUK datasets to a coarser resolution.

use ndarray::{s, Array2, ArrayView2};
use tracing::{info, warn};

use crate::dataset::{AttrValue, Dataset, Variable};
use crate::error::{ChukError, Result};
use crate::grid::GridGeometry;

/// Reduces `ds` to cells of `resolution` metres, an integer multiple of its current resolution.
///
/// `(y, x)` variables are reduced by block mean ignoring NaN, or by block mode when they carry
/// `flag_values`. Cells left over at the far edges that do not fill a whole block are dropped.
/// Cell bounds and other variables spanning `x` or `y` in a different layout are not carried
/// over.
pub fn sample(ds: &Dataset, resolution: f64) -> Result<Dataset> {
    let geometry =
        GridGeometry::from_coordinates(ds.require("x")?.as_vector()?, ds.require("y")?.as_vector()?)?;
    let factor = block_factor(geometry.resolution(), resolution)?;
    let (ny, nx) = (geometry.ny / factor, geometry.nx / factor);
    if ny == 0 || nx == 0 {
        return Err(ChukError::InvalidArgument(format!(
            "a {resolution}m grid does not fit in the {}x{} source grid",
            geometry.nx, geometry.ny
        )));
    }
    let offset = (factor as f64 - 1.0) / 2.0;
    let sampled = GridGeometry {
        nx,
        ny,
        x0: geometry.x0 + geometry.dx * offset,
        y0: geometry.y0 + geometry.dy * offset,
        dx: geometry.dx * factor as f64,
        dy: geometry.dy * factor as f64,
    };

    let mut out = Dataset::with_attrs(ds.attrs.clone());
    out.attrs.insert(
        "spatial_resolution".into(),
        AttrValue::Str(format!("{resolution}m")),
    );
    for (axis, coords) in [("x", sampled.x_coords()), ("y", sampled.y_coords())] {
        let source = ds.require(axis)?;
        let var = Variable::coordinate(axis, coords)
            .with_attrs(source.attrs.clone())
            .with_dtype(source.dtype);
        out.insert(axis, var)?;
    }

    for (name, var) in ds.variables() {
        if name == "x" || name == "y" {
            continue;
        }
        if var.dims == ["y", "x"] {
            let reduced = reduce(var.as_grid()?, factor, (ny, nx), var.attrs.contains_key("flag_values"));
            let mut reduced_var = Variable::grid(reduced).with_attrs(var.attrs.clone());
            reduced_var.dtype = var.dtype;
            out.insert(name.as_str(), reduced_var)?;
        } else if var.has_dim("x") || var.has_dim("y") {
            warn!("dropping {name}, it cannot be sampled");
        } else {
            out.insert(name.as_str(), var.clone())?;
        }
    }

    info!(
        "sampled {}x{} at {}m to {}x{} at {resolution}m",
        geometry.nx,
        geometry.ny,
        geometry.resolution(),
        nx,
        ny
    );
    Ok(out)
}

fn block_factor(source: f64, target: f64) -> Result<usize> {
    let ratio = target / source;
    let factor = ratio.round();
    if !ratio.is_finite() || factor < 1.0 || (ratio - factor).abs() > 1e-6 {
        return Err(ChukError::InvalidArgument(format!(
            "resolution {target}m is not a multiple of the source resolution {source}m"
        )));
    }
    Ok(factor as usize)
}

fn reduce(data: ArrayView2<f64>, factor: usize, shape: (usize, usize), categorical: bool) -> Array2<f64> {
    Array2::from_shape_fn(shape, |(j, i)| {
        let block = data.slice(s![j * factor..(j + 1) * factor, i * factor..(i + 1) * factor]);
        let values: Vec<f64> = block.iter().copied().filter(|v| !v.is_nan()).collect();
        if categorical {
            block_mode(values)
        } else if values.is_empty() {
            f64::NAN
        } else {
            values.iter().sum::<f64>() / values.len() as f64
        }
    })
}

// most frequent value, the smallest on ties, NaN when empty
fn block_mode(mut values: Vec<f64>) -> f64 {
    values.sort_by(f64::total_cmp);
    let mut best = (f64::NAN, 0);
    let mut i = 0;
    while i < values.len() {
        let run = values[i..].iter().take_while(|v| **v == values[i]).count();
        if run > best.1 {
            best = (values[i], run);
        }
        i += run;
    }
    best.0
}
