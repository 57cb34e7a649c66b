//! Boolean masks derived from categorical auxiliary variables.
//!
//! A categorical variable carries `flag_values` and `flag_meanings`; a [`CategoryMask`] selects
//! some of its categories by name or glob pattern. Masks combine with [`Mask::or`],
//! [`Mask::and`] and [`Mask::not`].

use std::cell::OnceCell;
use std::path::Path;

use glob::Pattern;
use ndarray::{Array2, Zip};
use tracing::debug;

use crate::builder;
use crate::dataset::{attrs, AttrValue, DataType, Dataset, Variable};
use crate::error::{ChukError, Result};
use crate::grid::ChukGrid;
use crate::io;
use crate::metadata::flag_table;

/// Mask over the categories of one categorical variable.
#[derive(Debug, Clone)]
pub struct CategoryMask {
    name: String,
    data: Array2<f64>,
    categories: Vec<(String, f64)>,
    selected: Vec<usize>,
    include_missing: bool,
    cache: OnceCell<Array2<bool>>,
}

impl CategoryMask {
    /// Builds an empty selection over the categories of `var`.
    pub fn from_variable(name: &str, var: &Variable) -> Result<Self> {
        let categories = flag_table(var)
            .map_err(|message| ChukError::InvalidMask(format!("{name}: {message}")))?;
        Ok(CategoryMask {
            name: name.to_string(),
            data: var.as_grid()?.to_owned(),
            categories,
            selected: Vec::new(),
            include_missing: false,
            cache: OnceCell::new(),
        })
    }

    /// Opens `variable` from a NetCDF or GeoTIFF auxiliary file.
    pub fn open<P: AsRef<Path>>(path: P, variable: &str) -> Result<Self> {
        let ds = io::read(path)?;
        Self::from_variable(variable, ds.require(variable)?)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Every `(meaning, value)` category of the variable.
    pub fn all_mask_values(&self) -> &[(String, f64)] {
        &self.categories
    }

    /// Meanings of the selected categories, in the order they were added.
    pub fn selected_mask_values(&self) -> Vec<&str> {
        self.selected
            .iter()
            .map(|i| self.categories[*i].0.as_str())
            .collect()
    }

    /// Selects every category whose meaning matches `pattern`. An exact name wins; otherwise the
    /// pattern is a shell-style glob. A pattern that matches nothing is an error.
    pub fn add_mask_value(&mut self, pattern: &str) -> Result<()> {
        let mut matched = self.matching(|meaning| meaning == pattern);
        if matched.is_empty() {
            let matcher = Pattern::new(pattern)?;
            matched = self.matching(|meaning| matcher.matches(meaning));
        }
        if matched.is_empty() {
            return Err(ChukError::InvalidMask(format!(
                "{pattern} matches no category of {}",
                self.name
            )));
        }
        for i in matched {
            if !self.selected.contains(&i) {
                self.selected.push(i);
            }
        }
        self.cache = OnceCell::new();
        Ok(())
    }

    fn matching(&self, accept: impl Fn(&str) -> bool) -> Vec<usize> {
        self.categories
            .iter()
            .enumerate()
            .filter(|(_, (meaning, _))| accept(meaning))
            .map(|(i, _)| i)
            .collect()
    }

    /// Whether cells without a value (NaN) are part of the mask.
    pub fn set_include_missing(&mut self, include_missing: bool) {
        if self.include_missing != include_missing {
            self.include_missing = include_missing;
            self.cache = OnceCell::new();
        }
    }

    pub fn include_missing(&self) -> bool {
        self.include_missing
    }

    /// The evaluated mask, computed on first use after a change of selection.
    pub fn to_array(&self) -> &Array2<bool> {
        self.cache.get_or_init(|| {
            let values: Vec<f64> = self
                .selected
                .iter()
                .map(|i| self.categories[*i].1)
                .collect();
            debug!("evaluating mask {} over {} categories", self.name, values.len());
            self.data.mapv(|v| {
                if v.is_nan() {
                    self.include_missing
                } else {
                    values.contains(&v)
                }
            })
        })
    }
}

/// A category mask or a logical combination of masks.
#[derive(Debug, Clone)]
pub enum Mask {
    Category(CategoryMask),
    Or(Vec<Mask>),
    And(Vec<Mask>),
    Not(Box<Mask>),
}

impl From<CategoryMask> for Mask {
    fn from(mask: CategoryMask) -> Self {
        Mask::Category(mask)
    }
}

impl Mask {
    /// Union of `masks`, which must be non-empty and share one shape.
    pub fn or(masks: Vec<Mask>) -> Result<Mask> {
        check_combinable(&masks)?;
        Ok(Mask::Or(masks))
    }

    /// Intersection of `masks`, which must be non-empty and share one shape.
    pub fn and(masks: Vec<Mask>) -> Result<Mask> {
        check_combinable(&masks)?;
        Ok(Mask::And(masks))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(mask: Mask) -> Mask {
        Mask::Not(Box::new(mask))
    }

    pub fn shape(&self) -> (usize, usize) {
        match self {
            Mask::Category(m) => m.shape(),
            Mask::Or(masks) | Mask::And(masks) => masks.first().map(Mask::shape).unwrap_or((0, 0)),
            Mask::Not(m) => m.shape(),
        }
    }

    pub fn to_array(&self) -> Array2<bool> {
        match self {
            Mask::Category(m) => m.to_array().clone(),
            Mask::Or(masks) => fold(masks, |a, b| a || b),
            Mask::And(masks) => fold(masks, |a, b| a && b),
            Mask::Not(m) => m.to_array().mapv(|v| !v),
        }
    }

    /// Number of cells in the mask.
    pub fn count(&self) -> usize {
        self.to_array().iter().filter(|v| **v).count()
    }

    /// Share of all cells that are in the mask, 0 for an empty grid.
    pub fn fraction(&self) -> f64 {
        let arr = self.to_array();
        if arr.is_empty() {
            return 0.0;
        }
        arr.iter().filter(|v| **v).count() as f64 / arr.len() as f64
    }
}

fn check_combinable(masks: &[Mask]) -> Result<()> {
    let first = masks
        .first()
        .ok_or_else(|| ChukError::InvalidMask("cannot combine an empty list of masks".into()))?;
    let shape = first.shape();
    if let Some(other) = masks.iter().find(|m| m.shape() != shape) {
        return Err(ChukError::InvalidMask(format!(
            "cannot combine masks of shapes {:?} and {:?}",
            shape,
            other.shape()
        )));
    }
    Ok(())
}

fn fold(masks: &[Mask], op: fn(bool, bool) -> bool) -> Array2<bool> {
    let mut iter = masks.iter();
    let Some(first) = iter.next() else {
        return Array2::from_elem((0, 0), false);
    };
    let mut acc = first.to_array();
    for mask in iter {
        let other = mask.to_array();
        Zip::from(&mut acc).and(&other).for_each(|a, &b| *a = op(*a, b));
    }
    acc
}

/// Opens `variable` from `path` and selects the categories matching `values`.
pub fn create_mask<P: AsRef<Path>>(
    path: P,
    variable: &str,
    values: &[&str],
    include_missing: bool,
) -> Result<Mask> {
    let mut mask = CategoryMask::open(path, variable)?;
    select(&mut mask, values, include_missing)?;
    Ok(mask.into())
}

/// Like [`create_mask`] for a dataset already in memory.
pub fn create_mask_from_dataset(
    ds: &Dataset,
    variable: &str,
    values: &[&str],
    include_missing: bool,
) -> Result<Mask> {
    let mut mask = CategoryMask::from_variable(variable, ds.require(variable)?)?;
    select(&mut mask, values, include_missing)?;
    Ok(mask.into())
}

fn select(mask: &mut CategoryMask, values: &[&str], include_missing: bool) -> Result<()> {
    for value in values {
        mask.add_mask_value(value)?;
    }
    mask.set_include_missing(include_missing);
    Ok(())
}

pub fn combine_masks_and(masks: Vec<Mask>) -> Result<Mask> {
    Mask::and(masks)
}

pub fn combine_masks_or(masks: Vec<Mask>) -> Result<Mask> {
    Mask::or(masks)
}

pub fn not_mask(mask: Mask) -> Mask {
    Mask::not(mask)
}

/// A CHUK dataset holding the mask as a 0/1 byte variable called `name`.
pub fn mask_dataset(mask: &Mask, grid: &ChukGrid, name: &str) -> Result<Dataset> {
    let values = mask.to_array().mapv(|v| if v { 1.0 } else { 0.0 });
    let mut ds = builder::create_new_dataset(grid, attrs([("title", format!("{name} mask"))]))?;
    builder::add_variable(
        &mut ds,
        grid,
        name,
        values,
        attrs([
            ("long_name", AttrValue::from(format!("{name} mask"))),
            ("units", AttrValue::from("1")),
            ("flag_values", AttrValue::Ints(vec![0, 1])),
            ("flag_meanings", AttrValue::from("outside inside")),
        ]),
    )?;
    if let Some(var) = ds.variable_mut(name) {
        var.dtype = DataType::U8;
    }
    Ok(ds)
}
