//! In-memory model of a self-describing array dataset: named variables over named dimensions,
//! each carrying an attribute dictionary, plus global attributes.

use std::collections::BTreeMap;
use std::fmt;

use ndarray::{Array1, Array2, ArrayD, Ix2, IxDyn};
use serde::{Deserialize, Serialize};

use crate::error::{ChukError, Result};

/// Names of the variables that locate cells rather than carry data.
pub const COORDINATE_NAMES: [&str; 6] = ["x", "y", "lat", "lon", "lat_bnds", "lon_bnds"];

/// An attribute value, either a scalar or a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Str(String),
    Int(i64),
    Float(f64),
    Ints(Vec<i64>),
    Floats(Vec<f64>),
    Strs(Vec<String>),
}

impl AttrValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// numeric scalar value, single element lists included
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Int(i) => Some(*i as f64),
            AttrValue::Float(f) => Some(*f),
            AttrValue::Ints(v) if v.len() == 1 => Some(v[0] as f64),
            AttrValue::Floats(v) if v.len() == 1 => Some(v[0]),
            AttrValue::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// numeric values as a list; a scalar becomes a list of one
    pub fn to_f64_vec(&self) -> Option<Vec<f64>> {
        match self {
            AttrValue::Int(i) => Some(vec![*i as f64]),
            AttrValue::Float(f) => Some(vec![*f]),
            AttrValue::Ints(v) => Some(v.iter().map(|i| *i as f64).collect()),
            AttrValue::Floats(v) => Some(v.clone()),
            _ => None,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Str(s) => write!(f, "{s}"),
            AttrValue::Int(i) => write!(f, "{i}"),
            AttrValue::Float(v) => write!(f, "{v}"),
            AttrValue::Ints(v) => write!(f, "{v:?}"),
            AttrValue::Floats(v) => write!(f, "{v:?}"),
            AttrValue::Strs(v) => write!(f, "{}", v.join(", ")),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Str(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::Str(s)
    }
}

impl From<i64> for AttrValue {
    fn from(i: i64) -> Self {
        AttrValue::Int(i)
    }
}

impl From<f64> for AttrValue {
    fn from(f: f64) -> Self {
        AttrValue::Float(f)
    }
}

impl From<Vec<i64>> for AttrValue {
    fn from(v: Vec<i64>) -> Self {
        AttrValue::Ints(v)
    }
}

impl From<Vec<f64>> for AttrValue {
    fn from(v: Vec<f64>) -> Self {
        AttrValue::Floats(v)
    }
}

/// Attribute dictionary of a variable or dataset.
pub type Attributes = BTreeMap<String, AttrValue>;

/// Builds an [`Attributes`] map from `(name, value)` pairs.
pub fn attrs<K, V, I>(pairs: I) -> Attributes
where
    K: Into<String>,
    V: Into<AttrValue>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Storage type of a variable when written to file. Values are held as `f64` in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataType {
    I8,
    U8,
    I16,
    I32,
    F32,
    #[default]
    F64,
}

impl DataType {
    pub fn is_integer(&self) -> bool {
        !matches!(self, DataType::F32 | DataType::F64)
    }
}

/// A named-dimension array with attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub dims: Vec<String>,
    pub data: ArrayD<f64>,
    pub attrs: Attributes,
    pub dtype: DataType,
}

impl Variable {
    /// Creates a variable, checking that the number of dimension names matches the array rank.
    pub fn new<S: Into<String>>(dims: Vec<S>, data: ArrayD<f64>) -> Result<Self> {
        let dims: Vec<String> = dims.into_iter().map(Into::into).collect();
        if dims.len() != data.ndim() {
            return Err(ChukError::ShapeMismatch(format!(
                "{} dimension names given for an array of rank {}",
                dims.len(),
                data.ndim()
            )));
        }
        Ok(Variable {
            dims,
            data,
            attrs: Attributes::new(),
            dtype: DataType::F64,
        })
    }

    /// 1-D coordinate variable over its own dimension.
    pub fn coordinate(name: &str, values: Array1<f64>) -> Self {
        Variable {
            dims: vec![name.to_string()],
            data: values.into_dyn(),
            attrs: Attributes::new(),
            dtype: DataType::F64,
        }
    }

    /// 2-D variable over `(y, x)`.
    pub fn grid(data: Array2<f64>) -> Self {
        Variable {
            dims: vec!["y".to_string(), "x".to_string()],
            data: data.into_dyn(),
            attrs: Attributes::new(),
            dtype: DataType::F64,
        }
    }

    /// Dimensionless variable holding a single value, as used for grid mappings.
    pub fn scalar(value: f64) -> Self {
        Variable {
            dims: vec![],
            data: ArrayD::from_elem(IxDyn(&[]), value),
            attrs: Attributes::new(),
            dtype: DataType::I32,
        }
    }

    pub fn with_attrs(mut self, attrs: Attributes) -> Self {
        self.attrs.extend(attrs);
        self
    }

    pub fn with_dtype(mut self, dtype: DataType) -> Self {
        self.dtype = dtype;
        self
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        self.attrs.get(name)
    }

    pub fn attr_str(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).and_then(AttrValue::as_str)
    }

    pub fn has_dim(&self, name: &str) -> bool {
        self.dims.iter().any(|d| d == name)
    }

    /// The variable viewed as a `(y, x)` grid, when its dimensions are exactly that.
    pub fn as_grid(&self) -> Result<ndarray::ArrayView2<'_, f64>> {
        if self.dims != ["y", "x"] {
            return Err(ChukError::ShapeMismatch(format!(
                "expected dimensions (y, x), found ({})",
                self.dims.join(", ")
            )));
        }
        Ok(self.data.view().into_dimensionality::<Ix2>()?)
    }

    /// The variable as a 1-D vector, when it has a single dimension.
    pub fn as_vector(&self) -> Result<ndarray::ArrayView1<'_, f64>> {
        Ok(self.data.view().into_dimensionality::<ndarray::Ix1>()?)
    }
}

/// A collection of variables sharing a dimension namespace, plus global attributes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    variables: BTreeMap<String, Variable>,
    pub attrs: Attributes,
}

impl Dataset {
    pub fn new() -> Self {
        Dataset::default()
    }

    pub fn with_attrs(attrs: Attributes) -> Self {
        Dataset {
            variables: BTreeMap::new(),
            attrs,
        }
    }

    /// Adds or replaces a variable. Its dimension lengths must agree with the lengths already
    /// established by the other variables.
    pub fn insert<S: Into<String>>(&mut self, name: S, variable: Variable) -> Result<()> {
        let name = name.into();
        for (dim, len) in variable.dims.iter().zip(variable.shape()) {
            let existing = self
                .variables
                .iter()
                .filter(|(other, _)| **other != name)
                .find_map(|(_, v)| dim_len_of(v, dim));
            if let Some(existing) = existing {
                if existing != *len {
                    return Err(ChukError::ShapeMismatch(format!(
                        "variable {name} has dimension {dim} of length {len}, dataset has {existing}"
                    )));
                }
            }
        }
        self.variables.insert(name, variable);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Option<Variable> {
        self.variables.remove(name)
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.get(name)
    }

    pub fn variable_mut(&mut self, name: &str) -> Option<&mut Variable> {
        self.variables.get_mut(name)
    }

    /// Like [`Dataset::variable`] but an absent variable is an error.
    pub fn require(&self, name: &str) -> Result<&Variable> {
        self.variables
            .get(name)
            .ok_or_else(|| ChukError::MissingVariable(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn variables(&self) -> impl Iterator<Item = (&String, &Variable)> {
        self.variables.iter()
    }

    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.variables.keys().map(String::as_str)
    }

    /// All dimensions with their lengths, derived from the variables.
    pub fn dimensions(&self) -> BTreeMap<String, usize> {
        let mut dims = BTreeMap::new();
        for v in self.variables.values() {
            for (d, len) in v.dims.iter().zip(v.shape()) {
                dims.entry(d.clone()).or_insert(*len);
            }
        }
        dims
    }

    pub fn dimension_len(&self, name: &str) -> Option<usize> {
        self.variables.values().find_map(|v| dim_len_of(v, name))
    }

    pub fn attr_str(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).and_then(AttrValue::as_str)
    }

    /// Names of variables referenced as grid mappings, plus any variable declaring a
    /// `grid_mapping_name`.
    pub fn grid_mapping_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .variables
            .values()
            .filter_map(|v| v.attr_str("grid_mapping"))
            .map(str::to_string)
            .collect();
        for (name, v) in &self.variables {
            if v.attrs.contains_key("grid_mapping_name") {
                names.push(name.clone());
            }
        }
        names.sort();
        names.dedup();
        names
    }

    /// Variables holding data: everything that is not a coordinate, lat/lon, bounds or grid
    /// mapping variable. Bounds are the fixed lat/lon names plus anything named by a `bounds`
    /// attribute.
    pub fn data_variables(&self) -> Vec<(&String, &Variable)> {
        let mappings = self.grid_mapping_names();
        let bounds: Vec<&str> = self
            .variables
            .values()
            .filter_map(|v| v.attr_str("bounds"))
            .collect();
        self.variables
            .iter()
            .filter(|(name, v)| {
                !COORDINATE_NAMES.contains(&name.as_str())
                    && !mappings.contains(name)
                    && !bounds.contains(&name.as_str())
                    && !v.dims.is_empty()
            })
            .collect()
    }
}

fn dim_len_of(v: &Variable, dim: &str) -> Option<usize> {
    v.dims
        .iter()
        .position(|d| d == dim)
        .map(|i| v.shape()[i])
}
