//! Error types for CHUK dataset operations.

use thiserror::Error;

use crate::check::CheckReport;

/// Result type for CHUK operations.
pub type Result<T> = std::result::Result<T, ChukError>;

/// Error types for loading, checking, building and exporting CHUK datasets.
#[derive(Error, Debug)]
pub enum ChukError {
    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// NetCDF library error
    #[error("NetCDF error: {0}")]
    NetCdf(#[from] netcdf::Error),

    /// GDAL library error
    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid mask pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    /// Missing variable in a dataset
    #[error("missing variable: {0}")]
    MissingVariable(String),

    /// Missing dimension in a dataset
    #[error("missing dimension: {0}")]
    MissingDimension(String),

    /// Array or dimension sizes do not agree
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// File suffix is not a supported format
    #[error("unsupported format for {path}, supported suffixes are {supported}")]
    UnsupportedFormat { path: String, supported: String },

    /// Reference grid is malformed or lacks required content
    #[error("invalid grid: {0}")]
    InvalidGrid(String),

    /// Attribute values that cannot be interpreted
    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),

    /// Mask construction or combination error
    #[error("invalid mask: {0}")]
    InvalidMask(String),

    /// Invalid caller-supplied argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Dataset failed validation against the reference grid
    #[error("dataset failed CHUK checks with {} error(s): {}", .0.errors.len(), .0.summary())]
    CheckFailed(Box<CheckReport>),
}
