//! Error types for the TWI pipeline

use thiserror::Error;

/// Main error type for raster and pipeline operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Grid shape or cell size cannot support terrain analysis
    #[error("Invalid grid: {0}")]
    InvalidGrid(String),

    /// The DEM has no valid cells at all
    #[error("Grid contains no valid cells (every cell is nodata)")]
    AllNodata,

    /// A non-finite value outside the nodata mask
    #[error("Non-finite value {value} at ({row}, {col}) outside the nodata mask")]
    NumericAnomaly { row: usize, col: usize, value: f64 },

    /// Following flow directions from this cell returns to a visited cell
    #[error("Flow graph contains a cycle reachable from ({row}, {col})")]
    CycleDetected { row: usize, col: usize },

    /// A flow edge runs against the decreasing-elevation order without forming a cycle
    #[error("Flow edge from ({row}, {col}) does not descend in elevation order")]
    FlowOrderViolation { row: usize, col: usize },

    /// A direction code is unknown or points off-grid / into nodata
    #[error("Invalid flow direction code {code} at ({row}, {col})")]
    InvalidFlowDirection { row: usize, col: usize, code: u8 },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0}")]
    Other(String),
}

/// Result type alias for raster and pipeline operations
pub type Result<T> = std::result::Result<T, Error>;
