//! Error types for vegchange

use thiserror::Error;

/// Main error type for vegchange core operations.
///
/// Every variant here is an input error: it is fatal for the study area
/// that raised it and is never retried. Missing data (no scenes, no valid
/// pixels, no surviving points) is not an error and is reported through
/// empty results instead.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("Invalid study area geometry '{name}': {reason}")]
    InvalidGeometry { name: String, reason: String },

    #[error("Invalid date window {year}-{start}..{year}-{end}: {reason}")]
    InvalidDateWindow {
        year: i32,
        start: String,
        end: String,
        reason: String,
    },

    #[error("Date windows out of order: before window ends {before_end}, after window starts {after_start}")]
    WindowOrder {
        before_end: String,
        after_start: String,
    },

    #[error("Unknown band '{band}' (available: {available})")]
    UnknownBand { band: String, available: String },

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("GeoJSON error: {0}")]
    GeoJson(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("{0}")]
    Other(String),
}

impl From<geojson::Error> for Error {
    fn from(e: geojson::Error) -> Self {
        Error::GeoJson(e.to_string())
    }
}

/// Result type alias for vegchange core operations
pub type Result<T> = std::result::Result<T, Error>;
