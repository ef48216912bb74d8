//! Summary statistics of change rasters
//!
//! - **histogram**: fixed-width, auto-ranged histogram of change values

pub mod histogram;

pub use histogram::{change_histogram, Histogram, HistogramParams};
