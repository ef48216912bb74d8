//! # vegchange algorithms
//!
//! Pure, synchronous steps of a change-detection run. Every function
//! takes already-materialized rasters and returns new values; nothing here
//! performs I/O or logs.
//!
//! ## Modules
//!
//! - **imagery**: median compositing, normalized-difference indices,
//!   change detection, three-way classification
//! - **sampling**: seeded stratified sampling of reference points
//! - **validation**: point extraction, confusion matrix, accuracy metrics
//! - **statistics**: change histogram
//! - **clip**: study-area masks

pub mod clip;
pub mod imagery;
pub(crate) mod maybe_rayon;
pub mod sampling;
pub mod statistics;
pub mod validation;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::clip::area_mask;
    pub use crate::imagery::{
        add_index, add_spectral_index, band_difference, build_composite, classify,
        compute_change, normalized_difference, select_scenes, ClassifyParams, CompositeParams,
        SpectralIndex,
    };
    pub use crate::sampling::{stratified_sample, StratifiedParams};
    pub use crate::statistics::{change_histogram, Histogram, HistogramParams};
    pub use crate::validation::{
        extract_at_points, validate, AccuracyReport, ConfusionMatrix, ValidationOutcome,
    };
    pub use vegchange_core::prelude::*;
}
