//! Imagery algorithms for change detection
//!
//! - Compositing: scene filtering, SCL cloud masking, per-pixel median
//! - Spectral indices: generic normalized difference, NDRE1 and NDVI presets
//! - Change detection: per-band difference between two composites
//! - Classification: decrease / no change / increase thresholds

mod change_detection;
mod classify;
mod composite;
mod indices;

pub use change_detection::{band_difference, compute_change};
pub use classify::{classify, ClassifyParams};
pub use composite::{build_composite, select_scenes, CompositeParams};
pub use indices::{add_index, add_spectral_index, normalized_difference, SpectralIndex};
