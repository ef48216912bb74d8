//! Normalized-difference spectral indices
//!
//! Indices are derived per pixel from two bands of a composite and added
//! to a copy of it as a new named band.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::maybe_rayon::*;
use vegchange_core::raster::Raster;
use vegchange_core::{Composite, Error, Result};

/// Index presets with their Sentinel-2 band pairs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpectralIndex {
    /// Normalized Difference Red Edge 1: `(B8 - B5) / (B8 + B5)`
    NDRE1,
    /// Normalized Difference Vegetation Index: `(B8 - B4) / (B8 + B4)`
    NDVI,
}

impl SpectralIndex {
    pub fn name(self) -> &'static str {
        match self {
            Self::NDRE1 => "NDRE1",
            Self::NDVI => "NDVI",
        }
    }

    /// `(positive, negative)` band names
    pub fn bands(self) -> (&'static str, &'static str) {
        match self {
            Self::NDRE1 => ("B8", "B5"),
            Self::NDVI => ("B8", "B4"),
        }
    }
}

impl fmt::Display for SpectralIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SpectralIndex {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "NDRE1" | "NDRE" => Ok(Self::NDRE1),
            "NDVI" => Ok(Self::NDVI),
            _ => Err(Error::InvalidParameter {
                name: "index",
                value: s.to_string(),
                reason: "expected NDRE1 or NDVI".into(),
            }),
        }
    }
}

/// Compute the normalized difference between two bands:
///
/// `(band_a - band_b) / (band_a + band_b)`
///
/// Pixels where `band_a + band_b` is zero or either band is no-data are
/// set to NaN. Swapping the bands negates every defined value.
pub fn normalized_difference(band_a: &Raster<f64>, band_b: &Raster<f64>) -> Result<Raster<f64>> {
    band_a.ensure_same_shape(band_b)?;

    let (rows, cols) = band_a.shape();

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            for col in 0..cols {
                let a = unsafe { band_a.get_unchecked(row, col) };
                let b = unsafe { band_b.get_unchecked(row, col) };

                if band_a.is_nodata(a) || band_b.is_nodata(b) {
                    continue;
                }

                let sum = a + b;
                if sum.abs() < 1e-10 {
                    continue; // Avoid division by zero
                }

                row_data[col] = (a - b) / sum;
            }
            row_data
        })
        .collect();

    band_a.derive(data)
}

/// Return a copy of `composite` with `name = (band_a - band_b) / (band_a + band_b)`
/// added. The input composite is left untouched.
pub fn add_index(composite: &Composite, band_a: &str, band_b: &str, name: &str) -> Result<Composite> {
    let a = composite.band(band_a)?;
    let b = composite.band(band_b)?;
    let index = normalized_difference(a, b)?;
    composite.with_band(name, index)
}

/// [`add_index`] for a preset
pub fn add_spectral_index(composite: &Composite, index: SpectralIndex) -> Result<Composite> {
    let (a, b) = index.bands();
    add_index(composite, a, b, index.name())
}
