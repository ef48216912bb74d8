//! Three-way change classification
//!
//! Thresholds a change raster into decrease / no change / increase.
//! Values equal to a threshold fall into "no change".

use serde::{Deserialize, Serialize};

use crate::maybe_rayon::*;
use vegchange_core::{ChangeClass, ChangeRaster, ClassifiedRaster, Error, Result};

/// Threshold parameters for [`classify`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassifyParams {
    /// Values strictly below this are a decrease
    pub decrease_threshold: f64,
    /// Values strictly above this are an increase
    pub increase_threshold: f64,
}

impl Default for ClassifyParams {
    fn default() -> Self {
        Self {
            decrease_threshold: -0.1,
            increase_threshold: 0.1,
        }
    }
}

impl ClassifyParams {
    pub fn new(decrease_threshold: f64, increase_threshold: f64) -> Result<Self> {
        let params = Self {
            decrease_threshold,
            increase_threshold,
        };
        params.validate()?;
        Ok(params)
    }

    /// Thresholds must be finite and ordered (`decrease <= increase`)
    pub fn validate(&self) -> Result<()> {
        let (d, i) = (self.decrease_threshold, self.increase_threshold);
        if !d.is_finite() || !i.is_finite() {
            return Err(Error::InvalidParameter {
                name: "thresholds",
                value: format!("({d}, {i})"),
                reason: "thresholds must be finite".into(),
            });
        }
        if d > i {
            return Err(Error::InvalidParameter {
                name: "thresholds",
                value: format!("({d}, {i})"),
                reason: "decrease threshold is above increase threshold".into(),
            });
        }
        Ok(())
    }

    /// Class of a single change value
    #[inline]
    pub fn class_of(&self, value: f64) -> ChangeClass {
        if value < self.decrease_threshold {
            ChangeClass::Decrease
        } else if value > self.increase_threshold {
            ChangeClass::Increase
        } else {
            ChangeClass::NoChange
        }
    }
}

/// Classify every valid pixel of a change raster.
///
/// Masked pixels stay masked ([`ClassifiedRaster::NODATA`]), so the output
/// mask is identical to the input mask.
pub fn classify(change: &ChangeRaster, params: ClassifyParams) -> Result<ClassifiedRaster> {
    params.validate()?;

    let raster = change.raster();
    let (rows, cols) = raster.shape();

    let data: Vec<u8> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![ClassifiedRaster::NODATA; cols];
            for col in 0..cols {
                let v = unsafe { raster.get_unchecked(row, col) };
                if raster.is_nodata(v) {
                    continue;
                }
                row_data[col] = params.class_of(v).code();
            }
            row_data
        })
        .collect();

    Ok(ClassifiedRaster::new(raster.derive(data)?, change.scale_m()))
}
