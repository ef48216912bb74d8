//! Change detection between two composites
//!
//! `change = after - before` per pixel, valid only where both inputs are.
//! Positive values mean the band increased.

use crate::maybe_rayon::*;
use vegchange_core::raster::Raster;
use vegchange_core::{ChangeRaster, Composite, Error, Result};

/// Per-pixel difference `after - before` of two rasters on the same grid.
///
/// Cells that are no-data in either input are NaN in the output.
pub fn band_difference(before: &Raster<f64>, after: &Raster<f64>) -> Result<Raster<f64>> {
    before.ensure_same_shape(after)?;

    let (rows, cols) = before.shape();

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            for col in 0..cols {
                let b = unsafe { before.get_unchecked(row, col) };
                let a = unsafe { after.get_unchecked(row, col) };

                if before.is_nodata(b) || after.is_nodata(a) {
                    continue;
                }
                row_data[col] = a - b;
            }
            row_data
        })
        .collect();

    before.derive(data)
}

/// Signed change of band `index` between two composites.
///
/// Both composites must share one analysis grid. Window ordering is not
/// checked here; swapping the arguments negates the result.
pub fn compute_change(before: &Composite, after: &Composite, index: &str) -> Result<ChangeRaster> {
    if before.layout() != after.layout() {
        let (er, ec) = before.layout().shape();
        let (ar, ac) = after.layout().shape();
        if (er, ec) != (ar, ac) {
            return Err(Error::SizeMismatch { er, ec, ar, ac });
        }
        return Err(Error::InvalidParameter {
            name: "layout",
            value: format!("{:?}", after.layout().transform),
            reason: "composites are not on the same analysis grid".into(),
        });
    }

    let diff = band_difference(before.band(index)?, after.band(index)?)?;
    Ok(ChangeRaster::new(index, diff, before.layout().scale_m))
}
