//! Restricting rasters to a study area
//!
//! A cell belongs to the area when its center lies inside (or on the
//! boundary of) the area geometry.

use crate::maybe_rayon::*;
use vegchange_core::raster::GridLayout;
use vegchange_core::StudyArea;

/// Row-major inside/outside flags for every cell of `layout`
pub fn area_mask(area: &StudyArea, layout: &GridLayout) -> Vec<bool> {
    let (rows, cols) = layout.shape();
    let (min_x, min_y, max_x, max_y) = area.bounds();
    let gt = layout.transform;

    (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_mask = vec![false; cols];
            for (col, inside) in row_mask.iter_mut().enumerate() {
                let (x, y) = gt.pixel_to_geo(col, row);
                if x < min_x || x > max_x || y < min_y || y > max_y {
                    continue;
                }
                *inside = area.contains(x, y);
            }
            row_mask
        })
        .collect()
}
