//! Analysis grid shared by every raster of one study-area run

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use crate::vector::StudyArea;

/// Metres per degree of latitude (WGS84 mean).
const METERS_PER_DEG_LAT: f64 = 110_574.0;
/// Metres per degree of longitude at the equator (WGS84).
const METERS_PER_DEG_LON: f64 = 111_320.0;

/// Shape, georeferencing and ground resolution of an analysis grid.
///
/// All composites, change rasters and classified rasters of one run share
/// a single layout, which is what makes per-pixel arithmetic between the
/// two date windows meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridLayout {
    pub transform: GeoTransform,
    pub rows: usize,
    pub cols: usize,
    /// Nominal ground sampling distance in metres
    pub scale_m: f64,
}

impl GridLayout {
    pub fn new(transform: GeoTransform, rows: usize, cols: usize, scale_m: f64) -> Self {
        Self {
            transform,
            rows,
            cols,
            scale_m,
        }
    }

    /// Build a north-up geographic (lon/lat) grid covering the study area's
    /// bounding box at roughly `scale_m` metres per cell.
    ///
    /// Degrees-per-metre are evaluated at the area's central latitude.
    pub fn covering(area: &StudyArea, scale_m: f64) -> Result<Self> {
        if !(scale_m.is_finite() && scale_m > 0.0) {
            return Err(Error::InvalidParameter {
                name: "scale",
                value: scale_m.to_string(),
                reason: "must be a positive number of metres".into(),
            });
        }

        let (min_x, min_y, max_x, max_y) = area.bounds();
        let mid_lat = ((min_y + max_y) / 2.0).to_radians();
        let deg_x = scale_m / (METERS_PER_DEG_LON * mid_lat.cos().max(1e-6));
        let deg_y = scale_m / METERS_PER_DEG_LAT;

        let cols = (((max_x - min_x) / deg_x).ceil() as usize).max(1);
        let rows = (((max_y - min_y) / deg_y).ceil() as usize).max(1);

        Ok(Self {
            transform: GeoTransform::new(min_x, max_y, deg_x, -deg_y),
            rows,
            cols,
            scale_m,
        })
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// A raster on this grid with every cell masked
    pub fn masked<T: RasterElement>(&self) -> Raster<T> {
        let mut raster = Raster::masked(self.rows, self.cols);
        raster.set_transform(self.transform);
        raster
    }

    /// Whether `raster` lies on this grid (same shape and transform)
    pub fn matches<T: RasterElement>(&self, raster: &Raster<T>) -> bool {
        raster.shape() == self.shape() && *raster.transform() == self.transform
    }
}
