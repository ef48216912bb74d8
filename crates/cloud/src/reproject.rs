//! Regridding of downloaded scene bands onto the lon/lat analysis grid.
//!
//! Sentinel-2 assets are delivered in UTM (EPSG 326xx / 327xx). Each
//! analysis cell centre is projected forward into the source CRS with the
//! Snyder (USGS Prof. Paper 1395) transverse Mercator series and sampled
//! nearest-neighbour. Cells that fall off the source grid, or on source
//! no-data, come out NaN.

use vegchange_core::{GridLayout, Raster};

use crate::error::{ProviderError, Result};

const A: f64 = 6_378_137.0;
const F: f64 = 1.0 / 298.257_223_563;
const E2: f64 = 2.0 * F - F * F;
const EP2: f64 = E2 / (1.0 - E2);
const K0: f64 = 0.9996;
const FALSE_EASTING: f64 = 500_000.0;
const FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

/// Coordinate reference system of a source raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceCrs {
    /// EPSG:4326, already lon/lat
    Wgs84,
    /// WGS84 / UTM zone `zone`, northern or southern hemisphere
    Utm { zone: u32, north: bool },
}

impl SourceCrs {
    pub fn from_epsg(epsg: u32) -> Result<Self> {
        match epsg {
            4326 => Ok(Self::Wgs84),
            32601..=32660 => Ok(Self::Utm {
                zone: epsg - 32600,
                north: true,
            }),
            32701..=32760 => Ok(Self::Utm {
                zone: epsg - 32700,
                north: false,
            }),
            _ => Err(ProviderError::UnsupportedCrs(format!("EPSG:{epsg}"))),
        }
    }

    /// Project a lon/lat position (degrees) into this CRS.
    pub fn project(self, lon: f64, lat: f64) -> (f64, f64) {
        match self {
            Self::Wgs84 => (lon, lat),
            Self::Utm { zone, north } => lonlat_to_utm(lon, lat, zone, north),
        }
    }
}

/// Resample `src` onto `layout`, nearest-neighbour.
pub fn warp_to_layout(src: &Raster<f64>, crs: SourceCrs, layout: &GridLayout) -> Raster<f64> {
    let mut out: Raster<f64> = layout.masked();
    let (rows, cols) = layout.shape();

    for row in 0..rows {
        for col in 0..cols {
            let (lon, lat) = layout.transform.pixel_to_geo(col, row);
            let (x, y) = crs.project(lon, lat);
            let value = src
                .cell_at(x, y)
                .and_then(|(r, c)| src.valid_at(r, c))
                .unwrap_or(f64::NAN);
            out.data_mut()[(row, col)] = value;
        }
    }
    out
}

/// Lon/lat in degrees to UTM easting/northing in metres (Snyder 8-9, 8-10).
fn lonlat_to_utm(lon_deg: f64, lat_deg: f64, zone: u32, north: bool) -> (f64, f64) {
    let lat = lat_deg.to_radians();
    let central = ((zone as f64 - 1.0) * 6.0 - 177.0).to_radians();

    let (sin_lat, cos_lat) = lat.sin_cos();
    let tan_lat = lat.tan();

    let n = A / (1.0 - E2 * sin_lat * sin_lat).sqrt();
    let t = tan_lat * tan_lat;
    let c = EP2 * cos_lat * cos_lat;
    let a = cos_lat * (lon_deg.to_radians() - central);
    let (a2, a3) = (a * a, a * a * a);
    let (a4, a5, a6) = (a3 * a, a3 * a2, a3 * a3);

    let easting = FALSE_EASTING
        + K0 * n
            * (a + (1.0 - t + c) * a3 / 6.0
                + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * EP2) * a5 / 120.0);

    let northing = K0
        * (meridian_arc(lat)
            + n * tan_lat
                * (a2 / 2.0
                    + (5.0 - t + 9.0 * c + 4.0 * c * c) * a4 / 24.0
                    + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * EP2) * a6 / 720.0));

    if north {
        (easting, northing)
    } else {
        (easting, northing + FALSE_NORTHING_SOUTH)
    }
}

/// Distance along the meridian from the equator (Snyder 3-21)
fn meridian_arc(lat: f64) -> f64 {
    let e4 = E2 * E2;
    let e6 = e4 * E2;
    A * ((1.0 - E2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * lat
        - (3.0 * E2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * lat).sin()
        + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * lat).sin()
        - (35.0 * e6 / 3072.0) * (6.0 * lat).sin())
}
