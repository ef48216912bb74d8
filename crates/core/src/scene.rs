//! Source scenes feeding a composite

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::raster::Raster;

/// Catalog metadata of one acquisition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneMeta {
    pub id: String,
    pub datetime: DateTime<Utc>,
    /// Scene-level cloud cover percentage, if the catalog reports it
    pub cloud_cover: Option<f64>,
    /// Footprint bounding box `[west, south, east, north]`
    pub bbox: Option<[f64; 4]>,
    /// EPSG code of the scene's native grid
    pub epsg: Option<u32>,
}

/// A materialized scene: its metadata plus the requested bands resampled
/// onto the run's analysis grid (NaN outside the scene footprint).
#[derive(Debug, Clone)]
pub struct Scene {
    pub meta: SceneMeta,
    pub bands: BTreeMap<String, Raster<f64>>,
}

impl Scene {
    pub fn new(meta: SceneMeta) -> Self {
        Self {
            meta,
            bands: BTreeMap::new(),
        }
    }

    /// Builder-style band insertion
    pub fn with_band(mut self, name: impl Into<String>, raster: Raster<f64>) -> Self {
        self.bands.insert(name.into(), raster);
        self
    }

    pub fn band(&self, name: &str) -> Option<&Raster<f64>> {
        self.bands.get(name)
    }
}
