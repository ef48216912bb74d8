//! Multi-band composite for one study area and one date window

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::raster::{GridLayout, Raster};
use crate::time::DateWindow;

/// A temporally reduced, masked, named-band raster.
///
/// Every band lies on the same [`GridLayout`]. Cells that were masked
/// (cloud, shadow, outside the study area, no scenes) are NaN in every
/// band, never zero.
#[derive(Debug, Clone)]
pub struct Composite {
    window: DateWindow,
    layout: GridLayout,
    bands: BTreeMap<String, Raster<f64>>,
    scene_count: usize,
}

impl Composite {
    /// A composite with no bands yet
    pub fn new(window: DateWindow, layout: GridLayout, scene_count: usize) -> Self {
        Self {
            window,
            layout,
            bands: BTreeMap::new(),
            scene_count,
        }
    }

    /// A fully masked composite carrying the requested band names.
    ///
    /// This is what an area/window with no usable scenes produces.
    pub fn empty<S: AsRef<str>>(window: DateWindow, layout: GridLayout, bands: &[S]) -> Self {
        let bands = bands
            .iter()
            .map(|b| (b.as_ref().to_string(), layout.masked::<f64>()))
            .collect();
        Self {
            window,
            layout,
            bands,
            scene_count: 0,
        }
    }

    pub fn window(&self) -> &DateWindow {
        &self.window
    }

    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    /// Number of scenes that contributed to the reduction
    pub fn scene_count(&self) -> usize {
        self.scene_count
    }

    /// Look up a band by name
    pub fn band(&self, name: &str) -> Result<&Raster<f64>> {
        self.bands.get(name).ok_or_else(|| Error::UnknownBand {
            band: name.to_string(),
            available: self.band_names().join(", "),
        })
    }

    pub fn has_band(&self, name: &str) -> bool {
        self.bands.contains_key(name)
    }

    /// Band names in sorted order
    pub fn band_names(&self) -> Vec<&str> {
        self.bands.keys().map(String::as_str).collect()
    }

    /// Insert (or replace) a band. The raster must lie on the composite's grid.
    pub fn insert_band(&mut self, name: impl Into<String>, raster: Raster<f64>) -> Result<()> {
        if !self.layout.matches(&raster) {
            return Err(Error::SizeMismatch {
                er: self.layout.rows,
                ec: self.layout.cols,
                ar: raster.rows(),
                ac: raster.cols(),
            });
        }
        self.bands.insert(name.into(), raster);
        Ok(())
    }

    /// A copy of this composite with one more band; `self` is untouched.
    pub fn with_band(&self, name: impl Into<String>, raster: Raster<f64>) -> Result<Self> {
        let mut out = self.clone();
        out.insert_band(name, raster)?;
        Ok(out)
    }

    /// Whether no band holds a single valid pixel ("no data for this area/window")
    pub fn is_empty(&self) -> bool {
        self.bands.values().all(|b| b.valid_count() == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::GeoTransform;

    fn layout() -> GridLayout {
        GridLayout::new(GeoTransform::new(0.0, 4.0, 1.0, -1.0), 4, 4, 30.0)
    }

    fn window() -> DateWindow {
        DateWindow::new(2019, "04-15", "06-15").unwrap()
    }

    #[test]
    fn empty_composite_is_fully_masked() {
        let c = Composite::empty(window(), layout(), &["B5", "B8"]);
        assert!(c.is_empty());
        assert_eq!(c.band_names(), vec!["B5", "B8"]);
        assert!(c.band("B8").unwrap().get(0, 0).unwrap().is_nan());
    }

    #[test]
    fn unknown_band_is_an_input_error() {
        let c = Composite::empty(window(), layout(), &["B5"]);
        let err = c.band("B12").unwrap_err();
        assert!(matches!(err, Error::UnknownBand { .. }));
        assert!(err.to_string().contains("B5"));
    }

    #[test]
    fn with_band_leaves_original_untouched() {
        let c = Composite::new(window(), layout(), 1);
        let mut band = layout().masked::<f64>();
        band.set(0, 0, 0.3).unwrap();

        let augmented = c.with_band("NDRE1", band).unwrap();
        assert!(!c.has_band("NDRE1"));
        assert!(augmented.has_band("NDRE1"));
        assert!(!augmented.is_empty());
    }

    #[test]
    fn band_off_grid_rejected() {
        let mut c = Composite::new(window(), layout(), 1);
        assert!(c.insert_band("B5", Raster::filled(3, 3, 0.1)).is_err());
    }
}
