//! Change magnitude and change-class rasters

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;
use crate::raster::Raster;

/// Ordinal three-way change category.
///
/// The discriminant is the value stored in a [`ClassifiedRaster`] and the
/// row/column index in a confusion matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeClass {
    Decrease = 0,
    NoChange = 1,
    Increase = 2,
}

impl ChangeClass {
    /// Number of classes
    pub const COUNT: usize = 3;

    /// All classes in code order
    pub const ALL: [ChangeClass; 3] = [Self::Decrease, Self::NoChange, Self::Increase];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Decrease),
            1 => Some(Self::NoChange),
            2 => Some(Self::Increase),
            _ => None,
        }
    }

    /// Ground-truth vocabulary label
    pub fn label(self) -> &'static str {
        match self {
            Self::Decrease => "decrease",
            Self::NoChange => "no change",
            Self::Increase => "increase",
        }
    }

    /// Map a ground-truth label onto a class; anything outside the fixed
    /// vocabulary is `None`.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "decrease" => Some(Self::Decrease),
            "no change" => Some(Self::NoChange),
            "increase" => Some(Self::Increase),
            _ => None,
        }
    }
}

impl fmt::Display for ChangeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Signed per-pixel difference `after - before` of one band.
///
/// Valid only where both inputs were valid.
#[derive(Debug, Clone)]
pub struct ChangeRaster {
    index: String,
    raster: Raster<f64>,
    scale_m: f64,
}

impl ChangeRaster {
    pub fn new(index: impl Into<String>, raster: Raster<f64>, scale_m: f64) -> Self {
        Self {
            index: index.into(),
            raster,
            scale_m,
        }
    }

    /// Name of the band the difference was taken on (e.g. `NDRE1`)
    pub fn index(&self) -> &str {
        &self.index
    }

    /// Output band name, e.g. `NDRE1_Change`
    pub fn band_name(&self) -> String {
        format!("{}_Change", self.index)
    }

    pub fn raster(&self) -> &Raster<f64> {
        &self.raster
    }

    pub fn into_raster(self) -> Raster<f64> {
        self.raster
    }

    pub fn scale_m(&self) -> f64 {
        self.scale_m
    }
}

/// Integer raster of [`ChangeClass`] codes. Masked cells hold
/// [`ClassifiedRaster::NODATA`].
#[derive(Debug, Clone)]
pub struct ClassifiedRaster {
    raster: Raster<u8>,
    scale_m: f64,
}

impl ClassifiedRaster {
    pub const NODATA: u8 = u8::MAX;
    pub const BAND_NAME: &'static str = "change_class";

    /// Wrap a `u8` raster; the no-data value is forced to [`Self::NODATA`].
    pub fn new(mut raster: Raster<u8>, scale_m: f64) -> Self {
        raster.set_nodata(Some(Self::NODATA));
        Self { raster, scale_m }
    }

    pub fn raster(&self) -> &Raster<u8> {
        &self.raster
    }

    /// Native ground resolution in metres
    pub fn scale_m(&self) -> f64 {
        self.scale_m
    }

    pub fn shape(&self) -> (usize, usize) {
        self.raster.shape()
    }

    /// Class at (row, col), `None` if masked or out of the grid
    pub fn class_at(&self, row: usize, col: usize) -> Option<ChangeClass> {
        self.raster.valid_at(row, col).and_then(ChangeClass::from_code)
    }

    /// Class of the cell containing the geographic point
    pub fn class_at_point(&self, x: f64, y: f64) -> Option<ChangeClass> {
        let (row, col) = self.raster.cell_at(x, y)?;
        self.class_at(row, col)
    }

    /// Count of valid cells per class, indexed by class code
    pub fn class_counts(&self) -> [usize; ChangeClass::COUNT] {
        let mut counts = [0usize; ChangeClass::COUNT];
        for &v in self.raster.data().iter() {
            if let Some(c) = ChangeClass::from_code(v) {
                counts[c.index()] += 1;
            }
        }
        counts
    }

    /// The classes as a float raster (NaN where masked), for export
    pub fn to_f64(&self) -> Result<Raster<f64>> {
        let data: Vec<f64> = self
            .raster
            .data()
            .iter()
            .map(|&v| if v == Self::NODATA { f64::NAN } else { v as f64 })
            .collect();
        self.raster.derive(data)
    }

    /// Rebuild from a float raster of class codes, as read back from a
    /// GeoTIFF written with [`Self::to_f64`]. Values that are not a class
    /// code become masked.
    pub fn from_f64(raster: &Raster<f64>, scale_m: f64) -> Result<Self> {
        let data: Vec<u8> = raster
            .data()
            .iter()
            .map(|&v| {
                if raster.is_nodata(v) || v.fract() != 0.0 || !(0.0..3.0).contains(&v) {
                    Self::NODATA
                } else {
                    v as u8
                }
            })
            .collect();
        Ok(Self::new(raster.derive(data)?, scale_m))
    }
}
