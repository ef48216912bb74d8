//! # vegchange core
//!
//! Core types and I/O for vegetation change detection.
//!
//! This crate provides:
//! - `Raster<T>`: Generic raster grid type with NaN / sentinel no-data
//! - `GeoTransform` and `GridLayout`: georeferencing of analysis grids
//! - `Composite`: named multi-band raster for one study area and date window
//! - `ChangeRaster` / `ClassifiedRaster`: change magnitude and its three-way classes
//! - `StudyArea`, `DateWindow`, `Scene`, `ReferencePoint`: the rest of the data model
//! - I/O for GeoTIFF rasters, GeoJSON vectors and CSV point tables

pub mod change;
pub mod composite;
pub mod error;
pub mod io;
pub mod raster;
pub mod scene;
pub mod time;
pub mod vector;

pub use change::{ChangeClass, ChangeRaster, ClassifiedRaster};
pub use composite::Composite;
pub use error::{Error, Result};
pub use raster::{GeoTransform, GridLayout, Raster, RasterElement};
pub use scene::{Scene, SceneMeta};
pub use time::DateWindow;
pub use vector::{Provenance, ReferencePoint, ReferenceSet, StudyArea};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::change::{ChangeClass, ChangeRaster, ClassifiedRaster};
    pub use crate::composite::Composite;
    pub use crate::error::{Error, Result};
    pub use crate::raster::{GeoTransform, GridLayout, Raster, RasterElement};
    pub use crate::scene::{Scene, SceneMeta};
    pub use crate::time::DateWindow;
    pub use crate::vector::{Provenance, ReferencePoint, ReferenceSet, StudyArea};
}
