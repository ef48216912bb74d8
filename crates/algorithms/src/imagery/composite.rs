//! Cloud-masked median compositing
//!
//! Scenes are filtered by acquisition window, footprint and scene-level
//! cloud cover, then masked per pixel with the scene classification layer
//! (SCL) and reduced to a per-pixel median. The result is clipped to the
//! study area.

use serde::{Deserialize, Serialize};

use crate::clip::area_mask;
use crate::maybe_rayon::*;
use vegchange_core::raster::{GridLayout, Raster};
use vegchange_core::{Composite, DateWindow, Error, Result, Scene, StudyArea};

/// Parameters for [`build_composite`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeParams {
    /// Scenes must report cloud cover strictly below this percentage
    pub max_cloud_cover: f64,
    /// Name of the scene classification band
    pub scl_band: String,
    /// SCL classes masked out: 3 cloud shadow, 8/9 cloud medium/high
    /// probability, 10 thin cirrus
    pub excluded_scl_classes: Vec<u8>,
}

impl Default for CompositeParams {
    fn default() -> Self {
        Self {
            max_cloud_cover: 20.0,
            scl_band: "SCL".to_string(),
            excluded_scl_classes: vec![3, 8, 9, 10],
        }
    }
}

impl CompositeParams {
    fn scl_required(&self) -> bool {
        !self.excluded_scl_classes.is_empty()
    }

    /// Whether an SCL cell value masks the pixel
    fn is_excluded(&self, scl: f64) -> bool {
        if !scl.is_finite() {
            return true;
        }
        let class = scl.round();
        (0.0..=255.0).contains(&class) && self.excluded_scl_classes.contains(&(class as u8))
    }
}

fn bbox_overlaps(bbox: &[f64; 4], area: &StudyArea) -> bool {
    let (min_x, min_y, max_x, max_y) = area.bounds();
    bbox[0] <= max_x && bbox[2] >= min_x && bbox[1] <= max_y && bbox[3] >= min_y
}

/// Scenes usable for `window` over `area`, ordered by acquisition time.
///
/// A scene is kept when its acquisition falls inside the window, its
/// footprint (if known) overlaps the area, and it reports a cloud cover
/// below `params.max_cloud_cover`. Scenes without cloud-cover metadata
/// are dropped.
pub fn select_scenes<'a>(
    scenes: &'a [Scene],
    area: &StudyArea,
    window: &DateWindow,
    params: &CompositeParams,
) -> Vec<&'a Scene> {
    let mut selected: Vec<&Scene> = scenes
        .iter()
        .filter(|s| window.contains(s.meta.datetime))
        .filter(|s| s.meta.bbox.as_ref().is_none_or(|b| bbox_overlaps(b, area)))
        .filter(|s| s.meta.cloud_cover.is_some_and(|cc| cc < params.max_cloud_cover))
        .collect();
    selected.sort_by(|a, b| {
        a.meta
            .datetime
            .cmp(&b.meta.datetime)
            .then_with(|| a.meta.id.cmp(&b.meta.id))
    });
    selected
}

fn require_band<'a>(scene: &'a Scene, name: &str, layout: &GridLayout) -> Result<&'a Raster<f64>> {
    let raster = scene.band(name).ok_or_else(|| Error::UnknownBand {
        band: name.to_string(),
        available: scene
            .bands
            .keys()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", "),
    })?;
    if !layout.matches(raster) {
        let (ar, ac) = raster.shape();
        return Err(Error::SizeMismatch {
            er: layout.rows,
            ec: layout.cols,
            ar,
            ac,
        });
    }
    Ok(raster)
}

/// Median of a non-empty buffer; even lengths average the two middle values
fn median(values: &mut [f64]) -> f64 {
    values.sort_unstable_by(|a, b| a.total_cmp(b));
    let n = values.len();
    if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    }
}

/// Build a median composite of `bands` over `area` for `window`.
///
/// A pixel of a scene contributes only if its SCL class is not excluded
/// and every requested band is valid there, so all output bands share one
/// mask. Pixels outside the area are masked. When no scene passes the
/// filters the result is [`Composite::empty`], not an error.
pub fn build_composite<S: AsRef<str>>(
    area: &StudyArea,
    window: &DateWindow,
    layout: &GridLayout,
    scenes: &[Scene],
    bands: &[S],
    params: &CompositeParams,
) -> Result<Composite> {
    if bands.is_empty() {
        return Err(Error::InvalidParameter {
            name: "bands",
            value: "[]".into(),
            reason: "at least one band must be requested".into(),
        });
    }
    if !(params.max_cloud_cover.is_finite() && params.max_cloud_cover >= 0.0) {
        return Err(Error::InvalidParameter {
            name: "max_cloud_cover",
            value: params.max_cloud_cover.to_string(),
            reason: "must be a non-negative percentage".into(),
        });
    }

    let selected = select_scenes(scenes, area, window, params);
    if selected.is_empty() {
        return Ok(Composite::empty(window.clone(), *layout, bands));
    }

    // Resolve every input raster up front so lookup errors surface before
    // any pixel work.
    let mut stack: Vec<(Option<&Raster<f64>>, Vec<&Raster<f64>>)> = Vec::with_capacity(selected.len());
    for scene in &selected {
        let scl = if params.scl_required() {
            Some(require_band(scene, &params.scl_band, layout)?)
        } else {
            None
        };
        let rasters = bands
            .iter()
            .map(|b| require_band(scene, b.as_ref(), layout))
            .collect::<Result<Vec<_>>>()?;
        stack.push((scl, rasters));
    }

    let inside = area_mask(area, layout);
    let (rows, cols) = layout.shape();
    let nb = bands.len();

    // One band-major buffer (nb * cols) per row
    let reduced: Vec<Vec<f64>> = (0..rows)
        .into_par_iter()
        .map(|row| {
            let mut out = vec![f64::NAN; nb * cols];
            let mut samples: Vec<Vec<f64>> = vec![Vec::with_capacity(stack.len()); nb];
            let mut pixel: Vec<f64> = Vec::with_capacity(nb);

            for col in 0..cols {
                if !inside[row * cols + col] {
                    continue;
                }
                samples.iter_mut().for_each(Vec::clear);

                'scenes: for (scl, rasters) in &stack {
                    if let Some(scl) = scl {
                        let class = unsafe { scl.get_unchecked(row, col) };
                        if params.is_excluded(class) {
                            continue;
                        }
                    }
                    pixel.clear();
                    for r in rasters {
                        let v = unsafe { r.get_unchecked(row, col) };
                        if r.is_nodata(v) {
                            continue 'scenes;
                        }
                        pixel.push(v);
                    }
                    for (s, &v) in samples.iter_mut().zip(&pixel) {
                        s.push(v);
                    }
                }

                if samples[0].is_empty() {
                    continue;
                }
                for (b, s) in samples.iter_mut().enumerate() {
                    out[b * cols + col] = median(s);
                }
            }
            out
        })
        .collect();

    let mut composite = Composite::new(window.clone(), *layout, selected.len());
    for (b, name) in bands.iter().enumerate() {
        let data: Vec<f64> = reduced
            .iter()
            .flat_map(|r| r[b * cols..(b + 1) * cols].iter().copied())
            .collect();
        let mut raster = Raster::from_vec(data, rows, cols)?;
        raster.set_transform(layout.transform);
        raster.set_nodata(Some(f64::NAN));
        composite.insert_band(name.as_ref(), raster)?;
    }

    Ok(composite)
}
