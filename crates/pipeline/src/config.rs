//! Run configuration
//!
//! Every option a run recognises, with its default. Loaded from JSON;
//! unknown keys are rejected so a typo never silently falls back to a
//! default.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use vegchange_algorithms::imagery::{ClassifyParams, CompositeParams};
use vegchange_algorithms::sampling::StratifiedParams;
use vegchange_algorithms::statistics::HistogramParams;
use vegchange_core::DateWindow;

use crate::error::{PipelineError, Result};

/// One seasonal window as written in the config file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WindowSpec {
    pub year: i32,
    /// `MM-DD`
    pub start: String,
    /// `MM-DD`, exclusive
    pub end: String,
}

impl WindowSpec {
    pub fn new(year: i32, start: &str, end: &str) -> Self {
        Self {
            year,
            start: start.to_string(),
            end: end.to_string(),
        }
    }

    pub fn resolve(&self) -> vegchange_core::Result<DateWindow> {
        DateWindow::new(self.year, &self.start, &self.end)
    }
}

/// Normalized-difference index `(a - b) / (a + b)` used for change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndexSpec {
    pub band_a: String,
    pub band_b: String,
    pub name: String,
}

impl Default for IndexSpec {
    fn default() -> Self {
        Self {
            band_a: "B8".into(),
            band_b: "B5".into(),
            name: "NDRE1".into(),
        }
    }
}

/// Which artefacts the export sink receives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportToggles {
    pub change_raster: bool,
    pub classified_raster: bool,
    pub samples: bool,
    pub report: bool,
}

impl Default for ExportToggles {
    fn default() -> Self {
        Self {
            change_raster: true,
            classified_raster: true,
            samples: true,
            report: true,
        }
    }
}

impl ExportToggles {
    pub fn none() -> Self {
        Self {
            change_raster: false,
            classified_raster: false,
            samples: false,
            report: false,
        }
    }
}

/// Configuration of a change-detection run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// STAC collection queried for scenes
    pub collection: String,
    pub before: WindowSpec,
    pub after: WindowSpec,
    pub index: IndexSpec,

    /// Scenes must report cloud cover strictly below this percentage
    pub max_cloud_cover: f64,
    pub scl_band: String,
    pub excluded_scl_classes: Vec<u8>,
    /// Band name to STAC asset key; bands not listed use their own name
    pub asset_keys: BTreeMap<String, String>,

    /// Analysis grid resolution in metres
    pub analysis_scale: f64,

    pub decrease_threshold: f64,
    pub increase_threshold: f64,

    pub points_per_class: usize,
    /// Sampling resolution in metres
    pub sample_scale: f64,
    pub random_seed: u64,

    /// Ground-truth property holding the change label
    pub label_field: String,

    /// Limit on each provider call; absent means wait indefinitely
    pub materialize_timeout_secs: Option<u64>,
    /// Scenes downloaded concurrently per window
    pub scene_concurrency: usize,

    pub histogram: HistogramParams,

    pub output_dir: PathBuf,
    pub export: ExportToggles,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let composite = CompositeParams::default();
        let classify = ClassifyParams::default();
        let sampling = StratifiedParams::default();
        Self {
            collection: "sentinel-2-l2a".into(),
            before: WindowSpec::new(2019, "04-15", "06-15"),
            after: WindowSpec::new(2024, "04-15", "06-15"),
            index: IndexSpec::default(),
            max_cloud_cover: composite.max_cloud_cover,
            scl_band: composite.scl_band,
            excluded_scl_classes: composite.excluded_scl_classes,
            asset_keys: BTreeMap::new(),
            analysis_scale: 30.0,
            decrease_threshold: classify.decrease_threshold,
            increase_threshold: classify.increase_threshold,
            points_per_class: sampling.points_per_class,
            sample_scale: sampling.scale_m,
            random_seed: sampling.seed,
            label_field: "change".into(),
            materialize_timeout_secs: None,
            scene_concurrency: 4,
            histogram: HistogramParams::default(),
            output_dir: PathBuf::from("output"),
            export: ExportToggles::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| PipelineError::Config(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| PipelineError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Both windows, checked for order (`before` ends by the time `after` starts)
    pub fn windows(&self) -> vegchange_core::Result<(DateWindow, DateWindow)> {
        let before = self.before.resolve()?;
        let after = self.after.resolve()?;
        DateWindow::ensure_ordered(&before, &after)?;
        Ok((before, after))
    }

    pub fn composite_params(&self) -> CompositeParams {
        CompositeParams {
            max_cloud_cover: self.max_cloud_cover,
            scl_band: self.scl_band.clone(),
            excluded_scl_classes: self.excluded_scl_classes.clone(),
        }
    }

    pub fn classify_params(&self) -> vegchange_core::Result<ClassifyParams> {
        ClassifyParams::new(self.decrease_threshold, self.increase_threshold)
    }

    pub fn sampling_params(&self) -> StratifiedParams {
        StratifiedParams {
            points_per_class: self.points_per_class,
            scale_m: self.sample_scale,
            seed: self.random_seed,
        }
    }

    pub fn materialize_timeout(&self) -> Option<Duration> {
        self.materialize_timeout_secs.map(Duration::from_secs)
    }

    /// Bands each scene must provide: the index pair plus the SCL band
    /// when masking is enabled, without duplicates.
    pub fn scene_bands(&self) -> Vec<String> {
        let mut bands = vec![self.index.band_a.clone(), self.index.band_b.clone()];
        if !self.excluded_scl_classes.is_empty() {
            bands.push(self.scl_band.clone());
        }
        let mut seen = std::collections::HashSet::new();
        bands.retain(|b| seen.insert(b.clone()));
        bands
    }

    /// Bands kept in the composite
    pub fn composite_bands(&self) -> Vec<String> {
        let mut bands = vec![self.index.band_a.clone()];
        if self.index.band_b != self.index.band_a {
            bands.push(self.index.band_b.clone());
        }
        bands
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = PipelineConfig::default();
        assert_eq!(c.decrease_threshold, -0.1);
        assert_eq!(c.increase_threshold, 0.1);
        assert_eq!(c.points_per_class, 100);
        assert_eq!(c.sample_scale, 30.0);
        assert_eq!(c.random_seed, 0);
        assert_eq!(c.max_cloud_cover, 20.0);
        assert_eq!(c.excluded_scl_classes, vec![3, 8, 9, 10]);
        assert_eq!(c.label_field, "change");
        assert_eq!(c.index.name, "NDRE1");

        let (before, after) = c.windows().unwrap();
        assert_eq!(before.year(), 2019);
        assert_eq!(after.year(), 2024);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let c = PipelineConfig::from_json(
            r#"{
                "points_per_class": 50,
                "random_seed": 7,
                "before": {"year": 2018, "start": "01-01", "end": "03-01"},
                "export": {"samples": false}
            }"#,
        )
        .unwrap();
        assert_eq!(c.points_per_class, 50);
        assert_eq!(c.random_seed, 7);
        assert_eq!(c.before.year, 2018);
        assert_eq!(c.after.year, 2024);
        assert!(!c.export.samples);
        assert!(c.export.report);
        assert_eq!(c.increase_threshold, 0.1);
    }

    #[test]
    fn unknown_keys_rejected() {
        let err = PipelineConfig::from_json(r#"{"point_per_class": 50}"#).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));

        let err = PipelineConfig::from_json(r#"{"index": {"band_a": "B8", "band_c": "B4"}}"#);
        assert!(err.is_err());
    }

    #[test]
    fn window_order_checked() {
        let c = PipelineConfig {
            before: WindowSpec::new(2024, "04-15", "06-15"),
            after: WindowSpec::new(2019, "04-15", "06-15"),
            ..Default::default()
        };
        assert!(matches!(
            c.windows().unwrap_err(),
            vegchange_core::Error::WindowOrder { .. }
        ));
    }

    #[test]
    fn derived_params() {
        let c = PipelineConfig {
            decrease_threshold: 0.3,
            increase_threshold: 0.2,
            ..Default::default()
        };
        assert!(c.classify_params().is_err());

        let c = PipelineConfig::default();
        assert_eq!(c.scene_bands(), vec!["B8", "B5", "SCL"]);
        assert_eq!(c.composite_bands(), vec!["B8", "B5"]);
        assert_eq!(c.sampling_params(), StratifiedParams::default());

        let no_mask = PipelineConfig {
            excluded_scl_classes: vec![],
            ..Default::default()
        };
        assert_eq!(no_mask.scene_bands(), vec!["B8", "B5"]);
    }
}
