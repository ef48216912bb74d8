//! Per-area run reports

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use vegchange_algorithms::statistics::Histogram;
use vegchange_algorithms::validation::{AccuracyReport, ValidationOutcome};
use vegchange_core::{ChangeClass, DateWindow, GridLayout};

use crate::error::PipelineError;

/// Analysis grid summary
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GridSummary {
    pub rows: usize,
    pub cols: usize,
    pub scale_m: f64,
    /// `[west, south, east, north]`
    pub bounds: [f64; 4],
}

impl From<&GridLayout> for GridSummary {
    fn from(layout: &GridLayout) -> Self {
        let (w, s, e, n) = layout.transform.bounds(layout.cols, layout.rows);
        Self {
            rows: layout.rows,
            cols: layout.cols,
            scale_m: layout.scale_m,
            bounds: [w, s, e, n],
        }
    }
}

/// One date window's composite
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowReport {
    pub window: DateWindow,
    /// Scenes that passed the catalog filters
    pub scenes: usize,
    /// Composite pixels with a value
    pub valid_pixels: usize,
}

/// Accuracy against ground truth
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    /// Ground-truth points inside the area's bounds
    pub reference_points: usize,
    #[serde(flatten)]
    pub outcome: ValidationOutcome,
    pub accuracy: AccuracyReport,
}

/// Everything a run learned about one study area
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AreaReport {
    pub area: String,
    pub index: String,
    pub grid: GridSummary,
    pub before: WindowReport,
    pub after: WindowReport,
    pub class_counts: BTreeMap<ChangeClass, usize>,
    pub histogram: Histogram,
    /// Points drawn by the stratified sampler
    pub samples: usize,
    pub validation: Option<ValidationReport>,
}

impl AreaReport {
    /// Pixels that received a change class
    pub fn classified_pixels(&self) -> usize {
        self.class_counts.values().sum()
    }
}

fn pct(v: Option<f64>) -> String {
    v.map_or_else(|| "n/a".to_string(), |v| format!("{:.1}%", v * 100.0))
}

impl fmt::Display for AreaReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Area: {}", self.area)?;
        writeln!(
            f,
            "  Grid: {} x {} at {} m",
            self.grid.cols, self.grid.rows, self.grid.scale_m
        )?;
        for (name, w) in [("Before", &self.before), ("After", &self.after)] {
            writeln!(
                f,
                "  {name} {}: {} scenes, {} valid pixels",
                w.window, w.scenes, w.valid_pixels
            )?;
        }
        writeln!(f, "  {} change classes:", self.index)?;
        for (class, count) in &self.class_counts {
            writeln!(f, "    {:<10} {}", class.label(), count)?;
        }
        writeln!(f, "  Samples drawn: {}", self.samples)?;

        match &self.validation {
            None => writeln!(f, "  Validation: no ground truth")?,
            Some(v) => {
                writeln!(
                    f,
                    "  Validation: {} of {} points used ({} outside mask, {} unmapped labels, {} unlabelled)",
                    v.outcome.surviving,
                    v.reference_points,
                    v.outcome.outside_mask,
                    v.outcome.unmapped_labels,
                    v.outcome.unlabelled
                )?;
                writeln!(f, "    Overall accuracy: {}", pct(v.accuracy.overall_accuracy))?;
                match v.accuracy.kappa {
                    Some(k) => writeln!(f, "    Kappa: {k:.3}")?,
                    None => writeln!(f, "    Kappa: n/a")?,
                }
                for class in ChangeClass::ALL {
                    let i = class.index();
                    writeln!(
                        f,
                        "    {:<10} producer's {}, user's {}",
                        class.label(),
                        pct(v.accuracy.producers_accuracy.get(i).copied().flatten()),
                        pct(v.accuracy.users_accuracy.get(i).copied().flatten())
                    )?;
                }
            }
        }
        Ok(())
    }
}

/// Result of one area in a batch
#[derive(Debug)]
pub struct AreaOutcome {
    pub area: String,
    pub result: Result<AreaReport, PipelineError>,
}

impl AreaOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}
