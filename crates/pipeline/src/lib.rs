//! # vegchange pipeline
//!
//! Orchestration of change-detection runs over a [`SceneProvider`]:
//!
//! - [`PipelineConfig`]: every run option with its default, loadable from JSON
//! - [`run_area`] / [`run_batch`]: one study area, or many side by side
//! - [`ExportSink`]: fire-and-forget destination for rasters, samples and reports
//!
//! [`SceneProvider`]: vegchange_cloud::SceneProvider

pub mod config;
pub mod error;
pub mod export;
pub mod report;
pub mod runner;

pub use config::{ExportToggles, IndexSpec, PipelineConfig, WindowSpec};
pub use error::{PipelineError, Result};
pub use export::{ExportSink, FileExportSink, NullSink};
pub use report::{AreaOutcome, AreaReport, GridSummary, ValidationReport, WindowReport};
pub use runner::{run_area, run_batch};
