//! Export sinks
//!
//! Exports are fire-and-forget from the run's point of view: a sink
//! accepts an artefact and returns immediately. Failures are logged by the
//! sink and never reach the run.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use vegchange_core::io::{write_geotiff, write_points_csv, GeoTiffOptions};
use vegchange_core::{Raster, ReferencePoint};

use crate::report::AreaReport;

/// Destination for the artefacts of a run
pub trait ExportSink: Send + Sync {
    /// A single-band raster on the analysis grid (lon/lat)
    fn raster(&self, area: &str, name: &str, raster: Raster<f64>);

    /// Sampled reference points
    fn points(&self, area: &str, name: &str, points: Vec<ReferencePoint>);

    fn report(&self, area: &str, report: &AreaReport);
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ExportSink for NullSink {
    fn raster(&self, _area: &str, _name: &str, _raster: Raster<f64>) {}
    fn points(&self, _area: &str, _name: &str, _points: Vec<ReferencePoint>) {}
    fn report(&self, _area: &str, _report: &AreaReport) {}
}

/// Writes GeoTIFF, CSV and JSON files under one directory on blocking
/// worker threads.
///
/// Files are named `<area>_<name>.<ext>`. Must be used inside a tokio
/// runtime. Call [`FileExportSink::flush`] before the runtime shuts down
/// to let queued writes finish.
pub struct FileExportSink {
    dir: PathBuf,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl FileExportSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            pending: Mutex::new(Vec::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path an artefact is written to
    pub fn path_for(&self, area: &str, name: &str, ext: &str) -> PathBuf {
        self.dir
            .join(format!("{}_{}.{ext}", file_stem(area), file_stem(name)))
    }

    /// Wait for every queued write. Returns how many were queued.
    pub async fn flush(&self) -> usize {
        let handles: Vec<JoinHandle<()>> = {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            pending.drain(..).collect()
        };
        let n = handles.len();
        for handle in handles {
            if let Err(e) = handle.await {
                warn!("export task panicked: {e}");
            }
        }
        n
    }

    fn spawn<F>(&self, path: PathBuf, write: F)
    where
        F: FnOnce(&Path) -> Result<(), String> + Send + 'static,
    {
        let handle = tokio::task::spawn_blocking(move || {
            let result = path
                .parent()
                .map_or(Ok(()), std::fs::create_dir_all)
                .map_err(|e| e.to_string())
                .and_then(|_| write(&path));
            match result {
                Ok(()) => debug!(path = %path.display(), "exported"),
                Err(e) => warn!(path = %path.display(), "export failed: {e}"),
            }
        });
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(handle);
    }
}

impl ExportSink for FileExportSink {
    fn raster(&self, area: &str, name: &str, raster: Raster<f64>) {
        let path = self.path_for(area, name, "tif");
        self.spawn(path, move |p| {
            let options = GeoTiffOptions { epsg: Some(4326) };
            write_geotiff(&raster, p, &options).map_err(|e| e.to_string())
        });
    }

    fn points(&self, area: &str, name: &str, points: Vec<ReferencePoint>) {
        let path = self.path_for(area, name, "csv");
        self.spawn(path, move |p| write_points_csv(&points, p).map_err(|e| e.to_string()));
    }

    fn report(&self, area: &str, report: &AreaReport) {
        let path = self.path_for(area, "report", "json");
        match serde_json::to_vec_pretty(report) {
            Ok(bytes) => self.spawn(path, move |p| std::fs::write(p, bytes).map_err(|e| e.to_string())),
            Err(e) => warn!(area, "cannot serialize report: {e}"),
        }
    }
}

/// Lowercase, with anything but letters, digits, `-` and `_` replaced by `_`
pub(crate) fn file_stem(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}
