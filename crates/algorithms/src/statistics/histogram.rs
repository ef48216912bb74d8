//! Fixed-width histogram of a change raster
//!
//! The range is taken from the valid minimum and maximum. The bucket width
//! is the range split into `max_buckets`, but never narrower than
//! `min_bucket_width`.

use serde::{Deserialize, Serialize};

use vegchange_core::{ChangeRaster, Error, Result};

/// Parameters for [`change_histogram`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistogramParams {
    pub min_bucket_width: f64,
    pub max_buckets: usize,
}

impl Default for HistogramParams {
    fn default() -> Self {
        Self {
            min_bucket_width: 0.01,
            max_buckets: 100,
        }
    }
}

/// Bucket counts starting at `min`, each `bucket_width` wide.
///
/// Bucket `i` covers `[min + i*w, min + (i+1)*w)`; the last bucket also
/// holds the maximum. An all-masked raster gives no buckets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    pub min: f64,
    pub max: f64,
    pub bucket_width: f64,
    pub counts: Vec<u64>,
}

impl Histogram {
    fn empty(bucket_width: f64) -> Self {
        Self {
            min: f64::NAN,
            max: f64::NAN,
            bucket_width,
            counts: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Number of values counted
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Lower edge of bucket `i`
    pub fn bucket_start(&self, i: usize) -> f64 {
        self.min + i as f64 * self.bucket_width
    }

    /// Index of the most populated bucket
    pub fn mode_bucket(&self) -> Option<usize> {
        self.counts
            .iter()
            .enumerate()
            .max_by_key(|(i, c)| (**c, std::cmp::Reverse(*i)))
            .map(|(i, _)| i)
    }
}

/// Histogram of the valid change values
pub fn change_histogram(change: &ChangeRaster, params: HistogramParams) -> Result<Histogram> {
    if !(params.min_bucket_width.is_finite() && params.min_bucket_width > 0.0) {
        return Err(Error::InvalidParameter {
            name: "min_bucket_width",
            value: params.min_bucket_width.to_string(),
            reason: "must be positive".into(),
        });
    }
    if params.max_buckets == 0 {
        return Err(Error::InvalidParameter {
            name: "max_buckets",
            value: "0".into(),
            reason: "must be at least 1".into(),
        });
    }

    let raster = change.raster();
    let values: Vec<f64> = raster
        .data()
        .iter()
        .copied()
        .filter(|v| !raster.is_nodata(*v))
        .collect();

    if values.is_empty() {
        return Ok(Histogram::empty(params.min_bucket_width));
    }

    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let range = max - min;

    let width = (range / params.max_buckets as f64).max(params.min_bucket_width);
    let n = ((range / width).ceil() as usize).clamp(1, params.max_buckets);

    let mut counts = vec![0u64; n];
    for v in values {
        let i = (((v - min) / width).floor() as usize).min(n - 1);
        counts[i] += 1;
    }

    Ok(Histogram {
        min,
        max,
        bucket_width: width,
        counts,
    })
}
