//! Error types for pipeline runs

use std::path::PathBuf;
use thiserror::Error;

/// Why a study-area run failed.
///
/// Input and provider errors pass through unchanged; the pipeline never
/// retries either.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Input(#[from] vegchange_core::Error),

    #[error(transparent)]
    Provider(#[from] vegchange_cloud::ProviderError),

    #[error("cannot read config {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Config(String),

    #[error("areas {areas:?} would write to the same output files '{stem}_*'")]
    OutputClash { stem: String, areas: Vec<String> },
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;
