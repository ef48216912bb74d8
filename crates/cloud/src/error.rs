//! Error types for scene providers.

use std::time::Duration;
use thiserror::Error;

/// Failures of an external scene provider.
///
/// These are surfaced verbatim to the caller; nothing in the core retries
/// them. The STAC client's own transport retry happens before an error
/// reaches this type.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("network error: {0}")]
    Network(String),

    #[error("{what} returned HTTP {status}: {body}")]
    Status {
        what: String,
        status: u16,
        body: String,
    },

    #[error("cannot decode {what}: {reason}")]
    Decode { what: String, reason: String },

    #[error("{what} did not complete within {timeout:?}")]
    Timeout { what: String, timeout: Duration },

    #[error("scene {scene} has no asset for band '{band}' (asset key '{asset}')")]
    MissingAsset {
        scene: String,
        band: String,
        asset: String,
    },

    #[error("unknown scene '{0}' (query it first)")]
    UnknownScene(String),

    #[error("unsupported source CRS: {0}")]
    UnsupportedCrs(String),

    #[error("authentication error: {0}")]
    Auth(String),

    #[error("core error: {0}")]
    Core(#[from] vegchange_core::Error),
}

/// Result alias for provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;
