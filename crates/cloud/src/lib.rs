//! # vegchange cloud
//!
//! Scene providers: where composites get their pixels from.
//!
//! - [`SceneProvider`]: async query + materialize boundary, with a
//!   caller-supplied timeout through [`materialize`]
//! - [`StacProvider`]: STAC Item Search, whole-asset download, GeoTIFF
//!   decode and UTM to lon/lat regridding
//! - [`MemoryProvider`]: in-memory scenes for tests and offline runs

pub mod error;
pub mod provider;
pub mod reproject;
pub mod stac_client;
pub mod stac_models;
pub mod stac_provider;

pub use error::{ProviderError, Result};
pub use provider::{fetch_scenes, materialize, MemoryProvider, SceneProvider, SceneQuery};
pub use reproject::{warp_to_layout, SourceCrs};
pub use stac_client::{StacCatalog, StacClient, StacClientOptions};
pub use stac_models::{BandScaling, StacItem, StacItemCollection, StacSearchParams};
pub use stac_provider::{default_asset_keys, StacProvider};
