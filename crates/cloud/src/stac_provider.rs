//! [`SceneProvider`] backed by a STAC API.
//!
//! Scenes are found with Item Search, then each requested band is fetched
//! as a whole GeoTIFF asset, rescaled with its `raster:bands` metadata and
//! warped onto the analysis grid.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use futures::future::try_join_all;
use tracing::{debug, info};

use vegchange_core::io::read_geotiff_from_buffer;
use vegchange_core::{GridLayout, Raster, Scene, SceneMeta};

use crate::error::{ProviderError, Result};
use crate::provider::{SceneProvider, SceneQuery};
use crate::reproject::{warp_to_layout, SourceCrs};
use crate::stac_client::StacClient;
use crate::stac_models::{BandScaling, StacItem, StacSearchParams};

/// Sentinel-2 band names to Earth Search asset keys.
pub fn default_asset_keys() -> BTreeMap<String, String> {
    [
        ("B2", "blue"),
        ("B3", "green"),
        ("B4", "red"),
        ("B5", "rededge1"),
        ("B8", "nir"),
        ("B11", "swir16"),
        ("B12", "swir22"),
        ("SCL", "scl"),
    ]
    .into_iter()
    .map(|(band, key)| (band.to_string(), key.to_string()))
    .collect()
}

pub struct StacProvider {
    client: StacClient,
    asset_keys: BTreeMap<String, String>,
    /// Items seen by `query_scenes`, by id
    items: Mutex<HashMap<String, StacItem>>,
}

impl StacProvider {
    pub fn new(client: StacClient) -> Self {
        Self::with_asset_keys(client, default_asset_keys())
    }

    /// Bands missing from `asset_keys` are looked up under their own name.
    pub fn with_asset_keys(client: StacClient, asset_keys: BTreeMap<String, String>) -> Self {
        Self {
            client,
            asset_keys,
            items: Mutex::new(HashMap::new()),
        }
    }

    pub fn client(&self) -> &StacClient {
        &self.client
    }

    fn asset_key<'a>(&'a self, band: &'a str) -> &'a str {
        self.asset_keys.get(band).map(String::as_str).unwrap_or(band)
    }

    fn cached_item(&self, id: &str) -> Option<StacItem> {
        let items = self.items.lock().unwrap_or_else(|e| e.into_inner());
        items.get(id).cloned()
    }

    async fn load_band(
        &self,
        item: &StacItem,
        meta: &SceneMeta,
        band: &str,
        layout: &GridLayout,
    ) -> Result<Raster<f64>> {
        let key = self.asset_key(band);
        let asset = item.asset(key).ok_or_else(|| ProviderError::MissingAsset {
            scene: item.id.clone(),
            band: band.to_string(),
            asset: key.to_string(),
        })?;

        let bytes = self.client.download(&asset.href).await?;
        debug!(scene = %item.id, band, bytes = bytes.len(), "asset downloaded");

        let scaling = asset.scaling();
        let fallback_epsg = meta.epsg;
        let layout = *layout;
        let what = format!("{}/{band}", item.id);

        tokio::task::spawn_blocking(move || regrid(&bytes, scaling, fallback_epsg, &layout))
            .await
            .map_err(|e| ProviderError::Decode {
                what,
                reason: e.to_string(),
            })?
    }
}

/// Decode, rescale and warp one asset.
fn regrid(
    bytes: &[u8],
    scaling: BandScaling,
    fallback_epsg: Option<u32>,
    layout: &GridLayout,
) -> Result<Raster<f64>> {
    let decoded = read_geotiff_from_buffer::<f64>(bytes)?;
    let epsg = decoded
        .epsg
        .or(fallback_epsg)
        .ok_or_else(|| ProviderError::UnsupportedCrs("asset has no EPSG code".into()))?;
    let crs = SourceCrs::from_epsg(epsg)?;

    let mut raster = decoded.raster;
    raster.data_mut().mapv_inplace(|v| scaling.apply(v));
    raster.set_nodata(Some(f64::NAN));
    Ok(warp_to_layout(&raster, crs, layout))
}

#[async_trait]
impl SceneProvider for StacProvider {
    async fn query_scenes(&self, query: &SceneQuery) -> Result<Vec<SceneMeta>> {
        let mut params = StacSearchParams::new()
            .bbox(query.bbox)
            .datetime(query.window.stac_interval())
            .collection(query.collection.as_str())
            .cloud_cover_below(query.max_cloud_cover)
            .limit(100);
        if let Some(limit) = query.limit {
            params = params.limit(limit.min(100) as u32);
        }

        let items = self.client.search_all(&params).await?;
        let total = items.len();

        let mut metas = Vec::new();
        {
            let mut cache = self.items.lock().unwrap_or_else(|e| e.into_inner());
            for item in items {
                let Some(meta) = item.scene_meta() else { continue };
                // Catalogs differ in how they treat missing cloud cover
                if !query.accepts(&meta) {
                    continue;
                }
                cache.insert(item.id.clone(), item);
                metas.push(meta);
            }
        }

        metas.sort_by(|a, b| a.datetime.cmp(&b.datetime).then_with(|| a.id.cmp(&b.id)));
        if let Some(limit) = query.limit {
            metas.truncate(limit);
        }
        info!(
            window = %query.window,
            found = total,
            kept = metas.len(),
            "STAC scenes"
        );
        Ok(metas)
    }

    async fn load_scene(
        &self,
        meta: &SceneMeta,
        bands: &[String],
        layout: &GridLayout,
    ) -> Result<Scene> {
        let item = self
            .cached_item(&meta.id)
            .ok_or_else(|| ProviderError::UnknownScene(meta.id.clone()))?;

        let rasters = try_join_all(
            bands
                .iter()
                .map(|band| self.load_band(&item, meta, band, layout)),
        )
        .await?;

        let mut scene = Scene::new(meta.clone());
        for (band, raster) in bands.iter().zip(rasters) {
            scene.bands.insert(band.clone(), raster);
        }
        Ok(scene)
    }
}
