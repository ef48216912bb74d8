//! The scene provider boundary.
//!
//! A provider answers two questions: which acquisitions exist for an area
//! and date window, and what are their band values on a given analysis
//! grid. Both are remote, possibly slow, and the only suspension points of
//! a run. Everything downstream (masking, median, indices, sampling) is
//! computed locally from the materialized [`Scene`]s.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::debug;

use vegchange_core::{DateWindow, GridLayout, Scene, SceneMeta, StudyArea};

use crate::error::{ProviderError, Result};
use crate::reproject::{warp_to_layout, SourceCrs};

/// Catalog query for one study area and date window.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneQuery {
    pub collection: String,
    /// `[west, south, east, north]` in degrees
    pub bbox: [f64; 4],
    pub window: DateWindow,
    /// Scenes must report cloud cover strictly below this percentage
    pub max_cloud_cover: f64,
    pub limit: Option<usize>,
}

impl SceneQuery {
    pub fn new(
        collection: impl Into<String>,
        area: &StudyArea,
        window: DateWindow,
        max_cloud_cover: f64,
    ) -> Self {
        let (w, s, e, n) = area.bounds();
        Self {
            collection: collection.into(),
            bbox: [w, s, e, n],
            window,
            max_cloud_cover,
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether catalog metadata satisfies this query.
    ///
    /// Scenes without a reported cloud cover do not pass the filter.
    pub fn accepts(&self, meta: &SceneMeta) -> bool {
        let cloud_ok = meta.cloud_cover.is_some_and(|c| c < self.max_cloud_cover);
        let overlaps = meta.bbox.is_none_or(|b| {
            b[0] <= self.bbox[2] && b[2] >= self.bbox[0] && b[1] <= self.bbox[3] && b[3] >= self.bbox[1]
        });
        cloud_ok && overlaps && self.window.contains(meta.datetime)
    }
}

/// Source of scenes for compositing.
#[async_trait]
pub trait SceneProvider: Send + Sync {
    /// Scene metadata matching the query, oldest first.
    async fn query_scenes(&self, query: &SceneQuery) -> Result<Vec<SceneMeta>>;

    /// Materialize the named bands of one scene on `layout`.
    ///
    /// Cells outside the scene footprint are NaN.
    async fn load_scene(&self, meta: &SceneMeta, bands: &[String], layout: &GridLayout)
        -> Result<Scene>;
}

/// Await a provider call, failing with [`ProviderError::Timeout`] when a
/// limit is given and exceeded. `None` waits indefinitely.
pub async fn materialize<T, F>(fut: F, timeout: Option<Duration>, what: &str) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match timeout {
        None => fut.await,
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| ProviderError::Timeout {
                what: what.to_string(),
                timeout: limit,
            })?,
    }
}

/// Load several scenes with up to `concurrency` in flight, keeping input order.
pub async fn fetch_scenes(
    provider: &dyn SceneProvider,
    metas: &[SceneMeta],
    bands: &[String],
    layout: &GridLayout,
    concurrency: usize,
) -> Result<Vec<Scene>> {
    let started = std::time::Instant::now();
    let scenes: Vec<Scene> = stream::iter(metas)
        .map(|meta| provider.load_scene(meta, bands, layout))
        .buffered(concurrency.max(1))
        .try_collect()
        .await?;
    debug!(count = scenes.len(), elapsed = ?started.elapsed(), "scenes loaded");
    Ok(scenes)
}

/// Provider over scenes held in memory.
///
/// Bands already on the requested layout are returned as-is; others are
/// treated as lon/lat rasters and regridded.
#[derive(Debug, Default, Clone)]
pub struct MemoryProvider {
    scenes: HashMap<String, Scene>,
    delay: Option<Duration>,
}

impl MemoryProvider {
    pub fn new(scenes: impl IntoIterator<Item = Scene>) -> Self {
        Self {
            scenes: scenes
                .into_iter()
                .map(|s| (s.meta.id.clone(), s))
                .collect(),
            delay: None,
        }
    }

    /// Sleep this long in every call, to exercise timeouts.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    async fn pause(&self) {
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
    }
}

#[async_trait]
impl SceneProvider for MemoryProvider {
    async fn query_scenes(&self, query: &SceneQuery) -> Result<Vec<SceneMeta>> {
        self.pause().await;
        let mut metas: Vec<SceneMeta> = self
            .scenes
            .values()
            .map(|s| &s.meta)
            .filter(|m| query.accepts(m))
            .cloned()
            .collect();
        metas.sort_by(|a, b| a.datetime.cmp(&b.datetime).then_with(|| a.id.cmp(&b.id)));
        if let Some(limit) = query.limit {
            metas.truncate(limit);
        }
        Ok(metas)
    }

    async fn load_scene(
        &self,
        meta: &SceneMeta,
        bands: &[String],
        layout: &GridLayout,
    ) -> Result<Scene> {
        self.pause().await;
        let stored = self
            .scenes
            .get(&meta.id)
            .ok_or_else(|| ProviderError::UnknownScene(meta.id.clone()))?;

        let mut scene = Scene::new(stored.meta.clone());
        for band in bands {
            let raster = stored.band(band).ok_or_else(|| ProviderError::MissingAsset {
                scene: meta.id.clone(),
                band: band.clone(),
                asset: band.clone(),
            })?;
            let on_grid = if layout.matches(raster) {
                raster.clone()
            } else {
                warp_to_layout(raster, SourceCrs::Wgs84, layout)
            };
            scene.bands.insert(band.clone(), on_grid);
        }
        Ok(scene)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use geo_types::{polygon, MultiPolygon};
    use vegchange_core::{GeoTransform, Raster};

    fn area() -> StudyArea {
        let poly = polygon![
            (x: 0.0, y: 0.0),
            (x: 4.0, y: 0.0),
            (x: 4.0, y: 4.0),
            (x: 0.0, y: 4.0),
            (x: 0.0, y: 0.0),
        ];
        StudyArea::new("box", MultiPolygon(vec![poly])).unwrap()
    }

    fn layout() -> GridLayout {
        GridLayout::new(GeoTransform::new(0.0, 4.0, 1.0, -1.0), 4, 4, 1.0)
    }

    fn scene(id: &str, month: u32, cloud: Option<f64>) -> Scene {
        let meta = SceneMeta {
            id: id.into(),
            datetime: Utc.with_ymd_and_hms(2019, month, 10, 8, 0, 0).unwrap(),
            cloud_cover: cloud,
            bbox: Some([0.0, 0.0, 4.0, 4.0]),
            epsg: Some(4326),
        };
        let mut b8 = Raster::filled(4, 4, 0.4);
        b8.set_transform(layout().transform);
        Scene::new(meta).with_band("B8", b8)
    }

    fn provider() -> MemoryProvider {
        MemoryProvider::new([
            scene("may", 5, Some(5.0)),
            scene("apr", 4, Some(10.0)),
            scene("cloudy", 5, Some(20.0)),
            scene("unknown-cloud", 5, None),
            scene("july", 7, Some(1.0)),
        ])
    }

    fn query() -> SceneQuery {
        let window = DateWindow::new(2019, "04-15", "06-15").unwrap();
        SceneQuery::new("sentinel-2-l2a", &area(), window, 20.0)
    }

    #[tokio::test]
    async fn query_filters_and_orders() {
        let metas = provider().query_scenes(&query()).await.unwrap();
        // 20% is not strictly below the limit; unknown cover is dropped
        let ids: Vec<_> = metas.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["may"]);

        let window = DateWindow::new(2019, "04-01", "06-15").unwrap();
        let q = SceneQuery::new("s2", &area(), window, 50.0).with_limit(1);
        let metas = provider().query_scenes(&q).await.unwrap();
        assert_eq!(metas.len(), 1);
        assert_eq!(metas[0].id, "apr");
    }

    #[tokio::test]
    async fn load_selects_bands() {
        let p = provider();
        let metas = p.query_scenes(&query()).await.unwrap();
        let bands = vec!["B8".to_string()];
        let scenes = fetch_scenes(&p, &metas, &bands, &layout(), 4).await.unwrap();
        assert_eq!(scenes.len(), 1);
        assert!(layout().matches(scenes[0].band("B8").unwrap()));

        let missing = vec!["B5".to_string()];
        let err = p.load_scene(&metas[0], &missing, &layout()).await.unwrap_err();
        assert!(matches!(err, ProviderError::MissingAsset { .. }));
    }

    #[tokio::test]
    async fn load_regrids_foreign_layout() {
        let p = provider();
        let metas = p.query_scenes(&query()).await.unwrap();
        let coarse = GridLayout::new(GeoTransform::new(0.0, 4.0, 2.0, -2.0), 2, 2, 2.0);
        let s = p.load_scene(&metas[0], &["B8".to_string()], &coarse).await.unwrap();
        let b8 = s.band("B8").unwrap();
        assert!(coarse.matches(b8));
        assert_eq!(b8.valid_count(), 4);
    }

    #[tokio::test]
    async fn unknown_scene() {
        let mut meta = scene("x", 5, Some(1.0)).meta;
        meta.id = "nope".into();
        let err = provider().load_scene(&meta, &[], &layout()).await.unwrap_err();
        assert!(matches!(err, ProviderError::UnknownScene(_)));
    }

    #[tokio::test]
    async fn materialize_times_out() {
        let slow = provider().with_delay(Duration::from_millis(200));
        let q = query();
        let err = materialize(slow.query_scenes(&q), Some(Duration::from_millis(10)), "query")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Timeout { .. }));

        let ok = materialize(slow.query_scenes(&q), None, "query").await.unwrap();
        assert_eq!(ok.len(), 1);
    }
}
