//! STAC Item Search request and response models.
//!
//! Only what scene discovery needs: a search body with bbox, datetime,
//! collection and cloud-cover query, and items with acquisition time,
//! cloud cover, projection and per-band assets (with the `raster:bands`
//! scale/offset/nodata when present).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;

use vegchange_core::SceneMeta;

/// Body for `POST /search`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StacSearchParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<[f64; 4]>,

    /// Interval `start/end` in RFC 3339
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datetime: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub collections: Option<Vec<String>>,

    /// Query extension filters, e.g. `{"eo:cloud_cover": {"lt": 20}}`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,

    /// Pagination token (next page).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl StacSearchParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// `[west, south, east, north]`
    pub fn bbox(mut self, bbox: [f64; 4]) -> Self {
        self.bbox = Some(bbox);
        self
    }

    pub fn datetime(mut self, interval: impl Into<String>) -> Self {
        self.datetime = Some(interval.into());
        self
    }

    pub fn collection(mut self, collection: impl Into<String>) -> Self {
        self.collections = Some(vec![collection.into()]);
        self
    }

    /// Keep items whose `eo:cloud_cover` is strictly below `max`
    pub fn cloud_cover_below(mut self, max: f64) -> Self {
        let filter = json!({ "eo:cloud_cover": { "lt": max } });
        match self.query.as_mut().and_then(Value::as_object_mut) {
            Some(q) => {
                q.insert("eo:cloud_cover".into(), filter["eo:cloud_cover"].clone());
            }
            None => self.query = Some(filter),
        }
        self
    }

    pub fn limit(mut self, n: u32) -> Self {
        self.limit = Some(n);
        self
    }
}

/// A page of search results.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StacItemCollection {
    pub features: Vec<StacItem>,

    #[serde(default)]
    pub links: Vec<StacLink>,

    #[serde(rename = "numberMatched", skip_serializing_if = "Option::is_none")]
    pub number_matched: Option<u64>,
}

impl StacItemCollection {
    /// The `"next"` pagination link, if any.
    pub fn next_link(&self) -> Option<&StacLink> {
        self.links.iter().find(|l| l.rel == "next")
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// A single scene.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StacItem {
    pub id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<Vec<f64>>,

    pub properties: StacItemProperties,

    #[serde(default)]
    pub assets: HashMap<String, StacAsset>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
}

impl StacItem {
    pub fn asset(&self, key: &str) -> Option<&StacAsset> {
        self.assets.get(key)
    }

    /// Acquisition instant, if the item has a parseable `datetime`
    pub fn acquired(&self) -> Option<DateTime<Utc>> {
        let raw = self.properties.datetime.as_deref()?;
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// EPSG code from `proj:epsg`, or from `proj:code` (`"EPSG:32637"`)
    pub fn epsg(&self) -> Option<u32> {
        let extra = &self.properties.extra;
        if let Some(code) = extra.get("proj:epsg").and_then(Value::as_u64) {
            return u32::try_from(code).ok();
        }
        extra
            .get("proj:code")
            .and_then(Value::as_str)
            .and_then(|s| s.strip_prefix("EPSG:"))
            .and_then(|s| s.parse().ok())
    }

    /// Catalog metadata in the provider-neutral form.
    ///
    /// `None` when the item has no usable acquisition time.
    pub fn scene_meta(&self) -> Option<SceneMeta> {
        let bbox = self
            .bbox
            .as_ref()
            .filter(|b| b.len() >= 4)
            .map(|b| [b[0], b[1], b[2], b[3]]);
        Some(SceneMeta {
            id: self.id.clone(),
            datetime: self.acquired()?,
            cloud_cover: self.properties.eo_cloud_cover,
            bbox,
            epsg: self.epsg(),
        })
    }
}

/// Item properties.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StacItemProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datetime: Option<String>,

    #[serde(rename = "eo:cloud_cover", skip_serializing_if = "Option::is_none")]
    pub eo_cloud_cover: Option<f64>,

    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// Linear rescaling and no-data of a stored band (`raster:bands` extension).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandScaling {
    pub scale: f64,
    pub offset: f64,
    pub nodata: Option<f64>,
}

impl Default for BandScaling {
    fn default() -> Self {
        Self {
            scale: 1.0,
            offset: 0.0,
            nodata: None,
        }
    }
}

impl BandScaling {
    /// Physical value of a stored one; the stored no-data becomes NaN
    #[inline]
    pub fn apply(&self, stored: f64) -> f64 {
        if stored.is_nan() || self.nodata.is_some_and(|nd| stored == nd) {
            return f64::NAN;
        }
        stored * self.scale + self.offset
    }
}

/// A file belonging to an item.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StacAsset {
    pub href: String,

    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,

    #[serde(rename = "raster:bands", skip_serializing_if = "Option::is_none")]
    pub raster_bands: Option<Vec<Value>>,
}

impl StacAsset {
    /// Scaling of the first band, defaults where the extension is absent
    pub fn scaling(&self) -> BandScaling {
        let Some(band) = self.raster_bands.as_ref().and_then(|b| b.first()) else {
            return BandScaling::default();
        };
        BandScaling {
            scale: band.get("scale").and_then(Value::as_f64).unwrap_or(1.0),
            offset: band.get("offset").and_then(Value::as_f64).unwrap_or(0.0),
            nodata: band.get("nodata").and_then(Value::as_f64),
        }
    }
}

/// A link (pagination uses `rel = "next"`).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StacLink {
    pub rel: String,

    pub href: String,

    /// `GET` when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    /// Request body for POST pagination
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,

    /// Whether `body` overlays the previous request body
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge: Option<bool>,
}
