//! Async STAC client: item search with pagination and asset download.
//!
//! Earth Search and Planetary Computer are built in; any other STAC API
//! root works through [`StacCatalog::Custom`].

use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{ProviderError, Result};
use crate::stac_models::{StacItem, StacItemCollection, StacLink, StacSearchParams};

const PC_SIGN_URL: &str = "https://planetarycomputer.microsoft.com/api/sas/v1/sign";

/// Longest error body kept in a [`ProviderError::Status`]
const MAX_ERROR_BODY: usize = 500;

/// A STAC API endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StacCatalog {
    /// AWS Earth Search (Element 84), unsigned public assets
    EarthSearch,
    /// Microsoft Planetary Computer, assets need SAS signing
    PlanetaryComputer,
    /// Any STAC API root URL
    Custom(String),
}

impl StacCatalog {
    /// Full `POST /search` URL.
    pub fn search_url(&self) -> String {
        match self {
            Self::EarthSearch => "https://earth-search.aws.element84.com/v1/search".into(),
            Self::PlanetaryComputer => {
                "https://planetarycomputer.microsoft.com/api/stac/v1/search".into()
            }
            Self::Custom(root) => {
                let root = root.trim_end_matches('/');
                if root.ends_with("/search") {
                    root.to_string()
                } else {
                    format!("{root}/search")
                }
            }
        }
    }

    /// `"es"`, `"earth-search"`, `"pc"`, `"planetary-computer"`, or a URL
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "es" | "earth-search" | "earthsearch" => Self::EarthSearch,
            "pc" | "planetary-computer" | "planetarycomputer" => Self::PlanetaryComputer,
            _ => Self::Custom(s.trim().to_string()),
        }
    }

    pub fn needs_signing(&self) -> bool {
        matches!(self, Self::PlanetaryComputer)
    }
}

/// Transport settings for [`StacClient`].
#[derive(Debug, Clone)]
pub struct StacClientOptions {
    /// Per-request timeout
    pub request_timeout: Duration,
    /// Retries after the first attempt on 5xx and transport failures
    pub max_retries: u32,
    /// Upper bound on items collected across pages
    pub max_items: usize,
}

impl Default for StacClientOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(60),
            max_retries: 3,
            max_items: 500,
        }
    }
}

/// Async client for STAC Item Search and asset bytes.
pub struct StacClient {
    catalog: StacCatalog,
    http: reqwest::Client,
    options: StacClientOptions,
}

impl StacClient {
    pub fn new(catalog: StacCatalog, options: StacClientOptions) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(options.request_timeout)
            .user_agent(concat!("vegchange/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProviderError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            catalog,
            http,
            options,
        })
    }

    pub fn catalog(&self) -> &StacCatalog {
        &self.catalog
    }

    pub fn options(&self) -> &StacClientOptions {
        &self.options
    }

    /// One page of results.
    pub async fn search(&self, params: &StacSearchParams) -> Result<StacItemCollection> {
        let url = self.catalog.search_url();
        let bytes = self
            .send_with_retry("STAC search", || self.http.post(&url).json(params))
            .await?;
        decode_page("STAC search", &bytes)
    }

    /// Every page, following `next` links, up to `max_items` items.
    pub async fn search_all(&self, params: &StacSearchParams) -> Result<Vec<StacItem>> {
        let max = self.options.max_items;
        let mut items = Vec::new();
        let mut page = self.search(params).await?;

        loop {
            let next = page.next_link().cloned();
            items.append(&mut page.features);
            if items.len() >= max {
                break;
            }
            let Some(link) = next else { break };
            page = self.follow(&link, params).await?;
            if page.is_empty() {
                break;
            }
        }

        items.truncate(max);
        debug!(count = items.len(), "STAC search complete");
        Ok(items)
    }

    /// Download an asset in full, signing it first when the catalog needs it.
    pub async fn download(&self, href: &str) -> Result<Vec<u8>> {
        let url = if self.catalog.needs_signing() {
            self.sign(href).await?
        } else {
            href.to_string()
        };
        self.send_with_retry("asset download", || self.http.get(&url))
            .await
    }

    async fn follow(&self, link: &StacLink, params: &StacSearchParams) -> Result<StacItemCollection> {
        let is_post = link
            .method
            .as_deref()
            .is_some_and(|m| m.eq_ignore_ascii_case("POST"));

        let bytes = if is_post {
            let body = next_body(link, params)?;
            self.send_with_retry("STAC pagination", || self.http.post(&link.href).json(&body))
                .await?
        } else {
            self.send_with_retry("STAC pagination", || self.http.get(&link.href))
                .await?
        };
        decode_page("STAC pagination", &bytes)
    }

    async fn sign(&self, href: &str) -> Result<String> {
        let bytes = self
            .send_with_retry("Planetary Computer signing", || {
                self.http.get(PC_SIGN_URL).query(&[("href", href)])
            })
            .await
            .map_err(|e| ProviderError::Auth(e.to_string()))?;
        let body: serde_json::Value = serde_json::from_slice(&bytes)
            .map_err(|e| ProviderError::Auth(format!("bad sign response: {e}")))?;
        body["href"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ProviderError::Auth("sign response has no 'href'".into()))
    }

    /// Send a request built by `build`, retrying transport failures and
    /// 5xx responses with exponential backoff (500 ms, 1 s, 2 s, ...).
    /// 4xx responses fail immediately.
    async fn send_with_retry<F>(&self, what: &str, build: F) -> Result<Vec<u8>>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut last_err = None;

        for attempt in 0..=self.options.max_retries {
            if attempt > 0 {
                let delay = Duration::from_millis(500 * (1u64 << (attempt - 1)));
                warn!(what, attempt, ?delay, "retrying");
                tokio::time::sleep(delay).await;
            }

            match build().send().await {
                Ok(resp) if resp.status().is_success() => {
                    return Ok(resp.bytes().await?.to_vec());
                }
                Ok(resp) => {
                    let status = resp.status();
                    let body: String = resp
                        .text()
                        .await
                        .unwrap_or_default()
                        .chars()
                        .take(MAX_ERROR_BODY)
                        .collect();
                    let err = ProviderError::Status {
                        what: what.to_string(),
                        status: status.as_u16(),
                        body,
                    };
                    if status.is_client_error() {
                        return Err(err);
                    }
                    last_err = Some(err);
                }
                Err(e) => last_err = Some(ProviderError::Http(e)),
            }
        }

        Err(last_err.unwrap_or_else(|| ProviderError::Network(format!("{what} failed"))))
    }
}

/// Body of a POST `next` link; `merge` overlays it on the original request.
fn next_body(link: &StacLink, params: &StacSearchParams) -> Result<serde_json::Value> {
    let encode = |e: serde_json::Error| ProviderError::Decode {
        what: "search parameters".into(),
        reason: e.to_string(),
    };

    match (&link.body, link.merge.unwrap_or(false)) {
        (Some(body), false) => Ok(body.clone()),
        (Some(body), true) => {
            let mut base = serde_json::to_value(params).map_err(encode)?;
            if let (Some(base), Some(overlay)) = (base.as_object_mut(), body.as_object()) {
                for (k, v) in overlay {
                    base.insert(k.clone(), v.clone());
                }
            }
            Ok(base)
        }
        (None, _) => serde_json::to_value(params).map_err(encode),
    }
}

fn decode_page(what: &str, bytes: &[u8]) -> Result<StacItemCollection> {
    serde_json::from_slice(bytes).map_err(|e| ProviderError::Decode {
        what: what.to_string(),
        reason: e.to_string(),
    })
}
