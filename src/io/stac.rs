//! Blocking STAC client for scene discovery.
//!
//! Covers the subset of STAC Item Search (`POST /search`) that catalog
//! discovery needs: bbox, datetime and collection filtering, pagination, and
//! asset listings. Discovery only returns [`SceneDescriptor`]s; materializing
//! pixels from the listed assets is the caller's concern.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::io::catalog::{SceneDescriptor, SceneQuery};
use crate::types::{BoundingBox, SpectraError, SpectraResult};

/// AWS Earth Search root, the public catalog carrying Sentinel-2 L2A
pub const EARTH_SEARCH_URL: &str = "https://earth-search.aws.element84.com/v1";

/// Collection id for Sentinel-2 level-2A surface reflectance
pub const SENTINEL2_L2A_COLLECTION: &str = "sentinel-2-l2a";

/// Body for `POST /search`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StacSearchParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<Vec<f64>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub datetime: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub collections: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,

    /// Pagination token for the next page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl StacSearchParams {
    pub fn new() -> Self {
        Self {
            bbox: None,
            datetime: None,
            collections: None,
            limit: None,
            token: None,
        }
    }

    /// Bounding box filter `[west, south, east, north]`
    pub fn bbox(mut self, west: f64, south: f64, east: f64, north: f64) -> Self {
        self.bbox = Some(vec![west, south, east, north]);
        self
    }

    /// Datetime or datetime interval, e.g. `"2024-06-01/2024-06-30"`
    pub fn datetime(mut self, dt: &str) -> Self {
        self.datetime = Some(dt.to_string());
        self
    }

    pub fn collections(mut self, cols: &[&str]) -> Self {
        self.collections = Some(cols.iter().map(|s| s.to_string()).collect());
        self
    }

    /// Maximum items per page
    pub fn limit(mut self, n: u32) -> Self {
        self.limit = Some(n);
        self
    }
}

impl Default for StacSearchParams {
    fn default() -> Self {
        Self::new()
    }
}

/// A STAC Item Collection (GeoJSON FeatureCollection)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StacItemCollection {
    #[serde(rename = "type")]
    pub type_: String,

    pub features: Vec<StacItem>,

    #[serde(default)]
    pub links: Vec<StacLink>,
}

impl StacItemCollection {
    /// The `"next"` pagination link, if any
    pub fn next_link(&self) -> Option<&StacLink> {
        self.links.iter().find(|l| l.rel == "next")
    }
}

/// A single STAC Item (GeoJSON Feature)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StacItem {
    #[serde(rename = "type")]
    pub type_: String,

    pub id: String,

    /// Footprint `[west, south, east, north]`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<Vec<f64>>,

    pub properties: StacItemProperties,

    #[serde(default)]
    pub assets: HashMap<String, StacAsset>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
}

impl StacItem {
    /// Acquisition timestamp parsed from the `datetime` property
    pub fn acquired(&self) -> Option<DateTime<Utc>> {
        self.properties.datetime.as_deref()?.parse().ok()
    }

    /// EPSG code from the projection extension, when present
    pub fn epsg(&self) -> Option<u32> {
        self.properties
            .extra
            .get("proj:epsg")
            .and_then(|v| v.as_u64())
            .map(|v| v as u32)
    }

    pub fn asset(&self, key: &str) -> Option<&StacAsset> {
        self.assets.get(key)
    }

    /// Convert to a catalog descriptor; `None` when the item lacks a
    /// parseable datetime, a cloud-cover value, or a 2D bbox
    pub fn to_descriptor(&self) -> Option<SceneDescriptor> {
        let acquired = self.acquired()?;
        let cloud_percent = self.properties.eo_cloud_cover? as f32;
        let bbox = self.bbox.as_ref().filter(|b| b.len() >= 4)?;
        Some(SceneDescriptor {
            id: self.id.clone(),
            acquired,
            cloud_percent,
            bbox: BoundingBox::new(bbox[0], bbox[1], bbox[2], bbox[3]),
        })
    }
}

/// STAC Item properties
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StacItemProperties {
    /// ISO 8601 acquisition datetime
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datetime: Option<String>,

    /// Cloud cover percentage (EO extension)
    #[serde(rename = "eo:cloud_cover", skip_serializing_if = "Option::is_none")]
    pub eo_cloud_cover: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,

    /// Properties not modelled explicitly
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// A STAC asset (file reference); hrefs are what an external pixel
/// materializer reads
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StacAsset {
    pub href: String,

    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,
}

/// A STAC link, used for pagination
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StacLink {
    pub rel: String,
    pub href: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    /// Body for POST pagination links; usually just carries the next token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
}

impl StacLink {
    /// Pagination token from a POST link body
    pub fn token(&self) -> Option<&str> {
        self.body.as_ref()?.get("token")?.as_str()
    }
}

/// Options for [`StacSearchClient`]
#[derive(Debug, Clone)]
pub struct StacSearchOptions {
    /// Per-request timeout
    pub request_timeout: Duration,
    /// Attempts per request before giving up
    pub max_retries: u32,
    /// Wait between attempts
    pub retry_delay: Duration,
    /// Items per page requested from the catalog
    pub page_limit: u32,
    /// Cap on total items fetched across pages
    pub max_items: usize,
}

impl Default for StacSearchOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_delay: Duration::from_secs(2),
            page_limit: 100,
            max_items: 1000,
        }
    }
}

/// Blocking client for STAC Item Search
pub struct StacSearchClient {
    search_url: String,
    client: reqwest::blocking::Client,
    options: StacSearchOptions,
}

impl StacSearchClient {
    /// Client for a STAC API root or `/search` URL with default options
    pub fn new(endpoint: &str) -> SpectraResult<Self> {
        Self::with_options(endpoint, StacSearchOptions::default())
    }

    /// Client for the public Earth Search catalog
    pub fn earth_search() -> SpectraResult<Self> {
        Self::new(EARTH_SEARCH_URL)
    }

    pub fn with_options(endpoint: &str, options: StacSearchOptions) -> SpectraResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(options.request_timeout)
            .user_agent("specterra/0.2.0 (Spectral Index Explorer)")
            .build()?;

        Ok(Self {
            search_url: Self::normalize_search_url(endpoint),
            client,
            options,
        })
    }

    /// Append `/search` unless the endpoint already points at it
    fn normalize_search_url(endpoint: &str) -> String {
        let base = endpoint.trim_end_matches('/');
        if base.ends_with("/search") {
            base.to_string()
        } else {
            format!("{}/search", base)
        }
    }

    pub fn search_url(&self) -> &str {
        &self.search_url
    }

    /// Execute one search request and return a single page of results
    pub fn search(&self, params: &StacSearchParams) -> SpectraResult<StacItemCollection> {
        self.post_search(&self.search_url, params)
    }

    /// Fetch all pages up to the configured item cap
    pub fn search_all(&self, params: &StacSearchParams) -> SpectraResult<Vec<StacItem>> {
        let mut items = Vec::new();
        let mut page = self.search(params)?;

        loop {
            items.extend(page.features.drain(..));
            let next = match page.next_link() {
                Some(link) => link.clone(),
                None => break,
            };
            if items.len() >= self.options.max_items {
                log::warn!(
                    "STAC search truncated at {} items, more pages were available",
                    self.options.max_items
                );
                break;
            }
            page = self.follow_next(&next, params)?;
            // a cycling endpoint can hand back empty pages with a next link
            // forever; an empty page means there is nothing left to collect
            if page.features.is_empty() {
                log::debug!("STAC pagination returned an empty page, stopping");
                break;
            }
        }

        items.truncate(self.options.max_items);
        Ok(items)
    }

    /// Run a catalog query against a collection and convert the hits to
    /// chronologically ordered scene descriptors.
    ///
    /// The catalog pre-filters by bbox and datetime; the query is re-applied
    /// locally so the strict cloud ceiling and the end-exclusive date window
    /// hold regardless of the endpoint's interval semantics.
    pub fn find_scenes(
        &self,
        collection: &str,
        query: &SceneQuery,
    ) -> SpectraResult<Vec<SceneDescriptor>> {
        let params = StacSearchParams::new()
            .bbox(
                query.bbox.min_lon,
                query.bbox.min_lat,
                query.bbox.max_lon,
                query.bbox.max_lat,
            )
            .datetime(&format!(
                "{}/{}",
                query.date_range.start, query.date_range.end
            ))
            .collections(&[collection])
            .limit(self.options.page_limit);

        let items = self.search_all(&params)?;
        let total = items.len();

        let mut scenes: Vec<SceneDescriptor> = items
            .iter()
            .filter_map(|item| match item.to_descriptor() {
                Some(d) => Some(d),
                None => {
                    log::debug!("Skipping STAC item {} without usable metadata", item.id);
                    None
                }
            })
            .filter(|d| query.matches(&d.bbox, d.acquired, d.cloud_percent))
            .collect();
        scenes.sort_by_key(|d| d.acquired);

        log::info!(
            "STAC search: {} of {} items in '{}' usable (cloud < {})",
            scenes.len(),
            total,
            collection,
            query.max_cloud_percent
        );
        Ok(scenes)
    }

    fn post_search(
        &self,
        url: &str,
        params: &StacSearchParams,
    ) -> SpectraResult<StacItemCollection> {
        let mut last_error: Option<SpectraError> = None;

        for attempt in 1..=self.options.max_retries {
            if attempt > 1 {
                log::warn!(
                    "STAC search attempt {} of {} failed, retrying...",
                    attempt - 1,
                    self.options.max_retries
                );
                std::thread::sleep(self.options.retry_delay);
            }

            let response = match self.client.post(url).json(params).send() {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(SpectraError::Http(e));
                    continue;
                }
            };

            let status = response.status();
            if status.is_success() {
                return Ok(response.json()?);
            }

            let body = response.text().unwrap_or_default();
            let error = SpectraError::Catalog(format!(
                "STAC search returned HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            ));
            // client errors will not get better on retry
            if status.is_client_error() {
                return Err(error);
            }
            last_error = Some(error);
        }

        Err(last_error
            .unwrap_or_else(|| SpectraError::Catalog("STAC search failed".to_string())))
    }

    /// Follow a pagination link: POST links re-run the search with the next
    /// token, plain links are fetched with GET
    fn follow_next(
        &self,
        link: &StacLink,
        original: &StacSearchParams,
    ) -> SpectraResult<StacItemCollection> {
        let method = link.method.as_deref().unwrap_or("GET");
        if method.eq_ignore_ascii_case("POST") {
            let mut params = original.clone();
            if let Some(token) = link.token() {
                params.token = Some(token.to_string());
            }
            self.post_search(&link.href, &params)
        } else {
            let response = self.client.get(&link.href).send()?;
            let status = response.status();
            if !status.is_success() {
                return Err(SpectraError::Catalog(format!(
                    "STAC pagination returned HTTP {}",
                    status
                )));
            }
            Ok(response.json()?)
        }
    }
}
