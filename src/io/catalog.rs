//! Imagery catalog abstraction.
//!
//! The catalog owns the raw scenes; the pipeline only ever reads them. A
//! catalog is queried in two steps: `search` lists matching acquisitions as
//! lightweight descriptors, `open` materializes the full raster for one of
//! them. This keeps collection-level filtering cheap and lets callers pull
//! scenes one at a time.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::geometry::AreaOfInterest;
use crate::types::{
    BoundingBox, ClassBand, DateRange, DnBand, GeoTransform, SpectraError, SpectraResult,
    SpectralBand,
};

/// Scene-level cloud percentage property, as named by the catalog
pub const CLOUD_COVER_PROPERTY: &str = "CLOUDY_PIXEL_PERCENTAGE";

/// Catalog query: spatial bounds, acquisition window, cloud ceiling
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneQuery {
    pub bbox: BoundingBox,
    pub date_range: DateRange,
    /// Scenes at or above this percentage are excluded (strict comparison)
    pub max_cloud_percent: f32,
}

impl SceneQuery {
    pub fn new(aoi: &AreaOfInterest, date_range: DateRange, max_cloud_percent: f32) -> Self {
        Self {
            bbox: aoi.bounding_box(),
            date_range,
            max_cloud_percent,
        }
    }

    /// True if a scene's metadata passes all three filters
    pub fn matches(&self, bbox: &BoundingBox, acquired: DateTime<Utc>, cloud_percent: f32) -> bool {
        self.bbox.intersects(bbox)
            && self.date_range.contains(acquired)
            && cloud_percent < self.max_cloud_percent
    }
}

/// Lightweight scene listing returned by a search; enough to decide whether
/// the full raster is worth opening
#[derive(Debug, Clone, PartialEq)]
pub struct SceneDescriptor {
    pub id: String,
    pub acquired: DateTime<Utc>,
    pub cloud_percent: f32,
    pub bbox: BoundingBox,
}

/// One multispectral acquisition with raw digital-number bands and its
/// scene-classification band
#[derive(Debug, Clone)]
pub struct RawScene {
    pub id: String,
    pub acquired: DateTime<Utc>,
    pub cloud_percent: f32,
    pub geo: GeoTransform,
    pub epsg: u32,
    pub bands: HashMap<SpectralBand, DnBand>,
    pub scl: ClassBand,
    pub properties: HashMap<String, String>,
}

impl RawScene {
    pub fn band(&self, band: SpectralBand) -> Option<&DnBand> {
        self.bands.get(&band)
    }

    /// Scene-level metadata value, e.g. [`CLOUD_COVER_PROPERTY`]
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Raster dimensions (rows, cols), taken from the classification band
    pub fn shape(&self) -> (usize, usize) {
        self.scl.dim()
    }

    /// Footprint for north-up scenes (rotation terms ignored)
    pub fn bounding_box(&self) -> BoundingBox {
        let (rows, cols) = self.shape();
        let x0 = self.geo.top_left_x;
        let y0 = self.geo.top_left_y;
        let x1 = x0 + cols as f64 * self.geo.pixel_width;
        let y1 = y0 + rows as f64 * self.geo.pixel_height;
        BoundingBox {
            min_lon: x0.min(x1),
            max_lon: x0.max(x1),
            min_lat: y0.min(y1),
            max_lat: y0.max(y1),
        }
    }

    pub fn descriptor(&self) -> SceneDescriptor {
        SceneDescriptor {
            id: self.id.clone(),
            acquired: self.acquired,
            cloud_percent: self.cloud_percent,
            bbox: self.bounding_box(),
        }
    }
}

/// Source of raw scenes. Implementations must list search results in
/// chronological acquisition order and answer identical queries identically
/// as long as the underlying collection has not changed.
pub trait ImageryCatalog {
    /// List scenes matching the query
    fn search(&self, query: &SceneQuery) -> SpectraResult<Vec<SceneDescriptor>>;

    /// Materialize the full raster for one listed scene
    fn open(&self, descriptor: &SceneDescriptor) -> SpectraResult<RawScene>;
}

/// Catalog over an owned scene list; used in tests and for local snapshots
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    scenes: Vec<RawScene>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a scene list; scenes are kept in acquisition order
    pub fn with_scenes(mut scenes: Vec<RawScene>) -> Self {
        scenes.sort_by_key(|s| s.acquired);
        Self { scenes }
    }

    pub fn push(&mut self, scene: RawScene) {
        self.scenes.push(scene);
        self.scenes.sort_by_key(|s| s.acquired);
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }
}

impl ImageryCatalog for MemoryCatalog {
    fn search(&self, query: &SceneQuery) -> SpectraResult<Vec<SceneDescriptor>> {
        let matches: Vec<SceneDescriptor> = self
            .scenes
            .iter()
            .filter(|s| query.matches(&s.bounding_box(), s.acquired, s.cloud_percent))
            .map(|s| s.descriptor())
            .collect();
        log::debug!(
            "Catalog search: {} of {} scenes match {:?}..{:?} (cloud < {})",
            matches.len(),
            self.scenes.len(),
            query.date_range.start,
            query.date_range.end,
            query.max_cloud_percent
        );
        Ok(matches)
    }

    fn open(&self, descriptor: &SceneDescriptor) -> SpectraResult<RawScene> {
        self.scenes
            .iter()
            .find(|s| s.id == descriptor.id)
            .cloned()
            .ok_or_else(|| SpectraError::Catalog(format!("unknown scene id: {}", descriptor.id)))
    }
}
