//! Area-of-interest geometry: a simple polygon with the spatial predicates
//! the pipeline and reducers need.

use serde::{Deserialize, Serialize};

use crate::types::{BoundingBox, SpectraError, SpectraResult};

/// A geographic coordinate (longitude, latitude)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coord {
    pub lon: f64,
    pub lat: f64,
}

impl Coord {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }
}

/// Immutable polygonal area of interest.
///
/// Identity is the exterior ring. The AOI is only ever used as a spatial
/// filter and clip boundary; it is never mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaOfInterest {
    ring: Vec<Coord>,
    bbox: BoundingBox,
}

impl AreaOfInterest {
    /// Build from an exterior ring of at least three distinct vertices.
    ///
    /// The ring may be given open or closed; a closing duplicate of the first
    /// vertex is dropped.
    pub fn new(mut ring: Vec<Coord>) -> SpectraResult<Self> {
        if ring.len() > 1 && ring.first() == ring.last() {
            ring.pop();
        }
        if ring.len() < 3 {
            return Err(SpectraError::InvalidGeometry(format!(
                "polygon ring needs at least 3 vertices, got {}",
                ring.len()
            )));
        }

        let mut bbox = BoundingBox::new(f64::MAX, f64::MAX, f64::MIN, f64::MIN);
        for c in &ring {
            bbox.min_lon = bbox.min_lon.min(c.lon);
            bbox.max_lon = bbox.max_lon.max(c.lon);
            bbox.min_lat = bbox.min_lat.min(c.lat);
            bbox.max_lat = bbox.max_lat.max(c.lat);
        }

        Ok(Self { ring, bbox })
    }

    /// Axis-aligned rectangle AOI, the common case for drawn study areas
    pub fn rect(bbox: BoundingBox) -> Self {
        Self {
            ring: vec![
                Coord::new(bbox.min_lon, bbox.min_lat),
                Coord::new(bbox.max_lon, bbox.min_lat),
                Coord::new(bbox.max_lon, bbox.max_lat),
                Coord::new(bbox.min_lon, bbox.max_lat),
            ],
            bbox,
        }
    }

    /// Exterior ring vertices (open, not repeating the first vertex)
    pub fn ring(&self) -> &[Coord] {
        &self.ring
    }

    /// Bounding box of the exterior ring
    pub fn bounding_box(&self) -> BoundingBox {
        self.bbox
    }

    /// Even-odd point-in-polygon test.
    ///
    /// Points exactly on an edge may land on either side; the reducers sample
    /// pixel centers, so boundary pixels are a half-pixel question either way.
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        if !self.bbox.contains(lon, lat) {
            return false;
        }
        let mut inside = false;
        let n = self.ring.len();
        let mut j = n - 1;
        for i in 0..n {
            let a = self.ring[i];
            let b = self.ring[j];
            if (a.lat > lat) != (b.lat > lat)
                && lon < (b.lon - a.lon) * (lat - a.lat) / (b.lat - a.lat) + a.lon
            {
                inside = !inside;
            }
            j = i;
        }
        inside
    }

    /// Closed `[lon, lat]` ring in GeoJSON vertex order, for catalog and
    /// export payloads
    pub fn to_ring_coordinates(&self) -> Vec<[f64; 2]> {
        let mut coords: Vec<[f64; 2]> = self.ring.iter().map(|c| [c.lon, c.lat]).collect();
        if let Some(first) = coords.first().copied() {
            coords.push(first);
        }
        coords
    }
}
