use chrono::{DateTime, NaiveDate, Utc};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Raw digital-number band values as delivered by the catalog
pub type DnBand = Array2<u16>;

/// Reflectance-scaled band values (NaN marks no-data)
pub type ReflectanceBand = Array2<f32>;

/// Per-pixel scene classification band
pub type ClassBand = Array2<u8>;

/// Reflective Sentinel-2 bands used by the index formulas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpectralBand {
    /// B2, ~490 nm
    Blue,
    /// B3, ~560 nm
    Green,
    /// B4, ~665 nm
    Red,
    /// B8, ~842 nm
    Nir,
    /// B11, ~1610 nm
    Swir1,
    /// B12, ~2190 nm
    Swir2,
}

impl SpectralBand {
    /// All bands the preprocessing pipeline rescales, in band-number order
    pub const ALL: [SpectralBand; 6] = [
        SpectralBand::Blue,
        SpectralBand::Green,
        SpectralBand::Red,
        SpectralBand::Nir,
        SpectralBand::Swir1,
        SpectralBand::Swir2,
    ];

    /// Catalog band code, e.g. "B8"
    pub fn code(&self) -> &'static str {
        match self {
            SpectralBand::Blue => "B2",
            SpectralBand::Green => "B3",
            SpectralBand::Red => "B4",
            SpectralBand::Nir => "B8",
            SpectralBand::Swir1 => "B11",
            SpectralBand::Swir2 => "B12",
        }
    }

    /// Parse a catalog band code back into a band
    pub fn from_code(code: &str) -> Option<SpectralBand> {
        match code {
            "B2" => Some(SpectralBand::Blue),
            "B3" => Some(SpectralBand::Green),
            "B4" => Some(SpectralBand::Red),
            "B8" => Some(SpectralBand::Nir),
            "B11" => Some(SpectralBand::Swir1),
            "B12" => Some(SpectralBand::Swir2),
            _ => None,
        }
    }
}

impl std::fmt::Display for SpectralBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Scene classification classes of the Sentinel-2 L2A SCL band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SceneClass {
    NoData = 0,
    SaturatedOrDefective = 1,
    DarkAreaPixels = 2,
    CloudShadow = 3,
    Vegetation = 4,
    NotVegetated = 5,
    Water = 6,
    Unclassified = 7,
    CloudMediumProbability = 8,
    CloudHighProbability = 9,
    ThinCirrus = 10,
    SnowOrIce = 11,
}

impl SceneClass {
    /// Integer class code as stored in the SCL band
    pub fn code(&self) -> u8 {
        *self as u8
    }

    /// Decode an SCL pixel value
    pub fn from_code(code: u8) -> Option<SceneClass> {
        match code {
            0 => Some(SceneClass::NoData),
            1 => Some(SceneClass::SaturatedOrDefective),
            2 => Some(SceneClass::DarkAreaPixels),
            3 => Some(SceneClass::CloudShadow),
            4 => Some(SceneClass::Vegetation),
            5 => Some(SceneClass::NotVegetated),
            6 => Some(SceneClass::Water),
            7 => Some(SceneClass::Unclassified),
            8 => Some(SceneClass::CloudMediumProbability),
            9 => Some(SceneClass::CloudHighProbability),
            10 => Some(SceneClass::ThinCirrus),
            11 => Some(SceneClass::SnowOrIce),
            _ => None,
        }
    }

    /// Human-readable label, as used in mask statistics logs
    pub fn description(&self) -> &'static str {
        match self {
            SceneClass::NoData => "no data",
            SceneClass::SaturatedOrDefective => "saturated or defective",
            SceneClass::DarkAreaPixels => "dark area pixels",
            SceneClass::CloudShadow => "cloud shadow",
            SceneClass::Vegetation => "vegetation",
            SceneClass::NotVegetated => "not vegetated",
            SceneClass::Water => "water",
            SceneClass::Unclassified => "unclassified",
            SceneClass::CloudMediumProbability => "cloud medium probability",
            SceneClass::CloudHighProbability => "cloud high probability",
            SceneClass::ThinCirrus => "thin cirrus",
            SceneClass::SnowOrIce => "snow or ice",
        }
    }
}

/// Classes excluded by the default cloud mask
pub const DEFAULT_MASKED_CLASSES: [SceneClass; 5] = [
    SceneClass::SaturatedOrDefective,
    SceneClass::CloudShadow,
    SceneClass::CloudMediumProbability,
    SceneClass::CloudHighProbability,
    SceneClass::ThinCirrus,
];

/// Geospatial bounding box in geographic coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            max_lon,
            min_lat,
            max_lat,
        }
    }

    /// True if the two boxes overlap (touching edges count)
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_lon <= other.max_lon
            && self.max_lon >= other.min_lon
            && self.min_lat <= other.max_lat
            && self.max_lat >= other.min_lat
    }

    /// True if a point lies inside or on the boundary
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        lon >= self.min_lon && lon <= self.max_lon && lat >= self.min_lat && lat <= self.max_lat
    }
}

/// Geospatial transformation parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub top_left_x: f64,
    pub pixel_width: f64,
    pub rotation_x: f64,
    pub top_left_y: f64,
    pub rotation_y: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    /// North-up transform with square pixels (pixel_height is negative)
    pub fn north_up(top_left_x: f64, top_left_y: f64, pixel_size: f64) -> Self {
        Self {
            top_left_x,
            pixel_width: pixel_size,
            rotation_x: 0.0,
            top_left_y,
            rotation_y: 0.0,
            pixel_height: -pixel_size,
        }
    }

    /// Geographic coordinates of a pixel center
    pub fn pixel_to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        let col_f = col as f64 + 0.5;
        let row_f = row as f64 + 0.5;
        let x = self.top_left_x + col_f * self.pixel_width + row_f * self.rotation_x;
        let y = self.top_left_y + col_f * self.rotation_y + row_f * self.pixel_height;
        (x, y)
    }
}

/// Acquisition date interval: start inclusive, end exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// The one-day range [date, date + 1d), for single-acquisition lookups
    pub fn single_day(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date + chrono::Duration::days(1),
        }
    }

    /// True if the timestamp's calendar date falls inside the range
    pub fn contains(&self, time: DateTime<Utc>) -> bool {
        let date = time.date_naive();
        date >= self.start && date < self.end
    }
}

/// Error types for imagery processing
#[derive(Debug, thiserror::Error)]
pub enum SpectraError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Scene is missing band {0}")]
    MissingBand(SpectralBand),

    #[error("Band shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("Unknown spectral index: {0}")]
    UnknownIndex(String),

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Invalid export scale: {0}")]
    InvalidScale(String),

    #[error("No image found for {date}")]
    ImageNotFound { date: NaiveDate },

    #[error("No spectral index selected")]
    NoIndexSelected,

    #[error("No acquisition date selected")]
    NoDateSelected,

    #[error("Pixel budget exceeded: {required} pixels requested, budget is {budget}")]
    PixelBudgetExceeded { required: u64, budget: u64 },

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for imagery operations
pub type SpectraResult<T> = Result<T, SpectraError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_codes_round_trip() {
        for band in SpectralBand::ALL {
            assert_eq!(SpectralBand::from_code(band.code()), Some(band));
        }
        assert_eq!(SpectralBand::from_code("B99"), None);
    }

    #[test]
    fn default_mask_class_codes() {
        let codes: Vec<u8> = DEFAULT_MASKED_CLASSES.iter().map(|c| c.code()).collect();
        assert_eq!(codes, vec![1, 3, 8, 9, 10]);
    }

    #[test]
    fn date_range_is_end_exclusive() {
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
        );
        let inside = "2024-06-01T10:30:00Z".parse::<DateTime<Utc>>().unwrap();
        let last = "2024-06-29T23:59:59Z".parse::<DateTime<Utc>>().unwrap();
        let end = "2024-06-30T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        assert!(range.contains(inside));
        assert!(range.contains(last));
        assert!(!range.contains(end));
    }

    #[test]
    fn single_day_range_covers_one_date() {
        let day = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let range = DateRange::single_day(day);
        assert!(range.contains("2024-06-01T00:00:00Z".parse().unwrap()));
        assert!(!range.contains("2024-06-02T00:00:00Z".parse().unwrap()));
    }

    #[test]
    fn bounding_box_intersection() {
        let a = BoundingBox::new(-66.5, -39.9, -66.0, -39.5);
        let b = BoundingBox::new(-66.2, -39.7, -65.8, -39.3);
        let c = BoundingBox::new(-60.0, -30.0, -59.0, -29.0);
        assert!(a.intersects(&b));
        assert!(b.intersects(&a));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn pixel_to_geo_uses_pixel_centers() {
        let gt = GeoTransform::north_up(100.0, 200.0, 10.0);
        let (x, y) = gt.pixel_to_geo(0, 0);
        assert_eq!(x, 105.0);
        assert_eq!(y, 195.0);
        let (x, y) = gt.pixel_to_geo(2, 1);
        assert_eq!(x, 125.0);
        assert_eq!(y, 185.0);
    }
}
