//! Digital-number to reflectance conversion.
//!
//! Raw catalog scenes carry integer digital numbers; the six reflective bands
//! are rescaled by a fixed factor to surface reflectance, with masked pixels
//! set to NaN so they propagate as no-data through every derived band.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use ndarray::Zip;

use crate::core::mask::CloudMask;
use crate::io::catalog::RawScene;
use crate::types::{
    ClassBand, DnBand, GeoTransform, ReflectanceBand, SpectraError, SpectraResult, SpectralBand,
};

/// Digital-number to reflectance factor for L2A surface reflectance products
pub const REFLECTANCE_SCALE: f32 = 0.0001;

/// A masked, reflectance-scaled scene.
///
/// Same cardinality as its source: one `ScaledScene` per `RawScene`, carrying
/// the timestamp, classification band, and metadata forward unchanged.
#[derive(Debug, Clone)]
pub struct ScaledScene {
    pub id: String,
    pub acquired: DateTime<Utc>,
    pub cloud_percent: f32,
    pub geo: GeoTransform,
    pub epsg: u32,
    pub bands: HashMap<SpectralBand, ReflectanceBand>,
    pub scl: ClassBand,
    pub properties: HashMap<String, String>,
}

impl ScaledScene {
    pub fn band(&self, band: SpectralBand) -> Option<&ReflectanceBand> {
        self.bands.get(&band)
    }

    /// Like `band`, but missing bands are an error the formulas can propagate
    pub fn require_band(&self, band: SpectralBand) -> SpectraResult<&ReflectanceBand> {
        self.bands
            .get(&band)
            .ok_or(SpectraError::MissingBand(band))
    }

    /// Raster dimensions (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.scl.dim()
    }

    /// Calendar date of the acquisition
    pub fn date(&self) -> NaiveDate {
        self.acquired.date_naive()
    }
}

/// Converts raw scenes to masked reflectance scenes
#[derive(Debug, Clone)]
pub struct ReflectanceScaler {
    scale_factor: f32,
}

impl Default for ReflectanceScaler {
    fn default() -> Self {
        Self::new(REFLECTANCE_SCALE)
    }
}

impl ReflectanceScaler {
    pub fn new(scale_factor: f32) -> Self {
        Self { scale_factor }
    }

    /// Scale one raw scene, applying the validity mask to every band
    pub fn scale(&self, raw: &RawScene, mask: &CloudMask) -> SpectraResult<ScaledScene> {
        log::debug!(
            "Scaling scene {} ({} bands, factor {})",
            raw.id,
            raw.bands.len(),
            self.scale_factor
        );

        let shape = raw.shape();
        let mut bands = HashMap::with_capacity(raw.bands.len());
        for (&band, dn) in &raw.bands {
            if dn.dim() != shape {
                return Err(SpectraError::ShapeMismatch {
                    expected: shape,
                    actual: dn.dim(),
                });
            }
            bands.insert(band, self.scale_band(dn, mask));
        }

        Ok(ScaledScene {
            id: raw.id.clone(),
            acquired: raw.acquired,
            cloud_percent: raw.cloud_percent,
            geo: raw.geo,
            epsg: raw.epsg,
            bands,
            scl: raw.scl.clone(),
            properties: raw.properties.clone(),
        })
    }

    fn scale_band(&self, dn: &DnBand, mask: &CloudMask) -> ReflectanceBand {
        let factor = self.scale_factor;
        Zip::from(dn)
            .and(mask.values())
            .map_collect(|&value, &valid| {
                if valid == 1 {
                    value as f32 * factor
                } else {
                    f32::NAN
                }
            })
    }

    /// Parallel per-band scaling for large scenes
    #[cfg(feature = "parallel")]
    pub fn scale_band_parallel(&self, dn: &DnBand, mask: &CloudMask) -> ReflectanceBand {
        let factor = self.scale_factor;
        Zip::from(dn)
            .and(mask.values())
            .par_map_collect(|&value, &valid| {
                if valid == 1 {
                    value as f32 * factor
                } else {
                    f32::NAN
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::mask::CloudMaskProcessor;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn raw_scene(scl: ClassBand) -> RawScene {
        let shape = scl.dim();
        let mut bands = HashMap::new();
        for band in SpectralBand::ALL {
            bands.insert(band, DnBand::from_elem(shape, 5000u16));
        }
        RawScene {
            id: "scene".to_string(),
            acquired: "2024-06-01T10:00:00Z".parse().unwrap(),
            cloud_percent: 5.0,
            geo: GeoTransform::north_up(0.0, 1.0, 0.5),
            epsg: 32720,
            bands,
            scl,
            properties: HashMap::new(),
        }
    }

    #[test]
    fn scales_digital_numbers_to_reflectance() {
        let raw = raw_scene(array![[4, 4], [4, 4]]);
        let mask = CloudMaskProcessor::default().compute(&raw.scl);
        let scaled = ReflectanceScaler::default().scale(&raw, &mask).unwrap();
        let nir = scaled.band(SpectralBand::Nir).unwrap();
        assert_relative_eq!(nir[[0, 0]], 0.5, epsilon = 1e-6);
    }

    #[test]
    fn masked_pixels_become_nan_in_every_band() {
        let raw = raw_scene(array![[9, 4], [4, 3]]);
        let mask = CloudMaskProcessor::default().compute(&raw.scl);
        let scaled = ReflectanceScaler::default().scale(&raw, &mask).unwrap();
        for band in SpectralBand::ALL {
            let values = scaled.band(band).unwrap();
            assert!(values[[0, 0]].is_nan());
            assert!(values[[1, 1]].is_nan());
            assert!(!values[[0, 1]].is_nan());
            assert!(!values[[1, 0]].is_nan());
        }
    }

    #[test]
    fn metadata_and_scl_carry_forward() {
        let raw = raw_scene(array![[4, 4], [4, 4]]);
        let mask = CloudMaskProcessor::default().compute(&raw.scl);
        let scaled = ReflectanceScaler::default().scale(&raw, &mask).unwrap();
        assert_eq!(scaled.id, raw.id);
        assert_eq!(scaled.acquired, raw.acquired);
        assert_eq!(scaled.scl, raw.scl);
        assert_eq!(scaled.epsg, 32720);
        assert_eq!(scaled.date(), "2024-06-01".parse().unwrap());
    }

    #[test]
    fn mismatched_band_shape_is_an_error() {
        let mut raw = raw_scene(array![[4, 4], [4, 4]]);
        raw.bands
            .insert(SpectralBand::Red, DnBand::from_elem((3, 3), 100u16));
        let mask = CloudMaskProcessor::default().compute(&raw.scl);
        let result = ReflectanceScaler::default().scale(&raw, &mask);
        assert!(matches!(
            result,
            Err(SpectraError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn missing_band_lookup() {
        let mut raw = raw_scene(array![[4]]);
        raw.bands.remove(&SpectralBand::Swir2);
        let mask = CloudMaskProcessor::default().compute(&raw.scl);
        let scaled = ReflectanceScaler::default().scale(&raw, &mask).unwrap();
        assert!(matches!(
            scaled.require_band(SpectralBand::Swir2),
            Err(SpectraError::MissingBand(SpectralBand::Swir2))
        ));
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn parallel_scaling_matches_sequential() {
        let raw = raw_scene(array![[4, 4], [4, 4]]);
        let mask = CloudMaskProcessor::default().compute(&raw.scl);
        let scaler = ReflectanceScaler::default();
        let scaled = scaler.scale(&raw, &mask).unwrap();
        let parallel = scaler.scale_band_parallel(raw.band(SpectralBand::Nir).unwrap(), &mask);
        assert_eq!(scaled.band(SpectralBand::Nir).unwrap(), &parallel);
    }
}
