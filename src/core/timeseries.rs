//! Spatial-mean time series of a spectral index over the area of interest.
//!
//! One sample per indexed scene: the arithmetic mean of the `INDEX` band over
//! AOI pixels, with no-data excluded. Scenes whose AOI intersection holds no
//! valid pixel keep their place in the series with an empty mean.

use chrono::NaiveDate;

use crate::core::index::IndexedScene;
use crate::geometry::AreaOfInterest;
use crate::types::{SpectraError, SpectraResult};

/// Default sampling resolution in meters
pub const DEFAULT_REDUCE_SCALE_M: f64 = 10.0;

/// Default cap on pixels visited per reduction
pub const DEFAULT_REDUCE_MAX_PIXELS: u64 = 1_000_000_000;

/// Parameters for the spatial-mean reducer
#[derive(Debug, Clone, Copy)]
pub struct ReduceParams {
    /// Sampling resolution in meters; resolutions coarser than the raster's
    /// native grid skip pixels accordingly
    pub scale_m: f64,
    /// Cap on pixels visited per scene
    pub max_pixels: u64,
}

impl Default for ReduceParams {
    fn default() -> Self {
        Self {
            scale_m: DEFAULT_REDUCE_SCALE_M,
            max_pixels: DEFAULT_REDUCE_MAX_PIXELS,
        }
    }
}

/// One time-series point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexSample {
    pub date: NaiveDate,
    /// Spatial mean over the AOI; `None` when no valid pixel fell inside
    pub mean: Option<f64>,
    pub valid_pixels: usize,
}

impl IndexSample {
    /// Date label in the chart's `YYYY-MM-DD` format
    pub fn date_label(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }
}

/// Arithmetic-mean reducer over the AOI
#[derive(Debug, Clone, Default)]
pub struct MeanReducer {
    params: ReduceParams,
}

impl MeanReducer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(params: ReduceParams) -> Self {
        Self { params }
    }

    /// Reduce one indexed scene to a time-series sample.
    ///
    /// Pixels are sampled at their centers; a pixel contributes when its
    /// center lies inside the AOI polygon and its value is not no-data.
    /// Accumulation runs in f64.
    pub fn reduce(&self, indexed: &IndexedScene, aoi: &AreaOfInterest) -> SpectraResult<IndexSample> {
        let (rows, cols) = indexed.shape();
        let native_scale = self.native_scale(indexed);
        let step = (self.params.scale_m / native_scale).round().max(1.0) as usize;

        let visited = ((rows + step - 1) / step) as u64 * ((cols + step - 1) / step) as u64;
        if visited > self.params.max_pixels {
            return Err(SpectraError::PixelBudgetExceeded {
                required: visited,
                budget: self.params.max_pixels,
            });
        }

        let geo = &indexed.scene.geo;
        let mut sum = 0.0f64;
        let mut count = 0usize;
        for row in (0..rows).step_by(step) {
            for col in (0..cols).step_by(step) {
                let value = indexed.values[[row, col]];
                if value.is_nan() {
                    continue;
                }
                let (lon, lat) = geo.pixel_to_geo(col, row);
                if !aoi.contains(lon, lat) {
                    continue;
                }
                sum += value as f64;
                count += 1;
            }
        }

        let mean = if count > 0 { Some(sum / count as f64) } else { None };
        log::debug!(
            "Reduced {} over {} pixels for {}: {:?}",
            indexed.index,
            count,
            indexed.date(),
            mean
        );

        Ok(IndexSample {
            date: indexed.date(),
            mean,
            valid_pixels: count,
        })
    }

    /// Reduce a whole sequence, keeping scene order
    pub fn reduce_series<I>(&self, scenes: I, aoi: &AreaOfInterest) -> SpectraResult<Vec<IndexSample>>
    where
        I: IntoIterator<Item = IndexedScene>,
    {
        let mut samples = Vec::new();
        for indexed in scenes {
            samples.push(self.reduce(&indexed, aoi)?);
        }
        log::info!("Time series reduced: {} samples", samples.len());
        Ok(samples)
    }

    /// Parallel series reduction using Rayon (if available)
    #[cfg(feature = "parallel")]
    pub fn reduce_series_parallel(
        &self,
        scenes: Vec<IndexedScene>,
        aoi: &AreaOfInterest,
    ) -> SpectraResult<Vec<IndexSample>> {
        use rayon::prelude::*;

        let samples: Result<Vec<IndexSample>, SpectraError> = scenes
            .into_par_iter()
            .map(|indexed| self.reduce(&indexed, aoi))
            .collect();
        let samples = samples?;
        log::info!("Time series reduced in parallel: {} samples", samples.len());
        Ok(samples)
    }

    /// Native ground resolution of the scene, assuming meters-per-pixel
    /// transforms; degenerate transforms fall back to the requested scale
    fn native_scale(&self, indexed: &IndexedScene) -> f64 {
        let width = indexed.scene.geo.pixel_width.abs();
        if width > 0.0 {
            width
        } else {
            self.params.scale_m
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::index::{IndexProcessor, SpectralIndex};
    use crate::core::scale::ScaledScene;
    use crate::geometry::{AreaOfInterest, Coord};
    use crate::types::{BoundingBox, GeoTransform, ReflectanceBand, SpectralBand};
    use approx::assert_relative_eq;
    use ndarray::array;
    use std::collections::HashMap;

    /// 2x2 scene on a 10 m grid covering x 0..20, y 0..20
    fn indexed_scene(nir: ReflectanceBand, red: ReflectanceBand) -> IndexedScene {
        let scl = array![[4, 4], [4, 4]];
        let mut bands = HashMap::new();
        bands.insert(SpectralBand::Nir, nir);
        bands.insert(SpectralBand::Red, red);
        let scene = ScaledScene {
            id: "scene".to_string(),
            acquired: "2024-06-01T10:00:00Z".parse().unwrap(),
            cloud_percent: 5.0,
            geo: GeoTransform::north_up(0.0, 20.0, 10.0),
            epsg: 32720,
            bands,
            scl,
            properties: HashMap::new(),
        };
        IndexProcessor::new()
            .compute(scene, SpectralIndex::Ndvi)
            .unwrap()
    }

    fn full_aoi() -> AreaOfInterest {
        AreaOfInterest::rect(BoundingBox::new(0.0, 0.0, 20.0, 20.0))
    }

    #[test]
    fn mean_over_uniform_scene() {
        let indexed = indexed_scene(
            ReflectanceBand::from_elem((2, 2), 0.5),
            ReflectanceBand::from_elem((2, 2), 0.1),
        );
        let sample = MeanReducer::new().reduce(&indexed, &full_aoi()).unwrap();
        assert_eq!(sample.valid_pixels, 4);
        assert_relative_eq!(sample.mean.unwrap(), 2.0 / 3.0, epsilon = 1e-6);
        assert_eq!(sample.date_label(), "2024-06-01");
    }

    #[test]
    fn nodata_pixels_are_excluded() {
        let indexed = indexed_scene(
            array![[0.5, f32::NAN], [0.5, f32::NAN]],
            array![[0.1, 0.1], [0.1, 0.1]],
        );
        let sample = MeanReducer::new().reduce(&indexed, &full_aoi()).unwrap();
        assert_eq!(sample.valid_pixels, 2);
        assert_relative_eq!(sample.mean.unwrap(), 2.0 / 3.0, epsilon = 1e-6);
    }

    #[test]
    fn pixels_outside_aoi_are_excluded() {
        // left column centers are at x = 5, right at x = 15
        let left_half = AreaOfInterest::new(vec![
            Coord::new(0.0, 0.0),
            Coord::new(10.0, 0.0),
            Coord::new(10.0, 20.0),
            Coord::new(0.0, 20.0),
        ])
        .unwrap();
        let indexed = indexed_scene(
            array![[0.9, 0.0], [0.9, 0.0]],
            array![[0.1, 0.0], [0.1, 0.0]],
        );
        let sample = MeanReducer::new().reduce(&indexed, &left_half).unwrap();
        assert_eq!(sample.valid_pixels, 2);
        assert_relative_eq!(sample.mean.unwrap(), 0.8, epsilon = 1e-6);
    }

    #[test]
    fn all_nodata_scene_has_empty_mean() {
        let indexed = indexed_scene(
            ReflectanceBand::from_elem((2, 2), f32::NAN),
            ReflectanceBand::from_elem((2, 2), 0.1),
        );
        let sample = MeanReducer::new().reduce(&indexed, &full_aoi()).unwrap();
        assert_eq!(sample.mean, None);
        assert_eq!(sample.valid_pixels, 0);
    }

    #[test]
    fn coarse_scale_skips_pixels() {
        let indexed = indexed_scene(
            ReflectanceBand::from_elem((2, 2), 0.5),
            ReflectanceBand::from_elem((2, 2), 0.1),
        );
        let reducer = MeanReducer::with_params(ReduceParams {
            scale_m: 20.0,
            ..ReduceParams::default()
        });
        let sample = reducer.reduce(&indexed, &full_aoi()).unwrap();
        assert_eq!(sample.valid_pixels, 1);
    }

    #[test]
    fn pixel_budget_is_enforced() {
        let indexed = indexed_scene(
            ReflectanceBand::from_elem((2, 2), 0.5),
            ReflectanceBand::from_elem((2, 2), 0.1),
        );
        let reducer = MeanReducer::with_params(ReduceParams {
            max_pixels: 3,
            ..ReduceParams::default()
        });
        let result = reducer.reduce(&indexed, &full_aoi());
        assert!(matches!(
            result,
            Err(SpectraError::PixelBudgetExceeded {
                required: 4,
                budget: 3
            })
        ));
    }

    #[test]
    fn series_keeps_scene_order() {
        let first = indexed_scene(
            ReflectanceBand::from_elem((2, 2), 0.5),
            ReflectanceBand::from_elem((2, 2), 0.1),
        );
        let mut second = indexed_scene(
            ReflectanceBand::from_elem((2, 2), 0.3),
            ReflectanceBand::from_elem((2, 2), 0.1),
        );
        second.scene.acquired = "2024-06-11T10:00:00Z".parse().unwrap();

        let samples = MeanReducer::new()
            .reduce_series(vec![first, second], &full_aoi())
            .unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].date_label(), "2024-06-01");
        assert_eq!(samples[1].date_label(), "2024-06-11");
        assert!(samples[0].mean.unwrap() > samples[1].mean.unwrap());
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn parallel_series_matches_sequential() {
        let scenes = || {
            let first = indexed_scene(
                ReflectanceBand::from_elem((2, 2), 0.5),
                ReflectanceBand::from_elem((2, 2), 0.1),
            );
            let mut second = indexed_scene(
                array![[0.3, f32::NAN], [0.3, 0.3]],
                ReflectanceBand::from_elem((2, 2), 0.1),
            );
            second.scene.acquired = "2024-06-11T10:00:00Z".parse().unwrap();
            vec![first, second]
        };

        let reducer = MeanReducer::new();
        let sequential = reducer.reduce_series(scenes(), &full_aoi()).unwrap();
        let parallel = reducer
            .reduce_series_parallel(scenes(), &full_aoi())
            .unwrap();
        assert_eq!(sequential, parallel);
    }
}
