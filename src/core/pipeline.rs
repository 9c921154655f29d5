//! The preprocessing pipeline: catalog filtering, cloud masking, and
//! reflectance scaling, producing scenes lazily one at a time.

use chrono::NaiveDate;

use crate::core::mask::CloudMaskProcessor;
use crate::core::scale::{ReflectanceScaler, ScaledScene, REFLECTANCE_SCALE};
use crate::geometry::AreaOfInterest;
use crate::io::catalog::{ImageryCatalog, RawScene, SceneDescriptor, SceneQuery};
use crate::types::{DateRange, SceneClass, SpectraResult, DEFAULT_MASKED_CLASSES};

/// Default ceiling on scene-level cloud percentage
pub const DEFAULT_MAX_CLOUD_PERCENT: f32 = 20.0;

/// Tunables for the preprocessing stage. The defaults reproduce the standard
/// explorer behavior; changing them changes which pixels survive.
#[derive(Debug, Clone)]
pub struct PreprocessParams {
    /// Scenes at or above this percentage are dropped
    pub max_cloud_percent: f32,
    /// SCL classes masked to no-data
    pub masked_classes: Vec<SceneClass>,
    /// Digital-number to reflectance factor
    pub reflectance_scale: f32,
}

impl Default for PreprocessParams {
    fn default() -> Self {
        Self {
            max_cloud_percent: DEFAULT_MAX_CLOUD_PERCENT,
            masked_classes: DEFAULT_MASKED_CLASSES.to_vec(),
            reflectance_scale: REFLECTANCE_SCALE,
        }
    }
}

/// Filters the catalog and turns raw scenes into masked reflectance scenes
#[derive(Debug, Clone)]
pub struct Preprocessor {
    params: PreprocessParams,
    masker: CloudMaskProcessor,
    scaler: ReflectanceScaler,
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new()
    }
}

impl Preprocessor {
    pub fn new() -> Self {
        Self::with_params(PreprocessParams::default())
    }

    pub fn with_params(params: PreprocessParams) -> Self {
        let masker = CloudMaskProcessor::new(&params.masked_classes);
        let scaler = ReflectanceScaler::new(params.reflectance_scale);
        Self {
            params,
            masker,
            scaler,
        }
    }

    pub fn params(&self) -> &PreprocessParams {
        &self.params
    }

    /// The catalog query these parameters produce for an AOI and date window
    pub fn query(&self, aoi: &AreaOfInterest, date_range: DateRange) -> SceneQuery {
        SceneQuery::new(aoi, date_range, self.params.max_cloud_percent)
    }

    /// Lazily preprocess every matching scene, in catalog (chronological)
    /// order.
    ///
    /// The iterator opens one raw scene per step; the collection is never
    /// materialized whole. Re-running the same arguments against an unchanged
    /// catalog yields an identical sequence.
    pub fn preprocess<'a, C: ImageryCatalog>(
        &'a self,
        catalog: &'a C,
        aoi: &AreaOfInterest,
        date_range: DateRange,
    ) -> SpectraResult<ScaledSceneIter<'a, C>> {
        let descriptors = catalog.search(&self.query(aoi, date_range))?;
        log::info!(
            "Preprocessing {} scenes in {}..{} (cloud < {})",
            descriptors.len(),
            date_range.start,
            date_range.end,
            self.params.max_cloud_percent
        );
        Ok(ScaledSceneIter {
            preprocessor: self,
            catalog,
            descriptors: descriptors.into_iter(),
        })
    }

    /// Distinct acquisition dates of the matching scenes, chronological
    pub fn available_dates<C: ImageryCatalog>(
        &self,
        catalog: &C,
        aoi: &AreaOfInterest,
        date_range: DateRange,
    ) -> SpectraResult<Vec<NaiveDate>> {
        let descriptors = catalog.search(&self.query(aoi, date_range))?;
        let mut dates: Vec<NaiveDate> = descriptors
            .iter()
            .map(|d| d.acquired.date_naive())
            .collect();
        dates.dedup();
        Ok(dates)
    }

    /// Mask and scale one raw scene
    pub fn process_scene(&self, raw: &RawScene) -> SpectraResult<ScaledScene> {
        let mask = self.masker.compute(&raw.scl);
        self.scaler.scale(raw, &mask)
    }
}

/// Lazy producer of scaled scenes; one catalog open per step
pub struct ScaledSceneIter<'a, C: ImageryCatalog> {
    preprocessor: &'a Preprocessor,
    catalog: &'a C,
    descriptors: std::vec::IntoIter<SceneDescriptor>,
}

impl<'a, C: ImageryCatalog> ScaledSceneIter<'a, C> {
    /// Scenes remaining in the sequence
    pub fn remaining(&self) -> usize {
        self.descriptors.len()
    }
}

impl<'a, C: ImageryCatalog> Iterator for ScaledSceneIter<'a, C> {
    type Item = SpectraResult<ScaledScene>;

    fn next(&mut self) -> Option<Self::Item> {
        let descriptor = self.descriptors.next()?;
        Some(
            self.catalog
                .open(&descriptor)
                .and_then(|raw| self.preprocessor.process_scene(&raw)),
        )
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.descriptors.size_hint()
    }
}
