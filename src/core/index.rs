//! Spectral index computation.
//!
//! Each index is a pure per-pixel formula over reflectance bands. NaN inputs
//! propagate to NaN outputs and vanishing denominators produce NaN instead of
//! infinities, so no-data survives every formula unchanged.

use std::str::FromStr;

use chrono::NaiveDate;
use ndarray::Zip;

use crate::core::scale::ScaledScene;
use crate::types::{ReflectanceBand, SpectraError, SpectraResult, SpectralBand};

/// Name of the derived band carried by an [`IndexedScene`]
pub const INDEX_BAND_NAME: &str = "INDEX";

/// Denominators smaller than this are treated as division by zero
const DENOM_EPSILON: f32 = 1e-10;

/// Supported spectral indices, in selector listing order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpectralIndex {
    Ndwi,
    Ndvi,
    Mndwi,
    Ndbi,
    Savi,
    Evi,
    Nbr,
}

impl SpectralIndex {
    pub const ALL: [SpectralIndex; 7] = [
        SpectralIndex::Ndwi,
        SpectralIndex::Ndvi,
        SpectralIndex::Mndwi,
        SpectralIndex::Ndbi,
        SpectralIndex::Savi,
        SpectralIndex::Evi,
        SpectralIndex::Nbr,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SpectralIndex::Ndwi => "NDWI",
            SpectralIndex::Ndvi => "NDVI",
            SpectralIndex::Mndwi => "MNDWI",
            SpectralIndex::Ndbi => "NDBI",
            SpectralIndex::Savi => "SAVI",
            SpectralIndex::Evi => "EVI",
            SpectralIndex::Nbr => "NBR",
        }
    }

    /// Bands the formula reads
    pub fn required_bands(&self) -> &'static [SpectralBand] {
        match self {
            SpectralIndex::Ndvi | SpectralIndex::Savi => {
                &[SpectralBand::Nir, SpectralBand::Red]
            }
            SpectralIndex::Ndwi => &[SpectralBand::Green, SpectralBand::Nir],
            SpectralIndex::Mndwi => &[SpectralBand::Green, SpectralBand::Swir1],
            SpectralIndex::Ndbi => &[SpectralBand::Swir1, SpectralBand::Nir],
            SpectralIndex::Evi => &[
                SpectralBand::Nir,
                SpectralBand::Red,
                SpectralBand::Blue,
            ],
            SpectralIndex::Nbr => &[SpectralBand::Nir, SpectralBand::Swir2],
        }
    }
}

impl std::fmt::Display for SpectralIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for SpectralIndex {
    type Err = SpectraError;

    /// Exact, case-sensitive match; any other name is rejected
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NDWI" => Ok(SpectralIndex::Ndwi),
            "NDVI" => Ok(SpectralIndex::Ndvi),
            "MNDWI" => Ok(SpectralIndex::Mndwi),
            "NDBI" => Ok(SpectralIndex::Ndbi),
            "SAVI" => Ok(SpectralIndex::Savi),
            "EVI" => Ok(SpectralIndex::Evi),
            "NBR" => Ok(SpectralIndex::Nbr),
            other => Err(SpectraError::UnknownIndex(other.to_string())),
        }
    }
}

/// Parameters for SAVI
#[derive(Debug, Clone, Copy)]
pub struct SaviParams {
    /// Soil brightness correction factor (0 = high vegetation, 1 = low)
    pub l_factor: f32,
}

impl Default for SaviParams {
    fn default() -> Self {
        Self { l_factor: 0.5 }
    }
}

/// Parameters for EVI
#[derive(Debug, Clone, Copy)]
pub struct EviParams {
    /// Gain factor
    pub g: f32,
    /// Aerosol coefficient for the red band
    pub c1: f32,
    /// Aerosol coefficient for the blue band
    pub c2: f32,
    /// Canopy background adjustment
    pub l: f32,
}

impl Default for EviParams {
    fn default() -> Self {
        Self {
            g: 2.5,
            c1: 6.0,
            c2: 7.5,
            l: 1.0,
        }
    }
}

/// A scaled scene plus its derived `INDEX` band.
///
/// The underlying scene is carried unchanged; only the derived band is added.
#[derive(Debug, Clone)]
pub struct IndexedScene {
    pub scene: ScaledScene,
    pub index: SpectralIndex,
    pub values: ReflectanceBand,
}

impl IndexedScene {
    pub fn shape(&self) -> (usize, usize) {
        self.values.dim()
    }

    pub fn date(&self) -> NaiveDate {
        self.scene.date()
    }
}

/// Evaluates index formulas over scaled scenes
#[derive(Debug, Clone, Default)]
pub struct IndexProcessor {
    savi: SaviParams,
    evi: EviParams,
}

impl IndexProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(savi: SaviParams, evi: EviParams) -> Self {
        Self { savi, evi }
    }

    /// Compute one index over a scene, attaching the derived band
    pub fn compute(
        &self,
        scene: ScaledScene,
        index: SpectralIndex,
    ) -> SpectraResult<IndexedScene> {
        log::debug!("Computing {} for scene {}", index, scene.id);
        let values = self.evaluate(&scene, index)?;
        Ok(IndexedScene {
            scene,
            index,
            values,
        })
    }

    /// The derived band alone, without consuming the scene
    pub fn evaluate(
        &self,
        scene: &ScaledScene,
        index: SpectralIndex,
    ) -> SpectraResult<ReflectanceBand> {
        match index {
            SpectralIndex::Ndvi => normalized_difference(
                scene.require_band(SpectralBand::Nir)?,
                scene.require_band(SpectralBand::Red)?,
            ),
            SpectralIndex::Ndwi => normalized_difference(
                scene.require_band(SpectralBand::Green)?,
                scene.require_band(SpectralBand::Nir)?,
            ),
            SpectralIndex::Mndwi => normalized_difference(
                scene.require_band(SpectralBand::Green)?,
                scene.require_band(SpectralBand::Swir1)?,
            ),
            SpectralIndex::Ndbi => normalized_difference(
                scene.require_band(SpectralBand::Swir1)?,
                scene.require_band(SpectralBand::Nir)?,
            ),
            SpectralIndex::Savi => savi(
                scene.require_band(SpectralBand::Nir)?,
                scene.require_band(SpectralBand::Red)?,
                self.savi,
            ),
            SpectralIndex::Evi => evi(
                scene.require_band(SpectralBand::Nir)?,
                scene.require_band(SpectralBand::Red)?,
                scene.require_band(SpectralBand::Blue)?,
                self.evi,
            ),
            SpectralIndex::Nbr => normalized_difference(
                scene.require_band(SpectralBand::Nir)?,
                scene.require_band(SpectralBand::Swir2)?,
            ),
        }
    }

    /// Parallel variant of [`IndexProcessor::compute`]
    #[cfg(feature = "parallel")]
    pub fn compute_parallel(
        &self,
        scene: ScaledScene,
        index: SpectralIndex,
    ) -> SpectraResult<IndexedScene> {
        log::debug!("Computing {} for scene {} (parallel)", index, scene.id);
        let values = self.evaluate_parallel(&scene, index)?;
        Ok(IndexedScene {
            scene,
            index,
            values,
        })
    }

    #[cfg(feature = "parallel")]
    pub fn evaluate_parallel(
        &self,
        scene: &ScaledScene,
        index: SpectralIndex,
    ) -> SpectraResult<ReflectanceBand> {
        match index {
            SpectralIndex::Ndvi => normalized_difference_parallel(
                scene.require_band(SpectralBand::Nir)?,
                scene.require_band(SpectralBand::Red)?,
            ),
            SpectralIndex::Ndwi => normalized_difference_parallel(
                scene.require_band(SpectralBand::Green)?,
                scene.require_band(SpectralBand::Nir)?,
            ),
            SpectralIndex::Mndwi => normalized_difference_parallel(
                scene.require_band(SpectralBand::Green)?,
                scene.require_band(SpectralBand::Swir1)?,
            ),
            SpectralIndex::Ndbi => normalized_difference_parallel(
                scene.require_band(SpectralBand::Swir1)?,
                scene.require_band(SpectralBand::Nir)?,
            ),
            SpectralIndex::Savi => savi_parallel(
                scene.require_band(SpectralBand::Nir)?,
                scene.require_band(SpectralBand::Red)?,
                self.savi,
            ),
            SpectralIndex::Evi => evi_parallel(
                scene.require_band(SpectralBand::Nir)?,
                scene.require_band(SpectralBand::Red)?,
                scene.require_band(SpectralBand::Blue)?,
                self.evi,
            ),
            SpectralIndex::Nbr => normalized_difference_parallel(
                scene.require_band(SpectralBand::Nir)?,
                scene.require_band(SpectralBand::Swir2)?,
            ),
        }
    }
}

fn check_dimensions(a: &ReflectanceBand, b: &ReflectanceBand) -> SpectraResult<()> {
    if a.dim() != b.dim() {
        return Err(SpectraError::ShapeMismatch {
            expected: a.dim(),
            actual: b.dim(),
        });
    }
    Ok(())
}

/// `(A − B) / (A + B)` with NaN no-data and a vanishing-denominator guard
pub fn normalized_difference(
    a: &ReflectanceBand,
    b: &ReflectanceBand,
) -> SpectraResult<ReflectanceBand> {
    check_dimensions(a, b)?;
    Ok(Zip::from(a).and(b).map_collect(|&a, &b| {
        let sum = a + b;
        if a.is_nan() || b.is_nan() || sum.abs() < DENOM_EPSILON {
            f32::NAN
        } else {
            (a - b) / sum
        }
    }))
}

/// `((NIR − Red) / (NIR + Red + L)) × (1 + L)`
pub fn savi(
    nir: &ReflectanceBand,
    red: &ReflectanceBand,
    params: SaviParams,
) -> SpectraResult<ReflectanceBand> {
    check_dimensions(nir, red)?;
    let l = params.l_factor;
    Ok(Zip::from(nir).and(red).map_collect(|&n, &r| {
        let denom = n + r + l;
        if n.is_nan() || r.is_nan() || denom.abs() < DENOM_EPSILON {
            f32::NAN
        } else {
            ((n - r) / denom) * (1.0 + l)
        }
    }))
}

/// `G × (NIR − Red) / (NIR + C1·Red − C2·Blue + L)`
pub fn evi(
    nir: &ReflectanceBand,
    red: &ReflectanceBand,
    blue: &ReflectanceBand,
    params: EviParams,
) -> SpectraResult<ReflectanceBand> {
    check_dimensions(nir, red)?;
    check_dimensions(nir, blue)?;
    Ok(Zip::from(nir)
        .and(red)
        .and(blue)
        .map_collect(|&n, &r, &b| {
            let denom = n + params.c1 * r - params.c2 * b + params.l;
            if n.is_nan() || r.is_nan() || b.is_nan() || denom.abs() < DENOM_EPSILON {
                f32::NAN
            } else {
                params.g * (n - r) / denom
            }
        }))
}

#[cfg(feature = "parallel")]
pub fn normalized_difference_parallel(
    a: &ReflectanceBand,
    b: &ReflectanceBand,
) -> SpectraResult<ReflectanceBand> {
    check_dimensions(a, b)?;
    Ok(Zip::from(a).and(b).par_map_collect(|&a, &b| {
        let sum = a + b;
        if a.is_nan() || b.is_nan() || sum.abs() < DENOM_EPSILON {
            f32::NAN
        } else {
            (a - b) / sum
        }
    }))
}

#[cfg(feature = "parallel")]
pub fn savi_parallel(
    nir: &ReflectanceBand,
    red: &ReflectanceBand,
    params: SaviParams,
) -> SpectraResult<ReflectanceBand> {
    check_dimensions(nir, red)?;
    let l = params.l_factor;
    Ok(Zip::from(nir).and(red).par_map_collect(|&n, &r| {
        let denom = n + r + l;
        if n.is_nan() || r.is_nan() || denom.abs() < DENOM_EPSILON {
            f32::NAN
        } else {
            ((n - r) / denom) * (1.0 + l)
        }
    }))
}

#[cfg(feature = "parallel")]
pub fn evi_parallel(
    nir: &ReflectanceBand,
    red: &ReflectanceBand,
    blue: &ReflectanceBand,
    params: EviParams,
) -> SpectraResult<ReflectanceBand> {
    check_dimensions(nir, red)?;
    check_dimensions(nir, blue)?;
    Ok(Zip::from(nir)
        .and(red)
        .and(blue)
        .par_map_collect(|&n, &r, &b| {
            let denom = n + params.c1 * r - params.c2 * b + params.l;
            if n.is_nan() || r.is_nan() || b.is_nan() || denom.abs() < DENOM_EPSILON {
                f32::NAN
            } else {
                params.g * (n - r) / denom
            }
        }))
}
