//! Per-pixel validity masking from the scene-classification band.

use std::collections::HashSet;

use ndarray::Array2;

use crate::types::{ClassBand, SceneClass, DEFAULT_MASKED_CLASSES};

/// Mask statistics for one scene
#[derive(Debug, Clone, Copy, Default)]
pub struct MaskStats {
    pub total_pixels: usize,
    pub masked_pixels: usize,
}

impl MaskStats {
    pub fn masked_percent(&self) -> f64 {
        if self.total_pixels == 0 {
            0.0
        } else {
            100.0 * self.masked_pixels as f64 / self.total_pixels as f64
        }
    }
}

/// Per-pixel validity mask (1 = valid, 0 = masked)
#[derive(Debug, Clone)]
pub struct CloudMask {
    mask: Array2<u8>,
    stats: MaskStats,
}

impl CloudMask {
    pub fn values(&self) -> &Array2<u8> {
        &self.mask
    }

    pub fn is_valid(&self, row: usize, col: usize) -> bool {
        self.mask[[row, col]] == 1
    }

    pub fn stats(&self) -> MaskStats {
        self.stats
    }
}

/// Computes validity masks from SCL bands.
///
/// A pixel is masked when its classification code is in the configured class
/// set; codes outside the known range count as valid, only listed classes
/// are ever excluded.
#[derive(Debug, Clone)]
pub struct CloudMaskProcessor {
    masked_codes: HashSet<u8>,
}

impl Default for CloudMaskProcessor {
    fn default() -> Self {
        Self::new(&DEFAULT_MASKED_CLASSES)
    }
}

impl CloudMaskProcessor {
    pub fn new(classes: &[SceneClass]) -> Self {
        Self {
            masked_codes: classes.iter().map(|c| c.code()).collect(),
        }
    }

    /// The class codes this processor excludes
    pub fn masked_codes(&self) -> &HashSet<u8> {
        &self.masked_codes
    }

    pub fn compute(&self, scl: &ClassBand) -> CloudMask {
        let mask = scl.mapv(|code| u8::from(!self.masked_codes.contains(&code)));
        let total_pixels = mask.len();
        let masked_pixels = mask.iter().filter(|&&m| m == 0).count();
        let stats = MaskStats {
            total_pixels,
            masked_pixels,
        };
        log::debug!(
            "Cloud mask: {} of {} pixels masked ({:.1}%)",
            masked_pixels,
            total_pixels,
            stats.masked_percent()
        );
        CloudMask { mask, stats }
    }
}
