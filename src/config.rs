//! Runtime configuration.
//!
//! Stock values reproduce the explorer's standard behavior. A TOML file can
//! override the cloud filter, the masked class set, reducer resolution, the
//! explored period, and the export form defaults; thresholds stay tunable
//! without recompiling while the defaults keep output compatibility.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::core::pipeline::{PreprocessParams, DEFAULT_MAX_CLOUD_PERCENT};
use crate::core::timeseries::{ReduceParams, DEFAULT_REDUCE_MAX_PIXELS, DEFAULT_REDUCE_SCALE_M};
use crate::io::export::{
    ExportOptions, DEFAULT_EXPORT_FOLDER, DEFAULT_EXPORT_MAX_PIXELS, DEFAULT_SCALE_TEXT,
};
use crate::types::{DateRange, SceneClass, SpectraError, SpectraResult, DEFAULT_MASKED_CLASSES};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Configuration for the explorer
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ExplorerConfig {
    /// Scenes at or above this cloud percentage are skipped
    #[serde(default = "default_max_cloud_percent")]
    pub max_cloud_percent: f32,

    /// Scene classification codes masked to no-data
    #[serde(default = "default_masked_classes")]
    pub masked_classes: Vec<u8>,

    /// Sampling resolution of the time-series reducer, in meters
    #[serde(default = "default_reduce_scale_m")]
    pub reduce_scale_m: f64,

    /// Cap on pixels visited per time-series reduction
    #[serde(default = "default_reduce_max_pixels")]
    pub reduce_max_pixels: u64,

    /// First day of the explored period, `YYYY-MM-DD`
    #[serde(default = "default_start_date")]
    pub start_date: String,

    /// End of the explored period, exclusive, `YYYY-MM-DD`
    #[serde(default = "default_end_date")]
    pub end_date: String,

    #[serde(default)]
    pub export: ExportDefaults,
}

/// Stock values for the export form
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ExportDefaults {
    #[serde(default = "default_export_folder")]
    pub folder: String,

    #[serde(default = "default_export_scale_text")]
    pub scale_text: String,

    #[serde(default = "default_export_max_pixels")]
    pub max_pixels: u64,
}

fn default_max_cloud_percent() -> f32 {
    DEFAULT_MAX_CLOUD_PERCENT
}

fn default_masked_classes() -> Vec<u8> {
    DEFAULT_MASKED_CLASSES.iter().map(|c| c.code()).collect()
}

fn default_reduce_scale_m() -> f64 {
    DEFAULT_REDUCE_SCALE_M
}

fn default_reduce_max_pixels() -> u64 {
    DEFAULT_REDUCE_MAX_PIXELS
}

fn default_start_date() -> String {
    "2017-03-01".to_string()
}

fn default_end_date() -> String {
    "2025-01-31".to_string()
}

fn default_export_folder() -> String {
    DEFAULT_EXPORT_FOLDER.to_string()
}

fn default_export_scale_text() -> String {
    DEFAULT_SCALE_TEXT.to_string()
}

fn default_export_max_pixels() -> u64 {
    DEFAULT_EXPORT_MAX_PIXELS
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            max_cloud_percent: default_max_cloud_percent(),
            masked_classes: default_masked_classes(),
            reduce_scale_m: default_reduce_scale_m(),
            reduce_max_pixels: default_reduce_max_pixels(),
            start_date: default_start_date(),
            end_date: default_end_date(),
            export: ExportDefaults::default(),
        }
    }
}

impl Default for ExportDefaults {
    fn default() -> Self {
        Self {
            folder: default_export_folder(),
            scale_text: default_export_scale_text(),
            max_pixels: default_export_max_pixels(),
        }
    }
}

impl ExplorerConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> SpectraResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            SpectraError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        let config: ExplorerConfig = toml::from_str(&content).map_err(|e| {
            SpectraError::Config(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load the user config file, falling back to stock defaults when absent
    pub fn load_default() -> SpectraResult<Self> {
        let path = Self::default_path();
        if path.exists() {
            log::info!("Loading config from {}", path.display());
            Self::from_file(path)
        } else {
            log::debug!("No config file at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Default location of the user config file
    pub fn default_path() -> PathBuf {
        match dirs::config_dir() {
            Some(dir) => dir.join("specterra").join("config.toml"),
            None => PathBuf::from("specterra.toml"),
        }
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> SpectraResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| SpectraError::Config(format!("Failed to serialize config: {}", e)))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> SpectraResult<()> {
        if !(0.0..=100.0).contains(&self.max_cloud_percent) {
            return Err(SpectraError::Config(
                "max_cloud_percent must be between 0 and 100".to_string(),
            ));
        }
        if self.reduce_scale_m <= 0.0 {
            return Err(SpectraError::Config(
                "reduce_scale_m must be > 0".to_string(),
            ));
        }
        if self.reduce_max_pixels == 0 {
            return Err(SpectraError::Config(
                "reduce_max_pixels must be > 0".to_string(),
            ));
        }
        let range = self.date_range()?;
        if range.start >= range.end {
            return Err(SpectraError::Config(
                "start_date must precede end_date".to_string(),
            ));
        }
        self.masked_scene_classes()?;
        Ok(())
    }

    /// The explored period as a half-open date range
    pub fn date_range(&self) -> SpectraResult<DateRange> {
        let start = parse_date("start_date", &self.start_date)?;
        let end = parse_date("end_date", &self.end_date)?;
        Ok(DateRange::new(start, end))
    }

    /// The masked class codes resolved against the classification scheme
    pub fn masked_scene_classes(&self) -> SpectraResult<Vec<SceneClass>> {
        self.masked_classes
            .iter()
            .map(|&code| {
                SceneClass::from_code(code).ok_or_else(|| {
                    SpectraError::Config(format!("Unknown scene classification code: {}", code))
                })
            })
            .collect()
    }

    /// Preprocessing parameters these settings describe
    pub fn preprocess_params(&self) -> SpectraResult<PreprocessParams> {
        Ok(PreprocessParams {
            max_cloud_percent: self.max_cloud_percent,
            masked_classes: self.masked_scene_classes()?,
            ..PreprocessParams::default()
        })
    }

    /// Reducer parameters these settings describe
    pub fn reduce_params(&self) -> ReduceParams {
        ReduceParams {
            scale_m: self.reduce_scale_m,
            max_pixels: self.reduce_max_pixels,
        }
    }

    /// Export form defaults these settings describe
    pub fn export_options(&self) -> ExportOptions {
        ExportOptions {
            scale_text: self.export.scale_text.clone(),
            folder: self.export.folder.clone(),
            crs_text: String::new(),
            max_pixels: self.export.max_pixels,
        }
    }
}

fn parse_date(field: &str, value: &str) -> SpectraResult<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|e| {
        SpectraError::Config(format!("Invalid {} '{}': {}", field, value, e))
    })
}
