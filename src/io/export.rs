//! Export request assembly and submission.
//!
//! An export is described once, validated up front, and handed to a
//! destination as an immutable value. Submission is fire-and-forget: the sink
//! returns a job handle immediately and nothing here polls, blocks, or
//! retries; job status lives with the destination.

use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::core::index::{IndexedScene, SpectralIndex, INDEX_BAND_NAME};
use crate::geometry::AreaOfInterest;
use crate::types::{GeoTransform, ReflectanceBand, SpectraError, SpectraResult};

/// Default destination folder
pub const DEFAULT_EXPORT_FOLDER: &str = "GEE";

/// Default pixel scale, as shown in the scale input
pub const DEFAULT_SCALE_TEXT: &str = "10";

/// Safety cap on pixels processed by one export job
pub const DEFAULT_EXPORT_MAX_PIXELS: u64 = 10_000_000_000_000;

/// User-editable export settings
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Pixel scale in meters, as typed
    pub scale_text: String,
    /// Destination folder name
    pub folder: String,
    /// CRS override, as typed; blank leaves the choice to the destination
    pub crs_text: String,
    /// Cap on pixels processed by the job
    pub max_pixels: u64,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            scale_text: DEFAULT_SCALE_TEXT.to_string(),
            folder: DEFAULT_EXPORT_FOLDER.to_string(),
            crs_text: String::new(),
            max_pixels: DEFAULT_EXPORT_MAX_PIXELS,
        }
    }
}

/// An immutable export job description
#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub description: String,
    pub folder: String,
    pub file_name_prefix: String,
    /// Closed `[lon, lat]` ring the job clips to
    pub region: Vec<[f64; 2]>,
    /// Pixel scale in meters
    pub scale_m: u32,
    /// Verbatim CRS override; `None` lets the destination choose
    pub crs: Option<String>,
    pub max_pixels: u64,
    /// The derived band, clipped to the region
    pub values: ReflectanceBand,
    /// Name the derived band is exported under
    pub band_name: String,
    pub geo: GeoTransform,
    pub index: SpectralIndex,
    pub acquired: DateTime<Utc>,
    pub scene_id: String,
}

/// File name `{INDEX}_{YYYYMMDD}` for one result
pub fn export_file_name(index: SpectralIndex, acquired: DateTime<Utc>) -> String {
    format!("{}_{}", index.name(), acquired.format("%Y%m%d"))
}

/// Assemble a validated export request for one indexed scene.
///
/// Fails with `InvalidScale` before anything is built when the scale text
/// does not parse to a positive integer. The derived band is clipped to the
/// AOI and the request carries the AOI ring as its region.
pub fn build_export_request(
    result: &IndexedScene,
    aoi: &AreaOfInterest,
    options: &ExportOptions,
) -> SpectraResult<ExportRequest> {
    let scale_m = parse_scale(&options.scale_text)?;
    let crs = parse_crs(&options.crs_text);
    let file_name = export_file_name(result.index, result.scene.acquired);
    let values = clip_to_aoi(&result.values, &result.scene.geo, aoi);

    log::info!(
        "Export request: {} -> folder '{}' at {} m{}",
        file_name,
        options.folder,
        scale_m,
        crs.as_deref()
            .map(|c| format!(", crs {}", c))
            .unwrap_or_default()
    );

    Ok(ExportRequest {
        description: file_name.clone(),
        folder: options.folder.clone(),
        file_name_prefix: file_name,
        region: aoi.to_ring_coordinates(),
        scale_m,
        crs,
        max_pixels: options.max_pixels,
        values,
        band_name: INDEX_BAND_NAME.to_string(),
        geo: result.scene.geo,
        index: result.index,
        acquired: result.scene.acquired,
        scene_id: result.scene.id.clone(),
    })
}

/// Scale text must be a positive integer in meters
fn parse_scale(text: &str) -> SpectraResult<u32> {
    match text.trim().parse::<u32>() {
        Ok(v) if v > 0 => Ok(v),
        _ => Err(SpectraError::InvalidScale(text.to_string())),
    }
}

/// Blank CRS text collapses to `None`; anything else passes through trimmed
fn parse_crs(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// No-data out every pixel whose center falls outside the AOI
fn clip_to_aoi(
    values: &ReflectanceBand,
    geo: &GeoTransform,
    aoi: &AreaOfInterest,
) -> ReflectanceBand {
    let mut clipped = values.clone();
    for ((row, col), v) in clipped.indexed_iter_mut() {
        let (lon, lat) = geo.pixel_to_geo(col, row);
        if !aoi.contains(lon, lat) {
            *v = f32::NAN;
        }
    }
    clipped
}

/// Handle returned by a fire-and-forget submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    pub id: String,
    pub description: String,
}

/// A destination accepting export jobs.
///
/// `submit` returns immediately with a handle; completion, failure, and
/// storage are the destination's concern, inspected out-of-band.
pub trait ExportSink {
    fn submit(&self, request: ExportRequest) -> SpectraResult<JobHandle>;
}

/// Sink that records requests instead of running them; doubles as a dry-run
/// destination
#[derive(Debug, Default)]
pub struct RecordingSink {
    submitted: Mutex<Vec<ExportRequest>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests submitted so far, in order
    pub fn submitted(&self) -> Vec<ExportRequest> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<ExportRequest>> {
        match self.submitted.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl ExportSink for RecordingSink {
    fn submit(&self, request: ExportRequest) -> SpectraResult<JobHandle> {
        let mut submitted = self.lock();
        let handle = JobHandle {
            id: format!("job-{:04}", submitted.len() + 1),
            description: request.description.clone(),
        };
        log::info!(
            "Export task created: {} -> folder '{}'",
            request.file_name_prefix,
            request.folder
        );
        submitted.push(request);
        Ok(handle)
    }
}
