//! Explorer session state and the selection-changed redraw cycle.
//!
//! Selections are explicit state owned here. Callers feed selection events
//! in; every event rebuilds the view content (map layers, time series, and a
//! status line) from the catalog in one synchronous pass. Validation
//! failures leave the session unchanged and come back as inline status
//! messages rather than errors.

use chrono::NaiveDate;

use crate::config::ExplorerConfig;
use crate::core::index::{IndexProcessor, IndexedScene, SpectralIndex};
use crate::core::pipeline::Preprocessor;
use crate::core::render::{finite_range, index_to_rgba, true_color_rgba, RenderParams};
use crate::core::timeseries::{IndexSample, MeanReducer};
use crate::geometry::AreaOfInterest;
use crate::io::catalog::ImageryCatalog;
use crate::io::export::{
    build_export_request, ExportOptions, ExportSink, JobHandle, DEFAULT_EXPORT_MAX_PIXELS,
};
use crate::types::{DateRange, SpectraError, SpectraResult};

/// Fixed value axis of the time-series chart; normalized difference indices
/// are bounded in this window
pub const CHART_VALUE_RANGE: (f64, f64) = (-1.0, 1.0);

/// Value axis for a series: the fixed window, widened when a sample mean
/// falls outside it (SAVI and EVI can exceed the normalized range)
pub fn chart_value_range(series: &[IndexSample]) -> (f64, f64) {
    let (mut lo, mut hi) = CHART_VALUE_RANGE;
    if let Some((min, max)) = finite_range(series.iter().filter_map(|s| s.mean)) {
        lo = lo.min(min);
        hi = hi.max(max);
    }
    (lo, hi)
}

/// The user's current selections
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionState {
    pub index: Option<SpectralIndex>,
    pub date: Option<NaiveDate>,
    /// Export scale input, kept verbatim until export validates it
    pub scale_text: String,
    pub folder: String,
    pub crs_text: String,
}

impl Default for SelectionState {
    fn default() -> Self {
        let options = ExportOptions::default();
        Self {
            index: None,
            date: None,
            scale_text: options.scale_text,
            folder: options.folder,
            crs_text: options.crs_text,
        }
    }
}

/// Selection-changed events fed into the session
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionEvent {
    IndexSelected(SpectralIndex),
    DateSelected(NaiveDate),
}

/// Severity of a status line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Info,
    Success,
    Error,
}

/// One line of user-facing feedback
#[derive(Debug, Clone, PartialEq)]
pub struct StatusLine {
    pub kind: StatusKind,
    pub message: String,
}

impl StatusLine {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Info,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Error,
            message: message.into(),
        }
    }
}

/// Renderable map content, listed bottom to top
#[derive(Debug, Clone, PartialEq)]
pub enum MapLayer {
    TrueColor {
        width: usize,
        height: usize,
        /// Row-major RGBA
        pixels: Vec<u8>,
    },
    Index {
        index: SpectralIndex,
        width: usize,
        height: usize,
        /// Row-major RGBA
        pixels: Vec<u8>,
    },
    AoiOutline {
        /// Closed `[lon, lat]` ring
        ring: Vec<[f64; 2]>,
    },
}

impl MapLayer {
    /// Legend name of the layer
    pub fn name(&self) -> String {
        match self {
            MapLayer::TrueColor { .. } => "True color".to_string(),
            MapLayer::Index { index, .. } => index.to_string(),
            MapLayer::AoiOutline { .. } => "AOI".to_string(),
        }
    }
}

/// Everything a redraw needs after an event
#[derive(Debug, Clone, PartialEq)]
pub struct ViewUpdate {
    pub layers: Vec<MapLayer>,
    pub time_series: Vec<IndexSample>,
    /// Value axis of the time-series chart, per [`chart_value_range`]
    pub chart_range: (f64, f64),
    pub status: StatusLine,
}

/// Interactive explorer session over one catalog and area of interest
pub struct ExplorerSession<C> {
    catalog: C,
    aoi: AreaOfInterest,
    date_range: DateRange,
    selection: SelectionState,
    preprocessor: Preprocessor,
    indexer: IndexProcessor,
    reducer: MeanReducer,
    render: RenderParams,
    export_max_pixels: u64,
}

impl<C: ImageryCatalog> ExplorerSession<C> {
    pub fn new(catalog: C, aoi: AreaOfInterest, date_range: DateRange) -> Self {
        Self {
            catalog,
            aoi,
            date_range,
            selection: SelectionState::default(),
            preprocessor: Preprocessor::new(),
            indexer: IndexProcessor::new(),
            reducer: MeanReducer::new(),
            render: RenderParams::default(),
            export_max_pixels: DEFAULT_EXPORT_MAX_PIXELS,
        }
    }

    /// Session honoring configured thresholds and export defaults
    pub fn from_config(
        catalog: C,
        aoi: AreaOfInterest,
        config: &ExplorerConfig,
    ) -> SpectraResult<Self> {
        let date_range = config.date_range()?;
        let defaults = config.export_options();
        let selection = SelectionState {
            scale_text: defaults.scale_text,
            folder: defaults.folder,
            ..SelectionState::default()
        };
        Ok(Self {
            catalog,
            aoi,
            date_range,
            selection,
            preprocessor: Preprocessor::with_params(config.preprocess_params()?),
            indexer: IndexProcessor::new(),
            reducer: MeanReducer::with_params(config.reduce_params()),
            render: RenderParams::default(),
            export_max_pixels: defaults.max_pixels,
        })
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn area_of_interest(&self) -> &AreaOfInterest {
        &self.aoi
    }

    pub fn date_range(&self) -> DateRange {
        self.date_range
    }

    /// Acquisition dates offered to the date selector
    pub fn available_dates(&self) -> SpectraResult<Vec<NaiveDate>> {
        self.preprocessor
            .available_dates(&self.catalog, &self.aoi, self.date_range)
    }

    pub fn set_scale_text(&mut self, text: &str) {
        self.selection.scale_text = text.to_string();
    }

    pub fn set_folder(&mut self, folder: &str) {
        self.selection.folder = folder.to_string();
    }

    pub fn set_crs_text(&mut self, text: &str) {
        self.selection.crs_text = text.to_string();
    }

    /// Apply one selection event and rebuild the view
    pub fn handle(&mut self, event: SessionEvent) -> SpectraResult<ViewUpdate> {
        match event {
            SessionEvent::IndexSelected(index) => {
                log::info!("Index selected: {}", index);
                self.selection.index = Some(index);
            }
            SessionEvent::DateSelected(date) => {
                log::info!("Date selected: {}", date);
                self.selection.date = Some(date);
            }
        }
        self.refresh()
    }

    /// Rebuild the view from the current selections.
    ///
    /// A selected date with no matching scene is an inline status message,
    /// not an error; catalog failures propagate.
    pub fn refresh(&self) -> SpectraResult<ViewUpdate> {
        let outline = MapLayer::AoiOutline {
            ring: self.aoi.to_ring_coordinates(),
        };

        let index = match self.selection.index {
            Some(index) => index,
            None => {
                return Ok(ViewUpdate {
                    layers: vec![outline],
                    time_series: Vec::new(),
                    chart_range: CHART_VALUE_RANGE,
                    status: StatusLine::info("Select an index to begin"),
                })
            }
        };

        let time_series = self.time_series(index)?;
        let chart_range = chart_value_range(&time_series);

        let date = match self.selection.date {
            Some(date) => date,
            None => {
                return Ok(ViewUpdate {
                    layers: vec![outline],
                    time_series,
                    chart_range,
                    status: StatusLine::info(format!("Select a date to map {}", index)),
                })
            }
        };

        match self.indexed_scene(index, date) {
            Ok(indexed) => {
                let (rows, cols) = indexed.shape();
                let true_color = true_color_rgba(&indexed.scene)?;
                let index_pixels = index_to_rgba(&indexed.values, index, &self.render);
                Ok(ViewUpdate {
                    layers: vec![
                        MapLayer::TrueColor {
                            width: cols,
                            height: rows,
                            pixels: true_color,
                        },
                        MapLayer::Index {
                            index,
                            width: cols,
                            height: rows,
                            pixels: index_pixels,
                        },
                        outline,
                    ],
                    time_series,
                    chart_range,
                    status: StatusLine::info(format!(
                        "Showing {} for {}",
                        index,
                        date.format("%Y-%m-%d")
                    )),
                })
            }
            Err(SpectraError::ImageNotFound { .. }) => Ok(ViewUpdate {
                layers: vec![outline],
                time_series,
                chart_range,
                status: StatusLine::error(format!(
                    "No image found for {}",
                    date.format("%Y-%m-%d")
                )),
            }),
            Err(e) => Err(e),
        }
    }

    /// Time series of one index over the whole explored period
    pub fn time_series(&self, index: SpectralIndex) -> SpectraResult<Vec<IndexSample>> {
        let scenes = self
            .preprocessor
            .preprocess(&self.catalog, &self.aoi, self.date_range)?;
        let mut series = Vec::new();
        for scene in scenes {
            let indexed = self.indexer.compute(scene?, index)?;
            series.push(self.reducer.reduce(&indexed, &self.aoi)?);
        }
        log::debug!("Time series for {}: {} samples", index, series.len());
        Ok(series)
    }

    /// Submit an export for the current selections.
    ///
    /// Fire-and-forget: the handle comes back immediately and job progress is
    /// the sink's concern.
    pub fn export<S: ExportSink>(&self, sink: &S) -> SpectraResult<JobHandle> {
        let index = self.selection.index.ok_or(SpectraError::NoIndexSelected)?;
        let date = self.selection.date.ok_or(SpectraError::NoDateSelected)?;
        let indexed = self.indexed_scene(index, date)?;
        let options = ExportOptions {
            scale_text: self.selection.scale_text.clone(),
            folder: self.selection.folder.clone(),
            crs_text: self.selection.crs_text.clone(),
            max_pixels: self.export_max_pixels,
        };
        let request = build_export_request(&indexed, &self.aoi, &options)?;
        sink.submit(request)
    }

    /// Export, reported as an inline status line
    pub fn export_status<S: ExportSink>(&self, sink: &S) -> StatusLine {
        match self.export(sink) {
            Ok(handle) => {
                StatusLine::success(format!("Export task created: {}", handle.description))
            }
            Err(e) => StatusLine::error(e.to_string()),
        }
    }

    /// The preprocessed, indexed scene for one acquisition date
    fn indexed_scene(&self, index: SpectralIndex, date: NaiveDate) -> SpectraResult<IndexedScene> {
        let mut scenes =
            self.preprocessor
                .preprocess(&self.catalog, &self.aoi, DateRange::single_day(date))?;
        let scene = match scenes.next() {
            Some(scene) => scene?,
            None => return Err(SpectraError::ImageNotFound { date }),
        };
        self.indexer.compute(scene, index)
    }
}
