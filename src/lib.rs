//! specterra: A Modular Sentinel-2 Spectral Index Explorer
//!
//! This library turns a Sentinel-2 L2A imagery catalog into cloud-masked
//! reflectance scenes, derives the classic normalized spectral indices over
//! an area of interest, and assembles time-series charts and export jobs
//! from the results.

pub mod types;
pub mod geometry;
pub mod io;
pub mod core;
pub mod app;
pub mod config;

// Re-export main types and functions for easier access
pub use crate::types::{
    BoundingBox, DateRange, SceneClass, SpectraError, SpectraResult, SpectralBand,
};
pub use crate::geometry::{AreaOfInterest, Coord};
pub use crate::core::{IndexProcessor, IndexSample, MeanReducer, Preprocessor, SpectralIndex};
pub use crate::io::{ImageryCatalog, MemoryCatalog, RawScene, SceneQuery, StacSearchClient};
pub use crate::app::{ExplorerSession, SelectionState, SessionEvent, ViewUpdate};
pub use crate::config::ExplorerConfig;
