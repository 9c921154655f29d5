//! Imagery catalog access and export plumbing

pub mod catalog;
pub mod export;
pub mod stac;

// Re-export main types
pub use catalog::{
    ImageryCatalog, MemoryCatalog, RawScene, SceneDescriptor, SceneQuery, CLOUD_COVER_PROPERTY,
};
pub use export::{
    build_export_request, ExportOptions, ExportRequest, ExportSink, JobHandle, RecordingSink,
};
pub use stac::{StacSearchClient, StacSearchOptions, StacSearchParams};
