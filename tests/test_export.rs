use chrono::{DateTime, NaiveDate, Utc};
use ndarray::Array2;
use std::collections::HashMap;

use specterra::app::{ExplorerSession, SessionEvent, StatusKind};
use specterra::core::index::{IndexProcessor, IndexedScene, SpectralIndex};
use specterra::core::pipeline::Preprocessor;
use specterra::geometry::AreaOfInterest;
use specterra::io::catalog::{MemoryCatalog, RawScene};
use specterra::io::export::{build_export_request, ExportOptions, RecordingSink};
use specterra::types::{BoundingBox, DateRange, GeoTransform, SpectraError, SpectralBand};

const GRID: (usize, usize) = (4, 4);

fn aoi() -> AreaOfInterest {
    AreaOfInterest::rect(BoundingBox::new(0.0, 0.0, 40.0, 40.0))
}

fn june() -> DateRange {
    DateRange::new(
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
    )
}

fn scene(id: &str, acquired: &str) -> RawScene {
    let mut bands = HashMap::new();
    bands.insert(SpectralBand::Blue, Array2::from_elem(GRID, 300u16));
    bands.insert(SpectralBand::Green, Array2::from_elem(GRID, 400u16));
    bands.insert(SpectralBand::Red, Array2::from_elem(GRID, 1000u16));
    bands.insert(SpectralBand::Nir, Array2::from_elem(GRID, 5000u16));
    RawScene {
        id: id.to_string(),
        acquired: acquired.parse::<DateTime<Utc>>().expect("valid timestamp"),
        cloud_percent: 5.0,
        geo: GeoTransform::north_up(0.0, 40.0, 10.0),
        epsg: 32720,
        bands,
        scl: Array2::from_elem(GRID, 4u8),
        properties: HashMap::new(),
    }
}

fn catalog() -> MemoryCatalog {
    MemoryCatalog::with_scenes(vec![scene("s1", "2024-06-01T10:30:00Z")])
}

fn ndvi_result() -> IndexedScene {
    let catalog = catalog();
    let scaled = Preprocessor::new()
        .preprocess(&catalog, &aoi(), june())
        .expect("catalog search")
        .next()
        .expect("one scene")
        .expect("preprocess");
    IndexProcessor::new()
        .compute(scaled, SpectralIndex::Ndvi)
        .expect("NDVI")
}

fn session() -> ExplorerSession<MemoryCatalog> {
    ExplorerSession::new(catalog(), aoi(), june())
}

#[test]
fn test_non_numeric_scale_fails_validation() {
    let options = ExportOptions {
        scale_text: "abc".to_string(),
        ..ExportOptions::default()
    };
    match build_export_request(&ndvi_result(), &aoi(), &options) {
        Err(SpectraError::InvalidScale(text)) => assert_eq!(text, "abc"),
        Err(other) => panic!("expected InvalidScale, got {}", other),
        Ok(_) => panic!("non-numeric scale was accepted"),
    }
}

#[test]
fn test_default_request_covers_the_aoi() {
    let request = build_export_request(&ndvi_result(), &aoi(), &ExportOptions::default())
        .expect("valid request");

    assert_eq!(request.scale_m, 10);
    assert!(request.max_pixels >= 10_000_000_000_000);
    assert_eq!(request.region, aoi().to_ring_coordinates());
    assert_eq!(request.file_name_prefix, "NDVI_20240601");
    assert_eq!(request.description, "NDVI_20240601");
    assert_eq!(request.folder, "GEE");
    assert_eq!(request.crs, None);
}

#[test]
fn test_session_export_round_trip() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut session = session();
    let sink = RecordingSink::new();

    session
        .handle(SessionEvent::IndexSelected(SpectralIndex::Ndvi))
        .expect("index selection");
    session
        .handle(SessionEvent::DateSelected(
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        ))
        .expect("date selection");

    let status = session.export_status(&sink);
    assert_eq!(status.kind, StatusKind::Success);
    assert_eq!(status.message, "Export task created: NDVI_20240601");

    let submitted = sink.submitted();
    assert_eq!(submitted.len(), 1);
    let request = &submitted[0];
    assert_eq!(request.folder, "GEE");
    assert_eq!(request.scale_m, 10);
    assert_eq!(request.crs, None);
    assert_eq!(request.index, SpectralIndex::Ndvi);
    assert_eq!(request.scene_id, "s1");
}

#[test]
fn test_export_without_selections_submits_nothing() {
    let mut session = session();
    let sink = RecordingSink::new();

    let status = session.export_status(&sink);
    assert_eq!(status.kind, StatusKind::Error);
    assert_eq!(status.message, "No spectral index selected");

    session
        .handle(SessionEvent::IndexSelected(SpectralIndex::Ndvi))
        .expect("index selection");
    let status = session.export_status(&sink);
    assert_eq!(status.kind, StatusKind::Error);
    assert_eq!(status.message, "No acquisition date selected");

    assert!(sink.is_empty());
}

#[test]
fn test_missing_image_blocks_submission() {
    let mut session = session();
    let sink = RecordingSink::new();

    session
        .handle(SessionEvent::IndexSelected(SpectralIndex::Ndvi))
        .expect("index selection");
    session
        .handle(SessionEvent::DateSelected(
            NaiveDate::from_ymd_opt(2024, 6, 15).unwrap(),
        ))
        .expect("date selection");

    let status = session.export_status(&sink);
    assert_eq!(status.kind, StatusKind::Error);
    assert_eq!(status.message, "No image found for 2024-06-15");
    assert!(sink.is_empty());
}

#[test]
fn test_crs_override_passes_through_verbatim() {
    let mut session = session();
    let sink = RecordingSink::new();

    session
        .handle(SessionEvent::IndexSelected(SpectralIndex::Ndvi))
        .expect("index selection");
    session
        .handle(SessionEvent::DateSelected(
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        ))
        .expect("date selection");
    session.set_crs_text("EPSG:3857");
    session.set_scale_text("20");
    session.set_folder("indices");

    session.export(&sink).expect("submission");
    let submitted = sink.submitted();
    assert_eq!(submitted[0].crs.as_deref(), Some("EPSG:3857"));
    assert_eq!(submitted[0].scale_m, 20);
    assert_eq!(submitted[0].folder, "indices");
}

#[test]
fn test_failed_validation_leaves_the_session_usable() {
    let mut session = session();
    let sink = RecordingSink::new();

    session
        .handle(SessionEvent::IndexSelected(SpectralIndex::Ndvi))
        .expect("index selection");
    session
        .handle(SessionEvent::DateSelected(
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        ))
        .expect("date selection");

    session.set_scale_text("0");
    let status = session.export_status(&sink);
    assert_eq!(status.kind, StatusKind::Error);
    assert!(sink.is_empty());

    // correcting the input makes the same export go through
    session.set_scale_text("10");
    let status = session.export_status(&sink);
    assert_eq!(status.kind, StatusKind::Success);
    assert_eq!(sink.len(), 1);
}
