use chrono::{DateTime, NaiveDate, Utc};
use ndarray::Array2;
use std::collections::HashMap;

use specterra::core::index::{IndexProcessor, SpectralIndex};
use specterra::core::pipeline::Preprocessor;
use specterra::core::timeseries::MeanReducer;
use specterra::geometry::AreaOfInterest;
use specterra::io::catalog::{MemoryCatalog, RawScene};
use specterra::types::{BoundingBox, DateRange, GeoTransform, SpectralBand};

const GRID: (usize, usize) = (5, 5);

/// AOI covering the whole 5x5 test grid (10 m pixels, x and y in 0..50)
fn aoi() -> AreaOfInterest {
    AreaOfInterest::rect(BoundingBox::new(0.0, 0.0, 50.0, 50.0))
}

fn june() -> DateRange {
    DateRange::new(
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
    )
}

/// Constant-valued scene with NIR and RED bands and a uniform SCL code
fn scene_with(id: &str, acquired: &str, cloud: f32, nir: u16, red: u16, scl: u8) -> RawScene {
    let mut bands = HashMap::new();
    bands.insert(SpectralBand::Nir, Array2::from_elem(GRID, nir));
    bands.insert(SpectralBand::Red, Array2::from_elem(GRID, red));
    RawScene {
        id: id.to_string(),
        acquired: acquired.parse::<DateTime<Utc>>().expect("valid timestamp"),
        cloud_percent: cloud,
        geo: GeoTransform::north_up(0.0, 50.0, 10.0),
        epsg: 32720,
        bands,
        scl: Array2::from_elem(GRID, scl),
        properties: HashMap::new(),
    }
}

#[test]
fn test_end_to_end_ndvi_scenario() {
    let _ = env_logger::builder().is_test(true).try_init();

    // One clear June scene: DN 5000 and 1000 are 0.5 and 0.1 reflectance
    let catalog = MemoryCatalog::with_scenes(vec![scene_with(
        "s1",
        "2024-06-01T10:30:00Z",
        5.0,
        5000,
        1000,
        4,
    )]);

    let preprocessor = Preprocessor::new();
    let mut scenes = preprocessor
        .preprocess(&catalog, &aoi(), june())
        .expect("catalog search");
    let scaled = scenes.next().expect("one scene").expect("preprocess");
    assert!(scenes.next().is_none(), "expected exactly one scene");

    let nir = scaled.band(SpectralBand::Nir).expect("NIR band");
    assert!((nir[[0, 0]] - 0.5).abs() < 1e-6);

    let indexed = IndexProcessor::new()
        .compute(scaled, SpectralIndex::Ndvi)
        .expect("NDVI");
    for &value in indexed.values.iter() {
        assert!((value - 2.0 / 3.0).abs() < 1e-6, "NDVI was {}", value);
    }
}

#[test]
fn test_preprocess_is_idempotent() {
    let catalog = MemoryCatalog::with_scenes(vec![
        scene_with("s1", "2024-06-01T10:30:00Z", 5.0, 5000, 1000, 4),
        scene_with("s2", "2024-06-11T10:30:00Z", 12.0, 4000, 2000, 4),
    ]);
    let preprocessor = Preprocessor::new();

    let first: Vec<_> = preprocessor
        .preprocess(&catalog, &aoi(), june())
        .expect("first run")
        .collect::<Result<_, _>>()
        .expect("first scenes");
    let second: Vec<_> = preprocessor
        .preprocess(&catalog, &aoi(), june())
        .expect("second run")
        .collect::<Result<_, _>>()
        .expect("second scenes");

    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(&second) {
        assert_eq!(a.id, b.id);
        for band in [SpectralBand::Nir, SpectralBand::Red] {
            let x = a.band(band).expect("band in first run");
            let y = b.band(band).expect("band in second run");
            for (u, v) in x.iter().zip(y.iter()) {
                // bit comparison so no-data pixels also have to agree
                assert_eq!(u.to_bits(), v.to_bits());
            }
        }
    }
}

#[test]
fn test_cloud_ceiling_is_strict() {
    let catalog = MemoryCatalog::with_scenes(vec![
        scene_with("clear", "2024-06-01T10:30:00Z", 19.9, 5000, 1000, 4),
        scene_with("at-ceiling", "2024-06-05T10:30:00Z", 20.0, 5000, 1000, 4),
        scene_with("cloudy", "2024-06-09T10:30:00Z", 35.0, 5000, 1000, 4),
    ]);

    let dates = Preprocessor::new()
        .available_dates(&catalog, &aoi(), june())
        .expect("available dates");
    assert_eq!(dates, vec![NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()]);
}

#[test]
fn test_date_range_end_is_exclusive() {
    let catalog = MemoryCatalog::with_scenes(vec![
        scene_with("inside", "2024-06-30T10:30:00Z", 5.0, 5000, 1000, 4),
        scene_with("on-end", "2024-07-01T10:30:00Z", 5.0, 5000, 1000, 4),
    ]);

    let dates = Preprocessor::new()
        .available_dates(&catalog, &aoi(), june())
        .expect("available dates");
    assert_eq!(dates, vec![NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()]);
}

#[test]
fn test_masked_classes_are_nodata_in_every_band() {
    let mut scene = scene_with("s1", "2024-06-01T10:30:00Z", 5.0, 5000, 1000, 4);
    // first row gets the five masked codes, the rest stays clear
    let masked_codes = [1u8, 3, 8, 9, 10];
    for (col, &code) in masked_codes.iter().enumerate() {
        scene.scl[[0, col]] = code;
    }
    let catalog = MemoryCatalog::with_scenes(vec![scene]);

    let scaled = Preprocessor::new()
        .preprocess(&catalog, &aoi(), june())
        .expect("catalog search")
        .next()
        .expect("one scene")
        .expect("preprocess");

    for band in [SpectralBand::Nir, SpectralBand::Red] {
        let values = scaled.band(band).expect("band");
        for col in 0..GRID.1 {
            assert!(
                values[[0, col]].is_nan(),
                "masked pixel survived in {} col {}",
                band,
                col
            );
        }
        for row in 1..GRID.0 {
            for col in 0..GRID.1 {
                assert!(!values[[row, col]].is_nan(), "clear pixel lost");
            }
        }
    }
}

#[test]
fn test_zero_denominator_is_nodata() {
    // NIR = RED = 0 must come out as no-data, not a crash or infinity
    let catalog = MemoryCatalog::with_scenes(vec![scene_with(
        "dark",
        "2024-06-01T10:30:00Z",
        5.0,
        0,
        0,
        4,
    )]);

    let scaled = Preprocessor::new()
        .preprocess(&catalog, &aoi(), june())
        .expect("catalog search")
        .next()
        .expect("one scene")
        .expect("preprocess");
    let indexed = IndexProcessor::new()
        .compute(scaled, SpectralIndex::Ndvi)
        .expect("NDVI");

    for &value in indexed.values.iter() {
        assert!(value.is_nan(), "expected no-data, got {}", value);
        assert!(!value.is_infinite());
    }
}

#[test]
fn test_series_mean_excludes_masked_pixels() {
    let mut scene = scene_with("s1", "2024-06-01T10:30:00Z", 5.0, 5000, 1000, 4);
    for col in 0..GRID.1 {
        scene.scl[[0, col]] = 9; // one row of high-probability cloud
    }
    let catalog = MemoryCatalog::with_scenes(vec![scene]);

    let scaled = Preprocessor::new()
        .preprocess(&catalog, &aoi(), june())
        .expect("catalog search")
        .next()
        .expect("one scene")
        .expect("preprocess");
    let indexed = IndexProcessor::new()
        .compute(scaled, SpectralIndex::Ndvi)
        .expect("NDVI");

    let sample = MeanReducer::new()
        .reduce(&indexed, &aoi())
        .expect("reduction");
    assert_eq!(sample.valid_pixels, GRID.0 * GRID.1 - GRID.1);
    let mean = sample.mean.expect("valid pixels remain");
    assert!((mean - 2.0 / 3.0).abs() < 1e-6, "mean was {}", mean);
    assert_eq!(sample.date_label(), "2024-06-01");
}
