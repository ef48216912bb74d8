//! Full runs over an in-memory provider with synthetic Sentinel-2 scenes.
//!
//! The "after" scenes change the red-edge band so that the western third
//! of the area loses NDRE1, the middle third is unchanged and the eastern
//! third gains.

use chrono::{TimeZone, Utc};
use geo_types::{polygon, MultiPolygon};

use vegchange_cloud::{MemoryProvider, ProviderError};
use vegchange_core::{
    ChangeClass, GridLayout, Raster, ReferencePoint, ReferenceSet, Scene, SceneMeta, StudyArea,
};
use vegchange_pipeline::{
    run_area, run_batch, ExportToggles, FileExportSink, NullSink, PipelineConfig, PipelineError,
};

const SCL_VEGETATION: f64 = 4.0;
const SCL_CLOUD_HIGH: f64 = 9.0;

fn study_area(name: &str, x0: f64) -> StudyArea {
    let poly = polygon![
        (x: x0, y: 2.30),
        (x: x0 + 0.01, y: 2.30),
        (x: x0 + 0.01, y: 2.31),
        (x: x0, y: 2.31),
        (x: x0, y: 2.30),
    ];
    StudyArea::new(name, MultiPolygon(vec![poly])).unwrap()
}

fn band(layout: &GridLayout, f: impl Fn(usize, usize) -> f64) -> Raster<f64> {
    let mut r: Raster<f64> = layout.masked();
    for row in 0..layout.rows {
        for col in 0..layout.cols {
            r.set(row, col, f(row, col)).unwrap();
        }
    }
    r
}

fn meta(id: &str, year: i32, cloud: f64, area: &StudyArea) -> SceneMeta {
    let (w, s, e, n) = area.bounds();
    SceneMeta {
        id: id.into(),
        datetime: Utc.with_ymd_and_hms(year, 5, 1, 8, 0, 0).unwrap(),
        cloud_cover: Some(cloud),
        bbox: Some([w, s, e, n]),
        epsg: Some(4326),
    }
}

/// Which third of the grid a column is in: 0 west, 1 middle, 2 east
fn third(layout: &GridLayout, col: usize) -> usize {
    (col * 3 / layout.cols).min(2)
}

fn scenes(area: &StudyArea, layout: &GridLayout) -> Vec<Scene> {
    let id = area.name();
    let clear = band(layout, |_, _| SCL_VEGETATION);

    // Before: NDRE1 = (0.5 - 0.3) / 0.8 = 0.25 everywhere
    let before_clear = Scene::new(meta(&format!("{id}-2019a"), 2019, 5.0, area))
        .with_band("B8", band(layout, |_, _| 0.5))
        .with_band("B5", band(layout, |_, _| 0.3))
        .with_band("SCL", clear.clone());

    // Cloud over the northern half carries garbage that must be masked
    let half = layout.rows / 2;
    let before_cloudy = Scene::new(meta(&format!("{id}-2019b"), 2019, 12.0, area))
        .with_band("B8", band(layout, |r, _| if r < half { 0.0 } else { 0.5 }))
        .with_band("B5", band(layout, |r, _| if r < half { 0.9 } else { 0.3 }))
        .with_band(
            "SCL",
            band(layout, |r, _| if r < half { SCL_CLOUD_HIGH } else { SCL_VEGETATION }),
        );

    let b8_after = |_: usize, col: usize| [0.5, 0.5, 0.6][third(layout, col)];
    let b5_after = |_: usize, col: usize| [0.45, 0.3, 0.2][third(layout, col)];
    let after = Scene::new(meta(&format!("{id}-2024a"), 2024, 3.0, area))
        .with_band("B8", band(layout, b8_after))
        .with_band("B5", band(layout, b5_after))
        .with_band("SCL", clear.clone());

    // Above the cloud-cover limit: would flip everything if it were used
    let rejected = Scene::new(meta(&format!("{id}-2024x"), 2024, 60.0, area))
        .with_band("B8", band(layout, |_, _| 0.1))
        .with_band("B5", band(layout, |_, _| 0.9))
        .with_band("SCL", clear);

    vec![before_clear, before_cloudy, after, rejected]
}

fn config() -> PipelineConfig {
    PipelineConfig {
        points_per_class: 10,
        random_seed: 42,
        ..Default::default()
    }
}

fn ground_truth(area: &StudyArea, layout: &GridLayout) -> ReferenceSet {
    let row = layout.rows / 2;
    let mut points = Vec::new();
    for (col, label) in [
        (2, "decrease"),
        (3, "decrease"),
        (layout.cols / 2, "no change"),
        (layout.cols / 2 + 1, "no change"),
        (layout.cols - 4, "increase"),
        (layout.cols - 5, "no change"),
        (5, "deforestation"),
    ] {
        let (x, y) = layout.transform.pixel_to_geo(col, row);
        assert!(area.contains(x, y));
        points.push(ReferencePoint::ground_truth(x, y, Some(label.to_string())));
    }
    // Far outside the area: filtered before validation
    points.push(ReferencePoint::ground_truth(0.0, 0.0, Some("increase".into())));
    ReferenceSet::new(points)
}

#[tokio::test]
async fn full_run_classifies_and_validates() {
    let area = study_area("Marsabit", 37.90);
    let config = config();
    let layout = GridLayout::covering(&area, config.analysis_scale).unwrap();
    let provider = MemoryProvider::new(scenes(&area, &layout));
    let truth = ground_truth(&area, &layout);

    let report = run_area(&provider, &area, Some(&truth), &config, &NullSink)
        .await
        .unwrap();

    assert_eq!(report.before.scenes, 2);
    assert_eq!(report.after.scenes, 1);
    assert_eq!(report.grid.rows, layout.rows);

    let counts = &report.class_counts;
    assert!(counts[&ChangeClass::Decrease] > 0);
    assert!(counts[&ChangeClass::NoChange] > 0);
    assert!(counts[&ChangeClass::Increase] > 0);
    assert_eq!(report.classified_pixels(), report.after.valid_pixels);

    // Histogram spans -0.197 .. 0.25
    assert!((report.histogram.min + 0.1974).abs() < 1e-3);
    assert!((report.histogram.max - 0.25).abs() < 1e-9);
    assert_eq!(report.histogram.total() as usize, report.classified_pixels());

    assert_eq!(report.samples, 30);

    let v = report.validation.as_ref().unwrap();
    assert_eq!(v.reference_points, 7);
    assert_eq!(v.outcome.surviving, 6);
    assert_eq!(v.outcome.unmapped_labels, 1);
    assert_eq!(v.outcome.unknown_labels["deforestation"], 1);

    // One "no change" label sits on an increase pixel
    let m = &v.accuracy.matrix;
    assert_eq!(m[0][0], 2);
    assert_eq!(m[1][1], 2);
    assert_eq!(m[1][2], 1);
    assert_eq!(m[2][2], 1);
    let oa = v.accuracy.overall_accuracy.unwrap();
    assert!((oa - 5.0 / 6.0).abs() < 1e-12);
    assert!(v.accuracy.kappa.unwrap() > 0.7);

    let text = report.to_string();
    assert!(text.contains("Area: Marsabit"));
    assert!(text.contains("Overall accuracy: 83.3%"));
}

#[tokio::test]
async fn exports_land_in_output_dir() {
    let dir = tempfile::tempdir().unwrap();
    let area = study_area("Marsabit North", 37.90);
    let config = PipelineConfig {
        output_dir: dir.path().to_path_buf(),
        ..config()
    };
    let layout = GridLayout::covering(&area, config.analysis_scale).unwrap();
    let provider = MemoryProvider::new(scenes(&area, &layout));
    let sink = FileExportSink::new(&config.output_dir);

    run_area(&provider, &area, None, &config, &sink).await.unwrap();
    assert_eq!(sink.flush().await, 4);

    for file in [
        "marsabit_north_ndre1_change.tif",
        "marsabit_north_classified.tif",
        "marsabit_north_samples.csv",
        "marsabit_north_report.json",
    ] {
        assert!(dir.path().join(file).exists(), "{file} missing");
    }

    let report: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join("marsabit_north_report.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(report["area"], "Marsabit North");
    assert_eq!(report["samples"], 30);
    assert!(report["validation"].is_null());

    let samples = std::fs::read_to_string(dir.path().join("marsabit_north_samples.csv")).unwrap();
    assert_eq!(samples.lines().count(), 31);
}

#[tokio::test]
async fn export_toggles_are_honoured() {
    let dir = tempfile::tempdir().unwrap();
    let area = study_area("quiet", 37.90);
    let config = PipelineConfig {
        export: ExportToggles {
            report: true,
            ..ExportToggles::none()
        },
        ..config()
    };
    let layout = GridLayout::covering(&area, config.analysis_scale).unwrap();
    let provider = MemoryProvider::new(scenes(&area, &layout));
    let sink = FileExportSink::new(dir.path());

    run_area(&provider, &area, None, &config, &sink).await.unwrap();
    assert_eq!(sink.flush().await, 1);
    assert!(dir.path().join("quiet_report.json").exists());
}

#[tokio::test]
async fn same_seed_same_sample() {
    let area = study_area("repeat", 37.90);
    let config = config();
    let layout = GridLayout::covering(&area, config.analysis_scale).unwrap();
    let provider = MemoryProvider::new(scenes(&area, &layout));

    let mut outputs = Vec::new();
    for _ in 0..2 {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileExportSink::new(dir.path());
        run_area(&provider, &area, None, &config, &sink).await.unwrap();
        sink.flush().await;
        outputs.push(std::fs::read_to_string(dir.path().join("repeat_samples.csv")).unwrap());
    }
    assert_eq!(outputs[0], outputs[1]);
}

#[tokio::test]
async fn batch_runs_areas_independently() {
    let config = config();
    let west = study_area("west", 37.90);
    let east = study_area("east", 38.10);

    let mut all = Vec::new();
    for area in [&west, &east] {
        let layout = GridLayout::covering(area, config.analysis_scale).unwrap();
        all.extend(scenes(area, &layout));
    }
    let provider = MemoryProvider::new(all);

    let outcomes = run_batch(&provider, &[west, east], None, &config, &NullSink).await;
    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0].area, "west");
    for outcome in &outcomes {
        let report = outcome.result.as_ref().unwrap();
        // Scenes of the other area do not overlap and are ignored
        assert_eq!(report.before.scenes, 2);
        assert_eq!(report.samples, 30);
    }
}

#[tokio::test]
async fn one_failing_area_leaves_the_rest_intact() {
    let config = config();
    let good = study_area("good", 37.90);
    let broken = study_area("broken", 38.10);

    let layout = GridLayout::covering(&good, config.analysis_scale).unwrap();
    let mut all = scenes(&good, &layout);
    let layout = GridLayout::covering(&broken, config.analysis_scale).unwrap();
    for mut scene in scenes(&broken, &layout) {
        scene.bands.remove("B5");
        all.push(scene);
    }
    let provider = MemoryProvider::new(all);

    let outcomes = run_batch(&provider, &[good, broken], None, &config, &NullSink).await;
    assert_eq!(outcomes[0].area, "good");
    assert_eq!(outcomes[0].result.as_ref().unwrap().samples, 30);
    assert!(matches!(
        outcomes[1].result,
        Err(PipelineError::Provider(ProviderError::MissingAsset { .. }))
    ));
}

#[tokio::test]
async fn areas_never_share_export_files() {
    let dir = tempfile::tempdir().unwrap();
    let config = config();
    let spaced = study_area("Site A", 37.90);
    let snake = study_area("site_a", 38.10);
    let other = study_area("Site B", 38.30);

    let mut all = Vec::new();
    for area in [&spaced, &snake, &other] {
        let layout = GridLayout::covering(area, config.analysis_scale).unwrap();
        all.extend(scenes(area, &layout));
    }
    let provider = MemoryProvider::new(all);
    let sink = FileExportSink::new(dir.path());

    let outcomes = run_batch(&provider, &[spaced, snake, other], None, &config, &sink).await;
    assert!(matches!(outcomes[0].result, Err(PipelineError::OutputClash { .. })));
    assert!(matches!(outcomes[1].result, Err(PipelineError::OutputClash { .. })));
    assert!(outcomes[2].is_ok());

    // Only the unambiguous area exported anything
    assert_eq!(sink.flush().await, 4);
    let written = std::fs::read_dir(dir.path()).unwrap().count();
    assert_eq!(written, 4);
    assert!(!dir.path().join("site_a_report.json").exists());
    assert!(dir.path().join("site_b_report.json").exists());
}
