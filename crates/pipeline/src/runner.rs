//! Study-area runs
//!
//! One run: two seasonal composites, index, change, classification,
//! histogram, stratified sample and (with ground truth) accuracy. The two
//! composites are independent and fetched concurrently; every other stage
//! depends on the one before it. Areas share nothing, so a batch runs them
//! side by side and reports each separately.

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use futures::future::join_all;
use tracing::{debug, info, warn};

use vegchange_algorithms::imagery::{add_index, build_composite, classify, compute_change};
use vegchange_algorithms::sampling::stratified_sample;
use vegchange_algorithms::statistics::change_histogram;
use vegchange_algorithms::validation::validate;
use vegchange_cloud::{fetch_scenes, materialize, SceneProvider, SceneQuery};
use vegchange_core::{ChangeClass, Composite, DateWindow, GridLayout, ReferenceSet, StudyArea};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::export::{file_stem, ExportSink};
use crate::report::{AreaOutcome, AreaReport, GridSummary, ValidationReport, WindowReport};

/// Composite of one window with the change index added
async fn window_composite(
    provider: &dyn SceneProvider,
    area: &StudyArea,
    window: &DateWindow,
    layout: &GridLayout,
    config: &PipelineConfig,
) -> Result<(Composite, WindowReport)> {
    let timeout = config.materialize_timeout();
    let query = SceneQuery::new(
        config.collection.as_str(),
        area,
        window.clone(),
        config.max_cloud_cover,
    );

    let metas = materialize(provider.query_scenes(&query), timeout, "scene query").await?;
    debug!(area = area.name(), %window, scenes = metas.len(), "scenes found");

    let bands = config.scene_bands();
    let scenes = materialize(
        fetch_scenes(provider, &metas, &bands, layout, config.scene_concurrency),
        timeout,
        "scene download",
    )
    .await?;

    let composite = build_composite(
        area,
        window,
        layout,
        &scenes,
        &config.composite_bands(),
        &config.composite_params(),
    )?;
    if composite.is_empty() {
        warn!(area = area.name(), %window, "no usable scenes, composite is fully masked");
    }

    let index = &config.index;
    let composite = add_index(&composite, &index.band_a, &index.band_b, &index.name)?;
    let valid_pixels = composite.band(&index.name)?.valid_count();

    let report = WindowReport {
        window: window.clone(),
        scenes: composite.scene_count(),
        valid_pixels,
    };
    Ok((composite, report))
}

/// Run the whole change-detection chain for one study area.
///
/// `ground_truth` is filtered to the area's bounds before validation. All
/// exports go to `sink` without being awaited.
pub async fn run_area(
    provider: &dyn SceneProvider,
    area: &StudyArea,
    ground_truth: Option<&ReferenceSet>,
    config: &PipelineConfig,
    sink: &dyn ExportSink,
) -> Result<AreaReport> {
    let started = Instant::now();
    let name = area.name();

    // Input checks come before any provider call
    let (before_window, after_window) = config.windows()?;
    let classify_params = config.classify_params()?;
    let layout = GridLayout::covering(area, config.analysis_scale)?;
    info!(area = name, rows = layout.rows, cols = layout.cols, "starting run");

    let ((before, before_report), (after, after_report)) = tokio::try_join!(
        window_composite(provider, area, &before_window, &layout, config),
        window_composite(provider, area, &after_window, &layout, config),
    )?;
    info!(
        area = name,
        before_scenes = before_report.scenes,
        after_scenes = after_report.scenes,
        "composites ready"
    );

    let change = compute_change(&before, &after, &config.index.name)?;
    let classified = classify(&change, classify_params)?;
    let histogram = change_histogram(&change, config.histogram)?;

    let counts = classified.class_counts();
    let class_counts: BTreeMap<ChangeClass, usize> = ChangeClass::ALL
        .into_iter()
        .map(|c| (c, counts[c.index()]))
        .collect();
    info!(
        area = name,
        decrease = counts[0],
        no_change = counts[1],
        increase = counts[2],
        "classified"
    );

    let samples = stratified_sample(&classified, area, config.sampling_params())?;
    debug!(area = name, samples = samples.len(), "stratified sample drawn");

    let validation = ground_truth.map(|gt| {
        let local = gt.within(area);
        let outcome = validate(&classified, local.points());
        if outcome.unmapped_labels > 0 {
            warn!(
                area = name,
                count = outcome.unmapped_labels,
                labels = ?outcome.unknown_labels.keys().collect::<Vec<_>>(),
                "ground-truth labels outside the class vocabulary were dropped"
            );
        }
        let accuracy = outcome.matrix.report();
        info!(
            area = name,
            points = outcome.surviving,
            accuracy = ?accuracy.overall_accuracy,
            kappa = ?accuracy.kappa,
            "validated"
        );
        ValidationReport {
            reference_points: local.len(),
            outcome,
            accuracy,
        }
    });

    let report = AreaReport {
        area: name.to_string(),
        index: config.index.name.clone(),
        grid: GridSummary::from(&layout),
        before: before_report,
        after: after_report,
        class_counts,
        histogram,
        samples: samples.len(),
        validation,
    };

    let export = &config.export;
    if export.change_raster {
        sink.raster(name, &change.band_name(), change.into_raster());
    }
    if export.classified_raster {
        sink.raster(name, "classified", classified.to_f64()?);
    }
    if export.samples {
        sink.points(name, "samples", samples);
    }
    if export.report {
        sink.report(name, &report);
    }

    info!(area = name, elapsed = ?started.elapsed(), "run complete");
    Ok(report)
}

/// Run every area concurrently. A failing area is reported and does not
/// affect the others.
///
/// Areas whose names map to the same export file names are not run; each
/// of them fails with [`PipelineError::OutputClash`].
pub async fn run_batch(
    provider: &dyn SceneProvider,
    areas: &[StudyArea],
    ground_truth: Option<&ReferenceSet>,
    config: &PipelineConfig,
    sink: &dyn ExportSink,
) -> Vec<AreaOutcome> {
    let mut by_stem: HashMap<String, Vec<String>> = HashMap::new();
    for area in areas {
        by_stem
            .entry(file_stem(area.name()))
            .or_default()
            .push(area.name().to_string());
    }

    let runs = areas.iter().map(|area| {
        let stem = file_stem(area.name());
        let clash = by_stem.get(&stem).filter(|names| names.len() > 1).cloned();
        async move {
            let result = match clash {
                Some(areas) => Err(PipelineError::OutputClash { stem, areas }),
                None => run_area(provider, area, ground_truth, config, sink).await,
            };
            if let Err(e) = &result {
                warn!(area = area.name(), "run failed: {e}");
            }
            AreaOutcome {
                area: area.name().to_string(),
                result,
            }
        }
    });
    join_all(runs).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WindowSpec;
    use crate::export::NullSink;
    use geo_types::{polygon, MultiPolygon};
    use vegchange_cloud::MemoryProvider;

    fn area() -> StudyArea {
        named("tiny")
    }

    fn named(name: &str) -> StudyArea {
        let poly = polygon![
            (x: 37.9, y: 2.3),
            (x: 37.902, y: 2.3),
            (x: 37.902, y: 2.302),
            (x: 37.9, y: 2.302),
            (x: 37.9, y: 2.3),
        ];
        StudyArea::new(name, MultiPolygon(vec![poly])).unwrap()
    }

    #[tokio::test]
    async fn rejects_reversed_windows_before_querying() {
        let config = PipelineConfig {
            before: WindowSpec::new(2024, "04-15", "06-15"),
            after: WindowSpec::new(2019, "04-15", "06-15"),
            ..Default::default()
        };
        let provider = MemoryProvider::default();
        let err = run_area(&provider, &area(), None, &config, &NullSink)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Input(vegchange_core::Error::WindowOrder { .. })
        ));
    }

    #[tokio::test]
    async fn no_scenes_is_not_an_error() {
        let provider = MemoryProvider::default();
        let report = run_area(&provider, &area(), None, &PipelineConfig::default(), &NullSink)
            .await
            .unwrap();
        assert_eq!(report.before.scenes, 0);
        assert_eq!(report.classified_pixels(), 0);
        assert!(report.histogram.is_empty());
        assert_eq!(report.samples, 0);
        assert!(report.validation.is_none());
    }

    #[tokio::test]
    async fn clashing_output_names_are_not_run() {
        let provider = MemoryProvider::default();
        let areas = [named("Site A"), named("site_a"), named("Site B")];
        let outcomes =
            run_batch(&provider, &areas, None, &PipelineConfig::default(), &NullSink).await;

        assert_eq!(outcomes.len(), 3);
        for outcome in &outcomes[..2] {
            match &outcome.result {
                Err(PipelineError::OutputClash { stem, areas }) => {
                    assert_eq!(stem, "site_a");
                    assert_eq!(areas, &["Site A", "site_a"]);
                }
                other => panic!("expected an output clash, got {other:?}"),
            }
        }
        assert!(outcomes[2].is_ok());
    }

    #[tokio::test]
    async fn duplicate_names_clash() {
        let provider = MemoryProvider::default();
        let outcomes =
            run_batch(&provider, &[area(), area()], None, &PipelineConfig::default(), &NullSink)
                .await;
        assert!(outcomes.iter().all(|o| !o.is_ok()));
    }
}
