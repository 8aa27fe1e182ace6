//! End-to-end tests of the sequential pipeline and the pooled daemon

mod helpers;

use helpers::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use stdfp_poller::Daemon;
use tokio_util::sync::CancellationToken;

const CATALOG: [&str; 3] = ["YIELD", "TTIME", "INIT"];

fn csv_count(leaf: &Path) -> usize {
    fs::read_dir(leaf.join("csv")).map(|d| d.count()).unwrap_or(0)
}

async fn wait_for(paths: &[PathBuf]) {
    tokio::time::timeout(Duration::from_secs(20), async {
        while !paths.iter().all(|p| p.is_file()) {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_leaf_lifecycle_over_three_passes() {
    let tree = TaxonomyBuilder::new();
    let leaf = tree.wafer_leaf("L1", "01", "VOLUME");
    write_raw(&leaf, "X.std");

    let decoder = Arc::new(FakeDecoder::new(9));
    let renderer = Arc::new(FakeRenderer::new());
    let pipeline = pipeline_with(
        tree.root(),
        &test_settings(),
        &CATALOG,
        Arc::clone(&decoder),
        Arc::clone(&renderer),
    );
    let cancel = CancellationToken::new();

    // Pass 1: not converted yet
    let first = pipeline.discover(&cancel).await.unwrap();
    assert_eq!(first.lists.conversion.len(), 1);
    assert!(first.lists.report.is_empty());
    let (conversion, report, _) = pipeline.dispatch(&first.lists, &cancel).await;
    assert_eq!(conversion.converted, 1);
    assert_eq!(report.jobs, 0);
    assert_eq!(csv_count(&leaf), 9);

    // Pass 2: converted, no Report directory
    let second = pipeline.discover(&cancel).await.unwrap();
    assert!(second.lists.conversion.is_empty());
    assert_eq!(second.lists.report.len(), 1);
    let (_, report, _) = pipeline.dispatch(&second.lists, &cancel).await;
    assert_eq!(report.rendered, 2);
    assert_eq!(report.markers_written, 1);
    assert_eq!(renderer.rendered_composites(), vec!["YIELD", "TTIME"]);
    assert!(leaf.join("REPORT DONE.txt").is_file());

    // Pass 3: marker present
    let third = pipeline.discover(&cancel).await.unwrap();
    assert!(third.lists.is_empty());
    assert_eq!(third.stats.complete, 1);

    assert_eq!(decoder.calls(), vec![leaf.join("X.std")]);
}

#[tokio::test]
async fn test_run_cycle_counts() {
    let tree = TaxonomyBuilder::new();
    for wafer in ["01", "02"] {
        let leaf = tree.wafer_leaf("L1", wafer, "VOLUME");
        write_raw(&leaf, &format!("W{wafer}.std"));
    }
    let pipeline = pipeline_with(
        tree.root(),
        &test_settings(),
        &CATALOG,
        Arc::new(FakeDecoder::new(9)),
        Arc::new(FakeRenderer::new()),
    );
    let cancel = CancellationToken::new();

    let cycle = pipeline.run_cycle(&cancel).await.unwrap();
    assert_eq!(cycle.pass.leaves, 2);
    assert_eq!(cycle.queued_conversion, 2);
    assert_eq!(cycle.conversion.converted, 2);

    let cycle = pipeline.run_cycle(&cancel).await.unwrap();
    assert_eq!(cycle.queued_report, 2);
    assert_eq!(cycle.report.rendered, 4);

    let cycle = pipeline.run_cycle(&cancel).await.unwrap();
    assert_eq!(cycle.queued_conversion + cycle.queued_report + cycle.queued_condition, 0);
    assert_eq!(cycle.pass.complete, 2);
}

#[tokio::test]
async fn test_failed_conversion_retried_next_pass() {
    let tree = TaxonomyBuilder::new();
    let leaf = tree.wafer_leaf("L1", "01", "VOLUME");
    write_raw(&leaf, "X.std");
    let decoder = Arc::new(FakeDecoder::new(9).failing_for("X.std"));
    let pipeline = pipeline_with(
        tree.root(),
        &test_settings(),
        &CATALOG,
        Arc::clone(&decoder),
        Arc::new(FakeRenderer::new()),
    );
    let cancel = CancellationToken::new();

    let cycle = pipeline.run_cycle(&cancel).await.unwrap();
    assert_eq!(cycle.conversion.failed, 1);

    let cycle = pipeline.run_cycle(&cancel).await.unwrap();
    assert_eq!(cycle.queued_conversion, 1);
    assert_eq!(decoder.calls().len(), 2);
}

#[tokio::test]
async fn test_cancelled_dispatch_leaves_items_for_later() {
    let tree = TaxonomyBuilder::new();
    let leaf = tree.wafer_leaf("L1", "01", "VOLUME");
    write_raw(&leaf, "X.std");
    let decoder = Arc::new(FakeDecoder::new(9));
    let pipeline = pipeline_with(
        tree.root(),
        &test_settings(),
        &CATALOG,
        Arc::clone(&decoder),
        Arc::new(FakeRenderer::new()),
    );

    let found = pipeline.discover(&CancellationToken::new()).await.unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let (conversion, _, _) = pipeline.dispatch(&found.lists, &cancel).await;

    assert_eq!(conversion.not_started, 1);
    assert!(decoder.calls().is_empty());
}

#[tokio::test]
async fn test_sequential_loop_until_cancelled() {
    let tree = TaxonomyBuilder::new();
    let leaf = tree.wafer_leaf("L1", "01", "VOLUME");
    write_raw(&leaf, "X.std");
    let pipeline = Arc::new(pipeline_with(
        tree.root(),
        &test_settings(),
        &CATALOG,
        Arc::new(FakeDecoder::new(9)),
        Arc::new(FakeRenderer::new()),
    ));

    let cancel = CancellationToken::new();
    let task = tokio::spawn(Arc::clone(&pipeline).run_continuous(cancel.clone()));

    wait_for(&[leaf.join("REPORT DONE.txt")]).await;
    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_daemon_converts_and_reports_each_leaf_once() {
    let tree = TaxonomyBuilder::new();
    let mut markers = Vec::new();
    for wafer in ["01", "02", "03"] {
        let leaf = tree.wafer_leaf("L1", wafer, "VOLUME");
        write_raw(&leaf, &format!("W{wafer}.std"));
        markers.push(leaf.join("REPORT DONE.txt"));
    }
    let condition = tree.condition_dir(FLOW);
    write_file(&condition, "anaflow_vdd.csv", "A\n1\n");
    markers.push(condition.join("CONDITION_REPORT_DONE.txt"));

    let settings = test_settings();
    let decoder = Arc::new(FakeDecoder::new(9));
    let renderer = Arc::new(FakeRenderer::new());
    let pipeline = Arc::new(pipeline_with(
        tree.root(),
        &settings,
        &["YIELD", "TTIME", "INIT", "VDD_SWEEP"],
        Arc::clone(&decoder),
        Arc::clone(&renderer),
    ));

    let daemon = Daemon::new(pipeline, settings.schedule.clone());
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    let task = tokio::spawn(async move { daemon.run(token).await });

    wait_for(&markers).await;
    cancel.cancel();
    let summary = tokio::time::timeout(Duration::from_secs(10), task)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(decoder.calls().len(), 3);
    assert_eq!(summary.queued_conversion, 3);
    assert!(summary.passes >= 2);
    assert_eq!(summary.failed_passes, 0);

    let rendered = renderer.rendered_composites();
    assert_eq!(rendered.iter().filter(|c| *c == "VDD_SWEEP").count(), 1);
    assert_eq!(rendered.iter().filter(|c| *c == "YIELD").count(), 3);
}

#[tokio::test]
async fn test_invalid_settings_rejected() {
    use stdfp_poller::services::StaticCompositeSource;
    use stdfp_poller::{Collaborators, Pipeline, PipelineError};

    let tree = TaxonomyBuilder::new();
    let mut settings = test_settings();
    settings.schedule.queue_capacity = 0;

    let collaborators = Collaborators {
        source: Arc::new(StaticCompositeSource::uniform(Vec::new())),
        decoder: Arc::new(FakeDecoder::new(9)),
        renderer: Arc::new(FakeRenderer::new()),
    };
    let result = Pipeline::new(tree.root().to_path_buf(), &settings, collaborators);

    assert!(matches!(result, Err(PipelineError::Common(_))));
}
