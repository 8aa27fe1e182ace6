//! Report stage
//!
//! For one work item: fetch the composite catalog, drop the composites the
//! skip rules exclude, and render every remaining composite whose HTML does
//! not exist yet. Each composite gets a freshly built parameter bag. A failing
//! composite is logged and the loop moves on. Once the loop is over the
//! completion marker is written, unconditionally or only when nothing failed,
//! depending on the marker policy.

use crate::config::{MarkerPolicy, ReportMetadata, Settings};
use crate::models::{
    CompositeParameter, CompositeRules, ConditionItem, FlowKind, ReportJob, ReportKind, WorkItem,
    CONDITION_LABEL,
};
use crate::services::completion_marker;
use crate::services::composite_catalog::CompositeCatalog;
use crate::services::personalization::Personalization;
use crate::services::record_tables::RecordTables;
use crate::services::renderer::{RenderRequest, ReportRenderer};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use stdfp_common::logging::targets;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// What happened to the composites of one work item
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportOutcome {
    /// Report paths checked for existence
    pub checked: usize,
    pub rendered: usize,
    pub already_present: usize,
    /// Excluded by the skip rules
    pub skipped: usize,
    /// No test of the leaf belongs to the composite
    pub no_tests: usize,
    pub failed: Vec<String>,
    pub marker_written: bool,
}

/// Totals over a list of report jobs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportSummary {
    pub jobs: usize,
    pub rendered: usize,
    pub failed: usize,
    pub markers_written: usize,
    pub not_started: usize,
}

impl ReportSummary {
    pub fn add(&mut self, outcome: &ReportOutcome) {
        self.jobs += 1;
        self.rendered += outcome.rendered;
        self.failed += outcome.failed.len();
        if outcome.marker_written {
            self.markers_written += 1;
        }
    }
}

/// Per-composite decision made before rendering
enum Prepared {
    Render(RenderRequest),
    NoTests,
}

#[derive(Clone)]
pub struct ReportStage {
    catalog: CompositeCatalog,
    renderer: Arc<dyn ReportRenderer>,
    rules: CompositeRules,
    report_dir: String,
    output_dir: String,
    record_types: Vec<String>,
    marker_policy: MarkerPolicy,
    metadata: ReportMetadata,
    personalization: Arc<Personalization>,
}

impl ReportStage {
    pub fn new(
        catalog: CompositeCatalog,
        renderer: Arc<dyn ReportRenderer>,
        settings: &Settings,
    ) -> Self {
        let personalization = match &settings.report.personalization {
            Some(path) => Personalization::load(path).unwrap_or_else(|e| {
                warn!(
                    target: targets::REPORT,
                    "Personalization file {} not usable, product codes used as names: {}",
                    path.display(),
                    e
                );
                Personalization::default()
            }),
            None => Personalization::default(),
        };

        Self {
            catalog,
            renderer,
            rules: settings.report.composites.clone(),
            report_dir: settings.report.report_dir.clone(),
            output_dir: settings.conversion.output_dir.clone(),
            record_types: settings.report.record_types.clone(),
            marker_policy: settings.report.marker_policy,
            metadata: settings.report.metadata.clone(),
            personalization: Arc::new(personalization),
        }
    }

    pub async fn process(&self, job: &ReportJob) -> ReportOutcome {
        match job {
            ReportJob::Measurement(item) => self.report(item).await,
            ReportJob::Condition(item) => self.report_condition(item).await,
        }
    }

    /// Run every job in order, stopping between jobs on cancellation
    pub async fn run(&self, jobs: &[ReportJob], cancel: &CancellationToken) -> ReportSummary {
        let mut summary = ReportSummary::default();

        for (index, job) in jobs.iter().enumerate() {
            if cancel.is_cancelled() {
                summary.not_started = jobs.len() - index;
                info!(
                    target: targets::REPORT,
                    "Shutdown requested, {} report jobs left for a later run",
                    summary.not_started
                );
                break;
            }
            let outcome = self.process(job).await;
            summary.add(&outcome);
        }

        summary
    }

    /// Render the missing composites of a converted leaf
    pub async fn report(&self, item: &WorkItem) -> ReportOutcome {
        let position = &item.position;
        let composites = self
            .catalog
            .composites(&position.product_cut, &position.flow)
            .await;
        let report_root = item.report_root(&self.report_dir);
        let tables_base = item.tables_base(&self.output_dir);
        let product_name = self.personalization.product_name(&position.product.to_uppercase());
        let type_label = position.processing_type.to_lowercase();

        info!(target: targets::REPORT, "Reporting {} ({} composites)", position.label(), composites.len());

        // Loaded on first use and shared by all composites of the leaf
        let mut tables: Option<RecordTables> = None;

        let prepare = |composite: &str, title: String, output: PathBuf| {
            let tables =
                tables.get_or_insert_with(|| RecordTables::load(&tables_base, &self.record_types));

            let summary = self
                .rules
                .summary
                .iter()
                .find(|s| s.eq_ignore_ascii_case(composite))
                .map(|s| s.to_uppercase());

            let mut test_numbers = match summary.as_deref() {
                Some("TTIME") => tables.test_time_tests(),
                Some(_) => Vec::new(),
                None => {
                    let tests = tables.tests_for_composite(composite);
                    if tests.is_empty() {
                        return Prepared::NoTests;
                    }
                    tests
                }
            };
            if summary.as_deref() != Some("YIELD") && position.flow_kind == FlowKind::Package {
                for extra in self.personalization.coordinate_tests(&position.product.to_uppercase()) {
                    if !test_numbers.contains(&extra) {
                        test_numbers.push(extra);
                    }
                }
            }

            let mut parameter = CompositeParameter::for_measurement(
                item,
                composite,
                title,
                &product_name,
                &self.metadata,
                test_numbers,
                &tables_base,
            );
            // Summary composites have their own notebooks
            if let Some(summary) = summary {
                parameter.processing_type = summary;
            }

            Prepared::Render(RenderRequest {
                parameter,
                output,
                inputs: tables.paths(),
            })
        };

        let outcome = self
            .render_all(
                ReportKind::Measurement,
                &composites,
                &position.processing_type,
                &position.flow,
                &type_label,
                &report_root,
                prepare,
            )
            .await;

        self.finish(ReportKind::Measurement, item.leaf_dir(), &position.label(), outcome)
    }

    /// Render the missing composites of a condition artifact
    pub async fn report_condition(&self, item: &ConditionItem) -> ReportOutcome {
        let composites = self.catalog.composites(&item.product_cut, &item.flow).await;
        let report_root = item.condition_dir().join(&self.report_dir);
        let product_name = self.personalization.product_name(&item.product.to_uppercase());
        let label = format!("{} {} {}", item.product_cut, item.flow, item.file_name());

        info!(target: targets::CONDITION, "Condition reporting {} ({} composites)", label, composites.len());

        let prepare = |composite: &str, title: String, output: PathBuf| {
            let parameter = CompositeParameter::for_condition(
                item,
                composite,
                title,
                &product_name,
                &self.metadata,
            );
            Prepared::Render(RenderRequest {
                parameter,
                output,
                inputs: vec![item.artifact.clone()],
            })
        };

        let outcome = self
            .render_all(
                ReportKind::Condition,
                &composites,
                CONDITION_LABEL,
                &item.flow,
                "condition",
                &report_root,
                prepare,
            )
            .await;

        self.finish(ReportKind::Condition, item.condition_dir(), &label, outcome)
    }

    #[allow(clippy::too_many_arguments)]
    async fn render_all<F>(
        &self,
        kind: ReportKind,
        composites: &[String],
        processing_type: &str,
        flow: &str,
        type_label: &str,
        report_root: &Path,
        mut prepare: F,
    ) -> ReportOutcome
    where
        F: FnMut(&str, String, PathBuf) -> Prepared + Send,
    {
        let mut outcome = ReportOutcome::default();

        for composite in composites {
            if self.rules.should_skip(composite, kind, processing_type) {
                stage_log(
                    kind,
                    Level::Debug,
                    format_args!("Skipping composite {composite} for {processing_type}"),
                );
                outcome.skipped += 1;
                continue;
            }

            let title = CompositeRules::title(composite, flow, type_label);
            let output = self
                .rules
                .report_path(report_root, composite, kind, processing_type, &title);

            outcome.checked += 1;
            if output.exists() {
                outcome.already_present += 1;
                continue;
            }

            let request = match prepare(composite, title, output) {
                Prepared::Render(request) => request,
                Prepared::NoTests => {
                    stage_log(kind, Level::Debug, format_args!("No tests for composite {composite}"));
                    outcome.no_tests += 1;
                    continue;
                }
            };

            match self.renderer.render(&request).await {
                Ok(()) if !request.output.exists() => {
                    stage_log(
                        kind,
                        Level::Error,
                        format_args!(
                            "Composite {composite} failed: renderer reported success but {} is missing",
                            request.output.display()
                        ),
                    );
                    outcome.failed.push(composite.clone());
                }
                Ok(()) => {
                    stage_log(kind, Level::Info, format_args!("Rendered {}", request.output.display()));
                    outcome.rendered += 1;
                }
                Err(e) => {
                    stage_log(kind, Level::Error, format_args!("Composite {composite} failed: {e}"));
                    outcome.failed.push(composite.clone());
                }
            }
        }

        outcome
    }

    fn finish(&self, kind: ReportKind, marker_dir: &Path, label: &str, mut outcome: ReportOutcome) -> ReportOutcome {
        let allowed = match self.marker_policy {
            MarkerPolicy::Always => true,
            MarkerPolicy::RequireSuccess => outcome.failed.is_empty(),
        };

        if !allowed {
            stage_log(
                kind,
                Level::Warn,
                format_args!(
                    "{label}: {} composites failed, completion marker withheld",
                    outcome.failed.len()
                ),
            );
            return outcome;
        }

        match completion_marker::write_marker(marker_dir, kind) {
            Ok(path) => {
                outcome.marker_written = true;
                stage_log(
                    kind,
                    Level::Info,
                    format_args!(
                        "{label}: {} rendered, {} present, {} failed; marker {}",
                        outcome.rendered,
                        outcome.already_present,
                        outcome.failed.len(),
                        path.display()
                    ),
                );
            }
            Err(e) => {
                stage_log(
                    kind,
                    Level::Error,
                    format_args!("{label}: completion marker not written in {}: {e}", marker_dir.display()),
                );
            }
        }

        outcome
    }
}

#[derive(Clone, Copy)]
enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

/// Log to the report or condition stage file depending on `kind`
fn stage_log(kind: ReportKind, level: Level, message: fmt::Arguments<'_>) {
    match (kind, level) {
        (ReportKind::Measurement, Level::Debug) => debug!(target: targets::REPORT, "{}", message),
        (ReportKind::Measurement, Level::Info) => info!(target: targets::REPORT, "{}", message),
        (ReportKind::Measurement, Level::Warn) => warn!(target: targets::REPORT, "{}", message),
        (ReportKind::Measurement, Level::Error) => error!(target: targets::REPORT, "{}", message),
        (ReportKind::Condition, Level::Debug) => debug!(target: targets::CONDITION, "{}", message),
        (ReportKind::Condition, Level::Info) => info!(target: targets::CONDITION, "{}", message),
        (ReportKind::Condition, Level::Warn) => warn!(target: targets::CONDITION, "{}", message),
        (ReportKind::Condition, Level::Error) => error!(target: targets::CONDITION, "{}", message),
    }
}
