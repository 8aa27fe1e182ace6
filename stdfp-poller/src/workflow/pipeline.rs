//! Sequential discovery loop
//!
//! Two states per cycle: **Polling** runs one discovery pass and builds the
//! three work lists, **Dispatching** converts list one, then reports lists two
//! and three. Nothing is carried from one cycle to the next; work that was not
//! dispatched is found again by the next pass.
//!
//! # Error Handling
//! - Per-item errors are logged by the stages and never end a cycle
//! - A failed or panicking cycle is logged and the loop waits for the next tick

use crate::config::Settings;
use crate::error::PipelineResult;
use crate::models::ReportJob;
use crate::services::composite_catalog;
use crate::services::{
    CommandDecoder, CompositeCatalog, CompositeSource, ConversionStage, ConversionSummary,
    Discovery, NotebookRenderer, PassResult, PassStats, RecordDecoder, ReportRenderer,
    ReportStage, ReportSummary, WorkLists,
};
use crate::workflow::scheduler::PassScheduler;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use stdfp_common::logging::targets;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// External programs the pipeline drives
#[derive(Clone)]
pub struct Collaborators {
    pub source: Arc<dyn CompositeSource>,
    pub decoder: Arc<dyn RecordDecoder>,
    pub renderer: Arc<dyn ReportRenderer>,
}

impl Collaborators {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            source: composite_catalog::source_from_settings(&settings.catalog),
            decoder: Arc::new(CommandDecoder::new(
                settings.conversion.program.clone(),
                settings.conversion.passes.clone(),
            )),
            renderer: Arc::new(NotebookRenderer::from_settings(&settings.report)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Polling,
    Dispatching,
}

/// What one cycle found and did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub pass: PassStats,
    pub queued_conversion: usize,
    pub queued_report: usize,
    pub queued_condition: usize,
    pub conversion: ConversionSummary,
    pub report: ReportSummary,
    pub condition: ReportSummary,
}

pub struct Pipeline {
    discovery: Discovery,
    conversion: ConversionStage,
    report: ReportStage,
    poll_interval: Duration,
}

impl Pipeline {
    pub fn new(
        watch_root: PathBuf,
        settings: &Settings,
        collaborators: Collaborators,
    ) -> PipelineResult<Self> {
        settings.validate()?;

        let catalog = CompositeCatalog::new(collaborators.source, &settings.report.composites);
        let discovery = Discovery::from_settings(watch_root, settings, catalog.clone())?;
        let conversion =
            ConversionStage::new(collaborators.decoder, settings.conversion.output_dir.clone());
        let report = ReportStage::new(catalog, collaborators.renderer, settings);

        Ok(Self {
            discovery,
            conversion,
            report,
            poll_interval: settings.schedule.poll_interval(),
        })
    }

    pub fn from_settings(watch_root: PathBuf, settings: &Settings) -> PipelineResult<Self> {
        Self::new(watch_root, settings, Collaborators::from_settings(settings))
    }

    pub fn discovery(&self) -> &Discovery {
        &self.discovery
    }

    pub fn conversion_stage(&self) -> &ConversionStage {
        &self.conversion
    }

    pub fn report_stage(&self) -> &ReportStage {
        &self.report
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Polling half: one discovery pass
    pub async fn discover(&self, cancel: &CancellationToken) -> PipelineResult<PassResult> {
        Ok(self.discovery.run_pass(cancel).await?)
    }

    /// Dispatching half: conversion list, then report and condition lists
    pub async fn dispatch(
        &self,
        lists: &WorkLists,
        cancel: &CancellationToken,
    ) -> (ConversionSummary, ReportSummary, ReportSummary) {
        let conversion = self.conversion.run(&lists.conversion, cancel).await;

        let reports: Vec<ReportJob> = lists
            .report
            .iter()
            .cloned()
            .map(ReportJob::Measurement)
            .collect();
        let report = self.report.run(&reports, cancel).await;

        let conditions: Vec<ReportJob> = lists
            .condition
            .iter()
            .cloned()
            .map(ReportJob::Condition)
            .collect();
        let condition = self.report.run(&conditions, cancel).await;

        (conversion, report, condition)
    }

    /// One Polling then Dispatching cycle
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> PipelineResult<CycleSummary> {
        log_state(LoopState::Polling);
        let pass = self.discover(cancel).await?;

        log_state(LoopState::Dispatching);
        let (conversion, report, condition) = self.dispatch(&pass.lists, cancel).await;

        Ok(CycleSummary {
            pass: pass.stats,
            queued_conversion: pass.lists.conversion.len(),
            queued_report: pass.lists.report.len(),
            queued_condition: pass.lists.condition.len(),
            conversion,
            report,
            condition,
        })
    }

    /// Run cycles until cancelled; each cycle runs in its own task
    pub async fn run_continuous(self: Arc<Self>, cancel: CancellationToken) {
        let mut scheduler = PassScheduler::new(self.poll_interval, cancel.clone());

        while let Some(cycle) = scheduler.tick().await {
            let pipeline = Arc::clone(&self);
            let token = cancel.clone();
            let task = tokio::spawn(async move { pipeline.run_cycle(&token).await });

            match task.await {
                Ok(Ok(summary)) => info!(
                    target: targets::POLLING,
                    "Cycle {} finished: {} converted, {} reports rendered, {} condition reports rendered, {} failures",
                    cycle,
                    summary.conversion.converted,
                    summary.report.rendered,
                    summary.condition.rendered,
                    summary.conversion.failed + summary.report.failed + summary.condition.failed
                ),
                Ok(Err(e)) => error!(target: targets::POLLING, "Cycle {} failed: {}", cycle, e),
                Err(e) => error!(target: targets::POLLING, "Cycle {} aborted: {}", cycle, e),
            }
        }

        info!(target: targets::POLLING, "Discovery loop stopped");
    }
}

fn log_state(state: LoopState) {
    info!(target: targets::POLLING, "State: {:?}", state);
}
