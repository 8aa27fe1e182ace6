//! Pooled topology
//!
//! One discovery task feeds two bounded queues: raw files to the conversion
//! pool, report and condition jobs to the report pool. Every queued path is
//! claimed in the in-flight registry until its worker finishes, so a pass that
//! runs while the job is still waiting or executing does not queue it twice.
//!
//! # Shutdown
//! Cancellation stops the scheduler and any send blocked on a full queue. The
//! senders are then dropped; workers finish the job in hand, and jobs left in
//! the queues release their claims and are rediscovered by the next run.

use crate::config::ScheduleSettings;
use crate::models::{ReportJob, WorkItem};
use crate::services::{ConversionStage, InFlightGuard, InFlightRegistry, ReportStage, WorkLists};
use crate::workflow::pipeline::Pipeline;
use crate::workflow::scheduler::PassScheduler;
use crate::workflow::worker_pool::{work_queue, JobHandler, WorkerPool};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use stdfp_common::logging::targets;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// A queued job together with its in-flight claim
pub struct Claimed<T> {
    pub job: T,
    _guard: InFlightGuard,
}

/// Totals over a daemon run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DaemonSummary {
    pub passes: u64,
    pub failed_passes: u64,
    pub queued_conversion: usize,
    pub queued_report: usize,
    /// Found by a pass but still claimed by an earlier one
    pub skipped_in_flight: usize,
}

struct ConversionHandler {
    stage: ConversionStage,
}

#[async_trait]
impl JobHandler<Claimed<WorkItem>> for ConversionHandler {
    async fn handle(&self, job: Claimed<WorkItem>) {
        self.stage.convert(&job.job).await;
    }
}

struct ReportHandler {
    stage: ReportStage,
}

#[async_trait]
impl JobHandler<Claimed<ReportJob>> for ReportHandler {
    async fn handle(&self, job: Claimed<ReportJob>) {
        self.stage.process(&job.job).await;
    }
}

pub struct Daemon {
    pipeline: Arc<Pipeline>,
    schedule: ScheduleSettings,
    registry: InFlightRegistry,
}

impl Daemon {
    pub fn new(pipeline: Arc<Pipeline>, schedule: ScheduleSettings) -> Self {
        Self {
            pipeline,
            schedule,
            registry: InFlightRegistry::new(),
        }
    }

    pub fn registry(&self) -> &InFlightRegistry {
        &self.registry
    }

    /// Run discovery and both pools until `cancel` fires
    pub async fn run(&self, cancel: CancellationToken) -> DaemonSummary {
        let (conversion_tx, conversion_rx) = work_queue(self.schedule.queue_capacity);
        let (report_tx, report_rx) = work_queue(self.schedule.queue_capacity);
        let read_timeout = self.schedule.queue_read_timeout();

        let conversion_pool = WorkerPool::spawn(
            "conversion",
            self.schedule.conversion_workers,
            conversion_rx,
            Arc::new(ConversionHandler {
                stage: self.pipeline.conversion_stage().clone(),
            }),
            read_timeout,
            cancel.clone(),
        );
        let report_pool = WorkerPool::spawn(
            "report",
            self.schedule.report_workers,
            report_rx,
            Arc::new(ReportHandler {
                stage: self.pipeline.report_stage().clone(),
            }),
            read_timeout,
            cancel.clone(),
        );

        let mut summary = DaemonSummary::default();
        let mut scheduler = PassScheduler::new(self.schedule.poll_interval(), cancel.clone());

        while let Some(pass) = scheduler.tick().await {
            summary.passes = pass;
            let pipeline = Arc::clone(&self.pipeline);
            let token = cancel.clone();
            let task = tokio::spawn(async move { pipeline.discover(&token).await });

            let found = match task.await {
                Ok(Ok(found)) => found,
                Ok(Err(e)) => {
                    summary.failed_passes += 1;
                    error!(target: targets::POLLING, "Pass {} failed: {}", pass, e);
                    continue;
                }
                Err(e) => {
                    summary.failed_passes += 1;
                    error!(target: targets::POLLING, "Pass {} aborted: {}", pass, e);
                    continue;
                }
            };

            self.enqueue(found.lists, &conversion_tx, &report_tx, &cancel, &mut summary)
                .await;
        }

        info!(target: targets::POLLING, "Discovery stopped, waiting for workers");
        drop(conversion_tx);
        drop(report_tx);
        conversion_pool.join().await;
        report_pool.join().await;

        info!(
            target: targets::POLLING,
            "Daemon stopped after {} passes ({} conversions and {} report jobs queued)",
            summary.passes,
            summary.queued_conversion,
            summary.queued_report
        );
        summary
    }

    async fn enqueue(
        &self,
        lists: WorkLists,
        conversion_tx: &mpsc::Sender<Claimed<WorkItem>>,
        report_tx: &mpsc::Sender<Claimed<ReportJob>>,
        cancel: &CancellationToken,
        summary: &mut DaemonSummary,
    ) {
        for item in lists.conversion {
            let key = item.raw_path.clone();
            match self.claim(&key, item) {
                Some(job) => {
                    if !send(conversion_tx, job, cancel).await {
                        return;
                    }
                    summary.queued_conversion += 1;
                }
                None => summary.skipped_in_flight += 1,
            }
        }

        let reports = lists
            .report
            .into_iter()
            .map(ReportJob::Measurement)
            .chain(lists.condition.into_iter().map(ReportJob::Condition));

        for job in reports {
            let key = job.key().to_path_buf();
            match self.claim(&key, job) {
                Some(job) => {
                    if !send(report_tx, job, cancel).await {
                        return;
                    }
                    summary.queued_report += 1;
                }
                None => summary.skipped_in_flight += 1,
            }
        }
    }

    fn claim<T>(&self, key: &Path, job: T) -> Option<Claimed<T>> {
        match self.registry.claim_guard(key) {
            Some(guard) => Some(Claimed { job, _guard: guard }),
            None => {
                debug!(target: targets::POLLING, "Still in flight, not queued again: {}", key.display());
                None
            }
        }
    }
}

/// Blocks while the queue is full; false once shutdown was requested or the
/// pool is gone
async fn send<T>(tx: &mpsc::Sender<T>, job: T, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        sent = tx.send(job) => sent.is_ok(),
    }
}
