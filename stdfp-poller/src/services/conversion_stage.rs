//! Conversion stage
//!
//! Hands each raw file to the decoder. A failure is logged with the raw path
//! and leaves the leaf unconverted, so the next pass queues it again.

use crate::models::WorkItem;
use crate::services::decoder::RecordDecoder;
use std::sync::Arc;
use std::time::Instant;
use stdfp_common::logging::targets;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConversionSummary {
    pub converted: usize,
    pub failed: usize,
    /// Left in the list because cancellation was requested
    pub not_started: usize,
}

#[derive(Clone)]
pub struct ConversionStage {
    decoder: Arc<dyn RecordDecoder>,
    output_dir: String,
}

impl ConversionStage {
    pub fn new(decoder: Arc<dyn RecordDecoder>, output_dir: impl Into<String>) -> Self {
        Self {
            decoder,
            output_dir: output_dir.into(),
        }
    }

    /// Convert one item; returns whether the decoder succeeded
    pub async fn convert(&self, item: &WorkItem) -> bool {
        let output = item.output_dir(&self.output_dir);
        let started = Instant::now();
        info!(target: targets::CONVERSION, "Converting {}", item.position.label());

        match self.decoder.decode(&item.raw_path, &output).await {
            Ok(()) => {
                info!(
                    target: targets::CONVERSION,
                    "Converted {} in {:.1}s",
                    item.raw_path.display(),
                    started.elapsed().as_secs_f64()
                );
                true
            }
            Err(e) => {
                error!(target: targets::CONVERSION, "Conversion failed for {}: {}", item.raw_path.display(), e);
                false
            }
        }
    }

    /// Convert every item in order, stopping between items on cancellation
    pub async fn run(&self, items: &[WorkItem], cancel: &CancellationToken) -> ConversionSummary {
        let mut summary = ConversionSummary::default();

        for (index, item) in items.iter().enumerate() {
            if cancel.is_cancelled() {
                summary.not_started = items.len() - index;
                info!(
                    target: targets::CONVERSION,
                    "Shutdown requested, {} conversions left for a later run",
                    summary.not_started
                );
                break;
            }

            if self.convert(item).await {
                summary.converted += 1;
            } else {
                summary.failed += 1;
            }
        }

        summary
    }
}
