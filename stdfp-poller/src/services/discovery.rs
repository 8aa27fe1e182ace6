//! Discovery pass
//!
//! Walks the taxonomy product by product, classifies every leaf and condition
//! directory, and collects the three work lists. The deduplication ledger and
//! the catalog memo live for exactly one pass.

use crate::config::Settings;
use crate::error::ScanError;
use crate::models::TaxonomyEntry;
use crate::services::composite_catalog::{CompositeCatalog, PassCatalog};
use crate::services::ledger::DedupLedger;
use crate::services::readiness::{ConditionReadiness, Readiness, ReadinessClassifier, WorkLists};
use crate::services::taxonomy_walker::TaxonomyWalker;
use std::path::{Path, PathBuf};
use std::time::Instant;
use stdfp_common::logging::targets;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Counters of one pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    pub products: usize,
    pub leaves: usize,
    pub complete: usize,
    pub ambiguous: usize,
    pub already_queued: usize,
    pub up_to_date: usize,
    pub unreadable: usize,
    pub condition_dirs: usize,
    pub condition_complete: usize,
    /// Cancellation stopped the walk early
    pub interrupted: bool,
}

#[derive(Debug, Clone, Default)]
pub struct PassResult {
    pub lists: WorkLists,
    pub stats: PassStats,
}

pub struct Discovery {
    walker: TaxonomyWalker,
    classifier: ReadinessClassifier,
    catalog: CompositeCatalog,
}

impl Discovery {
    pub fn new(walker: TaxonomyWalker, classifier: ReadinessClassifier, catalog: CompositeCatalog) -> Self {
        Self {
            walker,
            classifier,
            catalog,
        }
    }

    pub fn from_settings(
        watch_root: PathBuf,
        settings: &Settings,
        catalog: CompositeCatalog,
    ) -> Result<Self, ScanError> {
        let walker = TaxonomyWalker::new(watch_root, settings.taxonomy.clone())?;
        let classifier = ReadinessClassifier::new(settings);
        Ok(Self::new(walker, classifier, catalog))
    }

    pub fn watch_root(&self) -> &Path {
        self.walker.root()
    }

    /// One full traversal; cancellation is checked between products
    pub async fn run_pass(&self, cancel: &CancellationToken) -> Result<PassResult, ScanError> {
        self.walker.check_root()?;

        let started = Instant::now();
        let mut ledger = DedupLedger::new();
        let mut catalog = PassCatalog::new(&self.catalog);
        let mut result = PassResult::default();

        let products = self.walker.products();
        let total = products.len();
        result.stats.products = total;
        info!(target: targets::POLLING, "Polling {} ({} products)", self.walker.root().display(), total);

        for (index, product) in products.into_iter().enumerate() {
            if cancel.is_cancelled() {
                result.stats.interrupted = true;
                info!(target: targets::POLLING, "Shutdown requested, pass stopped at product {}", product.name);
                break;
            }

            info!(
                target: targets::PROGRESS,
                "{:>3}% {}",
                (index + 1) * 100 / total.max(1),
                product.name
            );

            for entry in self.walker.walk_product(product) {
                match entry {
                    TaxonomyEntry::Leaf(leaf) => {
                        result.stats.leaves += 1;
                        match self.classifier.classify_leaf(&leaf, &mut ledger, &mut catalog).await {
                            Ok(readiness) => route_leaf(&leaf.path, readiness, &mut result),
                            Err(e) => {
                                result.stats.unreadable += 1;
                                warn!(target: targets::POLLING, "Skipping unreadable {}: {}", leaf.path.display(), e);
                            }
                        }
                    }
                    TaxonomyEntry::Condition(dir) => {
                        result.stats.condition_dirs += 1;
                        match self.classifier.classify_condition(&dir) {
                            Ok(ConditionReadiness::Complete) => result.stats.condition_complete += 1,
                            Ok(ConditionReadiness::Artifacts(items)) => {
                                for item in items {
                                    if !ledger.insert(&item.artifact) {
                                        result.stats.already_queued += 1;
                                        continue;
                                    }
                                    info!(target: targets::POLLING, "New CONDITION found: {}", item.artifact.display());
                                    result.lists.condition.push(item);
                                }
                            }
                            Err(e) => {
                                result.stats.unreadable += 1;
                                warn!(target: targets::POLLING, "Skipping unreadable {}: {}", dir.path.display(), e);
                            }
                        }
                    }
                }
            }
        }

        info!(
            target: targets::POLLING,
            "Pass done in {:.1}s: {} to convert, {} to report, {} condition artifacts ({} leaves, {} complete, {} ambiguous)",
            started.elapsed().as_secs_f64(),
            result.lists.conversion.len(),
            result.lists.report.len(),
            result.lists.condition.len(),
            result.stats.leaves,
            result.stats.complete,
            result.stats.ambiguous
        );

        Ok(result)
    }
}

fn route_leaf(leaf: &Path, readiness: Readiness, result: &mut PassResult) {
    match readiness {
        Readiness::Complete => result.stats.complete += 1,
        Readiness::UpToDate => result.stats.up_to_date += 1,
        Readiness::AlreadyQueued => result.stats.already_queued += 1,
        Readiness::Ambiguous { raw_files } => {
            result.stats.ambiguous += 1;
            if raw_files > 1 {
                warn!(
                    target: targets::POLLING,
                    "Ambiguous leaf skipped, {} raw files: {}",
                    raw_files,
                    leaf.display()
                );
            } else {
                debug!(target: targets::POLLING, "No raw file in {}", leaf.display());
            }
        }
        Readiness::Convert(item) => {
            info!(target: targets::POLLING, "New STDF found: {}", item.raw_path.display());
            result.lists.conversion.push(item);
        }
        Readiness::Report(item) => {
            info!(target: targets::POLLING, "New CSV found: {}", item.raw_path.display());
            result.lists.report.push(item);
        }
    }
}
