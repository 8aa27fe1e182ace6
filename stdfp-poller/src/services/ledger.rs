//! Deduplication ledger and in-flight registry
//!
//! `DedupLedger` is owned by one discovery pass and dropped with it.
//! `InFlightRegistry` is shared by the discovery task and the workers of a
//! pooled daemon: a path is claimed before it is queued and released after its
//! job has been attempted, so a later pass cannot queue it a second time while
//! it still waits in a queue or runs.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// Raw-file paths already queued in the current pass
#[derive(Debug, Default)]
pub struct DedupLedger {
    seen: HashSet<PathBuf>,
}

impl DedupLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `path`; returns `false` when it was already recorded this pass
    pub fn insert(&mut self, path: &Path) -> bool {
        self.seen.insert(path.to_path_buf())
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.seen.contains(path)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Paths that are queued or being processed, shared across passes
#[derive(Debug, Clone, Default)]
pub struct InFlightRegistry {
    paths: Arc<Mutex<HashSet<PathBuf>>>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `path` before queueing it; `false` if another claim is live
    pub fn claim(&self, path: &Path) -> bool {
        self.lock().insert(path.to_path_buf())
    }

    pub fn release(&self, path: &Path) {
        self.lock().remove(path);
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.lock().contains(path)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Claim `path` and return a guard that releases it on drop
    pub fn claim_guard(&self, path: &Path) -> Option<InFlightGuard> {
        if self.claim(path) {
            Some(InFlightGuard {
                registry: self.clone(),
                path: path.to_path_buf(),
            })
        } else {
            None
        }
    }

    // A panicking holder leaves the set itself consistent
    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<PathBuf>> {
        self.paths.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Releases its path from the registry when dropped
#[derive(Debug)]
pub struct InFlightGuard {
    registry: InFlightRegistry,
    path: PathBuf,
}

impl InFlightGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.registry.release(&self.path);
    }
}
