//! Test Helper Utilities
//!
//! Shared utilities for testing stdfp-poller

#![allow(dead_code)]

pub mod fakes;
pub mod taxonomy;

use std::path::Path;
use std::sync::Arc;
use stdfp_poller::services::StaticCompositeSource;
use stdfp_poller::{Collaborators, Pipeline, Settings};

// Re-export commonly used items
pub use fakes::{FakeDecoder, FakeRenderer};
pub use taxonomy::{
    html_files, test_settings, write_file, write_raw, write_tables, write_test_catalog,
    TaxonomyBuilder, CUT, FLOW, PRODUCT,
};

/// Pipeline over `root` with fake collaborators and one catalog for every cut/flow
pub fn pipeline_with(
    root: &Path,
    settings: &Settings,
    composites: &[&str],
    decoder: Arc<FakeDecoder>,
    renderer: Arc<FakeRenderer>,
) -> Pipeline {
    let source = StaticCompositeSource::uniform(composites.iter().map(|c| c.to_string()).collect());
    let collaborators = Collaborators {
        source: Arc::new(source),
        decoder,
        renderer,
    };
    Pipeline::new(root.to_path_buf(), settings, collaborators).unwrap()
}
