//! Error types for stdfp-poller
//!
//! Each external collaborator has its own error so call sites can log it with
//! the right context. `PipelineError` covers what can stop a pipeline from
//! being built or a pass from running.

use std::path::PathBuf;
use thiserror::Error;

/// Taxonomy traversal errors
#[derive(Debug, Error)]
pub enum ScanError {
    /// Watch root does not exist
    #[error("Watch root not found: {0}")]
    RootNotFound(PathBuf),

    /// Watch root exists but is not a directory
    #[error("Watch root is not a directory: {0}")]
    NotADirectory(PathBuf),

    /// A directory name pattern failed to compile
    #[error("Invalid taxonomy pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Composite catalog query errors
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Catalog command could not be started
    #[error("Catalog command failed to start: {0}")]
    Spawn(#[source] std::io::Error),

    /// Catalog command exited unsuccessfully (repository or file missing)
    #[error("Catalog not available at {url}: {stderr}")]
    Unavailable { url: String, stderr: String },
}

/// External decoder errors
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Decoder failed to start for {path}: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Decoder exited with {status} for {path}")]
    Failed { path: PathBuf, status: String },

    #[error("Failed to collect decoder output for {path}: {source}")]
    Collect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// External renderer errors
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Renderer failed to start for {composite}: {source}")]
    Spawn {
        composite: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Renderer exited with {status} for {composite}")]
    Failed { composite: String, status: String },

    #[error("Failed to prepare render of {composite}: {reason}")]
    Prepare { composite: String, reason: String },
}

/// Pipeline-level error
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Common(#[from] stdfp_common::Error),
}

/// Result type for pipeline construction and discovery
pub type PipelineResult<T> = Result<T, PipelineError>;
