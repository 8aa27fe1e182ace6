//! # STDF Pipeline Common Library
//!
//! Shared code for the STDF processing services including:
//! - Error type shared by all crates
//! - Configuration loading and watch-root resolution
//! - Per-stage, line-count rotating log files
//! - Timestamp helpers

pub mod config;
pub mod error;
pub mod logging;
pub mod time;

pub use error::{Error, Result};
