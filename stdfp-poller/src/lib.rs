//! stdfp-poller library interface
//!
//! Discovery, classification and dispatch of STDF test data. Exposed as a
//! library so the binary and the integration tests share one implementation.

pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod workflow;

pub use crate::config::Settings;
pub use crate::error::{PipelineError, PipelineResult};
pub use crate::workflow::{Collaborators, Daemon, Pipeline};
