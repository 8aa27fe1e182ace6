//! Scheduling: pass ticks, worker pools, and the two run topologies

pub mod daemon;
pub mod pipeline;
pub mod scheduler;
pub mod worker_pool;

pub use daemon::{Claimed, Daemon, DaemonSummary};
pub use pipeline::{Collaborators, CycleSummary, LoopState, Pipeline};
pub use scheduler::PassScheduler;
pub use worker_pool::{work_queue, JobHandler, QueueRead, QueueReader, WorkerPool};
