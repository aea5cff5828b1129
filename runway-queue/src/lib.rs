//! Runway Queue
//!
//! Accepts requests to run a project on a pool of remote runner services,
//! builds the project first when needed, and tracks every request from
//! submission until it is started on a runner, fails or is cancelled.
//!
//! Architecture:
//! - Registry: runner pools partitioned by (project, workspace) scope
//! - Admission: capacity-aware runner selection with a pluggable strategy
//! - Tasks: one in-memory record per run request
//! - Queue: submission, build-then-run execution and lifecycle
//! - Sweeper: expiration of tasks that waited or ran too long

pub mod admission;
pub mod config;
pub mod context;
pub mod error;
mod execution;
pub mod queue;
pub mod registry;
pub mod remote;
pub mod request;
pub mod selection;
mod sweeper;
pub mod task;

#[cfg(test)]
pub(crate) mod testing;

pub use config::QueueConfig;
pub use context::ServiceContext;
pub use error::{QueueError, Result};
pub use queue::RunQueue;
pub use task::{RunQueueTask, RunnerProcess, TaskState};
