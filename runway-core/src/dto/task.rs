//! Run task DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Externally visible status of a run task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Queued,
    AwaitingBuild,
    BuildDone,
    DispatchingToRunner,
    Started,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Started | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::Queued => "QUEUED",
            TaskStatus::AwaitingBuild => "AWAITING_BUILD",
            TaskStatus::BuildDone => "BUILD_DONE",
            TaskStatus::DispatchingToRunner => "DISPATCHING_TO_RUNNER",
            TaskStatus::Started => "STARTED",
            TaskStatus::Failed => "FAILED",
            TaskStatus::Cancelled => "CANCELLED",
        };
        write!(f, "{}", s)
    }
}

/// Snapshot of a run task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDescriptor {
    pub id: u64,
    pub workspace: String,
    pub project: String,
    pub runner: String,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,

    /// When the request was handed to a runner
    pub sent_at: Option<DateTime<Utc>>,

    /// Process id on the runner once started
    pub process_id: Option<u64>,

    /// Runner service URL that received the request
    pub runner_url: Option<String>,

    pub error: Option<String>,
}
