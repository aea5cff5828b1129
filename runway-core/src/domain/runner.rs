//! Runner domain model
//!
//! Types reported by remote runner services.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::link::Link;

/// A runner kind advertised by a runner service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerDescriptor {
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,
}

/// Capacity snapshot of a runner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerState {
    pub name: String,

    /// Total memory managed by the runner, in megabytes
    pub total_memory: u64,

    /// Memory currently free for new applications, in megabytes
    pub free_memory: u64,

    #[serde(default)]
    pub running_apps: u32,
}

/// Status of an application process on a runner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStatus {
    New,
    Running,
    Stopped,
    Failed,
    Cancelled,
}

/// Application process started by a runner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationProcessDescriptor {
    pub process_id: u64,
    pub status: ApplicationStatus,

    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,

    #[serde(default)]
    pub links: Vec<Link>,
}
