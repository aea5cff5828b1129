//! Build service domain types

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::link::{Link, find_link};

/// Options passed to the builder service when starting a build
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildOptions {
    /// Builder to use; the project's default builder when absent
    pub builder_name: Option<String>,

    #[serde(default)]
    pub targets: Vec<String>,

    #[serde(default)]
    pub options: HashMap<String, String>,
}

/// Status of a remote build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildStatus {
    InQueue,
    InProgress,
    Successful,
    Failed,
    Cancelled,
}

impl BuildStatus {
    /// Whether the build has reached a final state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BuildStatus::Successful | BuildStatus::Failed | BuildStatus::Cancelled
        )
    }
}

impl std::fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildStatus::InQueue => write!(f, "IN_QUEUE"),
            BuildStatus::InProgress => write!(f, "IN_PROGRESS"),
            BuildStatus::Successful => write!(f, "SUCCESSFUL"),
            BuildStatus::Failed => write!(f, "FAILED"),
            BuildStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// A remote build task and the operations available on it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildTaskDescriptor {
    pub task_id: u64,
    pub status: BuildStatus,

    #[serde(default)]
    pub links: Vec<Link>,
}

impl BuildTaskDescriptor {
    pub fn link(&self, rel: &str) -> Option<&Link> {
        find_link(&self.links, rel)
    }
}

/// Entry point of a remote service: the links it exposes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub links: Vec<Link>,
}

impl ServiceDescriptor {
    pub fn link(&self, rel: &str) -> Option<&Link> {
        find_link(&self.links, rel)
    }
}
