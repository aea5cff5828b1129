//! Run request domain model
//!
//! A run request is what the queue finally hands to a runner service. It is
//! assembled from the caller's options and the project's attributes.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Debug settings for an application run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugMode {
    pub mode: String,
}

impl DebugMode {
    pub fn new(mode: impl Into<String>) -> Self {
        Self { mode: mode.into() }
    }
}

/// Request to run an application on a runner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRequest {
    /// Queue-assigned id, echoed back by the runner in process callbacks
    pub id: u64,

    pub workspace: String,
    pub project: String,

    /// Name of the runner kind that must execute the request
    pub runner: String,

    /// Runner options; a key may be present without a value
    pub options: HashMap<String, Option<String>>,

    /// Memory required by the application, in megabytes
    pub memory_size: u32,

    pub debug_mode: Option<DebugMode>,

    /// Where the runner downloads the application from
    pub deployment_sources_url: Option<String>,

    /// Seconds the application may run before it is terminated
    pub lifetime: u64,
}
