//! Runner service registration DTOs

use serde::{Deserialize, Serialize};

/// Location of a remote runner service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerServiceLocation {
    pub url: String,
}

impl RunnerServiceLocation {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// Restricts a runner service to one workspace, or one project in a workspace
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerServiceAccessCriteria {
    pub workspace: Option<String>,
    pub project: Option<String>,
}

/// Request to register a runner service with the queue
///
/// Without access criteria the service joins the shared pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerServiceRegistration {
    pub location: RunnerServiceLocation,
    pub access_criteria: Option<RunnerServiceAccessCriteria>,
}

impl RunnerServiceRegistration {
    /// Registration into the shared pool
    pub fn shared(url: impl Into<String>) -> Self {
        Self {
            location: RunnerServiceLocation::new(url),
            access_criteria: None,
        }
    }
}
