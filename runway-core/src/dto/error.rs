//! Error body returned by remote services

use serde::{Deserialize, Serialize};

/// Structured error returned by a remote service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceError {
    pub message: String,
}
