//! Error types for the run queue

use runway_client::ClientError;
use thiserror::Error;

/// Result type alias for queue operations
pub type Result<T> = std::result::Result<T, QueueError>;

/// Errors raised by the run queue
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Run queue is not started")]
    NotStarted,

    #[error("Run queue is already started")]
    AlreadyStarted,

    #[error("Run queue is stopping")]
    Stopping,

    /// Local configuration does not allow the request to be processed
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A remote service could not be reached or answered with an error
    #[error("{context}: {source}")]
    Remote {
        context: String,
        #[source]
        source: ClientError,
    },

    /// A remote service answered with something we cannot use
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// No runner pool exists for the request's scope, not even the shared one
    #[error("There is no runner to process this request")]
    NoRunnerAvailable,

    /// The resolved pool has no runner of the requested kind
    #[error("There is no runner '{0}' to process this request")]
    NoMatchingRunner(String),

    #[error("Unable to get state of runner '{runner}', {attempts} attempts failed")]
    RunnerStateUnavailable { runner: String, attempts: u32 },

    #[error("{0}")]
    BuildFailed(String),

    #[error("Not found task {0}. It may be cancelled by timeout.")]
    TaskNotFound(u64),

    #[error("Task {id} failed: {message}")]
    TaskFailed { id: u64, message: String },

    #[error("Task {0} was cancelled")]
    Cancelled(u64),
}

impl QueueError {
    /// Wraps a client error with a description of what was attempted
    pub fn remote(context: impl Into<String>, source: ClientError) -> Self {
        Self::Remote {
            context: context.into(),
            source,
        }
    }

    /// Whether the error is a failure to admit the request to a runner
    pub fn is_admission_failure(&self) -> bool {
        matches!(
            self,
            Self::NoRunnerAvailable | Self::NoMatchingRunner(_) | Self::RunnerStateUnavailable { .. }
        )
    }

    /// Check if this error is a lookup miss
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::TaskNotFound(_))
    }
}
