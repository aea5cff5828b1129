//! Request context
//!
//! Identity of the caller on whose behalf a run request is processed. It is
//! captured when the request is submitted, stored on the task and handed to
//! every remote call made while the task executes.

/// Caller identity captured at submission time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceContext {
    /// Name of the authenticated user, if any
    pub user: Option<String>,

    /// Bearer token forwarded to remote services
    pub token: Option<String>,
}

impl ServiceContext {
    /// Context for calls made without a user
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn for_user(user: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            user: Some(user.into()),
            token: Some(token.into()),
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// User name for log messages
    pub fn user_name(&self) -> &str {
        self.user.as_deref().unwrap_or("anonymous")
    }
}
