//! Runway HTTP Clients
//!
//! Typed HTTP clients for the remote services the run queue coordinates:
//! - Project API: project metadata used to assemble run requests
//! - Builder API: starting, polling and cancelling builds through links
//! - Runner services: advertised runners, capacity and application launch
//!
//! # Example
//!
//! ```no_run
//! use runway_client::ProjectApiClient;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = ProjectApiClient::new("http://localhost:8080/api");
//!
//!     let project = client.get_project(None, "my-workspace", "/my-app").await?;
//!     println!("Project attributes: {:?}", project.attributes);
//!     Ok(())
//! }
//! ```

pub mod error;
mod builder;
mod project;
mod runner;

// Re-export commonly used types
pub use builder::BuilderApiClient;
pub use error::{ClientError, Result};
pub use project::ProjectApiClient;
pub use runner::RunnerServiceClient;

use reqwest::{Client, Method, RequestBuilder};
use runway_core::domain::link::Link;
use runway_core::dto::error::ServiceError;
use serde::de::DeserializeOwned;

/// HTTP plumbing shared by all service clients
#[derive(Debug, Clone)]
pub(crate) struct JsonTransport {
    client: Client,
}

impl JsonTransport {
    pub(crate) fn new(client: Client) -> Self {
        Self { client }
    }

    /// Starts a request, attaching the caller's bearer token when present
    pub(crate) fn request(&self, method: Method, url: &str, auth: Option<&str>) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match auth {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Starts a request for the operation described by a link
    pub(crate) fn request_link(&self, link: &Link, auth: Option<&str>) -> Result<RequestBuilder> {
        let method = Method::from_bytes(link.method.to_uppercase().as_bytes()).map_err(|_| {
            ClientError::InvalidRequest(format!(
                "Unsupported method '{}' for link '{}'",
                link.method, link.rel
            ))
        })?;
        Ok(self.request(method, &link.href, auth))
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle an API response and deserialize JSON
    ///
    /// This method checks the status code and returns an appropriate error if
    /// the request failed, or deserializes the response body if successful.
    pub(crate) async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            return Err(error_from_body(status.as_u16(), response).await);
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// Handle an API response that returns no content
    pub(crate) async fn handle_empty_response(&self, response: reqwest::Response) -> Result<()> {
        let status = response.status();

        if !status.is_success() {
            return Err(error_from_body(status.as_u16(), response).await);
        }

        Ok(())
    }
}

/// Builds an API error, preferring the structured message of a service error body
async fn error_from_body(status: u16, response: reqwest::Response) -> ClientError {
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    ClientError::api_error(status, service_message(&body))
}

fn service_message(body: &str) -> String {
    match serde_json::from_str::<ServiceError>(body) {
        Ok(err) => err.message,
        Err(_) => body.to_string(),
    }
}

pub(crate) fn trim_base_url(base_url: impl Into<String>) -> String {
    base_url.into().trim_end_matches('/').to_string()
}
