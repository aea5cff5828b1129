//! Runner service client
//!
//! One client per runner service location. A runner service hosts one or
//! more runner kinds, each with its own memory capacity.

use reqwest::{Client, Method};
use runway_core::domain::request::RunRequest;
use runway_core::domain::runner::{ApplicationProcessDescriptor, RunnerDescriptor, RunnerState};
use tracing::debug;

use crate::error::Result;
use crate::{JsonTransport, trim_base_url};

/// HTTP client for a remote runner service
#[derive(Debug, Clone)]
pub struct RunnerServiceClient {
    /// Location of the runner service (e.g., "http://runner-1:8080/api/internal/runner")
    base_url: String,
    transport: JsonTransport,
}

impl RunnerServiceClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        Self {
            base_url: trim_base_url(base_url),
            transport: JsonTransport::new(client),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// List the runner kinds this service hosts
    pub async fn available_runners(&self) -> Result<Vec<RunnerDescriptor>> {
        let url = format!("{}/available", self.base_url);
        let response = self
            .transport
            .request(Method::GET, &url, None)
            .send()
            .await?;

        self.transport.handle_response(response).await
    }

    /// Get the current capacity of one runner
    pub async fn runner_state(&self, runner: &str) -> Result<RunnerState> {
        let url = format!("{}/state", self.base_url);
        let response = self
            .transport
            .request(Method::GET, &url, None)
            .query(&[("runner", runner)])
            .send()
            .await?;

        self.transport.handle_response(response).await
    }

    /// Start an application
    pub async fn run(
        &self,
        auth: Option<&str>,
        request: &RunRequest,
    ) -> Result<ApplicationProcessDescriptor> {
        let url = format!("{}/run", self.base_url);
        debug!(
            "Sending run request {} ({}) to {}",
            request.id, request.runner, url
        );

        let response = self
            .transport
            .request(Method::POST, &url, auth)
            .json(request)
            .send()
            .await?;

        self.transport.handle_response(response).await
    }

    /// Stop an application process
    pub async fn stop(&self, auth: Option<&str>, process_id: u64) -> Result<()> {
        let url = format!("{}/stop/{}", self.base_url, process_id);
        let response = self
            .transport
            .request(Method::POST, &url, auth)
            .send()
            .await?;

        self.transport.handle_empty_response(response).await
    }
}
