//! Builder API client
//!
//! The builder service is entered through its service descriptor; every
//! further operation (start, status, cancel) is reached by following links.

use reqwest::{Client, Method};
use runway_core::domain::build::{BuildOptions, BuildTaskDescriptor, ServiceDescriptor};
use runway_core::domain::link::Link;
use tracing::debug;

use crate::error::Result;
use crate::{JsonTransport, trim_base_url};

/// HTTP client for the builder service
#[derive(Debug, Clone)]
pub struct BuilderApiClient {
    base_url: String,
    transport: JsonTransport,
}

impl BuilderApiClient {
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

    /// Fetch the builder service descriptor for a workspace
    pub async fn describe(&self, auth: Option<&str>, workspace: &str) -> Result<ServiceDescriptor> {
        let url = format!("{}/builder/{}", self.base_url, workspace);
        debug!("Fetching builder service descriptor from {}", url);

        let response = self
            .transport
            .request(Method::GET, &url, auth)
            .send()
            .await?;

        self.transport.handle_response(response).await
    }

    /// Start a build of a project through the service's build link
    ///
    /// # Arguments
    /// * `link` - The `build` link of the builder service descriptor
    /// * `project` - Project path to build
    /// * `options` - Build options; the project defaults apply when absent
    pub async fn start_build(
        &self,
        auth: Option<&str>,
        link: &Link,
        project: &str,
        options: Option<&BuildOptions>,
    ) -> Result<BuildTaskDescriptor> {
        debug!("Starting build of {} via {}", project, link.href);

        let mut request = self
            .transport
            .request_link(link, auth)?
            .query(&[("project", project)]);
        if let Some(options) = options {
            request = request.json(options);
        }

        let response = request.send().await?;
        self.transport.handle_response(response).await
    }

    /// Follow a build task link (status, cancel) and return the updated task
    pub async fn follow(&self, auth: Option<&str>, link: &Link) -> Result<BuildTaskDescriptor> {
        let response = self.transport.request_link(link, auth)?.send().await?;
        self.transport.handle_response(response).await
    }
}
