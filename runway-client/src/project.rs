//! Project API client

use reqwest::{Client, Method};
use runway_core::domain::project::ProjectDescriptor;
use tracing::debug;

use crate::error::Result;
use crate::{JsonTransport, trim_base_url};

/// HTTP client for the project metadata service
#[derive(Debug, Clone)]
pub struct ProjectApiClient {
    /// Base URL of the API (e.g., "http://localhost:8080/api")
    base_url: String,
    transport: JsonTransport,
}

impl ProjectApiClient {
    /// Create a new project API client
    ///
    /// # Example
    /// ```
    /// use runway_client::ProjectApiClient;
    ///
    /// let client = ProjectApiClient::new("http://localhost:8080/api");
    /// ```
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a project API client with a configured reqwest Client
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        Self {
            base_url: trim_base_url(base_url),
            transport: JsonTransport::new(client),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL of a project descriptor
    ///
    /// A leading `/` in the project path is ignored.
    pub fn project_url(&self, workspace: &str, project: &str) -> String {
        format!(
            "{}/project/{}/{}",
            self.base_url,
            workspace,
            project.trim_start_matches('/')
        )
    }

    /// Fetch the descriptor of a project
    ///
    /// # Arguments
    /// * `auth` - Bearer token of the user on whose behalf the call is made
    /// * `workspace` - Workspace id
    /// * `project` - Project path inside the workspace
    pub async fn get_project(
        &self,
        auth: Option<&str>,
        workspace: &str,
        project: &str,
    ) -> Result<ProjectDescriptor> {
        let url = self.project_url(workspace, project);
        debug!("Fetching project descriptor from {}", url);

        let response = self
            .transport
            .request(Method::GET, &url, auth)
            .send()
            .await?;

        self.transport.handle_response(response).await
    }
}
