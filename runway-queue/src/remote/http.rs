//! HTTP implementations of the remote collaborators

use async_trait::async_trait;
use reqwest::Client;
use runway_client::{BuilderApiClient, ProjectApiClient, Result, RunnerServiceClient};
use runway_core::domain::build::{BuildOptions, BuildTaskDescriptor, ServiceDescriptor};
use runway_core::domain::link::Link;
use runway_core::domain::project::ProjectDescriptor;
use runway_core::domain::request::RunRequest;
use runway_core::domain::runner::{ApplicationProcessDescriptor, RunnerDescriptor, RunnerState};
use std::sync::Arc;

use super::{BuilderApi, ProjectApi, RunnerConnector, RunnerEndpoint};
use crate::context::ServiceContext;

#[async_trait]
impl ProjectApi for ProjectApiClient {
    async fn get_project(
        &self,
        ctx: &ServiceContext,
        workspace: &str,
        project: &str,
    ) -> Result<ProjectDescriptor> {
        ProjectApiClient::get_project(self, ctx.token(), workspace, project).await
    }
}

#[async_trait]
impl BuilderApi for BuilderApiClient {
    async fn describe(&self, ctx: &ServiceContext, workspace: &str) -> Result<ServiceDescriptor> {
        BuilderApiClient::describe(self, ctx.token(), workspace).await
    }

    async fn start_build(
        &self,
        ctx: &ServiceContext,
        link: &Link,
        project: &str,
        options: Option<&BuildOptions>,
    ) -> Result<BuildTaskDescriptor> {
        BuilderApiClient::start_build(self, ctx.token(), link, project, options).await
    }

    async fn follow(&self, ctx: &ServiceContext, link: &Link) -> Result<BuildTaskDescriptor> {
        BuilderApiClient::follow(self, ctx.token(), link).await
    }
}

#[async_trait]
impl RunnerEndpoint for RunnerServiceClient {
    fn base_url(&self) -> &str {
        RunnerServiceClient::base_url(self)
    }

    async fn available_runners(&self) -> Result<Vec<RunnerDescriptor>> {
        RunnerServiceClient::available_runners(self).await
    }

    async fn runner_state(&self, runner: &str) -> Result<RunnerState> {
        RunnerServiceClient::runner_state(self, runner).await
    }

    async fn run(
        &self,
        ctx: &ServiceContext,
        request: &RunRequest,
    ) -> Result<ApplicationProcessDescriptor> {
        RunnerServiceClient::run(self, ctx.token(), request).await
    }

    async fn stop(&self, ctx: &ServiceContext, process_id: u64) -> Result<()> {
        RunnerServiceClient::stop(self, ctx.token(), process_id).await
    }
}

/// Connects to runner services over HTTP, sharing one connection pool
#[derive(Debug, Clone, Default)]
pub struct HttpRunnerConnector {
    client: Client,
}

impl HttpRunnerConnector {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl RunnerConnector for HttpRunnerConnector {
    fn connect(&self, url: &str) -> Arc<dyn RunnerEndpoint> {
        Arc::new(RunnerServiceClient::with_client(url, self.client.clone()))
    }
}
