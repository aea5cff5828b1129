//! Remote collaborators
//!
//! The queue talks to three kinds of remote services: the project API, the
//! builder API and runner services. Each is reached through a trait so the
//! queue can be driven by HTTP clients in production and by in-memory fakes
//! in tests.

mod http;

pub use http::HttpRunnerConnector;

use async_trait::async_trait;
use runway_client::Result;
use runway_core::domain::build::{BuildOptions, BuildTaskDescriptor, ServiceDescriptor};
use runway_core::domain::link::Link;
use runway_core::domain::project::ProjectDescriptor;
use runway_core::domain::request::RunRequest;
use runway_core::domain::runner::{ApplicationProcessDescriptor, RunnerDescriptor, RunnerState};
use std::sync::Arc;

use crate::context::ServiceContext;

/// Source of project metadata
#[async_trait]
pub trait ProjectApi: Send + Sync {
    async fn get_project(
        &self,
        ctx: &ServiceContext,
        workspace: &str,
        project: &str,
    ) -> Result<ProjectDescriptor>;
}

/// Remote builder service
#[async_trait]
pub trait BuilderApi: Send + Sync {
    /// Locates the builder service for a workspace
    async fn describe(&self, ctx: &ServiceContext, workspace: &str) -> Result<ServiceDescriptor>;

    /// Starts a build through the service's `build` link
    async fn start_build(
        &self,
        ctx: &ServiceContext,
        link: &Link,
        project: &str,
        options: Option<&BuildOptions>,
    ) -> Result<BuildTaskDescriptor>;

    /// Follows a build task link (status, cancel)
    async fn follow(&self, ctx: &ServiceContext, link: &Link) -> Result<BuildTaskDescriptor>;
}

/// A runner service at one location
#[async_trait]
pub trait RunnerEndpoint: Send + Sync {
    fn base_url(&self) -> &str;

    /// Runner kinds hosted by the service
    async fn available_runners(&self) -> Result<Vec<RunnerDescriptor>>;

    async fn runner_state(&self, runner: &str) -> Result<RunnerState>;

    async fn run(
        &self,
        ctx: &ServiceContext,
        request: &RunRequest,
    ) -> Result<ApplicationProcessDescriptor>;

    async fn stop(&self, ctx: &ServiceContext, process_id: u64) -> Result<()>;
}

/// Opens runner endpoints for registered locations
pub trait RunnerConnector: Send + Sync {
    fn connect(&self, url: &str) -> Arc<dyn RunnerEndpoint>;
}

/// One runner kind hosted by a runner service
///
/// Several services may host a runner with the same name; two remote runners
/// are the same only if both the name and the service location match.
#[derive(Clone)]
pub struct RemoteRunner {
    name: String,
    endpoint: Arc<dyn RunnerEndpoint>,
}

impl RemoteRunner {
    pub fn new(name: impl Into<String>, endpoint: Arc<dyn RunnerEndpoint>) -> Self {
        Self {
            name: name.into(),
            endpoint,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_url(&self) -> &str {
        self.endpoint.base_url()
    }

    /// Queries the live capacity of this runner
    pub async fn state(&self) -> Result<RunnerState> {
        self.endpoint.runner_state(&self.name).await
    }

    pub async fn run(
        &self,
        ctx: &ServiceContext,
        request: &RunRequest,
    ) -> Result<ApplicationProcessDescriptor> {
        self.endpoint.run(ctx, request).await
    }

    pub async fn stop(&self, ctx: &ServiceContext, process_id: u64) -> Result<()> {
        self.endpoint.stop(ctx, process_id).await
    }
}

impl PartialEq for RemoteRunner {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.base_url() == other.base_url()
    }
}

impl Eq for RemoteRunner {}

impl std::fmt::Debug for RemoteRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteRunner")
            .field("name", &self.name)
            .field("base_url", &self.base_url())
            .finish()
    }
}

impl std::fmt::Display for RemoteRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at {}", self.name, self.base_url())
    }
}
