//! In-memory stand-ins for the remote services, shared by unit tests

use async_trait::async_trait;
use runway_client::{ClientError, Result};
use runway_core::domain::build::{BuildOptions, BuildStatus, BuildTaskDescriptor, ServiceDescriptor};
use runway_core::domain::link::{
    LINK_REL_BUILD, LINK_REL_CANCEL, LINK_REL_DOWNLOAD_RESULT, LINK_REL_EXPORT_ZIP,
    LINK_REL_GET_STATUS, LINK_REL_VIEW_LOG, Link,
};
use runway_core::domain::project::{ATTR_RUNNER_NAME, ProjectDescriptor};
use runway_core::domain::request::RunRequest;
use runway_core::domain::runner::{
    ApplicationProcessDescriptor, ApplicationStatus, RunnerDescriptor, RunnerState,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::QueueConfig;
use crate::context::ServiceContext;
use crate::remote::{BuilderApi, ProjectApi, RunnerConnector, RunnerEndpoint};

/// Config with short intervals and no background sweep
pub fn test_config() -> QueueConfig {
    QueueConfig {
        max_time_in_queue: Duration::from_secs(60),
        build_poll_interval: Duration::from_millis(5),
        runner_poll_interval: Duration::from_millis(5),
        shutdown_grace: Duration::from_millis(100),
        sweep_interval: Duration::ZERO,
        ..QueueConfig::default()
    }
}

/// Request for project "/app" in workspace "ws"
pub fn run_request(id: u64, runner: &str, memory_size: u32) -> RunRequest {
    RunRequest {
        id,
        workspace: "ws".to_string(),
        project: "/app".to_string(),
        runner: runner.to_string(),
        options: HashMap::new(),
        memory_size,
        debug_mode: None,
        deployment_sources_url: None,
        lifetime: 900,
    }
}

/// Project running on `runner`, with a sources export link
pub fn project(runner: &str) -> ProjectDescriptor {
    let mut descriptor = ProjectDescriptor {
        name: "app".to_string(),
        attributes: HashMap::new(),
        links: vec![Link::new(
            LINK_REL_EXPORT_ZIP,
            "http://projects/export/ws/app",
            "GET",
        )],
    };
    if !runner.is_empty() {
        descriptor
            .attributes
            .insert(ATTR_RUNNER_NAME.to_string(), vec![runner.to_string()]);
    }
    descriptor
}

#[derive(Default)]
struct EndpointState {
    free_memory: HashMap<String, u64>,
    failing_state_queries: u32,
    state_queries: u32,
    fail_stops: bool,
    run_delay: Duration,
    next_process_id: u64,
    runs: Vec<RunRequest>,
    run_tokens: Vec<Option<String>>,
    stopped: Vec<u64>,
    stop_tokens: Vec<Option<String>>,
}

/// Runner service hosting a fixed set of runners
pub struct FakeEndpoint {
    url: String,
    state: Mutex<EndpointState>,
}

impl FakeEndpoint {
    pub fn new(url: &str, runners: &[(&str, u64)]) -> Arc<Self> {
        let state = EndpointState {
            free_memory: runners
                .iter()
                .map(|(name, free)| (name.to_string(), *free))
                .collect(),
            next_process_id: 1,
            ..EndpointState::default()
        };
        Arc::new(Self {
            url: url.to_string(),
            state: Mutex::new(state),
        })
    }

    pub fn set_free_memory(&self, runner: &str, free_memory: u64) {
        self.state
            .lock()
            .unwrap()
            .free_memory
            .insert(runner.to_string(), free_memory);
    }

    /// Makes the next `count` state queries fail
    pub fn fail_state_queries(&self, count: u32) {
        self.state.lock().unwrap().failing_state_queries = count;
    }

    pub fn state_queries(&self) -> u32 {
        self.state.lock().unwrap().state_queries
    }

    pub fn fail_stops(&self, fail: bool) {
        self.state.lock().unwrap().fail_stops = fail;
    }

    /// Makes `run` take `delay` after recording the request
    pub fn delay_runs(&self, delay: Duration) {
        self.state.lock().unwrap().run_delay = delay;
    }

    pub fn runs(&self) -> Vec<RunRequest> {
        self.state.lock().unwrap().runs.clone()
    }

    pub fn run_tokens(&self) -> Vec<Option<String>> {
        self.state.lock().unwrap().run_tokens.clone()
    }

    pub fn stopped(&self) -> Vec<u64> {
        self.state.lock().unwrap().stopped.clone()
    }

    pub fn stop_tokens(&self) -> Vec<Option<String>> {
        self.state.lock().unwrap().stop_tokens.clone()
    }
}

#[async_trait]
impl RunnerEndpoint for FakeEndpoint {
    fn base_url(&self) -> &str {
        &self.url
    }

    async fn available_runners(&self) -> Result<Vec<RunnerDescriptor>> {
        let state = self.state.lock().unwrap();
        let mut names: Vec<&String> = state.free_memory.keys().collect();
        names.sort();
        Ok(names
            .into_iter()
            .map(|name| RunnerDescriptor {
                name: name.clone(),
                description: None,
            })
            .collect())
    }

    async fn runner_state(&self, runner: &str) -> Result<RunnerState> {
        let mut state = self.state.lock().unwrap();
        state.state_queries += 1;
        if state.failing_state_queries > 0 {
            state.failing_state_queries -= 1;
            return Err(ClientError::api_error(503, "Runner is unreachable"));
        }

        let free_memory = state
            .free_memory
            .get(runner)
            .copied()
            .ok_or_else(|| ClientError::api_error(404, format!("Unknown runner {}", runner)))?;
        Ok(RunnerState {
            name: runner.to_string(),
            total_memory: free_memory.max(4096),
            free_memory,
            running_apps: 0,
        })
    }

    async fn run(
        &self,
        ctx: &ServiceContext,
        request: &RunRequest,
    ) -> Result<ApplicationProcessDescriptor> {
        let (process_id, delay) = {
            let mut state = self.state.lock().unwrap();
            state.runs.push(request.clone());
            state.run_tokens.push(ctx.token.clone());
            let process_id = state.next_process_id;
            state.next_process_id += 1;
            (process_id, state.run_delay)
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        Ok(ApplicationProcessDescriptor {
            process_id,
            status: ApplicationStatus::Running,
            start_time: None,
            links: vec![],
        })
    }

    async fn stop(&self, ctx: &ServiceContext, process_id: u64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_stops {
            return Err(ClientError::api_error(500, "Unable to stop process"));
        }
        state.stopped.push(process_id);
        state.stop_tokens.push(ctx.token.clone());
        Ok(())
    }
}

/// Hands out registered fake endpoints; unknown locations host no runners
#[derive(Default)]
pub struct FakeConnector {
    endpoints: Mutex<HashMap<String, Arc<FakeEndpoint>>>,
}

impl FakeConnector {
    pub fn with(endpoints: &[Arc<FakeEndpoint>]) -> Arc<Self> {
        let connector = Self::default();
        for endpoint in endpoints {
            connector.add(Arc::clone(endpoint));
        }
        Arc::new(connector)
    }

    pub fn add(&self, endpoint: Arc<FakeEndpoint>) {
        self.endpoints
            .lock()
            .unwrap()
            .insert(endpoint.url.clone(), endpoint);
    }
}

impl RunnerConnector for FakeConnector {
    fn connect(&self, url: &str) -> Arc<dyn RunnerEndpoint> {
        match self.endpoints.lock().unwrap().get(url) {
            Some(endpoint) => Arc::clone(endpoint) as Arc<dyn RunnerEndpoint>,
            None => FakeEndpoint::new(url, &[]),
        }
    }
}

/// Project service knowing a fixed set of projects
#[derive(Default)]
pub struct FakeProjects {
    projects: Mutex<HashMap<(String, String), ProjectDescriptor>>,
    tokens: Mutex<Vec<Option<String>>>,
}

impl FakeProjects {
    pub fn with(workspace: &str, path: &str, descriptor: ProjectDescriptor) -> Arc<Self> {
        let projects = Self::default();
        projects
            .projects
            .lock()
            .unwrap()
            .insert((workspace.to_string(), path.to_string()), descriptor);
        Arc::new(projects)
    }

    pub fn tokens(&self) -> Vec<Option<String>> {
        self.tokens.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProjectApi for FakeProjects {
    async fn get_project(
        &self,
        ctx: &ServiceContext,
        workspace: &str,
        project: &str,
    ) -> Result<ProjectDescriptor> {
        self.tokens.lock().unwrap().push(ctx.token.clone());
        self.projects
            .lock()
            .unwrap()
            .get(&(workspace.to_string(), project.to_string()))
            .cloned()
            .ok_or_else(|| ClientError::api_error(404, format!("Project {} not found", project)))
    }
}

#[derive(Default)]
struct BuilderState {
    statuses: VecDeque<BuildStatus>,
    with_log: bool,
    without_status_link: bool,
    started: Vec<(String, Option<String>)>,
    cancelled: bool,
}

/// Builder service that reports a scripted sequence of statuses
///
/// The last scripted status repeats once the script runs out.
#[derive(Default)]
pub struct FakeBuilder {
    state: Mutex<BuilderState>,
}

const BUILD_TASK_ID: u64 = 1;

impl FakeBuilder {
    pub fn scripted(statuses: &[BuildStatus]) -> Arc<Self> {
        let builder = Self::default();
        builder.state.lock().unwrap().statuses = statuses.iter().copied().collect();
        Arc::new(builder)
    }

    /// Exposes a build log link on every status
    pub fn with_log(self: Arc<Self>) -> Arc<Self> {
        self.state.lock().unwrap().with_log = true;
        self
    }

    /// Leaves the status link off started builds
    pub fn without_status_link(self: Arc<Self>) -> Arc<Self> {
        self.state.lock().unwrap().without_status_link = true;
        self
    }

    /// Projects built so far and the token each build was started with
    pub fn started(&self) -> Vec<(String, Option<String>)> {
        self.state.lock().unwrap().started.clone()
    }

    pub fn cancelled(&self) -> bool {
        self.state.lock().unwrap().cancelled
    }

    fn descriptor(&self, status: BuildStatus) -> BuildTaskDescriptor {
        let state = self.state.lock().unwrap();
        let mut links = vec![Link::new(LINK_REL_CANCEL, "http://builder/cancel/1", "POST")];
        if !state.without_status_link {
            links.push(Link::new(LINK_REL_GET_STATUS, "http://builder/status/1", "GET"));
        }
        if status == BuildStatus::Successful {
            links.push(Link::new(
                LINK_REL_DOWNLOAD_RESULT,
                "http://builder/download/1",
                "GET",
            ));
        }
        if state.with_log {
            links.push(Link::new(LINK_REL_VIEW_LOG, "http://builder/logs/1", "GET"));
        }

        BuildTaskDescriptor {
            task_id: BUILD_TASK_ID,
            status,
            links,
        }
    }
}

#[async_trait]
impl BuilderApi for FakeBuilder {
    async fn describe(&self, _ctx: &ServiceContext, workspace: &str) -> Result<ServiceDescriptor> {
        Ok(ServiceDescriptor {
            description: Some(format!("Builder for {}", workspace)),
            links: vec![Link::new(LINK_REL_BUILD, "http://builder/build", "POST")],
        })
    }

    async fn start_build(
        &self,
        ctx: &ServiceContext,
        _link: &Link,
        project: &str,
        _options: Option<&BuildOptions>,
    ) -> Result<BuildTaskDescriptor> {
        self.state
            .lock()
            .unwrap()
            .started
            .push((project.to_string(), ctx.token.clone()));
        Ok(self.descriptor(BuildStatus::InQueue))
    }

    async fn follow(&self, _ctx: &ServiceContext, link: &Link) -> Result<BuildTaskDescriptor> {
        let status = match link.rel.as_str() {
            LINK_REL_CANCEL => {
                self.state.lock().unwrap().cancelled = true;
                BuildStatus::Cancelled
            }
            LINK_REL_GET_STATUS => {
                let mut state = self.state.lock().unwrap();
                if state.statuses.len() > 1 {
                    state.statuses.pop_front().unwrap_or(BuildStatus::InProgress)
                } else {
                    state.statuses.front().copied().unwrap_or(BuildStatus::InProgress)
                }
            }
            other => return Err(ClientError::MissingLink(other.to_string())),
        };
        Ok(self.descriptor(status))
    }
}
