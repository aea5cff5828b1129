//! Run queue
//!
//! Entry point of the engine. Accepts run requests, resolves project
//! metadata, decides whether a build is needed and spawns the task's
//! execution. Owns the task table and the runner registry.

use chrono::{DateTime, Utc};
use runway_core::domain::link::{LINK_REL_BUILD, LINK_REL_EXPORT_ZIP, find_link};
use runway_core::dto::registration::{RunnerServiceLocation, RunnerServiceRegistration};
use runway_core::dto::run::RunOptions;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::admission::Admission;
use crate::config::QueueConfig;
use crate::context::ServiceContext;
use crate::error::{QueueError, Result};
use crate::execution::{PendingBuild, TaskExecution};
use crate::registry::{RunnerRegistry, ScopeKey};
use crate::remote::{BuilderApi, ProjectApi, RemoteRunner, RunnerConnector};
use crate::request;
use crate::selection::{RandomSelectionStrategy, RunnerSelectionStrategy};
use crate::sweeper;
use crate::task::RunQueueTask;

const STOPPED: u8 = 0;
const RUNNING: u8 = 1;
/// `stop` is draining tasks; neither `start` nor other operations are accepted
const STOPPING: u8 = 2;

/// In-memory queue of run requests
pub struct RunQueue {
    config: QueueConfig,
    projects: Arc<dyn ProjectApi>,
    builder: Arc<dyn BuilderApi>,
    connector: Arc<dyn RunnerConnector>,
    registry: Arc<RunnerRegistry>,
    admission: Arc<Admission>,
    tasks: Mutex<BTreeMap<u64, Arc<RunQueueTask>>>,
    sequence: AtomicU64,
    lifecycle: AtomicU8,
    tracker: TaskTracker,
    shutdown: Mutex<CancellationToken>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
    permits: Option<Arc<Semaphore>>,
}

impl RunQueue {
    /// Creates a queue that picks among available runners at random
    pub fn new(
        config: QueueConfig,
        projects: Arc<dyn ProjectApi>,
        builder: Arc<dyn BuilderApi>,
        connector: Arc<dyn RunnerConnector>,
    ) -> Self {
        let admission = Arc::new(Admission::new(
            Arc::new(RandomSelectionStrategy),
            config.runner_poll_interval,
            config.max_state_failures,
        ));
        let permits = (config.max_concurrent_tasks > 0)
            .then(|| Arc::new(Semaphore::new(config.max_concurrent_tasks)));

        Self {
            config,
            projects,
            builder,
            connector,
            registry: Arc::new(RunnerRegistry::new()),
            admission,
            tasks: Mutex::new(BTreeMap::new()),
            sequence: AtomicU64::new(1),
            lifecycle: AtomicU8::new(STOPPED),
            tracker: TaskTracker::new(),
            shutdown: Mutex::new(CancellationToken::new()),
            sweeper: Mutex::new(None),
            permits,
        }
    }

    /// Replaces the runner selection strategy
    pub fn with_strategy(mut self, strategy: Arc<dyn RunnerSelectionStrategy>) -> Self {
        self.admission = Arc::new(Admission::new(
            strategy,
            self.config.runner_poll_interval,
            self.config.max_state_failures,
        ));
        self
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn registry(&self) -> &RunnerRegistry {
        &self.registry
    }

    fn task_table(&self) -> MutexGuard<'_, BTreeMap<u64, Arc<RunQueueTask>>> {
        self.tasks.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn shutdown_token(&self) -> MutexGuard<'_, CancellationToken> {
        self.shutdown.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_started(&self) -> Result<()> {
        if self.lifecycle.load(Ordering::Acquire) == RUNNING {
            Ok(())
        } else {
            Err(QueueError::NotStarted)
        }
    }

    // =============================================================================
    // Lifecycle
    // =============================================================================

    /// Starts accepting requests
    ///
    /// Fails while a previous `stop` is still draining.
    pub fn start(self: &Arc<Self>) -> Result<()> {
        match self
            .lifecycle
            .compare_exchange(STOPPED, RUNNING, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {}
            Err(STOPPING) => return Err(QueueError::Stopping),
            Err(_) => return Err(QueueError::AlreadyStarted),
        }

        self.tracker.reopen();
        *self.shutdown_token() = CancellationToken::new();

        if !self.config.sweep_interval.is_zero() {
            let handle = sweeper::spawn_periodic(Arc::downgrade(self), self.config.sweep_interval);
            if let Some(previous) = self
                .sweeper
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .replace(handle)
            {
                previous.abort();
            }
        }

        info!("Run queue started");
        Ok(())
    }

    /// Stops the queue
    ///
    /// Waits up to the configured grace period for running tasks, cancels
    /// whatever is left, then forgets all tasks and runner pools.
    pub async fn stop(&self) -> Result<()> {
        if self
            .lifecycle
            .compare_exchange(RUNNING, STOPPING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(QueueError::NotStarted);
        }

        if let Some(handle) = self
            .sweeper
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            handle.abort();
        }

        self.tracker.close();
        if tokio::time::timeout(self.config.shutdown_grace, self.tracker.wait())
            .await
            .is_err()
        {
            warn!(
                "{} task(s) still running after {:?}, cancelling them",
                self.tracker.len(),
                self.config.shutdown_grace
            );
            self.shutdown_token().cancel();
        }

        self.task_table().clear();
        self.registry.clear();
        self.lifecycle.store(STOPPED, Ordering::Release);

        info!("Run queue stopped");
        Ok(())
    }

    // =============================================================================
    // Run Requests
    // =============================================================================

    /// Queues a request to run a project
    ///
    /// Returns as soon as the task is recorded; the build and the dispatch to
    /// a runner happen in the background. Their errors end up on the task.
    ///
    /// # Arguments
    /// * `ctx` - Identity of the caller, used for every remote call made for the task
    /// * `workspace` - Workspace id
    /// * `project` - Project path inside the workspace
    /// * `options` - Caller's run options; project attributes fill the gaps
    pub async fn submit(
        &self,
        ctx: ServiceContext,
        workspace: &str,
        project: &str,
        options: Option<RunOptions>,
    ) -> Result<Arc<RunQueueTask>> {
        self.check_started()?;

        let descriptor = self
            .projects
            .get_project(&ctx, workspace, project)
            .await
            .map_err(|e| {
                QueueError::remote(
                    format!("Unable to get project {} in workspace {}", project, workspace),
                    e,
                )
            })?;

        let mut run_request = request::build_run_request(
            workspace,
            project,
            &descriptor,
            options.as_ref(),
            self.config.default_memory_size,
        )?;

        let build = if request::needs_build(options.as_ref(), &descriptor) {
            debug!("Project {} needs to be built first", project);
            let service = self.builder.describe(&ctx, workspace).await.map_err(|e| {
                QueueError::remote(
                    format!("Unable to locate builder service for workspace {}", workspace),
                    e,
                )
            })?;
            let link = service.link(LINK_REL_BUILD).cloned().ok_or_else(|| {
                QueueError::InvalidResponse(
                    "Unable to get URL for starting build of the application".to_string(),
                )
            })?;
            Some(PendingBuild {
                link,
                options: options.and_then(|o| o.build_options),
            })
        } else {
            run_request.deployment_sources_url =
                find_link(&descriptor.links, LINK_REL_EXPORT_ZIP).map(|link| link.href.clone());
            None
        };

        run_request.id = self.sequence.fetch_add(1, Ordering::SeqCst);
        run_request.lifetime = self.config.app_lifetime;

        let token = self.shutdown_token().child_token();
        let task = Arc::new(RunQueueTask::new(run_request, ctx, token));

        self.purge_expired_tasks().await;
        self.task_table().insert(task.id(), Arc::clone(&task));

        let execution = TaskExecution {
            task: Arc::clone(&task),
            build,
            builder: Arc::clone(&self.builder),
            registry: Arc::clone(&self.registry),
            admission: Arc::clone(&self.admission),
            build_poll_interval: self.config.build_poll_interval,
            permits: self.permits.clone(),
        };
        self.tracker.spawn(execution.run());

        info!(
            "Task {} queued: {} in workspace {} on runner '{}' for {}",
            task.id(),
            project,
            workspace,
            task.request().runner,
            task.context().user_name()
        );
        Ok(task)
    }

    /// Get a task by id
    pub fn get_task(&self, id: u64) -> Result<Arc<RunQueueTask>> {
        self.check_started()?;
        self.task_table()
            .get(&id)
            .cloned()
            .ok_or(QueueError::TaskNotFound(id))
    }

    /// Snapshot of all tracked tasks, ordered by id
    pub fn list_tasks(&self) -> Result<Vec<Arc<RunQueueTask>>> {
        self.check_started()?;
        Ok(self.task_table().values().cloned().collect())
    }

    /// Cancels and removes tasks that waited or ran too long
    pub async fn purge_expired_tasks(&self) -> usize {
        self.purge_expired_tasks_at(Utc::now()).await
    }

    /// Same as `purge_expired_tasks`, judged at `now`
    pub async fn purge_expired_tasks_at(&self, now: DateTime<Utc>) -> usize {
        sweeper::purge_expired(&self.tasks, now, self.config.max_time_in_queue).await
    }

    // =============================================================================
    // Runner Services
    // =============================================================================

    /// Adds the runners of a runner service to the queue
    ///
    /// Runners join the pool of the registration's scope, or the shared pool
    /// when it has none. Returns `true` if the set of runners changed.
    pub async fn register_runner_service(
        &self,
        registration: &RunnerServiceRegistration,
    ) -> Result<bool> {
        self.check_started()?;

        let scope = match &registration.access_criteria {
            Some(criteria) => ScopeKey::new(criteria.project.clone(), criteria.workspace.clone()),
            None => ScopeKey::shared(),
        };
        let runners = self.discover_runners(&registration.location).await?;

        Ok(self.registry.register(scope, &runners))
    }

    /// Removes the runners of a runner service from every pool
    ///
    /// Returns `true` if the set of runners changed.
    pub async fn unregister_runner_service(&self, location: &RunnerServiceLocation) -> Result<bool> {
        self.check_started()?;

        let runners = self.discover_runners(location).await?;
        Ok(self.registry.unregister(&runners))
    }

    async fn discover_runners(&self, location: &RunnerServiceLocation) -> Result<Vec<RemoteRunner>> {
        let endpoint = self.connector.connect(&location.url);
        let descriptors = endpoint.available_runners().await.map_err(|e| {
            QueueError::remote(
                format!("Unable to get available runners from {}", location.url),
                e,
            )
        })?;

        debug!(
            "Runner service {} hosts {} runner(s)",
            location.url,
            descriptors.len()
        );
        Ok(descriptors
            .into_iter()
            .map(|descriptor| RemoteRunner::new(descriptor.name, Arc::clone(&endpoint)))
            .collect())
    }
}
