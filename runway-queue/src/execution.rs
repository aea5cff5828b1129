//! Task execution
//!
//! Runs on a spawned task for every submitted request:
//! 1. Build the project when required and poll the build until it finishes
//! 2. Resolve the runner pool and wait for a runner with enough capacity
//! 3. Hand the request to that runner
//!
//! Every wait observes the task's cancellation token so a cancelled task
//! unwinds without waiting out a poll interval.

use chrono::Utc;
use runway_client::ClientError;
use runway_core::domain::build::{BuildOptions, BuildStatus, BuildTaskDescriptor};
use runway_core::domain::link::{
    LINK_REL_CANCEL, LINK_REL_DOWNLOAD_RESULT, LINK_REL_GET_STATUS, LINK_REL_VIEW_LOG, Link,
};
use runway_core::domain::request::RunRequest;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::admission::Admission;
use crate::error::{QueueError, Result};
use crate::registry::RunnerRegistry;
use crate::remote::BuilderApi;
use crate::task::{RunQueueTask, RunnerProcess, TaskState};

/// Build to run before the application is dispatched
#[derive(Debug, Clone)]
pub(crate) struct PendingBuild {
    /// The builder service's `build` link
    pub link: Link,
    pub options: Option<BuildOptions>,
}

/// Everything a task needs to run to completion on its own
pub(crate) struct TaskExecution {
    pub task: Arc<RunQueueTask>,
    pub build: Option<PendingBuild>,
    pub builder: Arc<dyn BuilderApi>,
    pub registry: Arc<RunnerRegistry>,
    pub admission: Arc<Admission>,
    pub build_poll_interval: Duration,
    pub permits: Option<Arc<Semaphore>>,
}

impl TaskExecution {
    /// Drives the task to a final state
    pub async fn run(self) {
        let task = Arc::clone(&self.task);
        let token = task.cancel_token().clone();

        let _permit = match &self.permits {
            Some(permits) => {
                let acquired = tokio::select! {
                    biased;
                    _ = token.cancelled() => None,
                    permit = Arc::clone(permits).acquire_owned() => permit.ok(),
                };
                if acquired.is_none() {
                    task.transition(TaskState::Cancelled);
                    return;
                }
                acquired
            }
            None => None,
        };

        match self.execute().await {
            Ok(Some(process)) => self.attach(process).await,
            Ok(None) => {
                debug!("Task {} stopped before reaching a runner", task.id());
                task.transition(TaskState::Cancelled);
            }
            Err(e) => {
                error!("Task {} failed: {}", task.id(), e);
                task.transition(TaskState::Failed(e.to_string()));
            }
        }
    }

    async fn execute(&self) -> Result<Option<RunnerProcess>> {
        let mut request = self.task.request().clone();

        if let Some(build) = &self.build {
            match self.await_build(build).await? {
                Some(download_url) => request.deployment_sources_url = Some(download_url),
                None => return Ok(None),
            }
        }

        self.dispatch(request).await
    }

    /// Records the started process, or stops it if the task was cancelled meanwhile
    async fn attach(&self, process: RunnerProcess) {
        let task = &self.task;
        if !task.is_cancelled() && task.transition(TaskState::Started(process.clone())) {
            info!(
                "Task {} started as process {} on runner {}",
                task.id(),
                process.process_id(),
                process.runner
            );
            return;
        }

        warn!(
            "Task {} was cancelled while starting, stopping process {}",
            task.id(),
            process.process_id()
        );
        if let Err(e) = process.stop(task.context()).await {
            error!("{}", e);
        }
        task.transition(TaskState::Cancelled);
    }

    /// Starts the build and polls it until it finishes
    ///
    /// Returns the artifact download URL, or `None` when the task was
    /// cancelled while waiting.
    async fn await_build(&self, build: &PendingBuild) -> Result<Option<String>> {
        let task = &self.task;
        let token = task.cancel_token();
        let ctx = task.context();

        let started = self
            .builder
            .start_build(ctx, &build.link, &task.request().project, build.options.as_ref())
            .await
            .map_err(|e| {
                QueueError::remote(
                    format!("Unable to start build of {}", task.request().project),
                    e,
                )
            })?;

        info!(
            "Task {} waits for build {} of {}",
            task.id(),
            started.task_id,
            task.request().project
        );
        task.transition(TaskState::AwaitingBuild {
            build_task_id: started.task_id,
        });

        let status_link = started.link(LINK_REL_GET_STATUS).cloned().ok_or_else(|| {
            QueueError::remote(
                format!("Unable to check status of build {}", started.task_id),
                ClientError::MissingLink(LINK_REL_GET_STATUS.to_string()),
            )
        })?;

        let mut current = started.clone();
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    self.cancel_build(&current, &started).await;
                    return Ok(None);
                }
                _ = tokio::time::sleep(self.build_poll_interval) => {}
            }

            let polled = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    self.cancel_build(&current, &started).await;
                    return Ok(None);
                }
                polled = self.builder.follow(ctx, &status_link) => polled,
            };
            current = polled.map_err(|e| {
                QueueError::remote(
                    format!("Unable to get status of build {}", started.task_id),
                    e,
                )
            })?;

            if !current.status.is_terminal() {
                debug!("Build {} is {}", current.task_id, current.status);
                continue;
            }

            match current.status {
                BuildStatus::Successful => {
                    let download = current.link(LINK_REL_DOWNLOAD_RESULT).ok_or_else(|| {
                        QueueError::InvalidResponse(
                            "Application build is successful but there is no URL for download result of build"
                                .to_string(),
                        )
                    })?;
                    info!("Build {} for task {} is done", current.task_id, task.id());
                    task.transition(TaskState::BuildDone);
                    return Ok(Some(download.href.clone()));
                }
                _ => {
                    let mut message = format!(
                        "Unable to start application. Build of application is {}.",
                        current.status.to_string().to_lowercase()
                    );
                    if let Some(log) = current.link(LINK_REL_VIEW_LOG) {
                        message.push_str(&format!(" Build logs: {}", log.href));
                    }
                    return Err(QueueError::BuildFailed(message));
                }
            }
        }
    }

    /// Asks the builder to cancel a build; failures are only logged
    async fn cancel_build(&self, current: &BuildTaskDescriptor, started: &BuildTaskDescriptor) {
        let Some(cancel_link) = current
            .link(LINK_REL_CANCEL)
            .or_else(|| started.link(LINK_REL_CANCEL))
        else {
            error!(
                "Can't cancel build {} since cancel link is not available",
                started.task_id
            );
            return;
        };

        match self.builder.follow(self.task.context(), cancel_link).await {
            Ok(result) => debug!(
                "Build {} cancellation result: {}",
                result.task_id, result.status
            ),
            Err(e) => error!(
                "Unable to cancel build {} via {}: {}",
                started.task_id, cancel_link.href, e
            ),
        }
    }

    /// Finds a runner for the request and starts the application on it
    async fn dispatch(&self, request: RunRequest) -> Result<Option<RunnerProcess>> {
        let task = &self.task;
        let token = task.cancel_token();
        task.transition(TaskState::DispatchingToRunner);

        let pool = self
            .registry
            .resolve(Some(&request.project), Some(&request.workspace))?;

        let runner = match self
            .admission
            .select(&pool, &request.runner, request.memory_size, token)
            .await?
        {
            Some(runner) => runner,
            None if token.is_cancelled() => return Ok(None),
            None => return Err(QueueError::NoRunnerAvailable),
        };

        debug!("Use runner {} for task {}", runner, task.id());
        task.mark_sent(Utc::now());

        let descriptor = runner.run(task.context(), &request).await.map_err(|e| {
            QueueError::remote(
                format!("Runner {} failed to start task {}", runner, task.id()),
                e,
            )
        })?;

        Ok(Some(RunnerProcess { runner, descriptor }))
    }
}
