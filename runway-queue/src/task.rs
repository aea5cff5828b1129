//! Run queue tasks
//!
//! A task is the queue's record of one run request. Its state moves from
//! `Queued` through the optional build phase to dispatch, and ends as
//! `Started`, `Failed` or `Cancelled`. State changes are published on a
//! watch channel so callers can wait for the outcome.

use chrono::{DateTime, Utc};
use runway_core::domain::request::RunRequest;
use runway_core::domain::runner::ApplicationProcessDescriptor;
use runway_core::dto::task::{TaskDescriptor, TaskStatus};
use std::sync::OnceLock;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::context::ServiceContext;
use crate::error::{QueueError, Result};
use crate::remote::RemoteRunner;

/// Application process started on a runner for a task
#[derive(Debug, Clone)]
pub struct RunnerProcess {
    pub runner: RemoteRunner,
    pub descriptor: ApplicationProcessDescriptor,
}

impl RunnerProcess {
    pub fn process_id(&self) -> u64 {
        self.descriptor.process_id
    }

    /// Asks the runner to stop the process
    pub async fn stop(&self, ctx: &ServiceContext) -> Result<()> {
        self.runner
            .stop(ctx, self.process_id())
            .await
            .map_err(|e| {
                QueueError::remote(
                    format!(
                        "Unable to stop process {} on runner {}",
                        self.process_id(),
                        self.runner
                    ),
                    e,
                )
            })
    }
}

/// Lifecycle state of a task
#[derive(Debug, Clone)]
pub enum TaskState {
    /// Submitted, not picked up yet
    Queued,
    AwaitingBuild { build_task_id: u64 },
    BuildDone,
    /// Looking for a runner with enough capacity
    DispatchingToRunner,
    Started(RunnerProcess),
    Failed(String),
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    pub fn status(&self) -> TaskStatus {
        match self {
            TaskState::Queued => TaskStatus::Queued,
            TaskState::AwaitingBuild { .. } => TaskStatus::AwaitingBuild,
            TaskState::BuildDone => TaskStatus::BuildDone,
            TaskState::DispatchingToRunner => TaskStatus::DispatchingToRunner,
            TaskState::Started(_) => TaskStatus::Started,
            TaskState::Failed(_) => TaskStatus::Failed,
            TaskState::Cancelled => TaskStatus::Cancelled,
        }
    }
}

/// One run request tracked by the queue
#[derive(Debug)]
pub struct RunQueueTask {
    id: u64,
    request: RunRequest,
    context: ServiceContext,
    created_at: DateTime<Utc>,
    sent_at: OnceLock<DateTime<Utc>>,
    cancel_token: CancellationToken,
    state: watch::Sender<TaskState>,
}

impl RunQueueTask {
    pub(crate) fn new(
        request: RunRequest,
        context: ServiceContext,
        cancel_token: CancellationToken,
    ) -> Self {
        Self::with_creation_time(request, context, cancel_token, Utc::now())
    }

    pub(crate) fn with_creation_time(
        request: RunRequest,
        context: ServiceContext,
        cancel_token: CancellationToken,
        created_at: DateTime<Utc>,
    ) -> Self {
        let (state, _) = watch::channel(TaskState::Queued);
        Self {
            id: request.id,
            request,
            context,
            created_at,
            sent_at: OnceLock::new(),
            cancel_token,
            state,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn request(&self) -> &RunRequest {
        &self.request
    }

    pub fn context(&self) -> &ServiceContext {
        &self.context
    }

    pub fn creation_time(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// When the request was handed to a runner
    pub fn send_time(&self) -> Option<DateTime<Utc>> {
        self.sent_at.get().copied()
    }

    /// Not handed to a runner yet
    pub fn is_waiting(&self) -> bool {
        self.sent_at.get().is_none()
    }

    pub fn is_done(&self) -> bool {
        self.state.borrow().is_terminal()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    pub fn state(&self) -> TaskState {
        self.state.borrow().clone()
    }

    pub fn status(&self) -> TaskStatus {
        self.state.borrow().status()
    }

    /// The started process, once there is one
    pub fn process(&self) -> Option<RunnerProcess> {
        match &*self.state.borrow() {
            TaskState::Started(process) => Some(process.clone()),
            _ => None,
        }
    }

    pub(crate) fn cancel_token(&self) -> &CancellationToken {
        &self.cancel_token
    }

    /// Records the dispatch time; the first recorded time is kept
    pub(crate) fn mark_sent(&self, at: DateTime<Utc>) {
        let _ = self.sent_at.set(at);
    }

    /// Moves to `next` unless the task already reached a final state
    pub(crate) fn transition(&self, next: TaskState) -> bool {
        self.state.send_if_modified(|current| {
            if current.is_terminal() {
                return false;
            }
            *current = next;
            true
        })
    }

    /// Cancels the task
    ///
    /// Interrupts a pending build or runner selection. If the application was
    /// already started, the runner is asked to stop it; when that request
    /// fails the error is returned and the task keeps its `Started` state.
    pub async fn cancel(&self) -> Result<()> {
        self.cancel_token.cancel();
        if self.transition(TaskState::Cancelled) {
            info!("Task {} cancelled", self.id);
            return Ok(());
        }

        let Some(process) = self.process() else {
            return Ok(());
        };

        process.stop(&self.context).await?;
        self.state.send_replace(TaskState::Cancelled);
        info!(
            "Task {} cancelled, process {} stopped on runner {}",
            self.id,
            process.process_id(),
            process.runner
        );
        Ok(())
    }

    /// Waits until the task reaches a final state
    ///
    /// Resolves to the started process, or to the error the task failed with.
    pub async fn wait(&self) -> Result<RunnerProcess> {
        let mut rx = self.state.subscribe();
        let state = rx
            .wait_for(TaskState::is_terminal)
            .await
            .map_err(|_| QueueError::Cancelled(self.id))?
            .clone();

        match state {
            TaskState::Started(process) => Ok(process),
            TaskState::Failed(message) => Err(QueueError::TaskFailed {
                id: self.id,
                message,
            }),
            _ => Err(QueueError::Cancelled(self.id)),
        }
    }

    /// Snapshot of the task for callers
    pub fn descriptor(&self) -> TaskDescriptor {
        let state = self.state();
        let (process_id, runner_url) = match &state {
            TaskState::Started(process) => (
                Some(process.process_id()),
                Some(process.runner.base_url().to_string()),
            ),
            _ => (None, None),
        };
        let error = match &state {
            TaskState::Failed(message) => Some(message.clone()),
            _ => None,
        };

        TaskDescriptor {
            id: self.id,
            workspace: self.request.workspace.clone(),
            project: self.request.project.clone(),
            runner: self.request.runner.clone(),
            status: state.status(),
            created_at: self.created_at,
            sent_at: self.send_time(),
            process_id,
            runner_url,
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeEndpoint, run_request};
    use runway_core::domain::runner::ApplicationStatus;
    use std::sync::Arc;
    use std::time::Duration;

    fn task(id: u64) -> RunQueueTask {
        RunQueueTask::new(
            run_request(id, "node", 512),
            ServiceContext::for_user("alice", "secret"),
            CancellationToken::new(),
        )
    }

    fn process(endpoint: Arc<FakeEndpoint>, process_id: u64) -> RunnerProcess {
        RunnerProcess {
            runner: RemoteRunner::new("node", endpoint),
            descriptor: ApplicationProcessDescriptor {
                process_id,
                status: ApplicationStatus::Running,
                start_time: None,
                links: vec![],
            },
        }
    }

    #[test]
    fn test_new_task_is_waiting() {
        let task = task(7);
        assert_eq!(task.id(), 7);
        assert!(task.is_waiting());
        assert!(!task.is_done());
        assert_eq!(task.status(), TaskStatus::Queued);
        assert_eq!(task.send_time(), None);
    }

    #[test]
    fn test_send_time_is_never_reset() {
        let task = task(1);
        let first = Utc::now();
        task.mark_sent(first);
        task.mark_sent(first + chrono::TimeDelta::seconds(30));
        assert_eq!(task.send_time(), Some(first));
        assert!(!task.is_waiting());
    }

    #[test]
    fn test_terminal_state_is_final() {
        let task = task(1);
        assert!(task.transition(TaskState::DispatchingToRunner));
        assert!(task.transition(TaskState::Failed("boom".to_string())));
        assert!(!task.transition(TaskState::DispatchingToRunner));
        assert_eq!(task.descriptor().error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_cancel_waiting_task() {
        let task = task(1);
        task.cancel().await.unwrap();
        assert!(task.is_cancelled());
        assert_eq!(task.status(), TaskStatus::Cancelled);
        assert!(matches!(task.wait().await, Err(QueueError::Cancelled(1))));
    }

    #[tokio::test]
    async fn test_cancel_started_task_stops_process() {
        let endpoint = FakeEndpoint::new("http://r1", &[("node", 1024)]);
        let task = task(3);
        task.transition(TaskState::Started(process(endpoint.clone(), 99)));

        task.cancel().await.unwrap();
        assert_eq!(endpoint.stopped(), vec![99]);
        assert_eq!(endpoint.stop_tokens(), vec![Some("secret".to_string())]);
        assert_eq!(task.status(), TaskStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_failed_stop_keeps_task_started() {
        let endpoint = FakeEndpoint::new("http://r1", &[("node", 1024)]);
        endpoint.fail_stops(true);
        let task = task(3);
        task.transition(TaskState::Started(process(endpoint.clone(), 5)));

        assert!(task.cancel().await.is_err());
        assert_eq!(task.status(), TaskStatus::Started);
    }

    #[tokio::test]
    async fn test_wait_returns_started_process() {
        let endpoint = FakeEndpoint::new("http://r1", &[("node", 1024)]);
        let task = Arc::new(task(4));

        let waiter = {
            let task = task.clone();
            tokio::spawn(async move { task.wait().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        task.transition(TaskState::Started(process(endpoint, 12)));

        let started = waiter.await.unwrap().unwrap();
        assert_eq!(started.process_id(), 12);
        assert_eq!(task.descriptor().process_id, Some(12));
        assert_eq!(task.descriptor().runner_url.as_deref(), Some("http://r1"));
    }
}
