//! Expiration sweeper
//!
//! Cancels and forgets tasks that waited too long for a runner or whose
//! application outlived its lifetime. Runs on every submission and,
//! optionally, on a background interval.

use chrono::{DateTime, TimeDelta, Utc};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::time;
use tracing::{debug, error};

use crate::queue::RunQueue;
use crate::task::RunQueueTask;

/// Why a task expired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Expiry {
    /// Never handed to a runner within the allowed queue time
    QueueWait,
    /// Handed to a runner longer ago than the application lifetime
    Lifetime,
}

pub(crate) fn check_expiry(
    task: &RunQueueTask,
    now: DateTime<Utc>,
    max_time_in_queue: Duration,
) -> Option<Expiry> {
    match task.send_time() {
        None => {
            let limit = TimeDelta::from_std(max_time_in_queue).ok()?;
            let deadline = task.creation_time().checked_add_signed(limit)?;
            (deadline < now).then_some(Expiry::QueueWait)
        }
        Some(sent_at) => {
            let lifetime = i64::try_from(task.request().lifetime).ok()?;
            let deadline = sent_at.checked_add_signed(TimeDelta::try_seconds(lifetime)?)?;
            (deadline < now).then_some(Expiry::Lifetime)
        }
    }
}

/// Cancels and removes every expired task
///
/// A task whose cancellation fails stays in the table for the next sweep.
/// Returns the number of removed tasks.
pub(crate) async fn purge_expired(
    tasks: &Mutex<BTreeMap<u64, Arc<RunQueueTask>>>,
    now: DateTime<Utc>,
    max_time_in_queue: Duration,
) -> usize {
    let expired: Vec<(Arc<RunQueueTask>, Expiry)> = {
        let tasks = tasks.lock().unwrap_or_else(|e| e.into_inner());
        tasks
            .values()
            .filter_map(|task| {
                check_expiry(task, now, max_time_in_queue).map(|expiry| (Arc::clone(task), expiry))
            })
            .collect()
    };

    if expired.is_empty() {
        return 0;
    }

    let mut removed = Vec::with_capacity(expired.len());
    let mut waiting = 0;
    for (task, expiry) in expired {
        if let Err(e) = task.cancel().await {
            error!("Unable to cancel expired task {}: {}", task.id(), e);
            continue;
        }
        if expiry == Expiry::QueueWait {
            waiting += 1;
        }
        removed.push(task.id());
    }

    let mut tasks = tasks.lock().unwrap_or_else(|e| e.into_inner());
    for id in &removed {
        tasks.remove(id);
    }

    if !removed.is_empty() {
        debug!(
            "Removed {} expired tasks, {} of them were waiting for processing",
            removed.len(),
            waiting
        );
    }
    removed.len()
}

/// Spawns the background sweep loop
///
/// The loop holds only a weak reference and ends once the queue is dropped.
pub(crate) fn spawn_periodic(queue: Weak<RunQueue>, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let Some(queue) = queue.upgrade() else {
                break;
            };
            queue.purge_expired_tasks().await;
        }
    })
}
