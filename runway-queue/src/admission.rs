//! Admission control
//!
//! Chooses the runner that receives a request. Only runners of the requested
//! kind with at least the requested free memory are eligible. Capacity is
//! advisory and changes all the time, so it is queried live on every round;
//! while no runner fits, the selection waits for a pool change or the next
//! poll and tries again.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{QueueError, Result};
use crate::registry::RunnerPool;
use crate::remote::RemoteRunner;
use crate::selection::{AvailableRunner, RunnerSelectionStrategy};

/// Capacity-aware runner selection
pub struct Admission {
    strategy: Arc<dyn RunnerSelectionStrategy>,
    poll_interval: Duration,
    max_state_failures: u32,
}

impl Admission {
    pub fn new(
        strategy: Arc<dyn RunnerSelectionStrategy>,
        poll_interval: Duration,
        max_state_failures: u32,
    ) -> Self {
        Self {
            strategy,
            poll_interval,
            max_state_failures,
        }
    }

    /// Selects a runner named `runner_name` with at least `memory_size` MB free
    ///
    /// Blocks while no runner has enough capacity. Returns `Ok(None)` when
    /// `cancel` fires before a runner is found.
    ///
    /// # Errors
    /// * `NoMatchingRunner` - the pool holds no runner of the requested kind
    /// * `RunnerStateUnavailable` - too many capacity queries failed
    pub async fn select(
        &self,
        pool: &RunnerPool,
        runner_name: &str,
        memory_size: u32,
        cancel: &CancellationToken,
    ) -> Result<Option<RemoteRunner>> {
        let required = u64::from(memory_size);
        let mut failures = 0u32;

        loop {
            let changed = pool.changed();

            let matched = pool.matching(runner_name);
            if matched.is_empty() {
                return Err(QueueError::NoMatchingRunner(runner_name.to_string()));
            }

            let mut available = Vec::with_capacity(matched.len());
            for runner in matched {
                let state = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Ok(None),
                    state = runner.state() => state,
                };

                match state {
                    Ok(state) if state.free_memory >= required => {
                        available.push(AvailableRunner { runner, state });
                    }
                    Ok(state) => {
                        debug!(
                            "Runner {} has {} MB free, {} MB required",
                            runner, state.free_memory, required
                        );
                    }
                    Err(e) => {
                        failures += 1;
                        warn!("Unable to get state of runner {}: {}", runner, e);
                        if failures > self.max_state_failures {
                            return Err(QueueError::RunnerStateUnavailable {
                                runner: runner_name.to_string(),
                                attempts: failures,
                            });
                        }
                    }
                }
            }

            if available.len() == 1 {
                return Ok(available.pop().map(|candidate| candidate.runner));
            }
            if let Some(picked) = self.strategy.select(&available) {
                return Ok(Some(picked.runner.clone()));
            }

            debug!(
                "No '{}' runner with {} MB free, waiting",
                runner_name, required
            );
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(None),
                _ = changed => debug!("Runner pool changed, checking capacity again"),
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }
}
