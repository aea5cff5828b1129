//! Runner pool registry
//!
//! Runners are grouped into pools keyed by (project, workspace) scope. A
//! request is served by the most specific pool that exists:
//! 1. runners dedicated to the project in its workspace
//! 2. runners dedicated to the workspace
//! 3. the shared pool
//!
//! Each pool has its own lock and change notification so that a selection
//! waiting for capacity in one pool never blocks another.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;
use tokio::sync::futures::Notified;
use tracing::{debug, info};

use crate::error::{QueueError, Result};
use crate::remote::RemoteRunner;

/// Partition key of runner pools
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopeKey {
    pub project: Option<String>,
    pub workspace: Option<String>,
}

impl ScopeKey {
    pub fn new(project: Option<String>, workspace: Option<String>) -> Self {
        Self { project, workspace }
    }

    /// Key of the pool shared by everyone
    pub fn shared() -> Self {
        Self::new(None, None)
    }

    pub fn workspace(workspace: impl Into<String>) -> Self {
        Self::new(None, Some(workspace.into()))
    }

    pub fn project(project: impl Into<String>, workspace: impl Into<String>) -> Self {
        Self::new(Some(project.into()), Some(workspace.into()))
    }

    /// Keys consulted for a request, most specific first
    pub fn lookup_chain(project: Option<&str>, workspace: Option<&str>) -> Vec<ScopeKey> {
        let mut chain = Vec::with_capacity(3);
        if let Some(workspace) = workspace {
            if let Some(project) = project {
                chain.push(ScopeKey::project(project, workspace));
            }
            chain.push(ScopeKey::workspace(workspace));
        }
        chain.push(ScopeKey::shared());
        chain
    }
}

impl std::fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "(project={}, workspace={})",
            self.project.as_deref().unwrap_or("*"),
            self.workspace.as_deref().unwrap_or("*")
        )
    }
}

/// A set of runners serving one scope
///
/// Membership keeps insertion order and never holds the same runner twice.
#[derive(Debug, Default)]
pub struct RunnerPool {
    runners: Mutex<Vec<RemoteRunner>>,
    changed: Notify,
}

impl RunnerPool {
    pub fn new() -> Self {
        Self::default()
    }

    fn runners(&self) -> MutexGuard<'_, Vec<RemoteRunner>> {
        self.runners.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Adds runners, waking every selection waiting on this pool if anything changed
    pub fn add(&self, runners: &[RemoteRunner]) -> bool {
        let mut current = self.runners();
        let before = current.len();
        for runner in runners {
            if !current.contains(runner) {
                current.push(runner.clone());
            }
        }
        let modified = current.len() != before;
        drop(current);

        if modified {
            self.changed.notify_waiters();
        }
        modified
    }

    /// Removes runners, waking every selection waiting on this pool if anything changed
    pub fn remove(&self, runners: &[RemoteRunner]) -> bool {
        let mut current = self.runners();
        let before = current.len();
        current.retain(|runner| !runners.contains(runner));
        let modified = current.len() != before;
        drop(current);

        if modified {
            self.changed.notify_waiters();
        }
        modified
    }

    pub fn len(&self) -> usize {
        self.runners().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the runners with the given name
    pub fn matching(&self, name: &str) -> Vec<RemoteRunner> {
        self.runners()
            .iter()
            .filter(|runner| runner.name() == name)
            .cloned()
            .collect()
    }

    pub fn snapshot(&self) -> Vec<RemoteRunner> {
        self.runners().clone()
    }

    /// Resolves on the next membership change
    ///
    /// Create the future before inspecting the pool so no change is missed.
    pub fn changed(&self) -> Notified<'_> {
        self.changed.notified()
    }
}

/// All runner pools known to the queue
#[derive(Debug, Default)]
pub struct RunnerRegistry {
    pools: Mutex<HashMap<ScopeKey, Arc<RunnerPool>>>,
}

impl RunnerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn pools(&self) -> MutexGuard<'_, HashMap<ScopeKey, Arc<RunnerPool>>> {
        self.pools.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Adds runners to the pool of a scope, creating the pool if needed
    ///
    /// Returns `true` if the pool changed.
    pub fn register(&self, scope: ScopeKey, runners: &[RemoteRunner]) -> bool {
        let mut pools = self.pools();
        let pool = pools.entry(scope.clone()).or_default();
        let modified = pool.add(runners);
        if pool.is_empty() {
            pools.remove(&scope);
        }

        if modified {
            info!("Registered {} runner(s) for scope {}", runners.len(), scope);
        }
        modified
    }

    /// Removes runners from every pool, dropping pools left empty
    ///
    /// Returns `true` if any pool changed.
    pub fn unregister(&self, runners: &[RemoteRunner]) -> bool {
        let mut pools = self.pools();
        let mut modified = false;

        pools.retain(|scope, pool| {
            if pool.remove(runners) {
                modified = true;
                if pool.is_empty() {
                    debug!("Runner pool for scope {} is empty, removing it", scope);
                    return false;
                }
            }
            true
        });

        if modified {
            info!("Unregistered {} runner(s)", runners.len());
        }
        modified
    }

    /// Finds the pool serving a request
    ///
    /// A pool is used as soon as it exists, even while it is empty, since
    /// runners may join it while the request waits.
    pub fn resolve(&self, project: Option<&str>, workspace: Option<&str>) -> Result<Arc<RunnerPool>> {
        let pools = self.pools();
        ScopeKey::lookup_chain(project, workspace)
            .iter()
            .find_map(|scope| pools.get(scope).cloned())
            .ok_or(QueueError::NoRunnerAvailable)
    }

    pub fn pool(&self, scope: &ScopeKey) -> Option<Arc<RunnerPool>> {
        self.pools().get(scope).cloned()
    }

    pub fn scopes(&self) -> Vec<ScopeKey> {
        self.pools().keys().cloned().collect()
    }

    pub fn clear(&self) {
        self.pools().clear();
    }
}
