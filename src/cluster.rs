//! Agent-to-agent cluster coordination.
//!
//! Every zkwatch process registers itself under `{workspace}/agents` and
//! requests named locks under `{workspace}/locks`. Those locks keep a
//! redundant set of monitors down to a single active alerter.

use crate::core::{Lock, Registry};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The cluster-wide namespace and identity of this zkwatch process.
pub struct ClusterState {
    registry: Arc<dyn Registry>,
    workspace: String,
    name: String,
}

impl ClusterState {
    /// Creates the cluster state for `workspace`, named `{hostname}-{pid}`.
    pub fn new(registry: Arc<dyn Registry>, workspace: impl Into<String>) -> Self {
        Self::with_agent_name(registry, workspace, default_agent_name())
    }

    /// Creates the cluster state with an explicit agent name.
    pub fn with_agent_name(
        registry: Arc<dyn Registry>,
        workspace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        let state = Self {
            registry,
            workspace: workspace.into(),
            name: name.into(),
        };
        info!(
            workspace = %state.workspace,
            agent = %state.name,
            "Initializing cluster state"
        );
        state.register_agent();
        state
    }

    // A failed registration leaves the process running without cluster
    // visibility; locks still work.
    fn register_agent(&self) {
        let node = format!("{}/agents/{}", self.workspace, self.name);
        if let Err(e) = self.registry.set_node(&node) {
            warn!(node = %node, error = %e, "Could not register agent, running degraded");
        }
    }

    pub fn agent_name(&self) -> &str {
        &self.name
    }

    pub fn workspace(&self) -> &str {
        &self.workspace
    }

    pub fn registry(&self) -> &Arc<dyn Registry> {
        &self.registry
    }

    /// The registry path of the lock called `name`.
    pub fn lock_path(&self, name: &str) -> String {
        format!("{}/locks/{}", self.workspace, name)
    }

    /// Returns this agent's handle on the lock called `name`.
    pub fn get_lock(&self, name: &str) -> Arc<dyn Lock> {
        self.registry.get_lock(&self.lock_path(name), &self.name)
    }
}

fn default_agent_name() -> String {
    let host = sysinfo::System::host_name().unwrap_or_else(|| "localhost".to_string());
    format!("{}-{}", host, std::process::id())
}

/// A named cluster lock that is requested once and then only queried.
///
/// The lock is released when this value is dropped.
pub struct LeaderLock {
    name: String,
    lock: Arc<dyn Lock>,
}

impl LeaderLock {
    /// Requests the lock called `name` without blocking.
    ///
    /// If another agent holds it, this agent waits in line and `status()`
    /// turns `true` once the registry grants it.
    pub fn acquire(cluster: &ClusterState, name: &str) -> Self {
        debug!(lock = %cluster.lock_path(name), "Attempting to acquire lock");
        let lock = cluster.get_lock(name);
        lock.acquire();
        Self {
            name: name.to_string(),
            lock,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this agent holds the lock, queried live.
    pub fn status(&self) -> bool {
        self.lock.status()
    }
}

impl Drop for LeaderLock {
    fn drop(&mut self) {
        debug!(lock = %self.name, "Releasing lock");
        self.lock.release();
    }
}
