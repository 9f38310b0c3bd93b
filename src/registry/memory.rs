//! An in-process coordination registry.
//!
//! Locks follow the ZooKeeper lock recipe: every acquirer joins a FIFO queue
//! on the lock path and the head of the queue holds the lock. Releasing pops
//! the holder, which promotes the next waiter without it asking again.

use super::{Lock, Registry, RegistryError};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

#[derive(Debug)]
struct RegistryState {
    locks: HashMap<String, VecDeque<String>>,
    nodes: BTreeSet<String>,
    connected: bool,
    read_only: bool,
}

/// A registry whose locks and nodes live in memory, shared by every clone.
#[derive(Clone, Debug)]
pub struct MemoryRegistry {
    state: Arc<Mutex<RegistryState>>,
}

impl Default for MemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRegistry {
    /// Creates a connected, writable registry.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(RegistryState {
                locks: HashMap::new(),
                nodes: BTreeSet::new(),
                connected: true,
                read_only: false,
            })),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.state().connected = connected;
    }

    /// Makes every subsequent `set_node` fail with [`RegistryError::ReadOnly`].
    pub fn set_read_only(&self, read_only: bool) {
        self.state().read_only = read_only;
    }

    /// Lists the nodes whose path starts with `prefix`.
    pub fn nodes(&self, prefix: &str) -> Vec<String> {
        self.state()
            .nodes
            .iter()
            .filter(|node| node.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// The owner currently holding the lock at `path`, if any.
    pub fn holder(&self, path: &str) -> Option<String> {
        self.state()
            .locks
            .get(path)
            .and_then(|queue| queue.front().cloned())
    }

    fn state(&self) -> MutexGuard<'_, RegistryState> {
        lock_state(&self.state)
    }
}

fn lock_state(state: &Mutex<RegistryState>) -> MutexGuard<'_, RegistryState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Registry for MemoryRegistry {
    fn get_lock(&self, path: &str, owner: &str) -> Arc<dyn Lock> {
        Arc::new(MemoryLock {
            path: path.to_string(),
            owner: owner.to_string(),
            state: Arc::clone(&self.state),
        })
    }

    fn set_node(&self, path: &str) -> Result<(), RegistryError> {
        let mut state = self.state();
        if !state.connected {
            return Err(RegistryError::Disconnected);
        }
        if state.read_only {
            return Err(RegistryError::ReadOnly(path.to_string()));
        }
        state.nodes.insert(path.to_string());
        Ok(())
    }

    fn connected(&self) -> bool {
        self.state().connected
    }
}

/// One owner's handle on a lock path.
struct MemoryLock {
    path: String,
    owner: String,
    state: Arc<Mutex<RegistryState>>,
}

impl Lock for MemoryLock {
    fn acquire(&self) {
        let mut state = lock_state(&self.state);
        let queue = state.locks.entry(self.path.clone()).or_default();
        if !queue.contains(&self.owner) {
            queue.push_back(self.owner.clone());
        }
        debug!(
            lock = %self.path,
            owner = %self.owner,
            position = queue.iter().position(|o| o == &self.owner),
            "Joined lock queue"
        );
    }

    fn status(&self) -> bool {
        lock_state(&self.state)
            .locks
            .get(&self.path)
            .and_then(|queue| queue.front())
            .is_some_and(|holder| holder == &self.owner)
    }

    fn release(&self) {
        let mut state = lock_state(&self.state);
        if let Some(queue) = state.locks.get_mut(&self.path) {
            queue.retain(|owner| owner != &self.owner);
            if queue.is_empty() {
                state.locks.remove(&self.path);
            }
        }
    }
}
