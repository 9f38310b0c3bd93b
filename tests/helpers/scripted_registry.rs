//! A registry whose locks answer `status()` from a script.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use zkwatch::core::{Lock, Registry};
use zkwatch::registry::RegistryError;

/// A lock that pops its next `status()` answer off a queue, then keeps
/// answering `fallback`.
pub struct ScriptedLock {
    responses: Mutex<VecDeque<bool>>,
    fallback: bool,
    pub acquire_calls: AtomicUsize,
}

impl ScriptedLock {
    fn new(responses: Vec<bool>, fallback: bool) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            fallback,
            acquire_calls: AtomicUsize::new(0),
        }
    }
}

impl Lock for ScriptedLock {
    fn acquire(&self) {
        self.acquire_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn status(&self) -> bool {
        self.responses.lock().unwrap().pop_front().unwrap_or(self.fallback)
    }

    fn release(&self) {}
}

/// Hands out the same scripted lock to every owner of a path.
pub struct ScriptedRegistry {
    locks: Mutex<HashMap<String, Arc<ScriptedLock>>>,
    connected: AtomicBool,
}

impl ScriptedRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            locks: Mutex::new(HashMap::new()),
            connected: AtomicBool::new(true),
        })
    }

    /// Scripts the answers of the lock at `path`.
    pub fn script_lock(&self, path: &str, responses: Vec<bool>) -> Arc<ScriptedLock> {
        let lock = Arc::new(ScriptedLock::new(responses, false));
        self.locks
            .lock()
            .unwrap()
            .insert(path.to_string(), lock.clone());
        lock
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }
}

impl Registry for ScriptedRegistry {
    fn get_lock(&self, path: &str, _owner: &str) -> Arc<dyn Lock> {
        let lock = self
            .locks
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_insert_with(|| Arc::new(ScriptedLock::new(Vec::new(), true)))
            .clone();
        lock
    }

    fn set_node(&self, _path: &str) -> Result<(), RegistryError> {
        Ok(())
    }

    fn connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
