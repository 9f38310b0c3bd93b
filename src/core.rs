//! Core domain types and service traits for zkwatch
//!
//! This module defines the path-state data structures and the trait contracts
//! that sit between the dispatcher and its collaborators: the coordination
//! registry, the locks it hands out, and the alert backends.

use crate::notification::AlertError;
use crate::registry::RegistryError;
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::Arc;

/// Compliance state of a watched path, as classified by the monitor.
///
/// `OK` and `Unknown` never raise alerts; every other state does.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum PathState {
    #[default]
    Unknown,
    Ok,
    Error,
    /// Any other label produced by a compliance evaluator.
    Other(String),
}

impl PathState {
    pub fn as_str(&self) -> &str {
        match self {
            PathState::Unknown => "Unknown",
            PathState::Ok => "OK",
            PathState::Error => "Error",
            PathState::Other(label) => label,
        }
    }

    /// Returns `true` if an update carrying this state should lead to an alert.
    pub fn is_alert_worthy(&self) -> bool {
        !matches!(self, PathState::Ok | PathState::Unknown)
    }
}

impl From<&str> for PathState {
    fn from(label: &str) -> Self {
        match label {
            "Unknown" => PathState::Unknown,
            "OK" => PathState::Ok,
            "Error" => PathState::Error,
            other => PathState::Other(other.to_string()),
        }
    }
}

impl fmt::Display for PathState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for PathState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for PathState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(PathState::from(label.as_str()))
    }
}

/// The most recent state and message recorded for a path.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PathStatus {
    pub state: PathState,
    /// Free-text reason supplied with the update.
    pub message: String,
    /// RFC 3339 timestamp of the update that produced this status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// Per-backend parameters taken verbatim from a path's `alerter` section.
///
/// For `email` this is the recipient address, for `slack` a webhook URL.
pub type AlerterParams = serde_json::Value;

// =============================================================================
// Service Traits
// =============================================================================

/// A distributed mutual-exclusion primitive handed out by a [`Registry`].
pub trait Lock: Send + Sync {
    /// Requests exclusivity without blocking.
    ///
    /// Contention is not an error: the caller simply stays in line and
    /// `status()` reports `false` until the lock is granted.
    fn acquire(&self);

    /// Whether this owner holds the lock right now. Never cached.
    fn status(&self) -> bool;

    /// Gives up the lock, or leaves the queue if it was never granted.
    fn release(&self);
}

/// The coordination-service surface zkwatch depends on.
///
/// Locks are always requested non-blocking, so unlike a raw client there is
/// no wait argument.
pub trait Registry: Send + Sync {
    /// Returns a lock on `path` identified by `owner`. Does not acquire it.
    fn get_lock(&self, path: &str, owner: &str) -> Arc<dyn Lock>;

    /// Creates (or refreshes) a node at `path`.
    fn set_node(&self, path: &str) -> Result<(), RegistryError>;

    /// Whether the client currently has a live session.
    fn connected(&self) -> bool;
}

/// A notification channel that alerts can be fanned out to.
#[async_trait]
pub trait Alerter: Send + Sync {
    /// The name this backend is registered under in path configurations.
    fn name(&self) -> &str;

    /// Sends an alert for `path`.
    ///
    /// # Arguments
    /// * `state` - The path's current state
    /// * `message` - Why the path is in that state
    /// * `params` - This backend's entry from the path's `alerter` section
    ///
    /// # Returns
    /// * `Ok(())` if the alert was delivered or deliberately not sent
    /// * `Err` if delivery was attempted and failed
    async fn alert(
        &self,
        path: &str,
        state: &PathState,
        message: &str,
        params: &AlerterParams,
    ) -> Result<(), AlertError>;

    /// A backend-specific status snapshot for the status page.
    fn status(&self) -> serde_json::Value;
}
