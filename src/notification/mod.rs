//! Handles the dispatching of alerts to various notification channels.
//!
//! The [`Dispatcher`] decides *when* a path alerts: it debounces, cancels and
//! re-arms per-path alerts. Backends implementing [`Alerter`](crate::core::Alerter)
//! decide *how*, and are looked up by the name used in a path's `alerter`
//! section.
pub mod dispatcher;
pub mod email;
pub mod slack;

use thiserror::Error;

pub use dispatcher::{DetailedStatus, DispatchError, Dispatcher, DispatcherBuilder, DispatcherStatus};
pub use email::{EmailAlerter, EmailMessage, LogTransport, MailTransport};
pub use slack::SlackAlerter;

/// A failed delivery by one backend.
#[derive(Error, Debug)]
pub enum AlertError {
    #[error("{alerter} transport failed: {source}")]
    Transport {
        alerter: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("{alerter} rejected the alert: {reason}")]
    Rejected { alerter: String, reason: String },
}

impl AlertError {
    /// The name of the backend that failed.
    pub fn alerter(&self) -> &str {
        match self {
            AlertError::Transport { alerter, .. } | AlertError::Rejected { alerter, .. } => alerter,
        }
    }
}
