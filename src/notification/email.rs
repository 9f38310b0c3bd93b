//! Email alert backend.
//!
//! Each path names its recipient in its `alerter` section:
//!
//! ```yaml
//! /services/foo/min_1:
//!   alerter:
//!     email: you@home.com
//!   children: 1
//! ```
//!
//! The alerter holds its own cluster lock, so even when several dispatchers
//! believe they are active, only one process actually sends mail.

use crate::cluster::{ClusterState, LeaderLock};
use crate::core::{Alerter, AlerterParams, PathState};
use crate::formatting::{email_body, email_subject};
use crate::notification::AlertError;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// A single outgoing email.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmailMessage {
    pub subject: String,
    pub body: String,
    pub from_email: String,
    pub to: Vec<String>,
}

/// Delivers composed emails.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> anyhow::Result<()>;
}

/// A transport that writes each message to the log instead of a mail server.
pub struct LogTransport;

#[async_trait]
impl MailTransport for LogTransport {
    async fn send(&self, message: &EmailMessage) -> anyhow::Result<()> {
        info!(
            to = ?message.to,
            from = %message.from_email,
            subject = %message.subject,
            body = %message.body,
            "Email alert"
        );
        Ok(())
    }
}

/// Converts alerts into email messages.
pub struct EmailAlerter {
    lock: LeaderLock,
    transport: Arc<dyn MailTransport>,
    from_email: String,
}

impl EmailAlerter {
    pub const NAME: &'static str = "email";

    /// Creates the alerter and requests its cluster lock.
    pub fn new(
        cluster: &ClusterState,
        transport: Arc<dyn MailTransport>,
        from_email: impl Into<String>,
    ) -> Self {
        debug!("Initializing email alerter");
        Self {
            lock: LeaderLock::acquire(cluster, Self::NAME),
            transport,
            from_email: from_email.into(),
        }
    }

    pub fn build_message(&self, path: &str, state: &PathState, message: &str, to: &str) -> EmailMessage {
        EmailMessage {
            subject: email_subject(path),
            body: email_body(path, state, message),
            from_email: self.from_email.clone(),
            to: vec![to.to_string()],
        }
    }
}

#[async_trait]
impl Alerter for EmailAlerter {
    fn name(&self) -> &str {
        Self::NAME
    }

    /// Sends an email to the address in `params`.
    ///
    /// A missing or empty address is logged and skipped, not reported as a
    /// failure. Nothing is sent while another agent holds the email lock.
    #[instrument(skip(self, message, params), fields(alerter = "email"))]
    async fn alert(
        &self,
        path: &str,
        state: &PathState,
        message: &str,
        params: &AlerterParams,
    ) -> Result<(), AlertError> {
        let Some(to) = params.as_str().filter(|address| !address.is_empty()) else {
            error!(params = %params, "Invalid email address from params");
            return Ok(());
        };

        if !self.lock.status() {
            info!("Email lock is held by another agent, not sending");
            return Ok(());
        }

        warn!("Firing email alert: {}", message);
        let email = self.build_message(path, state, message, to);
        match self.transport.send(&email).await {
            Ok(()) => {
                info!(subject = %email.subject, "Message sent successfully");
                Ok(())
            }
            Err(source) => {
                error!(subject = %email.subject, error = %source, "Message send failed");
                Err(AlertError::Transport {
                    alerter: Self::NAME.to_string(),
                    source,
                })
            }
        }
    }

    fn status(&self) -> serde_json::Value {
        json!({ "alerting": self.lock.status() })
    }
}
