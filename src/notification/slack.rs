//! An alerter that posts to Slack incoming webhooks.
//!
//! The webhook URL is the path's `alerter.slack` parameter.

use crate::cluster::{ClusterState, LeaderLock};
use crate::core::{Alerter, AlerterParams, PathState};
use crate::formatting::TextFormatter;
use crate::notification::AlertError;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{error, info, instrument};

/// Sends alerts to a Slack webhook.
pub struct SlackAlerter {
    lock: LeaderLock,
    client: reqwest::Client,
    formatter: Box<dyn TextFormatter>,
    timeout: Duration,
}

impl SlackAlerter {
    pub const NAME: &'static str = "slack";

    /// Creates the alerter and requests its cluster lock.
    pub fn new(cluster: &ClusterState, formatter: Box<dyn TextFormatter>, timeout: Duration) -> Self {
        Self {
            lock: LeaderLock::acquire(cluster, Self::NAME),
            client: reqwest::Client::new(),
            formatter,
            timeout,
        }
    }

    async fn send_request(&self, webhook_url: &str, payload: &Value) -> anyhow::Result<()> {
        let res = self
            .client
            .post(webhook_url)
            .timeout(self.timeout)
            .json(payload)
            .send()
            .await?;

        if res.status().is_success() {
            return Ok(());
        }

        let status = res.status();
        let text = res.text().await.unwrap_or_default();
        error!(
            status = %status,
            body = %text,
            "Failed to send Slack notification"
        );
        anyhow::bail!(
            "Failed to send Slack notification: status {}, body: {}",
            status,
            text
        );
    }
}

#[async_trait]
impl Alerter for SlackAlerter {
    fn name(&self) -> &str {
        Self::NAME
    }

    #[instrument(skip(self, message, params), fields(alerter = "slack"))]
    async fn alert(
        &self,
        path: &str,
        state: &PathState,
        message: &str,
        params: &AlerterParams,
    ) -> Result<(), AlertError> {
        let Some(webhook_url) = params.as_str().filter(|url| !url.is_empty()) else {
            return Err(AlertError::Rejected {
                alerter: Self::NAME.to_string(),
                reason: format!("no webhook URL in params: {}", params),
            });
        };

        if !self.lock.status() {
            info!("Slack lock is held by another agent, not sending");
            return Ok(());
        }

        let payload = json!({ "text": self.formatter.format_alert(path, state, message) });
        match self.send_request(webhook_url, &payload).await {
            Ok(()) => {
                info!("Successfully sent alert to Slack.");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "HTTP request to Slack failed");
                Err(AlertError::Transport {
                    alerter: Self::NAME.to_string(),
                    source: e,
                })
            }
        }
    }

    fn status(&self) -> Value {
        json!({ "alerting": self.lock.status() })
    }
}
