//! A mail transport that keeps sent messages in memory.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use zkwatch::notification::{EmailMessage, MailTransport};

#[derive(Clone, Debug, Default)]
pub struct RecordingTransport {
    pub sent: Arc<Mutex<Vec<EmailMessage>>>,
    pub fail: bool,
}

impl RecordingTransport {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailTransport for RecordingTransport {
    async fn send(&self, message: &EmailMessage) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("connection refused");
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}
