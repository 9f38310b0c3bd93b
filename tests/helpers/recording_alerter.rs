//! An alerter that records every call it receives.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use zkwatch::core::{Alerter, AlerterParams, PathState};
use zkwatch::notification::AlertError;

#[derive(Debug, Clone, PartialEq)]
pub struct AlertCall {
    pub path: String,
    pub state: PathState,
    pub message: String,
    pub params: Value,
}

#[derive(Clone, Debug)]
pub struct RecordingAlerter {
    name: String,
    fail: bool,
    delay: Option<Duration>,
    calls: Arc<Mutex<Vec<AlertCall>>>,
}

impl RecordingAlerter {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            fail: false,
            delay: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        })
    }

    /// An alerter that records the call and then reports a failure.
    pub fn failing(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            fail: true,
            delay: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        })
    }

    /// An alerter that records the call, then takes `delay` to deliver.
    pub fn slow(name: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            fail: false,
            delay: Some(delay),
            calls: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn calls(&self) -> Vec<AlertCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Alerter for RecordingAlerter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn alert(
        &self,
        path: &str,
        state: &PathState,
        message: &str,
        params: &AlerterParams,
    ) -> Result<(), AlertError> {
        self.calls.lock().unwrap().push(AlertCall {
            path: path.to_string(),
            state: state.clone(),
            message: message.to_string(),
            params: params.clone(),
        });
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(AlertError::Rejected {
                alerter: self.name.clone(),
                reason: "configured to fail".to_string(),
            });
        }
        Ok(())
    }

    fn status(&self) -> Value {
        json!("test")
    }
}
