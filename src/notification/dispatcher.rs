//! The alert dispatcher.
//!
//! [`Dispatcher::update`] records the latest status of a path and decides
//! whether an alert goes out now, later, or not at all:
//!
//! - `OK` cancels any pending alert for the path.
//! - An alert-worthy state on a path without a `cancel_timeout` fans out to
//!   the path's backends right away.
//! - With a `cancel_timeout`, a pending alert is (re)scheduled. When it
//!   expires it fans out using the path's *latest* status and re-arms for the
//!   same period, until an `OK` update cancels it.
//!
//! Every dispatcher queues for the cluster's `alerter` lock when it is built;
//! [`Dispatcher::status`] reports whether this one is at the head.

use crate::cluster::{ClusterState, LeaderLock};
use crate::config::{validate_paths, ConfigError, PathConfigs, WatchedPathConfig};
use crate::core::{Alerter, PathState, PathStatus};
use crate::formatting::SlackTextFormatter;
use crate::notification::{AlertError, EmailAlerter, LogTransport, MailTransport, SlackAlerter};
use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

/// Name of the cluster lock that elects the active dispatcher.
pub const ALERTER_LOCK: &str = "alerter";

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("path {0} is not configured for monitoring")]
    UnknownPath(String),

    /// One or more backends failed. The others still ran.
    #[error("{} alerter(s) failed for {path}", .failures.len())]
    Delivery {
        path: String,
        failures: Vec<AlertError>,
    },
}

/// Summary consumed by the status page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatcherStatus {
    /// Whether this dispatcher holds the cluster's alerter lock.
    pub alerting: bool,
    /// Names of the registered backends.
    pub alerters: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailedStatus {
    #[serde(flatten)]
    pub summary: DispatcherStatus,
    /// Each backend's own status, keyed by name.
    pub details: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Default)]
struct PathRecord {
    status: PathStatus,
    /// An alert went out since the path was last `OK`.
    fired: bool,
}

/// A scheduled, recurring alert for one path.
struct PendingAlert {
    cancel_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl PendingAlert {
    fn cancel(&self) {
        // The task may already be gone; nothing to do then.
        let _ = self.cancel_tx.send(true);
    }
}

struct Shared {
    paths: PathConfigs,
    lock: LeaderLock,
    alerters: BTreeMap<String, Arc<dyn Alerter>>,
    records: Mutex<HashMap<String, PathRecord>>,
    pending: Mutex<HashMap<String, PendingAlert>>,
}

/// Schedules, cancels and fans out alerts for the watched paths.
///
/// Cloning is cheap; clones share all state.
#[derive(Clone)]
pub struct Dispatcher {
    shared: Arc<Shared>,
}

impl Dispatcher {
    /// Builds a dispatcher with the built-in backends.
    pub fn new(cluster: Arc<ClusterState>, paths: PathConfigs) -> Result<Self, ConfigError> {
        DispatcherBuilder::new(cluster, paths).build()
    }

    pub fn builder(cluster: Arc<ClusterState>, paths: PathConfigs) -> DispatcherBuilder {
        DispatcherBuilder::new(cluster, paths)
    }

    /// Records a new state for `path` and alerts, schedules or cancels.
    ///
    /// Returns once the decision is made. For paths without a
    /// `cancel_timeout` that includes the fan-out itself; delayed alerts run
    /// on their own task.
    #[instrument(skip_all, fields(path = %path, state = %state))]
    pub async fn update(&self, path: &str, state: PathState, reason: &str) -> Result<(), DispatchError> {
        let config = self.config(path)?;
        let was_fired = self.record(path, state.clone(), reason);

        if state == PathState::Ok {
            if self.cancel_pending(path) {
                info!("Cancelling an existing alert");
            }
            if was_fired && config.notify_recovery {
                info!("Sending a recovery notification");
                return self.send_alerts(path).await;
            }
            return Ok(());
        }

        if !state.is_alert_worthy() {
            debug!("State is not alert-worthy, nothing to schedule");
            return Ok(());
        }

        match config.cancel_timeout() {
            None => {
                info!("Dispatching alert immediately");
                self.send_alerts(path).await
            }
            Some(period) => {
                self.schedule(path, period);
                Ok(())
            }
        }
    }

    /// Fans the path's current status out to every backend named in its
    /// `alerter` section.
    ///
    /// Names without a registered backend are skipped. Backends run
    /// concurrently and independently; all failures are collected into a
    /// single [`DispatchError::Delivery`].
    #[instrument(skip_all, fields(path = %path))]
    pub async fn send_alerts(&self, path: &str) -> Result<(), DispatchError> {
        let config = self.config(path)?;
        let status = self.path_status(path).unwrap_or_default();

        let mut deliveries = Vec::with_capacity(config.alerter.len());
        for (name, params) in &config.alerter {
            let Some(alerter) = self.shared.alerters.get(name) else {
                warn!(alerter = %name, "Alerter specified but not available to dispatcher");
                continue;
            };
            debug!(alerter = %name, "Invoking alerter");
            deliveries.push(alerter.alert(path, &status.state, &status.message, params));
        }

        // Marked before awaiting, so an `OK` arriving mid-delivery sees the
        // alert as sent.
        if status.state.is_alert_worthy() {
            if let Some(record) = self.records().get_mut(path) {
                record.fired = true;
            }
        }

        let attempted = deliveries.len();
        let failures: Vec<AlertError> = join_all(deliveries)
            .await
            .into_iter()
            .filter_map(Result::err)
            .collect();

        let delivered = attempted - failures.len();
        if delivered > 0 {
            metrics::counter!("alerts_dispatched_total", "path" => path.to_string())
                .increment(delivered as u64);
        }

        if failures.is_empty() {
            return Ok(());
        }
        for failure in &failures {
            metrics::counter!("alert_delivery_failures_total", "alerter" => failure.alerter().to_string())
                .increment(1);
            error!(alerter = %failure.alerter(), error = %failure, "Alerter failed");
        }
        Err(DispatchError::Delivery {
            path: path.to_string(),
            failures,
        })
    }

    /// Whether this dispatcher is the cluster's active alerter, and which
    /// backends it has.
    pub fn status(&self) -> DispatcherStatus {
        DispatcherStatus {
            alerting: self.shared.lock.status(),
            alerters: self.shared.alerters.keys().cloned().collect(),
        }
    }

    /// [`status`](Self::status) plus each backend's own status.
    pub fn detailed_status(&self) -> DetailedStatus {
        DetailedStatus {
            summary: self.status(),
            details: self
                .shared
                .alerters
                .iter()
                .map(|(name, alerter)| (name.clone(), alerter.status()))
                .collect(),
        }
    }

    /// The last recorded status of `path`, if it is configured.
    pub fn path_status(&self, path: &str) -> Option<PathStatus> {
        self.records().get(path).map(|record| record.status.clone())
    }

    /// The last recorded status of every configured path.
    pub fn paths(&self) -> BTreeMap<String, PathStatus> {
        self.records()
            .iter()
            .map(|(path, record)| (path.clone(), record.status.clone()))
            .collect()
    }

    pub fn is_pending(&self, path: &str) -> bool {
        self.pending().contains_key(path)
    }

    pub fn pending_count(&self) -> usize {
        self.pending().len()
    }

    /// Cancels every pending alert and waits for their tasks to finish.
    pub async fn shutdown(&self) {
        let drained: Vec<PendingAlert> = self.pending().drain().map(|(_, alert)| alert).collect();
        info!(count = drained.len(), "Cancelling pending alerts");
        for alert in &drained {
            alert.cancel();
        }
        for alert in drained {
            if let Err(e) = alert.handle.await {
                error!(error = %e, "Pending alert task panicked");
            }
        }
        metrics::gauge!("pending_alerts").set(0.0);
    }

    fn config(&self, path: &str) -> Result<&WatchedPathConfig, DispatchError> {
        self.shared
            .paths
            .get(path)
            .ok_or_else(|| DispatchError::UnknownPath(path.to_string()))
    }

    /// Overwrites the path's status. Returns whether it had alerted since it
    /// was last `OK`, and clears that flag when the new state is `OK`.
    fn record(&self, path: &str, state: PathState, message: &str) -> bool {
        let mut records = self.records();
        let record = records.entry(path.to_string()).or_default();
        let was_fired = record.fired;
        if state == PathState::Ok {
            record.fired = false;
        }
        record.status = PathStatus {
            state,
            message: message.to_string(),
            updated_at: Some(Utc::now().to_rfc3339()),
        };
        was_fired
    }

    fn schedule(&self, path: &str, period: Duration) {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let handle = tokio::spawn(run_pending(
            Arc::downgrade(&self.shared),
            path.to_string(),
            period,
            cancel_rx,
        ));

        let mut pending = self.pending();
        if let Some(previous) = pending.insert(path.to_string(), PendingAlert { cancel_tx, handle }) {
            debug!("Replacing existing pending alert");
            previous.cancel();
        }
        metrics::gauge!("pending_alerts").set(pending.len() as f64);
        info!(period_ms = period.as_millis() as u64, "Scheduled pending alert");
    }

    fn cancel_pending(&self, path: &str) -> bool {
        let mut pending = self.pending();
        let Some(alert) = pending.remove(path) else {
            return false;
        };
        alert.cancel();
        metrics::gauge!("pending_alerts").set(pending.len() as f64);
        true
    }

    fn records(&self) -> MutexGuard<'_, HashMap<String, PathRecord>> {
        self.shared.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn pending(&self) -> MutexGuard<'_, HashMap<String, PendingAlert>> {
        self.shared.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Body of a pending alert: wait one period, fan out, repeat until cancelled.
///
/// Holds only a weak reference so that dropping the last `Dispatcher` also
/// ends its pending alerts.
async fn run_pending(
    shared: Weak<Shared>,
    path: String,
    period: Duration,
    mut cancel_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;
            // Fires on cancel and when the slot is dropped.
            _ = cancel_rx.changed() => {
                debug!(path = %path, "Pending alert cancelled");
                break;
            }
            _ = tokio::time::sleep(period) => {}
        }

        let Some(shared) = shared.upgrade() else {
            break;
        };
        let dispatcher = Dispatcher { shared };
        info!(path = %path, "Pending alert expired, dispatching");
        if let Err(e) = dispatcher.send_alerts(&path).await {
            error!(path = %path, error = %e, "Alert delivery failed, will retry next period");
        }
    }
}

/// Builder for a [`Dispatcher`].
///
/// Backends are created for every distinct name used across the path
/// configurations. Alerters registered with [`alerter`](Self::alerter) take
/// precedence over the built-in backend of the same name.
pub struct DispatcherBuilder {
    cluster: Arc<ClusterState>,
    paths: PathConfigs,
    overrides: BTreeMap<String, Arc<dyn Alerter>>,
    mail_transport: Arc<dyn MailTransport>,
    from_email: String,
    slack_timeout: Duration,
}

impl DispatcherBuilder {
    pub fn new(cluster: Arc<ClusterState>, paths: PathConfigs) -> Self {
        Self {
            cluster,
            paths,
            overrides: BTreeMap::new(),
            mail_transport: Arc::new(LogTransport),
            from_email: "zkwatch".to_string(),
            slack_timeout: Duration::from_secs(10),
        }
    }

    /// Registers `alerter` under its own name.
    pub fn alerter(mut self, alerter: Arc<dyn Alerter>) -> Self {
        self.overrides.insert(alerter.name().to_string(), alerter);
        self
    }

    /// Sets the transport used by the email backend.
    pub fn mail_transport(mut self, transport: Arc<dyn MailTransport>) -> Self {
        self.mail_transport = transport;
        self
    }

    pub fn from_email(mut self, from_email: impl Into<String>) -> Self {
        self.from_email = from_email.into();
        self
    }

    pub fn slack_timeout(mut self, timeout: Duration) -> Self {
        self.slack_timeout = timeout;
        self
    }

    /// Validates the path configurations, joins the alerter lock queue and
    /// creates the backends.
    pub fn build(self) -> Result<Dispatcher, ConfigError> {
        validate_paths(&self.paths)?;
        info!(paths = self.paths.len(), "Initiating dispatcher");

        let lock = LeaderLock::acquire(&self.cluster, ALERTER_LOCK);
        let mut alerters = self.create_alerters();
        alerters.extend(self.overrides);

        let records = self
            .paths
            .keys()
            .map(|path| (path.clone(), PathRecord::default()))
            .collect();

        Ok(Dispatcher {
            shared: Arc::new(Shared {
                paths: self.paths,
                lock,
                alerters,
                records: Mutex::new(records),
                pending: Mutex::new(HashMap::new()),
            }),
        })
    }

    fn create_alerters(&self) -> BTreeMap<String, Arc<dyn Alerter>> {
        let names: BTreeSet<&String> = self
            .paths
            .values()
            .flat_map(|config| config.alerter.keys())
            .collect();

        let mut alerters: BTreeMap<String, Arc<dyn Alerter>> = BTreeMap::new();
        for name in names {
            if self.overrides.contains_key(name) {
                continue;
            }
            let alerter: Arc<dyn Alerter> = match name.as_str() {
                EmailAlerter::NAME => Arc::new(EmailAlerter::new(
                    &self.cluster,
                    Arc::clone(&self.mail_transport),
                    self.from_email.clone(),
                )),
                SlackAlerter::NAME => Arc::new(SlackAlerter::new(
                    &self.cluster,
                    Box::new(SlackTextFormatter),
                    self.slack_timeout,
                )),
                other => {
                    warn!(alerter = %other, "No implementation for alerter, its entries will be skipped");
                    continue;
                }
            };
            alerters.insert(name.clone(), alerter);
        }
        alerters
    }
}
