//! # Status Server
//!
//! An `axum` server exposing `GET /status`, a JSON document that folds
//! together the registry connection state, the dispatcher's alerting status
//! (with each backend's own status) and the last recorded state of every
//! watched path.
//!
//! The server stops when the shutdown watch channel changes.

use crate::core::{PathStatus, Registry};
use crate::notification::{DetailedStatus, Dispatcher};
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, trace};

#[derive(Debug, Clone, Serialize)]
pub struct StatusDocument {
    pub version: &'static str,
    pub zookeeper: ConnectionStatus,
    pub dispatcher: DetailedStatus,
    pub paths: BTreeMap<String, PathStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectionStatus {
    pub connected: bool,
}

/// Builds the status document from live state.
pub fn status_document(registry: &dyn Registry, dispatcher: &Dispatcher) -> StatusDocument {
    StatusDocument {
        version: env!("CARGO_PKG_VERSION"),
        zookeeper: ConnectionStatus {
            connected: registry.connected(),
        },
        dispatcher: dispatcher.detailed_status(),
        paths: dispatcher.paths(),
    }
}

#[derive(Clone)]
struct AppState {
    registry: Arc<dyn Registry>,
    dispatcher: Dispatcher,
}

async fn status_handler(State(state): State<AppState>) -> Json<StatusDocument> {
    Json(status_document(state.registry.as_ref(), &state.dispatcher))
}

/// Serves the status endpoint until shutdown.
pub struct StatusServer {
    listener: TcpListener,
    state: AppState,
    shutdown_rx: watch::Receiver<bool>,
}

impl StatusServer {
    /// Creates a new `StatusServer` but does not spawn it.
    ///
    /// # Arguments
    ///
    /// * `listener` - A `TcpListener` that has already been bound to an address.
    /// * `registry` - Source of the connection state.
    /// * `dispatcher` - Source of alerting and path state.
    /// * `shutdown_rx` - A watch channel receiver for graceful shutdown.
    pub fn new(
        listener: TcpListener,
        registry: Arc<dyn Registry>,
        dispatcher: Dispatcher,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            listener,
            state: AppState {
                registry,
                dispatcher,
            },
            shutdown_rx,
        }
    }

    /// Returns a future that runs the server until a shutdown signal is received.
    pub fn run(self) -> impl Future<Output = ()> {
        let Self {
            listener,
            state,
            mut shutdown_rx,
        } = self;
        let app = Router::new()
            .route("/status", get(status_handler))
            .with_state(state);

        async move {
            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => {
                    trace!("Status server received shutdown signal.");
                }
                result = axum::serve(listener, app) => {
                    if let Err(e) = result {
                        error!("Status server error: {}", e);
                    }
                }
            }
            trace!("Status server task finished.");
        }
    }
}
