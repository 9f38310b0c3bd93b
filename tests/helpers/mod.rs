#![allow(dead_code)]
pub mod counting_recorder;
pub mod recording_alerter;
pub mod recording_transport;
pub mod scripted_registry;

use serde_json::json;
use std::sync::Arc;
use zkwatch::cluster::ClusterState;
use zkwatch::config::{PathConfigs, WatchedPathConfig};
use zkwatch::core::Registry;

pub const WORKSPACE: &str = "/zk_monitor/test";

/// Creates a cluster state for `agent` in the test workspace.
pub fn cluster(registry: Arc<dyn Registry>, agent: &str) -> Arc<ClusterState> {
    Arc::new(ClusterState::with_agent_name(registry, WORKSPACE, agent))
}

/// The `/bar` path used throughout the dispatcher tests: three backends, one
/// of which (`fake`) has no implementation.
pub fn bar_paths(cancel_timeout: Option<f64>) -> PathConfigs {
    let mut config = WatchedPathConfig {
        children: Some(1),
        cancel_timeout,
        ..Default::default()
    };
    config.alerter.insert("email".to_string(), json!("unit@test.com"));
    config.alerter.insert("fake".to_string(), json!("unit test"));
    config.alerter.insert("custom".to_string(), json!("something custom"));

    let mut paths = PathConfigs::new();
    paths.insert("/bar".to_string(), config);
    paths
}
