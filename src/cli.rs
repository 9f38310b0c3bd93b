//! Command-Line Interface (CLI) argument parsing.
//!
//! This module defines the command-line arguments for the application using the
//! `clap` crate. These arguments are parsed at startup and then merged with
//! the configuration from the `zkwatch.toml` file and environment variables.

use clap::Parser;
use figment::{
    value::{Dict, Map, Value},
    Error, Metadata, Profile, Provider,
};
use std::path::PathBuf;

/// Watches coordination-service paths and alerts when they fall out of compliance.
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Path to the YAML file with the paths to monitor.
    #[arg(short = 'f', long, value_name = "FILE")]
    pub paths_file: Option<PathBuf>,

    /// Log level (e.g. info, warn, debug).
    #[arg(short, long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Address for the status server to listen on.
    #[arg(long, value_name = "ADDR")]
    pub listen_address: Option<String>,

    /// Unique cluster name (e.g. prod-zookeeper-monitor).
    #[arg(long, value_name = "NAME")]
    pub cluster_name: Option<String>,
}

impl Provider for Cli {
    fn metadata(&self) -> Metadata {
        Metadata::named("Command-Line Arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let mut dict = Dict::new();

        if let Some(path) = &self.paths_file {
            dict.insert(
                "paths_file".into(),
                Value::from(path.display().to_string()),
            );
        }

        if let Some(level) = &self.log_level {
            dict.insert("log_level".into(), Value::from(level.clone()));
        }

        if let Some(address) = &self.listen_address {
            dict.insert(
                "status".into(),
                nested("listen_address", Value::from(address.clone())),
            );
        }

        if let Some(name) = &self.cluster_name {
            dict.insert(
                "registry".into(),
                nested("cluster_name", Value::from(name.clone())),
            );
        }

        let mut map = Map::new();
        map.insert(Profile::Default, dict);
        Ok(map)
    }
}

fn nested(key: &str, value: Value) -> Value {
    let mut dict = Dict::new();
    dict.insert(key.into(), value);
    Value::from(dict)
}
