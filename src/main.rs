//! zkwatch - coordination-service path monitor
//!
//! Loads configuration, joins the monitor cluster, builds the alert
//! dispatcher and serves the status page until interrupted.

use anyhow::Result;
use clap::Parser;
use std::{sync::Arc, time::Duration};
use tokio::{net::TcpListener, sync::watch};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use zkwatch::{
    cli::Cli,
    cluster::ClusterState,
    config::{load_paths, Config, PathConfigs},
    core::Registry,
    notification::{Dispatcher, LogTransport},
    registry::MemoryRegistry,
    status::StatusServer,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration by layering sources: defaults, file, environment, and CLI args.
    let config = Config::load(&cli).unwrap_or_else(|err| {
        eprintln!("Failed to load configuration: {}", err);
        std::process::exit(1);
    });

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("zkwatch starting up...");
    info!("-------------------- Configuration --------------------");
    info!("Log Level: {}", config.log_level);
    info!("Cluster Workspace: {}", config.registry.workspace());
    match &config.paths_file {
        Some(path) => info!("Paths File: {}", path.display()),
        None => info!("Paths File: Not configured"),
    }
    info!(
        "Status Server: {}",
        if config.status.enabled {
            config.status.listen_address.as_str()
        } else {
            "Disabled"
        }
    );
    info!("Email From: {}", config.email.from_address);
    info!("Slack Timeout: {}s", config.slack.timeout_seconds);
    info!("-------------------------------------------------------");

    // Malformed path configuration can't be recovered from at alert time.
    let paths = match &config.paths_file {
        Some(path) => load_paths(path)?,
        None => {
            warn!("No paths file configured, nothing will be watched.");
            PathConfigs::new()
        }
    };
    info!("Watching {} paths", paths.len());

    // Locks in this registry are only visible inside this process. Every
    // zkwatch started this way elects itself, so run a single instance.
    let registry = Arc::new(MemoryRegistry::new());
    let cluster = Arc::new(ClusterState::new(
        registry.clone(),
        config.registry.workspace(),
    ));

    let dispatcher = Dispatcher::builder(cluster, paths)
        .mail_transport(Arc::new(LogTransport))
        .from_email(config.email.from_address.clone())
        .slack_timeout(Duration::from_secs(config.slack.timeout_seconds))
        .build()?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let status_task = if config.status.enabled {
        let listener = TcpListener::bind(&config.status.listen_address).await?;
        info!("Status server listening on {}", listener.local_addr()?);
        let registry: Arc<dyn Registry> = registry.clone();
        let server = StatusServer::new(listener, registry, dispatcher.clone(), shutdown_rx);
        Some(tokio::spawn(server.run()))
    } else {
        None
    };

    info!("zkwatch initialized successfully.");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Shutting down gracefully...");

    if shutdown_tx.send(true).is_err() {
        warn!("No tasks were listening for the shutdown signal.");
    }
    dispatcher.shutdown().await;

    if let Some(handle) = status_task {
        if let Err(e) = handle.await {
            error!("Status server task panicked: {:?}", e);
        }
    }

    info!("All tasks shut down. Exiting.");
    Ok(())
}
