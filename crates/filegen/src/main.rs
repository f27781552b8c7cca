//! filegen daemon
//!
//! Subscribes the configured machines to their file generator sources and
//! keeps fetched objects in a local object store.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use color_eyre::Result;
use filegen_core::{Manager, ManagerActorArgs};
use filegen_store::{DirectoryObjectStore, MemoryObjectStore, ObjectStore};
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::signal::unix::{SignalKind, signal};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod fleet;

use config::{Config, LogFormat};
use fleet::Fleet;

#[derive(Parser)]
#[command(name = "filegen")]
#[command(about = "Client daemon for distributed file generation", long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured log level
    #[arg(long)]
    log_level: Option<String>,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let (config, config_path) = Config::discover(cli.config.as_deref())?;
    init_tracing(&config, cli.log_level.as_deref());

    match &config_path {
        Some(path) => info!(path = %path.display(), "loaded configuration"),
        None => warn!("no config file found, using defaults"),
    }

    let manager_config = config.manager.to_manager_config()?;

    if cli.check {
        info!(machines = config.machine.len(), "configuration is valid");
        return Ok(());
    }

    if let Some(addr) = config.daemon.metrics_bind {
        PrometheusBuilder::new().with_http_listener(addr).install()?;
        info!(%addr, "serving metrics");
    }

    let store: Arc<dyn ObjectStore> = match &config.daemon.object_dir {
        Some(dir) => Arc::new(DirectoryObjectStore::open(dir).await?),
        None => Arc::new(MemoryObjectStore::new()),
    };
    info!(store = store.store_type(), "object store ready");

    let manager = Manager::spawn(ManagerActorArgs::with_config(store, manager_config));

    let mut fleet = Fleet::new(manager.clone());
    fleet.apply(config.machine).await?;
    info!(machines = fleet.machine_count(), "filegen daemon started");

    let mut hangup = signal(SignalKind::hangup())?;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = hangup.recv() => reload(&mut fleet, config_path.as_deref()).await,
        }
    }

    info!("shutting down");
    manager.shutdown().await?;
    Ok(())
}

/// Re-read the configuration and apply machine changes
async fn reload(fleet: &mut Fleet, path: Option<&std::path::Path>) {
    let Some(path) = path else {
        warn!("no config file to reload");
        return;
    };

    let machines = match Config::load(path) {
        Ok(config) => config.machine,
        Err(e) => {
            error!(path = %path.display(), error = %e, "failed to reload configuration");
            return;
        }
    };

    match fleet.apply(machines).await {
        Ok(()) => info!(machines = fleet.machine_count(), "configuration reloaded"),
        Err(e) => error!(error = %e, "failed to apply configuration"),
    }
}

fn init_tracing(config: &Config, level_override: Option<&str>) {
    let level = level_override.unwrap_or(&config.daemon.log_level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);
    match config.daemon.log_format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}
