// src/main.rs

use anyhow::{Context, Result};
use mountcockpit::config::{default_config_path, watch_enabled_setting};
use mountcockpit::*;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path);
    let config = Config::load(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("=");
    tracing::info!("MountCockpit Starting Up...");
    tracing::info!("=");
    tracing::info!("Config: {}", config_path.display());

    // ========== SHARE REGISTRY ==========
    let registry = JsonShareRegistry::open(&config.shares_path)
        .with_context(|| format!("opening {}", config.shares_path.display()))?;
    tracing::info!("✓ Share registry: {}", registry.path().display());

    // ========== ENABLE SETTING ==========
    let (enabled_tx, enabled_rx) = watch::channel(config.enabled);
    let _config_watcher = match watch_enabled_setting(&config_path, enabled_tx) {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            tracing::warn!("Config changes will not be picked up: {}", e);
            None
        }
    };

    // ========== COCKPIT ==========
    let reader = config.mount_table_reader();
    let cockpit = MountCockpit::spawn(
        config.cockpit_options(),
        reader.clone(),
        Arc::new(registry),
        Arc::new(ShellProbeRunner),
        enabled_rx,
    );
    let handle = cockpit.handle();
    tracing::info!("✓ Cockpit started (polling {})", if config.enabled { "on" } else { "off" });

    for (registrant, bookmarks) in &config.bookmarks {
        handle.register(registrant, bookmarks.iter().cloned()).await?;
    }

    // ========== MOUNT WATCHER ==========
    let watcher = MountWatcher::spawn(reader, handle.clone(), config.mount_check_interval());
    tracing::info!("✓ Mount watcher started");

    let init_handle = handle.clone();
    let registrants: Vec<String> = config.bookmarks.keys().cloned().collect();
    let ready = handle.on_initialization_complete()?;
    tokio::spawn(async move {
        if ready.await.is_ok() {
            for registrant in &registrants {
                tracing::info!(
                    "{}: mounted bookmarks {:?}",
                    registrant,
                    init_handle.mounted_bookmarks(registrant)
                );
            }
        }
    });

    tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;

    tracing::info!("MountCockpit shutting down...");
    watcher.stop().await;
    cockpit.shutdown().await?;
    Ok(())
}
