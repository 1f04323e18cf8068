// FILE: src/config.rs
//! Daemon configuration.
//!
//! Loaded from a JSON file; every field is optional. The `enabled` flag is
//! the runtime on/off setting for polling and is re-read whenever the file
//! changes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::event::{AccessKind, AccessMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::cockpit::CockpitOptions;
use crate::error::{CockpitError, Result};
use crate::mounts::MountTableReader;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub enabled: bool,
    pub poll_interval_ms: u64,
    pub init_complete_delay_ms: u64,
    pub mount_check_interval_ms: u64,
    pub declared_mounts_path: PathBuf,
    pub live_mounts_path: PathBuf,
    pub shares_path: PathBuf,
    pub log_level: String,
    /// Bookmarks registered at startup, by registrant.
    pub bookmarks: BTreeMap<String, Vec<PathBuf>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_ms: 5000,
            init_complete_delay_ms: 1000,
            mount_check_interval_ms: 2000,
            declared_mounts_path: PathBuf::from("/etc/fstab"),
            live_mounts_path: PathBuf::from("/proc/mounts"),
            shares_path: default_data_dir().join("shares.json"),
            log_level: "info".to_string(),
            bookmarks: BTreeMap::new(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("/var/lib"))
        .join("mountcockpit")
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("/etc"))
        .join("mountcockpit")
        .join("config.json")
}

impl Config {
    /// Read `path`; a missing file means defaults.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(CockpitError::Config("poll_interval_ms must be positive".into()));
        }
        if self.mount_check_interval_ms == 0 {
            return Err(CockpitError::Config("mount_check_interval_ms must be positive".into()));
        }
        Ok(())
    }

    pub fn cockpit_options(&self) -> CockpitOptions {
        CockpitOptions {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            init_complete_delay: Duration::from_millis(self.init_complete_delay_ms),
        }
    }

    pub fn mount_check_interval(&self) -> Duration {
        Duration::from_millis(self.mount_check_interval_ms)
    }

    pub fn mount_table_reader(&self) -> MountTableReader {
        MountTableReader::new(&self.declared_mounts_path, &self.live_mounts_path)
    }
}

/// Publish `enabled` from the config file into `setting` whenever the
/// file changes. The returned watcher must be kept alive.
pub fn watch_enabled_setting(path: &Path, setting: watch::Sender<bool>) -> Result<RecommendedWatcher> {
    let target = path.to_path_buf();
    let dir = path
        .parent()
        .ok_or_else(|| CockpitError::Config(format!("no parent directory for {}", path.display())))?
        .to_path_buf();

    let handler = move |res: notify::Result<Event>| {
        let Ok(event) = res else { return };
        let written = matches!(
            event.kind,
            EventKind::Create(_)
                | EventKind::Modify(_)
                | EventKind::Access(AccessKind::Close(AccessMode::Write))
        );
        if !written || !event.paths.iter().any(|p| p == &target) {
            return;
        }
        match Config::load(&target) {
            Ok(config) => {
                let changed = setting.send_if_modified(|enabled| {
                    let changed = *enabled != config.enabled;
                    *enabled = config.enabled;
                    changed
                });
                if changed {
                    tracing::info!("[Config] enabled = {}", config.enabled);
                }
            }
            Err(e) => tracing::warn!("[Config] Ignoring unreadable config {}: {}", target.display(), e),
        }
    };

    let mut watcher = RecommendedWatcher::new(handler, notify::Config::default())
        .map_err(|e| CockpitError::Other(anyhow::anyhow!("file watcher: {}", e)))?;
    watcher
        .watch(&dir, RecursiveMode::NonRecursive)
        .map_err(|e| CockpitError::Other(anyhow::anyhow!("watch {}: {}", dir.display(), e)))?;
    Ok(watcher)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::default());
        assert!(config.enabled);
        assert_eq!(config.cockpit_options().poll_interval, Duration::from_millis(5000));
        assert_eq!(config.cockpit_options().init_complete_delay, Duration::from_millis(1000));
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let config = Config::parse(
            r#"{"enabled": false, "bookmarks": {"movieplayer": ["/media/hdd/Movies"]}}"#,
        )
        .unwrap();
        assert!(!config.enabled);
        assert_eq!(config.poll_interval_ms, 5000);
        assert_eq!(config.declared_mounts_path, PathBuf::from("/etc/fstab"));
        assert_eq!(
            config.bookmarks["movieplayer"],
            vec![PathBuf::from("/media/hdd/Movies")]
        );
    }

    #[test]
    fn test_zero_interval_rejected() {
        assert!(matches!(
            Config::parse(r#"{"poll_interval_ms": 0}"#),
            Err(CockpitError::Config(_))
        ));
        assert!(matches!(Config::parse("42"), Err(CockpitError::Json(_))));
    }

    #[tokio::test]
    async fn test_enabled_setting_follows_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"enabled": true}"#).unwrap();

        let (tx, mut rx) = watch::channel(true);
        let _watcher = watch_enabled_setting(&path, tx).unwrap();
        std::fs::write(&path, r#"{"enabled": false}"#).unwrap();

        tokio::time::timeout(Duration::from_secs(5), rx.changed())
            .await
            .expect("setting change not observed")
            .unwrap();
        assert!(!*rx.borrow());
    }
}
