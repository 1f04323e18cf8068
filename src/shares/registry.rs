// FILE: src/shares/registry.rs
//! Share registry collaborator.
//!
//! The registry owns the authoritative list of shares (created by the
//! auto-mount side of the system). The cockpit reads snapshots from it,
//! hands back the shares whose reachability flipped, and asks it to save.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::error::{CockpitError, Result};
use crate::shares::store::Share;

pub type RegistryFuture = Pin<Box<dyn Future<Output = Result<()>> + Send + 'static>>;

pub trait ShareRegistry: Send + Sync + 'static {
    /// Current snapshot of every known share.
    fn shares(&self) -> Result<Vec<Share>>;

    /// Perform corrective mount actions for `changed` (which carry their
    /// new `active` flag). The new flags must be visible through `shares()`
    /// as soon as this returns, before the future resolves.
    fn apply(&self, changed: Vec<Share>) -> RegistryFuture;

    /// Persist the current share state.
    fn save(&self) -> Result<()>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ShareRecord {
    host: String,
    #[serde(default)]
    active: bool,
}

/// Share registry persisted as a JSON object of `name -> {host, active}`.
pub struct JsonShareRegistry {
    path: PathBuf,
    records: Arc<Mutex<BTreeMap<String, ShareRecord>>>,
}

impl JsonShareRegistry {
    /// Load the registry file; a missing file starts an empty registry.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let records = match std::fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => BTreeMap::new(),
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("[Registry] No share file at {}, starting empty", path.display());
                BTreeMap::new()
            }
            Err(e) => return Err(e.into()),
        };
        tracing::info!("[Registry] Loaded {} shares from {}", records.len(), path.display());

        Ok(Self {
            path,
            records: Arc::new(Mutex::new(records)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, ShareRecord>>> {
        self.records
            .lock()
            .map_err(|_| CockpitError::Registry("Poisoned lock".into()))
    }
}

impl ShareRegistry for JsonShareRegistry {
    fn shares(&self) -> Result<Vec<Share>> {
        let records = self.lock()?;
        Ok(records
            .iter()
            .map(|(name, record)| Share::new(name.clone(), record.host.clone(), record.active))
            .collect())
    }

    fn apply(&self, changed: Vec<Share>) -> RegistryFuture {
        let result = self.lock().map(|mut records| {
            for share in &changed {
                match records.get_mut(&share.name) {
                    Some(record) => {
                        record.active = share.active;
                        tracing::info!(
                            "[Registry] {} marked {}",
                            share.name,
                            if share.active { "active" } else { "inactive" }
                        );
                    }
                    None => tracing::warn!("[Registry] Apply for unknown share {}", share.name),
                }
            }
        });
        Box::pin(async move { result })
    }

    fn save(&self) -> Result<()> {
        let json = {
            let records = self.lock()?;
            serde_json::to_string_pretty(&*records)?
        };

        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        // Write-then-rename so a crash never leaves a truncated file
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        tracing::debug!("[Registry] Saved shares to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let registry = JsonShareRegistry::open(dir.path().join("shares.json")).unwrap();
        assert!(registry.shares().unwrap().is_empty());
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shares.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(JsonShareRegistry::open(&path), Err(CockpitError::Json(_))));
    }

    #[tokio::test]
    async fn test_apply_then_save_persists_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shares.json");
        std::fs::write(
            &path,
            r#"{"movies": {"host": "10.0.0.5", "active": true}, "music": {"host": "10.0.0.7"}}"#,
        )
        .unwrap();

        let registry = JsonShareRegistry::open(&path).unwrap();
        assert_eq!(
            registry.shares().unwrap(),
            vec![
                Share::new("movies", "10.0.0.5", true),
                Share::new("music", "10.0.0.7", false),
            ]
        );

        registry
            .apply(vec![Share::new("movies", "10.0.0.5", false)])
            .await
            .unwrap();
        registry.save().unwrap();

        let reloaded = JsonShareRegistry::open(&path).unwrap();
        assert!(!reloaded.shares().unwrap()[0].active);
    }

    #[test]
    fn test_poisoned_lock_is_a_registry_error() {
        let dir = tempfile::tempdir().unwrap();
        let registry = JsonShareRegistry::open(dir.path().join("shares.json")).unwrap();

        let records = Arc::clone(&registry.records);
        let _ = std::thread::spawn(move || {
            let _guard = records.lock().unwrap();
            panic!("writer died holding the lock");
        })
        .join();

        assert!(matches!(registry.shares(), Err(CockpitError::Registry(_))));
        assert!(matches!(registry.save(), Err(CockpitError::Registry(_))));
    }
}
