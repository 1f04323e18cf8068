// FILE: src/mounts/watcher.rs
//! Mount-table change detection for the daemon.
//!
//! Two signals feed `on_mount_table_changed()`:
//! - a notify watcher on the declared-mounts file (fstab edits),
//! - a periodic comparison of the merged mount list, because the live
//!   table under /proc cannot be watched with inotify.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::cockpit::CockpitHandle;
use crate::mounts::MountTableReader;

/// Editors tend to write fstab in several steps.
const DECLARED_DEBOUNCE: Duration = Duration::from_millis(500);

pub struct MountWatcher {
    _watcher: Option<RecommendedWatcher>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl MountWatcher {
    pub fn spawn(reader: MountTableReader, handle: CockpitHandle, check_interval: Duration) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<()>();
        let watcher = watch_declared_file(reader.declared_path(), tx);

        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            let mut last = reader.list_mount_points();
            let mut ticker = tokio::time::interval(check_interval);
            ticker.tick().await;

            loop {
                let changed = tokio::select! {
                    _ = token.cancelled() => break,
                    Some(()) = rx.recv() => {
                        tokio::time::sleep(DECLARED_DEBOUNCE).await;
                        while rx.try_recv().is_ok() {}
                        tracing::info!("[Watcher] Declared mounts file changed");
                        last = reader.list_mount_points();
                        true
                    }
                    _ = ticker.tick() => {
                        let current = reader.list_mount_points();
                        if current != last {
                            tracing::info!("[Watcher] Live mount table changed");
                            last = current;
                            true
                        } else {
                            false
                        }
                    }
                };

                if changed && handle.on_mount_table_changed().is_err() {
                    tracing::debug!("[Watcher] Cockpit gone, stopping");
                    break;
                }
            }
        });

        Self {
            _watcher: watcher,
            cancel,
            task,
        }
    }

    pub async fn stop(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }
}

/// Watch the parent directory so replace-by-rename is seen too.
fn watch_declared_file(path: &Path, tx: mpsc::UnboundedSender<()>) -> Option<RecommendedWatcher> {
    let target: PathBuf = path.to_path_buf();
    let dir = path.parent()?.to_path_buf();

    let handler = move |res: notify::Result<Event>| {
        if let Ok(event) = res {
            if matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_))
                && event.paths.iter().any(|p| p == &target)
            {
                let _ = tx.send(());
            }
        }
    };

    let mut watcher = match RecommendedWatcher::new(handler, notify::Config::default()) {
        Ok(watcher) => watcher,
        Err(e) => {
            tracing::warn!("[Watcher] Cannot create file watcher: {}", e);
            return None;
        }
    };
    if let Err(e) = watcher.watch(&dir, RecursiveMode::NonRecursive) {
        tracing::warn!("[Watcher] Cannot watch {}: {}", dir.display(), e);
        return None;
    }
    tracing::debug!("[Watcher] Watching {}", path.display());
    Some(watcher)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cockpit::{CockpitOptions, MountCockpit};
    use crate::probe::ShellProbeRunner;
    use crate::shares::JsonShareRegistry;
    use std::sync::Arc;
    use tokio::sync::watch;

    #[tokio::test]
    async fn test_live_table_change_triggers_reconcile() {
        let dir = tempfile::tempdir().unwrap();
        let live = dir.path().join("mounts");
        let declared = dir.path().join("fstab");
        std::fs::write(&live, "").unwrap();
        std::fs::write(&declared, "").unwrap();
        let reader = MountTableReader::new(&declared, &live);

        let registry = JsonShareRegistry::open(dir.path().join("shares.json")).unwrap();
        let (_enabled_tx, enabled_rx) = watch::channel(true);
        let cockpit = MountCockpit::spawn(
            CockpitOptions::default(),
            reader.clone(),
            Arc::new(registry),
            Arc::new(ShellProbeRunner),
            enabled_rx,
        );
        let handle = cockpit.handle();
        handle.register("movieplayer", ["/media/usb/Movies"]).await.unwrap();
        assert!(handle.mounted_bookmarks("movieplayer").is_empty());

        let watcher = MountWatcher::spawn(reader, handle.clone(), Duration::from_millis(20));
        std::fs::write(&live, "/dev/sda1 /media/usb vfat rw 0 0\n").unwrap();

        let mut mounted = false;
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            if !handle.mounted_bookmarks("movieplayer").is_empty() {
                mounted = true;
                break;
            }
        }
        assert!(mounted, "mount change was not picked up");

        watcher.stop().await;
        cockpit.shutdown().await.unwrap();
    }
}
