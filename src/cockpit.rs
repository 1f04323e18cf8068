//! MountCockpit: the driver task around the reconciliation engine.
//!
//! One tokio task owns the [`Engine`] and is the only writer of
//! reconciliation state. Callers talk to it through a cloneable
//! [`CockpitHandle`]: mutations go over a channel, queries read the last
//! published [`CockpitView`] snapshot without waiting on the task.
//!
//! The task suspends only while waiting for its inputs: caller requests,
//! the polling timer, probe completion, registry apply completion and the
//! enable/disable setting. Probe processes, registry applies and the
//! initialization-complete delay run in their own spawned tasks and report
//! back over channels.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::engine::{Command, Engine, Event};
use crate::error::{CockpitError, Result};
use crate::mounts::MountTableReader;
use crate::probe::ProbeRunner;
use crate::shares::{Share, ShareRegistry};
use crate::state::{BookmarkSpace, CockpitView, SharedView};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5000);
pub const DEFAULT_INIT_COMPLETE_DELAY: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone)]
pub struct CockpitOptions {
    pub poll_interval: Duration,
    pub init_complete_delay: Duration,
}

impl Default for CockpitOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            init_complete_delay: DEFAULT_INIT_COMPLETE_DELAY,
        }
    }
}

enum Request {
    Register {
        registrant: String,
        bookmarks: Vec<PathBuf>,
        done: oneshot::Sender<()>,
    },
    MountTableChanged,
    OnInitializationComplete(oneshot::Sender<()>),
    Shutdown,
}

/// Cloneable entry point for every component that needs bookmark or
/// mount information.
#[derive(Clone)]
pub struct CockpitHandle {
    requests: mpsc::UnboundedSender<Request>,
    view: SharedView,
}

impl CockpitHandle {
    /// Replace the registrant's bookmarks and reconcile. Resolves once the
    /// new mount table is visible to queries.
    pub async fn register<I, P>(&self, registrant: &str, bookmarks: I) -> Result<()>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let (done, ack) = oneshot::channel();
        self.send(Request::Register {
            registrant: registrant.to_string(),
            bookmarks: bookmarks.into_iter().map(Into::into).collect(),
            done,
        })?;
        ack.await.map_err(|_| CockpitError::Shutdown)
    }

    pub fn on_mount_table_changed(&self) -> Result<()> {
        self.send(Request::MountTableChanged)
    }

    /// Resolves when the current reconciliation cycle settles, or right
    /// away if it already has. Only one waiter is kept: registering a new
    /// one drops the previous receiver's sender.
    pub fn on_initialization_complete(&self) -> Result<oneshot::Receiver<()>> {
        let (tx, rx) = oneshot::channel();
        self.send(Request::OnInitializationComplete(tx))?;
        Ok(rx)
    }

    pub fn view(&self) -> Arc<CockpitView> {
        Arc::clone(&self.view.borrow())
    }

    pub fn mount_point(&self, registrant: &str, path: impl AsRef<Path>) -> Option<PathBuf> {
        self.view().mount_point(registrant, path)
    }

    pub fn same_mount_point(
        &self,
        registrant: &str,
        first: impl AsRef<Path>,
        second: impl AsRef<Path>,
    ) -> bool {
        self.view().same_mount_point(registrant, first, second)
    }

    pub fn is_known_mounted_path(&self, path: impl AsRef<Path>) -> bool {
        self.view().is_known_mounted_path(path)
    }

    pub fn bookmark(&self, registrant: &str, path: impl AsRef<Path>) -> Option<PathBuf> {
        self.view().bookmark(registrant, path)
    }

    pub fn mounted_bookmarks(&self, registrant: &str) -> Vec<PathBuf> {
        self.view().mounted_bookmarks(registrant)
    }

    pub fn home_directory(&self, registrant: &str) -> Option<PathBuf> {
        self.view().home_directory(registrant)
    }

    pub fn resolve_virtual_directories<P: AsRef<Path>>(
        &self,
        registrant: &str,
        dirs: &[P],
    ) -> Vec<PathBuf> {
        self.view().resolve_virtual_directories(registrant, dirs)
    }

    pub fn bookmark_space_usage(&self, registrant: &str) -> Vec<BookmarkSpace> {
        self.view().bookmark_space_usage(registrant)
    }

    fn send(&self, request: Request) -> Result<()> {
        self.requests
            .send(request)
            .map_err(|_| CockpitError::Shutdown)
    }
}

/// Owner of the driver task.
pub struct MountCockpit {
    handle: CockpitHandle,
    task: JoinHandle<()>,
}

impl MountCockpit {
    /// Start the driver task. Must be called within a tokio runtime.
    pub fn spawn(
        options: CockpitOptions,
        reader: MountTableReader,
        registry: Arc<dyn ShareRegistry>,
        runner: Arc<dyn ProbeRunner>,
        enabled: watch::Receiver<bool>,
    ) -> Self {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (probe_tx, probe_rx) = mpsc::unbounded_channel();
        let (apply_tx, apply_rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = watch::channel(Arc::new(CockpitView::default()));

        let driver = Driver {
            engine: Engine::new(*enabled.borrow()),
            options,
            reader,
            registry,
            runner,
            view_tx,
            probe_tx,
            apply_tx,
            probe_task: None,
            init_waiter: None,
        };
        let task = tokio::spawn(driver.run(request_rx, probe_rx, apply_rx, enabled));
        tracing::info!("[Cockpit] Started");

        Self {
            handle: CockpitHandle {
                requests: request_tx,
                view: view_rx,
            },
            task,
        }
    }

    pub fn handle(&self) -> CockpitHandle {
        self.handle.clone()
    }

    /// Stop polling, kill any in-flight probe and wait for the task.
    pub async fn shutdown(self) -> Result<()> {
        // Already gone is fine
        let _ = self.handle.send(Request::Shutdown);
        self.task
            .await
            .map_err(|e| CockpitError::Other(anyhow::anyhow!("Cockpit task failed: {}", e)))
    }
}

struct Driver {
    engine: Engine,
    options: CockpitOptions,
    reader: MountTableReader,
    registry: Arc<dyn ShareRegistry>,
    runner: Arc<dyn ProbeRunner>,
    view_tx: watch::Sender<Arc<CockpitView>>,
    probe_tx: mpsc::UnboundedSender<(u64, String)>,
    apply_tx: mpsc::UnboundedSender<()>,
    probe_task: Option<JoinHandle<()>>,
    init_waiter: Option<oneshot::Sender<()>>,
}

impl Driver {
    async fn run(
        mut self,
        mut requests: mpsc::UnboundedReceiver<Request>,
        mut probe_rx: mpsc::UnboundedReceiver<(u64, String)>,
        mut apply_rx: mpsc::UnboundedReceiver<()>,
        mut enabled: watch::Receiver<bool>,
    ) {
        let mut ticker = tokio::time::interval(self.options.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick is immediate; probing starts from registration
        ticker.tick().await;
        let mut settings_open = true;

        loop {
            tokio::select! {
                request = requests.recv() => match request {
                    Some(Request::Shutdown) | None => break,
                    Some(request) => self.on_request(request),
                },
                _ = ticker.tick() => self.dispatch(Event::PollTick),
                Some((round, stdout)) = probe_rx.recv() => {
                    self.dispatch(Event::ProbeFinished { round, stdout });
                }
                Some(()) = apply_rx.recv() => self.dispatch(Event::ApplyFinished),
                changed = enabled.changed(), if settings_open => match changed {
                    Ok(()) => {
                        let value = *enabled.borrow_and_update();
                        if value {
                            ticker.reset();
                        }
                        self.dispatch(Event::PollingToggled(value));
                    }
                    Err(_) => {
                        tracing::debug!("[Cockpit] Enable setting dropped, keeping last value");
                        settings_open = false;
                    }
                },
            }
        }

        self.stop_probe();
        tracing::info!("[Cockpit] Stopped");
    }

    fn on_request(&mut self, request: Request) {
        match request {
            Request::Register {
                registrant,
                bookmarks,
                done,
            } => {
                tracing::info!("[Cockpit] {} registers {:?}", registrant, bookmarks);
                self.dispatch(Event::Registered {
                    registrant,
                    bookmarks,
                });
                let _ = done.send(());
            }
            Request::MountTableChanged => {
                tracing::info!("[Cockpit] Mount table changed");
                self.dispatch(Event::MountTableChanged);
            }
            Request::OnInitializationComplete(waiter) => {
                if self.engine.is_initialized() {
                    let _ = waiter.send(());
                } else if self.init_waiter.replace(waiter).is_some() {
                    tracing::debug!("[Cockpit] Replacing pending initialization waiter");
                }
            }
            Request::Shutdown => {}
        }
    }

    /// Run the engine transition and every command it produces, then
    /// publish the view. Nothing here awaits.
    fn dispatch(&mut self, event: Event) {
        let mut queue: VecDeque<Command> = self.engine.handle(event).into();

        while let Some(command) = queue.pop_front() {
            match command {
                Command::RefreshMountTable => {
                    let mount_points = self.reader.list_mount_points();
                    let shares = self.registry.shares().unwrap_or_else(|e| {
                        tracing::error!("[Cockpit] Share registry unreadable, keeping last snapshot: {}", e);
                        self.engine.shares().snapshot()
                    });
                    queue.extend(self.engine.handle(Event::Reconcile {
                        mount_points,
                        shares,
                    }));
                }
                Command::StartProbe { round, command } => self.start_probe(round, command),
                Command::StopProbe => self.stop_probe(),
                Command::ApplyShares(changed) => self.apply(changed),
                Command::SaveShares => {
                    if let Err(e) = self.registry.save() {
                        tracing::error!("[Cockpit] Failed to save shares: {}", e);
                    }
                }
                Command::InitializationComplete => self.initialization_complete(),
            }
        }

        self.publish_view();
    }

    fn publish_view(&self) {
        let view = self.engine.view();
        let stale = !Arc::ptr_eq(&self.view_tx.borrow(), &view);
        if stale {
            self.view_tx.send_replace(view);
        }
    }

    fn start_probe(&mut self, round: u64, command: String) {
        self.stop_probe();

        let runner = Arc::clone(&self.runner);
        let tx = self.probe_tx.clone();
        self.probe_task = Some(tokio::spawn(async move {
            let stdout = match runner.run(command).await {
                Ok(output) => output.stdout,
                Err(e) => {
                    tracing::warn!("[Prober] Probe round {} failed: {}", round, e);
                    String::new()
                }
            };
            let _ = tx.send((round, stdout));
        }));
    }

    fn stop_probe(&mut self) {
        if let Some(task) = self.probe_task.take() {
            // Dropping the probe future kills the process
            task.abort();
        }
    }

    fn apply(&self, changed: Vec<Share>) {
        let pending = self.registry.apply(changed);
        let tx = self.apply_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = pending.await {
                tracing::error!("[Cockpit] Share apply failed: {}", e);
            }
            let _ = tx.send(());
        });
    }

    fn initialization_complete(&mut self) {
        tracing::info!("[Cockpit] ✓ Initialization complete");
        if let Some(waiter) = self.init_waiter.take() {
            let delay = self.options.init_complete_delay;
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let _ = waiter.send(());
            });
        }
    }
}
