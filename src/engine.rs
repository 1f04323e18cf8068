//! The availability reconciliation state machine.
//!
//! `Engine` holds every piece of reconciliation state and is driven purely
//! by `Event`s. Each call to [`Engine::handle`] runs one transition to
//! completion and returns the `Command`s the caller must execute (start or
//! stop a probe process, hand changed shares to the registry, re-read the
//! mount table, signal initialization). It never performs process or timer
//! I/O itself, which keeps the transitions testable without a runtime.

use std::path::PathBuf;
use std::sync::Arc;

use crate::bookmarks::{BookmarkIndex, BookmarkMountTable};
use crate::probe::{parse_probe_output, ProbeBatch};
use crate::shares::{Share, ShareStore};
use crate::state::CockpitView;

/// Clean probe rounds needed before a cycle counts as settled.
pub const SETTLE_ROUNDS: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Reconciling,
    Probing,
    Applying,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A registrant replaced its bookmark set.
    Registered {
        registrant: String,
        bookmarks: Vec<PathBuf>,
    },
    /// Something outside changed the mount table.
    MountTableChanged,
    /// Fresh mount points and share snapshot, answering `RefreshMountTable`.
    Reconcile {
        mount_points: Vec<PathBuf>,
        shares: Vec<Share>,
    },
    /// The polling timer fired.
    PollTick,
    /// A probe process finished (or failed to run, with empty output).
    ProbeFinished { round: u64, stdout: String },
    /// The registry finished applying changed shares.
    ApplyFinished,
    /// The enable/disable setting changed.
    PollingToggled(bool),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Gather mount points and shares, then feed back `Event::Reconcile`.
    RefreshMountTable,
    /// Run `command`, replacing any probe still in flight.
    StartProbe { round: u64, command: String },
    /// Kill the in-flight probe, if any.
    StopProbe,
    /// Hand the shares whose reachability flipped to the registry.
    ApplyShares(Vec<Share>),
    /// Persist the registry.
    SaveShares,
    /// The cycle settled.
    InitializationComplete,
}

/// Per-cycle bookkeeping, reset at the start of every reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationState {
    pub completed_rounds: u32,
    pub initialization_complete: bool,
    pub changed: Vec<String>,
}

#[derive(Debug)]
pub struct Engine {
    phase: Phase,
    polling_enabled: bool,
    index: BookmarkIndex,
    mount_points: Vec<PathBuf>,
    view: Arc<CockpitView>,
    shares: ShareStore,
    batch: ProbeBatch,
    state: ReconciliationState,
    round: u64,
    apply_pending: bool,
}

impl Engine {
    pub fn new(polling_enabled: bool) -> Self {
        Self {
            phase: Phase::Idle,
            polling_enabled,
            index: BookmarkIndex::new(),
            mount_points: Vec::new(),
            view: Arc::new(CockpitView::default()),
            shares: ShareStore::default(),
            batch: ProbeBatch::default(),
            state: ReconciliationState::default(),
            round: 0,
            apply_pending: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn polling_enabled(&self) -> bool {
        self.polling_enabled
    }

    pub fn is_initialized(&self) -> bool {
        self.state.initialization_complete
    }

    pub fn reconciliation_state(&self) -> &ReconciliationState {
        &self.state
    }

    pub fn probe_batch(&self) -> &ProbeBatch {
        &self.batch
    }

    pub fn shares(&self) -> &ShareStore {
        &self.shares
    }

    pub fn mount_points(&self) -> &[PathBuf] {
        &self.mount_points
    }

    /// Latest published snapshot of bookmarks and their mount points.
    pub fn view(&self) -> Arc<CockpitView> {
        Arc::clone(&self.view)
    }

    /// Run one transition.
    pub fn handle(&mut self, event: Event) -> Vec<Command> {
        tracing::debug!("[Engine] {:?} <- {}", self.phase, event_name(&event));
        match event {
            Event::Registered {
                registrant,
                bookmarks,
            } => {
                self.index.register(&registrant, bookmarks);
                self.view = Arc::new(CockpitView::new(self.index.clone(), self.view.table.clone()));
                self.begin_reconcile()
            }
            Event::MountTableChanged => self.begin_reconcile(),
            Event::Reconcile {
                mount_points,
                shares,
            } => self.reconcile(mount_points, shares),
            Event::PollTick => self.poll(),
            Event::ProbeFinished { round, stdout } => self.probe_finished(round, &stdout),
            Event::ApplyFinished => self.apply_finished(),
            Event::PollingToggled(enabled) => self.toggle_polling(enabled),
        }
    }

    fn begin_reconcile(&mut self) -> Vec<Command> {
        self.phase = Phase::Reconciling;
        vec![Command::RefreshMountTable]
    }

    fn reconcile(&mut self, mount_points: Vec<PathBuf>, shares: Vec<Share>) -> Vec<Command> {
        // 1. Rebuild the bookmark -> mount point table wholesale
        let table = BookmarkMountTable::build(&self.index, &mount_points);
        tracing::info!(
            "[Engine] Reconciled {} mount points, {} mounted bookmarks",
            mount_points.len(),
            table.len()
        );
        self.mount_points = mount_points;
        self.view = Arc::new(CockpitView::new(self.index.clone(), table));

        // 2. Recompute probe targets from the share snapshot
        self.shares = ShareStore::new(shares);
        self.batch = ProbeBatch::from_shares(&self.shares);
        tracing::debug!("[Engine] probe batch: {:?}", self.batch.hosts());

        // 3. Fresh cycle
        self.state = ReconciliationState::default();

        if !self.batch.is_empty() && self.polling_enabled {
            return self.start_probe();
        }

        self.phase = Phase::Idle;
        // An earlier probe may still be running
        let mut commands = vec![Command::StopProbe];
        commands.extend(self.check_initialization_complete());
        commands
    }

    fn start_probe(&mut self) -> Vec<Command> {
        self.round += 1;
        self.phase = Phase::Probing;
        vec![Command::StartProbe {
            round: self.round,
            command: self.batch.command(),
        }]
    }

    fn poll(&mut self) -> Vec<Command> {
        if !self.polling_enabled || self.batch.is_empty() {
            return Vec::new();
        }
        match self.phase {
            Phase::Idle => self.start_probe(),
            // Mid-cycle: the running round finishes first
            Phase::Reconciling | Phase::Probing | Phase::Applying => Vec::new(),
        }
    }

    fn probe_finished(&mut self, round: u64, stdout: &str) -> Vec<Command> {
        if self.phase != Phase::Probing || round != self.round {
            tracing::debug!("[Engine] Ignoring stale probe round {}", round);
            return Vec::new();
        }
        self.phase = Phase::Applying;

        let records = parse_probe_output(stdout);
        let changed = self.shares.apply_probe_records(&records);

        if !changed.is_empty() {
            let changed_shares: Vec<Share> = changed
                .iter()
                .filter_map(|name| self.shares.get(name).cloned())
                .collect();
            self.state.changed = changed;
            self.apply_pending = true;
            tracing::info!("[Engine] Shares changed: {:?}", self.state.changed);
            return vec![Command::ApplyShares(changed_shares)];
        }

        self.state.completed_rounds += 1;
        tracing::debug!("[Engine] completed rounds: {}", self.state.completed_rounds);
        self.phase = Phase::Idle;
        self.check_initialization_complete()
    }

    fn apply_finished(&mut self) -> Vec<Command> {
        if !self.apply_pending {
            return Vec::new();
        }
        self.apply_pending = false;
        // Mount corrections can change the mount table
        let mut commands = vec![Command::SaveShares];
        commands.extend(self.begin_reconcile());
        commands
    }

    fn toggle_polling(&mut self, enabled: bool) -> Vec<Command> {
        if enabled == self.polling_enabled {
            return Vec::new();
        }
        self.polling_enabled = enabled;
        tracing::info!("[Engine] Polling {}", if enabled { "enabled" } else { "disabled" });

        if enabled {
            return self.poll();
        }
        let mut commands = vec![Command::StopProbe];
        if self.phase == Phase::Probing {
            self.phase = Phase::Idle;
        }
        if self.phase == Phase::Idle {
            commands.extend(self.check_initialization_complete());
        }
        commands
    }

    /// Flip `initialization_complete` once per cycle: immediately when
    /// there is nothing to probe, otherwise after `SETTLE_ROUNDS` clean
    /// rounds.
    ///
    /// There is no bound on convergence: if every round keeps flipping
    /// shares, the cycle restarts forever and never completes.
    fn check_initialization_complete(&mut self) -> Vec<Command> {
        let settled = self.batch.is_empty()
            || !self.polling_enabled
            || self.state.completed_rounds >= SETTLE_ROUNDS;
        if self.state.initialization_complete || !settled {
            return Vec::new();
        }
        self.state.initialization_complete = true;
        tracing::info!("[Engine] Initialization complete");
        vec![Command::InitializationComplete]
    }
}

fn event_name(event: &Event) -> &'static str {
    match event {
        Event::Registered { .. } => "Registered",
        Event::MountTableChanged => "MountTableChanged",
        Event::Reconcile { .. } => "Reconcile",
        Event::PollTick => "PollTick",
        Event::ProbeFinished { .. } => "ProbeFinished",
        Event::ApplyFinished => "ApplyFinished",
        Event::PollingToggled(_) => "PollingToggled",
    }
}
