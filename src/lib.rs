//! MountCockpit: bookmark availability monitor
//!
//! Tracks which registered bookmarks (directories other components care
//! about) sit on a mounted, reachable share:
//! - Mounts (merges fstab and /proc/mounts into one mount point list)
//! - Bookmarks (maps each bookmark to its longest containing mount point)
//! - Prober (pings share hosts on a timer and parses the results)
//! - Engine (the reconciliation state machine, driven by the Cockpit task)

pub mod bookmarks;
pub mod cockpit;
pub mod config;
pub mod engine;
pub mod error;
pub mod mounts;
pub mod probe;
pub mod shares;
pub mod state;

pub use cockpit::{CockpitHandle, CockpitOptions, MountCockpit};
pub use config::Config;
pub use engine::{Command, Engine, Event, Phase, ReconciliationState};
pub use error::{CockpitError, Result};
pub use mounts::{space_usage, MountTableReader, MountWatcher, SpaceUsage};
pub use probe::{ProbeRunner, ShellProbeRunner};
pub use shares::{JsonShareRegistry, Share, ShareRegistry};
pub use state::{BookmarkSpace, CockpitView};
