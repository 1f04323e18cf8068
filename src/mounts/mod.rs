// FILE: src/mounts/mod.rs
pub mod paths;
pub mod space;
pub mod table;
pub mod watcher;

pub use space::{space_usage, SpaceUsage};
pub use table::{MountEntry, MountTableReader};
pub use watcher::MountWatcher;
