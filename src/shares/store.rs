// FILE: src/shares/store.rs
//! Single-writer store of share reachability state.

use std::collections::BTreeMap;

use crate::probe::parser::ProbeRecord;

/// A named remote or local resource and its last known reachability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Share {
    pub name: String,
    pub host: String,
    pub active: bool,
}

impl Share {
    pub fn new(name: impl Into<String>, host: impl Into<String>, active: bool) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            active,
        }
    }
}

/// Owned snapshot of all known shares. The only mutation is `set_active`.
#[derive(Debug, Clone, Default)]
pub struct ShareStore {
    shares: BTreeMap<String, Share>,
}

impl ShareStore {
    pub fn new(shares: impl IntoIterator<Item = Share>) -> Self {
        Self {
            shares: shares
                .into_iter()
                .map(|share| (share.name.clone(), share))
                .collect(),
        }
    }

    /// Set a share's reachability. Returns true if the flag flipped; an
    /// unknown share never changes.
    pub fn set_active(&mut self, name: &str, active: bool) -> bool {
        match self.shares.get_mut(name) {
            Some(share) if share.active != active => {
                share.active = active;
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Share> {
        self.shares.get(name)
    }

    /// Owned copy of every share, in name order.
    pub fn snapshot(&self) -> Vec<Share> {
        self.shares.values().cloned().collect()
    }

    /// Distinct hosts in share-name order.
    pub fn hosts(&self) -> Vec<String> {
        let mut hosts: Vec<String> = Vec::new();
        for share in self.shares.values() {
            if !hosts.contains(&share.host) {
                hosts.push(share.host.clone());
            }
        }
        hosts
    }

    /// Apply completed probe records to every share on the probed host.
    /// Returns the names of the shares whose flag flipped, in order of
    /// first change.
    pub fn apply_probe_records(&mut self, records: &[ProbeRecord]) -> Vec<String> {
        let mut changed: Vec<String> = Vec::new();
        for record in records {
            let names: Vec<String> = self
                .shares
                .values()
                .filter(|share| share.host == record.host)
                .map(|share| share.name.clone())
                .collect();

            for name in names {
                if self.set_active(&name, record.reachable()) {
                    tracing::info!(
                        "[Shares] {} ({}) is now {}",
                        name,
                        record.host,
                        if record.reachable() { "online" } else { "offline" }
                    );
                    if !changed.contains(&name) {
                        changed.push(name);
                    }
                }
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(host: &str, received: u32) -> ProbeRecord {
        ProbeRecord {
            host: host.to_string(),
            received,
        }
    }

    #[test]
    fn test_set_active_reports_flip_only() {
        let mut store = ShareStore::new([Share::new("share1", "10.0.0.5", true)]);
        assert!(!store.set_active("share1", true));
        assert!(store.set_active("share1", false));
        assert!(!store.set_active("share1", false));
        assert!(!store.set_active("ghost", true));
    }

    #[test]
    fn test_hosts_are_distinct() {
        let store = ShareStore::new([
            Share::new("share1", "10.0.0.5", false),
            Share::new("share2", "10.0.0.5", false),
            Share::new("share3", "10.0.0.7", false),
        ]);
        assert_eq!(store.hosts(), vec!["10.0.0.5".to_string(), "10.0.0.7".to_string()]);
    }

    #[test]
    fn test_offline_record_flips_all_shares_on_host() {
        let mut store = ShareStore::new([
            Share::new("share1", "10.0.0.5", true),
            Share::new("share2", "10.0.0.5", true),
            Share::new("share3", "10.0.0.7", true),
        ]);
        let changed = store.apply_probe_records(&[record("10.0.0.5", 0)]);
        assert_eq!(changed, vec!["share1".to_string(), "share2".to_string()]);
        assert!(!store.get("share1").unwrap().active);
        assert!(store.get("share3").unwrap().active);

        // same outcome again: nothing changes
        assert!(store.apply_probe_records(&[record("10.0.0.5", 0)]).is_empty());
    }

    #[test]
    fn test_snapshot_is_name_ordered() {
        let store = ShareStore::new([
            Share::new("share2", "10.0.0.5", false),
            Share::new("share1", "10.0.0.7", true),
        ]);
        let names: Vec<String> = store.snapshot().into_iter().map(|share| share.name).collect();
        assert_eq!(names, vec!["share1".to_string(), "share2".to_string()]);
    }

    #[test]
    fn test_unknown_host_changes_nothing() {
        let mut store = ShareStore::new([Share::new("share1", "10.0.0.5", false)]);
        assert!(store.apply_probe_records(&[record("10.9.9.9", 1)]).is_empty());
    }
}
