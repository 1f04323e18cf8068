// FILE: src/probe/command.rs
//! ProbeBatch: the distinct hosts of one polling round and the shell
//! command that pings them.

use crate::shares::ShareStore;

/// Characters allowed in a host handed to the shell.
fn is_safe_host(host: &str) -> bool {
    !host.is_empty()
        && !host.starts_with('-')
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | ':' | '-' | '_' | '%'))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeBatch {
    hosts: Vec<String>,
}

impl ProbeBatch {
    /// One entry per distinct, shell-safe host.
    pub fn new(hosts: impl IntoIterator<Item = String>) -> Self {
        let mut batch: Vec<String> = Vec::new();
        for host in hosts {
            if !is_safe_host(&host) {
                tracing::warn!("[Prober] Skipping unsafe host address {:?}", host);
                continue;
            }
            if !batch.contains(&host) {
                batch.push(host);
            }
        }
        Self { hosts: batch }
    }

    pub fn from_shares(shares: &ShareStore) -> Self {
        Self::new(shares.hosts())
    }

    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    pub fn command(&self) -> String {
        build_probe_command(&self.hosts)
    }
}

/// Single-packet, one-second-deadline pings run one after another.
/// No hosts, no command.
pub fn build_probe_command(hosts: &[String]) -> String {
    hosts
        .iter()
        .map(|host| format!("ping -c1 -w1 {}", host))
        .collect::<Vec<_>>()
        .join(";")
}
