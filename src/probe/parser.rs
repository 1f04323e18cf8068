// FILE: src/probe/parser.rs
//! Pure parser for batched ping output.
//!
//! A block starts at a `PING <host> ...` line and completes at the next
//! summary line carrying a received-packet count. Both the busybox
//! (`1 packets transmitted, 0 packets received, ...`) and iputils
//! (`1 packets transmitted, 0 received, ...`) summaries are understood.
//! Anything else, including blocks cut short by a killed process, is
//! dropped without producing a record.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeRecord {
    pub host: String,
    pub received: u32,
}

impl ProbeRecord {
    pub fn reachable(&self) -> bool {
        self.received > 0
    }
}

pub fn parse_probe_output(output: &str) -> Vec<ProbeRecord> {
    let mut records = Vec::new();
    let mut pending_host: Option<String> = None;

    for line in output.lines() {
        let words: Vec<&str> = line.split_whitespace().collect();

        if words.first() == Some(&"PING") {
            // A new block discards any unfinished one
            // iputils glues the resolved address on: `fe80::1%eth0(fe80::1%eth0)`
            pending_host = words
                .get(1)
                .and_then(|token| token.split('(').next())
                .filter(|host| !host.is_empty())
                .map(str::to_string);
            continue;
        }

        if let Some(received) = received_count(line) {
            if let Some(host) = pending_host.take() {
                records.push(ProbeRecord { host, received });
            }
        }
    }

    records
}

/// Received-packet count of a ping summary line.
fn received_count(line: &str) -> Option<u32> {
    if !line.contains("transmitted") {
        return None;
    }
    line.split(',')
        .find(|clause| clause.split_whitespace().last() == Some("received"))
        .and_then(|clause| clause.split_whitespace().next())
        .and_then(|count| count.parse().ok())
}
