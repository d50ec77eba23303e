//! Blackboard — the key-indexed channel crew agents use to pass context.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lifecycle status of one blackboard entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    /// Registered but not yet started.
    Pending,
    /// Currently executing.
    Running,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
}

/// One value written to the blackboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlackboardEntry {
    /// The stored value.
    pub value: serde_json::Value,
    /// Unix epoch milliseconds when this entry was last written.
    pub timestamp: u64,
    /// Lifecycle status.
    pub status: EntryStatus,
    /// Optional implementation-defined metadata.
    pub metadata: Option<serde_json::Value>,
}

impl BlackboardEntry {
    /// Construct a `Pending` entry with the given value and timestamp.
    pub fn new(value: serde_json::Value, timestamp: u64) -> Self {
        Self {
            value,
            timestamp,
            status: EntryStatus::Pending,
            metadata: None,
        }
    }
}

/// A shared, key-indexed map of agent outputs.
///
/// Keys are agent ids plus pseudo-keys like `"<agentId>_plan"` (manager's
/// delegation plan) and `"<agentId>_synthesis"` (manager's final synthesis).
/// Writer-any, single-writer-per-key by convention: each agent only ever
/// writes its own key and its own pseudo-keys.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Blackboard {
    entries: BTreeMap<String, BlackboardEntry>,
}

impl Blackboard {
    /// An empty blackboard.
    pub fn new() -> Self {
        Self::default()
    }

    /// Write (or overwrite) an entry.
    pub fn set(&mut self, key: impl Into<String>, entry: BlackboardEntry) {
        self.entries.insert(key.into(), entry);
    }

    /// Read the last committed value for a key.
    pub fn get(&self, key: &str) -> Option<&BlackboardEntry> {
        self.entries.get(key)
    }

    /// Update just the status of an existing (or newly pending) entry.
    pub fn set_status(&mut self, key: &str, status: EntryStatus, timestamp: u64) {
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.status = status;
                entry.timestamp = timestamp;
            }
            None => {
                let mut entry = BlackboardEntry::new(serde_json::Value::Null, timestamp);
                entry.status = status;
                self.entries.insert(key.to_string(), entry);
            }
        }
    }

    /// Iterate all entries, keyed by their blackboard key.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &BlackboardEntry)> {
        self.entries.iter()
    }
}
