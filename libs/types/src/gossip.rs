//! Gossip data model: versioned facts, digests, and suspect vectors.

use crate::identity::NodeId;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Key of a gossiped fact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GossipKey(String);

impl GossipKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GossipKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GossipKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for GossipKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A versioned key-value fact. Reconciliation is last-writer-wins by
/// `timestamp_ms`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GossipRecord {
    pub key: GossipKey,
    pub value: Bytes,
    pub timestamp_ms: u64,
}

impl GossipRecord {
    pub fn new(key: impl Into<GossipKey>, value: Bytes, timestamp_ms: u64) -> Self {
        Self {
            key: key.into(),
            value,
            timestamp_ms,
        }
    }
}

/// Version summary of a repository: key to timestamp, no values.
///
/// A key absent from the digest is the "no entry" sentinel; the peer holding
/// that key always wins reconciliation for it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Digest {
    versions: HashMap<GossipKey, u64>,
}

impl Digest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: GossipKey, timestamp_ms: u64) {
        self.versions.insert(key, timestamp_ms);
    }

    pub fn version_of(&self, key: &GossipKey) -> Option<u64> {
        self.versions.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&GossipKey, u64)> {
        self.versions.iter().map(|(k, v)| (k, *v))
    }
}

/// Liveness estimate for one peer: wall-clock time of the last direct or
/// indirect update about it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GossipInformation {
    pub last_update_ms: u64,
}

impl GossipInformation {
    pub fn at(last_update_ms: u64) -> Self {
        Self { last_update_ms }
    }

    /// Real time since the last update, converted to whole gossip cycles.
    pub fn elapsed_cycles(&self, now_ms: u64, interval_ms: u64) -> u64 {
        now_ms.saturating_sub(self.last_update_ms) / interval_ms.max(1)
    }
}

/// Per-node liveness estimates, merged across peers to detect failures
/// without direct heartbeats.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuspectVector {
    entries: HashMap<NodeId, GossipInformation>,
}

impl SuspectVector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `node` was heard from at `now_ms`, keeping the freshest
    /// timestamp seen so far.
    pub fn observe(&mut self, node: NodeId, now_ms: u64) {
        let entry = self
            .entries
            .entry(node)
            .or_insert(GossipInformation { last_update_ms: 0 });
        if now_ms > entry.last_update_ms {
            entry.last_update_ms = now_ms;
        }
    }

    /// Merge a peer's vector: adopt entries we lack and entries fresher than
    /// our own.
    pub fn merge(&mut self, other: &SuspectVector) {
        for (node, info) in &other.entries {
            self.observe(node.clone(), info.last_update_ms);
        }
    }

    pub fn get(&self, node: &NodeId) -> Option<GossipInformation> {
        self.entries.get(node).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, GossipInformation)> {
        self.entries.iter().map(|(k, v)| (k, *v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
