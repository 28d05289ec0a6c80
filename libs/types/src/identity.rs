//! Actor and node identities.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Retry policy applied while a channel accessor is blocked.
///
/// A producer waiting for a free slot and a consumer waiting for a new event
/// both retry according to the strategy carried by their identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WaitStrategy {
    /// Spin a fixed iteration budget without yielding the core.
    BusySpin,
    /// Park the thread for a short fixed interval between retries.
    #[default]
    SleepBackoff,
    /// Return immediately; the caller coordinates waiting externally
    /// (condition-variable style integration).
    External,
}

/// Immutable identity of a logical component on the event bus.
///
/// Identities are defined once at process start (see [`identities`]) and
/// compared by name only; the wait strategy is a routing-irrelevant tag.
#[derive(Debug, Clone)]
pub struct ActorIdentity {
    name: Arc<str>,
    wait: WaitStrategy,
}

impl ActorIdentity {
    pub fn named(name: impl AsRef<str>, wait: WaitStrategy) -> Self {
        Self {
            name: Arc::from(name.as_ref()),
            wait,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn wait_strategy(&self) -> WaitStrategy {
        self.wait
    }
}

impl PartialEq for ActorIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for ActorIdentity {}

impl Hash for ActorIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl fmt::Display for ActorIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Well-known process actors, fixed at startup.
pub mod identities {
    use super::{ActorIdentity, WaitStrategy};
    use once_cell::sync::Lazy;

    pub static COMMUNICATOR: Lazy<ActorIdentity> =
        Lazy::new(|| ActorIdentity::named("communicator", WaitStrategy::SleepBackoff));
    pub static TWO_PC_LEADER: Lazy<ActorIdentity> =
        Lazy::new(|| ActorIdentity::named("2pc-leader", WaitStrategy::SleepBackoff));
    pub static TWO_PC_ACCEPTOR: Lazy<ActorIdentity> =
        Lazy::new(|| ActorIdentity::named("2pc-acceptor", WaitStrategy::SleepBackoff));
    pub static DISSEMINATOR: Lazy<ActorIdentity> =
        Lazy::new(|| ActorIdentity::named("gossip-disseminator", WaitStrategy::SleepBackoff));
    pub static FAILURE_DETECTOR: Lazy<ActorIdentity> =
        Lazy::new(|| ActorIdentity::named("failure-detector", WaitStrategy::SleepBackoff));
    pub static TICKER: Lazy<ActorIdentity> =
        Lazy::new(|| ActorIdentity::named("ticker", WaitStrategy::SleepBackoff));
}

/// Cluster-wide node identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Identifier of a consensus or gossip unit.
///
/// One leader exists per consensus unit; gossip repositories reconcile only
/// within the same unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId(String);

impl UnitId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
