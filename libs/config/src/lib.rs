//! LatticeDB Node Configuration
//!
//! TOML-backed configuration for a node process: identity and listen
//! address, the static peer list, runtime channel sizing, consensus round
//! parameters, and gossip cadence. Every field has a serde default so a
//! minimal file (or none of a section) still yields a runnable config, and
//! [`NodeConfig::validate`] catches the mistakes serde cannot (capacities
//! that are not powers of two, unparseable socket addresses, zero
//! intervals).
//!
//! Paths given to [`NodeConfig::load`] go through shell expansion, so
//! `~/lattice.toml` and `$LATTICE_HOME/node.toml` both work.

mod error;

pub use error::{ConfigError, Result};

use lattice_types::{NodeId, UnitId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use tracing::debug;

/// Top-level node configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub node: NodeSection,
    #[serde(default)]
    pub peers: Vec<PeerSection>,
    #[serde(default)]
    pub runtime: RuntimeSection,
    #[serde(default)]
    pub consensus: ConsensusSection,
    #[serde(default)]
    pub gossip: GossipSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSection {
    /// Cluster-unique node name.
    #[serde(default = "default_node_id")]
    pub id: String,
    /// Listen address for inbound peer connections.
    #[serde(default = "default_listen")]
    pub listen: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerSection {
    pub id: String,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeSection {
    /// Mailbox ring capacity; must be a power of two.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusSection {
    /// Consensus unit this node participates in.
    #[serde(default = "default_unit")]
    pub unit: String,
    /// Acceptor node ids for rounds this node leads. Empty means this node
    /// leads no rounds.
    #[serde(default)]
    pub acceptors: Vec<String>,
    /// Deadline after which an undecided round is force-aborted.
    #[serde(default = "default_round_timeout_ms")]
    pub round_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GossipSection {
    /// Gossip unit this node reconciles within.
    #[serde(default = "default_unit")]
    pub unit: String,
    /// Tick interval driving reconciliation and suspect exchange.
    #[serde(default = "default_gossip_interval_ms")]
    pub interval_ms: u64,
    /// Elapsed-cycle threshold above which a peer counts as suspect.
    #[serde(default = "default_cleanup_cycles")]
    pub cleanup_cycles: u64,
}

fn default_node_id() -> String {
    "node-0".to_string()
}

fn default_listen() -> String {
    "127.0.0.1:7400".to_string()
}

fn default_channel_capacity() -> usize {
    128
}

fn default_unit() -> String {
    "default".to_string()
}

fn default_round_timeout_ms() -> u64 {
    5_000
}

fn default_gossip_interval_ms() -> u64 {
    1_000
}

fn default_cleanup_cycles() -> u64 {
    30
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            id: default_node_id(),
            listen: default_listen(),
        }
    }
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl Default for ConsensusSection {
    fn default() -> Self {
        Self {
            unit: default_unit(),
            acceptors: Vec::new(),
            round_timeout_ms: default_round_timeout_ms(),
        }
    }
}

impl Default for GossipSection {
    fn default() -> Self {
        Self {
            unit: default_unit(),
            interval_ms: default_gossip_interval_ms(),
            cleanup_cycles: default_cleanup_cycles(),
        }
    }
}

impl NodeConfig {
    /// Load and validate a config file. The path may contain `~` or
    /// environment variables.
    pub fn load(path: impl AsRef<str>) -> Result<Self> {
        let expanded = shellexpand::full(path.as_ref())
            .map_err(|e| ConfigError::invalid("path", e.to_string()))?;
        let path = Path::new(expanded.as_ref());
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml(&raw)?;
        debug!(path = %path.display(), node = %config.node.id, "configuration loaded");
        Ok(config)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(raw: &str) -> Result<Self> {
        let config: NodeConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.node.id.trim().is_empty() {
            return Err(ConfigError::invalid("node.id", "must not be empty"));
        }
        if !self.runtime.channel_capacity.is_power_of_two() || self.runtime.channel_capacity == 0 {
            return Err(ConfigError::invalid(
                "runtime.channel_capacity",
                format!("{} is not a power of two", self.runtime.channel_capacity),
            ));
        }
        if self.gossip.interval_ms == 0 {
            return Err(ConfigError::invalid("gossip.interval_ms", "must be positive"));
        }
        if self.consensus.round_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "consensus.round_timeout_ms",
                "must be positive",
            ));
        }
        self.listen_addr()?;
        self.peer_table()?;
        for peer in &self.peers {
            if peer.id == self.node.id {
                return Err(ConfigError::invalid(
                    "peers",
                    format!("peer list contains this node ('{}')", peer.id),
                ));
            }
        }
        Ok(())
    }

    pub fn node_id(&self) -> NodeId {
        NodeId::new(self.node.id.clone())
    }

    pub fn consensus_unit(&self) -> UnitId {
        UnitId::new(self.consensus.unit.clone())
    }

    pub fn gossip_unit(&self) -> UnitId {
        UnitId::new(self.gossip.unit.clone())
    }

    /// Parsed listen address, with environment expansion applied.
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        parse_addr("node.listen", &self.node.listen)
    }

    /// Parsed peer map: node id to socket address.
    pub fn peer_table(&self) -> Result<HashMap<NodeId, SocketAddr>> {
        let mut table = HashMap::with_capacity(self.peers.len());
        for peer in &self.peers {
            if peer.id.trim().is_empty() {
                return Err(ConfigError::invalid("peers", "peer id must not be empty"));
            }
            let addr = parse_addr("peers.address", &peer.address)?;
            table.insert(NodeId::new(peer.id.clone()), addr);
        }
        Ok(table)
    }

    /// Peer node ids in declaration order.
    pub fn peer_ids(&self) -> Vec<NodeId> {
        self.peers.iter().map(|p| NodeId::new(p.id.clone())).collect()
    }

    /// Acceptor set for rounds this node leads.
    pub fn acceptor_ids(&self) -> Vec<NodeId> {
        self.consensus
            .acceptors
            .iter()
            .map(|a| NodeId::new(a.clone()))
            .collect()
    }
}

fn parse_addr(field: &'static str, value: &str) -> Result<SocketAddr> {
    let expanded =
        shellexpand::env(value).map_err(|e| ConfigError::invalid(field, e.to_string()))?;
    expanded
        .parse()
        .map_err(|_| ConfigError::invalid(field, format!("'{expanded}' is not a socket address")))
}
