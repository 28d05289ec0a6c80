//! Peer addressing and transport metrics.

use lattice_types::NodeId;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

/// Static node-to-address map seeded from configuration. Membership changes
/// (gossip's self-organizing participant discovery) happen above this layer;
/// the transport only needs addresses for nodes it is told to reach.
#[derive(Debug, Clone, Default)]
pub struct PeerTable {
    peers: HashMap<NodeId, SocketAddr>,
}

impl PeerTable {
    pub fn new(peers: HashMap<NodeId, SocketAddr>) -> Self {
        Self { peers }
    }

    pub fn address_of(&self, node: &NodeId) -> Option<SocketAddr> {
        self.peers.get(node).copied()
    }

    pub fn insert(&mut self, node: NodeId, addr: SocketAddr) {
        self.peers.insert(node, addr);
    }

    pub fn nodes(&self) -> impl Iterator<Item = &NodeId> {
        self.peers.keys()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

/// Communicator counters, relaxed ordering.
#[derive(Debug, Default)]
pub struct TransportMetrics {
    /// Messages handed to a socket.
    pub remote_sends: AtomicU64,
    /// Messages short-circuited to the local bus.
    pub local_deliveries: AtomicU64,
    /// Sends dropped after a connection or write failure.
    pub send_failures: AtomicU64,
    /// Frames received and published inbound.
    pub frames_received: AtomicU64,
    /// Bytes written to sockets, framing included.
    pub bytes_sent: AtomicU64,
}

impl TransportMetrics {
    pub fn record_remote_send(&self, bytes: usize) {
        self.remote_sends.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_local_delivery(&self) {
        self.local_deliveries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_send_failure(&self) {
        self.send_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frame_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }
}
