//! Indirect failure detection via gossiped suspect vectors.

use lattice_runtime::{Actor, ActorContext, ProcessResult};
use lattice_types::{
    epoch_ms, identities, ActorIdentity, Event, EventKind, NodeId, ProtocolMessage,
    SendMessageEvent, SuspectVector, UnitId,
};
use parking_lot::RwLock;
use rand::Rng;
use std::sync::Arc;
use tracing::{debug, trace};

/// Read-only snapshot of the local suspect vector, refreshed on every tick
/// and every merge. Higher-level liveness policy reads this and thresholds
/// elapsed cycles; the detector itself never declares anyone dead.
#[derive(Clone, Default)]
pub struct SuspectView(Arc<RwLock<SuspectVector>>);

impl SuspectView {
    pub fn snapshot(&self) -> SuspectVector {
        self.0.read().clone()
    }

    /// Whole gossip cycles since `node` was last heard from, directly or
    /// transitively. `None` for nodes never heard of.
    pub fn elapsed_cycles(&self, node: &NodeId, now_ms: u64, interval_ms: u64) -> Option<u64> {
        self.0
            .read()
            .get(node)
            .map(|info| info.elapsed_cycles(now_ms, interval_ms))
    }

    /// Nodes whose elapsed cycles meet or exceed `cleanup_cycles`.
    pub fn suspects(&self, now_ms: u64, interval_ms: u64, cleanup_cycles: u64) -> Vec<NodeId> {
        self.0
            .read()
            .iter()
            .filter(|(_, info)| info.elapsed_cycles(now_ms, interval_ms) >= cleanup_cycles)
            .map(|(node, _)| node.clone())
            .collect()
    }
}

/// Maintains one liveness estimate per known peer and spreads its view to
/// one uniformly-random neighbor per tick.
pub struct FailureDetector {
    identity: ActorIdentity,
    node_id: NodeId,
    unit: UnitId,
    peers: Vec<NodeId>,
    vector: SuspectVector,
    view: SuspectView,
}

impl FailureDetector {
    pub fn new(node_id: NodeId, unit: UnitId, peers: Vec<NodeId>) -> Self {
        let peers: Vec<NodeId> = peers.into_iter().filter(|p| *p != node_id).collect();
        Self {
            identity: identities::FAILURE_DETECTOR.clone(),
            node_id,
            unit,
            peers,
            vector: SuspectVector::new(),
            view: SuspectView::default(),
        }
    }

    /// Shared snapshot handle; clone freely.
    pub fn view(&self) -> SuspectView {
        self.view.clone()
    }

    fn refresh_view(&self) {
        *self.view.0.write() = self.vector.clone();
    }

    fn on_tick(&mut self, ctx: &ActorContext, at_ms: u64) -> ProcessResult {
        // Our own entry is always fresh; peers learn it transitively.
        self.vector.observe(self.node_id.clone(), at_ms);
        self.refresh_view();
        if self.peers.is_empty() {
            trace!("no peers, skipping suspect exchange");
            return Ok(());
        }
        // Bounded fan-out: one random neighbor per tick still spreads the
        // matrix in O(log N) ticks with high probability.
        let target = self.peers[rand::thread_rng().gen_range(0..self.peers.len())].clone();
        trace!(%target, entries = self.vector.len(), "exchanging suspect vector");
        ctx.publish(Event::SendMessage(SendMessageEvent {
            targets: vec![target],
            message: ProtocolMessage::SuspectExchange {
                from: self.node_id.clone(),
                unit: self.unit.clone(),
                vector: self.vector.clone(),
            },
        }))?;
        Ok(())
    }

    fn on_exchange(&mut self, from: NodeId, vector: SuspectVector) -> ProcessResult {
        // Hearing from the sender at all is itself evidence of liveness.
        self.vector.observe(from.clone(), epoch_ms());
        self.vector.merge(&vector);
        self.refresh_view();
        debug!(%from, entries = self.vector.len(), "suspect vector merged");
        Ok(())
    }
}

impl Actor for FailureDetector {
    fn identity(&self) -> ActorIdentity {
        self.identity.clone()
    }

    fn subscriptions(&self) -> Vec<EventKind> {
        vec![EventKind::SuspectExchange, EventKind::Tick]
    }

    fn process(&mut self, ctx: &ActorContext, event: Event) -> ProcessResult {
        match event {
            Event::Tick { at_ms } => self.on_tick(ctx, at_ms),
            Event::Protocol(ProtocolMessage::SuspectExchange { from, unit, vector })
                if unit == self.unit =>
            {
                self.on_exchange(from, vector)
            }
            other => {
                trace!(kind = ?other.kind(), "failure detector ignoring event");
                Ok(())
            }
        }
    }
}
