//! Reconciliation driver for the fact repository.

use crate::repository::GossipRepository;
use lattice_runtime::{Actor, ActorContext, ProcessResult};
use lattice_types::{
    epoch_ms, identities, ActorIdentity, Event, EventKind, GossipRecord, NodeId, ProtocolMessage,
    SendMessageEvent, UnitId,
};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, trace};

/// Read-only snapshot of the repository, refreshed by the disseminator
/// after every mutation. Gives operators and tests a view without locking
/// the actor-owned repository itself.
#[derive(Clone, Default)]
pub struct RepositoryView(Arc<RwLock<GossipRepository>>);

impl RepositoryView {
    pub fn snapshot(&self) -> GossipRepository {
        self.0.read().clone()
    }

    pub fn len(&self) -> usize {
        self.0.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.read().is_empty()
    }
}

/// Owns the fact repository and reconciles it with peers.
///
/// Each tick: digest out to every known participant. Each inbound request:
/// learn the sender, answer with what it lacks. Each inbound response:
/// adopt records that are newer than local state (last-writer-wins; ties
/// keep local). Application writes arrive as `PublishFact` events and go
/// through the same last-writer-wins gate.
pub struct Disseminator {
    identity: ActorIdentity,
    node_id: NodeId,
    unit: UnitId,
    repo: GossipRepository,
    /// Known reconciliation partners; grows on inbound requests.
    participants: HashSet<NodeId>,
    view: RepositoryView,
}

impl Disseminator {
    pub fn new(node_id: NodeId, unit: UnitId, seed_participants: Vec<NodeId>) -> Self {
        Self {
            identity: identities::DISSEMINATOR.clone(),
            node_id,
            unit,
            repo: GossipRepository::new(),
            participants: seed_participants.into_iter().collect(),
            view: RepositoryView::default(),
        }
    }

    /// Shared snapshot handle; clone freely.
    pub fn view(&self) -> RepositoryView {
        self.view.clone()
    }

    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    fn refresh_view(&self) {
        *self.view.0.write() = self.repo.clone();
    }

    /// Adopt `incoming` unless local state is at least as new.
    fn apply_lww(&mut self, incoming: GossipRecord) -> bool {
        let adopt = match self.repo.get(&incoming.key) {
            Some(local) => local.timestamp_ms < incoming.timestamp_ms,
            None => true,
        };
        if adopt {
            trace!(key = %incoming.key, timestamp_ms = incoming.timestamp_ms, "record adopted");
            self.repo.update(incoming);
        }
        adopt
    }

    fn on_tick(&mut self, ctx: &ActorContext) -> ProcessResult {
        if self.participants.is_empty() {
            trace!("no participants, skipping reconciliation");
            return Ok(());
        }
        let digest = self.repo.make_digest();
        debug!(participants = self.participants.len(), keys = digest.len(),
               "soliciting reconciliation");
        ctx.publish(Event::SendMessage(SendMessageEvent {
            targets: self.participants.iter().cloned().collect(),
            message: ProtocolMessage::ReconciliationRequest {
                from: self.node_id.clone(),
                unit: self.unit.clone(),
                digest,
            },
        }))?;
        Ok(())
    }

    fn on_request(
        &mut self,
        ctx: &ActorContext,
        from: NodeId,
        digest: lattice_types::Digest,
    ) -> ProcessResult {
        // Self-organizing membership: an unknown solicitor becomes a
        // participant.
        if from != self.node_id && self.participants.insert(from.clone()) {
            info!(%from, "learned participant from reconciliation request");
        }
        let records = self.repo.process_digest(&digest);
        if records.is_empty() {
            trace!(%from, "peer is up to date");
            return Ok(());
        }
        debug!(%from, records = records.len(), "answering reconciliation request");
        ctx.publish(Event::SendMessage(SendMessageEvent {
            targets: vec![from],
            message: ProtocolMessage::ReconciliationResponse {
                from: self.node_id.clone(),
                unit: self.unit.clone(),
                records,
            },
        }))?;
        Ok(())
    }

    fn on_response(&mut self, from: NodeId, records: Vec<GossipRecord>) -> ProcessResult {
        let total = records.len();
        let mut adopted = 0usize;
        for record in records {
            if self.apply_lww(record) {
                adopted += 1;
            }
        }
        if adopted > 0 {
            self.refresh_view();
        }
        debug!(%from, adopted, total, "reconciliation response applied");
        Ok(())
    }

    fn on_publish_fact(&mut self, record: GossipRecord) -> ProcessResult {
        let mut record = record;
        // An unstamped fact gets the local wall clock.
        if record.timestamp_ms == 0 {
            record.timestamp_ms = epoch_ms();
        }
        if self.apply_lww(record) {
            self.refresh_view();
        }
        Ok(())
    }
}

impl Actor for Disseminator {
    fn identity(&self) -> ActorIdentity {
        self.identity.clone()
    }

    fn subscriptions(&self) -> Vec<EventKind> {
        vec![
            EventKind::ReconciliationRequest,
            EventKind::ReconciliationResponse,
            EventKind::PublishFact,
            EventKind::Tick,
        ]
    }

    fn process(&mut self, ctx: &ActorContext, event: Event) -> ProcessResult {
        match event {
            Event::Tick { .. } => self.on_tick(ctx),
            Event::Protocol(ProtocolMessage::ReconciliationRequest { from, unit, digest })
                if unit == self.unit =>
            {
                self.on_request(ctx, from, digest)
            }
            Event::Protocol(ProtocolMessage::ReconciliationResponse { from, unit, records })
                if unit == self.unit =>
            {
                self.on_response(from, records)
            }
            Event::PublishFact(record) => self.on_publish_fact(record),
            other => {
                trace!(kind = ?other.kind(), "disseminator ignoring event");
                Ok(())
            }
        }
    }
}
