//! Leader side of two-phase commit.

use crate::error::ConsensusError;
use lattice_runtime::{Actor, ActorContext, ProcessResult};
use lattice_types::{
    epoch_ms, identities, ActorIdentity, Event, EventKind, NodeId, Proposal, ProposalId,
    ProtocolMessage, SendMessageEvent, UnitId,
};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, trace, warn};

/// Bookkeeping for one in-flight proposal.
struct Round {
    proposal: Proposal,
    /// Acceptors that have not voted yet.
    pending: HashSet<NodeId>,
    /// AND-accumulated votes; starts true, one reject flips it for good.
    decision: bool,
    opened_at_ms: u64,
}

/// Drives `ConsensusRequest` events to a commit/abort decision across the
/// configured acceptor set.
///
/// State machine per proposal: `Idle → AwaitingVotes → Decided`. A round
/// enters `AwaitingVotes` when solicitations go out, collects one vote per
/// pending acceptor, and decides when the pending set empties or the round
/// deadline passes (deciding abort). Terminal work is a `CommitRequest`
/// broadcast plus a local `ConsensusReached` notification.
pub struct TwoPcLeader {
    identity: ActorIdentity,
    node_id: NodeId,
    unit: UnitId,
    acceptors: Vec<NodeId>,
    rounds: HashMap<ProposalId, Round>,
    round_timeout_ms: u64,
}

impl TwoPcLeader {
    pub fn new(
        node_id: NodeId,
        unit: UnitId,
        acceptors: Vec<NodeId>,
        round_timeout_ms: u64,
    ) -> Self {
        Self {
            identity: identities::TWO_PC_LEADER.clone(),
            node_id,
            unit,
            acceptors,
            rounds: HashMap::new(),
            round_timeout_ms,
        }
    }

    /// Number of rounds currently awaiting votes.
    pub fn open_rounds(&self) -> usize {
        self.rounds.len()
    }

    fn open_round(&mut self, ctx: &ActorContext, proposal: Proposal) -> ProcessResult {
        let id = proposal.id();
        if self.rounds.contains_key(&id) {
            return Err(Box::new(ConsensusError::DuplicateRound { proposal: id }));
        }
        let pending: HashSet<NodeId> = self.acceptors.iter().cloned().collect();
        info!(proposal = %id, acceptors = pending.len(), "soliciting consensus");
        self.rounds.insert(
            id,
            Round {
                proposal: proposal.clone(),
                pending,
                decision: true,
                opened_at_ms: epoch_ms(),
            },
        );
        ctx.publish(Event::SendMessage(SendMessageEvent {
            targets: self.acceptors.clone(),
            message: ProtocolMessage::SolicitConsensus {
                from: self.node_id.clone(),
                unit: self.unit.clone(),
                proposal,
            },
        }))?;
        Ok(())
    }

    fn record_vote(
        &mut self,
        ctx: &ActorContext,
        from: NodeId,
        proposal_id: ProposalId,
        accepted: bool,
    ) -> ProcessResult {
        let Some(round) = self.rounds.get_mut(&proposal_id) else {
            // Late vote after a decision (or a vote for a round this node
            // never opened). Never double-counted.
            warn!(%from, proposal = %proposal_id, "vote for unknown or decided round, ignoring");
            return Ok(());
        };
        if !round.pending.remove(&from) {
            warn!(%from, proposal = %proposal_id, "duplicate vote, ignoring");
            return Ok(());
        }
        // Unanimity: every acceptor must say yes for the round to commit.
        round.decision &= accepted;
        debug!(%from, proposal = %proposal_id, accepted, remaining = round.pending.len(),
               "vote recorded");
        if round.pending.is_empty() {
            let decision = round.decision;
            self.finish(ctx, proposal_id, decision)?;
        }
        Ok(())
    }

    fn expire_rounds(&mut self, ctx: &ActorContext, now_ms: u64) -> ProcessResult {
        let expired: Vec<ProposalId> = self
            .rounds
            .iter()
            .filter(|(_, round)| now_ms.saturating_sub(round.opened_at_ms) >= self.round_timeout_ms)
            .map(|(id, _)| *id)
            .collect();
        for id in expired {
            warn!(proposal = %id, timeout_ms = self.round_timeout_ms,
                  "round deadline exceeded, forcing abort");
            self.finish(ctx, id, false)?;
        }
        Ok(())
    }

    /// Terminal step: broadcast the decision and notify the local
    /// application. Exactly one `CommitRequest` per round.
    fn finish(&mut self, ctx: &ActorContext, proposal_id: ProposalId, commit: bool) -> ProcessResult {
        let Some(round) = self.rounds.remove(&proposal_id) else {
            return Ok(());
        };
        info!(proposal = %proposal_id, commit, "consensus reached");
        ctx.publish(Event::SendMessage(SendMessageEvent {
            targets: self.acceptors.clone(),
            message: ProtocolMessage::CommitRequest {
                from: self.node_id.clone(),
                unit: self.unit.clone(),
                proposal_id,
                commit,
            },
        }))?;
        ctx.publish(Event::ConsensusReached {
            unit: self.unit.clone(),
            proposal: round.proposal,
            committed: commit,
        })?;
        Ok(())
    }
}

impl Actor for TwoPcLeader {
    fn identity(&self) -> ActorIdentity {
        self.identity.clone()
    }

    fn subscriptions(&self) -> Vec<EventKind> {
        vec![
            EventKind::ConsensusRequest,
            EventKind::ConsensusAccept,
            EventKind::Tick,
        ]
    }

    fn process(&mut self, ctx: &ActorContext, event: Event) -> ProcessResult {
        match event {
            Event::ConsensusRequest { unit, proposal } if unit == self.unit => {
                self.open_round(ctx, proposal)
            }
            Event::Protocol(ProtocolMessage::ConsensusAccept {
                from,
                unit,
                proposal_id,
                accepted,
            }) if unit == self.unit => self.record_vote(ctx, from, proposal_id, accepted),
            Event::Tick { at_ms } => self.expire_rounds(ctx, at_ms),
            other => {
                trace!(kind = ?other.kind(), "leader ignoring event");
                Ok(())
            }
        }
    }
}
