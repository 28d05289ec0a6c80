//! Acceptor side of two-phase commit.

use crate::error::ConsensusError;
use lattice_runtime::{Actor, ActorContext, ProcessResult};
use lattice_types::{
    identities, ActorIdentity, Event, EventKind, NodeId, Proposal, ProposalId, ProtocolMessage,
    SendMessageEvent, UnitId,
};
use std::collections::HashMap;
use tracing::{debug, trace};

/// The original solicitation, kept so the verdict knows whom to answer and
/// the commit notification can carry the full proposal.
struct Solicitation {
    solicitor: NodeId,
    proposal: Proposal,
}

/// Answers `SolicitConsensus` messages for one consensus unit.
///
/// The acceptor itself has no opinion on validity: it records the
/// solicitation, asks the application via a local `ValidateProposal` event,
/// and relays the application's `ProposalVerdict` back to the solicitor as a
/// vote. The final `CommitRequest` is forwarded to the application as a
/// `CommitDecision` and clears the entry; no further protocol action.
pub struct TwoPcAcceptor {
    identity: ActorIdentity,
    node_id: NodeId,
    unit: UnitId,
    pending: HashMap<ProposalId, Solicitation>,
}

impl TwoPcAcceptor {
    pub fn new(node_id: NodeId, unit: UnitId) -> Self {
        Self {
            identity: identities::TWO_PC_ACCEPTOR.clone(),
            node_id,
            unit,
            pending: HashMap::new(),
        }
    }

    /// Number of proposals awaiting a verdict or commit.
    pub fn pending_proposals(&self) -> usize {
        self.pending.len()
    }

    fn on_solicit(&mut self, ctx: &ActorContext, from: NodeId, proposal: Proposal) -> ProcessResult {
        debug!(%from, proposal = %proposal.id(), "solicitation received");
        self.pending.insert(
            proposal.id(),
            Solicitation {
                solicitor: from,
                proposal: proposal.clone(),
            },
        );
        ctx.publish(Event::ValidateProposal {
            unit: self.unit.clone(),
            proposal,
        })?;
        Ok(())
    }

    fn on_verdict(
        &mut self,
        ctx: &ActorContext,
        proposal_id: ProposalId,
        accepted: bool,
    ) -> ProcessResult {
        let Some(solicitation) = self.pending.get(&proposal_id) else {
            return Err(Box::new(ConsensusError::UnknownProposal {
                proposal: proposal_id,
            }));
        };
        debug!(proposal = %proposal_id, accepted, solicitor = %solicitation.solicitor,
               "replying with vote");
        ctx.publish(Event::SendMessage(SendMessageEvent {
            targets: vec![solicitation.solicitor.clone()],
            message: ProtocolMessage::ConsensusAccept {
                from: self.node_id.clone(),
                unit: self.unit.clone(),
                proposal_id,
                accepted,
            },
        }))?;
        Ok(())
    }

    fn on_commit(
        &mut self,
        ctx: &ActorContext,
        proposal_id: ProposalId,
        commit: bool,
    ) -> ProcessResult {
        let Some(solicitation) = self.pending.remove(&proposal_id) else {
            // Reachable when a deadline abort is broadcast to an acceptor
            // that never saw the solicitation.
            return Err(Box::new(ConsensusError::UnknownProposal {
                proposal: proposal_id,
            }));
        };
        debug!(proposal = %proposal_id, commit, "commit decision received");
        ctx.publish(Event::CommitDecision {
            unit: self.unit.clone(),
            proposal: solicitation.proposal,
            commit,
        })?;
        Ok(())
    }
}

impl Actor for TwoPcAcceptor {
    fn identity(&self) -> ActorIdentity {
        self.identity.clone()
    }

    fn subscriptions(&self) -> Vec<EventKind> {
        vec![
            EventKind::SolicitConsensus,
            EventKind::CommitRequest,
            EventKind::ProposalVerdict,
        ]
    }

    fn process(&mut self, ctx: &ActorContext, event: Event) -> ProcessResult {
        match event {
            Event::Protocol(ProtocolMessage::SolicitConsensus { from, unit, proposal })
                if unit == self.unit =>
            {
                self.on_solicit(ctx, from, proposal)
            }
            Event::ProposalVerdict {
                unit,
                proposal_id,
                accepted,
            } if unit == self.unit => self.on_verdict(ctx, proposal_id, accepted),
            Event::Protocol(ProtocolMessage::CommitRequest {
                unit, proposal_id, commit, ..
            }) if unit == self.unit => self.on_commit(ctx, proposal_id, commit),
            other => {
                trace!(kind = ?other.kind(), "acceptor ignoring event");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use bytes::Bytes;
    use lattice_runtime::EventBus;
    use lattice_types::WaitStrategy;
    use std::sync::Arc;

    struct Harness {
        bus: Arc<EventBus>,
        ctx: ActorContext,
        probe: ActorIdentity,
        acceptor: TwoPcAcceptor,
    }

    fn harness() -> Harness {
        let bus = Arc::new(EventBus::new());
        let probe = ActorIdentity::named("probe", WaitStrategy::BusySpin);
        bus.register(&probe, 64).expect("register probe");
        bus.register_for_event(EventKind::SendMessage, &probe);
        bus.register_for_event(EventKind::ValidateProposal, &probe);
        bus.register_for_event(EventKind::CommitDecision, &probe);

        let acceptor = TwoPcAcceptor::new(NodeId::new("a1"), UnitId::new("u"));
        let ctx = ActorContext::new(acceptor.identity(), bus.clone());
        Harness {
            bus,
            ctx,
            probe,
            acceptor,
        }
    }

    impl Harness {
        fn drain(&self) -> Vec<Event> {
            let mailbox = self.bus.mailbox(&self.probe).expect("mailbox");
            let mut events = Vec::new();
            while let Some(event) = mailbox.try_consume(&self.probe).expect("consume") {
                events.push(event);
            }
            events
        }

        fn solicit(&mut self, proposal: &Proposal) {
            self.acceptor
                .process(
                    &self.ctx,
                    Event::Protocol(ProtocolMessage::SolicitConsensus {
                        from: NodeId::new("leader"),
                        unit: UnitId::new("u"),
                        proposal: proposal.clone(),
                    }),
                )
                .expect("solicit");
        }
    }

    #[test]
    fn solicitation_asks_application_to_validate() {
        let mut h = harness();
        let proposal = Proposal::new(Bytes::from_static(b"p"));
        h.solicit(&proposal);

        let events = h.drain();
        assert_matches!(
            events.as_slice(),
            [Event::ValidateProposal { proposal: p, .. }] if *p == proposal
        );
        assert_eq!(h.acceptor.pending_proposals(), 1);
    }

    #[test]
    fn verdict_replies_to_original_solicitor() {
        let mut h = harness();
        let proposal = Proposal::new(Bytes::from_static(b"p"));
        h.solicit(&proposal);
        h.drain();

        h.acceptor
            .process(
                &h.ctx,
                Event::ProposalVerdict {
                    unit: UnitId::new("u"),
                    proposal_id: proposal.id(),
                    accepted: true,
                },
            )
            .expect("verdict");

        let events = h.drain();
        assert_matches!(
            events.as_slice(),
            [Event::SendMessage(SendMessageEvent { targets, message: ProtocolMessage::ConsensusAccept { accepted: true, .. } })]
                if targets == &vec![NodeId::new("leader")]
        );
        // The solicitation stays recorded until the commit arrives.
        assert_eq!(h.acceptor.pending_proposals(), 1);
    }

    #[test]
    fn commit_notifies_application_and_clears_state() {
        let mut h = harness();
        let proposal = Proposal::new(Bytes::from_static(b"p"));
        h.solicit(&proposal);
        h.drain();

        h.acceptor
            .process(
                &h.ctx,
                Event::Protocol(ProtocolMessage::CommitRequest {
                    from: NodeId::new("leader"),
                    unit: UnitId::new("u"),
                    proposal_id: proposal.id(),
                    commit: true,
                }),
            )
            .expect("commit");

        let events = h.drain();
        assert_matches!(
            events.as_slice(),
            [Event::CommitDecision { proposal: p, commit: true, .. }] if *p == proposal
        );
        assert_eq!(h.acceptor.pending_proposals(), 0);
    }

    #[test]
    fn verdict_for_unknown_proposal_is_an_error() {
        let mut h = harness();
        let err = h
            .acceptor
            .process(
                &h.ctx,
                Event::ProposalVerdict {
                    unit: UnitId::new("u"),
                    proposal_id: ProposalId::new(),
                    accepted: true,
                },
            )
            .expect_err("must fail");
        assert!(err.to_string().contains("no recorded solicitation"));
        assert!(h.drain().is_empty());
    }

    #[test]
    fn foreign_unit_is_ignored() {
        let mut h = harness();
        let proposal = Proposal::new(Bytes::from_static(b"p"));
        h.acceptor
            .process(
                &h.ctx,
                Event::Protocol(ProtocolMessage::SolicitConsensus {
                    from: NodeId::new("leader"),
                    unit: UnitId::new("other"),
                    proposal,
                }),
            )
            .expect("process");
        assert_eq!(h.acceptor.pending_proposals(), 0);
        assert!(h.drain().is_empty());
    }
}
