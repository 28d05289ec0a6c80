//! In-process events and the event-kind hierarchy.
//!
//! [`Event`] is the tagged union flowing through ring channels. Subscription
//! matching on the bus goes by [`EventKind`]: exact kind first, then up the
//! [`EventKind::parent`] table so a subscriber registered for a supertype
//! (e.g. [`EventKind::Protocol`]) receives every subtype. The hierarchy is an
//! explicit table rather than runtime type inspection, so the fallback order
//! is fixed: nearest registered ancestor wins and at most one fallback match
//! is ever taken.

use crate::gossip::GossipRecord;
use crate::identity::{NodeId, UnitId};
use crate::message::ProtocolMessage;
use crate::proposal::{Proposal, ProposalId};

/// Outbound network request: ask the communicator to deliver `message` to
/// each target node.
#[derive(Debug, Clone, PartialEq)]
pub struct SendMessageEvent {
    pub targets: Vec<NodeId>,
    pub message: ProtocolMessage,
}

/// Everything that can flow through an actor mailbox.
///
/// Events are immutable once published; consumers receive clones, so variant
/// payloads use cheaply-cloneable types (`Bytes`, small structs).
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A deserialized message that arrived from the network.
    Protocol(ProtocolMessage),
    /// Request to send a message out through the communicator.
    SendMessage(SendMessageEvent),
    /// Application asks the local leader to drive agreement on a proposal.
    ConsensusRequest { unit: UnitId, proposal: Proposal },
    /// Leader's terminal notification: the round decided.
    ConsensusReached {
        unit: UnitId,
        proposal: Proposal,
        committed: bool,
    },
    /// Acceptor asks the application to validate a solicited proposal.
    ValidateProposal { unit: UnitId, proposal: Proposal },
    /// Application's validity verdict, routed back to the acceptor.
    ProposalVerdict {
        unit: UnitId,
        proposal_id: ProposalId,
        accepted: bool,
    },
    /// Acceptor's final notification: commit or abort this proposal.
    CommitDecision {
        unit: UnitId,
        proposal: Proposal,
        commit: bool,
    },
    /// Application upsert into the local gossip repository.
    PublishFact(GossipRecord),
    /// Periodic timer pulse driving gossip cadence and consensus deadlines.
    Tick { at_ms: u64 },
}

/// Flat tag for every event variant, plus the two supertypes used for
/// widened subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Root of the hierarchy; subscribing to it receives everything.
    Any,
    /// Supertype of every network-originated message kind.
    Protocol,
    SolicitConsensus,
    ConsensusAccept,
    CommitRequest,
    ReconciliationRequest,
    ReconciliationResponse,
    SuspectExchange,
    SendMessage,
    ConsensusRequest,
    ConsensusReached,
    ValidateProposal,
    ProposalVerdict,
    CommitDecision,
    PublishFact,
    Tick,
}

impl EventKind {
    /// One step up the kind hierarchy; `None` at the root.
    pub fn parent(self) -> Option<EventKind> {
        use EventKind::*;
        match self {
            Any => None,
            SolicitConsensus | ConsensusAccept | CommitRequest | ReconciliationRequest
            | ReconciliationResponse | SuspectExchange => Some(Protocol),
            Protocol | SendMessage | ConsensusRequest | ConsensusReached | ValidateProposal
            | ProposalVerdict | CommitDecision | PublishFact | Tick => Some(Any),
        }
    }

    /// The kind itself followed by its ancestors, nearest first.
    pub fn hierarchy(self) -> impl Iterator<Item = EventKind> {
        std::iter::successors(Some(self), |k| k.parent())
    }
}

impl Event {
    /// The exact (most specific) kind of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Protocol(msg) => match msg {
                ProtocolMessage::SolicitConsensus { .. } => EventKind::SolicitConsensus,
                ProtocolMessage::ConsensusAccept { .. } => EventKind::ConsensusAccept,
                ProtocolMessage::CommitRequest { .. } => EventKind::CommitRequest,
                ProtocolMessage::ReconciliationRequest { .. } => EventKind::ReconciliationRequest,
                ProtocolMessage::ReconciliationResponse { .. } => {
                    EventKind::ReconciliationResponse
                }
                ProtocolMessage::SuspectExchange { .. } => EventKind::SuspectExchange,
            },
            Event::SendMessage(_) => EventKind::SendMessage,
            Event::ConsensusRequest { .. } => EventKind::ConsensusRequest,
            Event::ConsensusReached { .. } => EventKind::ConsensusReached,
            Event::ValidateProposal { .. } => EventKind::ValidateProposal,
            Event::ProposalVerdict { .. } => EventKind::ProposalVerdict,
            Event::CommitDecision { .. } => EventKind::CommitDecision,
            Event::PublishFact(_) => EventKind::PublishFact,
            Event::Tick { .. } => EventKind::Tick,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gossip::Digest;

    #[test]
    fn protocol_kinds_roll_up_to_protocol() {
        let event = Event::Protocol(ProtocolMessage::ReconciliationRequest {
            from: NodeId::new("n1"),
            unit: UnitId::new("u"),
            digest: Digest::new(),
        });
        assert_eq!(event.kind(), EventKind::ReconciliationRequest);
        assert_eq!(event.kind().parent(), Some(EventKind::Protocol));
        assert_eq!(EventKind::Protocol.parent(), Some(EventKind::Any));
    }

    #[test]
    fn hierarchy_terminates_at_root() {
        let chain: Vec<_> = EventKind::SuspectExchange.hierarchy().collect();
        assert_eq!(
            chain,
            vec![EventKind::SuspectExchange, EventKind::Protocol, EventKind::Any]
        );
    }

    #[test]
    fn tick_is_a_direct_child_of_any() {
        assert_eq!(EventKind::Tick.parent(), Some(EventKind::Any));
        assert_eq!(Event::Tick { at_ms: 7 }.kind(), EventKind::Tick);
    }
}
