//! Wire messages exchanged between nodes.
//!
//! Every variant carries the sender's [`NodeId`] and the [`UnitId`] of the
//! consensus or gossip unit it belongs to. The communicator serializes these
//! with bincode; nothing in here knows about sockets or framing.

use crate::gossip::{Digest, GossipRecord, SuspectVector};
use crate::identity::{NodeId, UnitId};
use crate::proposal::{Proposal, ProposalId};
use serde::{Deserialize, Serialize};

/// Tagged union of all messages crossing node boundaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProtocolMessage {
    /// Phase one of two-phase commit: the leader asks an acceptor to vote.
    SolicitConsensus {
        from: NodeId,
        unit: UnitId,
        proposal: Proposal,
    },
    /// An acceptor's vote on a solicited proposal.
    ConsensusAccept {
        from: NodeId,
        unit: UnitId,
        proposal_id: ProposalId,
        accepted: bool,
    },
    /// Phase two: the leader's commit/abort decision broadcast.
    CommitRequest {
        from: NodeId,
        unit: UnitId,
        proposal_id: ProposalId,
        commit: bool,
    },
    /// Anti-entropy pull: "send me whatever is newer than this digest."
    ReconciliationRequest {
        from: NodeId,
        unit: UnitId,
        digest: Digest,
    },
    /// Anti-entropy push: the records the requester was missing or stale on.
    ReconciliationResponse {
        from: NodeId,
        unit: UnitId,
        records: Vec<GossipRecord>,
    },
    /// Indirect failure detection: one node's suspect vector.
    SuspectExchange {
        from: NodeId,
        unit: UnitId,
        vector: SuspectVector,
    },
}

impl ProtocolMessage {
    pub fn sender(&self) -> &NodeId {
        match self {
            Self::SolicitConsensus { from, .. }
            | Self::ConsensusAccept { from, .. }
            | Self::CommitRequest { from, .. }
            | Self::ReconciliationRequest { from, .. }
            | Self::ReconciliationResponse { from, .. }
            | Self::SuspectExchange { from, .. } => from,
        }
    }

    pub fn unit(&self) -> &UnitId {
        match self {
            Self::SolicitConsensus { unit, .. }
            | Self::ConsensusAccept { unit, .. }
            | Self::CommitRequest { unit, .. }
            | Self::ReconciliationRequest { unit, .. }
            | Self::ReconciliationResponse { unit, .. }
            | Self::SuspectExchange { unit, .. } => unit,
        }
    }
}
