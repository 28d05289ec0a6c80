//! Consensus error types.

use lattice_types::ProposalId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsensusError {
    /// A verdict or commit referenced a proposal this node holds no state
    /// for (already decided, expired, or never solicited here).
    #[error("no recorded solicitation for {proposal}")]
    UnknownProposal { proposal: ProposalId },

    /// A consensus request arrived for a proposal already in flight.
    #[error("round already open for {proposal}")]
    DuplicateRound { proposal: ProposalId },
}

pub type Result<T> = std::result::Result<T, ConsensusError>;
