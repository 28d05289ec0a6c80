//! Proposals: the unit of agreement in a consensus round.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

/// Unique proposal identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProposalId(Uuid);

impl ProposalId {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for ProposalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "proposal-{}", self.0.simple())
    }
}

/// Opaque unit of agreement, typically a mutation batch.
///
/// Identity and hashing go by [`ProposalId`] only; the payload is not
/// inspected by the consensus layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposal {
    id: ProposalId,
    payload: Bytes,
}

impl Proposal {
    pub fn new(payload: Bytes) -> Self {
        Self {
            id: ProposalId::new(),
            payload,
        }
    }

    pub fn with_id(id: ProposalId, payload: Bytes) -> Self {
        Self { id, payload }
    }

    pub fn id(&self) -> ProposalId {
        self.id
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }
}

impl PartialEq for Proposal {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Proposal {}

impl Hash for Proposal {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
