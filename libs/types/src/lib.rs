//! Shared Types for LatticeDB
//!
//! Identities, events, and wire messages used by every layer of the node.
//! This crate ONLY defines data: actor identities and their wait strategies,
//! the in-process [`Event`] union flowing on the event bus, the
//! [`ProtocolMessage`] union exchanged between nodes, proposals, and the
//! gossip record/digest/suspect-vector model.
//!
//! Behavior (channels, actors, protocol state machines) lives in the runtime
//! and service crates; keeping the type layer dependency-free of them avoids
//! cycles and keeps wire compatibility reviewable in one place.

pub mod event;
pub mod gossip;
pub mod identity;
pub mod message;
pub mod proposal;
pub mod time;

pub use event::{Event, EventKind, SendMessageEvent};
pub use gossip::{Digest, GossipInformation, GossipKey, GossipRecord, SuspectVector};
pub use identity::{identities, ActorIdentity, NodeId, UnitId, WaitStrategy};
pub use message::ProtocolMessage;
pub use proposal::{Proposal, ProposalId};
pub use time::epoch_ms;
