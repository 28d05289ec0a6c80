//! Two-Phase-Commit Consensus
//!
//! One [`TwoPcLeader`] drives agreement per consensus unit; a
//! [`TwoPcAcceptor`] on every participating node answers solicitations.
//! Both are ordinary actors: every protocol step is an event, network legs
//! travel as `SendMessage` through the communicator, and local legs
//! (validation requests, final notifications) go to whatever application
//! actor subscribed to them.
//!
//! ```text
//! app ──ConsensusRequest──► Leader ──Solicit──► Acceptor ──Validate──► app
//!                             ▲                    │                    │
//!                             └────────Accept──────┘◄──────Verdict──────┘
//!                             │
//!                             ├──CommitRequest──► Acceptor ──CommitDecision──► app
//!                             └──ConsensusReached──► app
//! ```
//!
//! The commit decision is the unanimous AND of all acceptor votes; one
//! reject aborts the round. Duplicate and late votes are ignored, and a
//! round that outlives its deadline is force-decided as abort on the next
//! tick, so a silent acceptor cannot stall the unit forever.

pub mod acceptor;
pub mod error;
pub mod leader;

pub use acceptor::TwoPcAcceptor;
pub use error::{ConsensusError, Result};
pub use leader::TwoPcLeader;
