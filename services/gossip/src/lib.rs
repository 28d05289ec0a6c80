//! Gossip / Anti-Entropy
//!
//! Two independent epidemics run over the same communicator:
//!
//! - The [`Disseminator`] reconciles a repository of versioned key-value
//!   facts with every known participant. Each tick it sends its digest
//!   (key → timestamp, no values) to all participants; each inbound digest
//!   is answered with exactly the records the sender is missing or stale
//!   on. Convergence is asymmetric pull-push: both sides must eventually
//!   solicit each other, which the per-tick broadcast guarantees.
//! - The [`FailureDetector`] exchanges per-node suspect vectors with ONE
//!   uniformly-random peer per tick, merging keep-freshest. Message volume
//!   stays O(1) per node per tick while information spreads epidemically.
//!
//! Membership is self-organizing at this layer: any inbound reconciliation
//! request from an unknown sender adds that sender to the participant list.
//! Neither actor ever declares a peer dead; elapsed-cycle counts are
//! exposed through read-only snapshots for a higher-level policy to
//! threshold.

pub mod disseminator;
pub mod failure;
pub mod repository;

pub use disseminator::{Disseminator, RepositoryView};
pub use failure::{FailureDetector, SuspectView};
pub use repository::GossipRepository;
