//! LatticeDB Actor Runtime
//!
//! Intra-node message passing built on three pieces:
//!
//! - [`RingChannel`]: a fixed-capacity, lock-free circular buffer of events.
//!   Producers claim slots with a compare-and-swap on a shared cursor and
//!   never overwrite a slot until every registered consumer has moved past
//!   it; blocked accessors retry per their identity's wait strategy.
//! - [`EventBus`]: the process-wide directory mapping actor identities to
//!   mailboxes and event kinds to subscriber sets, with supertype fallback
//!   matching on the kind hierarchy.
//! - [`Actor`]/[`spawn`]: one dedicated OS thread per actor running a
//!   consume loop. Actors share no state; everything crosses the bus.
//!
//! ```text
//! ┌──────────┐ publish  ┌─────────────────────┐ ring publish ┌──────────┐
//! │ Actor A  │─────────►│      EventBus       │─────────────►│ mailbox  │
//! │ (thread) │          │ kind → subscribers  │              │ of B     │
//! └──────────┘          │ actor → RingChannel │              └────┬─────┘
//!                       └─────────────────────┘      consume loop │
//!                                                           ┌─────▼────┐
//!                                                           │ Actor B  │
//!                                                           │ (thread) │
//!                                                           └──────────┘
//! ```

pub mod actor;
pub mod bus;
pub mod error;
pub mod ring;
pub mod ticker;
pub mod wait;

pub use actor::{spawn, Actor, ActorContext, ActorHandle, ActorState, ProcessResult};
pub use bus::{BusMetrics, EventBus};
pub use error::{Result, RuntimeError};
pub use ring::{ChannelMetrics, RingChannel};
pub use ticker::Ticker;
pub use wait::WaitStrategyExt;

/// Default mailbox capacity when a service has no override configured.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 128;
