//! Runtime error types.

use lattice_types::EventKind;
use thiserror::Error;

/// Errors raised by channels, the bus, and actor lifecycle management.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// An accessor used a channel in the opposite role it registered with.
    /// Roles are asymmetric: a given accessor is producer-only or
    /// consumer-only for a channel's lifetime.
    #[error("accessor '{accessor}' is registered as a {role} on this channel")]
    RoleViolation {
        accessor: String,
        role: &'static str,
    },

    /// Ring capacity must be a non-zero power of two.
    #[error("channel capacity {got} is not a non-zero power of two")]
    InvalidCapacity { got: usize },

    /// A consumer fell behind far enough that its next slot was recycled.
    /// Only possible for consumers registered after publishing began.
    #[error("consumer '{accessor}' overrun: expected sequence {expected}, slot holds {found}")]
    Overrun {
        accessor: String,
        expected: i64,
        found: i64,
    },

    /// A stamped slot held no event. Indicates channel accounting corruption.
    #[error("slot for sequence {sequence} is stamped but empty")]
    CorruptSlot { sequence: i64 },

    /// Direct delivery was requested for an actor with no mailbox.
    #[error("no mailbox registered for actor '{actor}'")]
    MailboxMissing { actor: String },

    /// The OS refused to spawn the actor's thread.
    #[error("failed to spawn thread for actor '{actor}': {source}")]
    SpawnFailed {
        actor: String,
        #[source]
        source: std::io::Error,
    },

    /// An actor did not acknowledge its stop flag within the join deadline.
    #[error("actor '{actor}' did not stop within {timeout_ms}ms")]
    StopTimeout { actor: String, timeout_ms: u64 },

    /// A handler rejected an event kind it subscribed to.
    #[error("actor '{actor}' cannot handle event kind {kind:?}")]
    UnexpectedEvent { actor: String, kind: EventKind },
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
