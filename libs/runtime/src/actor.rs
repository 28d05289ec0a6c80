//! Actor Framework
//!
//! An actor is a named, single-threaded unit of execution owning one mailbox.
//! [`spawn`] registers the mailbox, applies the actor's declared
//! subscriptions, and launches exactly one dedicated OS thread running the
//! consume loop. Actors never share execution context; all cross-actor state
//! moves as events, so actor structs need no internal locking.
//!
//! Lifecycle is `Created → Running → Stopped` with no intermediate states.
//! Shutdown is cooperative: [`ActorHandle::stop`] raises a flag the loop
//! checks between events and then joins with a bounded deadline, so an
//! in-flight event finishes processing instead of being torn down mid-way.

use crate::bus::EventBus;
use crate::error::{Result, RuntimeError};
use crate::wait::WaitStrategyExt;
use lattice_types::{ActorIdentity, Event, EventKind};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Result of one event-handling step. An `Err` is logged with the actor id
/// and event kind and the loop continues; a single bad event never kills the
/// actor.
pub type ProcessResult = std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// A unit of execution on the bus.
pub trait Actor: Send + 'static {
    /// This actor's fixed identity (also its mailbox key).
    fn identity(&self) -> ActorIdentity;

    /// Event kinds to subscribe to, declared once after mailbox
    /// registration and before the loop starts.
    fn subscriptions(&self) -> Vec<EventKind>;

    /// Hook invoked on the actor thread before the first consume.
    fn on_start(&mut self, _ctx: &ActorContext) {}

    /// Handle one event.
    fn process(&mut self, ctx: &ActorContext, event: Event) -> ProcessResult;
}

/// Bus access handed to an actor; publishes carry the actor's identity as
/// sender.
#[derive(Clone)]
pub struct ActorContext {
    identity: ActorIdentity,
    bus: Arc<EventBus>,
}

impl ActorContext {
    pub fn new(identity: ActorIdentity, bus: Arc<EventBus>) -> Self {
        Self { identity, bus }
    }

    pub fn identity(&self) -> &ActorIdentity {
        &self.identity
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Publish through subscription routing.
    pub fn publish(&self, event: Event) -> Result<()> {
        self.bus.publish(&self.identity, event)
    }

    /// Point-to-point delivery for replies.
    pub fn publish_to(&self, to: &ActorIdentity, event: Event) -> Result<()> {
        self.bus.publish_to(&self.identity, to, event)
    }
}

/// Actor lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorState {
    Created,
    Running,
    Stopped,
}

const STATE_CREATED: u8 = 0;
const STATE_RUNNING: u8 = 1;
const STATE_STOPPED: u8 = 2;

/// Handle to a spawned actor thread.
pub struct ActorHandle {
    identity: ActorIdentity,
    state: Arc<AtomicU8>,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl ActorHandle {
    pub fn identity(&self) -> &ActorIdentity {
        &self.identity
    }

    pub fn state(&self) -> ActorState {
        match self.state.load(Ordering::Acquire) {
            STATE_CREATED => ActorState::Created,
            STATE_RUNNING => ActorState::Running,
            _ => ActorState::Stopped,
        }
    }

    /// Raise the cooperative stop flag and join with a bounded deadline.
    /// On timeout the thread is detached and left to exit on its own; the
    /// error reports the abandonment.
    pub fn stop(mut self, timeout: Duration) -> Result<()> {
        self.stop.store(true, Ordering::Release);
        let deadline = Instant::now() + timeout;
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        while !thread.is_finished() {
            if Instant::now() >= deadline {
                warn!(actor = %self.identity, timeout_ms = timeout.as_millis() as u64,
                      "actor ignored stop flag, detaching");
                return Err(RuntimeError::StopTimeout {
                    actor: self.identity.name().to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                });
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        if thread.join().is_err() {
            // The loop itself never panics; a panic here means a handler
            // unwound straight through it.
            error!(actor = %self.identity, "actor thread panicked");
        }
        self.state.store(STATE_STOPPED, Ordering::Release);
        Ok(())
    }
}

/// Register `actor`'s mailbox and subscriptions on `bus` and launch its
/// dedicated thread.
pub fn spawn<A: Actor>(mut actor: A, bus: Arc<EventBus>, capacity: usize) -> Result<ActorHandle> {
    let identity = actor.identity();
    bus.register(&identity, capacity)?;
    for kind in actor.subscriptions() {
        bus.register_for_event(kind, &identity);
    }
    let mailbox = bus
        .mailbox(&identity)
        .ok_or_else(|| RuntimeError::MailboxMissing {
            actor: identity.name().to_string(),
        })?;

    let ctx = ActorContext::new(identity.clone(), bus);
    let state = Arc::new(AtomicU8::new(STATE_CREATED));
    let stop = Arc::new(AtomicBool::new(false));

    let thread = {
        let state = state.clone();
        let stop = stop.clone();
        let loop_identity = identity.clone();
        std::thread::Builder::new()
            .name(identity.name().to_string())
            .spawn(move || {
                state.store(STATE_RUNNING, Ordering::Release);
                actor.on_start(&ctx);
                info!(actor = %loop_identity, "actor started");
                while !stop.load(Ordering::Acquire) {
                    match mailbox.try_consume(&loop_identity) {
                        Ok(Some(event)) => {
                            let kind = event.kind();
                            if let Err(err) = actor.process(&ctx, event) {
                                error!(actor = %loop_identity, ?kind, %err,
                                       "event handler failed, continuing");
                            }
                        }
                        Ok(None) => loop_identity.wait_strategy().idle(),
                        Err(err) => {
                            // Overrun or corrupt accounting; the mailbox is
                            // no longer trustworthy for this consumer.
                            error!(actor = %loop_identity, %err, "mailbox unusable, stopping loop");
                            break;
                        }
                    }
                }
                state.store(STATE_STOPPED, Ordering::Release);
                debug!(actor = %loop_identity, "actor loop exited");
            })
            .map_err(|source| RuntimeError::SpawnFailed {
                actor: identity.name().to_string(),
                source,
            })?
    };

    Ok(ActorHandle {
        identity,
        state,
        stop,
        thread: Some(thread),
    })
}
