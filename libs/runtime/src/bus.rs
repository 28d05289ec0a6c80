//! Process-Wide Event Bus
//!
//! Directory of actor mailboxes and event-kind subscriptions. Dispatch is
//! read-heavy and can run from any actor thread, so the mailbox map is a
//! concurrent map and the subscription multimap sits behind a read-write
//! lock; registration happens during startup and is the only writer.
//!
//! Subscription matching prefers the exact event kind, then walks the kind
//! hierarchy nearest-ancestor-first and uses the first registered set it
//! finds. An event with no subscribers anywhere is dropped with a
//! diagnostic, never an error; a subscriber whose mailbox vanished is a
//! transient delivery failure: logged and dropped, no retry.

use crate::error::{Result, RuntimeError};
use crate::ring::RingChannel;
use dashmap::DashMap;
use lattice_types::{ActorIdentity, Event, EventKind};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, trace};

/// Bus counters, updated with relaxed ordering.
#[derive(Debug, Default)]
pub struct BusMetrics {
    pub published: AtomicU64,
    pub delivered: AtomicU64,
    pub dropped_no_subscriber: AtomicU64,
    pub dropped_missing_mailbox: AtomicU64,
    pub dropped_delivery_error: AtomicU64,
}

/// Directory mapping identities to mailboxes and kinds to subscribers.
pub struct EventBus {
    mailboxes: DashMap<ActorIdentity, Arc<RingChannel>>,
    subscriptions: RwLock<HashMap<EventKind, HashSet<ActorIdentity>>>,
    metrics: BusMetrics,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            mailboxes: DashMap::new(),
            subscriptions: RwLock::new(HashMap::new()),
            metrics: BusMetrics::default(),
        }
    }

    /// Create a mailbox for `identity` with the owner pre-registered as its
    /// consumer. Idempotent: an existing mailbox is left untouched.
    pub fn register(&self, identity: &ActorIdentity, capacity: usize) -> Result<()> {
        use dashmap::mapref::entry::Entry;
        match self.mailboxes.entry(identity.clone()) {
            Entry::Occupied(_) => {
                trace!(actor = %identity, "mailbox already registered");
                Ok(())
            }
            Entry::Vacant(vacant) => {
                let channel = RingChannel::with_capacity(capacity)?;
                channel.register_consumer(identity)?;
                vacant.insert(Arc::new(channel));
                debug!(actor = %identity, capacity, "mailbox registered");
                Ok(())
            }
        }
    }

    /// Subscribe `identity` to events of `kind` (and, via hierarchy
    /// fallback, to subtypes with no subscribers of their own).
    pub fn register_for_event(&self, kind: EventKind, identity: &ActorIdentity) {
        self.subscriptions
            .write()
            .entry(kind)
            .or_default()
            .insert(identity.clone());
        debug!(actor = %identity, ?kind, "subscription registered");
    }

    /// Publish to every subscriber of the event's kind (or of its nearest
    /// subscribed ancestor kind).
    pub fn publish(&self, from: &ActorIdentity, event: Event) -> Result<()> {
        self.metrics.published.fetch_add(1, Ordering::Relaxed);
        let kind = event.kind();
        let Some((matched, targets)) = self.resolve(kind) else {
            debug!(?kind, from = %from, "event has no subscribers, dropping");
            self.metrics
                .dropped_no_subscriber
                .fetch_add(1, Ordering::Relaxed);
            return Ok(());
        };
        if matched != kind {
            trace!(?kind, fallback = ?matched, "widened subscription match");
        }
        for target in targets {
            self.deliver(from, &target, event.clone());
        }
        Ok(())
    }

    /// Direct point-to-point delivery, bypassing subscription lookup.
    pub fn publish_to(&self, from: &ActorIdentity, to: &ActorIdentity, event: Event) -> Result<()> {
        self.metrics.published.fetch_add(1, Ordering::Relaxed);
        match self.mailboxes.get(to) {
            Some(channel) => match channel.publish(from, event) {
                Ok(_) => {
                    self.metrics.delivered.fetch_add(1, Ordering::Relaxed);
                    Ok(())
                }
                Err(err) => Err(err),
            },
            None => Err(RuntimeError::MailboxMissing {
                actor: to.name().to_string(),
            }),
        }
    }

    /// The mailbox of one actor, if registered. Actor loops consume from it.
    pub fn mailbox(&self, identity: &ActorIdentity) -> Option<Arc<RingChannel>> {
        self.mailboxes
            .get(identity)
            .map(|entry| Arc::clone(entry.value()))
    }

    pub fn metrics(&self) -> &BusMetrics {
        &self.metrics
    }

    /// Exact kind first, then nearest registered ancestor. At most one
    /// fallback set is ever used.
    fn resolve(&self, kind: EventKind) -> Option<(EventKind, Vec<ActorIdentity>)> {
        let subscriptions = self.subscriptions.read();
        for probe in kind.hierarchy() {
            if let Some(set) = subscriptions.get(&probe) {
                if !set.is_empty() {
                    return Some((probe, set.iter().cloned().collect()));
                }
            }
        }
        None
    }

    fn deliver(&self, from: &ActorIdentity, to: &ActorIdentity, event: Event) {
        match self.mailboxes.get(to) {
            Some(channel) => {
                if let Err(err) = channel.publish(from, event) {
                    error!(from = %from, to = %to, %err, "delivery failed, dropping event");
                    self.metrics
                        .dropped_delivery_error
                        .fetch_add(1, Ordering::Relaxed);
                } else {
                    self.metrics.delivered.fetch_add(1, Ordering::Relaxed);
                }
            }
            None => {
                error!(from = %from, to = %to, "no mailbox for subscriber, dropping event");
                self.metrics
                    .dropped_missing_mailbox
                    .fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
