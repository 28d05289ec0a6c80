//! Lock-Free Ring Buffer Event Channel
//!
//! Fixed-capacity circular array of event slots serving as an actor mailbox.
//! Producers arbitrate with a compare-and-swap on a shared cursor; consumers
//! each track a private position and observe every published event in order
//! (FIFO per channel). A producer never overwrites a slot until every
//! registered consumer has moved past it, so a slow consumer backpressures
//! publishers rather than losing data.
//!
//! The event store into a claimed slot is deliberately not atomic with the
//! cursor claim. Each slot therefore carries a sequence stamp written with
//! release ordering after the store; a reader acquires the stamp and spins
//! through the short claim-to-store window before touching the slot data.

use crate::error::{Result, RuntimeError};
use crate::wait::WaitStrategyExt;
use lattice_types::{ActorIdentity, Event};
use parking_lot::RwLock;
use std::cell::UnsafeCell;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

/// Sequence value meaning "nothing published/consumed yet".
const EMPTY: i64 = -1;

struct Slot {
    /// Sequence stamped after the event store; readers gate on it.
    published: AtomicI64,
    event: UnsafeCell<Option<Event>>,
}

// A slot's event cell is written only by the producer that claimed its
// sequence, and read only after the matching release-store of `published`.
// The no-overwrite check keeps writers out until every consumer has passed.
unsafe impl Sync for Slot {}

/// Channel counters, updated with relaxed ordering on the hot path.
#[derive(Debug, Default)]
pub struct ChannelMetrics {
    pub published: AtomicU64,
    pub consumed: AtomicU64,
    pub backpressure_waits: AtomicU64,
}

/// Fixed-capacity lock-free event channel.
///
/// Accessors are identified by [`ActorIdentity`] and take exactly one role
/// for the channel's lifetime: producer or consumer. Consumer positions are
/// created lazily on first consume; the shared consumer map makes every
/// consumer visible to every producer, so backpressure accounting stays
/// consistent as accessors appear.
pub struct RingChannel {
    slots: Box<[Slot]>,
    mask: i64,
    capacity: i64,
    /// Highest published sequence; starts at [`EMPTY`].
    cursor: AtomicI64,
    consumers: RwLock<HashMap<ActorIdentity, Arc<AtomicI64>>>,
    producers: RwLock<HashSet<ActorIdentity>>,
    metrics: ChannelMetrics,
}

impl RingChannel {
    /// Create a channel. Capacity must be a non-zero power of two so the
    /// slot index is a mask of the sequence.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        if capacity == 0 || !capacity.is_power_of_two() {
            return Err(RuntimeError::InvalidCapacity { got: capacity });
        }
        let slots = (0..capacity)
            .map(|_| Slot {
                published: AtomicI64::new(EMPTY),
                event: UnsafeCell::new(None),
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Ok(Self {
            slots,
            mask: (capacity - 1) as i64,
            capacity: capacity as i64,
            cursor: AtomicI64::new(EMPTY),
            consumers: RwLock::new(HashMap::new()),
            producers: RwLock::new(HashSet::new()),
            metrics: ChannelMetrics::default(),
        })
    }

    /// Pre-register a consumer so producers account for it from the first
    /// publish. Idempotent.
    pub fn register_consumer(&self, accessor: &ActorIdentity) -> Result<()> {
        if self.producers.read().contains(accessor) {
            return Err(RuntimeError::RoleViolation {
                accessor: accessor.name().to_string(),
                role: "producer",
            });
        }
        self.consumers
            .write()
            .entry(accessor.clone())
            .or_insert_with(|| Arc::new(AtomicI64::new(EMPTY)));
        Ok(())
    }

    /// Append an event, blocking per the accessor's wait strategy until a
    /// slot is free relative to every registered consumer's position.
    ///
    /// Returns the sequence the event was published at.
    pub fn publish(&self, accessor: &ActorIdentity, event: Event) -> Result<i64> {
        if self.consumers.read().contains_key(accessor) {
            return Err(RuntimeError::RoleViolation {
                accessor: accessor.name().to_string(),
                role: "consumer",
            });
        }
        if !self.producers.read().contains(accessor) {
            self.producers.write().insert(accessor.clone());
        }

        loop {
            let current = self.cursor.load(Ordering::Acquire);
            let next = current + 1;
            let wrap_point = next - self.capacity;
            // With no registered consumers the channel refuses to wrap:
            // nothing reclaims slots, so publishing stalls at capacity
            // instead of racing a concurrent claimer for the same slot.
            if wrap_point > EMPTY && self.slowest_consumer() < wrap_point {
                self.metrics.backpressure_waits.fetch_add(1, Ordering::Relaxed);
                accessor.wait_strategy().idle();
                continue;
            }
            // Claim the slot; on contention another producer won the
            // sequence, so retry from the fresh cursor.
            if self
                .cursor
                .compare_exchange(current, next, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                let slot = &self.slots[(next & self.mask) as usize];
                // Sole writer for this sequence; readers are gated on the
                // stamp below.
                unsafe {
                    *slot.event.get() = Some(event);
                }
                slot.published.store(next, Ordering::Release);
                self.metrics.published.fetch_add(1, Ordering::Relaxed);
                return Ok(next);
            }
        }
    }

    /// Next event for this accessor, blocking per its wait strategy while
    /// the channel is empty from its point of view.
    pub fn consume(&self, accessor: &ActorIdentity) -> Result<Event> {
        loop {
            if let Some(event) = self.try_consume(accessor)? {
                return Ok(event);
            }
            accessor.wait_strategy().idle();
        }
    }

    /// Non-blocking consume. Returns `Ok(None)` when the channel holds
    /// nothing new for this accessor; actor loops use this so a cooperative
    /// stop flag stays responsive.
    pub fn try_consume(&self, accessor: &ActorIdentity) -> Result<Option<Event>> {
        if self.producers.read().contains(accessor) {
            return Err(RuntimeError::RoleViolation {
                accessor: accessor.name().to_string(),
                role: "producer",
            });
        }
        let position = self.consumer_position(accessor);
        let consumed = position.load(Ordering::Acquire);
        if consumed == self.cursor.load(Ordering::Acquire) {
            return Ok(None);
        }

        let next = consumed + 1;
        let slot = &self.slots[(next & self.mask) as usize];
        // Spin through the claim-to-store window; a stamp beyond ours means
        // the slot was recycled before we ever read it.
        loop {
            let stamp = slot.published.load(Ordering::Acquire);
            if stamp == next {
                break;
            }
            if stamp > next {
                return Err(RuntimeError::Overrun {
                    accessor: accessor.name().to_string(),
                    expected: next,
                    found: stamp,
                });
            }
            std::hint::spin_loop();
        }

        let taken = unsafe { (*slot.event.get()).clone() };
        position.store(next, Ordering::Release);
        match taken {
            Some(event) => {
                self.metrics.consumed.fetch_add(1, Ordering::Relaxed);
                Ok(Some(event))
            }
            None => Err(RuntimeError::CorruptSlot { sequence: next }),
        }
    }

    /// Highest published sequence, [`EMPTY`] when nothing was published.
    pub fn cursor(&self) -> i64 {
        self.cursor.load(Ordering::Acquire)
    }

    pub fn capacity(&self) -> usize {
        self.capacity as usize
    }

    pub fn metrics(&self) -> &ChannelMetrics {
        &self.metrics
    }

    /// Last-consumed sequence of one accessor, if it ever consumed.
    pub fn position_of(&self, accessor: &ActorIdentity) -> Option<i64> {
        self.consumers
            .read()
            .get(accessor)
            .map(|p| p.load(Ordering::Acquire))
    }

    fn consumer_position(&self, accessor: &ActorIdentity) -> Arc<AtomicI64> {
        if let Some(position) = self.consumers.read().get(accessor) {
            return position.clone();
        }
        self.consumers
            .write()
            .entry(accessor.clone())
            .or_insert_with(|| Arc::new(AtomicI64::new(EMPTY)))
            .clone()
    }

    /// Minimum consumed sequence across registered consumers; [`EMPTY`]
    /// when none are registered.
    fn slowest_consumer(&self) -> i64 {
        self.consumers
            .read()
            .values()
            .map(|p| p.load(Ordering::Acquire))
            .min()
            .unwrap_or(EMPTY)
    }
}
