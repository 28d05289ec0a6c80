//! Periodic tick source.
//!
//! A plain producer thread publishing [`Event::Tick`] on the bus at a fixed
//! interval under the ticker identity. Gossip cadence and consensus round
//! deadlines both key off these pulses, so one ticker per process suffices.

use crate::bus::EventBus;
use crate::error::{Result, RuntimeError};
use lattice_types::{epoch_ms, identities, Event};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Stop-poll granularity; keeps shutdown responsive under long intervals.
const POLL: Duration = Duration::from_millis(5);

pub struct Ticker {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Ticker {
    /// Start publishing ticks every `interval`.
    pub fn start(bus: Arc<EventBus>, interval: Duration) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let thread = {
            let stop = stop.clone();
            std::thread::Builder::new()
                .name("ticker".to_string())
                .spawn(move || {
                    let identity = identities::TICKER.clone();
                    let mut next = Instant::now() + interval;
                    while !stop.load(Ordering::Acquire) {
                        if Instant::now() >= next {
                            next += interval;
                            if let Err(err) =
                                bus.publish(&identity, Event::Tick { at_ms: epoch_ms() })
                            {
                                warn!(%err, "tick publish failed");
                            }
                        }
                        std::thread::sleep(POLL.min(interval));
                    }
                    debug!("ticker stopped");
                })
                .map_err(|err| warn!(%err, "ticker thread spawn failed"))
                .ok()
        };
        Self { stop, thread }
    }

    /// Raise the stop flag and join with a bounded deadline.
    pub fn stop(mut self, timeout: Duration) -> Result<()> {
        self.stop.store(true, Ordering::Release);
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        let deadline = Instant::now() + timeout;
        while !thread.is_finished() {
            if Instant::now() >= deadline {
                warn!("ticker ignored stop flag, detaching");
                return Err(RuntimeError::StopTimeout {
                    actor: "ticker".to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                });
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        let _ = thread.join();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattice_types::{ActorIdentity, EventKind, WaitStrategy};

    #[test]
    fn ticks_arrive_at_subscribers() {
        let bus = Arc::new(EventBus::new());
        let listener = ActorIdentity::named("tick-listener", WaitStrategy::SleepBackoff);
        bus.register(&listener, 64).expect("register");
        bus.register_for_event(EventKind::Tick, &listener);

        let ticker = Ticker::start(bus.clone(), Duration::from_millis(10));
        std::thread::sleep(Duration::from_millis(100));
        ticker.stop(Duration::from_secs(1)).expect("stop");

        let mailbox = bus.mailbox(&listener).expect("mailbox");
        let mut ticks = 0;
        while let Some(event) = mailbox.try_consume(&listener).expect("consume") {
            assert!(matches!(event, Event::Tick { .. }));
            ticks += 1;
        }
        assert!(ticks >= 2, "expected several ticks, got {ticks}");
    }
}
