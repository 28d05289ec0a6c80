//! Wait-strategy behavior for blocked channel accessors.

use lattice_types::WaitStrategy;
use std::time::Duration;

/// Spin budget for one `BusySpin` idle step.
const SPIN_ITERATIONS: u32 = 64;

/// Park interval for one `SleepBackoff` idle step.
const SLEEP_INTERVAL: Duration = Duration::from_micros(50);

/// One blocked-retry step for a producer or consumer.
pub trait WaitStrategyExt {
    /// Burn or yield time once, then let the caller re-check its condition.
    fn idle(&self);
}

impl WaitStrategyExt for WaitStrategy {
    fn idle(&self) {
        match self {
            WaitStrategy::BusySpin => {
                for _ in 0..SPIN_ITERATIONS {
                    std::hint::spin_loop();
                }
            }
            WaitStrategy::SleepBackoff => std::thread::sleep(SLEEP_INTERVAL),
            // Caller coordinates waiting externally (condvar integration).
            WaitStrategy::External => {}
        }
    }
}
