use agora_core::Timestamp;
use agora_ports::Clock;
use chrono::{Duration, Utc};
use std::sync::RwLock;

/// Manually advanced clock for deterministic tests
///
/// Time is frozen at construction and only moves through [`advance`] or
/// [`set_time`]. Candle timestamps produced under this clock are fully
/// reproducible.
///
/// [`advance`]: ManualClock::advance
/// [`set_time`]: ManualClock::set_time
pub struct ManualClock {
    current: RwLock<Timestamp>,
}

impl ManualClock {
    /// Create a frozen clock.
    ///
    /// # Arguments
    /// * `initial_time` - Optional starting time. If None, uses current wall time.
    pub fn new(initial_time: Option<Timestamp>) -> Self {
        Self {
            current: RwLock::new(initial_time.unwrap_or_else(Utc::now)),
        }
    }

    /// Advance the clock by a duration
    pub fn advance(&self, duration: Duration) {
        let mut current = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *current += duration;
    }

    /// Jump the clock to an explicit time.
    ///
    /// Warning: jumping backwards breaks candle timestamp monotonicity.
    pub fn set_time(&self, time: Timestamp) {
        let mut current = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *current = time;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self
            .current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn name(&self) -> &str {
        "ManualClock"
    }
}
