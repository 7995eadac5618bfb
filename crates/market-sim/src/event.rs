//! Transition events - scripted multi-step price interpolations
//!
//! A transition event walks a price from `from` to `to` over exactly `steps`
//! calls to [`next`]. Each intermediate value is drawn uniformly between the
//! previously emitted value and the linear target for that step, so the path
//! jitters but always converges; the final step snaps exactly to `to`. This
//! lets scripted chart patterns look organic while guaranteeing arrival at
//! the intended target.
//!
//! [`next`]: TransitionEvent::next

use rand::Rng;

use crate::error::{Result, SimError};

/// One scripted price transition, consumed one step per eligible tick
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionEvent {
    /// Price the transition starts from
    pub from: f64,
    /// Price the transition is guaranteed to reach
    pub to: f64,
    /// Number of values this event will emit (candle count)
    pub steps: u32,

    current_step: u32,
    previous: f64,
}

impl TransitionEvent {
    /// Create a new transition. `steps` must be at least 1.
    pub fn new(from: f64, to: f64, steps: u32) -> Result<Self> {
        if steps == 0 {
            return Err(SimError::InvalidArgument(
                "transition event needs at least one step".to_string(),
            ));
        }

        Ok(Self {
            from,
            to,
            steps,
            current_step: 0,
            previous: from,
        })
    }

    /// Constructor for pattern legs, whose candle counts are nonzero constants
    pub(crate) fn leg(from: f64, to: f64, candles: u32) -> Self {
        debug_assert!(candles >= 1);
        Self {
            from,
            to,
            steps: candles.max(1),
            current_step: 0,
            previous: from,
        }
    }

    /// Whether the cursor has reached the terminal state
    pub fn is_finished(&self) -> bool {
        self.current_step == self.steps
    }

    /// Emit the next value on the path, advancing the cursor by one.
    ///
    /// Fails with `OutOfRange` once the event is finished; terminal events
    /// are immutable and get discarded by the pattern queue.
    pub fn next(&mut self, rng: &mut impl Rng) -> Result<f64> {
        if self.is_finished() {
            return Err(SimError::OutOfRange);
        }

        let step = self.current_step + 1;
        let value = if step == self.steps {
            // Final step snaps exactly to the target
            self.to
        } else {
            let linear =
                self.from + (self.to - self.from) * step as f64 / self.steps as f64;
            let (lo, hi) = if self.previous <= linear {
                (self.previous, linear)
            } else {
                (linear, self.previous)
            };
            if lo == hi { lo } else { rng.gen_range(lo..=hi) }
        };

        self.previous = value;
        self.current_step = step;
        Ok(value)
    }
}
