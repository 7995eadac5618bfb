//! Agora Clock Infrastructure
//!
//! Time sources behind the `Clock` port:
//!
//! - [`SystemClock`] - real wall-clock time for production runs
//! - [`ManualClock`] - frozen time that only moves when explicitly advanced,
//!   for deterministic scheduler tests
//!
//! The tick scheduler takes an `Arc<dyn Clock>`, so simulations can be
//! instantiated in parallel with independent time sources.

mod manual;
mod system;

pub use manual::ManualClock;
pub use system::SystemClock;

// Re-export the Clock trait for convenience
pub use agora_ports::Clock;
