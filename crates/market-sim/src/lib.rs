//! Market Simulation
//!
//! The simulation bounded context: a tick scheduler that evolves instrument
//! prices on a fixed schedule, a scripted transition-event/chart-pattern
//! engine that drives those prices along recognizable shapes, an execution
//! engine that settles buy/sell/exit orders against the current quote, and
//! a bankruptcy monitor that force-liquidates accounts whose losses exceed
//! their cash.
//!
//! Everything the context does not own - time, the instrument catalog, the
//! quote cache, broadcast fan-out, the ledger - arrives through the ports
//! in `agora-ports`; in-memory adapters for all of them live under
//! [`infrastructure`].

pub mod application;
pub mod error;
pub mod event;
pub mod infrastructure;
pub mod patterns;

pub use application::{
    BankruptcyMonitor, ExecutionEngine, ExecutionReceipt, PricingPolicy, SchedulerConfig,
    TickScheduler,
};
pub use error::{Result, SimError};
pub use event::TransitionEvent;
pub use patterns::Pattern;
