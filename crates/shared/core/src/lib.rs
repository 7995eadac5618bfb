//! Agora Core Domain
//!
//! Pure domain types for the Agora market simulation.
//! This crate contains no async, no I/O, and is 100% unit testable.

pub mod entities;
pub mod instruments;
pub mod market_data;
pub mod values;

// Re-export commonly used types at crate root
pub use entities::{Account, Holding, PositionSide, Transaction};
pub use instruments::{Instrument, InstrumentId};
pub use market_data::{Candle, CandleError, QuoteUpdate};
pub use values::{Cash, Price, Timestamp, Units, UserId};
