//! Agora Ports
//!
//! Trait definitions for everything the simulation core consumes but does
//! not own: time, the instrument catalog, the quote cache, the broadcast
//! fan-out, and the ledger/position store. Adapters live with the bounded
//! contexts (or in external infrastructure crates); the core only sees
//! these interfaces.

mod broadcast;
mod cache;
mod catalog;
mod clock;
mod error;
mod store;

pub use broadcast::QuoteSink;
pub use cache::QuoteCache;
pub use catalog::Catalog;
pub use clock::Clock;
pub use error::{BroadcastError, CacheError, StoreError};
pub use store::{AccountTxn, LedgerStore};
