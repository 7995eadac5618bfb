use agora_core::{InstrumentId, UserId};
use thiserror::Error;

/// Errors from the ledger/position store and the catalog
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Unknown user: {0}")]
    UnknownUser(UserId),

    #[error("Unknown instrument: {0}")]
    UnknownInstrument(InstrumentId),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Errors from the quote cache collaborator
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache backend error: {0}")]
    Backend(String),
}

/// Errors from the broadcast collaborator
///
/// Delivery is best-effort; callers log these and continue.
#[derive(Error, Debug)]
pub enum BroadcastError {
    #[error("No subscribers connected")]
    NoSubscribers,

    #[error("Broadcast transport error: {0}")]
    Transport(String),
}
