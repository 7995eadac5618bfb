use agora_core::{CandleError, PositionSide};
use agora_ports::{CacheError, StoreError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Insufficient balance: required {required:.2}, available {available:.2}")]
    InsufficientBalance { required: f64, available: f64 },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Simulation is already running")]
    AlreadyRunning,

    #[error("Simulation is not running")]
    NotRunning,

    #[error("Transition event already finished")]
    OutOfRange,

    #[error("No {0} position to exit")]
    NoPosition(PositionSide),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Corrupt quote blob: {0}")]
    Corrupt(#[from] CandleError),
}

pub type Result<T> = std::result::Result<T, SimError>;
