use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Price value - simulated quotes are plain floating point
/// Future: could become a newtype with validation (non-negative, tick size)
pub type Price = f64;

/// Cash value - account balances and transaction notionals
pub type Cash = f64;

/// Unit count for orders and holdings (signed: positive long, negative short)
pub type Units = i64;

/// Timestamp in UTC
pub type Timestamp = DateTime<Utc>;

/// Identifier for a trading account owner
pub type UserId = Uuid;
