use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::instruments::InstrumentId;
use crate::values::{Cash, Price, Timestamp, Units, UserId};

/// Immutable ledger entry for one executed order
///
/// Append-only; never mutated or deleted. The append commits atomically with
/// the holding and balance mutation it accompanies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Ledger row identity
    pub id: Uuid,

    /// Account that placed the order
    pub user: UserId,

    /// Instrument traded
    pub instrument: InstrumentId,

    /// Signed units: positive = bought, negative = sold
    pub signed_units: Units,

    /// Total cash that changed hands for the whole order
    pub total_price: Cash,

    /// When the order executed
    pub timestamp: Timestamp,
}

impl Transaction {
    pub fn new(
        user: UserId,
        instrument: InstrumentId,
        signed_units: Units,
        total_price: Cash,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user,
            instrument,
            signed_units,
            total_price,
            timestamp,
        }
    }

    /// Per-unit execution price of this order
    ///
    /// Used by the tick scheduler to print executions through to the tape.
    pub fn per_unit(&self) -> Price {
        if self.signed_units == 0 {
            0.0
        } else {
            self.total_price / self.signed_units.unsigned_abs() as f64
        }
    }
}
