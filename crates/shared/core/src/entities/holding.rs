use serde::{Deserialize, Serialize};

use super::side::PositionSide;
use crate::instruments::InstrumentId;
use crate::values::{Cash, Price, Units, UserId};

/// A user's open exposure to one instrument
///
/// One signed row per (user, instrument): positive quantity is a long,
/// negative is a short. A holding with `quantity == 0` is never persisted;
/// the store deletes the row instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    /// Account that owns this holding
    pub user: UserId,

    /// Instrument being held
    pub instrument: InstrumentId,

    /// Signed quantity: positive = long, negative = short
    pub quantity: Units,

    /// Weighted-average cost basis per unit
    pub average_price: Price,

    /// Cash charged up front when opening/adding to a short.
    /// Returned pro rata when the short is covered or exited.
    pub short_proceeds: Cash,
}

impl Holding {
    /// Open a fresh long position
    pub fn open_long(user: UserId, instrument: InstrumentId, quantity: Units, average_price: Price) -> Self {
        Self {
            user,
            instrument,
            quantity,
            average_price,
            short_proceeds: 0.0,
        }
    }

    /// Open a fresh short position. `proceeds` is the cash charged up front.
    pub fn open_short(user: UserId, instrument: InstrumentId, quantity: Units, proceeds: Cash) -> Self {
        Self {
            user,
            instrument,
            quantity: -quantity,
            average_price: proceeds / quantity as f64,
            short_proceeds: proceeds,
        }
    }

    /// Which side this holding is on
    pub fn side(&self) -> PositionSide {
        if self.quantity >= 0 {
            PositionSide::Long
        } else {
            PositionSide::Short
        }
    }

    /// Whether the position has been fully closed
    pub fn is_flat(&self) -> bool {
        self.quantity == 0
    }

    /// Unrealized P&L at the given mark price.
    ///
    /// `(current - entry) * qty` for longs, `(entry - current) * |qty|` for
    /// shorts - the signed quantity makes those the same expression.
    pub fn unrealized_pnl(&self, current_price: Price) -> Cash {
        (current_price - self.average_price) * self.quantity as f64
    }
}
