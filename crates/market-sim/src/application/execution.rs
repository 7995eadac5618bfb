//! Order execution against the current quote
//!
//! Orders price against the single authoritative candle in the price store
//! and settle into one signed holding row per (user, instrument). Every
//! order commits its balance mutation, holding mutation and ledger append as
//! one unit under the per-user transactional boundary; a validation failure
//! drops the open transaction and leaves nothing mutated.

use std::sync::Arc;

use agora_core::{Cash, Holding, InstrumentId, Price, PositionSide, Transaction, Units, UserId};
use agora_ports::{AccountTxn, Clock, LedgerStore};
use log::{debug, info};

use crate::error::{Result, SimError};
use crate::infrastructure::PriceStore;

/// Flat spread applied when a whole position is exited in one shot
const EXIT_SPREAD: f64 = 0.005;

/// How execution prices deviate from the quote
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PricingPolicy {
    /// Each successive unit costs `factor` times the previous one, starting
    /// from `quote * factor` on buys (and the inverse ratio on sells), so
    /// large orders walk the price away from the quote.
    ImpactCurve { factor: f64 },

    /// Every unit fills at `quote * (1 +/- spread)`.
    FixedSpread { spread: f64 },
}

impl Default for PricingPolicy {
    fn default() -> Self {
        PricingPolicy::ImpactCurve { factor: 1.001 }
    }
}

impl PricingPolicy {
    /// Cash required to buy `units` at the given quote
    pub fn buy_cost(&self, quote: Price, units: Units) -> Cash {
        match *self {
            PricingPolicy::ImpactCurve { factor } => sum_gp(quote * factor, factor, units),
            PricingPolicy::FixedSpread { spread } => units as f64 * quote * (1.0 + spread),
        }
    }

    /// Cash credited for selling `units` at the given quote
    pub fn sell_proceeds(&self, quote: Price, units: Units) -> Cash {
        match *self {
            PricingPolicy::ImpactCurve { factor } => {
                let inverse = 1.0 / factor;
                sum_gp(quote * inverse, inverse, units)
            }
            PricingPolicy::FixedSpread { spread } => units as f64 * quote * (1.0 - spread),
        }
    }
}

/// Sum of the geometric series `first + first*ratio + ... + first*ratio^(n-1)`
fn sum_gp(first: f64, ratio: f64, n: Units) -> f64 {
    if (ratio - 1.0).abs() < f64::EPSILON {
        first * n as f64
    } else {
        first * (1.0 - ratio.powi(n as i32)) / (1.0 - ratio)
    }
}

/// What an order did, as observed after commit
#[derive(Debug, Clone)]
pub struct ExecutionReceipt {
    /// The ledger row appended for this order
    pub transaction: Transaction,

    /// Cash balance after settlement
    pub balance_after: Cash,

    /// The holding row after settlement, `None` when the position closed flat
    pub holding_after: Option<Holding>,
}

/// Executes buy/sell/exit orders against the current quotes
#[derive(Clone)]
pub struct ExecutionEngine {
    prices: PriceStore,
    ledger: Arc<dyn LedgerStore>,
    pricing: PricingPolicy,
    clock: Arc<dyn Clock>,
}

impl ExecutionEngine {
    pub fn new(
        prices: PriceStore,
        ledger: Arc<dyn LedgerStore>,
        pricing: PricingPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            prices,
            ledger,
            pricing,
            clock,
        }
    }

    pub fn pricing(&self) -> PricingPolicy {
        self.pricing
    }

    /// Buy `units` of an instrument.
    ///
    /// Covers any open short first at the unadjusted quote (returning the
    /// pro-rata margin plus P&L), then opens or extends a long at the policy
    /// buy price with weighted-average cost blending. One ledger row is
    /// appended for the whole order.
    pub async fn buy(&self, user: UserId, id: &InstrumentId, units: Units) -> Result<ExecutionReceipt> {
        if units <= 0 {
            return Err(SimError::InvalidArgument(format!(
                "buy quantity must be positive, got {units}"
            )));
        }

        let quote = self.prices.get(id).await?.close;
        let mut txn = self.ledger.begin(user).await?;

        let mut remaining = units;
        let mut notional = 0.0;
        let mut position = txn.holding(id);

        // Cover an open short first
        if let Some(short) = position.take_if(|h| h.quantity < 0) {
            let covered = remaining.min(-short.quantity);
            let fraction = covered as f64 / (-short.quantity) as f64;
            let returned = short.short_proceeds * fraction;
            let pnl = (short.average_price - quote) * covered as f64;

            txn.set_balance(txn.balance() + returned + pnl);
            notional += covered as f64 * quote;
            remaining -= covered;

            let left = short.quantity + covered;
            if left < 0 {
                position = Some(Holding {
                    quantity: left,
                    short_proceeds: short.short_proceeds - returned,
                    ..short
                });
            }
        }

        // Open or extend the long leg
        if remaining > 0 {
            let cost = self.pricing.buy_cost(quote, remaining);
            let available = txn.balance();
            if cost > available {
                return Err(SimError::InsufficientBalance {
                    required: cost,
                    available,
                });
            }
            txn.set_balance(available - cost);
            notional += cost;

            position = Some(match position.filter(|h| h.quantity > 0) {
                Some(long) => {
                    let total = long.quantity + remaining;
                    let blended =
                        (long.average_price * long.quantity as f64 + cost) / total as f64;
                    Holding {
                        quantity: total,
                        average_price: blended,
                        ..long
                    }
                }
                None => Holding::open_long(user, id.clone(), remaining, cost / remaining as f64),
            });
        }

        self.settle(txn, user, id, units, notional, position).await
    }

    /// Sell `units` of an instrument.
    ///
    /// Reduces any open long first at the policy sell price (this leg cannot
    /// fail), then opens or extends a short: the short leg charges its
    /// notional up front as margin and records it in `short_proceeds`.
    pub async fn sell(&self, user: UserId, id: &InstrumentId, units: Units) -> Result<ExecutionReceipt> {
        if units <= 0 {
            return Err(SimError::InvalidArgument(format!(
                "sell quantity must be positive, got {units}"
            )));
        }

        let quote = self.prices.get(id).await?.close;
        let mut txn = self.ledger.begin(user).await?;

        let mut remaining = units;
        let mut notional = 0.0;
        let mut position = txn.holding(id);

        // Reduce an open long first
        if let Some(long) = position.take_if(|h| h.quantity > 0) {
            let reduced = remaining.min(long.quantity);
            let proceeds = self.pricing.sell_proceeds(quote, reduced);

            txn.set_balance(txn.balance() + proceeds);
            notional += proceeds;
            remaining -= reduced;

            let left = long.quantity - reduced;
            if left > 0 {
                position = Some(Holding {
                    quantity: left,
                    ..long
                });
            }
        }

        // Open or extend the short leg; its notional is charged as margin
        if remaining > 0 {
            let margin = self.pricing.sell_proceeds(quote, remaining);
            let available = txn.balance();
            if margin > available {
                return Err(SimError::InsufficientBalance {
                    required: margin,
                    available,
                });
            }
            txn.set_balance(available - margin);
            notional += margin;

            position = Some(match position.filter(|h| h.quantity < 0) {
                Some(short) => {
                    let total = -short.quantity + remaining;
                    let blended = (short.average_price * (-short.quantity) as f64 + margin)
                        / total as f64;
                    Holding {
                        quantity: -total,
                        average_price: blended,
                        short_proceeds: short.short_proceeds + margin,
                        ..short
                    }
                }
                None => Holding::open_short(user, id.clone(), remaining, margin),
            });
        }

        self.settle(txn, user, id, -units, notional, position).await
    }

    /// Close a whole position on the given side in one shot.
    ///
    /// Longs sell at `quote * (1 - 0.005)`. Shorts buy back at
    /// `quote * (1 + 0.005)` and get their margin back plus P&L. The holding
    /// row is deleted either way.
    pub async fn exit(
        &self,
        user: UserId,
        id: &InstrumentId,
        side: PositionSide,
    ) -> Result<ExecutionReceipt> {
        let quote = self.prices.get(id).await?.close;
        let mut txn = self.ledger.begin(user).await?;

        let held = txn
            .holding(id)
            .filter(|h| !h.is_flat() && h.side() == side)
            .ok_or(SimError::NoPosition(side))?;

        let (signed_units, notional, credit) = match side {
            PositionSide::Long => {
                let proceeds = held.quantity as f64 * quote * (1.0 - EXIT_SPREAD);
                (-held.quantity, proceeds, proceeds)
            }
            PositionSide::Short => {
                let size = -held.quantity;
                let cover = quote * (1.0 + EXIT_SPREAD);
                let cost = size as f64 * cover;
                let credit = held.short_proceeds + (held.average_price - cover) * size as f64;
                (size, cost, credit)
            }
        };

        txn.set_balance(txn.balance() + credit);
        self.settle(txn, user, id, signed_units, notional, None).await
    }

    /// Publish the staged order: holding row, ledger append, commit
    async fn settle(
        &self,
        mut txn: Box<dyn AccountTxn>,
        user: UserId,
        id: &InstrumentId,
        signed_units: Units,
        notional: Cash,
        position: Option<Holding>,
    ) -> Result<ExecutionReceipt> {
        match &position {
            Some(holding) => {
                debug_assert!(!holding.is_flat());
                txn.put_holding(holding.clone());
            }
            None => txn.delete_holding(id),
        }

        let transaction = Transaction::new(user, id.clone(), signed_units, notional, self.clock.now());
        txn.append_transaction(transaction.clone());

        let balance_after = txn.balance();
        txn.commit().await?;

        info!(
            "executed {signed_units:+} {id} for {notional:.2}, balance {balance_after:.2}"
        );
        debug!("position after: {position:?}");

        Ok(ExecutionReceipt {
            transaction,
            balance_after,
            holding_after: position,
        })
    }
}
