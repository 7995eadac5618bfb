//! Force-liquidation of accounts whose losses exceed their cash
//!
//! The sweep runs inside the tick, strictly after the tick's quote writes,
//! against the exact price snapshot that is about to be broadcast.

use std::collections::HashMap;
use std::sync::Arc;

use agora_core::{Holding, InstrumentId, Price, UserId};
use agora_ports::LedgerStore;
use log::{error, warn};

use crate::application::ExecutionEngine;
use crate::error::Result;

/// Detects and liquidates bankrupt accounts
#[derive(Clone)]
pub struct BankruptcyMonitor {
    ledger: Arc<dyn LedgerStore>,
    engine: ExecutionEngine,
}

impl BankruptcyMonitor {
    pub fn new(ledger: Arc<dyn LedgerStore>, engine: ExecutionEngine) -> Self {
        Self { ledger, engine }
    }

    /// Check every exposed account against the given price snapshot and
    /// force-liquidate the bankrupt ones. Returns the users liquidated.
    ///
    /// An account is bankrupt when its total unrealized loss across all
    /// holdings is at least its cash balance. Liquidation exits every
    /// holding (individual exit failures are logged and skipped) and then
    /// floors the balance at exactly zero.
    pub async fn sweep(&self, prices: &HashMap<InstrumentId, Price>) -> Result<Vec<UserId>> {
        let mut liquidated = Vec::new();

        for user in self.ledger.users_with_holdings().await? {
            // Read-only snapshot; dropped before any exits run. One user's
            // store failure never blocks the sweep for the rest.
            let (balance, holdings) = match self.ledger.begin(user).await {
                Ok(txn) => (txn.balance(), txn.holdings()),
                Err(e) => {
                    warn!("skipping bankruptcy check for user {user}: {e}");
                    continue;
                }
            };

            let pnl: f64 = holdings
                .iter()
                .filter_map(|h| prices.get(&h.instrument).map(|price| h.unrealized_pnl(*price)))
                .sum();

            if pnl < 0.0 && -pnl >= balance {
                warn!(
                    "user {user} bankrupt: balance {balance:.2}, unrealized {pnl:.2}; liquidating"
                );
                match self.liquidate(user, &holdings).await {
                    Ok(()) => liquidated.push(user),
                    Err(e) => error!("liquidation of user {user} failed: {e}"),
                }
            }
        }

        Ok(liquidated)
    }

    async fn liquidate(&self, user: UserId, holdings: &[Holding]) -> Result<()> {
        for holding in holdings {
            if let Err(e) = self
                .engine
                .exit(user, &holding.instrument, holding.side())
                .await
            {
                error!(
                    "forced exit of {} {} for user {user} failed: {e}",
                    holding.side(),
                    holding.instrument
                );
            }
        }

        let mut txn = self.ledger.begin(user).await?;
        txn.set_balance(0.0);
        txn.commit().await?;
        Ok(())
    }
}
