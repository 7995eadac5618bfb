use agora_core::{Candle, Cash, Holding, InstrumentId, Timestamp, Transaction, UserId};
use async_trait::async_trait;

use crate::error::StoreError;

/// Port for the persisted ledger & position store
///
/// `begin` opens a per-user unit of work. The returned transaction holds the
/// user's serialization boundary for its whole lifetime: two concurrent
/// orders on the same account can never interleave their read-modify-write
/// of quantity, average price, or balance.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Open a transactional unit of work for one user.
    ///
    /// Blocks until any other in-flight transaction for the same user has
    /// committed or rolled back.
    async fn begin(&self, user: UserId) -> Result<Box<dyn AccountTxn>, StoreError>;

    /// Users that currently hold at least one position
    async fn users_with_holdings(&self) -> Result<Vec<UserId>, StoreError>;

    /// Most recent ledger entry for an instrument strictly newer than `after`
    async fn last_fill_after(
        &self,
        instrument: &InstrumentId,
        after: Timestamp,
    ) -> Result<Option<Transaction>, StoreError>;

    /// Persist a closed candle to history at the candle-trigger boundary
    async fn save_candle(
        &self,
        instrument: &InstrumentId,
        candle: &Candle,
    ) -> Result<(), StoreError>;
}

/// One open unit of work against a single user's account
///
/// Mutations are staged in memory; nothing is visible to other readers until
/// `commit`. Dropping the transaction without committing rolls everything
/// back and releases the per-user boundary.
#[async_trait]
pub trait AccountTxn: Send {
    /// Current staged cash balance
    fn balance(&self) -> Cash;

    /// Stage a new cash balance
    fn set_balance(&mut self, balance: Cash);

    /// Staged holding for one instrument, if any
    fn holding(&self, instrument: &InstrumentId) -> Option<Holding>;

    /// All staged holdings for this user
    fn holdings(&self) -> Vec<Holding>;

    /// Stage an insert-or-update of a holding row
    fn put_holding(&mut self, holding: Holding);

    /// Stage deletion of a holding row (used whenever quantity reaches zero)
    fn delete_holding(&mut self, instrument: &InstrumentId);

    /// Stage an append-only ledger entry
    fn append_transaction(&mut self, transaction: Transaction);

    /// Atomically publish every staged mutation
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
