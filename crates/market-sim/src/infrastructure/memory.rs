//! In-memory adapters for the collaborator ports
//!
//! These back the integration tests and single-process embeddings. The
//! ledger adapter keeps one async mutex per account; holding that mutex for
//! the lifetime of an open transaction is what gives the per-user
//! serialization boundary the execution engine relies on.

use std::collections::HashMap;
use std::sync::Arc;

use agora_core::{
    Account, Candle, Cash, Holding, Instrument, InstrumentId, Timestamp, Transaction, UserId,
};
use agora_ports::{
    AccountTxn, CacheError, Catalog, LedgerStore, QuoteCache, StoreError,
};
use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Quote cache backed by a concurrent map of encoded blobs
#[derive(Default)]
pub struct InMemoryQuoteCache {
    entries: DashMap<InstrumentId, String>,
}

impl InMemoryQuoteCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QuoteCache for InMemoryQuoteCache {
    async fn get(&self, key: &InstrumentId) -> Result<Option<String>, CacheError> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn set(&self, key: &InstrumentId, blob: String) -> Result<(), CacheError> {
        self.entries.insert(key.clone(), blob);
        Ok(())
    }
}

/// Catalog over a fixed instrument list
pub struct InMemoryCatalog {
    instruments: Vec<Instrument>,
}

impl InMemoryCatalog {
    pub fn new(instruments: Vec<Instrument>) -> Self {
        Self { instruments }
    }
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn list_instruments(&self) -> Result<Vec<Instrument>, StoreError> {
        Ok(self.instruments.clone())
    }

    async fn get_instrument(&self, id: &InstrumentId) -> Result<Instrument, StoreError> {
        self.instruments
            .iter()
            .find(|instrument| &instrument.id == id)
            .cloned()
            .ok_or_else(|| StoreError::UnknownInstrument(id.clone()))
    }
}

/// Everything the ledger knows about one account
struct AccountState {
    account: Account,
    holdings: HashMap<InstrumentId, Holding>,
}

/// In-memory ledger & position store
pub struct InMemoryLedger {
    accounts: DashMap<UserId, Arc<Mutex<AccountState>>>,
    tape: Arc<Mutex<Vec<Transaction>>>,
    history: DashMap<InstrumentId, Vec<Candle>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
            tape: Arc::new(Mutex::new(Vec::new())),
            history: DashMap::new(),
        }
    }

    /// Register an account and return its id
    pub fn create_account(&self, name: &str, balance: Cash) -> UserId {
        let account = Account::new(name, balance);
        let id = account.id;
        self.accounts.insert(
            id,
            Arc::new(Mutex::new(AccountState {
                account,
                holdings: HashMap::new(),
            })),
        );
        id
    }

    /// Committed balance for one account
    pub async fn balance_of(&self, user: UserId) -> Result<Cash, StoreError> {
        let cell = self.cell(user)?;
        let state = cell.lock().await;
        Ok(state.account.balance)
    }

    /// Committed holdings for one account
    pub async fn holdings_of(&self, user: UserId) -> Result<Vec<Holding>, StoreError> {
        let cell = self.cell(user)?;
        let state = cell.lock().await;
        Ok(state.holdings.values().cloned().collect())
    }

    /// Closed-candle history persisted at trigger boundaries
    pub fn candle_history(&self, id: &InstrumentId) -> Vec<Candle> {
        self.history
            .get(id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// Every ledger entry for one account, oldest first
    pub async fn transactions_for(&self, user: UserId) -> Vec<Transaction> {
        let tape = self.tape.lock().await;
        tape.iter().filter(|tx| tx.user == user).cloned().collect()
    }

    fn cell(&self, user: UserId) -> Result<Arc<Mutex<AccountState>>, StoreError> {
        self.accounts
            .get(&user)
            .map(|entry| entry.value().clone())
            .ok_or(StoreError::UnknownUser(user))
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedger {
    async fn begin(&self, user: UserId) -> Result<Box<dyn AccountTxn>, StoreError> {
        let cell = self.cell(user)?;
        // Holding this guard until commit/drop is the per-user boundary
        let guard = cell.lock_owned().await;

        let balance = guard.account.balance;
        let holdings = guard.holdings.clone();

        Ok(Box::new(InMemoryTxn {
            guard,
            tape: self.tape.clone(),
            balance,
            holdings,
            appended: Vec::new(),
        }))
    }

    async fn users_with_holdings(&self) -> Result<Vec<UserId>, StoreError> {
        // Snapshot the cells first so no dashmap ref is held across an await
        let cells: Vec<(UserId, Arc<Mutex<AccountState>>)> = self
            .accounts
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();

        let mut users = Vec::new();
        for (user, cell) in cells {
            if !cell.lock().await.holdings.is_empty() {
                users.push(user);
            }
        }
        Ok(users)
    }

    async fn last_fill_after(
        &self,
        instrument: &InstrumentId,
        after: Timestamp,
    ) -> Result<Option<Transaction>, StoreError> {
        let tape = self.tape.lock().await;
        Ok(tape
            .iter()
            .rev()
            .find(|tx| &tx.instrument == instrument && tx.timestamp > after)
            .cloned())
    }

    async fn save_candle(
        &self,
        instrument: &InstrumentId,
        candle: &Candle,
    ) -> Result<(), StoreError> {
        self.history
            .entry(instrument.clone())
            .or_default()
            .push(candle.clone());
        Ok(())
    }
}

/// Open unit of work against one account
///
/// Mutations stage against copies; `commit` publishes them under the guard.
/// Dropping without commit discards the staged state (rollback).
struct InMemoryTxn {
    guard: OwnedMutexGuard<AccountState>,
    tape: Arc<Mutex<Vec<Transaction>>>,
    balance: Cash,
    holdings: HashMap<InstrumentId, Holding>,
    appended: Vec<Transaction>,
}

#[async_trait]
impl AccountTxn for InMemoryTxn {
    fn balance(&self) -> Cash {
        self.balance
    }

    fn set_balance(&mut self, balance: Cash) {
        self.balance = balance;
    }

    fn holding(&self, instrument: &InstrumentId) -> Option<Holding> {
        self.holdings.get(instrument).cloned()
    }

    fn holdings(&self) -> Vec<Holding> {
        self.holdings.values().cloned().collect()
    }

    fn put_holding(&mut self, holding: Holding) {
        self.holdings.insert(holding.instrument.clone(), holding);
    }

    fn delete_holding(&mut self, instrument: &InstrumentId) {
        self.holdings.remove(instrument);
    }

    fn append_transaction(&mut self, transaction: Transaction) {
        self.appended.push(transaction);
    }

    async fn commit(mut self: Box<Self>) -> Result<(), StoreError> {
        self.guard.account.balance = self.balance;
        self.guard.holdings = std::mem::take(&mut self.holdings);
        if !self.appended.is_empty() {
            let mut tape = self.tape.lock().await;
            tape.append(&mut self.appended);
        }
        Ok(())
    }
}
