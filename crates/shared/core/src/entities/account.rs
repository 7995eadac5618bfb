use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::values::{Cash, UserId};

/// A trading account: identity plus a single cash balance
///
/// The balance is mutated only by the execution engine and the bankruptcy
/// monitor, always inside the same transactional boundary as the holding
/// and ledger mutations it accompanies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: UserId,
    pub name: String,
    pub balance: Cash,
}

impl Account {
    pub fn new(name: impl Into<String>, balance: Cash) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            balance,
        }
    }
}
