mod account;
mod holding;
mod side;
mod transaction;

pub use account::Account;
pub use holding::Holding;
pub use side::PositionSide;
pub use transaction::Transaction;
