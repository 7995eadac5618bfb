mod bankruptcy;
mod execution;
mod scheduler;

pub use bankruptcy::BankruptcyMonitor;
pub use execution::{ExecutionEngine, ExecutionReceipt, PricingPolicy};
pub use scheduler::{SchedulerConfig, TickScheduler};
