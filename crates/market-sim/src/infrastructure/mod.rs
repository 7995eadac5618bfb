mod broadcast;
mod memory;
mod price_store;

pub use broadcast::{ChannelQuoteSink, NullQuoteSink, QuoteFrame};
pub use memory::{InMemoryCatalog, InMemoryLedger, InMemoryQuoteCache};
pub use price_store::PriceStore;
