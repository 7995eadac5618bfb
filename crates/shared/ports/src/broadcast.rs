use agora_core::{InstrumentId, QuoteUpdate};
use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::BroadcastError;

/// Port for the quote broadcast collaborator
///
/// Fans the tick's updated candle set out to all connected subscribers.
/// Delivery is fire-and-forget from the engine's perspective: a failed
/// broadcast is logged by the caller and never aborts a tick.
#[async_trait]
pub trait QuoteSink: Send + Sync {
    async fn broadcast(
        &self,
        updates: &HashMap<InstrumentId, QuoteUpdate>,
    ) -> Result<(), BroadcastError>;
}
