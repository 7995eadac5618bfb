use std::sync::Arc;

use agora_core::{Candle, InstrumentId};
use agora_ports::QuoteCache;

use crate::error::{Result, SimError};

/// The single authoritative current quote per instrument
///
/// A thin typed layer over the quote cache collaborator: candles are stored
/// as opaque encoded blobs and replaced whole, so concurrent readers never
/// observe a partially updated candle. No history is retained here - closed
/// candles are persisted by the ledger at each trigger boundary.
#[derive(Clone)]
pub struct PriceStore {
    cache: Arc<dyn QuoteCache>,
}

impl PriceStore {
    pub fn new(cache: Arc<dyn QuoteCache>) -> Self {
        Self { cache }
    }

    /// Current candle for an instrument, `NotFound` if never seeded
    pub async fn get(&self, id: &InstrumentId) -> Result<Candle> {
        let blob = self
            .cache
            .get(id)
            .await?
            .ok_or_else(|| SimError::NotFound(format!("no quote for instrument {id}")))?;
        Ok(Candle::decode(&blob)?)
    }

    /// Overwrite the current candle for an instrument (idempotent)
    pub async fn set(&self, id: &InstrumentId, candle: &Candle) -> Result<()> {
        let blob = candle.encode()?;
        self.cache.set(id, blob).await?;
        Ok(())
    }
}
