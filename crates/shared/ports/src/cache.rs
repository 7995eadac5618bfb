use agora_core::InstrumentId;
use async_trait::async_trait;

use crate::error::CacheError;

/// Port for the quote cache collaborator
///
/// Values are opaque serialized candle blobs (`Candle::encode`/`decode`);
/// the cache itself never interprets them. A `set` replaces the whole blob
/// for a key, so readers always observe a fully written candle.
#[async_trait]
pub trait QuoteCache: Send + Sync {
    /// Fetch the current blob for an instrument, `None` if unseeded
    async fn get(&self, key: &InstrumentId) -> Result<Option<String>, CacheError>;

    /// Overwrite the blob for an instrument (idempotent)
    async fn set(&self, key: &InstrumentId, blob: String) -> Result<(), CacheError>;
}
