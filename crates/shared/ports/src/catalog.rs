use agora_core::{Instrument, InstrumentId};
use async_trait::async_trait;

use crate::error::StoreError;

/// Port for the instrument catalog collaborator
///
/// The catalog owns instrument records; the simulation only reads them.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// All instruments known to the catalog
    async fn list_instruments(&self) -> Result<Vec<Instrument>, StoreError>;

    /// Look up one instrument, failing with `UnknownInstrument` if absent
    async fn get_instrument(&self, id: &InstrumentId) -> Result<Instrument, StoreError>;
}
