use serde::{Deserialize, Serialize};

/// Unique identifier for an instrument
///
/// This provides a stable reference to an instrument that can be stored
/// in holdings and used as map keys, without copying the full record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstrumentId(pub String);

impl InstrumentId {
    /// Create a new instrument ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for InstrumentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for InstrumentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A tradable instrument in the simulated market
///
/// Instruments are immutable after creation and owned by the catalog
/// collaborator; everything else references them by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    /// Stable identity
    pub id: InstrumentId,
    /// Display name
    pub name: String,
    /// Sector/category label (e.g. "tech", "energy")
    pub category: String,
}

impl Instrument {
    pub fn new(
        id: impl Into<InstrumentId>,
        name: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category: category.into(),
        }
    }
}
