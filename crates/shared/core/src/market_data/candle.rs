use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::instruments::InstrumentId;
use crate::values::{Price, Timestamp};

/// Errors from candle blob encode/decode
#[derive(Error, Debug)]
pub enum CandleError {
    #[error("Failed to encode candle: {0}")]
    Encode(serde_json::Error),

    #[error("Failed to decode candle: {0}")]
    Decode(serde_json::Error),
}

/// One OHLC price record for a fixed time window
///
/// The timestamp is the candle's open time and is monotonically
/// non-decreasing per instrument. Invariant: `low <= {open, close} <= high`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open: Price,
    pub high: Price,
    pub low: Price,
    pub close: Price,
    pub timestamp: Timestamp,
}

impl Candle {
    /// Open a fresh candle with all four prices at `value`
    pub fn flat(value: Price, timestamp: Timestamp) -> Self {
        Self {
            open: value,
            high: value,
            low: value,
            close: value,
            timestamp,
        }
    }

    /// Move the close to `value`, widening high/low as needed
    pub fn set_value(&mut self, value: Price) {
        self.close = value;
        self.high = self.high.max(value);
        self.low = self.low.min(value);
    }

    /// Serialize to the opaque blob stored in the quote cache
    pub fn encode(&self) -> Result<String, CandleError> {
        serde_json::to_string(self).map_err(CandleError::Encode)
    }

    /// Deserialize from a quote cache blob. Round-trips `encode` exactly.
    pub fn decode(blob: &str) -> Result<Self, CandleError> {
        serde_json::from_str(blob).map_err(CandleError::Decode)
    }
}

/// Broadcast payload for one instrument's current candle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteUpdate {
    pub instrument: InstrumentId,
    pub open: Price,
    pub high: Price,
    pub low: Price,
    pub close: Price,
    pub timestamp: Timestamp,
}

impl QuoteUpdate {
    pub fn from_candle(instrument: InstrumentId, candle: &Candle) -> Self {
        Self {
            instrument,
            open: candle.open,
            high: candle.high,
            low: candle.low,
            close: candle.close,
            timestamp: candle.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_set_value_maintains_ohlc_invariant() {
        let mut candle = Candle::flat(100.0, Utc::now());
        candle.set_value(104.0);
        candle.set_value(97.5);
        candle.set_value(101.0);

        assert_eq!(candle.open, 100.0);
        assert_eq!(candle.high, 104.0);
        assert_eq!(candle.low, 97.5);
        assert_eq!(candle.close, 101.0);
        assert!(candle.low <= candle.open && candle.open <= candle.high);
        assert!(candle.low <= candle.close && candle.close <= candle.high);
    }

    #[test]
    fn test_encode_decode_round_trip_is_exact() {
        let mut candle = Candle::flat(123.456789, Utc::now());
        candle.set_value(123.0001);

        let blob = candle.encode().unwrap();
        let back = Candle::decode(&blob).unwrap();
        assert_eq!(candle, back);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(Candle::decode("not a candle").is_err());
    }
}
