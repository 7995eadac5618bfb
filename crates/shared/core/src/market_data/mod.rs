mod candle;

pub use candle::{Candle, CandleError, QuoteUpdate};
