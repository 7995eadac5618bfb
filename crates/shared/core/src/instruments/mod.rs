mod instrument;

pub use instrument::{Instrument, InstrumentId};
