//! Quote broadcast adapters
//!
//! `ChannelQuoteSink` fans updates out over a tokio broadcast channel for
//! single-process embedding (a WebSocket layer subscribes and forwards).
//! `NullQuoteSink` drops everything - useful for headless tests.

use std::collections::HashMap;

use agora_core::{InstrumentId, QuoteUpdate};
use agora_ports::{BroadcastError, QuoteSink};
use async_trait::async_trait;
use tokio::sync::broadcast;

/// One tick's worth of quote updates, as delivered to subscribers
pub type QuoteFrame = HashMap<InstrumentId, QuoteUpdate>;

/// Broadcast-channel backed quote sink
pub struct ChannelQuoteSink {
    tx: broadcast::Sender<QuoteFrame>,
}

impl ChannelQuoteSink {
    /// Create a sink with the given subscriber buffer capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Get a new subscription to the quote stream
    pub fn subscribe(&self) -> broadcast::Receiver<QuoteFrame> {
        self.tx.subscribe()
    }

    /// Number of currently connected subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[async_trait]
impl QuoteSink for ChannelQuoteSink {
    async fn broadcast(&self, updates: &QuoteFrame) -> Result<(), BroadcastError> {
        // send fails only when nobody is subscribed; the engine treats
        // broadcast as fire-and-forget either way
        self.tx
            .send(updates.clone())
            .map(|_| ())
            .map_err(|_| BroadcastError::NoSubscribers)
    }
}

/// Sink that discards every update
pub struct NullQuoteSink;

#[async_trait]
impl QuoteSink for NullQuoteSink {
    async fn broadcast(&self, _updates: &QuoteFrame) -> Result<(), BroadcastError> {
        Ok(())
    }
}
