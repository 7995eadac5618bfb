//! The price tick scheduler
//!
//! Owns the simulation loop: on every update tick each instrument's current
//! candle moves, and on every trigger boundary the candle closes into
//! history and a fresh one opens. Between boundaries the next close comes
//! from, in priority order, the instrument's scripted pattern queue, the
//! most recent fill on the tape, or organic random drift.
//!
//! The scheduler is an owned object; embeddings construct one per market and
//! share it behind an `Arc`. `tick` is public so tests can drive the state
//! machine directly against a manual clock instead of the spawned worker.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use agora_core::{Candle, InstrumentId, Price, QuoteUpdate};
use agora_ports::{Catalog, Clock, LedgerStore, QuoteSink, StoreError};
use dashmap::DashMap;
use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;

use crate::application::{BankruptcyMonitor, ExecutionEngine, PricingPolicy};
use crate::error::{Result, SimError};
use crate::event::TransitionEvent;
use crate::infrastructure::PriceStore;
use crate::patterns::Pattern;

/// Quotes never print below this
const PRICE_FLOOR: Price = 0.01;

/// Tick cadence and price dynamics
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Price every instrument's first candle opens at
    pub initial_value: Price,

    /// Interval between update ticks
    pub update: Duration,

    /// Interval between candle closes; a whole multiple of `update`
    pub trigger: Duration,

    /// Half-width of the organic per-tick drift, as a fraction of the close
    pub drift: f64,

    /// Half-width of the opening-gap jitter applied when a candle rolls,
    /// scaled by the closed candle's |open - close|
    pub roll_jitter: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            initial_value: 100.0,
            update: Duration::from_secs(1),
            trigger: Duration::from_secs(10),
            drift: 0.001,
            roll_jitter: 0.01,
        }
    }
}

impl SchedulerConfig {
    /// Update ticks per candle window
    fn ticks_per_candle(&self) -> u64 {
        let update = self.update.as_millis().max(1);
        ((self.trigger.as_millis() / update) as u64).max(1)
    }
}

/// Drives the simulated market forward on a fixed schedule
pub struct TickScheduler {
    catalog: Arc<dyn Catalog>,
    prices: PriceStore,
    ledger: Arc<dyn LedgerStore>,
    sink: Arc<dyn QuoteSink>,
    clock: Arc<dyn Clock>,
    monitor: BankruptcyMonitor,
    config: SchedulerConfig,

    /// Scripted price paths per instrument, consumed head-first
    queues: DashMap<InstrumentId, VecDeque<TransitionEvent>>,
    rng: Mutex<StdRng>,

    running: AtomicBool,
    ticks: AtomicU64,
    shutdown: Notify,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl TickScheduler {
    /// Build a scheduler with a nondeterministically seeded RNG
    pub fn new(
        catalog: Arc<dyn Catalog>,
        prices: PriceStore,
        ledger: Arc<dyn LedgerStore>,
        sink: Arc<dyn QuoteSink>,
        clock: Arc<dyn Clock>,
        pricing: PricingPolicy,
        config: SchedulerConfig,
    ) -> Self {
        Self::with_seed(
            catalog,
            prices,
            ledger,
            sink,
            clock,
            pricing,
            config,
            rand::random(),
        )
    }

    /// Build a scheduler whose every random draw replays from `seed`
    #[allow(clippy::too_many_arguments)]
    pub fn with_seed(
        catalog: Arc<dyn Catalog>,
        prices: PriceStore,
        ledger: Arc<dyn LedgerStore>,
        sink: Arc<dyn QuoteSink>,
        clock: Arc<dyn Clock>,
        pricing: PricingPolicy,
        config: SchedulerConfig,
        seed: u64,
    ) -> Self {
        let engine = ExecutionEngine::new(prices.clone(), ledger.clone(), pricing, clock.clone());
        let monitor = BankruptcyMonitor::new(ledger.clone(), engine);
        Self {
            catalog,
            prices,
            ledger,
            sink,
            clock,
            monitor,
            config,
            queues: DashMap::new(),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            running: AtomicBool::new(false),
            ticks: AtomicU64::new(0),
            shutdown: Notify::new(),
            worker: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Queued transition events still pending for an instrument
    pub fn queue_depth(&self, id: &InstrumentId) -> usize {
        self.queues.get(id).map(|q| q.len()).unwrap_or(0)
    }

    /// Start the simulation. Calling on an already-running scheduler is a
    /// no-op; the first call seeds a flat candle for every catalog
    /// instrument that has no quote yet and spawns the tick worker.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            debug!("scheduler already running, start ignored");
            return Ok(());
        }

        if let Err(e) = self.seed().await {
            self.running.store(false, Ordering::SeqCst);
            return Err(e);
        }

        match self.spawn_loop().await {
            Err(SimError::AlreadyRunning) => Ok(()),
            other => other,
        }
    }

    /// Stop the simulation, joining the in-flight tick before returning.
    /// Fails with `NotRunning` when the scheduler is stopped.
    pub async fn stop(&self) -> Result<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Err(SimError::NotRunning);
        }
        self.shutdown.notify_waiters();

        let handle = self.worker.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("tick worker did not shut down cleanly: {e}");
            }
        }
        info!("scheduler stopped after {} ticks", self.ticks.load(Ordering::SeqCst));
        Ok(())
    }

    /// Seed a flat candle at `initial_value` for every catalog instrument
    /// that does not have one yet. Idempotent.
    pub async fn seed(&self) -> Result<()> {
        let now = self.clock.now();
        for instrument in self.catalog.list_instruments().await? {
            if self.prices.get(&instrument.id).await.is_ok() {
                continue;
            }
            let candle = Candle::flat(self.config.initial_value, now);
            self.prices.set(&instrument.id, &candle).await?;
            debug!("seeded {} at {:.2}", instrument.id, self.config.initial_value);
        }
        Ok(())
    }

    /// Append pre-built transition events to an instrument's pattern queue
    pub async fn add_events(&self, id: &InstrumentId, events: Vec<TransitionEvent>) -> Result<()> {
        self.ensure_running()?;
        self.ensure_listed(id).await?;
        self.queues.entry(id.clone()).or_default().extend(events);
        Ok(())
    }

    /// Generate a named chart pattern anchored at the instrument's current
    /// close and queue its legs
    pub async fn add_pattern(&self, id: &InstrumentId, pattern: Pattern) -> Result<()> {
        self.ensure_running()?;
        self.ensure_listed(id).await?;

        let anchor = self.prices.get(id).await?.close;
        let events = {
            let mut rng = self.rng.lock().await;
            pattern.generate(anchor, &mut *rng)
        };
        info!("queueing {pattern} on {id}: {} legs from {anchor:.2}", events.len());
        self.queues.entry(id.clone()).or_default().extend(events);
        Ok(())
    }

    /// Advance the market by one tick.
    ///
    /// Public so tests can drive the scheduler deterministically; the
    /// spawned worker calls this on every `update` interval.
    pub async fn tick(&self) -> Result<()> {
        let n = self.ticks.fetch_add(1, Ordering::SeqCst) + 1;
        let per_candle = self.config.ticks_per_candle();
        let boundary = n % per_candle == 0;
        let last_before_boundary = (n + 1) % per_candle == 0;

        let instruments = self.catalog.list_instruments().await?;
        let now = self.clock.now();
        let mut frame = HashMap::new();
        let mut snapshot: HashMap<InstrumentId, Price> = HashMap::new();

        for instrument in &instruments {
            let id = &instrument.id;
            let current = match self.prices.get(id).await {
                Ok(candle) => candle,
                Err(e) => {
                    warn!("no quote for {id}, skipping tick: {e}");
                    continue;
                }
            };

            let next = if boundary {
                match self.roll_candle(id, &current, now).await {
                    Some(fresh) => fresh,
                    // Persistence failed; keep the current candle this tick
                    None => current,
                }
            } else {
                let close = match self.next_close(id, &current, last_before_boundary).await {
                    Ok(close) => close,
                    // One instrument's failure never aborts the tick for the
                    // rest, nor the sweep and broadcast below
                    Err(e) => {
                        warn!("price update failed for {id}, holding last quote: {e}");
                        current.close
                    }
                };
                let mut moved = current;
                moved.set_value(close.max(PRICE_FLOOR));
                moved
            };

            if let Err(e) = self.prices.set(id, &next).await {
                error!("quote write failed for {id}: {e}");
                continue;
            }
            snapshot.insert(id.clone(), next.close);
            frame.insert(id.clone(), QuoteUpdate::from_candle(id.clone(), &next));
        }

        // Sweep strictly after every quote write of this tick, against the
        // exact snapshot about to go out
        match self.monitor.sweep(&snapshot).await {
            Ok(liquidated) if !liquidated.is_empty() => {
                info!("liquidated {} bankrupt account(s)", liquidated.len());
            }
            Ok(_) => {}
            Err(e) => error!("bankruptcy sweep failed: {e}"),
        }

        if let Err(e) = self.sink.broadcast(&frame).await {
            debug!("quote broadcast dropped: {e}");
        }
        Ok(())
    }

    /// Close the current candle into history and open its successor.
    /// Returns `None` when persistence fails; the roll is skipped for this
    /// instrument only.
    async fn roll_candle(
        &self,
        id: &InstrumentId,
        closing: &Candle,
        now: agora_core::Timestamp,
    ) -> Option<Candle> {
        if let Err(e) = self.ledger.save_candle(id, closing).await {
            error!("candle history write failed for {id}, roll skipped: {e}");
            return None;
        }

        let jitter = {
            let mut rng = self.rng.lock().await;
            rng.gen_range(-self.config.roll_jitter..=self.config.roll_jitter)
        };
        let gap = (closing.open - closing.close).abs() * jitter;
        let open = (closing.close + gap).max(PRICE_FLOOR);
        Some(Candle::flat(open, now))
    }

    /// Choose the next close for one instrument on an update tick
    async fn next_close(
        &self,
        id: &InstrumentId,
        current: &Candle,
        pattern_eligible: bool,
    ) -> Result<Price> {
        // Scripted path wins, but only on the last update before a boundary
        if pattern_eligible {
            let mut rng = self.rng.lock().await;
            if let Some(mut queue) = self.queues.get_mut(id) {
                while let Some(event) = queue.front_mut() {
                    match event.next(&mut *rng) {
                        Ok(value) => {
                            if event.is_finished() {
                                queue.pop_front();
                            }
                            return Ok(value);
                        }
                        // An already-terminal event can only arrive through
                        // add_events; discard it so it cannot stall the head
                        Err(e) => {
                            warn!("dropping exhausted queued event on {id}: {e}");
                            queue.pop_front();
                        }
                    }
                }
            }
        }

        // Otherwise the tape prints through
        if let Some(fill) = self.ledger.last_fill_after(id, current.timestamp).await? {
            debug!("{id} printing through fill at {:.2}", fill.per_unit());
            return Ok(fill.per_unit().max(PRICE_FLOOR));
        }

        // Organic drift
        let mut rng = self.rng.lock().await;
        let drift = rng.gen_range(-self.config.drift..=self.config.drift);
        Ok(current.close * (1.0 + drift))
    }

    fn ensure_running(&self) -> Result<()> {
        if self.is_running() {
            Ok(())
        } else {
            Err(SimError::NotRunning)
        }
    }

    async fn ensure_listed(&self, id: &InstrumentId) -> Result<()> {
        match self.catalog.get_instrument(id).await {
            Ok(_) => Ok(()),
            Err(StoreError::UnknownInstrument(_)) => {
                Err(SimError::NotFound(format!("unknown instrument {id}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Spawn the background worker. Guarded: a second call while a worker
    /// is installed fails with `AlreadyRunning`.
    async fn spawn_loop(self: &Arc<Self>) -> Result<()> {
        let mut slot = self.worker.lock().await;
        if slot.is_some() {
            return Err(SimError::AlreadyRunning);
        }

        let scheduler = Arc::clone(self);
        *slot = Some(tokio::spawn(async move {
            scheduler.run_loop().await;
        }));
        info!(
            "scheduler started: update {:?}, trigger {:?}, clock {}",
            self.config.update,
            self.config.trigger,
            self.clock.name()
        );
        Ok(())
    }

    async fn run_loop(&self) {
        let mut interval = tokio::time::interval(self.config.update);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first interval tick fires immediately; skip it so the seeded
        // candles stand for one full update
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if !self.is_running() {
                        break;
                    }
                    if let Err(e) = self.tick().await {
                        error!("tick failed: {e}");
                    }
                }
                _ = self.shutdown.notified() => break,
            }
        }
        debug!("tick worker exited");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::{InMemoryCatalog, InMemoryLedger, InMemoryQuoteCache, NullQuoteSink};
    use agora_clock::ManualClock;
    use agora_core::Instrument;
    use chrono::Duration as ChronoDuration;

    struct Fixture {
        scheduler: Arc<TickScheduler>,
        prices: PriceStore,
        ledger: Arc<InMemoryLedger>,
        clock: Arc<ManualClock>,
        id: InstrumentId,
    }

    fn fixture(seed: u64) -> Fixture {
        let id = InstrumentId::new("ACME");
        let catalog = Arc::new(InMemoryCatalog::new(vec![Instrument::new(
            id.clone(),
            "Acme Corp",
            "industrials",
        )]));
        let prices = PriceStore::new(Arc::new(InMemoryQuoteCache::new()));
        let ledger = Arc::new(InMemoryLedger::new());
        let clock = Arc::new(ManualClock::new(None));
        let scheduler = Arc::new(TickScheduler::with_seed(
            catalog,
            prices.clone(),
            ledger.clone(),
            Arc::new(NullQuoteSink),
            clock.clone(),
            PricingPolicy::default(),
            SchedulerConfig::default(),
            seed,
        ));
        Fixture {
            scheduler,
            prices,
            ledger,
            clock,
            id,
        }
    }

    #[tokio::test]
    async fn test_seed_opens_flat_candles_once() {
        let fx = fixture(7);
        fx.scheduler.seed().await.unwrap();

        let candle = fx.prices.get(&fx.id).await.unwrap();
        assert_eq!(candle, Candle::flat(100.0, candle.timestamp));

        // Re-seeding after the price moved must not clobber it
        fx.scheduler.tick().await.unwrap();
        let moved = fx.prices.get(&fx.id).await.unwrap();
        fx.scheduler.seed().await.unwrap();
        assert_eq!(fx.prices.get(&fx.id).await.unwrap(), moved);
    }

    #[tokio::test]
    async fn test_update_ticks_drift_within_bounds() {
        let fx = fixture(11);
        fx.scheduler.seed().await.unwrap();

        for _ in 0..5 {
            fx.scheduler.tick().await.unwrap();
            let candle = fx.prices.get(&fx.id).await.unwrap();
            assert!(candle.low <= candle.close && candle.close <= candle.high);
        }
        let candle = fx.prices.get(&fx.id).await.unwrap();
        // Five drifts of at most 0.1% each
        assert!((candle.close - 100.0).abs() < 100.0 * 0.006);
        assert_eq!(candle.open, 100.0);
    }

    #[tokio::test]
    async fn test_trigger_boundary_rolls_candle_into_history() {
        let fx = fixture(13);
        fx.scheduler.seed().await.unwrap();

        for _ in 0..10 {
            fx.clock.advance(ChronoDuration::seconds(1));
            fx.scheduler.tick().await.unwrap();
        }

        let history = fx.ledger.candle_history(&fx.id);
        assert_eq!(history.len(), 1);

        let fresh = fx.prices.get(&fx.id).await.unwrap();
        assert_eq!(fresh.open, fresh.close);
        assert_eq!(fresh.open, fresh.high);
        assert!(fresh.timestamp > history[0].timestamp);
    }

    #[tokio::test]
    async fn test_pattern_queue_advances_only_on_last_update_before_boundary() {
        let fx = fixture(17);
        fx.scheduler.seed().await.unwrap();
        fx.scheduler.running.store(true, Ordering::SeqCst);

        let events = vec![
            TransitionEvent::new(100.0, 120.0, 3).unwrap(),
            TransitionEvent::new(120.0, 90.0, 2).unwrap(),
        ];
        fx.scheduler.add_events(&fx.id, events).await.unwrap();
        assert_eq!(fx.scheduler.queue_depth(&fx.id), 2);

        // Ticks 1..=8 are plain updates: no queue movement
        for _ in 0..8 {
            fx.scheduler.tick().await.unwrap();
        }
        assert_eq!(fx.scheduler.queue_depth(&fx.id), 2);

        // Tick 9 is the last update before the boundary: one draw
        fx.scheduler.tick().await.unwrap();
        let after_draw = fx.prices.get(&fx.id).await.unwrap().close;
        assert!(after_draw <= 120.0);

        // Tick 10 is the boundary: roll only, still no queue movement
        fx.scheduler.tick().await.unwrap();

        // Three more full candles exhaust the first event
        for _ in 0..20 {
            fx.scheduler.tick().await.unwrap();
        }
        assert_eq!(fx.scheduler.queue_depth(&fx.id), 1);
    }

    #[tokio::test]
    async fn test_fills_print_through_to_the_tape() {
        let fx = fixture(19);
        fx.scheduler.seed().await.unwrap();

        let user = fx.ledger.create_account("whale", 1_000_000.0);
        let engine = ExecutionEngine::new(
            fx.prices.clone(),
            fx.ledger.clone(),
            PricingPolicy::FixedSpread { spread: 0.005 },
            fx.clock.clone(),
        );

        // Fill lands strictly after the candle's open timestamp, paying the
        // half-percent spread over the 100.0 quote
        fx.clock.advance(ChronoDuration::seconds(1));
        engine.buy(user, &fx.id, 100).await.unwrap();

        fx.scheduler.tick().await.unwrap();
        let candle = fx.prices.get(&fx.id).await.unwrap();
        assert_eq!(candle.close, 100.5);
        assert_eq!(candle.open, 100.0);
    }

    #[tokio::test]
    async fn test_admin_calls_require_running_and_known_instrument() {
        let fx = fixture(23);
        fx.scheduler.seed().await.unwrap();

        let err = fx
            .scheduler
            .add_pattern(&fx.id, Pattern::DoubleTop)
            .await
            .unwrap_err();
        assert!(matches!(err, SimError::NotRunning));

        fx.scheduler.running.store(true, Ordering::SeqCst);
        let err = fx
            .scheduler
            .add_pattern(&InstrumentId::new("NOPE"), Pattern::DoubleTop)
            .await
            .unwrap_err();
        assert!(matches!(err, SimError::NotFound(_)));

        fx.scheduler.add_pattern(&fx.id, Pattern::DoubleTop).await.unwrap();
        assert!(fx.scheduler.queue_depth(&fx.id) > 0);
    }

    #[tokio::test]
    async fn test_start_is_idempotent_and_stop_joins() {
        let fx = fixture(29);

        fx.scheduler.start().await.unwrap();
        assert!(fx.scheduler.is_running());
        // Second start is a no-op, not an error
        fx.scheduler.start().await.unwrap();

        fx.scheduler.stop().await.unwrap();
        assert!(!fx.scheduler.is_running());
        assert!(matches!(
            fx.scheduler.stop().await,
            Err(SimError::NotRunning)
        ));
    }
}
