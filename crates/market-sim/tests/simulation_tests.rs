//! End-to-end simulation tests
//!
//! These wire the full stack together - catalog, price store, ledger,
//! scheduler, execution engine, bankruptcy monitor - over the in-memory
//! adapters and a manual clock, and drive the tick state machine directly
//! for deterministic runs.

use std::sync::Arc;
use std::time::Duration;

use agora_clock::ManualClock;
use agora_core::{Instrument, InstrumentId, PositionSide, Timestamp};
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use market_sim::infrastructure::{
    ChannelQuoteSink, InMemoryCatalog, InMemoryLedger, InMemoryQuoteCache, PriceStore,
};
use market_sim::{
    ExecutionEngine, Pattern, PricingPolicy, SchedulerConfig, SimError, TickScheduler,
    TransitionEvent,
};

fn epoch() -> Timestamp {
    Utc.with_ymd_and_hms(2024, 1, 1, 9, 30, 0).unwrap()
}

struct Market {
    scheduler: Arc<TickScheduler>,
    prices: PriceStore,
    ledger: Arc<InMemoryLedger>,
    clock: Arc<ManualClock>,
    sink: Arc<ChannelQuoteSink>,
    acme: InstrumentId,
}

/// Slow cadence so the spawned worker never fires during a test; ticks are
/// driven by hand. Ten updates per candle, as in the default config.
fn slow_config() -> SchedulerConfig {
    SchedulerConfig {
        update: Duration::from_secs(60),
        trigger: Duration::from_secs(600),
        ..SchedulerConfig::default()
    }
}

fn market(seed: u64, pricing: PricingPolicy) -> Market {
    let _ = env_logger::builder().is_test(true).try_init();

    let acme = InstrumentId::new("ACME");
    let catalog = Arc::new(InMemoryCatalog::new(vec![
        Instrument::new(acme.clone(), "Acme Corp", "industrials"),
        Instrument::new("GLOBEX", "Globex Holdings", "tech"),
    ]));
    let prices = PriceStore::new(Arc::new(InMemoryQuoteCache::new()));
    let ledger = Arc::new(InMemoryLedger::new());
    let clock = Arc::new(ManualClock::new(Some(epoch())));
    let sink = Arc::new(ChannelQuoteSink::new(64));

    let scheduler = Arc::new(TickScheduler::with_seed(
        catalog,
        prices.clone(),
        ledger.clone(),
        sink.clone(),
        clock.clone(),
        pricing,
        slow_config(),
        seed,
    ));

    Market {
        scheduler,
        prices,
        ledger,
        clock,
        sink,
        acme,
    }
}

fn engine(m: &Market, pricing: PricingPolicy) -> ExecutionEngine {
    ExecutionEngine::new(m.prices.clone(), m.ledger.clone(), pricing, m.clock.clone())
}

#[tokio::test]
async fn test_lifecycle_start_trade_stop() {
    let m = market(1, PricingPolicy::default());

    m.scheduler.start().await.unwrap();
    assert!(m.scheduler.is_running());

    // Both catalog instruments got their opening candle
    assert_eq!(m.prices.get(&m.acme).await.unwrap().close, 100.0);
    assert_eq!(
        m.prices.get(&InstrumentId::new("GLOBEX")).await.unwrap().close,
        100.0
    );

    let user = m.ledger.create_account("alice", 10_000.0);
    let eng = engine(&m, PricingPolicy::default());
    let receipt = eng.buy(user, &m.acme, 10).await.unwrap();
    assert_eq!(receipt.holding_after.unwrap().quantity, 10);

    m.scheduler.stop().await.unwrap();
    assert!(!m.scheduler.is_running());

    // Admin surface is closed once stopped
    assert!(matches!(
        m.scheduler.add_pattern(&m.acme, Pattern::Rectangle).await,
        Err(SimError::NotRunning)
    ));
}

#[tokio::test]
async fn test_scripted_transition_reaches_its_target_exactly() {
    let m = market(2, PricingPolicy::default());
    m.scheduler.start().await.unwrap();

    m.scheduler
        .add_events(&m.acme, vec![TransitionEvent::new(100.0, 150.0, 1).unwrap()])
        .await
        .unwrap();

    // Ticks 1..=8 leave the queue alone; tick 9 consumes the single step
    for _ in 0..9 {
        m.clock.advance(ChronoDuration::seconds(60));
        m.scheduler.tick().await.unwrap();
    }
    assert_eq!(m.prices.get(&m.acme).await.unwrap().close, 150.0);
    assert_eq!(m.scheduler.queue_depth(&m.acme), 0);

    // With the queue drained, updates fall back to organic drift
    m.clock.advance(ChronoDuration::seconds(60));
    m.scheduler.tick().await.unwrap(); // tick 10: candle roll
    let mut previous = m.prices.get(&m.acme).await.unwrap().close;
    for _ in 0..3 {
        m.clock.advance(ChronoDuration::seconds(60));
        m.scheduler.tick().await.unwrap();
        let close = m.prices.get(&m.acme).await.unwrap().close;
        assert!((close - previous).abs() <= previous * 0.001 + 1e-9);
        previous = close;
    }

    m.scheduler.stop().await.unwrap();
}

#[tokio::test]
async fn test_exhausted_queued_event_never_stalls_the_tick() {
    let m = market(9, PricingPolicy::default());
    m.scheduler.start().await.unwrap();

    // An event drained to its terminal state before being queued
    let mut stale = TransitionEvent::new(100.0, 120.0, 1).unwrap();
    let mut rng = StdRng::seed_from_u64(0);
    stale.next(&mut rng).unwrap();
    assert!(stale.is_finished());

    m.scheduler
        .add_events(
            &m.acme,
            vec![stale, TransitionEvent::new(100.0, 130.0, 1).unwrap()],
        )
        .await
        .unwrap();

    for _ in 0..9 {
        m.clock.advance(ChronoDuration::seconds(60));
        m.scheduler.tick().await.unwrap();
    }

    // The terminal head was discarded and the live event behind it fired
    assert_eq!(m.prices.get(&m.acme).await.unwrap().close, 130.0);
    assert_eq!(m.scheduler.queue_depth(&m.acme), 0);

    // The other instrument kept ticking through all nine updates
    let globex = m.prices.get(&InstrumentId::new("GLOBEX")).await.unwrap();
    assert!(globex.high > globex.low);
    assert!((globex.close - 100.0).abs() < 100.0 * 0.01);

    m.scheduler.stop().await.unwrap();
}

#[tokio::test]
async fn test_pattern_legs_chain_and_drain_over_candles() {
    let m = market(3, PricingPolicy::default());
    m.scheduler.start().await.unwrap();

    m.scheduler
        .add_pattern(&m.acme, Pattern::DoubleTop)
        .await
        .unwrap();
    let depth = m.scheduler.queue_depth(&m.acme);
    assert!(depth > 0);

    // One pattern-eligible tick per ten; drive two full candles
    for _ in 0..20 {
        m.clock.advance(ChronoDuration::seconds(60));
        m.scheduler.tick().await.unwrap();
    }

    // Heads drain monotonically, never grow
    assert!(m.scheduler.queue_depth(&m.acme) <= depth);
    let candle = m.prices.get(&m.acme).await.unwrap();
    assert!(candle.close.is_finite() && candle.close > 0.0);

    m.scheduler.stop().await.unwrap();
}

#[tokio::test]
async fn test_same_seed_same_clock_replays_identical_prices() {
    let mut closes = Vec::new();
    for _run in 0..2 {
        let m = market(42, PricingPolicy::default());
        m.scheduler.seed().await.unwrap();

        let mut path = Vec::new();
        for _ in 0..25 {
            m.clock.advance(ChronoDuration::seconds(60));
            m.scheduler.tick().await.unwrap();
            path.push(m.prices.get(&m.acme).await.unwrap());
        }
        closes.push(path);
    }
    assert_eq!(closes[0], closes[1]);
}

#[tokio::test]
async fn test_candle_history_accumulates_in_order() {
    let m = market(4, PricingPolicy::default());
    m.scheduler.seed().await.unwrap();

    for _ in 0..30 {
        m.clock.advance(ChronoDuration::seconds(60));
        m.scheduler.tick().await.unwrap();
    }

    let history = m.ledger.candle_history(&m.acme);
    assert_eq!(history.len(), 3);
    assert!(history.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    for candle in &history {
        assert!(candle.low <= candle.open && candle.open <= candle.high);
        assert!(candle.low <= candle.close && candle.close <= candle.high);
    }
}

#[tokio::test]
async fn test_subscribers_see_every_tick_frame() {
    let m = market(5, PricingPolicy::default());
    m.scheduler.seed().await.unwrap();
    let mut rx = m.sink.subscribe();

    m.scheduler.tick().await.unwrap();
    let frame = rx.recv().await.unwrap();

    assert_eq!(frame.len(), 2);
    let update = &frame[&m.acme];
    assert_eq!(update.close, m.prices.get(&m.acme).await.unwrap().close);
}

#[tokio::test]
async fn test_bankruptcy_fires_inside_the_tick() {
    let pricing = PricingPolicy::FixedSpread { spread: 0.0 };
    let m = market(6, pricing);
    m.scheduler.start().await.unwrap();

    let user = m.ledger.create_account("leveraged", 1_100.0);
    let eng = engine(&m, pricing);
    eng.buy(user, &m.acme, 10).await.unwrap();
    assert_eq!(m.ledger.balance_of(user).await.unwrap(), 100.0);

    // Crash the price in one scripted step; the sweep runs in the same tick
    m.scheduler
        .add_events(&m.acme, vec![TransitionEvent::new(100.0, 50.0, 1).unwrap()])
        .await
        .unwrap();
    for _ in 0..9 {
        m.scheduler.tick().await.unwrap();
    }

    assert_eq!(m.prices.get(&m.acme).await.unwrap().close, 50.0);
    assert_eq!(m.ledger.balance_of(user).await.unwrap(), 0.0);
    assert!(m.ledger.holdings_of(user).await.unwrap().is_empty());

    m.scheduler.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_orders_serialize_per_user() {
    let pricing = PricingPolicy::FixedSpread { spread: 0.0 };
    let m = market(7, pricing);
    m.scheduler.seed().await.unwrap();

    let user = m.ledger.create_account("busy", 10_000.0);
    let eng = engine(&m, pricing);

    let mut tasks = Vec::new();
    for i in 0..8 {
        let eng = eng.clone();
        let id = m.acme.clone();
        tasks.push(tokio::spawn(async move {
            for _ in 0..10 {
                // Rejections (insufficient balance) are expected under
                // contention; torn read-modify-write is not
                let _ = if i % 2 == 0 {
                    eng.buy(user, &id, 5).await
                } else {
                    eng.sell(user, &id, 5).await
                };
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    // At a constant quote with zero spread every fill conserves equity, so
    // any interleaving bug shows up as leaked or conjured cash
    let balance = m.ledger.balance_of(user).await.unwrap();
    assert!(balance >= 0.0);

    let position_value: f64 = m
        .ledger
        .holdings_of(user)
        .await
        .unwrap()
        .iter()
        .map(|h| {
            if h.quantity > 0 {
                h.quantity as f64 * h.average_price
            } else {
                h.short_proceeds
            }
        })
        .sum();
    assert!((balance + position_value - 10_000.0).abs() < 1e-6);
}

#[tokio::test]
async fn test_short_round_trip_through_exit() {
    let pricing = PricingPolicy::FixedSpread { spread: 0.0 };
    let m = market(8, pricing);
    m.scheduler.seed().await.unwrap();

    let user = m.ledger.create_account("bear", 2_000.0);
    let eng = engine(&m, pricing);

    eng.sell(user, &m.acme, 10).await.unwrap();
    assert_eq!(m.ledger.balance_of(user).await.unwrap(), 1_000.0);

    // Price falls 10%, then cover the short via exit at quote * 1.005
    let mut candle = m.prices.get(&m.acme).await.unwrap();
    candle.set_value(90.0);
    m.prices.set(&m.acme, &candle).await.unwrap();

    let err = eng.exit(user, &m.acme, PositionSide::Long).await.unwrap_err();
    assert!(matches!(err, SimError::NoPosition(PositionSide::Long)));

    let receipt = eng.exit(user, &m.acme, PositionSide::Short).await.unwrap();
    // Margin back (1000) plus (100 - 90.45) * 10 profit
    let expected = 1_000.0 + 1_000.0 + (100.0 - 90.0 * 1.005) * 10.0;
    assert!((receipt.balance_after - expected).abs() < 1e-9);
    assert!(receipt.holding_after.is_none());
    assert_eq!(m.ledger.holdings_of(user).await.unwrap().len(), 0);
}
