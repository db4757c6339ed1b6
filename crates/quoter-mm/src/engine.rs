//! Market making engine.
//!
//! Two independent timers drive each tracked symbol:
//! - analysis (every `10 × update_interval`): candles + book into a cached
//!   [`MarketCondition`]
//! - reconciliation (every `order_refresh_ms`): cancel policy, dynamic
//!   spread, ladder construction and gap-fill placement
//!
//! Per-symbol failures never escape a cycle; they are logged, counted and
//! emitted as [`EngineEvent::CycleError`].

use std::sync::Arc;

use dashmap::DashMap;
use futures_util::future::join_all;
use parking_lot::Mutex;
use quoter_core::{BookState, OpenOrder, OrderIntent, Price};
use quoter_executor::{OrderError, OrderExecutor};
use quoter_telemetry::Metrics;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::analysis::{MarketCondition, Sentiment, TechnicalAnalyzer};
use crate::config::MakerConfig;
use crate::error::{EngineError, EngineResult};
use crate::events::{EngineEvent, EngineStage};
use crate::history::IndicatorHistory;
use crate::ladder::{build_ladder, dynamic_spread, LadderBounds};
use crate::reconcile::{cancellation_reason, plan_placements, CancelReason};

/// Condition cached per symbol with the time it was computed.
#[derive(Debug, Clone)]
struct CachedCondition {
    condition: MarketCondition,
    updated_at: Instant,
}

/// Result of one reconciliation pass for a symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Book empty or crossed; nothing done.
    Skipped(BookState),
    /// Every resting order was cancelled; nothing placed this cycle.
    Cancelled {
        reason: CancelReason,
        cancelled: usize,
    },
    /// Gap-fill ran.
    Filled {
        placed: usize,
        covered: usize,
        skipped: usize,
        failed: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolStatus {
    pub symbol: String,
    pub tracked_orders: Vec<u64>,
    pub sentiment: Option<Sentiment>,
    pub spread: Option<Decimal>,
    pub condition_age_ms: Option<u64>,
    /// Latest RSI sample.
    pub rsi: Option<f64>,
    /// Mean volatility over the history window.
    pub mean_volatility: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineStatus {
    pub balance: Option<Decimal>,
    pub symbols: Vec<SymbolStatus>,
}

pub struct MarketMakingEngine {
    config: MakerConfig,
    executor: Arc<OrderExecutor>,
    analyzer: Arc<dyn TechnicalAnalyzer>,
    conditions: DashMap<String, CachedCondition>,
    histories: DashMap<String, IndicatorHistory>,
    /// Sentiment seen by the last completed reconciliation.
    reconciled_sentiment: DashMap<String, Sentiment>,
    /// Order ids placed by this engine, per symbol.
    tracked: DashMap<String, Vec<u64>>,
    spreads: DashMap<String, Decimal>,
    balance: Mutex<Option<Decimal>>,
    events: mpsc::UnboundedSender<EngineEvent>,
}

impl MarketMakingEngine {
    pub fn new(
        config: MakerConfig,
        executor: Arc<OrderExecutor>,
        analyzer: Arc<dyn TechnicalAnalyzer>,
    ) -> (Self, mpsc::UnboundedReceiver<EngineEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let engine = Self {
            config,
            executor,
            analyzer,
            conditions: DashMap::new(),
            histories: DashMap::new(),
            reconciled_sentiment: DashMap::new(),
            tracked: DashMap::new(),
            spreads: DashMap::new(),
            balance: Mutex::new(None),
            events,
        };
        (engine, rx)
    }

    pub fn config(&self) -> &MakerConfig {
        &self.config
    }

    // =========================================================================
    // Timers
    // =========================================================================

    /// Run both timers until `shutdown` fires, then cancel resting orders.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        info!(
            symbols = ?self.config.symbols,
            analysis_ms = self.config.analysis_interval().as_millis() as u64,
            refresh_ms = self.config.order_refresh_ms,
            parallel = self.config.simultaneous_pairs,
            "Market making engine started"
        );

        let analysis = tokio::spawn(Arc::clone(&self).analysis_loop(shutdown.clone()));
        let refresh = tokio::spawn(Arc::clone(&self).refresh_loop(shutdown.clone()));
        let (analysis, refresh) = tokio::join!(analysis, refresh);
        for (name, result) in [("analysis", analysis), ("refresh", refresh)] {
            if let Err(e) = result {
                warn!(timer = name, error = %e, "Engine timer task ended abnormally");
            }
        }

        self.shutdown().await;
        info!("Market making engine stopped");
    }

    async fn analysis_loop(self: Arc<Self>, shutdown: CancellationToken) {
        let mut ticker = interval(self.config.analysis_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => self.run_analysis_cycle().await,
            }
        }
        debug!("Analysis timer stopped");
    }

    async fn refresh_loop(self: Arc<Self>, shutdown: CancellationToken) {
        let mut ticker = interval(self.config.order_refresh_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => self.run_reconcile_cycle().await,
            }
        }
        debug!("Refresh timer stopped");
    }

    // =========================================================================
    // Cycle drivers
    // =========================================================================

    /// Refresh the balance, then analyze every symbol.
    ///
    /// With `simultaneous_pairs` all symbols run concurrently and the cycle
    /// waits for every one of them; otherwise they run one by one. Failures
    /// are reported and never stop the other symbols.
    pub async fn run_analysis_cycle(&self) {
        self.refresh_balance().await;
        let symbols = &self.config.symbols;
        if self.config.simultaneous_pairs {
            let results = join_all(symbols.iter().map(|s| self.analyze_symbol(s))).await;
            for (symbol, result) in symbols.iter().zip(results) {
                self.check(symbol, EngineStage::Analysis, result);
            }
        } else {
            for symbol in symbols {
                let result = self.analyze_symbol(symbol).await;
                self.check(symbol, EngineStage::Analysis, result);
            }
        }
    }

    /// Reconcile every symbol, concurrently or one by one.
    pub async fn run_reconcile_cycle(&self) {
        let symbols = &self.config.symbols;
        if self.config.simultaneous_pairs {
            let results = join_all(symbols.iter().map(|s| self.reconcile_symbol(s))).await;
            for (symbol, result) in symbols.iter().zip(results) {
                self.check(symbol, EngineStage::Reconcile, result);
            }
        } else {
            for symbol in symbols {
                let result = self.reconcile_symbol(symbol).await;
                self.check(symbol, EngineStage::Reconcile, result);
            }
        }
    }

    fn check<T>(&self, symbol: &str, stage: EngineStage, result: EngineResult<T>) {
        if let Err(e) = result {
            self.report_error(symbol, stage, &e);
        }
    }

    // =========================================================================
    // Analysis
    // =========================================================================

    /// Pull candles and book, update histories and cache a fresh condition.
    pub async fn analyze_symbol(&self, symbol: &str) -> EngineResult<MarketCondition> {
        let candles = self
            .executor
            .fetch_candles(symbol, self.config.candle_count)
            .await
            .map_err(|e| EngineError::market_data(symbol, e))?;
        let book = self
            .executor
            .fetch_order_book(symbol)
            .await
            .map_err(|e| EngineError::market_data(symbol, e))?;

        let price = book
            .mid_price()
            .or_else(|| candles.last().map(|c| Price::new(c.close)))
            .filter(Price::is_positive)
            .ok_or_else(|| EngineError::NoPrice(symbol.to_string()))?;

        let snapshot = self.analyzer.analyze_candles(&candles);
        let ema_history = {
            let mut history = self
                .histories
                .entry(symbol.to_string())
                .or_insert_with(|| IndicatorHistory::new(self.config.history_len));
            history.ema.push(snapshot.ema);
            history.rsi.push(snapshot.rsi);
            history.ema.to_vec()
        };

        let condition = self
            .analyzer
            .analyze_market_conditions(&candles, price, &ema_history);

        if let Some(mut history) = self.histories.get_mut(symbol) {
            history
                .volatility
                .push(condition.volatility.to_f64().unwrap_or(0.0));
        }

        debug!(
            %symbol,
            %price,
            sentiment = %condition.sentiment,
            volatility = %condition.volatility,
            bollinger_width = %condition.bollinger_width,
            ema = snapshot.ema,
            rsi = snapshot.rsi,
            candles = candles.len(),
            "Market analyzed"
        );

        self.conditions.insert(
            symbol.to_string(),
            CachedCondition {
                condition: condition.clone(),
                updated_at: Instant::now(),
            },
        );
        Ok(condition)
    }

    fn fresh_condition(&self, symbol: &str) -> Option<MarketCondition> {
        let cached = self.conditions.get(symbol)?;
        if cached.updated_at.elapsed() > self.config.stale_after() {
            return None;
        }
        Some(cached.condition.clone())
    }

    /// Update the cached account value; keeps the previous value on failure.
    async fn refresh_balance(&self) -> Option<Decimal> {
        match self.executor.fetch_account_value().await {
            Ok(value) => {
                *self.balance.lock() = Some(value);
                Some(value)
            }
            Err(e) => {
                warn!(error = %e, "Account value fetch failed, keeping previous");
                *self.balance.lock()
            }
        }
    }

    async fn balance(&self) -> Decimal {
        let cached = *self.balance.lock();
        match cached {
            Some(value) => value,
            None => self.refresh_balance().await.unwrap_or(Decimal::ZERO),
        }
    }

    // =========================================================================
    // Reconciliation
    // =========================================================================

    /// One reconciliation pass for `symbol`.
    pub async fn reconcile_symbol(&self, symbol: &str) -> EngineResult<ReconcileOutcome> {
        let book = self
            .executor
            .fetch_order_book(symbol)
            .await
            .map_err(|e| EngineError::market_data(symbol, e))?;
        let Some(mid) = book.mid_price() else {
            let state = book.state();
            debug!(%symbol, %state, "Book not tradeable, skipping cycle");
            return Ok(ReconcileOutcome::Skipped(state));
        };

        let condition = match self.fresh_condition(symbol) {
            Some(condition) => condition,
            None => {
                debug!(%symbol, "Market condition missing or stale, analyzing inline");
                self.analyze_symbol(symbol).await?
            }
        };

        let open = self
            .executor
            .fetch_open_orders(symbol)
            .await
            .map_err(|e| EngineError::market_data(symbol, e))?;
        self.forget_settled(symbol, &open);

        let bounds = LadderBounds::around(mid, self.config.max_spread, condition.volatility);
        let previous = self.reconciled_sentiment.get(symbol).map(|s| *s);

        if let Some(reason) = cancellation_reason(&open, &bounds, previous, condition.sentiment) {
            if let CancelReason::SentimentFlip { from, to } = reason {
                info!(%symbol, %from, %to, "Sentiment reversed");
                self.emit(EngineEvent::SentimentFlip {
                    symbol: symbol.to_string(),
                    from,
                    to,
                });
            }
            let cancelled = self.cancel_symbol(symbol, reason).await?;
            self.reconciled_sentiment
                .insert(symbol.to_string(), condition.sentiment);
            return Ok(ReconcileOutcome::Cancelled { reason, cancelled });
        }
        self.reconciled_sentiment
            .insert(symbol.to_string(), condition.sentiment);

        let spread = dynamic_spread(&self.config, &condition);
        self.spreads.insert(symbol.to_string(), spread);
        Metrics::spread(symbol, spread.to_f64().unwrap_or(0.0));

        let meta = self.executor.cache().get(symbol);
        let balance = self.balance().await;
        let ladder = build_ladder(mid, spread, &condition, balance, &meta, &self.config);
        let plan = plan_placements(&ladder, &open, &self.config);

        debug!(
            %symbol,
            %mid,
            %spread,
            sentiment = %condition.sentiment,
            resting = open.len(),
            targets = ladder.len(),
            to_place = plan.to_place.len(),
            covered = plan.covered,
            "Reconciling ladder"
        );

        for skipped in &plan.skipped {
            warn!(
                %symbol,
                side = %skipped.level.side,
                price = %skipped.level.price,
                deviation = %skipped.deviation,
                "Ladder level too far from mid, skipping"
            );
            self.emit(EngineEvent::LevelSkipped {
                symbol: symbol.to_string(),
                side: skipped.level.side,
                price: skipped.level.price,
                deviation: skipped.deviation,
            });
        }

        let mut placed = 0;
        let mut failed = 0;
        for level in &plan.to_place {
            let intent = OrderIntent::new(symbol, level.side, level.price, level.size, false);
            match self.executor.place_limit_order(intent).await {
                Ok(order) => {
                    placed += 1;
                    self.tracked
                        .entry(symbol.to_string())
                        .or_default()
                        .push(order.oid);
                    Metrics::ladder_level_placed(symbol, &level.side.to_string());
                    self.emit(EngineEvent::OrderPlaced {
                        symbol: symbol.to_string(),
                        side: level.side,
                        price: order.price,
                        size: order.size,
                        oid: order.oid,
                    });
                }
                Err(e) => {
                    failed += 1;
                    let scheduler_gone = matches!(e, OrderError::Scheduler(_));
                    self.report_error(symbol, EngineStage::Placement, &EngineError::Order(e));
                    if scheduler_gone {
                        break;
                    }
                }
            }
        }

        Ok(ReconcileOutcome::Filled {
            placed,
            covered: plan.covered,
            skipped: plan.skipped.len(),
            failed,
        })
    }

    /// Drop tracked ids that no longer rest on the exchange (filled or
    /// cancelled elsewhere).
    fn forget_settled(&self, symbol: &str, open: &[OpenOrder]) {
        if let Some(mut ids) = self.tracked.get_mut(symbol) {
            let before = ids.len();
            ids.retain(|id| open.iter().any(|o| o.oid == *id));
            if ids.len() < before {
                debug!(%symbol, settled = before - ids.len(), "Tracked orders no longer resting");
            }
        }
    }

    /// Cancel everything for `symbol` and forget its tracked ids.
    async fn cancel_symbol(&self, symbol: &str, reason: CancelReason) -> EngineResult<usize> {
        let ack = self.executor.cancel_all(symbol).await?;
        let forgotten = self.tracked.remove(symbol).map_or(0, |(_, ids)| ids.len());
        info!(
            %symbol,
            %reason,
            cancelled = ack.cancelled,
            forgotten,
            "Cancelled resting orders"
        );
        self.emit(EngineEvent::OrdersCancelled {
            symbol: symbol.to_string(),
            reason,
            cancelled: ack.cancelled,
        });
        Ok(ack.cancelled)
    }

    // =========================================================================
    // Shutdown / status
    // =========================================================================

    /// Best-effort cancel-all for every symbol.
    pub async fn shutdown(&self) {
        if !self.config.cancel_on_shutdown {
            info!("Leaving resting orders in place on shutdown");
            return;
        }
        for symbol in &self.config.symbols {
            if let Err(e) = self.cancel_symbol(symbol, CancelReason::Shutdown).await {
                self.tracked.remove(symbol.as_str());
                self.report_error(symbol, EngineStage::Shutdown, &e);
            }
        }
    }

    pub fn status(&self) -> EngineStatus {
        let symbols = self
            .config
            .symbols
            .iter()
            .map(|symbol| {
                let cached = self.conditions.get(symbol);
                let history = self.histories.get(symbol);
                SymbolStatus {
                    symbol: symbol.clone(),
                    tracked_orders: self
                        .tracked
                        .get(symbol)
                        .map(|ids| ids.clone())
                        .unwrap_or_default(),
                    sentiment: cached.as_ref().map(|c| c.condition.sentiment),
                    spread: self.spreads.get(symbol).map(|s| *s),
                    condition_age_ms: cached
                        .as_ref()
                        .map(|c| c.updated_at.elapsed().as_millis() as u64),
                    rsi: history.as_ref().and_then(|h| h.rsi.last()),
                    mean_volatility: history.as_ref().and_then(|h| h.volatility.mean()),
                }
            })
            .collect();

        EngineStatus {
            balance: *self.balance.lock(),
            symbols,
        }
    }

    fn report_error(&self, symbol: &str, stage: EngineStage, error: &EngineError) {
        warn!(%symbol, %stage, error = %error, "Engine cycle error");
        Metrics::engine_error(symbol, stage.as_str());
        self.emit(EngineEvent::CycleError {
            symbol: symbol.to_string(),
            stage,
            error: error.to_string(),
        });
    }

    fn emit(&self, event: EngineEvent) {
        // Receiver dropped is fine
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{IndicatorSnapshot, StaticAnalyzer};
    use quoter_core::{AssetMetadata, BookLevel, ExchangeError, OpenOrder, OrderBook, OrderSide, Size};
    use quoter_executor::{ExecutorConfig, MockExchange, WalletReadiness};
    use quoter_registry::AssetMetadataCache;
    use quoter_scheduler::{RequestScheduler, SchedulerConfig};
    use rust_decimal_macros::dec;
    use std::time::Duration;

    struct Harness {
        exchange: Arc<MockExchange>,
        analyzer: Arc<StaticAnalyzer>,
        engine: Arc<MarketMakingEngine>,
        events: mpsc::UnboundedReceiver<EngineEvent>,
    }

    impl Harness {
        fn drain(&mut self) -> Vec<EngineEvent> {
            let mut out = Vec::new();
            while let Ok(event) = self.events.try_recv() {
                out.push(event);
            }
            out
        }
    }

    fn book(bid: Decimal, ask: Decimal) -> OrderBook {
        OrderBook::new(
            vec![BookLevel::new(Price::new(bid), Size::new(dec!(5)))],
            vec![BookLevel::new(Price::new(ask), Size::new(dec!(5)))],
        )
    }

    fn harness(config: MakerConfig, sentiment: Sentiment) -> Harness {
        let exchange = Arc::new(MockExchange::new());
        exchange.set_book("ETH", book(dec!(999), dec!(1001)));
        exchange.set_book("BTC", book(dec!(94000), dec!(94001)));

        let cache = Arc::new(AssetMetadataCache::default());
        cache
            .replace(vec![
                AssetMetadata::from_exchange("BTC", Some(0), 5, 50, None),
                AssetMetadata::from_exchange("ETH", Some(1), 4, 50, None),
            ])
            .unwrap();

        let executor = Arc::new(OrderExecutor::new(
            ExecutorConfig::default(),
            exchange.clone(),
            Arc::new(WalletReadiness::ready()),
            cache,
            Arc::new(RequestScheduler::new(&SchedulerConfig::default())),
        ));
        let analyzer = Arc::new(StaticAnalyzer::with_sentiment(sentiment));
        let (engine, events) = MarketMakingEngine::new(config, executor, analyzer.clone());

        Harness {
            exchange,
            analyzer,
            engine: Arc::new(engine),
            events,
        }
    }

    fn eth_config() -> MakerConfig {
        MakerConfig {
            symbols: vec!["ETH".to_string()],
            ..MakerConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_cycle_places_full_ladder() {
        let mut h = harness(eth_config(), Sentiment::Neutral);

        let outcome = h.engine.reconcile_symbol("ETH").await.unwrap();
        assert_eq!(
            outcome,
            ReconcileOutcome::Filled {
                placed: 6,
                covered: 0,
                skipped: 0,
                failed: 0
            }
        );

        let submissions = h.exchange.submissions();
        assert_eq!(submissions.len(), 6);
        let buys = submissions.iter().filter(|o| o.side == OrderSide::Buy).count();
        assert_eq!(buys, 3);
        // Neutral spread 0.55% around mid 1000
        assert!(submissions.iter().any(|o| o.price == Price::new(dec!(997.25))));
        assert!(submissions.iter().any(|o| o.price == Price::new(dec!(1002.75))));

        let status = h.engine.status();
        assert_eq!(status.symbols[0].tracked_orders.len(), 6);
        assert_eq!(status.symbols[0].spread, Some(dec!(0.0055)));
        assert_eq!(status.balance, Some(dec!(10000)));

        let placed = h
            .drain()
            .into_iter()
            .filter(|e| matches!(e, EngineEvent::OrderPlaced { .. }))
            .count();
        assert_eq!(placed, 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_cycle_places_nothing_when_ladder_covered() {
        let h = harness(eth_config(), Sentiment::Neutral);
        h.engine.reconcile_symbol("ETH").await.unwrap();

        let outcome = h.engine.reconcile_symbol("ETH").await.unwrap();
        assert_eq!(
            outcome,
            ReconcileOutcome::Filled {
                placed: 0,
                covered: 6,
                skipped: 0,
                failed: 0
            }
        );
        assert_eq!(h.exchange.submissions().len(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sentiment_flip_cancels_and_defers_placement() {
        let mut h = harness(eth_config(), Sentiment::Bullish);
        h.engine.reconcile_symbol("ETH").await.unwrap();
        assert_eq!(h.exchange.resting("ETH").len(), 6);
        h.drain();

        h.analyzer.set_sentiment(Sentiment::Bearish);
        h.engine.analyze_symbol("ETH").await.unwrap();

        let outcome = h.engine.reconcile_symbol("ETH").await.unwrap();
        assert_eq!(
            outcome,
            ReconcileOutcome::Cancelled {
                reason: CancelReason::SentimentFlip {
                    from: Sentiment::Bullish,
                    to: Sentiment::Bearish
                },
                cancelled: 6
            }
        );
        assert_eq!(h.exchange.cancels(), vec![(1, "ETH".to_string())]);
        assert_eq!(h.exchange.submissions().len(), 6);
        assert!(h.exchange.resting("ETH").is_empty());
        assert!(h.engine.status().symbols[0].tracked_orders.is_empty());

        let events = h.drain();
        assert!(events
            .iter()
            .any(|e| matches!(e, EngineEvent::SentimentFlip { .. })));
        assert!(events
            .iter()
            .any(|e| matches!(e, EngineEvent::OrdersCancelled { cancelled: 6, .. })));
        assert!(!events
            .iter()
            .any(|e| matches!(e, EngineEvent::OrderPlaced { .. })));

        // Next cycle computes the bearish ladder and places again
        let outcome = h.engine.reconcile_symbol("ETH").await.unwrap();
        assert!(matches!(outcome, ReconcileOutcome::Filled { placed: 6, .. }));
        assert_eq!(h.exchange.submissions().len(), 12);
    }

    #[tokio::test(start_paused = true)]
    async fn test_neutral_transition_is_not_a_flip() {
        let h = harness(eth_config(), Sentiment::Bullish);
        h.engine.reconcile_symbol("ETH").await.unwrap();

        h.analyzer.set_sentiment(Sentiment::Neutral);
        h.engine.analyze_symbol("ETH").await.unwrap();
        h.engine.reconcile_symbol("ETH").await.unwrap();

        h.analyzer.set_sentiment(Sentiment::Bearish);
        h.engine.analyze_symbol("ETH").await.unwrap();
        h.engine.reconcile_symbol("ETH").await.unwrap();

        assert!(h.exchange.cancels().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_out_of_band_order_cancels_symbol() {
        let h = harness(eth_config(), Sentiment::Neutral);
        h.exchange.set_open_orders(
            "ETH",
            vec![OpenOrder {
                oid: 99,
                symbol: "ETH".to_string(),
                side: OrderSide::Buy,
                price: Price::new(dec!(950)),
                size: Size::new(dec!(0.1)),
                timestamp_ms: 0,
            }],
        );

        let outcome = h.engine.reconcile_symbol("ETH").await.unwrap();
        assert_eq!(
            outcome,
            ReconcileOutcome::Cancelled {
                reason: CancelReason::OutOfBand {
                    oid: 99,
                    price: Price::new(dec!(950))
                },
                cancelled: 1
            }
        );
        assert!(h.exchange.submissions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_crossed_book_skips_cycle() {
        let h = harness(eth_config(), Sentiment::Neutral);
        h.exchange.set_book("ETH", book(dec!(1001), dec!(999)));

        let outcome = h.engine.reconcile_symbol("ETH").await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::Skipped(BookState::Crossed));
        assert!(h.exchange.submissions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_condition_recomputed_inline() {
        let config = MakerConfig {
            order_levels: 1,
            ..eth_config()
        };
        let h = harness(config, Sentiment::Neutral);
        h.engine.analyze_symbol("ETH").await.unwrap();

        tokio::time::sleep(Duration::from_secs(6)).await;
        let age = h.engine.status().symbols[0].condition_age_ms.unwrap();
        assert!(age >= 6000);

        h.engine.reconcile_symbol("ETH").await.unwrap();
        let age = h.engine.status().symbols[0].condition_age_ms.unwrap();
        assert!(age < 5000, "age {age}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_symbol_failure_does_not_stop_others() {
        let config = MakerConfig {
            symbols: vec!["BTC".to_string(), "ETH".to_string()],
            ..MakerConfig::default()
        };
        let mut h = harness(config, Sentiment::Neutral);
        h.exchange
            .set_book_error("BTC", ExchangeError::Unavailable("book offline".to_string()));

        h.engine.run_reconcile_cycle().await;

        assert_eq!(h.exchange.resting("ETH").len(), 6);
        let events = h.drain();
        let errors: Vec<_> = events.iter().filter(|e| e.is_error()).collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].symbol(), "BTC");
        assert!(matches!(
            errors[0],
            EngineEvent::CycleError {
                stage: EngineStage::Reconcile,
                ..
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequential_mode_processes_all_symbols() {
        let config = MakerConfig {
            symbols: vec!["BTC".to_string(), "ETH".to_string()],
            simultaneous_pairs: false,
            order_levels: 1,
            ..MakerConfig::default()
        };
        let h = harness(config, Sentiment::Neutral);
        h.engine.run_reconcile_cycle().await;

        assert_eq!(h.exchange.resting("BTC").len(), 2);
        assert_eq!(h.exchange.resting("ETH").len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_placement_failure_reported() {
        let config = MakerConfig {
            order_levels: 1,
            ..eth_config()
        };
        let mut h = harness(config, Sentiment::Neutral);
        h.exchange.push_rejection("Insufficient margin to place order");

        let outcome = h.engine.reconcile_symbol("ETH").await.unwrap();
        assert_eq!(
            outcome,
            ReconcileOutcome::Filled {
                placed: 1,
                covered: 0,
                skipped: 0,
                failed: 1
            }
        );
        let events = h.drain();
        assert!(events.iter().any(|e| matches!(
            e,
            EngineEvent::CycleError {
                stage: EngineStage::Placement,
                ..
            }
        )));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_and_shutdown_cancels_resting_orders() {
        let h = harness(eth_config(), Sentiment::Neutral);
        let token = CancellationToken::new();
        let handle = tokio::spawn(Arc::clone(&h.engine).run(token.clone()));

        tokio::time::sleep(Duration::from_secs(8)).await;
        assert_eq!(h.exchange.resting("ETH").len(), 6);

        token.cancel();
        handle.await.unwrap();

        assert!(h.exchange.resting("ETH").is_empty());
        assert!(!h.exchange.cancels().is_empty());
        assert!(h.engine.status().symbols[0].tracked_orders.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_filled_orders_dropped_from_tracking() {
        let h = harness(eth_config(), Sentiment::Neutral);

        let mut last_resting = Vec::new();
        for _ in 0..5 {
            h.engine.reconcile_symbol("ETH").await.unwrap();
            last_resting = h.exchange.resting("ETH").iter().map(|o| o.oid).collect();
            // Everything fills before the next cycle
            h.exchange.set_open_orders("ETH", vec![]);
        }

        assert_eq!(h.exchange.submissions().len(), 30);
        let mut tracked = h.engine.status().symbols[0].tracked_orders.clone();
        tracked.sort_unstable();
        last_resting.sort_unstable();
        assert_eq!(tracked, last_resting);
        assert_eq!(tracked.len(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resting_orders_stay_tracked() {
        let h = harness(eth_config(), Sentiment::Neutral);
        h.engine.reconcile_symbol("ETH").await.unwrap();
        let before = h.engine.status().symbols[0].tracked_orders.clone();

        h.engine.reconcile_symbol("ETH").await.unwrap();
        assert_eq!(h.engine.status().symbols[0].tracked_orders, before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_negative_volatility_does_not_cancel_own_ladder() {
        let h = harness(eth_config(), Sentiment::Neutral);
        h.analyzer.set_condition(MarketCondition {
            volatility: dec!(-0.8),
            ..MarketCondition::neutral()
        });
        h.engine.analyze_symbol("ETH").await.unwrap();

        let first = h.engine.reconcile_symbol("ETH").await.unwrap();
        assert!(matches!(first, ReconcileOutcome::Filled { placed: 6, .. }));
        let second = h.engine.reconcile_symbol("ETH").await.unwrap();
        assert!(matches!(second, ReconcileOutcome::Filled { placed: 0, covered: 6, .. }));
        assert!(h.exchange.cancels().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_reports_indicator_history() {
        let h = harness(eth_config(), Sentiment::Neutral);
        assert_eq!(h.engine.status().symbols[0].rsi, None);

        for volatility in [dec!(0.02), dec!(0.04)] {
            h.analyzer.set_condition(MarketCondition {
                volatility,
                signals: IndicatorSnapshot {
                    rsi: 62.0,
                    ..IndicatorSnapshot::default()
                },
                ..MarketCondition::neutral()
            });
            h.engine.analyze_symbol("ETH").await.unwrap();
        }

        let status = &h.engine.status().symbols[0];
        assert_eq!(status.rsi, Some(62.0));
        let mean = status.mean_volatility.unwrap();
        assert!((mean - 0.03).abs() < 1e-9, "mean {mean}");
    }
}
