//! Order placement state machine.
//!
//! `place_limit_order` moves an intent through:
//!
//! 1. **Validate**: side/price/size sanity without touching the network,
//!    wallet readiness, then a deviation check against the book mid (a
//!    failed book fetch skips the check).
//! 2. **Quantize**: round to tick/step and render to the asset's precision.
//! 3. **Submit** via the order lane.
//! 4. **Correct** once on a tick ("price"/"tick") or step ("size")
//!    rejection by recomputing the field strictly as `round(x/tick)*tick`.
//!
//! Rate-limit rejections are surfaced without resubmitting; the scheduler's
//! backoff already covered them.

use std::sync::Arc;

use quoter_core::{
    AssetMetadata, BoxFuture, CancelAck, Candle, ClientOrderId, ExchangeClient, ExchangeError,
    ExchangeResult, OpenOrder, OrderAck, OrderBook, OrderIntent, Price, QuantizedOrder, Size,
    WalletStatus,
};
use quoter_registry::{AssetMetadataCache, RegistryResult};
use quoter_scheduler::{RequestScheduler, SchedulerError, SchedulerResult};
use quoter_telemetry::Metrics;
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::{debug, info, warn};

use crate::config::ExecutorConfig;
use crate::error::{OrderError, OrderResult};

/// Exchange messages meaning there was nothing left to cancel.
const NOTHING_TO_CANCEL: &[&str] = &["already canceled", "already cancelled", "never placed"];

/// Successful placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedOrder {
    pub cloid: ClientOrderId,
    pub symbol: String,
    /// Exchange order id.
    pub oid: u64,
    pub resting: bool,
    pub price: Price,
    pub size: Size,
    /// Whether the accepted order was a corrective resubmission.
    pub corrected: bool,
}

impl PlacedOrder {
    fn new(order: &QuantizedOrder, ack: OrderAck, corrected: bool) -> Self {
        Self {
            cloid: order.cloid.clone(),
            symbol: order.symbol.clone(),
            oid: ack.oid,
            resting: ack.resting,
            price: order.price,
            size: order.size,
            corrected,
        }
    }
}

/// Which field a rejection complained about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Correction {
    Price,
    Size,
}

impl Correction {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Price => "price",
            Self::Size => "size",
        }
    }
}

/// How to react to a rejected submission.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Rejection {
    Correct(Correction, String),
    Fail(OrderError),
}

fn classify(err: SchedulerError) -> Rejection {
    let exchange = match err {
        SchedulerError::Exchange(e) => e,
        other => return Rejection::Fail(OrderError::Scheduler(other.to_string())),
    };
    let msg = exchange.message().to_string();
    match exchange {
        ExchangeError::NotReady => Rejection::Fail(OrderError::NotReady(
            "exchange client not ready".to_string(),
        )),
        ExchangeError::RateLimited(_) => Rejection::Fail(OrderError::RateLimit(msg)),
        _ => {
            let lower = msg.to_ascii_lowercase();
            if lower.contains("price") || lower.contains("tick") {
                Rejection::Correct(Correction::Price, msg)
            } else if lower.contains("size") {
                Rejection::Correct(Correction::Size, msg)
            } else if lower.contains("rate limit") {
                Rejection::Fail(OrderError::RateLimit(msg))
            } else {
                Rejection::Fail(OrderError::Exchange(msg))
            }
        }
    }
}

fn is_nothing_to_cancel(err: &SchedulerError) -> bool {
    err.exchange().is_some_and(|e| {
        let lower = e.message().to_ascii_lowercase();
        NOTHING_TO_CANCEL.iter().any(|m| lower.contains(m))
    })
}

/// Strict `round(value / increment) * increment` at full precision.
fn snap(value: Decimal, increment: Decimal) -> Decimal {
    if increment <= Decimal::ZERO {
        return value;
    }
    (value / increment).round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        * increment
}

/// Order executor.
pub struct OrderExecutor {
    config: ExecutorConfig,
    exchange: Arc<dyn ExchangeClient>,
    wallet: Arc<dyn WalletStatus>,
    cache: Arc<AssetMetadataCache>,
    scheduler: Arc<RequestScheduler>,
}

impl OrderExecutor {
    pub fn new(
        config: ExecutorConfig,
        exchange: Arc<dyn ExchangeClient>,
        wallet: Arc<dyn WalletStatus>,
        cache: Arc<AssetMetadataCache>,
        scheduler: Arc<RequestScheduler>,
    ) -> Self {
        Self {
            config,
            exchange,
            wallet,
            cache,
            scheduler,
        }
    }

    pub fn cache(&self) -> &Arc<AssetMetadataCache> {
        &self.cache
    }

    pub fn scheduler(&self) -> &Arc<RequestScheduler> {
        &self.scheduler
    }

    /// Place a limit order.
    pub async fn place_limit_order(&self, intent: OrderIntent) -> OrderResult<PlacedOrder> {
        let result = self.place(&intent).await;
        match &result {
            Ok(placed) => {
                Metrics::order_placed(&intent.symbol, &intent.side.to_string());
                info!(
                    symbol = %intent.symbol,
                    side = %intent.side,
                    price = %placed.price,
                    size = %placed.size,
                    oid = placed.oid,
                    corrected = placed.corrected,
                    "Order placed"
                );
            }
            Err(e) => {
                Metrics::order_rejected(&intent.symbol, e.kind());
                warn!(
                    symbol = %intent.symbol,
                    side = %intent.side,
                    price = %intent.price,
                    size = %intent.size,
                    kind = e.kind(),
                    error = %e,
                    "Order placement failed"
                );
            }
        }
        result
    }

    async fn place(&self, intent: &OrderIntent) -> OrderResult<PlacedOrder> {
        Self::validate(intent)?;
        self.ensure_ready()?;
        self.check_deviation(intent).await?;

        let meta = self.cache.get(&intent.symbol);
        let order = self.quantize(intent, &meta)?;
        debug!(order = %order, cloid = %order.cloid, "Submitting order");

        let err = match self.submit(order.clone()).await {
            Ok(ack) => return Ok(PlacedOrder::new(&order, ack, false)),
            Err(e) => e,
        };

        match classify(err) {
            Rejection::Fail(e) => Err(e),
            Rejection::Correct(field, msg) if !self.config.correction_enabled => {
                Err(Self::correction_error(field, msg))
            }
            Rejection::Correct(field, msg) => self.correct(intent, &meta, &order, field, msg).await,
        }
    }

    /// Input checks that need no network.
    fn validate(intent: &OrderIntent) -> OrderResult<()> {
        if intent.symbol.trim().is_empty() {
            return Err(OrderError::Validation("symbol is empty".to_string()));
        }
        if !intent.price.is_positive() {
            return Err(OrderError::Validation(format!(
                "price must be positive, got {}",
                intent.price
            )));
        }
        if !intent.size.is_positive() {
            return Err(OrderError::Validation(format!(
                "size must be positive, got {}",
                intent.size
            )));
        }
        Ok(())
    }

    fn ensure_ready(&self) -> OrderResult<()> {
        if self.wallet.is_ready() {
            Ok(())
        } else {
            Err(OrderError::NotReady("wallet not ready".to_string()))
        }
    }

    /// Reject prices too far from the book mid. Skipped if no book.
    async fn check_deviation(&self, intent: &OrderIntent) -> OrderResult<()> {
        let book = match self.fetch_order_book(&intent.symbol).await {
            Ok(book) => book,
            Err(e) => {
                debug!(symbol = %intent.symbol, error = %e, "Book unavailable, skipping deviation check");
                return Ok(());
            }
        };
        let Some(mid) = book.mid_price() else {
            debug!(symbol = %intent.symbol, state = %book.state(), "No mid price, skipping deviation check");
            return Ok(());
        };
        if let Some(deviation) = intent.price.deviation_from(mid) {
            if deviation > self.config.max_price_deviation {
                return Err(OrderError::Validation(format!(
                    "price {} deviates {:.2}% from mid {}",
                    intent.price,
                    deviation * Decimal::ONE_HUNDRED,
                    mid
                )));
            }
        }
        Ok(())
    }

    /// Round to tick/step and render with the asset's precision.
    fn quantize(&self, intent: &OrderIntent, meta: &AssetMetadata) -> OrderResult<QuantizedOrder> {
        let price_str = meta.format_price(intent.price);
        let size_str = meta.format_size(intent.size);

        let price: Price = price_str
            .parse()
            .map_err(|e| OrderError::Quantization(format!("price {price_str}: {e}")))?;
        let size: Size = size_str
            .parse()
            .map_err(|e| OrderError::Quantization(format!("size {size_str}: {e}")))?;

        if !price.is_positive() {
            return Err(OrderError::Quantization(format!(
                "price {} rounds to zero at tick {}",
                intent.price, meta.tick_size
            )));
        }
        if !size.is_positive() {
            return Err(OrderError::Quantization(format!(
                "size {} rounds to zero at step {}",
                intent.size, meta.step_size
            )));
        }

        Ok(QuantizedOrder {
            cloid: ClientOrderId::new(),
            symbol: intent.symbol.clone(),
            asset_id: self.cache.asset_id(&intent.symbol),
            side: intent.side,
            price,
            size,
            price_str,
            size_str,
            reduce_only: intent.reduce_only,
        })
    }

    /// One corrective resubmission with the offending field snapped strictly.
    async fn correct(
        &self,
        intent: &OrderIntent,
        meta: &AssetMetadata,
        rejected: &QuantizedOrder,
        field: Correction,
        msg: String,
    ) -> OrderResult<PlacedOrder> {
        let mut order = rejected.clone();
        order.cloid = ClientOrderId::new();
        match field {
            Correction::Price => {
                let exact = snap(intent.price.inner(), meta.tick_size.inner()).normalize();
                order.price = Price::new(exact);
                order.price_str = exact.to_string();
            }
            Correction::Size => {
                let exact = snap(intent.size.inner(), meta.step_size.inner()).normalize();
                order.size = Size::new(exact);
                order.size_str = exact.to_string();
            }
        }

        info!(
            symbol = %intent.symbol,
            field = field.as_str(),
            rejected = %rejected,
            corrected = %order,
            reason = %msg,
            "Resubmitting corrected order"
        );
        Metrics::order_corrected(&intent.symbol, field.as_str());

        match self.submit(order.clone()).await {
            Ok(ack) => Ok(PlacedOrder::new(&order, ack, true)),
            Err(SchedulerError::Exchange(e)) => Err(Self::correction_error(field, e.message().to_string())),
            Err(e) => Err(OrderError::Scheduler(e.to_string())),
        }
    }

    fn correction_error(field: Correction, msg: String) -> OrderError {
        match field {
            Correction::Price => OrderError::TickSize(msg),
            Correction::Size => OrderError::StepSize(msg),
        }
    }

    /// Cancel every resting order for `symbol`.
    ///
    /// "Nothing to cancel" responses count as success.
    pub async fn cancel_all(&self, symbol: &str) -> OrderResult<CancelAck> {
        let asset_id = self
            .cache
            .asset_id(symbol)
            .ok_or_else(|| OrderError::AssetNotFound(symbol.to_string()))?;
        self.ensure_ready()?;

        let owned = symbol.to_string();
        let result = self
            .order_lane(move |ex| {
                let symbol = owned.clone();
                Box::pin(async move { ex.cancel_all(asset_id, &symbol).await })
            })
            .await;

        match result {
            Ok(ack) => {
                Metrics::orders_cancelled(symbol);
                info!(%symbol, asset_id, cancelled = ack.cancelled, "Cancelled all orders");
                Ok(ack)
            }
            Err(e) if is_nothing_to_cancel(&e) => {
                debug!(%symbol, asset_id, reason = %e, "Nothing to cancel");
                Metrics::orders_cancelled(symbol);
                Ok(CancelAck::default())
            }
            Err(e) => {
                let err = match classify(e) {
                    Rejection::Fail(err) => err,
                    Rejection::Correct(_, msg) => OrderError::Exchange(msg),
                };
                warn!(%symbol, asset_id, kind = err.kind(), error = %err, "Cancel all failed");
                Err(err)
            }
        }
    }

    /// Refresh asset metadata through the general lane (no-op within TTL).
    pub async fn refresh_metadata(&self) -> RegistryResult<bool> {
        let exchange = Arc::clone(&self.exchange);
        let scheduler = Arc::clone(&self.scheduler);
        self.cache
            .refresh(|| async move {
                scheduler
                    .enqueue_general(move || {
                        let ex = Arc::clone(&exchange);
                        async move { ex.fetch_instrument_universe().await }
                    })
                    .await
                    .map_err(into_exchange_error)
            })
            .await
    }

    // =========================================================================
    // Market data (general lane)
    // =========================================================================

    pub async fn fetch_order_book(&self, symbol: &str) -> SchedulerResult<OrderBook> {
        let symbol = symbol.to_string();
        self.general_lane(move |ex| {
            let symbol = symbol.clone();
            Box::pin(async move { ex.fetch_order_book(&symbol).await })
        })
        .await
    }

    pub async fn fetch_candles(&self, symbol: &str, count: usize) -> SchedulerResult<Vec<Candle>> {
        let symbol = symbol.to_string();
        self.general_lane(move |ex| {
            let symbol = symbol.clone();
            Box::pin(async move { ex.fetch_candles(&symbol, count).await })
        })
        .await
    }

    pub async fn fetch_open_orders(&self, symbol: &str) -> SchedulerResult<Vec<OpenOrder>> {
        let symbol = symbol.to_string();
        self.general_lane(move |ex| {
            let symbol = symbol.clone();
            Box::pin(async move { ex.fetch_open_orders(&symbol).await })
        })
        .await
    }

    pub async fn fetch_account_value(&self) -> SchedulerResult<Decimal> {
        self.general_lane(|ex| Box::pin(async move { ex.fetch_account_value().await }))
            .await
    }

    async fn submit(&self, order: QuantizedOrder) -> SchedulerResult<OrderAck> {
        self.order_lane(move |ex| {
            let order = order.clone();
            Box::pin(async move { ex.submit_order(order).await })
        })
        .await
    }

    async fn general_lane<T, F>(&self, call: F) -> SchedulerResult<T>
    where
        F: Fn(Arc<dyn ExchangeClient>) -> BoxFuture<'static, ExchangeResult<T>>
            + Send
            + Sync
            + 'static,
        T: Send + 'static,
    {
        let exchange = Arc::clone(&self.exchange);
        self.scheduler
            .enqueue_general(move || call(Arc::clone(&exchange)))
            .await
    }

    async fn order_lane<T, F>(&self, call: F) -> SchedulerResult<T>
    where
        F: Fn(Arc<dyn ExchangeClient>) -> BoxFuture<'static, ExchangeResult<T>>
            + Send
            + Sync
            + 'static,
        T: Send + 'static,
    {
        let exchange = Arc::clone(&self.exchange);
        self.scheduler
            .enqueue_order(move || call(Arc::clone(&exchange)))
            .await
    }
}

fn into_exchange_error(err: SchedulerError) -> ExchangeError {
    match err {
        SchedulerError::Exchange(e) => e,
        other => ExchangeError::Unavailable(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockExchange;
    use crate::ready::WalletReadiness;
    use quoter_core::{BookLevel, OrderSide};
    use quoter_scheduler::SchedulerConfig;
    use rust_decimal_macros::dec;

    struct Harness {
        exchange: Arc<MockExchange>,
        wallet: Arc<WalletReadiness>,
        scheduler: Arc<RequestScheduler>,
        executor: OrderExecutor,
    }

    fn universe() -> Vec<AssetMetadata> {
        vec![
            AssetMetadata::from_exchange("BTC", Some(0), 5, 50, None),
            AssetMetadata::from_exchange("ETH", Some(1), 4, 50, None),
        ]
    }

    fn book(bid: Decimal, ask: Decimal) -> OrderBook {
        OrderBook::new(
            vec![BookLevel::new(Price::new(bid), Size::new(dec!(1)))],
            vec![BookLevel::new(Price::new(ask), Size::new(dec!(1)))],
        )
    }

    fn harness() -> Harness {
        let exchange = Arc::new(MockExchange::new());
        let wallet = Arc::new(WalletReadiness::ready());
        let scheduler = Arc::new(RequestScheduler::new(&SchedulerConfig::default()));
        let cache = Arc::new(AssetMetadataCache::default());
        cache.replace(universe()).unwrap();
        exchange.set_book("BTC", book(dec!(94000), dec!(94001)));
        exchange.set_book("ETH", book(dec!(3000), dec!(3001)));

        let executor = OrderExecutor::new(
            ExecutorConfig::default(),
            exchange.clone(),
            wallet.clone(),
            cache,
            scheduler.clone(),
        );
        Harness {
            exchange,
            wallet,
            scheduler,
            executor,
        }
    }

    fn intent(symbol: &str, side: OrderSide, price: Decimal, size: Decimal) -> OrderIntent {
        OrderIntent::new(symbol, side, Price::new(price), Size::new(size), false)
    }

    #[tokio::test(start_paused = true)]
    async fn test_negative_price_rejected_without_dispatch() {
        let h = harness();
        let result = h
            .executor
            .place_limit_order(intent("BTC", OrderSide::Buy, dec!(-5), dec!(0.01)))
            .await;

        assert!(matches!(result, Err(OrderError::Validation(_))));
        assert!(h.exchange.submissions().is_empty());
        assert_eq!(h.exchange.book_fetches(), 0);
        let stats = h.scheduler.stats();
        assert_eq!(stats.general_dispatched + stats.order_dispatched, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_size_rejected() {
        let h = harness();
        let result = h
            .executor
            .place_limit_order(intent("BTC", OrderSide::Sell, dec!(94000), dec!(0)))
            .await;
        assert!(matches!(result, Err(OrderError::Validation(_))));
        assert!(h.exchange.submissions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wallet_not_ready() {
        let h = harness();
        h.wallet.set_signer_ready(false);
        let result = h
            .executor
            .place_limit_order(intent("BTC", OrderSide::Buy, dec!(94000), dec!(0.01)))
            .await;
        assert!(matches!(result, Err(OrderError::NotReady(_))));
        assert!(h.exchange.submissions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_price_deviation_check() {
        let h = harness();
        // mid 3000.5; 6000 is ~100% away
        let result = h
            .executor
            .place_limit_order(intent("ETH", OrderSide::Sell, dec!(6000), dec!(0.1)))
            .await;
        assert!(matches!(result, Err(OrderError::Validation(_))));
        assert!(h.exchange.submissions().is_empty());

        // ~90% away is accepted
        let result = h
            .executor
            .place_limit_order(intent("ETH", OrderSide::Sell, dec!(5700), dec!(0.1)))
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_book_failure_is_non_fatal() {
        let h = harness();
        h.exchange
            .set_book_error("ETH", ExchangeError::Unavailable("down".into()));
        let result = h
            .executor
            .place_limit_order(intent("ETH", OrderSide::Buy, dec!(100000), dec!(0.1)))
            .await;
        assert!(result.is_ok());
        assert_eq!(h.exchange.submissions().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_quantized_submission() {
        let h = harness();
        let placed = h
            .executor
            .place_limit_order(intent("BTC", OrderSide::Buy, dec!(94000.123456), dec!(0.0123456)))
            .await
            .unwrap();

        let submitted = &h.exchange.submissions()[0];
        assert_eq!(submitted.price_str, "94000.1");
        assert_eq!(submitted.size_str, "0.01235");
        assert_eq!(submitted.asset_id, Some(0));
        assert_eq!(placed.price.inner(), dec!(94000.1));
        assert!(!placed.corrected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_rejection_one_corrected_resubmit() {
        let h = harness();
        h.exchange
            .push_rejection("Order has invalid price: tick size must be divisible");

        let placed = h
            .executor
            .place_limit_order(intent("ETH", OrderSide::Buy, dec!(2999.987), dec!(0.5)))
            .await
            .unwrap();

        let subs = h.exchange.submissions();
        assert_eq!(subs.len(), 2);
        assert!(placed.corrected);
        assert_eq!(subs[1].price_str, "2999.99");
        assert_ne!(subs[0].cloid, subs[1].cloid);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_rejection_twice_is_tick_size_error() {
        let h = harness();
        h.exchange.push_rejection("Price must be divisible by tick size");
        h.exchange.push_rejection("Price must be divisible by tick size");

        let result = h
            .executor
            .place_limit_order(intent("ETH", OrderSide::Buy, dec!(2999.987), dec!(0.5)))
            .await;
        let err = result.unwrap_err();
        assert_eq!(err.kind(), "TICK_SIZE_ERROR");
        assert_eq!(h.exchange.submissions().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_size_rejection_corrects_size() {
        let h = harness();
        h.exchange.push_rejection("Order has invalid size");

        let placed = h
            .executor
            .place_limit_order(intent("ETH", OrderSide::Sell, dec!(3001), dec!(0.123456)))
            .await
            .unwrap();
        assert!(placed.corrected);
        assert_eq!(h.exchange.submissions()[1].size_str, "0.1235");
    }

    #[tokio::test(start_paused = true)]
    async fn test_correction_disabled() {
        let h = harness();
        let executor = OrderExecutor::new(
            ExecutorConfig {
                correction_enabled: false,
                ..ExecutorConfig::default()
            },
            h.exchange.clone(),
            h.wallet.clone(),
            h.executor.cache().clone(),
            h.scheduler.clone(),
        );
        h.exchange.push_rejection("Order has invalid size");
        let result = executor
            .place_limit_order(intent("ETH", OrderSide::Sell, dec!(3001), dec!(0.1)))
            .await;
        assert!(matches!(result, Err(OrderError::StepSize(_))));
        assert_eq!(h.exchange.submissions().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_not_resubmitted() {
        let h = harness();
        // Scheduler retries once on the order lane, then gives up
        h.exchange.push_rejection("Rate limit exceeded");
        h.exchange.push_rejection("Rate limit exceeded");

        let result = h
            .executor
            .place_limit_order(intent("ETH", OrderSide::Buy, dec!(3000), dec!(0.1)))
            .await;
        assert!(matches!(result, Err(OrderError::RateLimit(_))));
        assert_eq!(h.exchange.submissions().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_generic_rejection_passes_message() {
        let h = harness();
        h.exchange.push_rejection("Insufficient margin to place order");

        let result = h
            .executor
            .place_limit_order(intent("ETH", OrderSide::Buy, dec!(3000), dec!(0.1)))
            .await;
        assert_eq!(
            result,
            Err(OrderError::Exchange("Insufficient margin to place order".into()))
        );
        assert_eq!(h.exchange.submissions().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all_unknown_asset() {
        let h = harness();
        let result = h.executor.cancel_all("NOPE").await;
        assert!(matches!(result, Err(OrderError::AssetNotFound(_))));
        assert!(h.exchange.cancels().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all_with_no_orders_succeeds() {
        let h = harness();
        let ack = h.executor.cancel_all("BTC").await.unwrap();
        assert_eq!(ack.cancelled, 0);
        assert_eq!(h.exchange.cancels(), vec![(0, "BTC".to_string())]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all_already_canceled_is_success() {
        let h = harness();
        h.exchange.push_cancel_result(Err(ExchangeError::Rejected(
            "Order was never placed, already canceled, or filled".into(),
        )));
        let ack = h.executor.cancel_all("ETH").await.unwrap();
        assert_eq!(ack, CancelAck::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all_clears_resting() {
        let h = harness();
        h.executor
            .place_limit_order(intent("ETH", OrderSide::Buy, dec!(2990), dec!(0.1)))
            .await
            .unwrap();
        assert_eq!(h.exchange.resting("ETH").len(), 1);

        let ack = h.executor.cancel_all("ETH").await.unwrap();
        assert_eq!(ack.cancelled, 1);
        assert!(h.exchange.resting("ETH").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_metadata_through_scheduler() {
        let exchange = Arc::new(MockExchange::new());
        exchange.set_universe(vec![AssetMetadata::from_exchange("SOL", Some(7), 2, 20, None)]);
        let scheduler = Arc::new(RequestScheduler::new(&SchedulerConfig::default()));
        let executor = OrderExecutor::new(
            ExecutorConfig::default(),
            exchange,
            Arc::new(WalletReadiness::ready()),
            Arc::new(AssetMetadataCache::default()),
            scheduler.clone(),
        );

        assert!(executor.refresh_metadata().await.unwrap());
        assert_eq!(executor.cache().asset_id("SOL"), Some(7));
        assert!(!executor.refresh_metadata().await.unwrap());
        assert_eq!(scheduler.stats().general_dispatched, 1);
    }
}
