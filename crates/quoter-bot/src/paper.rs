//! Paper exchange.
//!
//! Market data (universe, books, candles) comes from the live info endpoint.
//! Orders never leave the process: they are checked against the asset's
//! tick and step the way the exchange does, rest in memory, and fill when a
//! later book snapshot trades through them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use quoter_core::{
    AssetMetadata, BoxFuture, CancelAck, Candle, ExchangeClient, ExchangeError, ExchangeResult,
    OpenOrder, OrderAck, OrderBook, OrderSide, QuantizedOrder,
};
use quoter_registry::{MetaClient, RegistryError};
use rust_decimal::Decimal;
use tracing::{debug, info};

/// Exchange minimum order value (USD).
const MIN_ORDER_VALUE: Decimal = Decimal::TEN;

pub struct PaperExchange {
    client: MetaClient,
    candle_interval: String,
    account_value: Mutex<Decimal>,
    /// Last fetched universe, used to validate submissions.
    assets: RwLock<HashMap<String, AssetMetadata>>,
    orders: Mutex<HashMap<String, Vec<OpenOrder>>>,
    next_oid: AtomicU64,
    fills: AtomicU64,
}

impl PaperExchange {
    pub fn new(
        client: MetaClient,
        candle_interval: impl Into<String>,
        account_value: Decimal,
    ) -> Self {
        Self {
            client,
            candle_interval: candle_interval.into(),
            account_value: Mutex::new(account_value),
            assets: RwLock::new(HashMap::new()),
            orders: Mutex::new(HashMap::new()),
            next_oid: AtomicU64::new(1),
            fills: AtomicU64::new(0),
        }
    }

    /// Replace the asset table used to validate submissions.
    pub fn load_assets(&self, assets: &[AssetMetadata]) {
        let mut table = self.assets.write();
        table.clear();
        table.extend(assets.iter().map(|a| (a.symbol.clone(), a.clone())));
    }

    /// Orders filled so far.
    pub fn fills(&self) -> u64 {
        self.fills.load(Ordering::Relaxed)
    }

    pub fn resting(&self, symbol: &str) -> Vec<OpenOrder> {
        self.orders.lock().get(symbol).cloned().unwrap_or_default()
    }

    fn place(&self, order: QuantizedOrder) -> ExchangeResult<OrderAck> {
        let meta = self
            .assets
            .read()
            .get(&order.symbol)
            .cloned()
            .ok_or_else(|| ExchangeError::Rejected(format!("Unknown asset {}", order.symbol)))?;
        check_order(&meta, &order)?;

        let oid = self.next_oid.fetch_add(1, Ordering::Relaxed);
        info!(
            oid,
            symbol = %order.symbol,
            side = %order.side,
            price = %order.price_str,
            size = %order.size_str,
            "Paper order resting"
        );
        self.orders
            .lock()
            .entry(order.symbol.clone())
            .or_default()
            .push(OpenOrder {
                oid,
                symbol: order.symbol,
                side: order.side,
                price: order.price,
                size: order.size,
                timestamp_ms: chrono::Utc::now().timestamp_millis(),
            });
        Ok(OrderAck { oid, resting: true })
    }

    fn fill_against(&self, symbol: &str, book: &OrderBook) {
        let filled = match self.orders.lock().get_mut(symbol) {
            Some(orders) => take_crossed(orders, book),
            None => return,
        };
        for order in &filled {
            info!(
                oid = order.oid,
                %symbol,
                side = %order.side,
                price = %order.price,
                size = %order.size,
                "Paper order filled"
            );
        }
        self.fills.fetch_add(filled.len() as u64, Ordering::Relaxed);
    }
}

/// Reject orders the way the exchange would: off-tick price, off-step size,
/// value under the minimum.
pub fn check_order(meta: &AssetMetadata, order: &QuantizedOrder) -> ExchangeResult<()> {
    let tick = meta.tick_size.inner();
    if !tick.is_zero() && !(order.price.inner() % tick).is_zero() {
        return Err(ExchangeError::Rejected(format!(
            "Order has invalid price {}: tick size must be divisible by {tick}",
            order.price_str
        )));
    }
    let step = meta.step_size.inner();
    if !step.is_zero() && !(order.size.inner() % step).is_zero() {
        return Err(ExchangeError::Rejected(format!(
            "Order has invalid size {}: step size is {step}",
            order.size_str
        )));
    }
    if order.size.notional(order.price) < MIN_ORDER_VALUE {
        return Err(ExchangeError::Rejected(format!(
            "Order must have minimum value of ${MIN_ORDER_VALUE}"
        )));
    }
    Ok(())
}

/// Remove and return the orders a book snapshot trades through.
pub fn take_crossed(orders: &mut Vec<OpenOrder>, book: &OrderBook) -> Vec<OpenOrder> {
    let best_bid = book.best_bid();
    let best_ask = book.best_ask();
    let crossed = |o: &OpenOrder| match o.side {
        OrderSide::Buy => best_ask.is_some_and(|ask| ask <= o.price),
        OrderSide::Sell => best_bid.is_some_and(|bid| bid >= o.price),
    };

    let (filled, resting): (Vec<_>, Vec<_>) = orders.drain(..).partition(crossed);
    *orders = resting;
    filled
}

fn to_exchange_error(e: RegistryError) -> ExchangeError {
    match e {
        RegistryError::Fetch(e) => e,
        RegistryError::HttpClient(msg) => match ExchangeError::from_message(msg.clone()) {
            limited @ ExchangeError::RateLimited(_) => limited,
            _ => ExchangeError::Transport(msg),
        },
        other => ExchangeError::Unavailable(other.to_string()),
    }
}

impl ExchangeClient for PaperExchange {
    fn submit_order(&self, order: QuantizedOrder) -> BoxFuture<'_, ExchangeResult<OrderAck>> {
        Box::pin(async move { self.place(order) })
    }

    fn cancel_all<'a>(
        &'a self,
        asset_id: u32,
        symbol: &'a str,
    ) -> BoxFuture<'a, ExchangeResult<CancelAck>> {
        Box::pin(async move {
            let cancelled = self.orders.lock().remove(symbol).map_or(0, |o| o.len());
            debug!(%symbol, asset_id, cancelled, "Paper cancel all");
            Ok(CancelAck { cancelled })
        })
    }

    fn fetch_order_book<'a>(&'a self, symbol: &'a str) -> BoxFuture<'a, ExchangeResult<OrderBook>> {
        Box::pin(async move {
            let book = self
                .client
                .fetch_l2_book(symbol)
                .await
                .map_err(to_exchange_error)?;
            self.fill_against(symbol, &book);
            Ok(book)
        })
    }

    fn fetch_candles<'a>(
        &'a self,
        symbol: &'a str,
        count: usize,
    ) -> BoxFuture<'a, ExchangeResult<Vec<Candle>>> {
        Box::pin(async move {
            self.client
                .fetch_candles(symbol, &self.candle_interval, count)
                .await
                .map_err(to_exchange_error)
        })
    }

    fn fetch_instrument_universe(&self) -> BoxFuture<'_, ExchangeResult<Vec<AssetMetadata>>> {
        Box::pin(async move {
            let universe = self
                .client
                .fetch_universe()
                .await
                .map_err(to_exchange_error)?;
            self.load_assets(&universe);
            Ok(universe)
        })
    }

    fn fetch_open_orders<'a>(
        &'a self,
        symbol: &'a str,
    ) -> BoxFuture<'a, ExchangeResult<Vec<OpenOrder>>> {
        Box::pin(async move { Ok(self.resting(symbol)) })
    }

    fn fetch_account_value(&self) -> BoxFuture<'_, ExchangeResult<Decimal>> {
        Box::pin(async move { Ok(*self.account_value.lock()) })
    }
}
