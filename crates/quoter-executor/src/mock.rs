//! In-memory exchange for tests.
//!
//! Records every call and returns scripted results. Successful submissions
//! rest in a per-symbol book of open orders that `cancel_all` clears, so
//! reconciliation logic sees a consistent exchange.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use parking_lot::Mutex;
use quoter_core::{
    AssetMetadata, BoxFuture, CancelAck, Candle, ExchangeClient, ExchangeError, ExchangeResult,
    OpenOrder, OrderAck, OrderBook, QuantizedOrder,
};
use rust_decimal::Decimal;

/// Mock exchange client.
#[derive(Debug)]
pub struct MockExchange {
    /// Every submitted order, in call order.
    submissions: Mutex<Vec<QuantizedOrder>>,
    /// Scripted submit results; empty = accept and rest.
    submit_results: Mutex<VecDeque<ExchangeResult<OrderAck>>>,
    /// Every cancel-all call as (asset_id, symbol).
    cancels: Mutex<Vec<(u32, String)>>,
    /// Scripted cancel results; empty = cancel everything resting.
    cancel_results: Mutex<VecDeque<ExchangeResult<CancelAck>>>,
    books: Mutex<HashMap<String, ExchangeResult<OrderBook>>>,
    candles: Mutex<HashMap<String, Vec<Candle>>>,
    universe: Mutex<Vec<AssetMetadata>>,
    open_orders: Mutex<HashMap<String, Vec<OpenOrder>>>,
    account_value: Mutex<Decimal>,
    book_fetches: AtomicUsize,
    next_oid: AtomicU64,
}

impl Default for MockExchange {
    fn default() -> Self {
        Self::new()
    }
}

impl MockExchange {
    pub fn new() -> Self {
        Self {
            submissions: Mutex::new(Vec::new()),
            submit_results: Mutex::new(VecDeque::new()),
            cancels: Mutex::new(Vec::new()),
            cancel_results: Mutex::new(VecDeque::new()),
            books: Mutex::new(HashMap::new()),
            candles: Mutex::new(HashMap::new()),
            universe: Mutex::new(Vec::new()),
            open_orders: Mutex::new(HashMap::new()),
            account_value: Mutex::new(Decimal::new(10_000, 0)),
            book_fetches: AtomicUsize::new(0),
            next_oid: AtomicU64::new(1),
        }
    }

    /// Queue the result of the next submission.
    pub fn push_submit_result(&self, result: ExchangeResult<OrderAck>) {
        self.submit_results.lock().push_back(result);
    }

    /// Queue a submission rejection with an exchange message.
    pub fn push_rejection(&self, msg: &str) {
        self.push_submit_result(Err(ExchangeError::from_message(msg)));
    }

    /// Queue the result of the next cancel-all.
    pub fn push_cancel_result(&self, result: ExchangeResult<CancelAck>) {
        self.cancel_results.lock().push_back(result);
    }

    pub fn set_book(&self, symbol: &str, book: OrderBook) {
        self.books.lock().insert(symbol.to_string(), Ok(book));
    }

    pub fn set_book_error(&self, symbol: &str, error: ExchangeError) {
        self.books.lock().insert(symbol.to_string(), Err(error));
    }

    pub fn set_candles(&self, symbol: &str, candles: Vec<Candle>) {
        self.candles.lock().insert(symbol.to_string(), candles);
    }

    pub fn set_universe(&self, universe: Vec<AssetMetadata>) {
        *self.universe.lock() = universe;
    }

    pub fn set_open_orders(&self, symbol: &str, orders: Vec<OpenOrder>) {
        self.open_orders.lock().insert(symbol.to_string(), orders);
    }

    pub fn set_account_value(&self, value: Decimal) {
        *self.account_value.lock() = value;
    }

    pub fn submissions(&self) -> Vec<QuantizedOrder> {
        self.submissions.lock().clone()
    }

    pub fn cancels(&self) -> Vec<(u32, String)> {
        self.cancels.lock().clone()
    }

    pub fn resting(&self, symbol: &str) -> Vec<OpenOrder> {
        self.open_orders
            .lock()
            .get(symbol)
            .cloned()
            .unwrap_or_default()
    }

    pub fn book_fetches(&self) -> usize {
        self.book_fetches.load(Ordering::SeqCst)
    }

    pub fn clear_calls(&self) {
        self.submissions.lock().clear();
        self.cancels.lock().clear();
    }
}

impl ExchangeClient for MockExchange {
    fn submit_order(&self, order: QuantizedOrder) -> BoxFuture<'_, ExchangeResult<OrderAck>> {
        Box::pin(async move {
            self.submissions.lock().push(order.clone());
            let scripted = self.submit_results.lock().pop_front();
            let ack = match scripted {
                Some(result) => result?,
                None => OrderAck {
                    oid: self.next_oid.fetch_add(1, Ordering::SeqCst),
                    resting: true,
                },
            };
            if ack.resting {
                self.open_orders
                    .lock()
                    .entry(order.symbol.clone())
                    .or_default()
                    .push(OpenOrder {
                        oid: ack.oid,
                        symbol: order.symbol,
                        side: order.side,
                        price: order.price,
                        size: order.size,
                        timestamp_ms: 0,
                    });
            }
            Ok(ack)
        })
    }

    fn cancel_all<'a>(
        &'a self,
        asset_id: u32,
        symbol: &'a str,
    ) -> BoxFuture<'a, ExchangeResult<CancelAck>> {
        Box::pin(async move {
            self.cancels.lock().push((asset_id, symbol.to_string()));
            let scripted = self.cancel_results.lock().pop_front();
            if let Some(result) = scripted {
                if result.is_ok() {
                    self.open_orders.lock().remove(symbol);
                }
                return result;
            }
            let cancelled = self
                .open_orders
                .lock()
                .remove(symbol)
                .map_or(0, |orders| orders.len());
            Ok(CancelAck { cancelled })
        })
    }

    fn fetch_order_book<'a>(&'a self, symbol: &'a str) -> BoxFuture<'a, ExchangeResult<OrderBook>> {
        Box::pin(async move {
            self.book_fetches.fetch_add(1, Ordering::SeqCst);
            self.books
                .lock()
                .get(symbol)
                .cloned()
                .unwrap_or_else(|| Err(ExchangeError::Unavailable(format!("no book for {symbol}"))))
        })
    }

    fn fetch_candles<'a>(
        &'a self,
        symbol: &'a str,
        count: usize,
    ) -> BoxFuture<'a, ExchangeResult<Vec<Candle>>> {
        Box::pin(async move {
            let candles = self.candles.lock().get(symbol).cloned().unwrap_or_default();
            let skip = candles.len().saturating_sub(count);
            Ok(candles.into_iter().skip(skip).collect())
        })
    }

    fn fetch_instrument_universe(&self) -> BoxFuture<'_, ExchangeResult<Vec<AssetMetadata>>> {
        Box::pin(async move { Ok(self.universe.lock().clone()) })
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
