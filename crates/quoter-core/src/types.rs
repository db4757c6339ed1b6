//! Market snapshot types.
//!
//! Order book depth, candles, open orders and exchange acknowledgements as
//! the exchange collaborator reports them.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{OrderSide, Price, Size};

/// Book state for empty / crossed detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookState {
    /// Both sides present and bid < ask.
    Valid,
    /// No bid levels.
    NoBid,
    /// No ask levels.
    NoAsk,
    /// Both sides missing.
    Empty,
    /// Best bid >= best ask.
    Crossed,
}

impl BookState {
    pub fn is_tradeable(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

impl std::fmt::Display for BookState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Valid => write!(f, "VALID"),
            Self::NoBid => write!(f, "NO_BID"),
            Self::NoAsk => write!(f, "NO_ASK"),
            Self::Empty => write!(f, "EMPTY"),
            Self::Crossed => write!(f, "CROSSED"),
        }
    }
}

/// One price level of the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: Price,
    pub size: Size,
}

impl BookLevel {
    pub fn new(price: Price, size: Size) -> Self {
        Self { price, size }
    }
}

/// L2 order book snapshot.
///
/// Bids are sorted best (highest) first, asks best (lowest) first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBook {
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
}

impl OrderBook {
    pub fn new(bids: Vec<BookLevel>, asks: Vec<BookLevel>) -> Self {
        Self { bids, asks }
    }

    pub fn best_bid(&self) -> Option<Price> {
        self.bids.first().map(|l| l.price)
    }

    pub fn best_ask(&self) -> Option<Price> {
        self.asks.first().map(|l| l.price)
    }

    pub fn state(&self) -> BookState {
        let bid = self.best_bid().filter(Price::is_positive);
        let ask = self.best_ask().filter(Price::is_positive);

        match (bid, ask) {
            (None, None) => BookState::Empty,
            (Some(_), None) => BookState::NoAsk,
            (None, Some(_)) => BookState::NoBid,
            (Some(b), Some(a)) if b < a => BookState::Valid,
            (Some(_), Some(_)) => BookState::Crossed,
        }
    }

    /// `(best_bid + best_ask) / 2`, or `None` if the book is empty or crossed.
    pub fn mid_price(&self) -> Option<Price> {
        if !self.state().is_tradeable() {
            return None;
        }
        let bid = self.best_bid()?;
        let ask = self.best_ask()?;
        Some(Price::new((bid.inner() + ask.inner()) / Decimal::TWO))
    }

    /// Relative spread `(ask - bid) / mid`.
    pub fn relative_spread(&self) -> Option<Decimal> {
        let mid = self.mid_price()?;
        let spread = self.best_ask()?.inner() - self.best_bid()?.inner();
        Some(spread / mid.inner())
    }
}

/// OHLCV candle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candle {
    /// Open time, unix milliseconds.
    pub open_time_ms: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

/// A resting order as the exchange reports it. Read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenOrder {
    pub oid: u64,
    pub symbol: String,
    pub side: OrderSide,
    pub price: Price,
    pub size: Size,
    pub timestamp_ms: i64,
}

/// Exchange acknowledgement of an order submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAck {
    /// Exchange order id.
    pub oid: u64,
    /// Whether the order is resting (false if it filled immediately).
    pub resting: bool,
}

/// Exchange acknowledgement of a cancel-all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelAck {
    pub cancelled: usize,
}
