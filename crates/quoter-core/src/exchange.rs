//! Collaborator contracts consumed by the quoting core.
//!
//! The exchange transport (signing, WebSocket/HTTP plumbing) and the wallet
//! live outside this workspace. The core only sees these traits, which keeps
//! every component testable with in-memory doubles.

use std::pin::Pin;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::{AssetMetadata, CancelAck, Candle, OpenOrder, OrderAck, OrderBook, QuantizedOrder};

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Failure reported by the exchange collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExchangeError {
    /// The exchange evaluated the request and refused it.
    #[error("rejected: {0}")]
    Rejected(String),

    /// The exchange throttled the request.
    #[error("rate limit: {0}")]
    RateLimited(String),

    /// The request never got a definitive answer (network, timeout, 5xx).
    #[error("transport: {0}")]
    Transport(String),

    /// Wallet or client is not ready to sign/submit.
    #[error("exchange client not ready")]
    NotReady,

    /// The requested data does not exist or could not be decoded.
    #[error("unavailable: {0}")]
    Unavailable(String),
}

impl ExchangeError {
    /// Classify a raw exchange error message.
    pub fn from_message(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        let lower = msg.to_ascii_lowercase();
        if lower.contains("rate limit") || lower.contains("too many requests") {
            Self::RateLimited(msg)
        } else {
            Self::Rejected(msg)
        }
    }

    /// Whether retrying the same request can plausibly succeed.
    ///
    /// Deterministic rejections are not retryable; they need corrected input.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited(_) | Self::Transport(_))
    }

    /// Message carried by the error (empty for `NotReady`).
    pub fn message(&self) -> &str {
        match self {
            Self::Rejected(m) | Self::RateLimited(m) | Self::Transport(m) | Self::Unavailable(m) => {
                m
            }
            Self::NotReady => "",
        }
    }
}

/// Result alias for exchange calls.
pub type ExchangeResult<T> = Result<T, ExchangeError>;

/// Exchange transport/client contract.
///
/// Every method is a single exchange round trip. Callers route them through
/// the request scheduler; implementations must not add their own queueing.
pub trait ExchangeClient: Send + Sync {
    /// Submit a quantized limit order.
    fn submit_order(&self, order: QuantizedOrder) -> BoxFuture<'_, ExchangeResult<OrderAck>>;

    /// Cancel every resting order on one asset.
    fn cancel_all<'a>(
        &'a self,
        asset_id: u32,
        symbol: &'a str,
    ) -> BoxFuture<'a, ExchangeResult<CancelAck>>;

    /// Fetch the current L2 book.
    fn fetch_order_book<'a>(&'a self, symbol: &'a str) -> BoxFuture<'a, ExchangeResult<OrderBook>>;

    /// Fetch the most recent `count` candles, oldest first.
    fn fetch_candles<'a>(
        &'a self,
        symbol: &'a str,
        count: usize,
    ) -> BoxFuture<'a, ExchangeResult<Vec<Candle>>>;

    /// Fetch metadata for every tradable instrument.
    fn fetch_instrument_universe(&self) -> BoxFuture<'_, ExchangeResult<Vec<AssetMetadata>>>;

    /// Fetch resting orders for one symbol.
    fn fetch_open_orders<'a>(
        &'a self,
        symbol: &'a str,
    ) -> BoxFuture<'a, ExchangeResult<Vec<OpenOrder>>>;

    /// Fetch the account value used for risk sizing.
    fn fetch_account_value(&self) -> BoxFuture<'_, ExchangeResult<Decimal>>;
}

/// Wallet/signing collaborator readiness.
///
/// The core performs no signing. It only refuses to submit when the wallet
/// reports it is not ready.
pub trait WalletStatus: Send + Sync {
    fn is_ready(&self) -> bool;
}
