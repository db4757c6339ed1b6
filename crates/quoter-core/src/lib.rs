//! Core domain types for the perp quoting engine.
//!
//! This crate provides fundamental types used throughout the system:
//! - `Price`, `Size`: Precision-safe numeric types
//! - `AssetMetadata`: Per-symbol quantization metadata (tick, step, decimals)
//! - `OrderIntent`, `QuantizedOrder`: Order construction pipeline
//! - `OrderBook`, `Candle`, `OpenOrder`: Market snapshots
//! - `ExchangeClient`, `WalletStatus`: Collaborator contracts

pub mod decimal;
pub mod error;
pub mod exchange;
pub mod market;
pub mod order;
pub mod types;

pub use decimal::{Price, Size};
pub use error::{CoreError, Result};
pub use exchange::{BoxFuture, ExchangeClient, ExchangeError, ExchangeResult, WalletStatus};
pub use market::{AssetMetadata, DEFAULT_STEP_SIZE, DEFAULT_TICK_SIZE};
pub use order::{ClientOrderId, OrderIntent, OrderSide, QuantizedOrder};
pub use types::{BookLevel, BookState, CancelAck, Candle, OpenOrder, OrderAck, OrderBook};
