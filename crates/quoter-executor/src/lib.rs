//! Order execution.
//!
//! [`OrderExecutor`] validates, quantizes and submits limit orders through
//! the order lane of the request scheduler, and self-corrects once on
//! tick/step rejections. Every public operation returns a tagged
//! [`OrderError`] instead of propagating exchange failures raw.

pub mod config;
pub mod error;
pub mod executor;
pub mod mock;
pub mod ready;

pub use config::ExecutorConfig;
pub use error::{OrderError, OrderResult};
pub use executor::{OrderExecutor, PlacedOrder};
pub use mock::MockExchange;
pub use ready::WalletReadiness;
