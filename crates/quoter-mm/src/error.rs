//! Engine error types.

use quoter_executor::OrderError;
use quoter_scheduler::SchedulerError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// A market data request failed after the scheduler's retries.
    #[error("Market data request failed for {symbol}: {source}")]
    MarketData {
        symbol: String,
        #[source]
        source: SchedulerError,
    },

    /// Neither the book nor candles yielded a usable price.
    #[error("No usable price for {0}")]
    NoPrice(String),

    #[error("Order operation failed: {0}")]
    Order(#[from] OrderError),
}

impl EngineError {
    pub(crate) fn market_data(symbol: &str, source: SchedulerError) -> Self {
        Self::MarketData {
            symbol: symbol.to_string(),
            source,
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
