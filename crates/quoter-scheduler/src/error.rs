//! Scheduler error types.

use quoter_core::ExchangeError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// The scheduler was shut down before the request could run.
    #[error("Scheduler closed")]
    Closed,

    /// The request was dropped before settling (its task panicked).
    #[error("Request aborted")]
    Aborted,

    /// The request failed (after any retries).
    #[error(transparent)]
    Exchange(#[from] ExchangeError),
}

impl SchedulerError {
    /// The exchange error, if the request actually ran.
    pub fn exchange(&self) -> Option<&ExchangeError> {
        match self {
            Self::Exchange(e) => Some(e),
            Self::Closed | Self::Aborted => None,
        }
    }
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
