//! Registry error types.

use quoter_core::ExchangeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Metadata fetch failed: {0}")]
    Fetch(#[from] ExchangeError),

    #[error("Instrument universe is empty")]
    EmptyUniverse,

    #[error("Response parse error: {0}")]
    ParseError(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type RegistryResult<T> = Result<T, RegistryError>;
