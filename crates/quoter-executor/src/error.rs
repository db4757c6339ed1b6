//! Order error taxonomy.

use thiserror::Error;

/// Categorized order failure.
///
/// Callers decide on retries from the category: tick/step errors mean the
/// input needs adjusting, rate-limit errors mean waiting.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// Bad input; no network call was made.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Price/size could not be aligned or formatted.
    #[error("Quantization failed: {0}")]
    Quantization(String),

    /// Price rejected for tick alignment after one corrective resubmit.
    #[error("Tick size rejection: {0}")]
    TickSize(String),

    /// Size rejected for step alignment after one corrective resubmit.
    #[error("Step size rejection: {0}")]
    StepSize(String),

    #[error("Rate limited: {0}")]
    RateLimit(String),

    /// Generic exchange rejection, original message passed through.
    #[error("Order failed: {0}")]
    Exchange(String),

    /// Wallet or exchange client not ready.
    #[error("Not ready: {0}")]
    NotReady(String),

    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    /// The request scheduler is shut down.
    #[error("Scheduler unavailable: {0}")]
    Scheduler(String),
}

impl OrderError {
    /// Stable category string.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Quantization(_) => "QUANTIZATION_ERROR",
            Self::TickSize(_) => "TICK_SIZE_ERROR",
            Self::StepSize(_) => "STEP_SIZE_ERROR",
            Self::RateLimit(_) => "RATE_LIMIT_ERROR",
            Self::Exchange(_) => "ORDER_FAILED",
            Self::NotReady(_) => "NOT_READY",
            Self::AssetNotFound(_) => "ASSET_NOT_FOUND",
            Self::Scheduler(_) => "SCHEDULER_ERROR",
        }
    }

    /// Whether a retry with adjusted price/size may succeed.
    pub fn needs_adjustment(&self) -> bool {
        matches!(self, Self::TickSize(_) | Self::StepSize(_))
    }
}

pub type OrderResult<T> = Result<T, OrderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_strings() {
        assert_eq!(OrderError::TickSize("x".into()).kind(), "TICK_SIZE_ERROR");
        assert_eq!(OrderError::Exchange("x".into()).kind(), "ORDER_FAILED");
        assert!(OrderError::StepSize("x".into()).needs_adjustment());
        assert!(!OrderError::RateLimit("x".into()).needs_adjustment());
    }
}
