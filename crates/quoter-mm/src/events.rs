//! Engine event channel.
//!
//! Events are delivered over an unbounded mpsc channel. Errors are delivered
//! at least once; ordering across symbols is not guaranteed.

use quoter_core::{OrderSide, Price, Size};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::analysis::Sentiment;
use crate::reconcile::CancelReason;

/// Where in the engine a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineStage {
    Analysis,
    Reconcile,
    Placement,
    Shutdown,
}

impl EngineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Analysis => "analysis",
            Self::Reconcile => "reconcile",
            Self::Placement => "placement",
            Self::Shutdown => "shutdown",
        }
    }
}

impl std::fmt::Display for EngineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    CycleError {
        symbol: String,
        stage: EngineStage,
        error: String,
    },
    OrdersCancelled {
        symbol: String,
        reason: CancelReason,
        cancelled: usize,
    },
    OrderPlaced {
        symbol: String,
        side: OrderSide,
        price: Price,
        size: Size,
        oid: u64,
    },
    /// A ladder level strayed beyond the allowed deviation from mid.
    LevelSkipped {
        symbol: String,
        side: OrderSide,
        price: Price,
        deviation: Decimal,
    },
    SentimentFlip {
        symbol: String,
        from: Sentiment,
        to: Sentiment,
    },
}

impl EngineEvent {
    pub fn symbol(&self) -> &str {
        match self {
            Self::CycleError { symbol, .. }
            | Self::OrdersCancelled { symbol, .. }
            | Self::OrderPlaced { symbol, .. }
            | Self::LevelSkipped { symbol, .. }
            | Self::SentimentFlip { symbol, .. } => symbol,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::CycleError { .. })
    }
}
