//! Order-related types and identifiers.
//!
//! An order moves through two immutable shapes: [`OrderIntent`] (what the
//! caller asked for) and [`QuantizedOrder`] (tick/step aligned and formatted
//! for the wire).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::CoreError;
use crate::{Price, Size};

/// Order side: buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Returns the opposite side.
    pub fn opposite(&self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }

    pub fn is_buy(&self) -> bool {
        matches!(self, Self::Buy)
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

impl FromStr for OrderSide {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "buy" | "b" | "bid" => Ok(Self::Buy),
            "sell" | "s" | "a" | "ask" => Ok(Self::Sell),
            other => Err(CoreError::InvalidSide(other.to_string())),
        }
    }
}

/// Client order ID attached to every submission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientOrderId(String);

impl ClientOrderId {
    /// Create a new unique client order ID.
    ///
    /// Format: `q_{timestamp_ms}_{uuid_short}`
    pub fn new() -> Self {
        let ts = chrono::Utc::now().timestamp_millis();
        let uuid = Uuid::new_v4().simple().to_string();
        Self(format!("q_{ts}_{}", &uuid[..8]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ClientOrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientOrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What the caller wants to place, before any rounding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderIntent {
    pub symbol: String,
    pub side: OrderSide,
    pub price: Price,
    pub size: Size,
    pub reduce_only: bool,
}

impl OrderIntent {
    pub fn new(
        symbol: impl Into<String>,
        side: OrderSide,
        price: Price,
        size: Size,
        reduce_only: bool,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            price,
            size,
            reduce_only,
        }
    }
}

/// An intent whose price/size are aligned to tick/step and rendered to the
/// asset's decimal precision.
///
/// Consumed once by a submission call; a corrective resubmission builds a
/// fresh value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantizedOrder {
    pub cloid: ClientOrderId,
    pub symbol: String,
    /// Exchange asset index, when known.
    pub asset_id: Option<u32>,
    pub side: OrderSide,
    pub price: Price,
    pub size: Size,
    /// Wire representation of `price`.
    pub price_str: String,
    /// Wire representation of `size`.
    pub size_str: String,
    pub reduce_only: bool,
}

impl fmt::Display for QuantizedOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} @ {}{}",
            self.symbol,
            self.side,
            self.size_str,
            self.price_str,
            if self.reduce_only { " (reduce-only)" } else { "" }
        )
    }
}
