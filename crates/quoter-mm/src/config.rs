//! Market making configuration.

use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Analysis runs this many times slower than the base update interval.
pub const ANALYSIS_INTERVAL_MULTIPLIER: u32 = 10;

/// Market making configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MakerConfig {
    /// Symbols to quote (exchange names, e.g. "ETH").
    #[serde(default)]
    pub symbols: Vec<String>,

    /// Base update interval in milliseconds. Analysis runs every
    /// `10 × update_interval_ms`.
    #[serde(default = "default_update_interval_ms")]
    pub update_interval_ms: u64,

    /// Reconciliation cadence in milliseconds.
    #[serde(default = "default_order_refresh_ms")]
    pub order_refresh_ms: u64,

    /// A cached market condition older than
    /// `stale_multiplier × update_interval_ms` is recomputed inline.
    #[serde(default = "default_stale_multiplier")]
    pub stale_multiplier: u32,

    /// Lower spread clamp (fraction of mid, 0.001 = 10 bps).
    #[serde(default = "default_min_spread")]
    pub min_spread: Decimal,

    /// Upper spread clamp (fraction of mid).
    #[serde(default = "default_max_spread")]
    pub max_spread: Decimal,

    /// Ladder levels per side.
    #[serde(default = "default_order_levels")]
    pub order_levels: u32,

    /// Distance between consecutive levels (fraction of mid).
    #[serde(default = "default_order_spacing")]
    pub order_spacing: Decimal,

    /// Percent of account value committed per level (1.0 = 1%).
    #[serde(default = "default_risk_percentage")]
    pub risk_percentage: Decimal,

    /// Minimum order notional in quote currency.
    #[serde(default = "default_min_order_notional")]
    pub min_order_notional: Decimal,

    /// An open order within this relative distance of a target level
    /// already covers it (0.001 = 0.1%).
    #[serde(default = "default_duplicate_tolerance")]
    pub duplicate_tolerance: Decimal,

    /// Levels deviating more than this from mid are skipped (0.5 = 50%).
    #[serde(default = "default_max_level_deviation")]
    pub max_level_deviation: Decimal,

    /// Rolling indicator history length.
    #[serde(default = "default_history_len")]
    pub history_len: usize,

    /// Candles pulled per analysis pass.
    #[serde(default = "default_candle_count")]
    pub candle_count: usize,

    /// Candle interval ("1m", "5m", ...).
    #[serde(default = "default_candle_interval")]
    pub candle_interval: String,

    /// Process symbols concurrently.
    #[serde(default = "default_true")]
    pub simultaneous_pairs: bool,

    #[serde(default = "default_bollinger_period")]
    pub bollinger_period: usize,

    #[serde(default = "default_bollinger_std_dev")]
    pub bollinger_std_dev: f64,

    /// Best-effort cancel-all per symbol on shutdown.
    #[serde(default = "default_true")]
    pub cancel_on_shutdown: bool,
}

impl MakerConfig {
    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }

    pub fn analysis_interval(&self) -> Duration {
        self.update_interval() * ANALYSIS_INTERVAL_MULTIPLIER
    }

    pub fn order_refresh_interval(&self) -> Duration {
        Duration::from_millis(self.order_refresh_ms)
    }

    /// Age after which a cached market condition is stale.
    pub fn stale_after(&self) -> Duration {
        self.update_interval() * self.stale_multiplier
    }

    /// Sanity-check values that would make the ladder meaningless.
    pub fn validate(&self) -> Result<(), String> {
        if self.min_spread <= Decimal::ZERO || self.max_spread <= Decimal::ZERO {
            return Err("spreads must be positive".to_string());
        }
        if self.min_spread > self.max_spread {
            return Err(format!(
                "min_spread {} exceeds max_spread {}",
                self.min_spread, self.max_spread
            ));
        }
        if self.order_levels == 0 {
            return Err("order_levels must be at least 1".to_string());
        }
        if self.order_refresh_ms == 0 || self.update_interval_ms == 0 {
            return Err("intervals must be non-zero".to_string());
        }
        if self.history_len == 0 {
            return Err("history_len must be at least 1".to_string());
        }
        Ok(())
    }
}

impl Default for MakerConfig {
    fn default() -> Self {
        Self {
            symbols: Vec::new(),
            update_interval_ms: default_update_interval_ms(),
            order_refresh_ms: default_order_refresh_ms(),
            stale_multiplier: default_stale_multiplier(),
            min_spread: default_min_spread(),
            max_spread: default_max_spread(),
            order_levels: default_order_levels(),
            order_spacing: default_order_spacing(),
            risk_percentage: default_risk_percentage(),
            min_order_notional: default_min_order_notional(),
            duplicate_tolerance: default_duplicate_tolerance(),
            max_level_deviation: default_max_level_deviation(),
            history_len: default_history_len(),
            candle_count: default_candle_count(),
            candle_interval: default_candle_interval(),
            simultaneous_pairs: true,
            bollinger_period: default_bollinger_period(),
            bollinger_std_dev: default_bollinger_std_dev(),
            cancel_on_shutdown: true,
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_update_interval_ms() -> u64 {
    1000
}
fn default_order_refresh_ms() -> u64 {
    500
}
fn default_stale_multiplier() -> u32 {
    5
}
fn default_min_spread() -> Decimal {
    Decimal::new(1, 3) // 0.1%
}
fn default_max_spread() -> Decimal {
    Decimal::new(1, 2) // 1%
}
fn default_order_levels() -> u32 {
    3
}
fn default_order_spacing() -> Decimal {
    Decimal::new(1, 3) // 0.1% between levels
}
fn default_risk_percentage() -> Decimal {
    Decimal::ONE // 1% of balance per level
}
fn default_min_order_notional() -> Decimal {
    Decimal::TEN // $10
}
fn default_duplicate_tolerance() -> Decimal {
    Decimal::new(1, 3) // 0.1%
}
fn default_max_level_deviation() -> Decimal {
    Decimal::new(5, 1) // 50%
}
fn default_history_len() -> usize {
    20
}
fn default_candle_count() -> usize {
    50
}
fn default_candle_interval() -> String {
    "1m".to_string()
}
fn default_bollinger_period() -> usize {
    20
}
fn default_bollinger_std_dev() -> f64 {
    2.0
}
