//! Executor configuration.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order executor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Maximum relative distance of a limit price from the book mid.
    /// 0.95 = reject anything more than 95% away from mid.
    #[serde(default = "default_max_price_deviation")]
    pub max_price_deviation: Decimal,

    /// Resubmit once with strictly recomputed price/size after a tick or
    /// step rejection.
    #[serde(default = "default_true")]
    pub correction_enabled: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_price_deviation: default_max_price_deviation(),
            correction_enabled: true,
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_max_price_deviation() -> Decimal {
    Decimal::new(95, 2) // 0.95
}
