//! Scheduler configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backoff::Backoff;

/// Request scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Sliding rate window length in milliseconds.
    #[serde(default = "default_rate_window_ms")]
    pub rate_window_ms: u64,

    /// Exchange limit on requests per window.
    #[serde(default = "default_max_requests_per_window")]
    pub max_requests_per_window: u32,

    /// Fraction of `max_requests_per_window` at which the general lane
    /// starts waiting for the window to drain.
    #[serde(default = "default_window_utilization")]
    pub window_utilization: f64,

    /// Extra wait after the oldest request leaves the window.
    #[serde(default = "default_window_buffer_ms")]
    pub window_buffer_ms: u64,

    /// Delay after each general-lane dispatch.
    #[serde(default = "default_general_delay_ms")]
    pub general_delay_ms: u64,

    /// Minimum spacing between order-lane dispatches.
    #[serde(default = "default_order_delay_ms")]
    pub order_delay_ms: u64,

    /// Attempts per general-lane request (first try included).
    #[serde(default = "default_general_max_attempts")]
    pub general_max_attempts: u32,

    /// Attempts per order-lane request (first try included).
    #[serde(default = "default_order_max_attempts")]
    pub order_max_attempts: u32,

    /// First backoff delay.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Backoff ceiling.
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
}

impl SchedulerConfig {
    pub fn rate_window(&self) -> Duration {
        Duration::from_millis(self.rate_window_ms)
    }

    pub fn window_buffer(&self) -> Duration {
        Duration::from_millis(self.window_buffer_ms)
    }

    pub fn general_delay(&self) -> Duration {
        Duration::from_millis(self.general_delay_ms)
    }

    pub fn order_delay(&self) -> Duration {
        Duration::from_millis(self.order_delay_ms)
    }

    pub fn backoff(&self) -> Backoff {
        Backoff::new(
            Duration::from_millis(self.backoff_base_ms),
            Duration::from_millis(self.backoff_max_ms),
        )
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            rate_window_ms: default_rate_window_ms(),
            max_requests_per_window: default_max_requests_per_window(),
            window_utilization: default_window_utilization(),
            window_buffer_ms: default_window_buffer_ms(),
            general_delay_ms: default_general_delay_ms(),
            order_delay_ms: default_order_delay_ms(),
            general_max_attempts: default_general_max_attempts(),
            order_max_attempts: default_order_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
        }
    }
}

fn default_rate_window_ms() -> u64 {
    60_000
}
fn default_max_requests_per_window() -> u32 {
    1200
}
fn default_window_utilization() -> f64 {
    0.8
}
fn default_window_buffer_ms() -> u64 {
    100
}
fn default_general_delay_ms() -> u64 {
    200
}
fn default_order_delay_ms() -> u64 {
    250
}
fn default_general_max_attempts() -> u32 {
    3
}
fn default_order_max_attempts() -> u32 {
    2 // stale retries on orders are unsafe
}
fn default_backoff_base_ms() -> u64 {
    500
}
fn default_backoff_max_ms() -> u64 {
    8000
}
