//! Prometheus metrics for the quoter.
//!
//! Covers:
//! - Request lanes (dispatches, retries, rate-window waits, queue depth)
//! - Order flow (placements, rejections by category, corrective resubmits,
//!   cancels)
//! - Quoting engine (cycle errors, ladder levels, current spread)
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. A registration failure
//! means duplicate metric names, which should crash at startup. These panics
//! only occur during static initialization, never at runtime.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge_vec, register_histogram_vec, register_int_counter,
    register_int_gauge_vec, CounterVec, Encoder, GaugeVec, HistogramVec, IntCounter, IntGaugeVec,
    TextEncoder,
};

use crate::error::{TelemetryError, TelemetryResult};

/// Requests dispatched to the exchange, per lane (attempts, not callers).
pub static REQUESTS_DISPATCHED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "quoter_requests_dispatched_total",
        "Total exchange requests dispatched",
        &["lane"]
    )
    .unwrap()
});

/// Retries after a retryable failure, per lane.
pub static REQUEST_RETRIES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "quoter_request_retries_total",
        "Total exchange request retries",
        &["lane"]
    )
    .unwrap()
});

/// Requests that failed after exhausting their retry budget, per lane.
pub static REQUEST_FAILURES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "quoter_request_failures_total",
        "Total exchange requests that failed",
        &["lane"]
    )
    .unwrap()
});

/// Times the general lane paused for the rate window.
pub static RATE_WINDOW_WAITS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "quoter_rate_window_waits_total",
        "Total waits on the general lane rate window"
    )
    .unwrap()
});

/// Pending items per lane.
pub static QUEUE_DEPTH: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!("quoter_queue_depth", "Pending requests per lane", &["lane"]).unwrap()
});

/// Time from enqueue to settlement in milliseconds.
pub static REQUEST_LATENCY_MS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "quoter_request_latency_ms",
        "Enqueue-to-settlement latency in milliseconds",
        &["lane"],
        vec![10.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0, 30000.0]
    )
    .unwrap()
});

/// Orders accepted by the exchange.
pub static ORDERS_PLACED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "quoter_orders_placed_total",
        "Total orders accepted by the exchange",
        &["symbol", "side"]
    )
    .unwrap()
});

/// Order placements that failed, by error category.
pub static ORDERS_REJECTED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "quoter_orders_rejected_total",
        "Total failed order placements",
        &["symbol", "kind"]
    )
    .unwrap()
});

/// Corrective resubmissions after a tick/size rejection.
pub static ORDER_CORRECTIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "quoter_order_corrections_total",
        "Total corrective order resubmissions",
        &["symbol", "field"]
    )
    .unwrap()
});

/// Cancel-all calls that succeeded.
pub static CANCELS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "quoter_cancels_total",
        "Total successful cancel-all calls",
        &["symbol"]
    )
    .unwrap()
});

/// Engine cycle errors.
pub static ENGINE_ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "quoter_engine_errors_total",
        "Total engine cycle errors",
        &["symbol", "stage"]
    )
    .unwrap()
});

/// Ladder levels placed by the engine.
pub static LADDER_LEVELS_PLACED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "quoter_ladder_levels_placed_total",
        "Total ladder levels placed",
        &["symbol", "side"]
    )
    .unwrap()
});

/// Current quoted spread in basis points.
pub static SPREAD_BPS: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "quoter_spread_bps",
        "Current quoted spread in basis points",
        &["symbol"]
    )
    .unwrap()
});

/// Metrics facade.
pub struct Metrics;

impl Metrics {
    // =========================================================================
    // Request lanes
    // =========================================================================

    pub fn request_dispatched(lane: &str) {
        REQUESTS_DISPATCHED_TOTAL.with_label_values(&[lane]).inc();
    }

    pub fn request_retried(lane: &str) {
        REQUEST_RETRIES_TOTAL.with_label_values(&[lane]).inc();
    }

    pub fn request_failed(lane: &str) {
        REQUEST_FAILURES_TOTAL.with_label_values(&[lane]).inc();
    }

    pub fn rate_window_wait() {
        RATE_WINDOW_WAITS_TOTAL.inc();
    }

    pub fn queue_depth(lane: &str, depth: usize) {
        QUEUE_DEPTH
            .with_label_values(&[lane])
            .set(i64::try_from(depth).unwrap_or(i64::MAX));
    }

    pub fn request_latency(lane: &str, latency_ms: f64) {
        REQUEST_LATENCY_MS
            .with_label_values(&[lane])
            .observe(latency_ms);
    }

    // =========================================================================
    // Order flow
    // =========================================================================

    pub fn order_placed(symbol: &str, side: &str) {
        ORDERS_PLACED_TOTAL.with_label_values(&[symbol, side]).inc();
    }

    /// Record a failed placement. `kind` is the stable error category.
    pub fn order_rejected(symbol: &str, kind: &str) {
        ORDERS_REJECTED_TOTAL
            .with_label_values(&[symbol, kind])
            .inc();
    }

    /// Record a corrective resubmission (`field` is "price" or "size").
    pub fn order_corrected(symbol: &str, field: &str) {
        ORDER_CORRECTIONS_TOTAL
            .with_label_values(&[symbol, field])
            .inc();
    }

    pub fn orders_cancelled(symbol: &str) {
        CANCELS_TOTAL.with_label_values(&[symbol]).inc();
    }

    // =========================================================================
    // Engine
    // =========================================================================

    pub fn engine_error(symbol: &str, stage: &str) {
        ENGINE_ERRORS_TOTAL
            .with_label_values(&[symbol, stage])
            .inc();
    }

    pub fn ladder_level_placed(symbol: &str, side: &str) {
        LADDER_LEVELS_PLACED_TOTAL
            .with_label_values(&[symbol, side])
            .inc();
    }

    /// Update quoted spread (fraction, e.g. 0.005 = 50 bps).
    pub fn spread(symbol: &str, spread: f64) {
        SPREAD_BPS.with_label_values(&[symbol]).set(spread * 10_000.0);
    }

    /// Render every registered metric in the Prometheus text format.
    pub fn encode_text() -> TelemetryResult<String> {
        let mut buf = Vec::new();
        TextEncoder::new()
            .encode(&prometheus::gather(), &mut buf)
            .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
        String::from_utf8(buf).map_err(|e| TelemetryError::Metrics(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lane_counters() {
        let before = REQUESTS_DISPATCHED_TOTAL
            .with_label_values(&["test_lane"])
            .get();
        Metrics::request_dispatched("test_lane");
        Metrics::request_dispatched("test_lane");
        let after = REQUESTS_DISPATCHED_TOTAL
            .with_label_values(&["test_lane"])
            .get();
        assert_eq!(after - before, 2.0);
    }

    #[test]
    fn test_spread_in_bps() {
        Metrics::spread("TEST", 0.005);
        let bps = SPREAD_BPS.with_label_values(&["TEST"]).get();
        assert!((bps - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_encode_text_contains_metric() {
        Metrics::order_rejected("TEST", "TICK_SIZE_ERROR");
        let text = Metrics::encode_text().unwrap();
        assert!(text.contains("quoter_orders_rejected_total"));
    }
}
