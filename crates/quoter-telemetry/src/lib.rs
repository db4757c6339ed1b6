//! Prometheus metrics and structured logging for the quoter.
//!
//! - Prometheus counters/gauges for the request lanes, order flow and the
//!   quoting engine
//! - Structured logging with tracing (JSON in production)

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::Metrics;
