//! Request scheduling for exchange calls.
//!
//! Every exchange call goes through one of two independent FIFO lanes:
//!
//! - **general**: market data and metadata, throttled by a sliding rate
//!   window plus a fixed post-dispatch delay
//! - **order**: submissions and cancels, with a strict minimum spacing
//!   between dispatches and a reduced retry budget
//!
//! Each lane has exactly one request in flight at a time.

pub mod backoff;
pub mod config;
pub mod error;
pub mod rate_window;
pub mod scheduler;

pub use backoff::Backoff;
pub use config::SchedulerConfig;
pub use error::{SchedulerError, SchedulerResult};
pub use rate_window::RateWindow;
pub use scheduler::{Lane, RequestScheduler, SchedulerStats};
