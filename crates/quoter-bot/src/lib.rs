//! Market making quoter.
//!
//! Wires the components together:
//! - Asset metadata cache and info endpoint client
//! - Request scheduler (general and order lanes)
//! - Order executor
//! - Market making engine
//! - Paper exchange adapter

pub mod app;
pub mod config;
pub mod error;
pub mod paper;

pub use app::Application;
pub use config::{AppConfig, OperatingMode};
pub use error::{AppError, AppResult};
pub use paper::PaperExchange;
