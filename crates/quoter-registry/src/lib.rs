//! Asset metadata management.
//!
//! Holds per-symbol quantization metadata (tick size, step size, decimal
//! precision) refreshed from the exchange instrument universe on a TTL, and
//! a read-only HTTP client for the exchange info endpoint.

pub mod client;
pub mod error;
pub mod metadata_cache;

pub use client::{interval_ms, MetaClient};
pub use error::{RegistryError, RegistryResult};
pub use metadata_cache::{AssetMetadataCache, DEFAULT_METADATA_TTL};
