//! Asset metadata cache.
//!
//! A total map from symbol to [`AssetMetadata`]: symbols present in the last
//! instrument universe resolve from the cache, a handful of well-known
//! symbols resolve from a built-in table, and anything else gets the generic
//! 0.01 tick / 0.01 step fallback.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use quoter_core::{AssetMetadata, ExchangeResult, Price, Size};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{RegistryError, RegistryResult};

/// Default time-to-live for a fetched universe.
pub const DEFAULT_METADATA_TTL: Duration = Duration::from_secs(300);

/// Well-known defaults used before the first refresh (or for symbols the
/// exchange omitted): `(symbol, sz_decimals, max_leverage)`.
const WELL_KNOWN: &[(&str, u8, u32)] = &[
    ("BTC", 5, 50),
    ("ETH", 4, 50),
    ("SOL", 2, 20),
    ("AVAX", 2, 10),
    ("ARB", 1, 10),
    ("HYPE", 2, 10),
    ("DOGE", 0, 10),
];

/// Per-symbol quantization metadata with TTL refresh.
pub struct AssetMetadataCache {
    /// Metadata from the last successful refresh, keyed by symbol.
    entries: RwLock<HashMap<String, AssetMetadata>>,
    /// Built-in table for well-known symbols.
    fallbacks: HashMap<String, AssetMetadata>,
    /// Time of the last successful refresh.
    last_refresh: Mutex<Option<Instant>>,
    /// Serializes concurrent refresh attempts.
    refresh_lock: tokio::sync::Mutex<()>,
    ttl: Duration,
}

impl AssetMetadataCache {
    /// Create an empty cache with the given TTL.
    pub fn new(ttl: Duration) -> Self {
        let fallbacks = WELL_KNOWN
            .iter()
            .map(|&(symbol, sz, lev)| {
                (
                    symbol.to_string(),
                    AssetMetadata::from_exchange(symbol, None, sz, lev, None),
                )
            })
            .collect();

        Self {
            entries: RwLock::new(HashMap::new()),
            fallbacks,
            last_refresh: Mutex::new(None),
            refresh_lock: tokio::sync::Mutex::new(()),
            ttl,
        }
    }

    /// Metadata for `symbol`. Never fails.
    pub fn get(&self, symbol: &str) -> AssetMetadata {
        if let Some(meta) = self.entries.read().get(symbol) {
            return meta.clone();
        }
        if let Some(meta) = self.fallbacks.get(symbol) {
            return meta.clone();
        }
        AssetMetadata::fallback(symbol)
    }

    /// Metadata from the last refresh only (no fallbacks).
    pub fn lookup(&self, symbol: &str) -> Option<AssetMetadata> {
        self.entries.read().get(symbol).cloned()
    }

    pub fn get_tick_size(&self, symbol: &str) -> Price {
        self.get(symbol).tick_size
    }

    pub fn get_step_size(&self, symbol: &str) -> Size {
        self.get(symbol).step_size
    }

    /// Decimal places for rendering a price (`is_size = false`) or a size.
    pub fn get_decimal_places(&self, symbol: &str, is_size: bool) -> u8 {
        self.get(symbol).decimal_places(is_size)
    }

    /// Exchange asset index, known only after a refresh.
    pub fn asset_id(&self, symbol: &str) -> Option<u32> {
        self.entries.read().get(symbol).and_then(|m| m.asset_id)
    }

    /// Whether the TTL has elapsed since the last successful refresh.
    pub fn is_stale(&self) -> bool {
        match *self.last_refresh.lock() {
            Some(at) => at.elapsed() >= self.ttl,
            None => true,
        }
    }

    /// Refresh from the exchange unless the TTL has not elapsed.
    ///
    /// `fetch` is only invoked when a refresh is due. Returns `true` if the
    /// cache was replaced. On failure the previous contents stay in place.
    pub async fn refresh<F, Fut>(&self, fetch: F) -> RegistryResult<bool>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ExchangeResult<Vec<AssetMetadata>>>,
    {
        let _guard = self.refresh_lock.lock().await;

        if !self.is_stale() {
            debug!("Metadata cache fresh, skipping refresh");
            return Ok(false);
        }

        let universe = fetch().await.map_err(|e| {
            warn!(error = %e, "Metadata refresh failed, keeping previous cache");
            RegistryError::Fetch(e)
        })?;

        self.replace(universe)?;
        Ok(true)
    }

    /// Replace the whole cache with a new universe.
    pub fn replace(&self, universe: Vec<AssetMetadata>) -> RegistryResult<()> {
        if universe.is_empty() {
            return Err(RegistryError::EmptyUniverse);
        }

        let mut next = HashMap::with_capacity(universe.len());
        for meta in universe {
            next.insert(meta.symbol.clone(), meta);
        }

        {
            let mut entries = self.entries.write();
            for (symbol, old) in entries.iter() {
                if let Some(new) = next.get(symbol) {
                    if old.tick_size != new.tick_size || old.step_size != new.step_size {
                        warn!(
                            %symbol,
                            old_tick = %old.tick_size,
                            new_tick = %new.tick_size,
                            old_step = %old.step_size,
                            new_step = %new.step_size,
                            "Quantization metadata changed"
                        );
                    }
                }
            }
            entries.clear();
            entries.extend(next);
        }

        *self.last_refresh.lock() = Some(Instant::now());
        info!(symbols = self.len(), "Asset metadata refreshed");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Symbols from the last refresh.
    pub fn symbols(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }
}

impl Default for AssetMetadataCache {
    fn default() -> Self {
        Self::new(DEFAULT_METADATA_TTL)
    }
}
