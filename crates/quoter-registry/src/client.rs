//! HTTP client for the exchange info endpoint.
//!
//! Read-only queries: instrument universe, L2 book, candles, resting orders
//! and account value. Every call is a single POST with a `type`-tagged JSON
//! body.

use std::time::Duration;

use quoter_core::{AssetMetadata, BookLevel, Candle, OpenOrder, OrderBook, OrderSide, Price, Size};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{RegistryError, RegistryResult};

/// Default timeout for API requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Request body for the info endpoint.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum InfoRequest<'a> {
    Meta,
    L2Book {
        coin: &'a str,
    },
    CandleSnapshot {
        req: CandleRequest<'a>,
    },
    ClearinghouseState {
        user: &'a str,
    },
    OpenOrders {
        user: &'a str,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CandleRequest<'a> {
    coin: &'a str,
    interval: &'a str,
    start_time: i64,
    end_time: i64,
}

#[derive(Debug, Deserialize)]
struct RawMeta {
    universe: Vec<RawAsset>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAsset {
    name: String,
    sz_decimals: u8,
    #[serde(default = "default_max_leverage")]
    max_leverage: u32,
    /// Present on some deployments; overrides the band rule.
    #[serde(default)]
    tick_size: Option<Decimal>,
    #[serde(default)]
    is_delisted: bool,
}

fn default_max_leverage() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
struct RawBook {
    levels: (Vec<RawLevel>, Vec<RawLevel>),
}

#[derive(Debug, Deserialize)]
struct RawLevel {
    px: Decimal,
    sz: Decimal,
}

#[derive(Debug, Deserialize)]
struct RawCandle {
    t: i64,
    o: Decimal,
    h: Decimal,
    l: Decimal,
    c: Decimal,
    v: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawClearinghouseState {
    margin_summary: RawMarginSummary,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMarginSummary {
    account_value: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawOpenOrder {
    coin: String,
    side: String,
    limit_px: Decimal,
    sz: Decimal,
    oid: u64,
    timestamp: i64,
}

/// Candle interval length in milliseconds ("1m", "15m", "4h", "1d", ...).
pub fn interval_ms(interval: &str) -> RegistryResult<i64> {
    let split = interval
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| RegistryError::ParseError(format!("invalid interval: {interval}")))?;
    let (count, unit) = interval.split_at(split);
    let count: i64 = count
        .parse()
        .map_err(|_| RegistryError::ParseError(format!("invalid interval: {interval}")))?;
    let unit_ms = match unit {
        "m" => 60_000,
        "h" => 3_600_000,
        "d" => 86_400_000,
        "w" => 604_800_000,
        _ => return Err(RegistryError::ParseError(format!("invalid interval: {interval}"))),
    };
    Ok(count * unit_ms)
}

/// Client for the exchange info endpoint.
pub struct MetaClient {
    client: Client,
    info_url: String,
}

impl MetaClient {
    /// Create a new meta client.
    ///
    /// # Arguments
    /// * `info_url` - URL of the info endpoint (e.g., "https://api.hyperliquid.xyz/info")
    pub fn new(info_url: impl Into<String>) -> RegistryResult<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| RegistryError::HttpClient(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            info_url: info_url.into(),
        })
    }

    pub fn info_url(&self) -> &str {
        &self.info_url
    }

    async fn post<T: DeserializeOwned>(&self, request: &InfoRequest<'_>) -> RegistryResult<T> {
        let response = self
            .client
            .post(&self.info_url)
            .json(request)
            .send()
            .await
            .map_err(|e| RegistryError::HttpClient(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RegistryError::HttpClient(format!("HTTP {status}: {body}")));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| RegistryError::HttpClient(format!("Failed to read response: {e}")))?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Fetch metadata for every listed instrument.
    ///
    /// The universe index becomes the asset id. Delisted instruments keep
    /// their index slot but are not returned.
    pub async fn fetch_universe(&self) -> RegistryResult<Vec<AssetMetadata>> {
        info!(url = %self.info_url, "Fetching instrument universe");
        let raw: RawMeta = self.post(&InfoRequest::Meta).await?;
        let universe = universe_from_raw(raw)?;
        info!(assets = universe.len(), "Fetched instrument universe");
        Ok(universe)
    }

    /// Fetch the L2 book for one coin.
    pub async fn fetch_l2_book(&self, coin: &str) -> RegistryResult<OrderBook> {
        let raw: RawBook = self.post(&InfoRequest::L2Book { coin }).await?;
        let book = book_from_raw(raw);
        debug!(
            %coin,
            bids = book.bids.len(),
            asks = book.asks.len(),
            "Fetched L2 book"
        );
        Ok(book)
    }

    /// Fetch the most recent `count` candles of `interval`, oldest first.
    pub async fn fetch_candles(
        &self,
        coin: &str,
        interval: &str,
        count: usize,
    ) -> RegistryResult<Vec<Candle>> {
        let end_time = chrono::Utc::now().timestamp_millis();
        let start_time = end_time - interval_ms(interval)? * count as i64;
        let request = InfoRequest::CandleSnapshot {
            req: CandleRequest {
                coin,
                interval,
                start_time,
                end_time,
            },
        };
        let raw: Vec<RawCandle> = self.post(&request).await?;
        let mut candles: Vec<Candle> = raw.into_iter().map(candle_from_raw).collect();
        candles.sort_by_key(|c| c.open_time_ms);
        if candles.len() > count {
            candles.drain(..candles.len() - count);
        }
        debug!(%coin, %interval, candles = candles.len(), "Fetched candles");
        Ok(candles)
    }

    /// Fetch the account value (`marginSummary.accountValue`) for a user.
    pub async fn fetch_account_value(&self, user: &str) -> RegistryResult<Decimal> {
        let raw: RawClearinghouseState =
            self.post(&InfoRequest::ClearinghouseState { user }).await?;
        Ok(raw.margin_summary.account_value)
    }

    /// Fetch a user's resting orders, optionally filtered to one coin.
    pub async fn fetch_open_orders(
        &self,
        user: &str,
        coin: Option<&str>,
    ) -> RegistryResult<Vec<OpenOrder>> {
        let raw: Vec<RawOpenOrder> = self.post(&InfoRequest::OpenOrders { user }).await?;
        let orders = raw
            .into_iter()
            .filter(|o| coin.map_or(true, |c| o.coin == c))
            .filter_map(|o| match open_order_from_raw(o) {
                Ok(order) => Some(order),
                Err(e) => {
                    warn!(error = %e, "Skipping unparseable open order");
                    None
                }
            })
            .collect();
        Ok(orders)
    }
}

fn universe_from_raw(raw: RawMeta) -> RegistryResult<Vec<AssetMetadata>> {
    if raw.universe.is_empty() {
        return Err(RegistryError::EmptyUniverse);
    }
    Ok(raw
        .universe
        .into_iter()
        .enumerate()
        .filter(|(_, a)| !a.is_delisted)
        .map(|(idx, a)| {
            AssetMetadata::from_exchange(
                a.name,
                Some(idx as u32),
                a.sz_decimals,
                a.max_leverage,
                a.tick_size,
            )
        })
        .collect())
}

fn book_from_raw(raw: RawBook) -> OrderBook {
    let convert = |levels: Vec<RawLevel>| {
        levels
            .into_iter()
            .map(|l| BookLevel::new(Price::new(l.px), Size::new(l.sz)))
            .collect()
    };
    let (bids, asks) = raw.levels;
    OrderBook::new(convert(bids), convert(asks))
}

fn candle_from_raw(raw: RawCandle) -> Candle {
    Candle {
        open_time_ms: raw.t,
        open: raw.o,
        high: raw.h,
        low: raw.l,
        close: raw.c,
        volume: raw.v,
    }
}

fn open_order_from_raw(raw: RawOpenOrder) -> RegistryResult<OpenOrder> {
    let side: OrderSide = raw
        .side
        .parse()
        .map_err(|e| RegistryError::ParseError(format!("order {}: {e}", raw.oid)))?;
    Ok(OpenOrder {
        oid: raw.oid,
        symbol: raw.coin,
        side,
        price: Price::new(raw.limit_px),
        size: Size::new(raw.sz),
        timestamp_ms: raw.timestamp,
    })
}
