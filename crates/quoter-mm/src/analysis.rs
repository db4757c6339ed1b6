//! Technical analysis collaborator.
//!
//! The engine consumes indicators through [`TechnicalAnalyzer`]. The default
//! [`BasicAnalyzer`] computes EMA, SMA, RSI, Bollinger width and return
//! volatility from closes in `f64`; results cross back into `Decimal` only
//! where they feed the ladder.

use parking_lot::Mutex;
use quoter_core::{Candle, Price};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const DEFAULT_EMA_PERIOD: usize = 20;
pub const DEFAULT_RSI_PERIOD: usize = 14;

/// Relative distance of price from EMA treated as a directional signal.
const DIVERGENCE_THRESHOLD: f64 = 0.001;
/// RSI above/below these levels confirms momentum.
const RSI_BULLISH: f64 = 55.0;
const RSI_BEARISH: f64 = 45.0;

/// Directional bias of a market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Bullish,
    Bearish,
    Neutral,
}

impl Sentiment {
    /// Spread multiplier: tighter when bullish, wider when bearish.
    pub fn spread_multiplier(&self) -> Decimal {
        match self {
            Self::Bullish => Decimal::new(9, 1),
            Self::Bearish => Decimal::new(11, 1),
            Self::Neutral => Decimal::ONE,
        }
    }

    /// A full reversal, bullish to bearish or back. Passing through neutral
    /// does not count.
    pub fn is_reversal_of(&self, previous: Sentiment) -> bool {
        matches!(
            (previous, self),
            (Self::Bullish, Self::Bearish) | (Self::Bearish, Self::Bullish)
        )
    }
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bullish => write!(f, "bullish"),
            Self::Bearish => write!(f, "bearish"),
            Self::Neutral => write!(f, "neutral"),
        }
    }
}

/// Indicator values for one analysis pass.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub ema: f64,
    pub sma: f64,
    pub rsi: f64,
}

/// Snapshot of a market, recomputed each analysis cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketCondition {
    pub sentiment: Sentiment,
    /// Standard deviation of close-to-close returns (fraction).
    pub volatility: Decimal,
    /// Bollinger band width in percent of the middle band.
    pub bollinger_width: Decimal,
    pub signals: IndicatorSnapshot,
}

impl MarketCondition {
    /// Calm, directionless market.
    pub fn neutral() -> Self {
        Self {
            sentiment: Sentiment::Neutral,
            volatility: Decimal::ZERO,
            bollinger_width: Decimal::ZERO,
            signals: IndicatorSnapshot::default(),
        }
    }
}

/// Indicator source consumed by the engine.
pub trait TechnicalAnalyzer: Send + Sync {
    fn analyze_candles(&self, candles: &[Candle]) -> IndicatorSnapshot;

    /// Derive a market condition from candles, the current price and the
    /// rolling EMA history (oldest first).
    fn analyze_market_conditions(
        &self,
        candles: &[Candle],
        price: Price,
        ema_history: &[f64],
    ) -> MarketCondition;
}

/// Default analyzer over candle closes.
#[derive(Debug, Clone)]
pub struct BasicAnalyzer {
    ema_period: usize,
    rsi_period: usize,
    bollinger_period: usize,
    bollinger_std_dev: f64,
}

impl BasicAnalyzer {
    pub fn new(bollinger_period: usize, bollinger_std_dev: f64) -> Self {
        Self {
            ema_period: DEFAULT_EMA_PERIOD,
            rsi_period: DEFAULT_RSI_PERIOD,
            bollinger_period: bollinger_period.max(2),
            bollinger_std_dev,
        }
    }
}

impl Default for BasicAnalyzer {
    fn default() -> Self {
        Self::new(20, 2.0)
    }
}

impl TechnicalAnalyzer for BasicAnalyzer {
    fn analyze_candles(&self, candles: &[Candle]) -> IndicatorSnapshot {
        let closes = closes(candles);
        IndicatorSnapshot {
            ema: ema(&closes, self.ema_period),
            sma: sma(&closes, self.ema_period),
            rsi: rsi(&closes, self.rsi_period),
        }
    }

    fn analyze_market_conditions(
        &self,
        candles: &[Candle],
        price: Price,
        ema_history: &[f64],
    ) -> MarketCondition {
        let closes = closes(candles);
        let signals = self.analyze_candles(candles);
        let width = bollinger_width(&closes, self.bollinger_period, self.bollinger_std_dev);
        let vol = volatility(&closes, self.bollinger_period);

        MarketCondition {
            sentiment: derive_sentiment(price.to_f64(), &signals, ema_history),
            volatility: to_decimal(vol),
            bollinger_width: to_decimal(width),
            signals,
        }
    }
}

/// Score price-vs-EMA divergence, EMA slope and RSI momentum.
///
/// Two or more agreeing signals decide the direction; anything else is
/// neutral.
pub fn derive_sentiment(price: f64, signals: &IndicatorSnapshot, ema_history: &[f64]) -> Sentiment {
    let mut score = 0i32;

    if signals.ema > 0.0 {
        let divergence = (price - signals.ema) / signals.ema;
        if divergence > DIVERGENCE_THRESHOLD {
            score += 1;
        } else if divergence < -DIVERGENCE_THRESHOLD {
            score -= 1;
        }
    }

    if let (Some(first), Some(last)) = (ema_history.first(), ema_history.last()) {
        if ema_history.len() >= 2 {
            if last > first {
                score += 1;
            } else if last < first {
                score -= 1;
            }
        }
    }

    if signals.rsi > RSI_BULLISH {
        score += 1;
    } else if signals.rsi < RSI_BEARISH {
        score -= 1;
    }

    match score {
        s if s >= 2 => Sentiment::Bullish,
        s if s <= -2 => Sentiment::Bearish,
        _ => Sentiment::Neutral,
    }
}

fn closes(candles: &[Candle]) -> Vec<f64> {
    candles
        .iter()
        .filter_map(|c| c.close.to_f64())
        .collect()
}

/// Non-finite inputs collapse to zero.
fn to_decimal(value: f64) -> Decimal {
    if value.is_finite() {
        Decimal::from_f64(value).unwrap_or(Decimal::ZERO)
    } else {
        Decimal::ZERO
    }
}

/// Mean of the last `period` values.
pub fn sma(values: &[f64], period: usize) -> f64 {
    let window = tail(values, period);
    if window.is_empty() {
        return 0.0;
    }
    window.iter().sum::<f64>() / window.len() as f64
}

/// Exponential moving average seeded with the SMA of the first `period`
/// values. Shorter input falls back to its SMA.
pub fn ema(values: &[f64], period: usize) -> f64 {
    if period == 0 || values.len() < period {
        return sma(values, values.len());
    }
    let k = 2.0 / (period as f64 + 1.0);
    let seed = values[..period].iter().sum::<f64>() / period as f64;
    values[period..]
        .iter()
        .fold(seed, |prev, v| v * k + prev * (1.0 - k))
}

/// Wilder's RSI. 50 when there is not enough data.
pub fn rsi(values: &[f64], period: usize) -> f64 {
    if period == 0 || values.len() <= period {
        return 50.0;
    }

    let deltas: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();
    let (mut avg_gain, mut avg_loss) = deltas[..period].iter().fold((0.0, 0.0), |(g, l), d| {
        if *d > 0.0 {
            (g + d, l)
        } else {
            (g, l - d)
        }
    });
    avg_gain /= period as f64;
    avg_loss /= period as f64;

    let n = period as f64;
    for d in &deltas[period..] {
        let (gain, loss) = if *d > 0.0 { (*d, 0.0) } else { (0.0, -d) };
        avg_gain = (avg_gain * (n - 1.0) + gain) / n;
        avg_loss = (avg_loss * (n - 1.0) + loss) / n;
    }

    if avg_loss == 0.0 {
        return if avg_gain == 0.0 { 50.0 } else { 100.0 };
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}

/// `(upper - lower) / middle * 100` over the last `period` closes.
pub fn bollinger_width(values: &[f64], period: usize, std_devs: f64) -> f64 {
    let window = tail(values, period);
    if window.len() < 2 {
        return 0.0;
    }
    let middle = mean(window);
    if middle <= 0.0 {
        return 0.0;
    }
    let sd = std_dev(window, middle);
    (2.0 * std_devs * sd) / middle * 100.0
}

/// Population standard deviation of simple returns over the last `period`
/// closes.
pub fn volatility(values: &[f64], period: usize) -> f64 {
    let window = tail(values, period + 1);
    let returns: Vec<f64> = window
        .windows(2)
        .filter(|w| w[0] > 0.0)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect();
    if returns.len() < 2 {
        return 0.0;
    }
    std_dev(&returns, mean(&returns))
}

fn tail(values: &[f64], n: usize) -> &[f64] {
    &values[values.len().saturating_sub(n)..]
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn std_dev(values: &[f64], mean: f64) -> f64 {
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

/// Analyzer returning a scripted condition. For tests and dry runs.
#[derive(Debug)]
pub struct StaticAnalyzer {
    condition: Mutex<MarketCondition>,
}

impl StaticAnalyzer {
    pub fn new(condition: MarketCondition) -> Self {
        Self {
            condition: Mutex::new(condition),
        }
    }

    pub fn with_sentiment(sentiment: Sentiment) -> Self {
        Self::new(MarketCondition {
            sentiment,
            ..MarketCondition::neutral()
        })
    }

    pub fn set_condition(&self, condition: MarketCondition) {
        *self.condition.lock() = condition;
    }

    pub fn set_sentiment(&self, sentiment: Sentiment) {
        self.condition.lock().sentiment = sentiment;
    }
}

impl TechnicalAnalyzer for StaticAnalyzer {
    fn analyze_candles(&self, _candles: &[Candle]) -> IndicatorSnapshot {
        self.condition.lock().signals
    }

    fn analyze_market_conditions(
        &self,
        _candles: &[Candle],
        _price: Price,
        _ema_history: &[f64],
    ) -> MarketCondition {
        self.condition.lock().clone()
    }
}
