//! Spread and quote ladder construction.
//!
//! Pure functions of mid price, market condition and configuration. Every
//! generated level lies within `mid * (1 ± max_spread * (1 + volatility))`.

use quoter_core::{AssetMetadata, OrderSide, Price, Size};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::analysis::{MarketCondition, Sentiment};
use crate::config::MakerConfig;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Price band a ladder must stay inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LadderBounds {
    pub lower: Price,
    pub upper: Price,
}

impl LadderBounds {
    /// `mid * (1 ± max_spread * (1 + volatility))`; negative volatility
    /// counts as zero.
    pub fn around(mid: Price, max_spread: Decimal, volatility: Decimal) -> Self {
        let width = max_spread * (Decimal::ONE + volatility.max(Decimal::ZERO));
        Self {
            lower: Price::new(mid.inner() * (Decimal::ONE - width)),
            upper: Price::new(mid.inner() * (Decimal::ONE + width)),
        }
    }

    pub fn contains(&self, price: Price) -> bool {
        price >= self.lower && price <= self.upper
    }
}

/// One target order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuoteLevel {
    pub side: OrderSide,
    /// 0 is closest to mid.
    pub index: u32,
    pub price: Price,
    pub size: Size,
}

/// Target buy and sell levels for one symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuoteLadder {
    pub mid: Price,
    pub spread: Decimal,
    pub bounds: LadderBounds,
    pub buy_levels: Vec<QuoteLevel>,
    pub sell_levels: Vec<QuoteLevel>,
}

impl QuoteLadder {
    pub fn levels(&self, side: OrderSide) -> &[QuoteLevel] {
        match side {
            OrderSide::Buy => &self.buy_levels,
            OrderSide::Sell => &self.sell_levels,
        }
    }

    pub fn len(&self) -> usize {
        self.buy_levels.len() + self.sell_levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buy_levels.is_empty() && self.sell_levels.is_empty()
    }
}

/// Midpoint of the configured band scaled by volatility, Bollinger width and
/// sentiment, clamped to `[min_spread, max_spread]`.
pub fn dynamic_spread(config: &MakerConfig, condition: &MarketCondition) -> Decimal {
    let base = (config.min_spread + config.max_spread) / Decimal::TWO;
    let scaled = base
        * (Decimal::ONE + condition.volatility.max(Decimal::ZERO))
        * (Decimal::ONE + condition.bollinger_width / HUNDRED)
        * condition.sentiment.spread_multiplier();
    scaled.max(config.min_spread).min(config.max_spread)
}

/// Base order size in asset units: `balance * risk% / mid`.
pub fn base_order_size(balance: Decimal, risk_percentage: Decimal, mid: Price) -> Decimal {
    if !mid.is_positive() || balance <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    balance * risk_percentage / HUNDRED / mid.inner()
}

/// Lean size toward the sentiment and shrink it as volatility rises.
fn size_multiplier(condition: &MarketCondition, side: OrderSide) -> Decimal {
    let lean = match (condition.sentiment, side) {
        (Sentiment::Bullish, OrderSide::Buy) | (Sentiment::Bearish, OrderSide::Sell) => {
            Decimal::new(12, 1)
        }
        (Sentiment::Bullish, OrderSide::Sell) | (Sentiment::Bearish, OrderSide::Buy) => {
            Decimal::new(8, 1)
        }
        (Sentiment::Neutral, _) => Decimal::ONE,
    };
    lean / (Decimal::ONE + condition.volatility.max(Decimal::ZERO))
}

/// Align a level to the tick, preferring the direction toward mid and never
/// crossing it.
fn snap_toward_mid(raw: Decimal, mid: Price, tick: Price, side: OrderSide) -> Price {
    let tick = tick.inner();
    if tick <= Decimal::ZERO {
        return Price::new(raw);
    }
    let ticks = raw / tick;
    let (inward, outward) = match side {
        OrderSide::Buy => (ticks.ceil() * tick, ticks.floor() * tick),
        OrderSide::Sell => (ticks.floor() * tick, ticks.ceil() * tick),
    };
    let crosses = match side {
        OrderSide::Buy => inward > mid.inner(),
        OrderSide::Sell => inward < mid.inner(),
    };
    Price::new(if crosses { outward } else { inward })
}

/// Build the target ladder.
///
/// Level `i` sits at `spread / 2 + i * order_spacing` from mid, capped at
/// the ladder bound. Levels that collapse onto the same tick are emitted
/// once; levels that rounding pushes out of bounds are dropped.
pub fn build_ladder(
    mid: Price,
    spread: Decimal,
    condition: &MarketCondition,
    balance: Decimal,
    meta: &AssetMetadata,
    config: &MakerConfig,
) -> QuoteLadder {
    let volatility = condition.volatility.max(Decimal::ZERO);
    let bounds = LadderBounds::around(mid, config.max_spread, volatility);
    let max_offset = config.max_spread * (Decimal::ONE + volatility);
    let half = spread / Decimal::TWO;
    let base_size = base_order_size(balance, config.risk_percentage, mid);

    let mut ladder = QuoteLadder {
        mid,
        spread,
        bounds,
        buy_levels: Vec::new(),
        sell_levels: Vec::new(),
    };

    for side in [OrderSide::Buy, OrderSide::Sell] {
        let multiplier = size_multiplier(condition, side);
        let mut levels: Vec<QuoteLevel> = Vec::with_capacity(config.order_levels as usize);

        for index in 0..config.order_levels {
            let offset = (half + config.order_spacing * Decimal::from(index)).min(max_offset);
            let raw = match side {
                OrderSide::Buy => mid.inner() * (Decimal::ONE - offset),
                OrderSide::Sell => mid.inner() * (Decimal::ONE + offset),
            };
            let price = snap_toward_mid(raw, mid, meta.tick_size, side);
            if !price.is_positive() || !bounds.contains(price) {
                continue;
            }
            if levels.iter().any(|l| l.price == price) {
                continue;
            }

            let wanted = Size::new(base_size * multiplier).round_to_step(meta.step_size);
            let size = wanted.max(meta.min_order_size(price, config.min_order_notional));

            levels.push(QuoteLevel {
                side,
                index,
                price,
                size,
            });
        }

        match side {
            OrderSide::Buy => ladder.buy_levels = levels,
            OrderSide::Sell => ladder.sell_levels = levels,
        }
    }

    ladder
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::IndicatorSnapshot;
    use rust_decimal_macros::dec;

    fn condition(sentiment: Sentiment, volatility: Decimal, width: Decimal) -> MarketCondition {
        MarketCondition {
            sentiment,
            volatility,
            bollinger_width: width,
            signals: IndicatorSnapshot::default(),
        }
    }

    fn eth() -> AssetMetadata {
        AssetMetadata::from_exchange("ETH", Some(1), 4, 50, None)
    }

    #[test]
    fn test_spread_neutral_is_band_midpoint() {
        let config = MakerConfig::default();
        let c = condition(Sentiment::Neutral, dec!(0), dec!(0));
        assert_eq!(dynamic_spread(&config, &c), dec!(0.0055));
    }

    #[test]
    fn test_spread_sentiment_multiplier() {
        let config = MakerConfig::default();
        let bull = condition(Sentiment::Bullish, dec!(0), dec!(0));
        let bear = condition(Sentiment::Bearish, dec!(0), dec!(0));
        assert_eq!(dynamic_spread(&config, &bull), dec!(0.00495));
        assert_eq!(dynamic_spread(&config, &bear), dec!(0.00605));
    }

    #[test]
    fn test_spread_scaled_by_volatility_and_width() {
        let config = MakerConfig::default();
        // 0.0055 * 1.1 * 1.2 = 0.00726
        let c = condition(Sentiment::Neutral, dec!(0.1), dec!(20));
        assert_eq!(dynamic_spread(&config, &c), dec!(0.00726));
    }

    #[test]
    fn test_spread_clamped() {
        let config = MakerConfig::default();
        let wild = condition(Sentiment::Bearish, dec!(2), dec!(50));
        assert_eq!(dynamic_spread(&config, &wild), config.max_spread);

        let narrow = MakerConfig {
            min_spread: dec!(0.009),
            ..MakerConfig::default()
        };
        let bull = condition(Sentiment::Bullish, dec!(0), dec!(0));
        // (0.009 + 0.01) / 2 * 0.9 = 0.00855 < min
        assert_eq!(dynamic_spread(&narrow, &bull), dec!(0.009));
    }

    #[test]
    fn test_base_order_size() {
        assert_eq!(base_order_size(dec!(10000), dec!(1), Price::new(dec!(100))), dec!(1));
        assert_eq!(base_order_size(dec!(0), dec!(1), Price::new(dec!(100))), dec!(0));
        assert_eq!(base_order_size(dec!(100), dec!(1), Price::ZERO), dec!(0));
    }

    #[test]
    fn test_ladder_prices_and_sizes() {
        let config = MakerConfig::default();
        let c = condition(Sentiment::Neutral, dec!(0), dec!(0));
        let mid = Price::new(dec!(3000.5));
        let ladder = build_ladder(mid, dec!(0.0055), &c, dec!(10000), &eth(), &config);

        assert_eq!(ladder.buy_levels.len(), 3);
        assert_eq!(ladder.sell_levels.len(), 3);

        // 3000.5 * (1 - 0.00275) = 2992.248625 -> ceil to tick
        assert_eq!(ladder.buy_levels[0].price, Price::new(dec!(2992.25)));
        // 3000.5 * (1 + 0.00275) = 3008.751375 -> floor to tick
        assert_eq!(ladder.sell_levels[0].price, Price::new(dec!(3008.75)));

        // 100 USD / 3000.5 = 0.03332... -> 0.0333
        assert_eq!(ladder.buy_levels[0].size, Size::new(dec!(0.0333)));

        let buys: Vec<Price> = ladder.buy_levels.iter().map(|l| l.price).collect();
        assert!(buys.windows(2).all(|w| w[0] > w[1]));
        let sells: Vec<Price> = ladder.sell_levels.iter().map(|l| l.price).collect();
        assert!(sells.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_ladder_sizes_lean_with_sentiment() {
        let config = MakerConfig::default();
        let c = condition(Sentiment::Bullish, dec!(0), dec!(0));
        let ladder = build_ladder(
            Price::new(dec!(100)),
            dec!(0.005),
            &c,
            dec!(10000),
            &eth(),
            &config,
        );
        assert_eq!(ladder.buy_levels[0].size, Size::new(dec!(1.2)));
        assert_eq!(ladder.sell_levels[0].size, Size::new(dec!(0.8)));
    }

    #[test]
    fn test_ladder_size_floored_at_minimum() {
        let config = MakerConfig::default();
        let c = condition(Sentiment::Neutral, dec!(0), dec!(0));
        let ladder = build_ladder(
            Price::new(dec!(2000)),
            dec!(0.005),
            &c,
            dec!(0),
            &eth(),
            &config,
        );
        // 10 USD / ~1995 -> 0.0051 after rounding up to the step
        for level in ladder.buy_levels.iter().chain(ladder.sell_levels.iter()) {
            assert!(level.size.notional(level.price) >= dec!(10));
        }
    }

    #[test]
    fn test_ladder_levels_within_bounds() {
        let metas = [
            eth(),
            AssetMetadata::from_exchange("BTC", Some(0), 5, 50, None),
            AssetMetadata::from_exchange("DOGE", Some(2), 0, 10, None),
            AssetMetadata::fallback("XYZ"),
        ];
        let mids = [dec!(0.5), dec!(0.12345), dec!(17.3), dec!(3000.5), dec!(94028.1)];
        let vols = [dec!(0), dec!(0.01), dec!(0.3)];
        let spreads = [dec!(0.001), dec!(0.0055), dec!(0.01)];
        let config = MakerConfig {
            order_levels: 12,
            order_spacing: dec!(0.002),
            ..MakerConfig::default()
        };

        for meta in &metas {
            for mid in mids {
                for vol in vols {
                    for spread in spreads {
                        let c = condition(Sentiment::Neutral, vol, dec!(5));
                        let mid = Price::new(mid);
                        let ladder = build_ladder(mid, spread, &c, dec!(5000), meta, &config);
                        let bounds = LadderBounds::around(mid, config.max_spread, vol);
                        for level in &ladder.buy_levels {
                            assert!(bounds.contains(level.price), "{level:?} outside {bounds:?}");
                            assert!(level.price <= mid);
                        }
                        for level in &ladder.sell_levels {
                            assert!(bounds.contains(level.price), "{level:?} outside {bounds:?}");
                            assert!(level.price >= mid);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_levels_capped_at_bound() {
        let config = MakerConfig {
            order_levels: 20,
            order_spacing: dec!(0.01),
            ..MakerConfig::default()
        };
        let c = condition(Sentiment::Neutral, dec!(0), dec!(0));
        let ladder = build_ladder(
            Price::new(dec!(1000)),
            dec!(0.005),
            &c,
            dec!(10000),
            &eth(),
            &config,
        );
        // Outer levels collapse onto the 1% bound and are emitted once.
        assert_eq!(ladder.buy_levels.len(), 2);
        assert_eq!(ladder.buy_levels[1].price, Price::new(dec!(990)));
        assert_eq!(ladder.sell_levels[1].price, Price::new(dec!(1010)));
    }

    #[test]
    fn test_bounds_ignore_negative_volatility() {
        let mid = Price::new(dec!(1000));
        let bounds = LadderBounds::around(mid, dec!(0.01), dec!(-0.8));
        assert_eq!(bounds, LadderBounds::around(mid, dec!(0.01), dec!(0)));
        assert!(bounds.contains(Price::new(dec!(995))));
    }
}
