//! Per-asset quantization metadata.
//!
//! Exchange metadata only guarantees `szDecimals`. Tick size is taken from
//! the exchange when present, otherwise derived from `szDecimals` with a
//! band rule that is wider than the true exchange minimum so that rounding
//! edge cases never produce rejected prices.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::{Price, Size};

/// Fallback tick size for symbols with no metadata at all.
pub const DEFAULT_TICK_SIZE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Fallback step size for symbols with no metadata at all.
pub const DEFAULT_STEP_SIZE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Quantization metadata for one tradable symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetMetadata {
    /// Symbol as the exchange names it (e.g. "BTC").
    pub symbol: String,
    /// Index in the exchange instrument universe (used for cancels).
    pub asset_id: Option<u32>,
    /// Size decimals (`szDecimals`).
    pub sz_decimals: u8,
    /// Minimum price increment.
    pub tick_size: Price,
    /// Minimum size increment: `10^-sz_decimals`.
    pub step_size: Size,
    pub max_leverage: u32,
    /// Decimal places used when rendering prices.
    pub price_decimals: u8,
    /// Keep at least one decimal digit in rendered prices.
    #[serde(default)]
    pub force_decimal: bool,
}

impl AssetMetadata {
    /// Build metadata from the exchange fields.
    ///
    /// An explicit `tick_size` wins over the band rule; decimals then follow
    /// the tick's scale.
    pub fn from_exchange(
        symbol: impl Into<String>,
        asset_id: Option<u32>,
        sz_decimals: u8,
        max_leverage: u32,
        tick_size: Option<Decimal>,
    ) -> Self {
        let (tick_size, price_decimals) = match tick_size {
            Some(ts) if ts > Decimal::ZERO => (Price::new(ts), ts.normalize().scale() as u8),
            _ => (
                Self::tick_size_for(sz_decimals),
                Self::decimal_places_for(sz_decimals),
            ),
        };

        Self {
            symbol: symbol.into(),
            asset_id,
            sz_decimals,
            tick_size,
            step_size: Self::step_size_for(sz_decimals),
            max_leverage,
            price_decimals,
            force_decimal: false,
        }
    }

    /// Metadata for a symbol nobody knows anything about.
    pub fn fallback(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            asset_id: None,
            sz_decimals: 2,
            tick_size: Price::new(DEFAULT_TICK_SIZE),
            step_size: Size::new(DEFAULT_STEP_SIZE),
            max_leverage: 1,
            price_decimals: 2,
            force_decimal: false,
        }
    }

    /// Tick-size band rule for when only `sz_decimals` is known.
    ///
    /// 5 -> 0.1, 4 -> 0.01, 0 -> 1, otherwise 0.01.
    pub fn tick_size_for(sz_decimals: u8) -> Price {
        let tick = match sz_decimals {
            5 => Decimal::new(1, 1),
            4 => Decimal::new(1, 2),
            0 => Decimal::ONE,
            _ => Decimal::new(1, 2),
        };
        Price::new(tick)
    }

    /// Price decimal places, mirroring the tick bands.
    pub fn decimal_places_for(sz_decimals: u8) -> u8 {
        match sz_decimals {
            5 => 1,
            4 => 2,
            0 => 0,
            _ => 2,
        }
    }

    /// Step size is always `10^-sz_decimals`.
    pub fn step_size_for(sz_decimals: u8) -> Size {
        Size::new(Decimal::new(1, u32::from(sz_decimals)))
    }

    /// Decimal places for rendering a price (`is_size = false`) or a size.
    pub fn decimal_places(&self, is_size: bool) -> u8 {
        if is_size {
            self.sz_decimals
        } else {
            self.price_decimals
        }
    }

    /// Round a price to the nearest tick.
    pub fn round_price(&self, price: Price) -> Price {
        price.round_to_tick(self.tick_size)
    }

    /// Round a size to the nearest step.
    pub fn round_size(&self, size: Size) -> Size {
        size.round_to_step(self.step_size)
    }

    /// Round to tick, then render with `price_decimals` places.
    ///
    /// Trailing zeros are stripped ("94028.0" -> "94028") unless the asset
    /// sets `force_decimal`.
    pub fn format_price(&self, price: Price) -> String {
        let rounded = self.round_price(price).inner();
        render(rounded, self.price_decimals, self.force_decimal)
    }

    /// Round to step, then render with `sz_decimals` places.
    pub fn format_size(&self, size: Size) -> String {
        let rounded = self.round_size(size).inner();
        render(rounded, self.sz_decimals, false)
    }

    /// Smallest size the exchange accepts at `price` given a notional floor.
    pub fn min_order_size(&self, price: Price, min_notional: Decimal) -> Size {
        if !price.is_positive() {
            return self.step_size;
        }
        let by_notional = Size::new(min_notional / price.inner()).ceil_to_step(self.step_size);
        by_notional.max(self.step_size)
    }
}

fn render(value: Decimal, decimals: u8, force_decimal: bool) -> String {
    let fixed = value
        .round_dp_with_strategy(u32::from(decimals), RoundingStrategy::MidpointAwayFromZero)
        .normalize();
    if force_decimal && fixed.scale() == 0 {
        format!("{fixed}.0")
    } else {
        fixed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_tick_size_bands() {
        assert_eq!(AssetMetadata::tick_size_for(5).inner(), dec!(0.1));
        assert_eq!(AssetMetadata::tick_size_for(4).inner(), dec!(0.01));
        assert_eq!(AssetMetadata::tick_size_for(0).inner(), dec!(1));
        assert_eq!(AssetMetadata::tick_size_for(2).inner(), dec!(0.01));
        assert_eq!(AssetMetadata::tick_size_for(3).inner(), dec!(0.01));
    }

    #[test]
    fn test_decimal_places_mirror_bands() {
        assert_eq!(AssetMetadata::decimal_places_for(5), 1);
        assert_eq!(AssetMetadata::decimal_places_for(4), 2);
        assert_eq!(AssetMetadata::decimal_places_for(0), 0);
        assert_eq!(AssetMetadata::decimal_places_for(1), 2);
    }

    #[test]
    fn test_step_size_from_sz_decimals() {
        assert_eq!(AssetMetadata::step_size_for(0).inner(), dec!(1));
        assert_eq!(AssetMetadata::step_size_for(3).inner(), dec!(0.001));
        assert_eq!(AssetMetadata::step_size_for(5).inner(), dec!(0.00001));
    }

    #[test]
    fn test_btc_like_price_formatting() {
        let meta = AssetMetadata::from_exchange("BTC", Some(0), 5, 50, None);
        assert_eq!(meta.tick_size.inner(), dec!(0.1));
        assert_eq!(meta.format_price(Price::new(dec!(94028.123456))), "94028.1");
    }

    #[test]
    fn test_trailing_zero_stripped() {
        let meta = AssetMetadata::from_exchange("BTC", Some(0), 5, 50, None);
        assert_eq!(meta.format_price(Price::new(dec!(94028.04))), "94028");
    }

    #[test]
    fn test_force_decimal_keeps_one_digit() {
        let mut meta = AssetMetadata::from_exchange("BTC", Some(0), 5, 50, None);
        meta.force_decimal = true;
        assert_eq!(meta.format_price(Price::new(dec!(94028.04))), "94028.0");
        assert_eq!(meta.format_price(Price::new(dec!(94028.14))), "94028.1");
    }

    #[test]
    fn test_explicit_tick_size_overrides_band() {
        let meta = AssetMetadata::from_exchange("ETH", Some(1), 4, 25, Some(dec!(0.05)));
        assert_eq!(meta.tick_size.inner(), dec!(0.05));
        assert_eq!(meta.price_decimals, 2);
        assert_eq!(meta.format_price(Price::new(dec!(3120.13))), "3120.15");
    }

    #[test]
    fn test_format_size() {
        let meta = AssetMetadata::from_exchange("ETH", Some(1), 4, 25, None);
        assert_eq!(meta.format_size(Size::new(dec!(0.123456))), "0.1235");
        let whole = AssetMetadata::from_exchange("DOGE", Some(2), 0, 10, None);
        assert_eq!(whole.format_size(Size::new(dec!(152.6))), "153");
    }

    #[test]
    fn test_min_order_size_from_notional() {
        let meta = AssetMetadata::from_exchange("ETH", Some(1), 4, 25, None);
        // $10 at 3000 = 0.003333.. -> ceil to 0.0034
        let min = meta.min_order_size(Price::new(dec!(3000)), dec!(10));
        assert_eq!(min.inner(), dec!(0.0034));
        // Never below one step
        let tiny = meta.min_order_size(Price::new(dec!(1000000)), dec!(0));
        assert_eq!(tiny.inner(), dec!(0.0001));
    }

    #[test]
    fn test_quantization_round_trip_within_precision() {
        let metas = [
            AssetMetadata::from_exchange("BTC", None, 5, 50, None),
            AssetMetadata::from_exchange("ETH", None, 4, 25, None),
            AssetMetadata::from_exchange("SOL", None, 2, 20, None),
            AssetMetadata::from_exchange("DOGE", None, 0, 10, None),
        ];
        let prices = [
            dec!(94028.123456),
            dec!(0.987654),
            dec!(3120.005),
            dec!(17.4999),
            dec!(1.5),
        ];
        for meta in &metas {
            let dp = meta.decimal_places(false);
            let bound = Decimal::new(1, u32::from(dp));
            for p in prices {
                let formatted: Decimal = meta.format_price(Price::new(p)).parse().unwrap();
                let exact = (p / meta.tick_size.inner())
                    .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
                    * meta.tick_size.inner();
                assert!((formatted - exact).abs() < bound, "{} {p}", meta.symbol);
            }
        }
    }
}
