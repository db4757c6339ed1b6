//! Target-vs-resting reconciliation.
//!
//! Cancel-and-replace policy: the whole symbol is cancelled when a resting
//! order drifts out of the ladder bounds or sentiment fully reverses;
//! otherwise only the gaps in the ladder are filled.

use quoter_core::{OpenOrder, OrderSide, Price};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::analysis::Sentiment;
use crate::config::MakerConfig;
use crate::ladder::{LadderBounds, QuoteLadder, QuoteLevel};

/// Why every order of a symbol was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum CancelReason {
    /// A resting order sits outside the ladder bounds.
    OutOfBand { oid: u64, price: Price },
    SentimentFlip { from: Sentiment, to: Sentiment },
    Shutdown,
}

impl std::fmt::Display for CancelReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutOfBand { oid, price } => write!(f, "order {oid} at {price} out of band"),
            Self::SentimentFlip { from, to } => write!(f, "sentiment flip {from} -> {to}"),
            Self::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// Decide whether the symbol's resting orders must all be cancelled.
///
/// A full sentiment reversal always cancels, whether or not orders are
/// visible yet; an out-of-band order cancels only when one exists.
pub fn cancellation_reason(
    open: &[OpenOrder],
    bounds: &LadderBounds,
    previous: Option<Sentiment>,
    current: Sentiment,
) -> Option<CancelReason> {
    if let Some(previous) = previous {
        if current.is_reversal_of(previous) {
            return Some(CancelReason::SentimentFlip {
                from: previous,
                to: current,
            });
        }
    }

    open.iter()
        .find(|o| !bounds.contains(o.price))
        .map(|o| CancelReason::OutOfBand {
            oid: o.oid,
            price: o.price,
        })
}

/// A ladder level left out because it strays too far from mid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkippedLevel {
    pub level: QuoteLevel,
    pub deviation: Decimal,
}

/// Gap-fill result for one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlacementPlan {
    pub to_place: Vec<QuoteLevel>,
    pub skipped: Vec<SkippedLevel>,
    /// Levels already covered by a resting order.
    pub covered: usize,
}

/// Compare the target ladder with resting orders, side by side.
///
/// A level is placed only when no resting order on its side is within
/// `duplicate_tolerance` of its price and the side holds fewer than
/// `order_levels` orders (counting this cycle's placements). Levels
/// deviating from mid by more than `max_level_deviation` are skipped.
pub fn plan_placements(
    ladder: &QuoteLadder,
    open: &[OpenOrder],
    config: &MakerConfig,
) -> PlacementPlan {
    let mut plan = PlacementPlan::default();
    let max_per_side = config.order_levels as usize;

    for side in [OrderSide::Buy, OrderSide::Sell] {
        let resting: Vec<Price> = open
            .iter()
            .filter(|o| o.side == side)
            .map(|o| o.price)
            .collect();
        let mut count = resting.len();

        for level in ladder.levels(side) {
            let covered = resting.iter().any(|p| {
                p.deviation_from(level.price)
                    .is_some_and(|d| d <= config.duplicate_tolerance)
            });
            if covered {
                plan.covered += 1;
                continue;
            }
            if count >= max_per_side {
                break;
            }

            let deviation = level.price.deviation_from(ladder.mid).unwrap_or(Decimal::MAX);
            if deviation > config.max_level_deviation {
                plan.skipped.push(SkippedLevel {
                    level: *level,
                    deviation,
                });
                continue;
            }

            plan.to_place.push(*level);
            count += 1;
        }
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{IndicatorSnapshot, MarketCondition};
    use crate::ladder::build_ladder;
    use quoter_core::{AssetMetadata, Size};
    use rust_decimal_macros::dec;

    fn order(oid: u64, side: OrderSide, price: Decimal) -> OpenOrder {
        OpenOrder {
            oid,
            symbol: "ETH".to_string(),
            side,
            price: Price::new(price),
            size: Size::new(dec!(0.1)),
            timestamp_ms: 0,
        }
    }

    fn ladder(config: &MakerConfig) -> QuoteLadder {
        let condition = MarketCondition {
            sentiment: Sentiment::Neutral,
            volatility: dec!(0),
            bollinger_width: dec!(0),
            signals: IndicatorSnapshot::default(),
        };
        let meta = AssetMetadata::from_exchange("ETH", Some(1), 4, 50, None);
        build_ladder(
            Price::new(dec!(1000)),
            dec!(0.004),
            &condition,
            dec!(10000),
            &meta,
            config,
        )
    }

    fn bounds() -> LadderBounds {
        LadderBounds::around(Price::new(dec!(1000)), dec!(0.01), dec!(0))
    }

    #[test]
    fn test_flip_cancels_even_without_orders() {
        let reason =
            cancellation_reason(&[], &bounds(), Some(Sentiment::Bullish), Sentiment::Bearish);
        assert_eq!(
            reason,
            Some(CancelReason::SentimentFlip {
                from: Sentiment::Bullish,
                to: Sentiment::Bearish
            })
        );
    }

    #[test]
    fn test_transition_through_neutral_keeps_orders() {
        let open = vec![order(1, OrderSide::Buy, dec!(998))];
        assert_eq!(
            cancellation_reason(&open, &bounds(), Some(Sentiment::Bullish), Sentiment::Neutral),
            None
        );
        assert_eq!(
            cancellation_reason(&open, &bounds(), Some(Sentiment::Neutral), Sentiment::Bearish),
            None
        );
        assert_eq!(cancellation_reason(&open, &bounds(), None, Sentiment::Bearish), None);
    }

    #[test]
    fn test_out_of_band_order_cancels() {
        let open = vec![
            order(1, OrderSide::Buy, dec!(995)),
            order(2, OrderSide::Sell, dec!(1011)),
        ];
        assert_eq!(
            cancellation_reason(&open, &bounds(), Some(Sentiment::Neutral), Sentiment::Neutral),
            Some(CancelReason::OutOfBand {
                oid: 2,
                price: Price::new(dec!(1011))
            })
        );
    }

    #[test]
    fn test_plan_fills_empty_book() {
        let config = MakerConfig::default();
        let plan = plan_placements(&ladder(&config), &[], &config);
        assert_eq!(plan.to_place.len(), 6);
        assert_eq!(plan.covered, 0);
        assert!(plan.skipped.is_empty());
    }

    #[test]
    fn test_plan_skips_covered_levels() {
        let config = MakerConfig::default();
        let ladder = ladder(&config);
        // Buy level 0 sits at 998; 998.5 is within 0.1%.
        assert_eq!(ladder.buy_levels[0].price, Price::new(dec!(998)));
        let open = vec![order(7, OrderSide::Buy, dec!(998.5))];

        let plan = plan_placements(&ladder, &open, &config);
        assert_eq!(plan.covered, 1);
        assert_eq!(plan.to_place.len(), 5);
        assert!(plan
            .to_place
            .iter()
            .all(|l| l.price != Price::new(dec!(998))));
    }

    #[test]
    fn test_plan_respects_side_capacity() {
        let config = MakerConfig::default();
        let open = vec![
            order(1, OrderSide::Buy, dec!(990)),
            order(2, OrderSide::Buy, dec!(991)),
            order(3, OrderSide::Buy, dec!(992)),
            order(4, OrderSide::Sell, dec!(1009)),
        ];
        let plan = plan_placements(&ladder(&config), &open, &config);
        assert!(plan.to_place.iter().all(|l| l.side == OrderSide::Sell));
        assert_eq!(plan.to_place.len(), 2);
    }

    #[test]
    fn test_plan_skips_far_levels() {
        let config = MakerConfig {
            max_level_deviation: dec!(0.0025),
            ..MakerConfig::default()
        };
        let plan = plan_placements(&ladder(&config), &[], &config);
        // Only level 0 (0.2% away) passes on each side.
        assert_eq!(plan.to_place.len(), 2);
        assert_eq!(plan.skipped.len(), 4);
        assert!(plan.skipped.iter().all(|s| s.deviation > dec!(0.0025)));
    }
}
