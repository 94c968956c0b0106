//! Ladder math.
//!
//! Level `i` (1-based) quotes a bid at `mark × (1 − spread × i)` and an ask
//! at `mark × (1 + spread × i)`, sized `quantity × (1 + (i − 1) × 0.5)`.
//! All arithmetic is in `Decimal`; rounding happens only when formatting
//! for the wire.

use rust_decimal::prelude::*;
use rust_decimal_macros::dec;

use crate::types::{CycleError, CycleStep, PairConfig, QuoteError, Side};

/// Size increment per level, as a fraction of the base quantity.
pub const LEVEL_SIZE_STEP: Decimal = dec!(0.5);

/// One rung of the ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LadderLevel {
    pub level: u32,
    pub bid_price: Decimal,
    pub ask_price: Decimal,
    pub quantity: Decimal,
}

/// Compute a single level. `None` if the arithmetic overflows.
pub fn ladder_level(
    mark: Decimal,
    spread: Decimal,
    base_quantity: Decimal,
    level: u32,
) -> Option<LadderLevel> {
    let depth = Decimal::from(level);
    let offset = spread.checked_mul(depth)?;
    let size_step = depth.checked_sub(Decimal::ONE)?.checked_mul(LEVEL_SIZE_STEP)?;
    Some(LadderLevel {
        level,
        bid_price: mark.checked_mul(Decimal::ONE.checked_sub(offset)?)?,
        ask_price: mark.checked_mul(Decimal::ONE.checked_add(offset)?)?,
        quantity: base_quantity.checked_mul(Decimal::ONE.checked_add(size_step)?)?,
    })
}

/// Levels `1..=levels` for a pair around `mark`.
pub fn build_ladder(
    mark: Decimal,
    pair: &PairConfig,
    levels: u32,
) -> Result<Vec<LadderLevel>, CycleError> {
    (1..=levels)
        .map(|level| {
            ladder_level(mark, pair.spread, pair.quantity, level).ok_or(CycleError::Quote {
                step: CycleStep::Ladder {
                    side: Side::Buy,
                    level,
                },
                source: QuoteError::Overflow { level, mark },
            })
        })
        .collect()
}

/// Check that every order of the cycle survives rounding to the pair's
/// precision.
///
/// Prices and quantities must stay positive, each bid must sit strictly
/// below the rounded mark and the level above it, and each ask strictly
/// above. Runs before anything is cancelled or placed.
pub fn check_quotes(
    mark: Decimal,
    ladder: &[LadderLevel],
    pair: &PairConfig,
) -> Result<(), CycleError> {
    let price_dp = pair.price_decimals;
    let rounded_mark = round_to(mark, price_dp);

    for side in [Side::Buy, Side::Sell] {
        let mut bound = rounded_mark;
        for level in ladder {
            let step = CycleStep::Ladder {
                side,
                level: level.level,
            };
            let raw = match side {
                Side::Buy => level.bid_price,
                Side::Sell => level.ask_price,
            };
            let price = positive(step, "price", raw, price_dp)?;
            positive(step, "quantity", level.quantity, pair.quantity_decimals)?;

            let separated = match side {
                Side::Buy => price < bound,
                Side::Sell => price > bound,
            };
            if !separated {
                return Err(CycleError::Quote {
                    step,
                    source: QuoteError::NotSeparated {
                        side,
                        price,
                        bound,
                        decimals: price_dp,
                    },
                });
            }
            bound = price;
        }
    }

    let step = CycleStep::SelfCross { side: Side::Buy };
    positive(step, "price", mark, price_dp)?;
    positive(step, "quantity", pair.quantity, pair.quantity_decimals)?;
    Ok(())
}

fn positive(
    step: CycleStep,
    field: &'static str,
    value: Decimal,
    decimals: u32,
) -> Result<Decimal, CycleError> {
    let rounded = round_to(value, decimals);
    if rounded > Decimal::ZERO {
        Ok(rounded)
    } else {
        Err(CycleError::Quote {
            step,
            source: QuoteError::RoundsToZero {
                field,
                value,
                rounded,
                decimals,
            },
        })
    }
}

/// Round half away from zero to exactly `decimals` places.
pub fn round_to(value: Decimal, decimals: u32) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(decimals);
    rounded
}

/// Render `value` for the wire with exactly `decimals` places.
pub fn format_decimal(value: Decimal, decimals: u32) -> String {
    round_to(value, decimals).to_string()
}
