//! Liquidation price estimation.
//!
//! A leg liquidates when the loss on its uncovered size, net of the
//! maintenance-margin buffer, consumes the funds earmarked for liquidation:
//!
//! `funds = not_covered_size * (|liq - entry| - mm_distance)`
//!
//! where `mm_distance = entry * maintenance_margin_rate` per unit. Solving for
//! `liq` gives the forward estimator, solving for `not_covered_size` gives the
//! inverse used to size reductions toward a wished liquidation price.

use crate::position::Position;
use crate::types::{CoinAmount, Percent, Price, Side};
use rust_decimal::Decimal;

/// Per-unit price distance the exchange reserves for maintenance margin.
pub fn maintenance_margin_distance(entry_price: Price, rate: Percent) -> Decimal {
    rate.of(entry_price.value())
}

/// Size of `position` not offset by an opposite-side leg on the same symbol.
pub fn not_covered_size(position: &Position, opposite: Option<&Position>) -> Decimal {
    match opposite {
        Some(other) if other.side != position.side && other.symbol.name == position.symbol.name => {
            position.size - other.size
        }
        _ => position.size,
    }
}

/// Forward estimator for a position and its optional opposite leg.
pub fn estimate_liquidation_price(
    position: &Position,
    opposite: Option<&Position>,
    funds: CoinAmount,
) -> Result<Option<Price>, LiquidationError> {
    liquidation_price_for(
        position.side,
        position.entry_price,
        not_covered_size(position, opposite),
        funds,
        position.symbol.maintenance_margin_rate,
        position.symbol.price_precision,
    )
}

/// Core formula on raw inputs. `None` means the leg cannot be liquidated:
/// nothing is uncovered, or a long would need a non-positive price.
pub fn liquidation_price_for(
    side: Side,
    entry_price: Price,
    not_covered_size: Decimal,
    funds: CoinAmount,
    maintenance_margin_rate: Percent,
    price_precision: u32,
) -> Result<Option<Price>, LiquidationError> {
    if funds.is_negative() {
        return Err(LiquidationError::NegativeFunds(funds));
    }
    if not_covered_size <= Decimal::ZERO {
        return Ok(None);
    }

    let distance = funds.value() / not_covered_size
        + maintenance_margin_distance(entry_price, maintenance_margin_rate);
    let raw = entry_price.shifted_into_loss(distance, side);

    Ok(Price::new(raw).map(|p| p.round(price_precision)))
}

/// Inverse estimator: the uncovered size at which the leg would liquidate at `wished`.
pub fn not_covered_size_for(
    side: Side,
    entry_price: Price,
    wished: Price,
    funds: CoinAmount,
    maintenance_margin_rate: Percent,
) -> Result<Decimal, LiquidationError> {
    if funds.is_negative() {
        return Err(LiquidationError::NegativeFunds(funds));
    }
    if !wished.is_beyond(entry_price, side) {
        return Err(LiquidationError::WishedPriceOnProfitSide {
            side,
            entry: entry_price,
            wished,
        });
    }

    let buffer = maintenance_margin_distance(entry_price, maintenance_margin_rate);
    let distance = wished.differ_with(entry_price);
    if distance <= buffer {
        return Err(LiquidationError::WishedPriceWithinMaintenanceBuffer { distance, buffer });
    }

    Ok(funds.value() / (distance - buffer))
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LiquidationError {
    #[error("Funds available for liquidation cannot be negative: {0}")]
    NegativeFunds(CoinAmount),

    #[error("Wished liquidation {wished} is not on the loss side of {side} entry {entry}")]
    WishedPriceOnProfitSide { side: Side, entry: Price, wished: Price },

    #[error("Wished liquidation distance {distance} does not exceed maintenance buffer {buffer}")]
    WishedPriceWithinMaintenanceBuffer { distance: Decimal, buffer: Decimal },
}
