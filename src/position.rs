// 4.0: open position value. pnl = sign * size * (price - entry).
// 4.1 has increase/reduce logic at the bottom. a changed position is always a new value.

use crate::market::Symbol;
use crate::types::{CoinAmount, Leverage, Percent, Price, Side};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub side: Side,
    pub symbol: Symbol,
    pub entry_price: Price,
    pub size: Decimal,
    pub position_value: CoinAmount,
    /// `None` when the leg cannot be liquidated on its own (fully covered, or unreachable).
    pub liquidation_price: Option<Price>,
    pub initial_margin: CoinAmount,
    pub leverage: Leverage,
    pub unrealized_pnl: CoinAmount,
}

impl Position {
    pub fn open(
        side: Side,
        symbol: Symbol,
        entry_price: Price,
        size: Decimal,
        leverage: Leverage,
    ) -> Result<Self, PositionError> {
        if size <= Decimal::ZERO {
            return Err(PositionError::NonPositiveSize(size));
        }
        let position_value = CoinAmount::new(size * entry_price.value());
        Ok(Self {
            side,
            symbol,
            entry_price,
            size,
            position_value,
            liquidation_price: None,
            initial_margin: position_value.mul(leverage.initial_margin_fraction()),
            leverage,
            unrealized_pnl: CoinAmount::zero(),
        })
    }

    pub fn with_liquidation_price(self, liquidation_price: Option<Price>) -> Self {
        Self {
            liquidation_price,
            ..self
        }
    }

    // exchange snapshots may report margin that differs from value / leverage
    pub fn with_initial_margin(self, initial_margin: CoinAmount) -> Self {
        Self {
            initial_margin,
            ..self
        }
    }

    /// Same position with unrealized pnl re-marked at `mark_price`.
    pub fn marked_at(self, mark_price: Price) -> Self {
        let unrealized_pnl = self.pnl_at(mark_price);
        Self {
            unrealized_pnl,
            ..self
        }
    }

    // 4.1: paper gains/losses at an arbitrary price
    pub fn pnl_at(&self, price: Price) -> CoinAmount {
        calculate_unrealized_pnl(self.side, self.size, self.entry_price, price)
    }

    /// PNL relative to the margin put into the position.
    pub fn pnl_percent(&self, price: Price) -> Percent {
        if self.initial_margin.value().is_zero() {
            return Percent::zero();
        }
        Percent::from_fraction(self.pnl_at(price).value() / self.initial_margin.value())
    }

    pub fn is_in_loss(&self, price: Price) -> bool {
        self.pnl_at(price).is_negative()
    }

    pub fn liquidation_distance(&self) -> Option<Decimal> {
        self.liquidation_price
            .map(|liq| liq.differ_with(self.entry_price))
    }

    pub fn price_distance_to_liquidation(&self, price: Price) -> Option<Decimal> {
        self.liquidation_price.map(|liq| liq.differ_with(price))
    }
}

// 4.2: the pnl formula. sign * size * (price - entry)
pub fn calculate_unrealized_pnl(side: Side, size: Decimal, entry_price: Price, price: Price) -> CoinAmount {
    CoinAmount::new(side.sign() * size * (price.value() - entry_price.value()))
}

#[derive(Debug, Clone)]
pub struct PositionUpdate {
    pub new_position: Option<Position>,
    pub realized_pnl: CoinAmount,
    pub margin_released: CoinAmount,
    pub closed_volume: Decimal,
}

// 4.3: adds to an existing position. averages the entry price by size
pub fn increase_position(
    position: &Position,
    volume: Decimal,
    fill_price: Price,
    additional_margin: CoinAmount,
) -> Position {
    debug_assert!(volume > Decimal::ZERO, "increase volume must be positive");

    let new_size = position.size + volume;
    let weighted_sum = position.size * position.entry_price.value() + volume * fill_price.value();
    let new_entry = Price::new_unchecked(weighted_sum / new_size);

    Position {
        side: position.side,
        symbol: position.symbol.clone(),
        entry_price: new_entry,
        size: new_size,
        position_value: CoinAmount::new(weighted_sum),
        liquidation_price: position.liquidation_price,
        initial_margin: position.initial_margin.add(additional_margin),
        leverage: position.leverage,
        unrealized_pnl: position.unrealized_pnl,
    }
}

// 4.4: closes part or all of a position. entry stays, margin is released pro rata
pub fn reduce_position(position: &Position, volume: Decimal, fill_price: Price) -> PositionUpdate {
    debug_assert!(volume > Decimal::ZERO, "reduce volume must be positive");

    let closed_volume = volume.min(position.size);
    let realized_pnl =
        calculate_unrealized_pnl(position.side, closed_volume, position.entry_price, fill_price);

    let remaining = position.size - closed_volume;
    if remaining.is_zero() {
        return PositionUpdate {
            new_position: None,
            realized_pnl,
            margin_released: position.initial_margin,
            closed_volume,
        };
    }

    let margin_released = position.initial_margin.mul(closed_volume / position.size);
    let new_position = Position {
        side: position.side,
        symbol: position.symbol.clone(),
        entry_price: position.entry_price,
        size: remaining,
        position_value: CoinAmount::new(remaining * position.entry_price.value()),
        liquidation_price: position.liquidation_price,
        initial_margin: position.initial_margin.sub(margin_released),
        leverage: position.leverage,
        unrealized_pnl: position.unrealized_pnl,
    };

    PositionUpdate {
        new_position: Some(new_position),
        realized_pnl,
        margin_released,
        closed_volume,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PositionError {
    #[error("Position size must be positive, got {0}")]
    NonPositiveSize(Decimal),
}
