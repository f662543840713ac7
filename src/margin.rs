//! Order cost calculation.
//!
//! Opening an order locks initial margin (notional divided by leverage) and
//! pays the taker fee on notional. Closing pays the same fee rate; the margin
//! released on close is handled by the position reduction itself.

use crate::types::{CoinAmount, Leverage, Percent, Price};
use rust_decimal::Decimal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderCost {
    pub margin: CoinAmount,
    pub fee: CoinAmount,
}

impl OrderCost {
    pub fn zero() -> Self {
        Self {
            margin: CoinAmount::zero(),
            fee: CoinAmount::zero(),
        }
    }

    pub fn total(&self) -> CoinAmount {
        self.margin.add(self.fee)
    }
}

pub fn notional_value(volume: Decimal, price: Price) -> CoinAmount {
    CoinAmount::new(volume.abs() * price.value())
}

pub fn order_margin(volume: Decimal, price: Price, leverage: Leverage) -> CoinAmount {
    notional_value(volume, price).mul(leverage.initial_margin_fraction())
}

pub fn order_fee(volume: Decimal, price: Price, fee_rate: Percent) -> CoinAmount {
    CoinAmount::new(fee_rate.of(notional_value(volume, price).value()))
}

/// Margin plus fee to open `volume` at `price`.
pub fn calculate_order_cost(
    volume: Decimal,
    price: Price,
    leverage: Leverage,
    fee_rate: Percent,
) -> OrderCost {
    if volume <= Decimal::ZERO {
        return OrderCost::zero();
    }
    OrderCost {
        margin: order_margin(volume, price, leverage),
        fee: order_fee(volume, price, fee_rate),
    }
}

/// Fee only: closing does not lock margin.
pub fn calculate_close_cost(volume: Decimal, price: Price, fee_rate: Percent) -> OrderCost {
    if volume <= Decimal::ZERO {
        return OrderCost::zero();
    }
    OrderCost {
        margin: CoinAmount::zero(),
        fee: order_fee(volume, price, fee_rate),
    }
}
