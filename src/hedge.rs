//! Hedge classification.
//!
//! Two opposite-side positions on one symbol form a hedge. The larger leg is
//! the *main* position (the one at risk of liquidation); the smaller one is the
//! *support* leg absorbing part of main's risk. Equal-sized legs have no main,
//! which is reported as [`HedgeError::Ambiguous`] rather than guessed.

use crate::position::Position;
use crate::types::{Percent, Price, Side};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Which side plays which role in a hedge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HedgePair {
    pub main_side: Side,
    pub support_side: Side,
}

impl HedgePair {
    pub fn classify(a: &Position, b: &Position) -> Result<Self, HedgeError> {
        if a.symbol.name != b.symbol.name {
            return Err(HedgeError::SymbolMismatch {
                first: a.symbol.name.clone(),
                second: b.symbol.name.clone(),
            });
        }
        if a.side == b.side {
            return Err(HedgeError::SameSide(a.side));
        }
        for leg in [a, b] {
            if leg.size <= Decimal::ZERO {
                return Err(HedgeError::NonPositiveSize {
                    side: leg.side,
                    size: leg.size,
                });
            }
        }
        if a.size == b.size {
            return Err(HedgeError::Ambiguous { size: a.size });
        }

        let (main, support) = if a.size > b.size { (a, b) } else { (b, a) };
        Ok(Self {
            main_side: main.side,
            support_side: support.side,
        })
    }
}

pub fn is_main(pair: &HedgePair, side: Side) -> bool {
    pair.main_side == side
}

pub fn is_support(pair: &HedgePair, side: Side) -> bool {
    pair.support_side == side
}

/// A classified pair of legs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hedge {
    pub pair: HedgePair,
    pub main: Position,
    pub support: Position,
}

impl Hedge {
    pub fn new(a: Position, b: Position) -> Result<Self, HedgeError> {
        let pair = HedgePair::classify(&a, &b)?;
        let (main, support) = if is_main(&pair, a.side) { (a, b) } else { (b, a) };
        Ok(Self {
            pair,
            main,
            support,
        })
    }

    pub fn position(&self, side: Side) -> &Position {
        if is_main(&self.pair, side) {
            &self.main
        } else {
            &self.support
        }
    }

    /// support margin / main margin
    pub fn support_rate(&self) -> Percent {
        let main_margin = self.main.initial_margin.value();
        if main_margin.is_zero() {
            return Percent::zero();
        }
        Percent::from_fraction(self.support.initial_margin.value() / main_margin)
    }

    /// Part of the main leg not offset by the support leg.
    pub fn not_covered_size(&self) -> Decimal {
        self.main.size - self.support.size
    }

    pub fn is_support_profitable(&self, mark_price: Price) -> bool {
        self.support.pnl_at(mark_price).is_positive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HedgeError {
    #[error("Hedge legs belong to different symbols: {first} and {second}")]
    SymbolMismatch { first: String, second: String },

    #[error("Hedge legs must be on opposite sides, both are {0}")]
    SameSide(Side),

    #[error("Hedge leg {side} has non-positive size {size}")]
    NonPositiveSize { side: Side, size: Decimal },

    #[error("Hedge legs have equal size {size}: main and support cannot be told apart")]
    Ambiguous { size: Decimal },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::Symbol;
    use crate::types::{CoinAmount, Leverage};
    use rust_decimal_macros::dec;

    fn leg(side: Side, size: Decimal) -> Position {
        Position::open(
            side,
            Symbol::btc_usdt(),
            Price::new_unchecked(dec!(30000)),
            size,
            Leverage::new(dec!(100)).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn larger_leg_is_main() {
        let pair = HedgePair::classify(&leg(Side::Short, dec!(1)), &leg(Side::Long, dec!(0.4))).unwrap();
        assert!(is_main(&pair, Side::Short));
        assert!(is_support(&pair, Side::Long));
        assert!(!is_support(&pair, Side::Short));
    }

    #[test]
    fn equal_legs_are_ambiguous() {
        let result = HedgePair::classify(&leg(Side::Short, dec!(0.5)), &leg(Side::Long, dec!(0.5)));
        assert_eq!(result, Err(HedgeError::Ambiguous { size: dec!(0.5) }));
    }

    #[test]
    fn same_side_rejected() {
        let result = Hedge::new(leg(Side::Long, dec!(1)), leg(Side::Long, dec!(0.5)));
        assert_eq!(result, Err(HedgeError::SameSide(Side::Long)));
    }

    #[test]
    fn symbol_mismatch_rejected() {
        let mut other = leg(Side::Long, dec!(0.5));
        other.symbol = Symbol::eth_usdt();
        let result = Hedge::new(leg(Side::Short, dec!(1)), other);
        assert!(matches!(result, Err(HedgeError::SymbolMismatch { .. })));
    }

    #[test]
    fn support_rate_and_uncovered_size() {
        let hedge = Hedge::new(leg(Side::Long, dec!(0.25)), leg(Side::Short, dec!(1))).unwrap();
        assert_eq!(hedge.main.side, Side::Short);
        assert_eq!(hedge.support.side, Side::Long);
        assert_eq!(hedge.not_covered_size(), dec!(0.75));
        assert_eq!(hedge.support_rate().value(), dec!(25));
        assert_eq!(hedge.position(Side::Long).size, dec!(0.25));
    }

    #[test]
    fn support_profitability_follows_mark() {
        let hedge = Hedge::new(leg(Side::Long, dec!(0.25)), leg(Side::Short, dec!(1))).unwrap();
        assert!(hedge.is_support_profitable(Price::new_unchecked(dec!(30500))));
        assert!(!hedge.is_support_profitable(Price::new_unchecked(dec!(29500))));
    }

    #[test]
    fn zero_margin_main_has_zero_rate() {
        let mut hedge = Hedge::new(leg(Side::Long, dec!(0.25)), leg(Side::Short, dec!(1))).unwrap();
        hedge.main = hedge.main.with_initial_margin(CoinAmount::zero());
        assert_eq!(hedge.support_rate(), Percent::zero());
    }
}
