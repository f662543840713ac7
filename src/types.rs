// 1.0: all the primitives live here. nothing in the core works without these types.
// sides, prices, percents, coin amounts, leverage. each is a newtype so the compiler catches type mixups.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;

// Long = profit when price goes up. Short = profit when price goes down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn sign(&self) -> Decimal {
        match self {
            Side::Long => dec!(1),
            Side::Short => dec!(-1),
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }

    pub fn is_long(&self) -> bool {
        matches!(self, Side::Long)
    }

    pub fn is_short(&self) -> bool {
        matches!(self, Side::Short)
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Long => write!(f, "long"),
            Side::Short => write!(f, "short"),
        }
    }
}

// 1.1: price in quote coin per unit of base. must be positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Price(Decimal);

impl Price {
    #[must_use]
    pub fn new(value: Decimal) -> Option<Self> {
        if value > Decimal::ZERO {
            Some(Self(value))
        } else {
            None
        }
    }

    pub fn new_unchecked(value: Decimal) -> Self {
        debug_assert!(value > Decimal::ZERO);
        Self(value)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Rounds half away from zero to `precision` decimal places.
    pub fn round(&self, precision: u32) -> Self {
        let rounded = self
            .0
            .round_dp_with_strategy(precision, RoundingStrategy::MidpointAwayFromZero);
        if rounded > Decimal::ZERO {
            Self(rounded)
        } else {
            *self
        }
    }

    /// Absolute distance between two prices.
    pub fn differ_with(&self, other: Price) -> Decimal {
        (self.0 - other.0).abs()
    }

    /// Signed move from `self` to `other`.
    pub fn delta_to(&self, other: Price) -> Decimal {
        other.0 - self.0
    }

    // true when self lies strictly past `reference` in the direction that loses money for `side`
    pub fn is_beyond(&self, reference: Price, side: Side) -> bool {
        match side {
            Side::Long => self.0 < reference.0,
            Side::Short => self.0 > reference.0,
        }
    }

    /// Moves `distance` away from this price in the losing direction of `side`.
    /// Can go non-positive for longs, so the raw value is returned.
    pub fn shifted_into_loss(&self, distance: Decimal, side: Side) -> Decimal {
        self.0 - side.sign() * distance
    }

    pub fn percent_change_to(&self, other: Price) -> Percent {
        Percent::from_fraction(self.delta_to(other) / self.0)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// 1.2: percent points. Percent::new(dec!(0.055)) is 0.055%, not 5.5%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Percent(Decimal);

impl Percent {
    pub fn new(percent: Decimal) -> Self {
        Self(percent)
    }

    pub fn from_fraction(fraction: Decimal) -> Self {
        Self(fraction * dec!(100))
    }

    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn as_fraction(&self) -> Decimal {
        self.0 / dec!(100)
    }

    pub fn of(&self, amount: Decimal) -> Decimal {
        amount * self.as_fraction()
    }

    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

// 1.3: amount of settlement coin. balances, margin, pnl, fees all use this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CoinAmount(Decimal);

impl CoinAmount {
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn abs(&self) -> Self {
        Self(self.0.abs())
    }

    pub fn add(&self, other: CoinAmount) -> Self {
        Self(self.0 + other.0)
    }

    pub fn sub(&self, other: CoinAmount) -> Self {
        Self(self.0 - other.0)
    }

    pub fn mul(&self, factor: Decimal) -> Self {
        Self(self.0 * factor)
    }

    pub fn negate(&self) -> Self {
        Self(-self.0)
    }

    pub fn max(&self, other: CoinAmount) -> Self {
        if self.0 >= other.0 {
            *self
        } else {
            other
        }
    }
}

impl fmt::Display for CoinAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PartialOrd for CoinAmount {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CoinAmount {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl Sum for CoinAmount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), |acc, q| acc.add(q))
    }
}

impl<'a> Sum<&'a CoinAmount> for CoinAmount {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), |acc, q| acc.add(*q))
    }
}

// 1.4: leverage multiplier. must be >= 1x.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leverage(Decimal);

impl Leverage {
    #[must_use]
    pub fn new(value: Decimal) -> Option<Self> {
        if value >= Decimal::ONE {
            Some(Self(value))
        } else {
            None
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    // 10x leverage → 10% margin fraction (1/10)
    pub fn initial_margin_fraction(&self) -> Decimal {
        Decimal::ONE / self.0
    }
}

impl fmt::Display for Leverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x", self.0)
    }
}

// 1.5: floor a size toward zero on a decimal-places grid
pub fn floor_to_precision(value: Decimal, precision: u32) -> Decimal {
    value.round_dp_with_strategy(precision, RoundingStrategy::ToZero)
}
