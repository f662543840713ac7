//! Symbol metadata and ticker snapshots.
//!
//! A symbol carries the exchange's rounding grid (price and volume precision),
//! the minimum order quantity and the maintenance-margin rate. A ticker is an
//! immutable price snapshot captured once per calculation.

use crate::types::{floor_to_precision, Percent, Price};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Static instrument configuration (immutable after creation)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    /// Exchange name (e.g., "BTCUSDT")
    pub name: String,
    /// Base coin (e.g., "BTC")
    pub base_coin: String,
    /// Settlement coin (e.g., "USDT")
    pub quote_coin: String,
    /// Decimal places of a valid price
    pub price_precision: u32,
    /// Decimal places of a valid order volume
    pub volume_precision: u32,
    /// Minimum order quantity
    pub min_order_qty: Decimal,
    /// Maintenance-margin rate applied to position notional
    pub maintenance_margin_rate: Percent,
}

impl Symbol {
    /// Default BTCUSDT linear perpetual
    pub fn btc_usdt() -> Self {
        Self {
            name: "BTCUSDT".to_string(),
            base_coin: "BTC".to_string(),
            quote_coin: "USDT".to_string(),
            price_precision: 2,
            volume_precision: 3,
            min_order_qty: dec!(0.001),
            maintenance_margin_rate: Percent::new(dec!(0.5)),
        }
    }

    /// ETHUSDT linear perpetual
    pub fn eth_usdt() -> Self {
        Self {
            name: "ETHUSDT".to_string(),
            base_coin: "ETH".to_string(),
            quote_coin: "USDT".to_string(),
            price_precision: 2,
            volume_precision: 2,
            min_order_qty: dec!(0.01),
            maintenance_margin_rate: Percent::new(dec!(0.5)),
        }
    }

    /// Smallest volume increment the exchange accepts
    pub fn volume_step(&self) -> Decimal {
        Decimal::new(1, self.volume_precision)
    }

    /// Smallest price increment
    pub fn price_tick(&self) -> Decimal {
        Decimal::new(1, self.price_precision)
    }

    /// Minimum step an order may move size by: the larger of the volume step and min qty
    pub fn min_volume_step(&self) -> Decimal {
        self.volume_step().max(self.min_order_qty)
    }

    pub fn round_price(&self, price: Price) -> Price {
        price.round(self.price_precision)
    }

    /// Floors a volume toward zero onto the volume grid
    pub fn floor_volume(&self, volume: Decimal) -> Decimal {
        floor_to_precision(volume, self.volume_precision)
    }

    /// Validate an order volume
    pub fn validate_volume(&self, volume: Decimal) -> Result<(), SymbolError> {
        if volume < self.min_order_qty {
            return Err(SymbolError::VolumeTooSmall {
                volume,
                minimum: self.min_order_qty,
            });
        }
        let remainder = volume % self.volume_step();
        if !remainder.is_zero() {
            return Err(SymbolError::InvalidVolumeStep {
                volume,
                step: self.volume_step(),
            });
        }
        Ok(())
    }
}

/// Mark/index/last price snapshot at one instant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticker {
    pub symbol: String,
    pub mark_price: Price,
    pub index_price: Price,
    pub last_price: Price,
}

impl Ticker {
    pub fn new(symbol: &Symbol, mark_price: Price, index_price: Price, last_price: Price) -> Self {
        Self {
            symbol: symbol.name.clone(),
            mark_price,
            index_price,
            last_price,
        }
    }

    /// Ticker where mark, index and last all sit at one price
    pub fn flat(symbol: &Symbol, price: Price) -> Self {
        Self::new(symbol, price, price, price)
    }

    /// Same snapshot re-marked at `price`
    pub fn with_mark_price(&self, price: Price) -> Self {
        Self {
            mark_price: price,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SymbolError {
    #[error("Volume {volume} below minimum order qty {minimum}")]
    VolumeTooSmall { volume: Decimal, minimum: Decimal },

    #[error("Volume {volume} not aligned to volume step {step}")]
    InvalidVolumeStep { volume: Decimal, step: Decimal },

    #[error("Ticker for {ticker} does not belong to symbol {symbol}")]
    TickerMismatch { symbol: String, ticker: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn btc_usdt_defaults() {
        let symbol = Symbol::btc_usdt();
        assert_eq!(symbol.name, "BTCUSDT");
        assert_eq!(symbol.volume_step(), dec!(0.001));
        assert_eq!(symbol.min_volume_step(), dec!(0.001));
        assert_eq!(symbol.price_tick(), dec!(0.01));
        assert_eq!(symbol.maintenance_margin_rate.as_fraction(), dec!(0.005));
    }

    #[test]
    fn min_volume_step_respects_min_order_qty() {
        let mut symbol = Symbol::btc_usdt();
        symbol.min_order_qty = dec!(0.005);
        assert_eq!(symbol.min_volume_step(), dec!(0.005));
    }

    #[test]
    fn floor_volume_rounds_toward_zero() {
        let symbol = Symbol::btc_usdt();
        assert_eq!(symbol.floor_volume(dec!(0.66666)), dec!(0.666));
        assert_eq!(symbol.floor_volume(dec!(0.0009)), dec!(0));
    }

    #[test]
    fn validate_volume_ok() {
        let symbol = Symbol::btc_usdt();
        assert!(symbol.validate_volume(dec!(0.001)).is_ok());
        assert!(symbol.validate_volume(dec!(1.234)).is_ok());
    }

    #[test]
    fn validate_volume_too_small() {
        let symbol = Symbol::btc_usdt();
        let result = symbol.validate_volume(dec!(0.0001));
        assert!(matches!(result, Err(SymbolError::VolumeTooSmall { .. })));
    }

    #[test]
    fn validate_volume_off_grid() {
        let symbol = Symbol::btc_usdt();
        let result = symbol.validate_volume(dec!(0.0015));
        assert!(matches!(result, Err(SymbolError::InvalidVolumeStep { .. })));
    }

    #[test]
    fn round_price_to_precision() {
        let symbol = Symbol::btc_usdt();
        let price = Price::new_unchecked(dec!(33003.003));
        assert_eq!(symbol.round_price(price).value(), dec!(33003.00));
    }

    #[test]
    fn ticker_remark() {
        let symbol = Symbol::btc_usdt();
        let ticker = Ticker::flat(&symbol, Price::new_unchecked(dec!(30000)));
        let moved = ticker.with_mark_price(Price::new_unchecked(dec!(30500)));
        assert_eq!(moved.mark_price.value(), dec!(30500));
        assert_eq!(moved.index_price.value(), dec!(30000));
        assert_eq!(moved.symbol, "BTCUSDT");
    }
}
