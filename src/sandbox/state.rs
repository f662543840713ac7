// 8.0.1: sandbox state snapshot. at most one position per side, both on the state's symbol.

use super::results::SandboxError;
use crate::account::ContractBalance;
use crate::hedge::{Hedge, HedgePair};
use crate::market::{Symbol, Ticker};
use crate::position::Position;
use crate::types::{CoinAmount, Side};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxState {
    pub symbol: Symbol,
    pub ticker: Ticker,
    pub balance: ContractBalance,
    long: Option<Position>,
    short: Option<Position>,
}

impl SandboxState {
    pub fn new<I>(
        symbol: Symbol,
        ticker: Ticker,
        balance: ContractBalance,
        positions: I,
    ) -> Result<Self, SandboxError>
    where
        I: IntoIterator<Item = Position>,
    {
        if ticker.symbol != symbol.name {
            return Err(SandboxError::SymbolMismatch {
                expected: symbol.name.clone(),
                found: ticker.symbol.clone(),
            });
        }

        let mut state = Self {
            symbol,
            ticker,
            balance,
            long: None,
            short: None,
        };

        for position in positions {
            if position.symbol.name != state.symbol.name {
                return Err(SandboxError::SymbolMismatch {
                    expected: state.symbol.name.clone(),
                    found: position.symbol.name.clone(),
                });
            }
            if state.position(position.side).is_some() {
                return Err(SandboxError::DuplicateSide(position.side));
            }
            let side = position.side;
            state.set_position(side, Some(position));
        }

        state.hedge_pair()?;
        Ok(state)
    }

    pub fn position(&self, side: Side) -> Option<&Position> {
        match side {
            Side::Long => self.long.as_ref(),
            Side::Short => self.short.as_ref(),
        }
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.long.iter().chain(self.short.iter())
    }

    /// Roles of the two legs, `None` unless both sides are open.
    pub fn hedge_pair(&self) -> Result<Option<HedgePair>, SandboxError> {
        match (&self.long, &self.short) {
            (Some(long), Some(short)) => Ok(Some(HedgePair::classify(long, short)?)),
            _ => Ok(None),
        }
    }

    pub fn hedge(&self) -> Option<Hedge> {
        match (&self.long, &self.short) {
            (Some(long), Some(short)) => Hedge::new(long.clone(), short.clone()).ok(),
            _ => None,
        }
    }

    /// The leg at risk: the main leg of a hedge, or the only open position.
    pub fn main_position(&self) -> Option<&Position> {
        match (&self.long, &self.short) {
            (Some(long), Some(short)) => {
                let pair = HedgePair::classify(long, short).ok()?;
                self.position(pair.main_side)
            }
            (Some(only), None) | (None, Some(only)) => Some(only),
            (None, None) => None,
        }
    }

    pub fn total_initial_margin(&self) -> CoinAmount {
        self.positions().map(|p| p.initial_margin).sum()
    }

    pub(super) fn set_position(&mut self, side: Side, position: Option<Position>) {
        match side {
            Side::Long => self.long = position,
            Side::Short => self.short = position,
        }
    }

    pub(super) fn position_mut(&mut self, side: Side) -> Option<&mut Position> {
        match side {
            Side::Long => self.long.as_mut(),
            Side::Short => self.short.as_mut(),
        }
    }
}
