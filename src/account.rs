//! Contract balance ledger.
//!
//! `total` is the wallet balance (margins locked in positions included),
//! `available` is what can still be put into new orders, and
//! `free_for_liquidation` is what the leg at risk may lose before the
//! exchange force-closes it.

use crate::types::CoinAmount;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractBalance {
    pub total: CoinAmount,
    pub available: CoinAmount,
    pub free_for_liquidation: CoinAmount,
}

impl ContractBalance {
    pub fn new(
        total: CoinAmount,
        available: CoinAmount,
        free_for_liquidation: CoinAmount,
    ) -> Result<Self, BalanceError> {
        if total.is_negative() {
            return Err(BalanceError::NegativeTotal(total));
        }
        if available > total {
            return Err(BalanceError::AvailableExceedsTotal { available, total });
        }
        Ok(Self {
            total,
            available,
            free_for_liquidation,
        })
    }

    /// Same balance with the liquidation reserve replaced
    pub fn with_free_for_liquidation(&self, free_for_liquidation: CoinAmount) -> Self {
        Self {
            free_for_liquidation,
            ..self.clone()
        }
    }

    pub fn can_afford(&self, cost: CoinAmount) -> bool {
        self.available >= cost
    }

    // margin moves out of available into the position, fee leaves the wallet
    pub fn reserve_for_open(&mut self, margin: CoinAmount, fee: CoinAmount) {
        self.available = self.available.sub(margin).sub(fee);
        self.total = self.total.sub(fee);
    }

    // released margin returns to available, pnl and fee hit both
    pub fn settle_close(&mut self, released_margin: CoinAmount, pnl: CoinAmount, fee: CoinAmount) {
        let net = pnl.sub(fee);
        self.available = self.available.add(released_margin).add(net);
        self.total = self.total.add(net);
    }

    pub fn shift_free_for_liquidation(&mut self, delta: CoinAmount) {
        self.free_for_liquidation = self.free_for_liquidation.add(delta);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BalanceError {
    #[error("Total balance cannot be negative: {0}")]
    NegativeTotal(CoinAmount),

    #[error("Available {available} exceeds total {total}")]
    AvailableExceedsTotal {
        available: CoinAmount,
        total: CoinAmount,
    },
}
