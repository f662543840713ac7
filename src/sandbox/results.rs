// 8.0.2: error kinds for sandbox operations. kinds are what callers tolerate, errors carry detail.

use crate::hedge::HedgeError;
use crate::liquidation::LiquidationError;
use crate::types::{CoinAmount, Side};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Failure category a caller may declare tolerable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SandboxErrorKind {
    InsufficientAvailableBalance,
    NoPositionToClose,
    CloseVolumeExceedsPosition,
    InvalidVolume,
    HedgeAmbiguous,
    InvalidState,
}

impl SandboxErrorKind {
    /// Only kinds with a meaningful notional application can be absorbed.
    pub fn can_be_tolerated(&self) -> bool {
        matches!(
            self,
            SandboxErrorKind::InsufficientAvailableBalance
                | SandboxErrorKind::NoPositionToClose
                | SandboxErrorKind::CloseVolumeExceedsPosition
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SandboxError {
    #[error("Insufficient available balance: required {required}, available {available}")]
    InsufficientAvailableBalance {
        required: CoinAmount,
        available: CoinAmount,
    },

    #[error("No {0} position to close")]
    NoPositionToClose(Side),

    #[error("Close volume {volume} exceeds {side} position size {size}")]
    CloseVolumeExceedsPosition {
        side: Side,
        volume: Decimal,
        size: Decimal,
    },

    #[error("Order volume must be positive, got {0}")]
    InvalidVolume(Decimal),

    #[error("Hedge legs became equal ({size}): main/support distinction lost")]
    HedgeAmbiguous { size: Decimal },

    #[error("State already holds a {0} position")]
    DuplicateSide(Side),

    #[error("Symbol mismatch: expected {expected}, found {found}")]
    SymbolMismatch { expected: String, found: String },

    #[error("Hedge error: {0}")]
    Hedge(HedgeError),

    #[error("Liquidation error: {0}")]
    Liquidation(#[from] LiquidationError),
}

impl From<HedgeError> for SandboxError {
    fn from(err: HedgeError) -> Self {
        match err {
            HedgeError::Ambiguous { size } => SandboxError::HedgeAmbiguous { size },
            other => SandboxError::Hedge(other),
        }
    }
}

impl SandboxError {
    pub fn kind(&self) -> SandboxErrorKind {
        match self {
            SandboxError::InsufficientAvailableBalance { .. } => {
                SandboxErrorKind::InsufficientAvailableBalance
            }
            SandboxError::NoPositionToClose(_) => SandboxErrorKind::NoPositionToClose,
            SandboxError::CloseVolumeExceedsPosition { .. } => {
                SandboxErrorKind::CloseVolumeExceedsPosition
            }
            SandboxError::InvalidVolume(_) => SandboxErrorKind::InvalidVolume,
            SandboxError::HedgeAmbiguous { .. } => SandboxErrorKind::HedgeAmbiguous,
            SandboxError::DuplicateSide(_)
            | SandboxError::SymbolMismatch { .. }
            | SandboxError::Hedge(_)
            | SandboxError::Liquidation(_) => SandboxErrorKind::InvalidState,
        }
    }
}
