// 11.0: every sandbox step produces an event. what-if tooling reads these to show how a
// projected state was reached. the SandboxEventPayload enum lists all event kinds.

use crate::account::ContractBalance;
use crate::sandbox::{SandboxErrorKind, SandboxOrder};
use crate::types::{CoinAmount, Price, Side};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StepId(pub u64);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SandboxEvent {
    pub id: StepId,
    pub payload: SandboxEventPayload,
}

impl SandboxEvent {
    pub fn new(id: StepId, payload: SandboxEventPayload) -> Self {
        Self { id, payload }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SandboxEventPayload {
    // Order events
    OrderApplied(OrderAppliedEvent),
    OrderTolerated(OrderToleratedEvent),

    // Position events
    PositionOpened(PositionOpenedEvent),
    PositionClosed(PositionClosedEvent),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAppliedEvent {
    pub order: SandboxOrder,
    pub realized_pnl: CoinAmount,
    pub fee: CoinAmount,
    pub balance_after: ContractBalance,
    pub liquidation_price_after: Option<Price>,
}

// the order broke a tolerated rule and was applied notionally anyway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderToleratedEvent {
    pub order: SandboxOrder,
    pub kind: SandboxErrorKind,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionOpenedEvent {
    pub side: Side,
    pub size: Decimal,
    pub entry_price: Price,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionClosedEvent {
    pub side: Side,
    pub exit_price: Price,
    pub realized_pnl: CoinAmount,
}

impl SandboxEventPayload {
    pub fn is_tolerated(&self) -> bool {
        matches!(self, SandboxEventPayload::OrderTolerated(_))
    }

    pub fn order(&self) -> Option<&SandboxOrder> {
        match self {
            SandboxEventPayload::OrderApplied(e) => Some(&e.order),
            SandboxEventPayload::OrderTolerated(e) => Some(&e.order),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn payload_accessors() {
        let order = SandboxOrder::close(Side::Short, dec!(0.1), Price::new_unchecked(dec!(30000)));
        let tolerated = SandboxEventPayload::OrderTolerated(OrderToleratedEvent {
            order: order.clone(),
            kind: SandboxErrorKind::CloseVolumeExceedsPosition,
            reason: "test".to_string(),
        });
        assert!(tolerated.is_tolerated());
        assert_eq!(tolerated.order(), Some(&order));

        let opened = SandboxEventPayload::PositionOpened(PositionOpenedEvent {
            side: Side::Long,
            size: dec!(1),
            entry_price: Price::new_unchecked(dec!(30000)),
        });
        assert!(!opened.is_tolerated());
        assert!(opened.order().is_none());
    }

    #[test]
    fn event_serialization() {
        let event = SandboxEvent::new(
            StepId(7),
            SandboxEventPayload::PositionClosed(PositionClosedEvent {
                side: Side::Short,
                exit_price: Price::new_unchecked(dec!(30800)),
                realized_pnl: CoinAmount::new(dec!(-533.6)),
            }),
        );
        let json = serde_json::to_string(&event).unwrap();
        let back: SandboxEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
