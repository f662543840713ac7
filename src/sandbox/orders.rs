//! Order application.
//!
//! Orders are applied one at a time against a working copy of the state. The
//! copy is committed only when the order (and the recomputation that follows
//! it) succeeds, so a failing order leaves every earlier order applied and
//! nothing of itself.

use super::core::TradingSandbox;
use super::positions::LedgerMark;
use super::results::SandboxError;
use super::state::SandboxState;
use crate::events::{
    OrderAppliedEvent, OrderToleratedEvent, PositionClosedEvent, PositionOpenedEvent,
    SandboxEventPayload,
};
use crate::margin::{calculate_close_cost, calculate_order_cost};
use crate::position::{increase_position, reduce_position, Position};
use crate::types::{CoinAmount, Price, Side};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// A simulated instruction. Stops are treated as immediate closes at their price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SandboxOrder {
    Buy { side: Side, volume: Decimal, price: Price },
    Close { side: Side, volume: Decimal, price: Price },
    Stop { side: Side, volume: Decimal, price: Price },
}

impl SandboxOrder {
    pub fn buy(side: Side, volume: Decimal, price: Price) -> Self {
        SandboxOrder::Buy { side, volume, price }
    }

    pub fn close(side: Side, volume: Decimal, price: Price) -> Self {
        SandboxOrder::Close { side, volume, price }
    }

    pub fn stop(side: Side, volume: Decimal, price: Price) -> Self {
        SandboxOrder::Stop { side, volume, price }
    }

    pub fn side(&self) -> Side {
        match self {
            SandboxOrder::Buy { side, .. }
            | SandboxOrder::Close { side, .. }
            | SandboxOrder::Stop { side, .. } => *side,
        }
    }

    pub fn volume(&self) -> Decimal {
        match self {
            SandboxOrder::Buy { volume, .. }
            | SandboxOrder::Close { volume, .. }
            | SandboxOrder::Stop { volume, .. } => *volume,
        }
    }

    pub fn price(&self) -> Price {
        match self {
            SandboxOrder::Buy { price, .. }
            | SandboxOrder::Close { price, .. }
            | SandboxOrder::Stop { price, .. } => *price,
        }
    }
}

/// What one order did to the working state.
#[derive(Debug, Default)]
pub(super) struct OrderEffect {
    realized_pnl: CoinAmount,
    fee: CoinAmount,
    tolerated: Option<SandboxError>,
    opened: Option<PositionOpenedEvent>,
    closed: Option<PositionClosedEvent>,
}

impl TradingSandbox {
    /// Apply `orders` in sequence. Stops at the first error that is not tolerated.
    pub fn process_orders<I>(&mut self, orders: I) -> Result<(), SandboxError>
    where
        I: IntoIterator<Item = SandboxOrder>,
    {
        for order in orders {
            self.process_order(order)?;
        }
        Ok(())
    }

    pub fn process_order(&mut self, order: SandboxOrder) -> Result<(), SandboxError> {
        if order.volume() <= Decimal::ZERO {
            return Err(SandboxError::InvalidVolume(order.volume()));
        }

        let before = LedgerMark::of(&self.state);
        let mut next = self.state.clone();

        let effect = match &order {
            SandboxOrder::Buy { side, volume, price } => {
                self.apply_buy(&mut next, *side, *volume, *price)?
            }
            SandboxOrder::Close { side, volume, price }
            | SandboxOrder::Stop { side, volume, price } => {
                self.apply_close(&mut next, *side, *volume, *price)?
            }
        };

        self.recompute_derived(&mut next, &before)?;
        self.state = next;

        debug!(
            ?order,
            available = %self.state.balance.available,
            free_for_liquidation = %self.state.balance.free_for_liquidation,
            "sandbox order applied"
        );

        self.record_effect(order, effect);
        Ok(())
    }

    // 8.2: buy adds to (or opens) the side's leg at the leg's own leverage
    fn apply_buy(
        &self,
        next: &mut SandboxState,
        side: Side,
        volume: Decimal,
        price: Price,
    ) -> Result<OrderEffect, SandboxError> {
        let existing = next.position(side).cloned();
        let leverage = existing
            .as_ref()
            .map(|p| p.leverage)
            .unwrap_or(self.config.default_leverage);
        let cost = calculate_order_cost(volume, price, leverage, self.fees.taker_fee);

        let mut effect = OrderEffect {
            fee: cost.fee,
            ..OrderEffect::default()
        };

        if !next.balance.can_afford(cost.total()) {
            let err = SandboxError::InsufficientAvailableBalance {
                required: cost.total(),
                available: next.balance.available,
            };
            if !self.is_tolerated(&err) {
                return Err(err);
            }
            effect.tolerated = Some(err);
        }

        next.balance.reserve_for_open(cost.margin, cost.fee);

        let position = match existing {
            Some(position) => increase_position(&position, volume, price, cost.margin),
            None => {
                let opened = Position::open(side, next.symbol.clone(), price, volume, leverage)
                    .map_err(|_| SandboxError::InvalidVolume(volume))?;
                effect.opened = Some(PositionOpenedEvent {
                    side,
                    size: volume,
                    entry_price: price,
                });
                opened
            }
        };
        next.set_position(side, Some(position));

        Ok(effect)
    }

    // 8.3: close and stop reduce the side's leg; full closes drop it from the state
    fn apply_close(
        &self,
        next: &mut SandboxState,
        side: Side,
        volume: Decimal,
        price: Price,
    ) -> Result<OrderEffect, SandboxError> {
        let Some(position) = next.position(side).cloned() else {
            let err = SandboxError::NoPositionToClose(side);
            if !self.is_tolerated(&err) {
                return Err(err);
            }
            return Ok(OrderEffect {
                tolerated: Some(err),
                ..OrderEffect::default()
            });
        };

        let mut tolerated = None;
        if volume > position.size {
            let err = SandboxError::CloseVolumeExceedsPosition {
                side,
                volume,
                size: position.size,
            };
            if !self.is_tolerated(&err) {
                return Err(err);
            }
            tolerated = Some(err);
        }

        let update = reduce_position(&position, volume, price);
        let cost = calculate_close_cost(update.closed_volume, price, self.fees.taker_fee);
        next.balance
            .settle_close(update.margin_released, update.realized_pnl, cost.fee);

        let closed = update.new_position.is_none().then(|| PositionClosedEvent {
            side,
            exit_price: price,
            realized_pnl: update.realized_pnl,
        });
        next.set_position(side, update.new_position);

        Ok(OrderEffect {
            realized_pnl: update.realized_pnl,
            fee: cost.fee,
            tolerated,
            opened: None,
            closed,
        })
    }

    fn record_effect(&mut self, order: SandboxOrder, effect: OrderEffect) {
        if let Some(err) = effect.tolerated {
            warn!(?order, error = %err, "sandbox tolerated order error");
            self.emit_event(SandboxEventPayload::OrderTolerated(OrderToleratedEvent {
                order: order.clone(),
                kind: err.kind(),
                reason: err.to_string(),
            }));
        }
        if let Some(opened) = effect.opened {
            self.emit_event(SandboxEventPayload::PositionOpened(opened));
        }
        if let Some(closed) = effect.closed {
            self.emit_event(SandboxEventPayload::PositionClosed(closed));
        }

        let liquidation_price_after = self
            .state
            .main_position()
            .and_then(|p| p.liquidation_price);
        let balance_after = self.state.balance.clone();
        self.emit_event(SandboxEventPayload::OrderApplied(OrderAppliedEvent {
            order,
            realized_pnl: effect.realized_pnl,
            fee: effect.fee,
            balance_after,
            liquidation_price_after,
        }));
    }
}
