//! Derived values recomputed after every order.

use super::core::TradingSandbox;
use super::results::SandboxError;
use super::state::SandboxState;
use crate::hedge::is_support;
use crate::liquidation::estimate_liquidation_price;
use crate::types::{CoinAmount, Side};

/// Ledger readings taken before an order, used to move `free_for_liquidation`.
#[derive(Debug, Clone, Copy)]
pub(super) struct LedgerMark {
    available: CoinAmount,
    main_margin: CoinAmount,
}

impl LedgerMark {
    pub(super) fn of(state: &SandboxState) -> Self {
        Self {
            available: state.balance.available,
            main_margin: main_margin(state),
        }
    }
}

fn main_margin(state: &SandboxState) -> CoinAmount {
    state
        .main_position()
        .map(|p| p.initial_margin)
        .unwrap_or_default()
}

impl TradingSandbox {
    // 8.4: hedge roles, liquidation reserve, pnl and liquidation prices, in that order
    pub(super) fn recompute_derived(
        &self,
        next: &mut SandboxState,
        before: &LedgerMark,
    ) -> Result<(), SandboxError> {
        let pair = next.hedge_pair()?;

        // margin moving into the main leg stays reachable for its liquidation
        let delta = next
            .balance
            .available
            .sub(before.available)
            .add(main_margin(next).sub(before.main_margin));
        next.balance.shift_free_for_liquidation(delta);

        let mark = next.ticker.mark_price;
        for side in [Side::Long, Side::Short] {
            if let Some(position) = next.position_mut(side) {
                position.unrealized_pnl = position.pnl_at(mark);
            }
        }

        let support_profit = pair
            .and_then(|p| next.position(p.support_side))
            .map(|p| p.unrealized_pnl)
            .filter(|pnl| pnl.is_positive())
            .unwrap_or_default();
        let funds = next
            .balance
            .free_for_liquidation
            .max(CoinAmount::zero())
            .add(support_profit);

        for side in [Side::Long, Side::Short] {
            let Some(position) = next.position(side) else {
                continue;
            };
            let liquidation_price = match pair {
                Some(p) if is_support(&p, side) => None,
                _ => estimate_liquidation_price(position, next.position(side.opposite()), funds)?,
            };
            if let Some(position) = next.position_mut(side) {
                position.liquidation_price = liquidation_price;
            }
        }

        Ok(())
    }
}
