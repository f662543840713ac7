//! Liquidation-target volume solver.
//!
//! Given a position at risk and a wished liquidation price further out in the
//! losing direction, finds how much of the position to close so the
//! liquidation price lands within tolerance of the wish. The search runs in
//! three stages:
//!
//! 1. an analytic estimate from the inverse liquidation formula,
//! 2. a sandbox simulation of closing that volume at the current price, which
//!    accounts for realized pnl and fees eating into the liquidation reserve,
//! 3. a bounded step search on a lightweight copy of the leg.
//!
//! Failing to converge is not an error: the closest result is returned with
//! `converged == false`.

mod refine;

use self::refine::{reach_gap, refine, Probe, RefineContext, SimulatedLeg};
use crate::account::ContractBalance;
use crate::config::CoreConfig;
use crate::hedge::{is_support, HedgeError, HedgePair};
use crate::liquidation::{estimate_liquidation_price, not_covered_size_for, LiquidationError};
use crate::market::Ticker;
use crate::position::Position;
use crate::sandbox::{SandboxError, SandboxOrder, SandboxState, TradingSandbox};
use crate::types::{CoinAmount, Price, Side};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationTargetRequest {
    pub position: Position,
    pub opposite: Option<Position>,
    pub contract_balance: ContractBalance,
    pub funds_for_liquidation: CoinAmount,
    pub wished_liquidation_price: Price,
    pub current_price: Price,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeSolution {
    /// Size the position would keep
    pub result_volume: Decimal,
    /// Volume to close, a multiple of the symbol's volume step
    pub diff: Decimal,
    pub achieved_liquidation_price: Option<Price>,
    pub iterations: u32,
    pub iteration_budget: u32,
    pub converged: bool,
}

impl VolumeSolution {
    /// The close order a caller would place for this solution.
    pub fn close_order(&self, side: Side, price: Price) -> Option<SandboxOrder> {
        (self.diff > Decimal::ZERO).then(|| SandboxOrder::close(side, self.diff, price))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SolverError {
    #[error("support position cannot be under liquidation")]
    SupportPositionCannotBeUnderLiquidation,

    #[error("{side} position has no liquidation price")]
    PositionHasNoLiquidationPrice { side: Side },

    #[error("wished liquidation price {wished} must lie beyond current liquidation price {current}")]
    WishedPriceNotBeyondCurrentLiquidation { wished: Price, current: Price },

    #[error("wished liquidation price {wished} must be placed before current asset price {current_price}")]
    WishedPriceMustBePlacedBeforeCurrentPrice { wished: Price, current_price: Price },

    #[error("Hedge error: {0}")]
    Hedge(#[from] HedgeError),

    #[error("Liquidation error: {0}")]
    Liquidation(#[from] LiquidationError),

    #[error("Sandbox error: {0}")]
    Sandbox(#[from] SandboxError),
}

#[derive(Debug, Clone, Default)]
pub struct LiquidationTargetSolver {
    config: CoreConfig,
}

impl LiquidationTargetSolver {
    pub fn new(config: CoreConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn solve(&self, request: &LiquidationTargetRequest) -> Result<VolumeSolution, SolverError> {
        let position = &request.position;
        let opposite = request.opposite.as_ref();
        let side = position.side;
        let symbol = &position.symbol;
        let wished = request.wished_liquidation_price;
        let funds = request.funds_for_liquidation;

        self.check_preconditions(request)?;

        // stage 1: analytic estimate
        let support_size = opposite.map(|o| o.size).unwrap_or_default();
        let target_uncovered = not_covered_size_for(
            side,
            position.entry_price,
            wished,
            funds,
            symbol.maintenance_margin_rate,
        )?;
        let result_size = symbol.floor_volume(target_uncovered + support_size);
        let min_step = symbol.min_volume_step();
        // leave at least one step uncovered, otherwise the leg has no liquidation at all
        let max_diff = symbol
            .floor_volume(position.size - support_size - min_step)
            .max(Decimal::ZERO);
        let mut diff = symbol
            .floor_volume(position.size - result_size)
            .max(Decimal::ZERO)
            .min(max_diff);
        if diff < min_step {
            diff = Decimal::ZERO;
        }

        debug!(%side, %wished, %target_uncovered, %diff, "analytic close volume");

        let support_profit = opposite
            .map(|o| o.pnl_at(request.current_price))
            .filter(|pnl| pnl.is_positive())
            .unwrap_or_default();
        let ctx = RefineContext {
            side,
            wished,
            current_price: request.current_price,
            entry: position.entry_price,
            original_size: position.size,
            original_funds: funds,
            support_size,
            support_profit,
            maintenance_margin_rate: symbol.maintenance_margin_rate,
            price_precision: symbol.price_precision,
            volume_precision: symbol.volume_precision,
            min_step,
            fee_rate: self.config.fees.taker_fee,
            tolerance: self.config.solver.tolerance_fraction * position.entry_price.value(),
        };

        // stage 2: simulate the close
        let achieved = self.simulate_close(request, diff, &ctx)?;
        let leg = SimulatedLeg::after_closing(diff, &ctx);
        let (Some(leg), Some(achieved)) = (leg, achieved) else {
            warn!(%side, %diff, "simulated leg has no reachable liquidation price");
            return Ok(VolumeSolution {
                result_volume: position.size - diff,
                diff,
                achieved_liquidation_price: achieved,
                iterations: 0,
                iteration_budget: 0,
                converged: false,
            });
        };
        let start = Probe::new(leg, achieved, &ctx);

        // stage 3: refine unless the simulation already landed
        let solution = if start.gap.abs() <= ctx.tolerance {
            VolumeSolution {
                result_volume: leg.size,
                diff,
                achieved_liquidation_price: Some(achieved),
                iterations: 0,
                iteration_budget: 0,
                converged: true,
            }
        } else {
            let refinement = refine(start, &ctx, &self.config.solver)?;
            let best = refinement.best;
            // the reported price is what the single close order actually produces
            let replayed = self.simulate_close(request, best.leg.closed, &ctx)?;
            let converged = replayed
                .map(|liq| reach_gap(side, liq, wished).abs() <= ctx.tolerance)
                .unwrap_or(false);
            if replayed != Some(best.liquidation) {
                warn!(
                    %side,
                    refined = %best.liquidation,
                    replayed = ?replayed,
                    "refined leg and replayed close disagree"
                );
            }
            VolumeSolution {
                result_volume: best.leg.size,
                diff: best.leg.closed,
                achieved_liquidation_price: replayed,
                iterations: refinement.iterations,
                iteration_budget: refinement.budget,
                converged,
            }
        };

        if !solution.converged {
            warn!(
                %side,
                %wished,
                achieved = ?solution.achieved_liquidation_price,
                iterations = solution.iterations,
                "liquidation target not reached within budget"
            );
        }
        info!(
            %side,
            %wished,
            diff = %solution.diff,
            achieved = ?solution.achieved_liquidation_price,
            iterations = solution.iterations,
            converged = solution.converged,
            "liquidation target solved"
        );

        Ok(solution)
    }

    fn check_preconditions(&self, request: &LiquidationTargetRequest) -> Result<(), SolverError> {
        let position = &request.position;
        let opposite = request.opposite.as_ref();
        let side = position.side;
        let wished = request.wished_liquidation_price;

        if let Some(other) = opposite {
            let pair = HedgePair::classify(position, other)?;
            if is_support(&pair, side) {
                return Err(SolverError::SupportPositionCannotBeUnderLiquidation);
            }
        }

        let current = match position.liquidation_price {
            Some(liq) => liq,
            None => estimate_liquidation_price(position, opposite, request.funds_for_liquidation)?
                .ok_or(SolverError::PositionHasNoLiquidationPrice { side })?,
        };
        if !wished.is_beyond(current, side) {
            return Err(SolverError::WishedPriceNotBeyondCurrentLiquidation { wished, current });
        }

        if !wished.is_beyond(request.current_price, side) {
            return Err(SolverError::WishedPriceMustBePlacedBeforeCurrentPrice {
                wished,
                current_price: request.current_price,
            });
        }

        Ok(())
    }

    // main-leg liquidation after a single Close(diff) at the current price
    fn simulate_close(
        &self,
        request: &LiquidationTargetRequest,
        diff: Decimal,
        ctx: &RefineContext,
    ) -> Result<Option<Price>, SolverError> {
        if diff.is_zero() {
            return match SimulatedLeg::after_closing(diff, ctx) {
                Some(leg) => Ok(leg.liquidation(ctx)?),
                None => Ok(None),
            };
        }

        let position = &request.position;
        let side = position.side;
        let symbol = position.symbol.clone();
        let ticker = Ticker::flat(&symbol, request.current_price);
        let balance = request
            .contract_balance
            .with_free_for_liquidation(request.funds_for_liquidation);
        let positions = std::iter::once(position.clone()).chain(request.opposite.iter().cloned());

        let state = SandboxState::new(symbol, ticker, balance, positions)?;
        let mut sandbox = TradingSandbox::new(&self.config, state);
        sandbox.process_orders([SandboxOrder::close(side, diff, request.current_price)])?;

        Ok(sandbox.position(side).and_then(|main| main.liquidation_price))
    }
}

/// Solve with an explicit configuration.
pub fn solve_liquidation_target(
    request: &LiquidationTargetRequest,
    config: &CoreConfig,
) -> Result<VolumeSolution, SolverError> {
    LiquidationTargetSolver::new(config.clone()).solve(request)
}
