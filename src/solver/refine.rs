// 9.1: iterative refinement. works on a lightweight copy of the main leg instead of
// a full sandbox, so each probe is one closed-form liquidation estimate.
// distances are measured as reach: how far the liquidation sits from entry in the
// losing direction. positive gap = not far enough yet.

use crate::config::SolverConfig;
use crate::liquidation::{liquidation_price_for, maintenance_margin_distance, LiquidationError};
use crate::margin::order_fee;
use crate::position::calculate_unrealized_pnl;
use crate::types::{floor_to_precision, CoinAmount, Percent, Price, Side};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::debug;

/// Inputs that stay fixed for a whole refinement run.
#[derive(Debug, Clone)]
pub(super) struct RefineContext {
    pub side: Side,
    pub wished: Price,
    pub current_price: Price,
    pub entry: Price,
    pub original_size: Decimal,
    // free balance for liquidation before any close
    pub original_funds: CoinAmount,
    pub support_size: Decimal,
    pub support_profit: CoinAmount,
    pub maintenance_margin_rate: Percent,
    pub price_precision: u32,
    pub volume_precision: u32,
    // smallest volume an order may carry or move by
    pub min_step: Decimal,
    pub fee_rate: Percent,
    pub tolerance: Decimal,
}

/** 9.2: the main leg after one close of `closed` at the current price */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct SimulatedLeg {
    pub closed: Decimal,
    pub size: Decimal,
    // free balance for liquidation, before flooring at zero
    pub funds: CoinAmount,
}

impl SimulatedLeg {
    // a close keeps entry and the released margin cancels out of the reserve,
    // so the leg depends on the total closed volume alone
    pub(super) fn after_closing(closed: Decimal, ctx: &RefineContext) -> Option<Self> {
        let size = ctx.original_size - closed;
        if closed < Decimal::ZERO || (closed > Decimal::ZERO && closed < ctx.min_step) {
            return None;
        }
        if size - ctx.support_size < ctx.min_step {
            return None;
        }
        let pnl = calculate_unrealized_pnl(ctx.side, closed, ctx.entry, ctx.current_price);
        let fee = order_fee(closed, ctx.current_price, ctx.fee_rate);
        Some(Self {
            closed,
            size,
            funds: ctx.original_funds.add(pnl).sub(fee),
        })
    }

    fn close_more(&self, step: Decimal, ctx: &RefineContext) -> Option<Self> {
        Self::after_closing(self.closed + step, ctx)
    }

    fn close_less(&self, step: Decimal, ctx: &RefineContext) -> Option<Self> {
        Self::after_closing(self.closed - step, ctx)
    }

    pub(super) fn liquidation(&self, ctx: &RefineContext) -> Result<Option<Price>, LiquidationError> {
        let funds = self.funds.max(CoinAmount::zero()).add(ctx.support_profit);
        liquidation_price_for(
            ctx.side,
            ctx.entry,
            self.size - ctx.support_size,
            funds,
            ctx.maintenance_margin_rate,
            ctx.price_precision,
        )
    }
}

/// Signed reach still missing: wished reach minus achieved reach.
pub(super) fn reach_gap(side: Side, achieved: Price, wished: Price) -> Decimal {
    -side.sign() * (wished.value() - achieved.value())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    CloseMore,
    CloseLess,
}

impl Direction {
    fn of(gap: Decimal) -> Self {
        if gap > Decimal::ZERO {
            Direction::CloseMore
        } else {
            Direction::CloseLess
        }
    }
}

/// One evaluated leg.
#[derive(Debug, Clone, Copy)]
pub(super) struct Probe {
    pub leg: SimulatedLeg,
    pub liquidation: Price,
    pub gap: Decimal,
}

impl Probe {
    pub(super) fn new(leg: SimulatedLeg, liquidation: Price, ctx: &RefineContext) -> Self {
        Self {
            leg,
            liquidation,
            gap: reach_gap(ctx.side, liquidation, ctx.wished),
        }
    }

    fn within_tolerance(&self, ctx: &RefineContext) -> bool {
        self.gap.abs() <= ctx.tolerance
    }

    fn flipped_from(&self, direction: Direction) -> bool {
        Direction::of(self.gap) != direction && !self.gap.is_zero()
    }

    // None when the move is impossible: uncovered size exhausted, closed volume off the order grid, or unreachable liquidation
    fn advance(
        &self,
        direction: Direction,
        step: Decimal,
        ctx: &RefineContext,
    ) -> Result<Option<Probe>, LiquidationError> {
        let leg = match direction {
            Direction::CloseMore => self.leg.close_more(step, ctx),
            Direction::CloseLess => self.leg.close_less(step, ctx),
        };
        let Some(leg) = leg else {
            return Ok(None);
        };
        Ok(leg.liquidation(ctx)?.map(|liq| Probe::new(leg, liq, ctx)))
    }
}

/// Loop state threaded through every iteration.
#[derive(Debug, Clone, Copy)]
struct Cursor {
    current: Probe,
    previous: Option<Probe>,
    step: Decimal,
}

#[derive(Debug, Clone, Copy)]
pub(super) struct Refinement {
    pub best: Probe,
    pub iterations: u32,
    pub budget: u32,
    pub converged: bool,
}

/// Step size and iteration budget derived from the starting error.
fn plan(start: &Probe, ctx: &RefineContext, config: &SolverConfig) -> Option<(Decimal, u32)> {
    let error = start.gap.abs();
    let uncovered = start.leg.size - ctx.support_size;
    let reach_room = ctx.wished.differ_with(ctx.entry)
        - maintenance_margin_distance(ctx.entry, ctx.maintenance_margin_rate);
    if error.is_zero() || uncovered <= Decimal::ZERO || reach_room <= Decimal::ZERO {
        return None;
    }

    let volume_budget = uncovered * error / reach_room;
    let damping = (error / config.step_damping_divisor).min(Decimal::ONE);
    let raw_step = volume_budget * damping;
    if raw_step <= Decimal::ZERO {
        return None;
    }

    let mut iterations = (volume_budget / raw_step)
        .ceil()
        .to_u32()
        .unwrap_or(config.max_iterations)
        .max(config.min_iterations)
        .min(config.max_iterations);

    let mut step = floor_to_precision(raw_step, ctx.volume_precision);
    if step < ctx.min_step {
        step = ctx.min_step;
        let affordable = (volume_budget / ctx.min_step)
            .floor()
            .to_u32()
            .unwrap_or(u32::MAX)
            .max(1);
        iterations = iterations.min(affordable);
    }

    Some((step, iterations))
}

fn shrink(step: Decimal, ctx: &RefineContext, config: &SolverConfig) -> Decimal {
    floor_to_precision(step / config.overshoot_step_divisor, ctx.volume_precision).max(ctx.min_step)
}

pub(super) fn refine(
    start: Probe,
    ctx: &RefineContext,
    config: &SolverConfig,
) -> Result<Refinement, LiquidationError> {
    let Some((step, budget)) = plan(&start, ctx, config) else {
        return Ok(Refinement {
            best: start,
            iterations: 0,
            budget: 0,
            converged: false,
        });
    };

    let direction = Direction::of(start.gap);
    let mut cursor = Cursor {
        current: start,
        previous: None,
        step,
    };
    let mut best = start;
    let mut iterations = 0;
    let mut converged = false;

    while iterations < budget {
        iterations += 1;

        let candidate = cursor.current.advance(direction, cursor.step, ctx)?;
        cursor = match candidate {
            Some(probe) if probe.within_tolerance(ctx) || !probe.flipped_from(direction) => Cursor {
                current: probe,
                previous: Some(cursor.current),
                step: cursor.step,
            },
            _ => Cursor {
                step: shrink(cursor.step, ctx, config),
                ..cursor
            },
        };

        if cursor.current.gap.abs() < best.gap.abs() {
            best = cursor.current;
        }

        debug!(
            iteration = iterations,
            ?direction,
            step = %cursor.step,
            size = %cursor.current.leg.size,
            liquidation = %cursor.current.liquidation,
            gap = %cursor.current.gap,
            previous_gap = ?cursor.previous.map(|p| p.gap),
            "refinement step"
        );

        if best.within_tolerance(ctx) {
            converged = true;
            break;
        }
    }

    Ok(Refinement {
        best,
        iterations,
        budget,
        converged,
    })
}
