// 8.0 sandbox/core.rs: what-if simulator. owns one state snapshot and a step log.

use super::results::{SandboxError, SandboxErrorKind};
use super::state::SandboxState;
use crate::config::{CoreConfig, FeeConfig, SandboxConfig};
use crate::events::{SandboxEvent, SandboxEventPayload, StepId};
use crate::position::Position;
use crate::types::{CoinAmount, Side};
use std::fmt;
use std::sync::Arc;

/// Decides which error kinds the sandbox absorbs instead of failing.
pub type TolerancePredicate = Arc<dyn Fn(SandboxErrorKind) -> bool + Send + Sync>;

/** 8.1: sandbox struct. every order mutates `state` in place */
pub struct TradingSandbox {
    pub(super) config: SandboxConfig,
    pub(super) fees: FeeConfig,
    pub(super) state: SandboxState,
    pub(super) tolerance: TolerancePredicate,
    pub(super) events: Vec<SandboxEvent>,
    pub(super) next_step_id: u64,
}

impl TradingSandbox {
    /// Strict sandbox: every error is reported.
    pub fn new(config: &CoreConfig, state: SandboxState) -> Self {
        Self {
            config: config.sandbox.clone(),
            fees: config.fees.clone(),
            state,
            tolerance: Arc::new(|_: SandboxErrorKind| false),
            events: Vec::new(),
            next_step_id: 1,
        }
    }

    pub fn with_tolerance<F>(mut self, predicate: F) -> Self
    where
        F: Fn(SandboxErrorKind) -> bool + Send + Sync + 'static,
    {
        self.tolerance = Arc::new(predicate);
        self
    }

    /// Tolerate exactly the listed kinds.
    pub fn ignoring(self, kinds: &[SandboxErrorKind]) -> Self {
        let kinds = kinds.to_vec();
        self.with_tolerance(move |kind| kinds.contains(&kind))
    }

    /// Replace the snapshot. The step log belongs to the old snapshot and is cleared.
    pub fn set_state(&mut self, state: SandboxState) {
        self.state = state;
        self.events.clear();
    }

    pub fn current_state(&self) -> SandboxState {
        self.state.clone()
    }

    pub fn state(&self) -> &SandboxState {
        &self.state
    }

    pub fn position(&self, side: Side) -> Option<&Position> {
        self.state.position(side)
    }

    pub fn free_balance_for_liquidation(&self) -> CoinAmount {
        self.state.balance.free_for_liquidation
    }

    pub fn executed_steps(&self) -> &[SandboxEvent] {
        &self.events
    }

    pub fn tolerated_events(&self) -> impl Iterator<Item = &SandboxEvent> {
        self.events.iter().filter(|e| e.payload.is_tolerated())
    }

    pub(super) fn is_tolerated(&self, err: &SandboxError) -> bool {
        let kind = err.kind();
        kind.can_be_tolerated() && (self.tolerance)(kind)
    }

    pub(super) fn emit_event(&mut self, payload: SandboxEventPayload) {
        let event = SandboxEvent::new(StepId(self.next_step_id), payload);
        self.next_step_id += 1;

        self.events.push(event);

        if self.events.len() > self.config.max_recorded_steps {
            let drain_count = self.events.len() - self.config.max_recorded_steps;
            self.events.drain(0..drain_count);
        }
    }
}

impl fmt::Debug for TradingSandbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TradingSandbox")
            .field("config", &self.config)
            .field("fees", &self.fees)
            .field("state", &self.state)
            .field("events", &self.events.len())
            .finish()
    }
}
