// 7.0 config.rs: all tunables in one place. fees, sandbox defaults, solver search params.
// 7.1 solver constants are empirical. step_damping_divisor in particular awaits recalibration
// against real exchange fee/funding data.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::types::{Leverage, Percent};

/** 7.2: fee settings. taker fee applies to every simulated fill */
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeConfig {
    // Taker fee (market orders, stops)
    pub taker_fee: Percent,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            taker_fee: Percent::new(dec!(0.055)),
        }
    }
}

// Sandbox defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxConfig {
    // Leverage for positions the sandbox opens from nothing
    pub default_leverage: Leverage,
    // Maximum number of executed steps kept in the step log
    pub max_recorded_steps: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            default_leverage: Leverage::new(dec!(100)).unwrap(),
            max_recorded_steps: 1_000,
        }
    }
}

// Liquidation-target search parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolverConfig {
    // Acceptable |achieved - wished| as a fraction of entry price
    pub tolerance_fraction: Decimal,
    // Lower bound of the refinement iteration budget
    pub min_iterations: u32,
    // Upper bound of the refinement iteration budget
    pub max_iterations: u32,
    // Initial step is scaled by error_distance / step_damping_divisor (capped at 1)
    pub step_damping_divisor: Decimal,
    // Step shrink factor after an overshoot
    pub overshoot_step_divisor: Decimal,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tolerance_fraction: dec!(0.0004),
            min_iterations: 10,
            max_iterations: 50,
            step_damping_divisor: dec!(1000),
            overshoot_step_divisor: dec!(1.5),
        }
    }
}

// The complete core configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CoreConfig {
    pub fees: FeeConfig,
    pub sandbox: SandboxConfig,
    pub solver: SolverConfig,
}

impl CoreConfig {
    // Preset for testnet: no fees, so simulations isolate pure margin math
    pub fn testnet() -> Self {
        let mut config = Self::default();
        config.fees.taker_fee = Percent::zero();
        config
    }

    // Preset with a tighter tolerance and the full iteration budget
    pub fn precise() -> Self {
        let mut config = Self::default();
        config.solver.tolerance_fraction = dec!(0.0001);
        config.solver.min_iterations = 50;
        config
    }

    // Validate the configuration for internal consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fees.taker_fee.is_negative() || self.fees.taker_fee.value() > dec!(1) {
            return Err(ConfigError::InvalidFees {
                reason: "Taker fee must be within 0%..1%".to_string(),
            });
        }

        if self.sandbox.max_recorded_steps == 0 {
            return Err(ConfigError::InvalidSandbox {
                reason: "Step log must keep at least one step".to_string(),
            });
        }

        let solver = &self.solver;
        if solver.tolerance_fraction <= Decimal::ZERO {
            return Err(ConfigError::InvalidSolver {
                reason: "Tolerance must be positive".to_string(),
            });
        }
        if solver.min_iterations == 0 || solver.min_iterations > solver.max_iterations {
            return Err(ConfigError::InvalidSolver {
                reason: "Iteration bounds must satisfy 0 < min <= max".to_string(),
            });
        }
        if solver.step_damping_divisor <= Decimal::ZERO {
            return Err(ConfigError::InvalidSolver {
                reason: "Step damping divisor must be positive".to_string(),
            });
        }
        if solver.overshoot_step_divisor <= Decimal::ONE {
            return Err(ConfigError::InvalidSolver {
                reason: "Overshoot divisor must shrink the step (> 1)".to_string(),
            });
        }

        Ok(())
    }
}

// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid fees: {reason}")]
    InvalidFees { reason: String },

    #[error("Invalid sandbox config: {reason}")]
    InvalidSandbox { reason: String },

    #[error("Invalid solver config: {reason}")]
    InvalidSolver { reason: String },
}

// Environment presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Development,
    Testnet,
    Mainnet,
}

impl Environment {
    pub fn config(&self) -> CoreConfig {
        match self {
            Environment::Development => CoreConfig::default(),
            Environment::Testnet => CoreConfig::testnet(),
            Environment::Mainnet => CoreConfig::precise(),
        }
    }
}
