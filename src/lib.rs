// hedge-core: margin and liquidation math for hedged perpetual futures.
// risk-first: every operation answers "where does the main leg liquidate".
// all computation is deterministic with no external I/O.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: Side, Price, Percent, CoinAmount, Leverage
//   2.x  market.rs: symbol metadata, rounding grid, ticker snapshots
//   3.x  margin.rs: order cost (initial margin + taker fee)
//   4.x  position.rs: position struct, PnL, increase/reduce
//   5.x  hedge.rs: main/support classification of opposite legs
//   6.x  liquidation.rs: forward and inverse liquidation estimators
//   7.x  config.rs: fees, sandbox defaults, solver params, env presets
//   8.x  sandbox/: what-if simulator: orders, ledger, recomputation
//   9.x  solver/: volume to close for a wished liquidation price
//   10.x account.rs: contract balance ledger
//   11.x events.rs: sandbox step log

// core value modules
pub mod account;
pub mod hedge;
pub mod liquidation;
pub mod margin;
pub mod market;
pub mod position;
pub mod types;

// simulation modules
pub mod config;
pub mod events;
pub mod sandbox;
pub mod solver;

// re exports for convenience
pub use account::*;
pub use config::*;
pub use events::*;
pub use hedge::*;
pub use liquidation::*;
pub use margin::*;
pub use market::*;
pub use position::*;
pub use sandbox::*;
pub use solver::*;
pub use types::*;
