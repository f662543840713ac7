//! Hedge sandbox simulation.
//!
//! Walks through a what-if session on a hedged BTCUSDT account and then asks
//! the solver how much of the main leg to close for a wished liquidation price.

use hedge_core::*;
use rust_decimal_macros::dec;
use std::error::Error;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("hedge_core=info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();

    println!("Hedge Core Simulation");
    println!("BTCUSDT, Hedged Short, What-If and Liquidation Target\n");

    scenario_1_what_if_session()?;
    scenario_2_solve_liquidation_target()?;
    scenario_3_tolerated_orders()?;

    println!("\nAll simulations completed successfully.");
    Ok(())
}

fn price(value: rust_decimal::Decimal) -> Price {
    Price::new_unchecked(value)
}

fn hedged_state() -> Result<SandboxState, Box<dyn Error>> {
    let symbol = Symbol::btc_usdt();
    let leverage = Leverage::new(dec!(100)).ok_or("invalid leverage")?;
    let short = Position::open(Side::Short, symbol.clone(), price(dec!(30000)), dec!(1), leverage)?;
    let long = Position::open(Side::Long, symbol.clone(), price(dec!(29500)), dec!(0.3), leverage)?;
    let balance = ContractBalance::new(
        CoinAmount::new(dec!(5000)),
        CoinAmount::new(dec!(3800)),
        CoinAmount::new(dec!(1000)),
    )?;
    let ticker = Ticker::flat(&symbol, price(dec!(30200)));
    Ok(SandboxState::new(symbol, ticker, balance, [short, long])?)
}

fn print_state(state: &SandboxState) {
    println!(
        "    balance: total {} / available {} / free for liq {}",
        state.balance.total, state.balance.available, state.balance.free_for_liquidation
    );
    for position in state.positions() {
        let liq = position
            .liquidation_price
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "    {} {} @ {} (margin {}, upnl {}, liq {})",
            position.side, position.size, position.entry_price, position.initial_margin, position.unrealized_pnl, liq
        );
    }
}

/// Reducing the support leg and topping up the main leg.
fn scenario_1_what_if_session() -> Result<(), Box<dyn Error>> {
    println!("Scenario 1: What-If Session\n");

    let config = Environment::Development.config();
    config.validate()?;
    let mut sandbox = TradingSandbox::new(&config, hedged_state()?);

    println!("  Starting state (mark $30,200):");
    print_state(sandbox.state());

    sandbox.process_orders([
        SandboxOrder::close(Side::Long, dec!(0.1), price(dec!(30200))),
        SandboxOrder::buy(Side::Short, dec!(0.2), price(dec!(30200))),
    ])?;

    println!("\n  After closing 0.1 long and adding 0.2 short:");
    print_state(sandbox.state());

    if let Some(hedge) = sandbox.state().hedge() {
        println!(
            "    support rate {}, uncovered {}",
            hedge.support_rate(),
            hedge.not_covered_size()
        );
    }
    println!("    steps recorded: {}\n", sandbox.executed_steps().len());
    Ok(())
}

/// Solving for the close volume that pushes liquidation to $33,000.
fn scenario_2_solve_liquidation_target() -> Result<(), Box<dyn Error>> {
    println!("Scenario 2: Liquidation Target\n");

    let state = hedged_state()?;
    let position = state.position(Side::Short).cloned().ok_or("no short leg")?;
    let opposite = state.position(Side::Long).cloned();

    let request = LiquidationTargetRequest {
        position,
        opposite,
        contract_balance: state.balance.clone(),
        funds_for_liquidation: state.balance.free_for_liquidation,
        wished_liquidation_price: price(dec!(33000)),
        current_price: price(dec!(30200)),
    };

    let solver = LiquidationTargetSolver::new(Environment::Development.config());
    let solution = solver.solve(&request)?;

    println!("  Wished liquidation: $33,000");
    println!("  Close volume: {} (keeps {})", solution.diff, solution.result_volume);
    if let Some(achieved) = solution.achieved_liquidation_price {
        println!("  Achieved liquidation: ${}", achieved);
    }
    println!(
        "  Iterations: {}/{}, converged: {}\n",
        solution.iterations, solution.iteration_budget, solution.converged
    );

    let rejected = solver.solve(&LiquidationTargetRequest {
        wished_liquidation_price: price(dec!(30200)),
        ..request
    });
    if let Err(err) = rejected {
        println!("  Wished at market price rejected: {}\n", err);
    }
    Ok(())
}

/// Orders a strict sandbox would refuse, absorbed by a tolerance predicate.
fn scenario_3_tolerated_orders() -> Result<(), Box<dyn Error>> {
    println!("Scenario 3: Tolerated Orders\n");

    let config = Environment::Testnet.config();
    let mut sandbox = TradingSandbox::new(&config, hedged_state()?).ignoring(&[
        SandboxErrorKind::CloseVolumeExceedsPosition,
        SandboxErrorKind::InsufficientAvailableBalance,
    ]);

    sandbox.process_orders([
        SandboxOrder::stop(Side::Long, dec!(5), price(dec!(29800))),
        SandboxOrder::buy(Side::Short, dec!(20), price(dec!(30200))),
    ])?;

    for event in sandbox.tolerated_events() {
        if let SandboxEventPayload::OrderTolerated(tolerated) = &event.payload {
            println!("  step {}: {:?} ({})", event.id.0, tolerated.kind, tolerated.reason);
        }
    }
    println!("\n  Resulting state:");
    print_state(sandbox.state());
    Ok(())
}
