//! Property-based tests for the liquidation estimators and the volume solver.
//!
//! These tests verify invariants hold under random inputs.

use hedge_core::*;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// Strategies for generating test data
fn side_strategy() -> impl Strategy<Value = Side> {
    prop_oneof![Just(Side::Long), Just(Side::Short)]
}

fn entry_strategy() -> impl Strategy<Value = Decimal> {
    (2_000_000i64..6_000_000i64).prop_map(|x| Decimal::new(x, 2)) // $20,000 to $60,000
}

fn size_strategy() -> impl Strategy<Value = Decimal> {
    (500i64..2_000i64).prop_map(|x| Decimal::new(x, 3)) // 0.5 to 2.0 on a 0.001 grid
}

fn funds_strategy() -> impl Strategy<Value = Decimal> {
    (100i64..1_500i64).prop_map(Decimal::from)
}

fn rate_strategy() -> impl Strategy<Value = Percent> {
    (0i64..=100i64).prop_map(|x| Percent::new(Decimal::new(x, 2))) // 0% to 1%
}

fn position(side: Side, entry: Decimal, size: Decimal, rate: Percent) -> Position {
    let mut symbol = Symbol::btc_usdt();
    symbol.maintenance_margin_rate = rate;
    Position::open(
        side,
        symbol,
        Price::new_unchecked(entry),
        size,
        Leverage::new(dec!(100)).unwrap(),
    )
    .unwrap()
}

proptest! {
    /// Same inputs, same estimate
    #[test]
    fn estimator_is_pure(
        side in side_strategy(),
        entry in entry_strategy(),
        size in size_strategy(),
        funds in funds_strategy(),
        rate in rate_strategy(),
    ) {
        let pos = position(side, entry, size, rate);
        let funds = CoinAmount::new(funds);
        let first = estimate_liquidation_price(&pos, None, funds).unwrap();
        let second = estimate_liquidation_price(&pos, None, funds).unwrap();
        prop_assert_eq!(first, second);
    }

    /// Liquidation always sits on the losing side of entry
    #[test]
    fn liquidation_on_loss_side(
        side in side_strategy(),
        entry in entry_strategy(),
        size in size_strategy(),
        funds in funds_strategy(),
        rate in rate_strategy(),
    ) {
        let pos = position(side, entry, size, rate);
        let liq = estimate_liquidation_price(&pos, None, CoinAmount::new(funds))
            .unwrap()
            .expect("bounded inputs keep long liquidation positive");
        prop_assert!(liq.is_beyond(pos.entry_price, side));
    }

    /// More funds never pull liquidation closer
    #[test]
    fn more_funds_push_liquidation_out(
        side in side_strategy(),
        entry in entry_strategy(),
        size in size_strategy(),
        funds in funds_strategy(),
        extra in 1i64..500i64,
    ) {
        let pos = position(side, entry, size, Percent::new(dec!(0.5)));
        let near = estimate_liquidation_price(&pos, None, CoinAmount::new(funds)).unwrap().unwrap();
        let far = estimate_liquidation_price(&pos, None, CoinAmount::new(funds + Decimal::from(extra)))
            .unwrap()
            .unwrap();
        prop_assert!(far == near || far.is_beyond(near, side));
    }

    /// Support leg never carries its own liquidation price
    #[test]
    fn covered_leg_has_no_liquidation(
        entry in entry_strategy(),
        size in size_strategy(),
        funds in funds_strategy(),
    ) {
        let main = position(Side::Short, entry, size + dec!(0.001), Percent::zero());
        let support = position(Side::Long, entry, size, Percent::zero());
        let liq = estimate_liquidation_price(&support, Some(&main), CoinAmount::new(funds)).unwrap();
        prop_assert!(liq.is_none());
    }

    /// Inverse then forward lands back on the wished price (to the tick)
    #[test]
    fn inverse_forward_consistent(
        side in side_strategy(),
        entry in entry_strategy(),
        funds in funds_strategy(),
        reach in 500i64..5_000i64,
        rate in rate_strategy(),
    ) {
        let entry = Price::new_unchecked(entry);
        let funds = CoinAmount::new(funds);
        let wished = Price::new_unchecked(entry.shifted_into_loss(Decimal::from(reach), side));
        prop_assume!(wished.differ_with(entry) > maintenance_margin_distance(entry, rate));

        let size = not_covered_size_for(side, entry, wished, funds, rate).unwrap();
        let liq = liquidation_price_for(side, entry, size, funds, rate, 2).unwrap().unwrap();
        prop_assert!(liq.differ_with(wished) <= dec!(0.01));
    }

    /// Solver output: diff non-negative on the volume grid, the reported
    /// liquidation matches replaying the close, and either within tolerance or
    /// the full iteration budget spent
    #[test]
    fn solver_diff_and_termination(
        side in side_strategy(),
        size in size_strategy(),
        funds in funds_strategy(),
        extra_reach in 100i64..5_000i64,
        move_permille in -20i64..=9i64,
    ) {
        let entry = dec!(30000);
        let pos = position(side, entry, size, Percent::new(dec!(0.5)));
        let current_liq = estimate_liquidation_price(&pos, None, CoinAmount::new(funds)).unwrap().unwrap();
        let wished = Price::new_unchecked(current_liq.shifted_into_loss(Decimal::from(extra_reach), side));
        // market from 2% in profit to 0.9% in loss, always short of the wished price
        let current = Price::new_unchecked(
            Price::new_unchecked(entry).shifted_into_loss(entry * Decimal::new(move_permille, 3), side),
        );

        let request = LiquidationTargetRequest {
            position: pos,
            opposite: None,
            contract_balance: ContractBalance::new(
                CoinAmount::new(dec!(100000)),
                CoinAmount::new(dec!(50000)),
                CoinAmount::new(funds),
            ).unwrap(),
            funds_for_liquidation: CoinAmount::new(funds),
            wished_liquidation_price: wished,
            current_price: current,
        };

        let solution = LiquidationTargetSolver::default().solve(&request).unwrap();
        let step = Symbol::btc_usdt().volume_step();

        // the reported price is the one the close order really produces
        if solution.diff > Decimal::ZERO {
            let symbol = request.position.symbol.clone();
            let state = SandboxState::new(
                symbol.clone(),
                Ticker::flat(&symbol, current),
                request.contract_balance.clone(),
                [request.position.clone()],
            ).unwrap();
            let mut sandbox = TradingSandbox::new(&CoreConfig::default(), state);
            sandbox.process_orders([SandboxOrder::close(side, solution.diff, current)]).unwrap();
            let replayed = sandbox.position(side).and_then(|p| p.liquidation_price);
            prop_assert_eq!(solution.achieved_liquidation_price, replayed);
        }

        prop_assert!(solution.diff >= Decimal::ZERO);
        prop_assert!((solution.diff % step).is_zero());
        prop_assert!(solution.diff < size);
        prop_assert!(solution.converged || solution.iterations == solution.iteration_budget);
        if solution.converged {
            let achieved = solution.achieved_liquidation_price.unwrap();
            prop_assert!(achieved.differ_with(wished) <= dec!(0.0004) * entry);
        }
    }
}
