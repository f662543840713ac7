// 8.0: what-if trading sandbox. applies simulated orders to a copy of an
// account's hedge on one symbol and keeps balances and liquidation prices current.
// deterministic, no external I/O.

mod core;
mod orders;
mod positions;
mod results;
mod state;

pub use self::core::{TolerancePredicate, TradingSandbox};
pub use self::orders::SandboxOrder;
pub use self::results::{SandboxError, SandboxErrorKind};
pub use self::state::SandboxState;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::ContractBalance;
    use crate::config::CoreConfig;
    use crate::events::SandboxEventPayload;
    use crate::market::{Symbol, Ticker};
    use crate::position::Position;
    use crate::types::{CoinAmount, Leverage, Price, Side};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn price(value: Decimal) -> Price {
        Price::new_unchecked(value)
    }

    fn leg(side: Side, size: Decimal) -> Position {
        Position::open(
            side,
            Symbol::btc_usdt(),
            price(dec!(30000)),
            size,
            Leverage::new(dec!(100)).unwrap(),
        )
        .unwrap()
    }

    fn sandbox(positions: Vec<Position>, available: Decimal) -> TradingSandbox {
        let symbol = Symbol::btc_usdt();
        let ticker = Ticker::flat(&symbol, price(dec!(30000)));
        let balance = ContractBalance::new(
            CoinAmount::new(dec!(10000)),
            CoinAmount::new(available),
            CoinAmount::new(dec!(1000)),
        )
        .unwrap();
        let state = SandboxState::new(symbol, ticker, balance, positions).unwrap();
        TradingSandbox::new(&CoreConfig::testnet(), state)
    }

    #[test]
    fn close_releases_margin_and_moves_liquidation() {
        let mut sb = sandbox(vec![leg(Side::Short, dec!(1))], dec!(9700));
        sb.process_orders([SandboxOrder::close(Side::Short, dec!(0.5), price(dec!(30000)))])
            .unwrap();

        let short = sb.position(Side::Short).unwrap();
        assert_eq!(short.size, dec!(0.5));
        assert_eq!(sb.state().balance.available.value(), dec!(9850));
        // released 150 returns to available, main margin falls by 150: reserve unchanged
        assert_eq!(sb.free_balance_for_liquidation().value(), dec!(1000));
        // 1000 / 0.5 + 150 buffer
        assert_eq!(short.liquidation_price, Price::new(dec!(32150)));
    }

    #[test]
    fn strict_sandbox_rejects_oversized_close() {
        let mut sb = sandbox(vec![leg(Side::Short, dec!(1))], dec!(9700));
        let result = sb.process_orders([SandboxOrder::close(Side::Short, dec!(2), price(dec!(30000)))]);
        assert!(matches!(result, Err(SandboxError::CloseVolumeExceedsPosition { .. })));
        assert_eq!(sb.position(Side::Short).map(|p| p.size), Some(dec!(1)));
        assert!(sb.executed_steps().is_empty());
    }

    #[test]
    fn tolerated_oversized_close_clamps() {
        let mut sb = sandbox(vec![leg(Side::Short, dec!(1))], dec!(9700))
            .ignoring(&[SandboxErrorKind::CloseVolumeExceedsPosition]);
        sb.process_orders([SandboxOrder::stop(Side::Short, dec!(2), price(dec!(30000)))])
            .unwrap();

        assert!(sb.position(Side::Short).is_none());
        assert_eq!(sb.tolerated_events().count(), 1);
        assert!(sb
            .executed_steps()
            .iter()
            .any(|e| matches!(e.payload, SandboxEventPayload::PositionClosed(_))));
    }

    #[test]
    fn tolerated_missing_position_is_noop() {
        let mut sb = sandbox(vec![leg(Side::Short, dec!(1))], dec!(9700))
            .with_tolerance(|kind| kind == SandboxErrorKind::NoPositionToClose);
        let before = sb.current_state();
        sb.process_orders([SandboxOrder::close(Side::Long, dec!(0.1), price(dec!(30000)))])
            .unwrap();
        assert_eq!(sb.state().balance, before.balance);
        assert_eq!(sb.state().position(Side::Short).map(|p| p.size), Some(dec!(1)));
    }

    #[test]
    fn ambiguous_hedge_is_never_tolerated() {
        let mut sb = sandbox(vec![leg(Side::Short, dec!(1)), leg(Side::Long, dec!(0.5))], dec!(9550))
            .with_tolerance(|_| true);
        let result = sb.process_orders([SandboxOrder::buy(Side::Long, dec!(0.5), price(dec!(30000)))]);
        assert_eq!(result, Err(SandboxError::HedgeAmbiguous { size: dec!(1) }));
    }

    #[test]
    fn zero_volume_is_invalid() {
        let mut sb = sandbox(vec![], dec!(10000)).with_tolerance(|_| true);
        let result = sb.process_orders([SandboxOrder::buy(Side::Long, Decimal::ZERO, price(dec!(30000)))]);
        assert_eq!(result, Err(SandboxError::InvalidVolume(Decimal::ZERO)));
    }

    #[test]
    fn support_leg_has_no_liquidation_price() {
        let mut sb = sandbox(vec![leg(Side::Short, dec!(1))], dec!(9700));
        sb.process_orders([SandboxOrder::buy(Side::Long, dec!(0.5), price(dec!(30000)))])
            .unwrap();

        assert!(sb.position(Side::Long).unwrap().liquidation_price.is_none());
        // buy moved 150 margin out of available into the support leg
        assert_eq!(sb.free_balance_for_liquidation().value(), dec!(850));
        // 850 / 0.5 + 150
        assert_eq!(
            sb.position(Side::Short).unwrap().liquidation_price,
            Price::new(dec!(31850))
        );
    }

    #[test]
    fn step_log_is_capped() {
        let mut config = CoreConfig::testnet();
        config.sandbox.max_recorded_steps = 3;
        let symbol = Symbol::btc_usdt();
        let state = SandboxState::new(
            symbol.clone(),
            Ticker::flat(&symbol, price(dec!(30000))),
            ContractBalance::new(
                CoinAmount::new(dec!(10000)),
                CoinAmount::new(dec!(10000)),
                CoinAmount::new(dec!(10000)),
            )
            .unwrap(),
            Vec::new(),
        )
        .unwrap();
        let mut sb = TradingSandbox::new(&config, state);

        let orders = (0..5).map(|_| SandboxOrder::buy(Side::Long, dec!(0.01), price(dec!(30000))));
        sb.process_orders(orders).unwrap();
        assert_eq!(sb.executed_steps().len(), 3);
        assert!(sb.executed_steps()[0].id.0 > 1);
    }
}
