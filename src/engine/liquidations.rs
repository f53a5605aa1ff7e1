//! Liquidation sweep.

use super::core::Engine;
use crate::history::TradeRecord;
use crate::liquidation::{evaluate_health, liquidate};
use crate::types::Timestamp;
use tracing::warn;

impl Engine {
    /// Splits the book into retained and liquidated positions, then books each
    /// liquidation. Positions must already be marked to market.
    pub(super) fn sweep_liquidations(&mut self, now: Timestamp) -> Vec<TradeRecord> {
        let liquidated = self.book.partition(|p| evaluate_health(p).is_liquidatable());
        if liquidated.is_empty() {
            return Vec::new();
        }

        let fee_rate = self.config.liquidation_fee_rate;
        let mut records = Vec::with_capacity(liquidated.len());

        for position in liquidated {
            let outcome = liquidate(&position, fee_rate, now);

            self.account.realize_pnl(outcome.realized_pnl);
            self.account.charge_fee(outcome.penalty);

            warn!(
                id = %position.id,
                side = %position.side,
                mark = %position.mark_price,
                equity = %position.equity(),
                maintenance = %position.maintenance_margin,
                "{}",
                outcome.log_line
            );

            self.liquidation_log.push_newest_first(outcome.log_line);
            self.trade_history.push_newest_first(outcome.record.clone());
            records.push(outcome.record);
        }

        records
    }
}

#[cfg(test)]
mod tests {
    use crate::config::LedgerConfig;
    use crate::engine::Engine;
    use crate::history::CloseKind;
    use crate::slippage::FixedRandom;
    use crate::types::{Leverage, Price, Quote, Side, Timestamp};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn engine() -> Engine {
        Engine::new(LedgerConfig::default(), Box::new(FixedRandom(Decimal::ZERO)), Timestamp::from_millis(0)).unwrap()
    }

    #[test]
    fn healthy_book_is_untouched() {
        let mut engine = engine();
        engine.deposit(Quote::new(dec!(1000))).unwrap();
        engine.open_position(Side::Long, Quote::new(dec!(100)), Leverage::new(dec!(5)).unwrap()).unwrap();
        engine.book.mark_all(Price::new_unchecked(dec!(95)));

        assert!(engine.sweep_liquidations(Timestamp::from_millis(1)).is_empty());
        assert_eq!(engine.positions().len(), 1);
    }

    #[test]
    fn breached_position_is_removed_and_booked() {
        let mut engine = engine();
        engine.deposit(Quote::new(dec!(1000))).unwrap();
        let weak = engine.open_position(Side::Long, Quote::new(dec!(100)), Leverage::new(dec!(5)).unwrap()).unwrap();
        let strong = engine.open_position(Side::Short, Quote::new(dec!(100)), Leverage::new(dec!(1)).unwrap()).unwrap();

        // 5x long: equity 100 + 5 * (p - 100), MM 50, so p <= 90 liquidates
        engine.book.mark_all(Price::new_unchecked(dec!(90)));
        let records = engine.sweep_liquidations(Timestamp::from_millis(1));

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, weak);
        assert_eq!(records[0].kind, CloseKind::Liquidated);
        assert_eq!(records[0].gross_pnl.value(), dec!(-50));
        assert!(engine.position(weak).is_none());
        assert!(engine.position(strong).is_some());

        // gross pnl realized, penalty 500 * 0.5% on top of the open fees
        assert_eq!(engine.account().realized_pnl.value(), dec!(-50));
        assert_eq!(engine.account().total_fees_paid.value(), dec!(0.4) + dec!(0.08) + dec!(2.5));
        assert_eq!(engine.liquidation_log(), vec!["LIQUIDATED LONG $500 @ 90.00 | Loss: $52.90".to_string()]);
    }
}
