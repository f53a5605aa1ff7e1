//! Funding rate settlement.

use super::core::Engine;
use crate::funding::calculate_funding_payment;
use crate::history::FundingTick;
use crate::types::Timestamp;
use tracing::info;

impl Engine {
    /// Settle every funding period that has elapsed by `now`. Each period steps the
    /// rate once and charges every open position once at the new rate.
    pub(super) fn settle_due_funding(&mut self, now: Timestamp) -> Vec<FundingTick> {
        let mut settled = Vec::new();

        while self.funding.is_due(now) {
            let (settled_at, rate) = self.funding.advance(&self.funding_params, self.rng.as_mut());

            for position in self.book.iter_mut() {
                let payment = calculate_funding_payment(position.notional, rate, position.side);
                position.accrue_funding(payment);
                self.account.record_funding(payment);

                let tick = FundingTick {
                    timestamp: settled_at,
                    rate,
                    payment,
                    position_id: position.id,
                };
                self.funding_history.push_chronological(tick.clone());
                settled.push(tick);
            }

            info!(
                %rate,
                at = %settled_at,
                positions = self.book.len(),
                next = %self.funding.next_funding_time,
                "funding settled"
            );
        }

        settled
    }
}

#[cfg(test)]
mod tests {
    use crate::config::LedgerConfig;
    use crate::engine::Engine;
    use crate::slippage::FixedRandom;
    use crate::types::{Leverage, Quote, Side, Timestamp};
    use rust_decimal_macros::dec;

    fn engine() -> Engine {
        // 0.5 keeps the rate flat and the price still
        let config = LedgerConfig {
            max_slippage: dec!(0),
            ..LedgerConfig::default()
        };
        Engine::new(config, Box::new(FixedRandom(dec!(0.5))), Timestamp::from_millis(0)).unwrap()
    }

    #[test]
    fn nothing_settles_before_period() {
        let mut engine = engine();
        engine.deposit(Quote::new(dec!(1000))).unwrap();
        engine.open_position(Side::Long, Quote::new(dec!(100)), Leverage::new(dec!(2)).unwrap()).unwrap();
        assert!(engine.settle_due_funding(Timestamp::from_millis(3_599_999)).is_empty());
    }

    #[test]
    fn longs_pay_shorts_receive_at_positive_rate() {
        let mut engine = engine();
        engine.deposit(Quote::new(dec!(1000))).unwrap();
        let long = engine.open_position(Side::Long, Quote::new(dec!(100)), Leverage::new(dec!(2)).unwrap()).unwrap();
        let short = engine.open_position(Side::Short, Quote::new(dec!(50)), Leverage::new(dec!(2)).unwrap()).unwrap();

        let ticks = engine.settle_due_funding(Timestamp::from_millis(3_600_000));
        assert_eq!(ticks.len(), 2);

        // 200 * 0.0001 and -100 * 0.0001
        assert_eq!(engine.position(long).unwrap().realized_funding.value(), dec!(0.02));
        assert_eq!(engine.position(short).unwrap().realized_funding.value(), dec!(-0.01));
        assert_eq!(engine.account().total_funding_paid.value(), dec!(0.01));
        assert_eq!(engine.next_funding_time(), Timestamp::from_millis(7_200_000));
    }

    #[test]
    fn one_settlement_per_period_regardless_of_calls() {
        let mut engine = engine();
        engine.deposit(Quote::new(dec!(1000))).unwrap();
        engine.open_position(Side::Long, Quote::new(dec!(100)), Leverage::new(dec!(2)).unwrap()).unwrap();

        assert_eq!(engine.settle_due_funding(Timestamp::from_millis(3_600_000)).len(), 1);
        assert!(engine.settle_due_funding(Timestamp::from_millis(3_600_001)).is_empty());
        assert!(engine.settle_due_funding(Timestamp::from_millis(7_199_999)).is_empty());

        // two periods elapsed at once settle twice
        let ticks = engine.settle_due_funding(Timestamp::from_millis(10_800_000));
        assert_eq!(ticks.len(), 2);
        assert_eq!(ticks[0].timestamp, Timestamp::from_millis(7_200_000));
        assert_eq!(ticks[1].timestamp, Timestamp::from_millis(10_800_000));
        assert_eq!(engine.funding_history().len(), 3);
    }
}
