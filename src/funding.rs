// 5.0: funding. once per period the rate takes a bounded random-walk step and every
// open position settles against it. longs pay when the rate is positive, shorts when negative.
// 5.0 has the state struct. 5.1+ has the rate and payment logic.

use crate::slippage::RandomSource;
use crate::types::{Quote, Side, Timestamp};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FundingParams {
    pub period_ms: i64,
    pub max_rate: Decimal,
    pub drift_band: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingState {
    pub rate: Decimal,
    pub next_funding_time: Timestamp,
}

impl FundingState {
    pub fn new(initial_rate: Decimal, start: Timestamp, period_ms: i64) -> Self {
        Self {
            rate: initial_rate,
            next_funding_time: start.plus_millis(period_ms),
        }
    }

    pub fn is_due(&self, now: Timestamp) -> bool {
        now >= self.next_funding_time
    }

    /// 5.1: takes one step of the walk and moves the deadline one period forward.
    /// Returns the settlement time for this period and the new rate.
    pub fn advance(&mut self, params: &FundingParams, rng: &mut dyn RandomSource) -> (Timestamp, Decimal) {
        let settled_at = self.next_funding_time;
        self.rate = step_rate(self.rate, params, rng);
        self.next_funding_time = self.next_funding_time.plus_millis(params.period_ms);
        (settled_at, self.rate)
    }
}

// 5.2: rate + uniform drift in [-band/2, band/2), clamped to +-max_rate
pub fn step_rate(rate: Decimal, params: &FundingParams, rng: &mut dyn RandomSource) -> Decimal {
    let drift = (rng.next_unit() - dec!(0.5)) * params.drift_band;
    (rate + drift).max(-params.max_rate).min(params.max_rate)
}

// 5.3: notional * rate * (+1 long, -1 short). positive = paid by the holder
pub fn calculate_funding_payment(notional: Quote, rate: Decimal, side: Side) -> Quote {
    notional.mul(rate * side.sign())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slippage::{FixedRandom, SequenceRandom};

    fn params() -> FundingParams {
        FundingParams {
            period_ms: 3_600_000,
            max_rate: dec!(0.0005),
            drift_band: dec!(0.00005),
        }
    }

    #[test]
    fn midpoint_sample_means_no_drift() {
        let mut rng = FixedRandom(dec!(0.5));
        assert_eq!(step_rate(dec!(0.0001), &params(), &mut rng), dec!(0.0001));
    }

    #[test]
    fn drift_is_bounded_by_half_band() {
        let mut rng = SequenceRandom::new(vec![Decimal::ZERO, dec!(0.99)]);
        let down = step_rate(Decimal::ZERO, &params(), &mut rng);
        let up = step_rate(Decimal::ZERO, &params(), &mut rng);
        assert_eq!(down, dec!(-0.000025));
        assert!(up < dec!(0.000025) && up > Decimal::ZERO);
    }

    #[test]
    fn rate_is_clamped() {
        let mut rng = FixedRandom(dec!(0.99));
        let mut rate = dec!(0.0004);
        for _ in 0..100 {
            rate = step_rate(rate, &params(), &mut rng);
        }
        assert_eq!(rate, dec!(0.0005));

        let mut rng = FixedRandom(Decimal::ZERO);
        for _ in 0..100 {
            rate = step_rate(rate, &params(), &mut rng);
        }
        assert_eq!(rate, dec!(-0.0005));
    }

    #[test]
    fn advance_moves_deadline_by_one_period() {
        let mut state = FundingState::new(dec!(0.0001), Timestamp::from_millis(0), 3_600_000);
        assert!(!state.is_due(Timestamp::from_millis(3_599_999)));
        assert!(state.is_due(Timestamp::from_millis(3_600_000)));

        let mut rng = FixedRandom(dec!(0.5));
        let (settled_at, rate) = state.advance(&params(), &mut rng);
        assert_eq!(settled_at, Timestamp::from_millis(3_600_000));
        assert_eq!(rate, dec!(0.0001));
        assert_eq!(state.next_funding_time, Timestamp::from_millis(7_200_000));
    }

    #[test]
    fn payment_sign_convention() {
        let notional = Quote::new(dec!(1000));
        assert_eq!(calculate_funding_payment(notional, dec!(0.0001), Side::Long).value(), dec!(0.1));
        assert_eq!(calculate_funding_payment(notional, dec!(0.0001), Side::Short).value(), dec!(-0.1));
        assert_eq!(calculate_funding_payment(notional, dec!(-0.0002), Side::Short).value(), dec!(0.2));
    }
}
