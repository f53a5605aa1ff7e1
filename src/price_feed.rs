// Price Feed Integration
//
// The ledger never fetches prices itself. An external source publishes the latest
// reference price, and the engine consumes whatever is newest at tick time. When the
// feed is stale or absent the engine nudges its last price with mean-reverting
// jitter instead.

use crate::slippage::RandomSource;
use crate::types::{Price, Timestamp};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;

/// A single price update from an oracle or feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceUpdate {
    pub price: Decimal,
    pub timestamp: Timestamp,
    /// Confidence interval reported by the source (0 when unknown)
    pub confidence: Decimal,
    /// Source-side staleness flag
    pub stale: bool,
}

impl PriceUpdate {
    pub fn new(price: Decimal, timestamp: Timestamp) -> Self {
        Self {
            price,
            timestamp,
            confidence: Decimal::ZERO,
            stale: false,
        }
    }

    pub fn marked_stale(mut self) -> Self {
        self.stale = true;
        self
    }

    pub fn is_stale(&self, now: Timestamp, stale_after_ms: i64) -> bool {
        self.stale || now.millis_since(self.timestamp) > stale_after_ms
    }

    /// The usable price, or `None` when the update is stale or not positive.
    pub fn usable_price(&self, now: Timestamp, stale_after_ms: i64) -> Option<Price> {
        if self.is_stale(now, stale_after_ms) {
            return None;
        }
        Price::new(self.price)
    }
}

/// Anything that can report its latest price. Polled by the scheduler once per tick.
pub trait PriceSource: Send {
    fn name(&self) -> &str;

    fn latest(&self) -> Option<PriceUpdate>;
}

/// Last-value-wins publisher backed by a watch channel. Publishing overwrites;
/// nothing is queued, and readers only ever see the newest update.
#[derive(Debug, Clone)]
pub struct LatestPrice {
    tx: Arc<watch::Sender<Option<PriceUpdate>>>,
}

impl Default for LatestPrice {
    fn default() -> Self {
        Self::new()
    }
}

impl LatestPrice {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    pub fn publish(&self, update: PriceUpdate) {
        // send_replace stores the value even while nobody is subscribed
        self.tx.send_replace(Some(update));
    }

    /// Reader half for the scheduler. Sees the current value right away.
    pub fn subscribe(&self) -> PriceWatch {
        PriceWatch {
            rx: self.tx.subscribe(),
        }
    }
}

/// Receiving end of a `LatestPrice`, read with `borrow()` at tick time.
#[derive(Debug, Clone)]
pub struct PriceWatch {
    rx: watch::Receiver<Option<PriceUpdate>>,
}

impl PriceSource for PriceWatch {
    fn name(&self) -> &str {
        "latest_price"
    }

    fn latest(&self) -> Option<PriceUpdate> {
        self.rx.borrow().clone()
    }
}

/// Fixed-price source for tests and simulations.
#[derive(Debug, Clone)]
pub struct MockPriceFeed {
    name: String,
    update: Option<PriceUpdate>,
}

impl MockPriceFeed {
    pub fn new(name: &str, price: Decimal, timestamp: Timestamp) -> Self {
        Self {
            name: name.to_string(),
            update: Some(PriceUpdate::new(price, timestamp)),
        }
    }

    pub fn offline(name: &str) -> Self {
        Self {
            name: name.to_string(),
            update: None,
        }
    }
}

impl PriceSource for MockPriceFeed {
    fn name(&self) -> &str {
        &self.name
    }

    fn latest(&self) -> Option<PriceUpdate> {
        self.update.clone()
    }
}

/// Mean-reverting noise used when no usable oracle price is available.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceJitter {
    pub amplitude: Decimal,
    pub reversion: Decimal,
    // last good oracle price (or the configured initial price)
    pub anchor: Option<Price>,
}

impl PriceJitter {
    pub fn new(amplitude: Decimal, reversion: Decimal, anchor: Option<Price>) -> Self {
        Self {
            amplitude,
            reversion,
            anchor,
        }
    }

    /// p' = p + (u - 0.5) * amplitude + reversion * (anchor - p). keeps p when p' <= 0.
    pub fn next(&self, price: Price, rng: &mut dyn RandomSource) -> Price {
        let noise = (rng.next_unit() - dec!(0.5)) * self.amplitude;
        let pull = match self.anchor {
            Some(anchor) => self.reversion * (anchor.value() - price.value()),
            None => Decimal::ZERO,
        };
        Price::new(price.value() + noise + pull).unwrap_or(price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slippage::FixedRandom;

    #[test]
    fn test_price_update_staleness() {
        let update = PriceUpdate::new(dec!(100), Timestamp::from_millis(1_000));
        assert!(!update.is_stale(Timestamp::from_millis(61_000), 120_000));
        assert!(update.is_stale(Timestamp::from_millis(121_001), 120_000));
        assert!(update.clone().marked_stale().is_stale(Timestamp::from_millis(1_000), 120_000));
    }

    #[test]
    fn test_unusable_prices() {
        let now = Timestamp::from_millis(0);
        assert!(PriceUpdate::new(Decimal::ZERO, now).usable_price(now, 1_000).is_none());
        assert!(PriceUpdate::new(dec!(-5), now).usable_price(now, 1_000).is_none());
        assert_eq!(
            PriceUpdate::new(dec!(42), now).usable_price(now, 1_000).unwrap().value(),
            dec!(42)
        );
    }

    #[test]
    fn test_latest_price_last_value_wins() {
        let feed = LatestPrice::new();
        let reader = feed.subscribe();
        assert_eq!(reader.name(), "latest_price");
        assert!(reader.latest().is_none());

        feed.publish(PriceUpdate::new(dec!(100), Timestamp::from_millis(1)));
        feed.clone().publish(PriceUpdate::new(dec!(101), Timestamp::from_millis(2)));
        assert_eq!(reader.latest().unwrap().price, dec!(101));

        // a late subscriber starts from the current value
        let late = feed.subscribe();
        assert_eq!(late.latest().unwrap().timestamp, Timestamp::from_millis(2));
    }

    #[test]
    fn test_mock_price_feed() {
        let feed = MockPriceFeed::new("mock", dec!(99), Timestamp::from_millis(0));
        assert_eq!(feed.name(), "mock");
        assert_eq!(feed.latest().unwrap().price, dec!(99));
        assert!(MockPriceFeed::offline("down").latest().is_none());
    }

    #[test]
    fn test_jitter_reverts_toward_anchor() {
        let jitter = PriceJitter::new(dec!(0.06), dec!(0.05), Some(Price::new_unchecked(dec!(100))));
        let mut rng = FixedRandom(dec!(0.5));
        // no noise, 5% of the gap closes each step
        let next = jitter.next(Price::new_unchecked(dec!(110)), &mut rng);
        assert_eq!(next.value(), dec!(109.5));
    }

    #[test]
    fn test_jitter_noise_band() {
        let jitter = PriceJitter::new(dec!(0.06), Decimal::ZERO, None);
        let low = jitter.next(Price::new_unchecked(dec!(100)), &mut FixedRandom(Decimal::ZERO));
        assert_eq!(low.value(), dec!(99.97));
    }

    #[test]
    fn test_jitter_never_goes_non_positive() {
        let jitter = PriceJitter::new(dec!(10), Decimal::ZERO, None);
        let price = Price::new_unchecked(dec!(0.01));
        let next = jitter.next(price, &mut FixedRandom(Decimal::ZERO));
        assert_eq!(next, price);
    }
}
