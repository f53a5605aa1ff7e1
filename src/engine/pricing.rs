//! Reference price updates.

use super::core::Engine;
use crate::price_feed::PriceUpdate;
use crate::types::Timestamp;
use tracing::debug;

impl Engine {
    /// Store the latest oracle update. Last value wins; ticks read it until it goes stale.
    pub fn push_price(&mut self, update: PriceUpdate) {
        debug!(price = %update.price, ts = %update.timestamp, stale = update.stale, "oracle update");
        self.latest_update = Some(update);
    }

    /// Store a polled update only when it is newer than the one held. A polled
    /// source keeps reporting its last value every tick, so it must not clobber a
    /// fresher explicit `push_price`. Returns true when the update was taken.
    pub fn offer_price(&mut self, update: PriceUpdate) -> bool {
        let newer = self
            .latest_update
            .as_ref()
            .map_or(true, |held| update.timestamp > held.timestamp);
        if newer {
            self.push_price(update);
        }
        newer
    }

    /// Refresh the reference price for a tick. Returns true when the oracle drove it.
    pub(super) fn refresh_price(&mut self, now: Timestamp) -> bool {
        let stale_after = self.config.price_stale_after_ms;

        if let Some(update) = &self.latest_update {
            match update.usable_price(now, stale_after) {
                Some(price) => {
                    self.reference_price = Some(price);
                    self.jitter.anchor = Some(price);
                    return true;
                }
                None => {
                    debug!(price = %update.price, ts = %update.timestamp, "oracle price unusable, jittering");
                }
            }
        }

        if let Some(price) = self.reference_price {
            self.reference_price = Some(self.jitter.next(price, self.rng.as_mut()));
        }
        false
    }
}
