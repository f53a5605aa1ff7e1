//! One clock tick: price, mark, funding, liquidations, metrics. In that order.

use super::core::Engine;
use super::results::TickReport;
use crate::types::Timestamp;
use tracing::debug;

impl Engine {
    /// Advance the ledger to `now`. Funding settles before the liquidation check,
    /// so funding accrued this tick can trigger a liquidation this tick.
    pub fn tick(&mut self, now: Timestamp) -> TickReport {
        // the clock never runs backwards
        let now = now.max(self.current_time);
        self.current_time = now;

        let price_from_oracle = self.refresh_price(now);
        if let Some(price) = self.reference_price {
            self.book.mark_all(price);
        }

        let funding = self.settle_due_funding(now);
        let liquidations = self.sweep_liquidations(now);
        self.recompute_metrics();

        debug!(
            time = %now,
            price = ?self.reference_price.map(|p| p.value()),
            oracle = price_from_oracle,
            open = self.book.len(),
            funded = funding.len(),
            liquidated = liquidations.len(),
            equity = %self.metrics.equity,
            "tick"
        );

        TickReport {
            time: now,
            price: self.reference_price,
            price_from_oracle,
            funding,
            liquidations,
        }
    }
}
