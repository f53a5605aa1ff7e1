// 15.0 history.rs: append-only records. closed trades, funding payments, liquidation log.
// every buffer is capped, oldest entries are evicted first.

use crate::types::{Leverage, PositionId, Price, Quote, Side, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseKind {
    Closed,
    Liquidated,
}

/// Immutable snapshot of a position at the moment it left the book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub id: PositionId,
    pub kind: CloseKind,
    pub side: Side,
    pub notional: Quote,
    pub leverage: Leverage,
    pub entry_price: Price,
    pub exit_price: Price,
    pub gross_pnl: Quote,
    // open fee plus close fee or liquidation penalty
    pub fees: Quote,
    pub funding: Quote,
    pub net_pnl: Quote,
    pub opened_at: Timestamp,
    pub closed_at: Timestamp,
}

/// One funding settlement against one position. positive payment = paid, negative = received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingTick {
    pub timestamp: Timestamp,
    pub rate: Decimal,
    pub payment: Quote,
    pub position_id: PositionId,
}

/// Capped ring of records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundedHistory<T> {
    items: VecDeque<T>,
    cap: usize,
}

impl<T> BoundedHistory<T> {
    pub fn new(cap: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(cap.min(256)),
            cap,
        }
    }

    /// Newest-first buffers push at the front; the back (oldest) is evicted.
    pub fn push_newest_first(&mut self, item: T) {
        self.items.push_front(item);
        self.items.truncate(self.cap);
    }

    /// Chronological buffers push at the back; the front (oldest) is evicted.
    pub fn push_chronological(&mut self, item: T) {
        self.items.push_back(item);
        while self.items.len() > self.cap {
            self.items.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl<T: Clone> BoundedHistory<T> {
    pub fn to_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newest_first_evicts_oldest() {
        let mut h = BoundedHistory::new(3);
        for i in 0..5 {
            h.push_newest_first(i);
        }
        assert_eq!(h.to_vec(), vec![4, 3, 2]);
    }

    #[test]
    fn chronological_evicts_oldest() {
        let mut h = BoundedHistory::new(3);
        for i in 0..5 {
            h.push_chronological(i);
        }
        assert_eq!(h.to_vec(), vec![2, 3, 4]);
        assert_eq!(h.len(), 3);
    }

    #[test]
    fn clear_empties() {
        let mut h = BoundedHistory::new(2);
        h.push_chronological("a");
        h.clear();
        assert!(h.is_empty());
    }
}
