// 4.0: open position tracking. pnl = side * (mark - entry) * size_index.
// notional, size_index, maintenance margin and liquidation price are fixed at open and never recomputed.
// 4.5 PositionBook at the bottom owns the set of open positions.

use crate::types::{Leverage, PositionId, Price, Quote, Side, Timestamp};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: PositionId,
    pub side: Side,
    pub leverage: Leverage,
    pub entry_price: Price,
    pub mark_price: Price,
    pub notional: Quote,
    // index-unit exposure, multiplies the price delta for pnl
    pub size_index: Decimal,
    pub collateral: Quote,
    pub maintenance_margin: Quote,
    pub liquidation_price: Decimal,
    pub unrealized_pnl: Quote,
    pub unrealized_pnl_percent: Decimal,
    pub realized_funding: Quote,
    pub open_fee: Quote,
    pub timestamp: Timestamp,
}

/// Inputs fixed at open. Everything else on the position is derived from these.
#[derive(Debug, Clone)]
pub struct OpenParams {
    pub id: PositionId,
    pub side: Side,
    pub collateral: Quote,
    pub leverage: Leverage,
    pub fill_price: Price,
    pub maintenance_margin_fraction: Decimal,
    pub open_fee: Quote,
    pub timestamp: Timestamp,
}

impl Position {
    pub fn open(params: OpenParams) -> Self {
        let notional = params.collateral.mul(params.leverage.value());
        let size_index = notional.value() / params.fill_price.value();
        let maintenance_margin = notional.mul(params.maintenance_margin_fraction);
        let liquidation_price = crate::liquidation::calculate_liquidation_price(
            params.side,
            params.fill_price,
            params.collateral,
            notional,
            maintenance_margin,
        );

        Self {
            id: params.id,
            side: params.side,
            leverage: params.leverage,
            entry_price: params.fill_price,
            mark_price: params.fill_price,
            notional,
            size_index,
            collateral: params.collateral,
            maintenance_margin,
            liquidation_price,
            unrealized_pnl: Quote::zero(),
            unrealized_pnl_percent: Decimal::ZERO,
            realized_funding: Quote::zero(),
            open_fee: params.open_fee,
            timestamp: params.timestamp,
        }
    }

    // 4.1: paper gains/losses at a given price
    pub fn pnl_at(&self, price: Price) -> Quote {
        calculate_pnl(self.side, self.entry_price, price, self.size_index)
    }

    // 4.2: refreshes mark, unrealized pnl and its percent of collateral
    pub fn mark_to_market(&mut self, mark_price: Price) {
        self.mark_price = mark_price;
        self.unrealized_pnl = self.pnl_at(mark_price);
        self.unrealized_pnl_percent = if self.collateral.is_positive() {
            self.unrealized_pnl.value() / self.collateral.value() * dec!(100)
        } else {
            Decimal::ZERO
        };
    }

    // 4.3: collateral + pnl - funding. this vs MM decides liquidation
    pub fn equity(&self) -> Quote {
        self.collateral
            .add(self.unrealized_pnl)
            .sub(self.realized_funding)
    }

    pub fn initial_margin(&self, initial_margin_fraction: Decimal) -> Quote {
        self.notional.mul(initial_margin_fraction)
    }

    pub fn accrue_funding(&mut self, payment: Quote) {
        self.realized_funding = self.realized_funding.add(payment);
    }
}

// 4.4: the pnl formula. direction * (exit - entry) * size_index
pub fn calculate_pnl(side: Side, entry_price: Price, exit_price: Price, size_index: Decimal) -> Quote {
    Quote::new(side.sign() * (exit_price.value() - entry_price.value()) * size_index)
}

/// 4.5: the set of open positions, in open order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PositionBook {
    positions: Vec<Position>,
}

impl PositionBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn insert(&mut self, position: Position) {
        debug_assert!(self.get(position.id).is_none(), "duplicate position id");
        self.positions.push(position);
    }

    pub fn get(&self, id: PositionId) -> Option<&Position> {
        self.positions.iter().find(|p| p.id == id)
    }

    pub fn remove(&mut self, id: PositionId) -> Option<Position> {
        let idx = self.positions.iter().position(|p| p.id == id)?;
        Some(self.positions.remove(idx))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Position> {
        self.positions.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Position> {
        self.positions.iter_mut()
    }

    pub fn as_slice(&self) -> &[Position] {
        &self.positions
    }

    pub fn mark_all(&mut self, mark_price: Price) {
        for position in &mut self.positions {
            position.mark_to_market(mark_price);
        }
    }

    /// Splits the book in two: positions kept, positions removed. The kept
    /// positions stay in the book in their original order.
    pub fn partition<F>(&mut self, mut remove: F) -> Vec<Position>
    where
        F: FnMut(&Position) -> bool,
    {
        let (removed, retained): (Vec<Position>, Vec<Position>) =
            std::mem::take(&mut self.positions).into_iter().partition(|p| remove(p));
        self.positions = retained;
        removed
    }

    pub fn clear(&mut self) {
        self.positions.clear();
    }

    pub fn total_notional(&self) -> Quote {
        self.positions.iter().map(|p| p.notional).sum()
    }

    pub fn total_unrealized_pnl(&self) -> Quote {
        self.positions.iter().map(|p| p.unrealized_pnl).sum()
    }

    pub fn total_realized_funding(&self) -> Quote {
        self.positions.iter().map(|p| p.realized_funding).sum()
    }

    pub fn total_maintenance_margin(&self) -> Quote {
        self.positions.iter().map(|p| p.maintenance_margin).sum()
    }

    pub fn total_initial_margin(&self, initial_margin_fraction: Decimal) -> Quote {
        self.positions
            .iter()
            .map(|p| p.initial_margin(initial_margin_fraction))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_position(id: u64, side: Side, collateral: Decimal, leverage: Decimal, price: Decimal) -> Position {
        Position::open(OpenParams {
            id: PositionId(id),
            side,
            collateral: Quote::new(collateral),
            leverage: Leverage::new(leverage).unwrap(),
            fill_price: Price::new_unchecked(price),
            maintenance_margin_fraction: dec!(0.10),
            open_fee: Quote::new(collateral * leverage * dec!(0.0008)),
            timestamp: Timestamp::from_millis(0),
        })
    }

    #[test]
    fn open_fixes_margin_math() {
        let pos = test_position(1, Side::Long, dec!(100), dec!(3), dec!(100));
        assert_eq!(pos.notional.value(), dec!(300));
        assert_eq!(pos.size_index, dec!(3));
        assert_eq!(pos.maintenance_margin.value(), dec!(30));
        assert_eq!(pos.open_fee.value(), dec!(0.24));
        assert_eq!(pos.mark_price, pos.entry_price);
        assert_eq!(pos.unrealized_pnl, Quote::zero());
    }

    #[test]
    fn long_pnl_follows_price() {
        let mut pos = test_position(1, Side::Long, dec!(100), dec!(3), dec!(100));
        pos.mark_to_market(Price::new_unchecked(dec!(110)));
        assert_eq!(pos.unrealized_pnl.value(), dec!(30));
        assert_eq!(pos.unrealized_pnl_percent, dec!(30));

        pos.mark_to_market(Price::new_unchecked(dec!(90)));
        assert_eq!(pos.unrealized_pnl.value(), dec!(-30));
    }

    #[test]
    fn short_pnl_is_inverted() {
        let mut pos = test_position(1, Side::Short, dec!(100), dec!(2), dec!(50));
        pos.mark_to_market(Price::new_unchecked(dec!(45)));
        // size_index = 200 / 50 = 4, gain = 5 * 4
        assert_eq!(pos.unrealized_pnl.value(), dec!(20));
    }

    #[test]
    fn equity_subtracts_funding() {
        let mut pos = test_position(1, Side::Long, dec!(100), dec!(2), dec!(100));
        pos.mark_to_market(Price::new_unchecked(dec!(101)));
        pos.accrue_funding(Quote::new(dec!(0.5)));
        // 100 + 2 - 0.5
        assert_eq!(pos.equity().value(), dec!(101.5));
    }

    #[test]
    fn book_insert_get_remove() {
        let mut book = PositionBook::new();
        book.insert(test_position(1, Side::Long, dec!(100), dec!(2), dec!(100)));
        book.insert(test_position(2, Side::Short, dec!(50), dec!(1), dec!(100)));

        assert_eq!(book.len(), 2);
        assert_eq!(book.total_notional().value(), dec!(250));
        assert_eq!(book.total_maintenance_margin().value(), dec!(25));
        assert_eq!(book.total_initial_margin(dec!(0.2)).value(), dec!(50));

        let removed = book.remove(PositionId(1)).unwrap();
        assert_eq!(removed.id, PositionId(1));
        assert!(book.remove(PositionId(1)).is_none());
        assert_eq!(book.len(), 1);
    }

    #[test]
    fn partition_keeps_order_of_retained() {
        let mut book = PositionBook::new();
        for id in 1..=5 {
            book.insert(test_position(id, Side::Long, dec!(10), dec!(1), dec!(100)));
        }
        let removed = book.partition(|p| p.id.0 % 2 == 0);
        let removed_ids: Vec<u64> = removed.iter().map(|p| p.id.0).collect();
        let kept_ids: Vec<u64> = book.iter().map(|p| p.id.0).collect();
        assert_eq!(removed_ids, vec![2, 4]);
        assert_eq!(kept_ids, vec![1, 3, 5]);
    }
}
