//! Account balances and derived metrics.
//!
//! The ledger runs a single cross-margined account: deposits, realized pnl, fees
//! and funding are tracked here, while collateral locked per position lives on the
//! positions themselves. `AccountMetrics` is always derived, never authoritative.

use crate::position::PositionBook;
use crate::types::Quote;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Account {
    // deposits minus withdrawals
    pub deposited: Quote,
    // gross pnl of every closed or liquidated position
    pub realized_pnl: Quote,
    pub total_fees_paid: Quote,
    // net funding settled, negative when received
    pub total_funding_paid: Quote,
}

impl Account {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn credit_deposit(&mut self, amount: Quote) {
        self.deposited = self.deposited.add(amount);
    }

    pub fn debit_withdrawal(&mut self, amount: Quote) {
        self.deposited = self.deposited.sub(amount);
    }

    pub fn charge_fee(&mut self, fee: Quote) {
        self.total_fees_paid = self.total_fees_paid.add(fee);
    }

    pub fn record_funding(&mut self, payment: Quote) {
        self.total_funding_paid = self.total_funding_paid.add(payment);
    }

    pub fn realize_pnl(&mut self, pnl: Quote) {
        self.realized_pnl = self.realized_pnl.add(pnl);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountMetrics {
    // clamped at zero for display
    pub equity: Quote,
    pub total_initial_margin: Quote,
    pub total_maintenance_margin: Quote,
    pub free_margin: Quote,
    // maintenance margin / equity, > 1 means the account is underwater
    pub margin_ratio: Decimal,
    // total notional / equity
    pub account_leverage: Decimal,
    pub total_unrealized_pnl: Quote,
    pub total_notional: Quote,
}

/// Unclamped account equity. Internal checks use this, `AccountMetrics::equity` clamps it.
pub fn raw_equity(account: &Account, book: &PositionBook) -> Quote {
    account
        .deposited
        .add(account.realized_pnl)
        .sub(account.total_fees_paid)
        .sub(account.total_funding_paid)
        .add(book.total_unrealized_pnl())
        .sub(book.total_realized_funding())
}

pub fn calculate_account_metrics(
    account: &Account,
    book: &PositionBook,
    initial_margin_fraction: Decimal,
) -> AccountMetrics {
    let equity = raw_equity(account, book);
    let total_unrealized_pnl = book.total_unrealized_pnl();
    let total_notional = book.total_notional();
    let total_initial_margin = book.total_initial_margin(initial_margin_fraction);
    let total_maintenance_margin = book.total_maintenance_margin();

    let free_margin = equity.sub(total_initial_margin).max(Quote::zero());

    let (margin_ratio, account_leverage) = if equity.is_positive() {
        (
            total_maintenance_margin.value() / equity.value(),
            total_notional.value() / equity.value(),
        )
    } else {
        (Decimal::ZERO, Decimal::ZERO)
    };

    AccountMetrics {
        equity: equity.max(Quote::zero()),
        total_initial_margin,
        total_maintenance_margin,
        free_margin,
        margin_ratio,
        account_leverage,
        total_unrealized_pnl,
        total_notional,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::{OpenParams, Position};
    use crate::types::{Leverage, PositionId, Price, Side, Timestamp};
    use rust_decimal_macros::dec;

    fn test_account() -> Account {
        let mut account = Account::new();
        account.credit_deposit(Quote::new(dec!(1000)));
        account
    }

    fn test_position(id: u64, collateral: Decimal, leverage: Decimal) -> Position {
        Position::open(OpenParams {
            id: PositionId(id),
            side: Side::Long,
            collateral: Quote::new(collateral),
            leverage: Leverage::new(leverage).unwrap(),
            fill_price: Price::new_unchecked(dec!(100)),
            maintenance_margin_fraction: dec!(0.10),
            open_fee: Quote::zero(),
            timestamp: Timestamp::from_millis(0),
        })
    }

    #[test]
    fn empty_account_metrics() {
        let metrics = calculate_account_metrics(&Account::new(), &PositionBook::new(), dec!(0.2));
        assert_eq!(metrics, AccountMetrics::default());
    }

    #[test]
    fn deposit_only_is_all_free_margin() {
        let metrics = calculate_account_metrics(&test_account(), &PositionBook::new(), dec!(0.2));
        assert_eq!(metrics.equity.value(), dec!(1000));
        assert_eq!(metrics.free_margin.value(), dec!(1000));
        assert_eq!(metrics.margin_ratio, Decimal::ZERO);
        assert_eq!(metrics.account_leverage, Decimal::ZERO);
    }

    #[test]
    fn metrics_with_open_positions() {
        let mut account = test_account();
        account.charge_fee(Quote::new(dec!(0.24)));

        let mut book = PositionBook::new();
        let mut pos = test_position(1, dec!(100), dec!(3));
        pos.mark_to_market(Price::new_unchecked(dec!(110)));
        book.insert(pos);

        let metrics = calculate_account_metrics(&account, &book, dec!(0.2));
        // 1000 - 0.24 + 30
        assert_eq!(metrics.equity.value(), dec!(1029.76));
        assert_eq!(metrics.total_initial_margin.value(), dec!(60));
        assert_eq!(metrics.total_maintenance_margin.value(), dec!(30));
        assert_eq!(metrics.free_margin.value(), dec!(969.76));
        assert_eq!(metrics.total_notional.value(), dec!(300));
        assert_eq!(metrics.total_unrealized_pnl.value(), dec!(30));
        assert_eq!(metrics.account_leverage, dec!(300) / dec!(1029.76));
    }

    #[test]
    fn funding_is_counted_on_account_and_position() {
        let mut account = test_account();
        let mut book = PositionBook::new();
        let mut pos = test_position(1, dec!(100), dec!(2));
        pos.accrue_funding(Quote::new(dec!(1)));
        book.insert(pos);
        account.record_funding(Quote::new(dec!(1)));

        let metrics = calculate_account_metrics(&account, &book, dec!(0.2));
        assert_eq!(metrics.equity.value(), dec!(998));
    }

    #[test]
    fn negative_equity_is_clamped() {
        let mut account = test_account();
        account.realize_pnl(Quote::new(dec!(-1500)));

        let equity = raw_equity(&account, &PositionBook::new());
        assert_eq!(equity.value(), dec!(-500));

        let metrics = calculate_account_metrics(&account, &PositionBook::new(), dec!(0.2));
        assert_eq!(metrics.equity, Quote::zero());
        assert_eq!(metrics.free_margin, Quote::zero());
        assert_eq!(metrics.margin_ratio, Decimal::ZERO);
    }
}
