//! Account commands: deposit, withdraw, open, close.
//!
//! Every command validates first and mutates second, so a rejected command
//! leaves the ledger untouched. Successful commands recompute metrics before
//! returning.

use super::core::Engine;
use super::results::RejectReason;
use crate::account::raw_equity;
use crate::history::{CloseKind, TradeRecord};
use crate::position::{calculate_pnl, OpenParams, Position};
use crate::slippage::apply_slippage;
use crate::types::{Leverage, PositionId, Price, Quote, Side};
use tracing::{debug, info};

impl Engine {
    pub fn deposit(&mut self, amount: Quote) -> Result<(), RejectReason> {
        if !amount.is_positive() {
            debug!(%amount, "deposit rejected");
            return Err(RejectReason::InvalidAmount);
        }
        // the cap bounds deposits; equity can sit above deposits after gains, so check it too
        let fits = self
            .account
            .deposited
            .checked_add(amount)
            .filter(|total| total.value() <= self.config.max_account_balance)
            .and_then(|_| raw_equity(&self.account, &self.book).checked_add(amount))
            .is_some();
        if !fits {
            debug!(%amount, cap = %self.config.max_account_balance, "deposit rejected, above balance cap");
            return Err(RejectReason::InvalidAmount);
        }

        self.account.credit_deposit(amount);
        self.recompute_metrics();

        info!(%amount, deposited = %self.account.deposited, "deposit");
        Ok(())
    }

    /// Limited to current free margin.
    pub fn withdraw(&mut self, amount: Quote) -> Result<(), RejectReason> {
        if !amount.is_positive() {
            debug!(%amount, "withdrawal rejected");
            return Err(RejectReason::InvalidAmount);
        }
        if amount > self.metrics.free_margin {
            debug!(%amount, free_margin = %self.metrics.free_margin, "withdrawal rejected");
            return Err(RejectReason::ExceedsFreeMargin);
        }

        self.account.debit_withdrawal(amount);
        self.recompute_metrics();

        info!(%amount, deposited = %self.account.deposited, "withdrawal");
        Ok(())
    }

    /// Open a market position at the current reference price plus adverse slippage.
    pub fn open_position(
        &mut self,
        side: Side,
        collateral: Quote,
        leverage: Leverage,
    ) -> Result<PositionId, RejectReason> {
        let price = match self.check_open(collateral, leverage) {
            Ok(price) => price,
            Err(reason) => {
                debug!(%side, %collateral, %leverage, ?reason, "open rejected");
                return Err(reason);
            }
        };

        let fill_price = apply_slippage(price, side, self.config.max_slippage, self.rng.as_mut());
        let notional = collateral.mul(leverage.value());
        let open_fee = notional.mul(self.config.taker_fee);
        let id = self.next_position_id();

        let position = Position::open(OpenParams {
            id,
            side,
            collateral,
            leverage,
            fill_price,
            maintenance_margin_fraction: self.config.maintenance_margin_fraction,
            open_fee,
            timestamp: self.current_time,
        });

        info!(
            %id,
            %side,
            %notional,
            %leverage,
            fill = %fill_price,
            liq = %position.liquidation_price,
            fee = %open_fee,
            "position opened"
        );

        self.account.charge_fee(open_fee);
        self.book.insert(position);
        self.recompute_metrics();

        Ok(id)
    }

    // checks run in a fixed order, the first failure wins
    fn check_open(&self, collateral: Quote, leverage: Leverage) -> Result<Price, RejectReason> {
        let price = self.reference_price.ok_or(RejectReason::ZeroPrice)?;

        if !self.account.deposited.is_positive() {
            return Err(RejectReason::NoDeposit);
        }
        if !collateral.is_positive() || collateral.value() < self.config.min_order_size {
            return Err(RejectReason::MinOrderSize);
        }
        if leverage.value() > self.config.max_leverage {
            return Err(RejectReason::MaxLeverage);
        }
        if self.book.len() >= self.config.max_positions {
            return Err(RejectReason::MaxPositions);
        }

        // an order too large to even size cannot be margined
        let required_margin = collateral
            .checked_mul(leverage.value())
            .and_then(|notional| notional.checked_mul(self.config.initial_margin_fraction))
            .ok_or(RejectReason::InsufficientMargin)?;
        if collateral < required_margin {
            return Err(RejectReason::InsufficientMargin);
        }
        if collateral > self.metrics.free_margin {
            return Err(RejectReason::InsufficientMargin);
        }

        Ok(price)
    }

    /// Close a position at the reference price with slippage against the closer.
    /// Unknown ids are a no-op (the position may have just been liquidated).
    pub fn close_position(&mut self, id: PositionId) -> Option<TradeRecord> {
        let Some(position) = self.book.remove(id) else {
            debug!(%id, "close ignored, unknown position");
            return None;
        };

        let price = self.reference_price.unwrap_or(position.mark_price);
        let fill_price = apply_slippage(price, position.side.opposite(), self.config.max_slippage, self.rng.as_mut());
        let close_fee = position.notional.mul(self.config.taker_fee);

        let gross_pnl = calculate_pnl(position.side, position.entry_price, fill_price, position.size_index);
        let net_pnl = gross_pnl
            .sub(position.open_fee)
            .sub(close_fee)
            .sub(position.realized_funding);

        let record = TradeRecord {
            id: position.id,
            kind: CloseKind::Closed,
            side: position.side,
            notional: position.notional,
            leverage: position.leverage,
            entry_price: position.entry_price,
            exit_price: fill_price,
            gross_pnl,
            fees: position.open_fee.add(close_fee),
            funding: position.realized_funding,
            net_pnl,
            opened_at: position.timestamp,
            closed_at: self.current_time,
        };

        self.account.realize_pnl(gross_pnl);
        self.account.charge_fee(close_fee);
        self.trade_history.push_newest_first(record.clone());
        self.recompute_metrics();

        info!(%id, exit = %fill_price, gross = %gross_pnl, net = %net_pnl, "position closed");
        Some(record)
    }
}
