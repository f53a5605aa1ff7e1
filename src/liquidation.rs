//! Liquidation logic and conditions.
//!
//! A position is liquidated when its own equity (collateral plus unrealized pnl
//! minus accrued funding) falls to or below its maintenance margin. The
//! liquidation price stored on a position is informational only; the live
//! health check is what triggers a liquidation.

use crate::history::{CloseKind, TradeRecord};
use crate::position::Position;
use crate::types::{Price, Quote, Side, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Price at which position equity equals maintenance margin, ignoring funding.
/// Clamped at zero.
pub fn calculate_liquidation_price(
    side: Side,
    entry_price: Price,
    collateral: Quote,
    notional: Quote,
    maintenance_margin: Quote,
) -> Decimal {
    if notional.value().is_zero() {
        return Decimal::ZERO;
    }

    let buffer = collateral.value() - maintenance_margin.value();
    let move_fraction = buffer / notional.value();

    let liq_price = match side {
        Side::Long => entry_price.value() * (Decimal::ONE - move_fraction),
        Side::Short => entry_price.value() * (Decimal::ONE + move_fraction),
    };

    liq_price.max(Decimal::ZERO)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HealthStatus {
    Healthy { equity: Quote, buffer: Quote },
    Liquidatable { equity: Quote, shortfall: Quote },
}

impl HealthStatus {
    pub fn is_liquidatable(&self) -> bool {
        matches!(self, HealthStatus::Liquidatable { .. })
    }
}

/// Health of a position at its current mark. Equity equal to maintenance margin is already liquidatable.
pub fn evaluate_health(position: &Position) -> HealthStatus {
    let equity = position.equity();
    if equity <= position.maintenance_margin {
        HealthStatus::Liquidatable {
            equity,
            shortfall: position.maintenance_margin.sub(equity),
        }
    } else {
        HealthStatus::Healthy {
            equity,
            buffer: equity.sub(position.maintenance_margin),
        }
    }
}

pub fn calculate_liquidation_penalty(notional: Quote, liquidation_fee_rate: Decimal) -> Quote {
    notional.mul(liquidation_fee_rate)
}

/// Everything a liquidation does to the ledger, computed from the position alone.
#[derive(Debug, Clone, PartialEq)]
pub struct LiquidationOutcome {
    pub record: TradeRecord,
    pub penalty: Quote,
    // flows into the account's realized pnl
    pub realized_pnl: Quote,
    pub log_line: String,
}

pub fn liquidate(position: &Position, liquidation_fee_rate: Decimal, now: Timestamp) -> LiquidationOutcome {
    let penalty = calculate_liquidation_penalty(position.notional, liquidation_fee_rate);
    let net_pnl = position
        .unrealized_pnl
        .sub(position.open_fee)
        .sub(penalty)
        .sub(position.realized_funding);

    let record = TradeRecord {
        id: position.id,
        kind: CloseKind::Liquidated,
        side: position.side,
        notional: position.notional,
        leverage: position.leverage,
        entry_price: position.entry_price,
        exit_price: position.mark_price,
        gross_pnl: position.unrealized_pnl,
        fees: position.open_fee.add(penalty),
        funding: position.realized_funding,
        net_pnl,
        opened_at: position.timestamp,
        closed_at: now,
    };

    let log_line = format!(
        "LIQUIDATED {} ${:.0} @ {:.2} | Loss: ${:.2}",
        position.side,
        position.notional.value(),
        position.mark_price.value(),
        net_pnl.value().abs(),
    );

    LiquidationOutcome {
        record,
        penalty,
        realized_pnl: position.unrealized_pnl,
        log_line,
    }
}
