// 8.0.2: result types and rejections for ledger operations.

use crate::account::{Account, AccountMetrics};
use crate::history::{FundingTick, TradeRecord};
use crate::position::Position;
use crate::types::{Price, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Why a command was refused. Rejections never change state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectReason {
    #[error("no usable reference price")]
    ZeroPrice,

    #[error("account has no deposit")]
    NoDeposit,

    #[error("collateral below minimum order size")]
    MinOrderSize,

    #[error("leverage above maximum")]
    MaxLeverage,

    #[error("too many open positions")]
    MaxPositions,

    #[error("insufficient margin")]
    InsufficientMargin,

    #[error("amount exceeds free margin")]
    ExceedsFreeMargin,

    #[error("amount must be positive")]
    InvalidAmount,
}

/// What one tick did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    pub time: Timestamp,
    pub price: Option<Price>,
    pub price_from_oracle: bool,
    pub funding: Vec<FundingTick>,
    pub liquidations: Vec<TradeRecord>,
}

/// Consistent copy of every read surface at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub time: Timestamp,
    pub reference_price: Option<Price>,
    pub funding_rate: Decimal,
    pub next_funding_time: Timestamp,
    pub account: Account,
    pub metrics: AccountMetrics,
    pub positions: Vec<Position>,
    pub trade_history: Vec<TradeRecord>,
    pub funding_history: Vec<FundingTick>,
    pub liquidation_log: Vec<String>,
}
