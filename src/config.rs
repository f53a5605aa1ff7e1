// 7.0 config.rs: all ledger settings in one place. margins, fees, funding walk, price jitter, caps.
// 7.1 everything is fixed at construction. there is no runtime reconfiguration mid-session.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

// leverage above this is never a sane simulation and lets notionals approach Decimal::MAX
const MAX_LEVERAGE_CEILING: Decimal = dec!(1000);

/// Complete configuration for one ledger session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    // margin
    pub initial_margin_fraction: Decimal,
    pub maintenance_margin_fraction: Decimal,
    pub max_leverage: Decimal,

    // fees
    pub taker_fee: Decimal,
    pub liquidation_fee_rate: Decimal,
    pub max_slippage: Decimal,

    // order limits
    pub min_order_size: Decimal,
    pub max_positions: usize,
    // ceiling on total deposits. keeps every balance, notional and pnl far from Decimal::MAX
    pub max_account_balance: Decimal,

    // funding
    pub funding_period_ms: i64,
    pub initial_funding_rate: Decimal,
    pub max_funding_rate: Decimal,
    // drift sample is uniform in [-band/2, +band/2)
    pub funding_drift_band: Decimal,

    // price
    pub initial_price: Option<Decimal>,
    pub jitter_amplitude: Decimal,
    pub jitter_reversion: Decimal,
    pub price_stale_after_ms: i64,

    // history caps
    pub trade_history_cap: usize,
    pub funding_history_cap: usize,
    pub liquidation_log_cap: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            initial_margin_fraction: dec!(0.20),     // max 5x
            maintenance_margin_fraction: dec!(0.10), // liquidation threshold
            max_leverage: dec!(5),
            taker_fee: dec!(0.0008),
            liquidation_fee_rate: dec!(0.005),
            max_slippage: dec!(0.001),
            min_order_size: dec!(10),
            max_positions: 10,
            max_account_balance: dec!(1_000_000_000_000),
            funding_period_ms: 3_600_000,
            initial_funding_rate: dec!(0.0001),
            max_funding_rate: dec!(0.0005),
            funding_drift_band: dec!(0.00005),
            initial_price: Some(dec!(100)),
            jitter_amplitude: dec!(0.06),
            jitter_reversion: dec!(0.05),
            price_stale_after_ms: 120_000,
            trade_history_cap: 100,
            funding_history_cap: 200,
            liquidation_log_cap: 20,
        }
    }
}

impl LedgerConfig {
    /// Preset with no fees, no slippage and a frozen funding rate. Useful for
    /// walking through margin math by hand.
    pub fn frictionless() -> Self {
        Self {
            taker_fee: Decimal::ZERO,
            liquidation_fee_rate: Decimal::ZERO,
            max_slippage: Decimal::ZERO,
            funding_drift_band: Decimal::ZERO,
            ..Self::default()
        }
    }

    /// Parse a JSON document (missing fields fall back to defaults) and validate it.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: LedgerConfig =
            serde_json::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let unit = |v: Decimal| v > Decimal::ZERO && v < Decimal::ONE;

        if !unit(self.initial_margin_fraction) {
            return Err(ConfigError::InvalidMargin {
                reason: "IM fraction must be between 0 and 1".to_string(),
            });
        }
        if !unit(self.maintenance_margin_fraction) {
            return Err(ConfigError::InvalidMargin {
                reason: "MM fraction must be between 0 and 1".to_string(),
            });
        }
        if self.maintenance_margin_fraction >= self.initial_margin_fraction {
            return Err(ConfigError::InvalidMargin {
                reason: "MM fraction must be below IM fraction".to_string(),
            });
        }
        if self.max_leverage < Decimal::ONE || self.max_leverage > MAX_LEVERAGE_CEILING {
            return Err(ConfigError::InvalidMargin {
                reason: format!("max leverage must be between 1x and {}x", MAX_LEVERAGE_CEILING),
            });
        }

        if self.taker_fee < Decimal::ZERO
            || self.liquidation_fee_rate < Decimal::ZERO
            || self.max_slippage < Decimal::ZERO
        {
            return Err(ConfigError::InvalidFees {
                reason: "fees and slippage cannot be negative".to_string(),
            });
        }
        if self.taker_fee >= Decimal::ONE || self.max_slippage >= Decimal::ONE {
            return Err(ConfigError::InvalidFees {
                reason: "taker fee and slippage must be below 100%".to_string(),
            });
        }

        if self.min_order_size < Decimal::ZERO || self.max_positions == 0 {
            return Err(ConfigError::InvalidLimits {
                reason: "min order size must be >= 0 and max positions > 0".to_string(),
            });
        }
        if self.max_account_balance <= self.min_order_size {
            return Err(ConfigError::InvalidLimits {
                reason: "max account balance must exceed the min order size".to_string(),
            });
        }

        if self.funding_period_ms <= 0 {
            return Err(ConfigError::InvalidFunding {
                reason: "funding period must be positive".to_string(),
            });
        }
        if self.max_funding_rate < Decimal::ZERO
            || self.funding_drift_band < Decimal::ZERO
            || self.initial_funding_rate.abs() > self.max_funding_rate
        {
            return Err(ConfigError::InvalidFunding {
                reason: "funding rate bounds are inconsistent".to_string(),
            });
        }

        if matches!(self.initial_price, Some(p) if p <= Decimal::ZERO) {
            return Err(ConfigError::InvalidPrice {
                reason: "initial price must be positive when set".to_string(),
            });
        }
        if self.jitter_amplitude < Decimal::ZERO
            || self.jitter_reversion < Decimal::ZERO
            || self.jitter_reversion > Decimal::ONE
            || self.price_stale_after_ms <= 0
        {
            return Err(ConfigError::InvalidPrice {
                reason: "jitter and staleness settings out of range".to_string(),
            });
        }

        if self.trade_history_cap == 0 || self.funding_history_cap == 0 || self.liquidation_log_cap == 0 {
            return Err(ConfigError::InvalidLimits {
                reason: "history caps must be positive".to_string(),
            });
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid margin config: {reason}")]
    InvalidMargin { reason: String },

    #[error("invalid fee config: {reason}")]
    InvalidFees { reason: String },

    #[error("invalid order limits: {reason}")]
    InvalidLimits { reason: String },

    #[error("invalid funding config: {reason}")]
    InvalidFunding { reason: String },

    #[error("invalid price config: {reason}")]
    InvalidPrice { reason: String },

    #[error("config parse error: {0}")]
    Parse(String),
}
