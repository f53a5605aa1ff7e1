// 8.0 engine/core.rs: the ledger engine. single owner of account, book, funding, histories.
// every mutation goes through &mut self, so nothing can interleave.

use super::results::LedgerSnapshot;
use crate::account::{calculate_account_metrics, Account, AccountMetrics};
use crate::config::{ConfigError, LedgerConfig};
use crate::funding::{FundingParams, FundingState};
use crate::history::{BoundedHistory, FundingTick, TradeRecord};
use crate::position::{Position, PositionBook};
use crate::price_feed::{PriceJitter, PriceUpdate};
use crate::slippage::{RandomSource, SeededRandom};
use crate::types::{PositionId, Price, Timestamp};
use rust_decimal::Decimal;
use std::fmt;
use tracing::info;

/** 8.1: main engine struct. all state lives here */
pub struct Engine {
    pub(super) config: LedgerConfig,
    pub(super) funding_params: FundingParams,
    pub(super) rng: Box<dyn RandomSource>,
    pub(super) account: Account,
    pub(super) book: PositionBook,
    pub(super) metrics: AccountMetrics,
    pub(super) funding: FundingState,
    pub(super) reference_price: Option<Price>,
    pub(super) latest_update: Option<PriceUpdate>,
    pub(super) jitter: PriceJitter,
    pub(super) trade_history: BoundedHistory<TradeRecord>,
    pub(super) funding_history: BoundedHistory<FundingTick>,
    pub(super) liquidation_log: BoundedHistory<String>,
    pub(super) next_position_id: u64,
    pub(super) current_time: Timestamp,
}

impl Engine {
    pub fn new(config: LedgerConfig, rng: Box<dyn RandomSource>, start: Timestamp) -> Result<Self, ConfigError> {
        config.validate()?;

        let funding_params = FundingParams {
            period_ms: config.funding_period_ms,
            max_rate: config.max_funding_rate,
            drift_band: config.funding_drift_band,
        };
        let initial_price = config.initial_price.and_then(Price::new);

        Ok(Self {
            funding: FundingState::new(config.initial_funding_rate, start, config.funding_period_ms),
            jitter: PriceJitter::new(config.jitter_amplitude, config.jitter_reversion, initial_price),
            trade_history: BoundedHistory::new(config.trade_history_cap),
            funding_history: BoundedHistory::new(config.funding_history_cap),
            liquidation_log: BoundedHistory::new(config.liquidation_log_cap),
            reference_price: initial_price,
            latest_update: None,
            account: Account::new(),
            book: PositionBook::new(),
            metrics: AccountMetrics::default(),
            next_position_id: 1,
            current_time: start,
            funding_params,
            config,
            rng,
        })
    }

    /// Engine with an entropy-seeded random source.
    pub fn with_entropy(config: LedgerConfig, start: Timestamp) -> Result<Self, ConfigError> {
        Self::new(config, Box::new(SeededRandom::from_entropy()), start)
    }

    /// Starts a new session: zero balances, empty book and histories, fresh funding clock.
    /// Position ids keep counting so a handle from the old session never matches a new position.
    pub fn reset(&mut self, now: Timestamp) {
        let initial_price = self.config.initial_price.and_then(Price::new);

        self.account = Account::new();
        self.book.clear();
        self.funding = FundingState::new(self.config.initial_funding_rate, now, self.config.funding_period_ms);
        self.reference_price = initial_price;
        self.latest_update = None;
        self.jitter.anchor = initial_price;
        self.trade_history.clear();
        self.funding_history.clear();
        self.liquidation_log.clear();
        self.current_time = now;
        self.recompute_metrics();

        info!(time = %now, "ledger session reset");
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn time(&self) -> Timestamp {
        self.current_time
    }

    /// Moves the clock forward without ticking. Commands use it to stamp
    /// positions and trades with the time they arrived. Earlier times are ignored.
    pub fn set_time(&mut self, now: Timestamp) {
        self.current_time = self.current_time.max(now);
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    pub fn metrics(&self) -> AccountMetrics {
        self.metrics
    }

    pub fn positions(&self) -> &[Position] {
        self.book.as_slice()
    }

    pub fn position(&self, id: PositionId) -> Option<&Position> {
        self.book.get(id)
    }

    /// Most recent first.
    pub fn trade_history(&self) -> Vec<TradeRecord> {
        self.trade_history.to_vec()
    }

    /// Most recent first.
    pub fn liquidation_log(&self) -> Vec<String> {
        self.liquidation_log.to_vec()
    }

    /// Oldest first.
    pub fn funding_history(&self) -> Vec<FundingTick> {
        self.funding_history.to_vec()
    }

    pub fn funding_rate(&self) -> Decimal {
        self.funding.rate
    }

    pub fn next_funding_time(&self) -> Timestamp {
        self.funding.next_funding_time
    }

    pub fn reference_price(&self) -> Option<Price> {
        self.reference_price
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            time: self.current_time,
            reference_price: self.reference_price,
            funding_rate: self.funding.rate,
            next_funding_time: self.funding.next_funding_time,
            account: self.account.clone(),
            metrics: self.metrics,
            positions: self.book.as_slice().to_vec(),
            trade_history: self.trade_history(),
            funding_history: self.funding_history(),
            liquidation_log: self.liquidation_log(),
        }
    }

    pub(super) fn recompute_metrics(&mut self) {
        self.metrics = calculate_account_metrics(&self.account, &self.book, self.config.initial_margin_fraction);
    }

    pub(super) fn next_position_id(&mut self) -> PositionId {
        let id = PositionId(self.next_position_id);
        self.next_position_id += 1;
        id
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("time", &self.current_time)
            .field("reference_price", &self.reference_price)
            .field("account", &self.account)
            .field("metrics", &self.metrics)
            .field("open_positions", &self.book.len())
            .field("funding", &self.funding)
            .finish_non_exhaustive()
    }
}
