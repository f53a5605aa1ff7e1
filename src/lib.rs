// perp-ledger: single-account perpetual futures margin ledger.
// risk-first: margin math, funding and liquidation run on exact decimals.
// the engine is deterministic given its random source and clock; the scheduler
// adds the only async piece.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: PositionId, Side, Price, Quote, Leverage, Timestamp
//   4.x  position.rs: position struct, PnL, mark to market, position book
//   5.x  funding.rs: hourly funding clock, rate drift, payments
//   6.x  liquidation.rs: liquidation price, health check, penalty, outcome
//   7.x  config.rs: margins, fees, limits, funding and price params
//   8.x  engine/: core engine: orders, pricing, funding, liquidations, tick
//   9.x  price_feed.rs: oracle updates, price sources, jitter fallback
//   10.x account.rs: account balances + derived metrics
//   14.x slippage.rs: random source + fill slippage
//   15.x history.rs: trade records, funding ticks, bounded logs
//   16.x scheduler.rs: tokio tick loop + command handle

// core ledger modules
pub mod account;
pub mod engine;
pub mod funding;
pub mod history;
pub mod liquidation;
pub mod position;
pub mod types;

// pricing and randomness
pub mod price_feed;
pub mod slippage;

// integration modules
pub mod config;
pub mod scheduler;

// re exports for convenience
pub use account::*;
pub use engine::*;
pub use funding::*;
pub use history::*;
pub use liquidation::*;
pub use position::*;
pub use types::*;
pub use config::{ConfigError, LedgerConfig};
pub use price_feed::{LatestPrice, MockPriceFeed, PriceJitter, PriceSource, PriceUpdate, PriceWatch};
pub use scheduler::{LedgerHandle, Scheduler, SchedulerConfig, SchedulerError};
pub use slippage::{apply_slippage, FixedRandom, RandomSource, SeededRandom, SequenceRandom};
