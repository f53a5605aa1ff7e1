// 8.0: ledger engine. coordinates account commands, price refresh, funding settlement,
// and the liquidation sweep. deterministic given its random source and clock.

mod core;
mod funding;
mod liquidations;
mod orders;
mod pricing;
mod results;
mod tick;

pub use self::core::Engine;
pub use results::{LedgerSnapshot, RejectReason, TickReport};
