//! Perpetual ledger simulation.
//!
//! Walks one account through open, mark, close, a funding-driven liquidation,
//! and a short live run under the tick scheduler, then prints the final ledger
//! snapshot as JSON.
//!
//! Usage: `perp-ledger-sim [config.json]`. Log level comes from `RUST_LOG`.

use perp_ledger::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::error::Error;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

type SimResult<T> = Result<T, Box<dyn Error>>;

#[tokio::main(flavor = "current_thread")]
async fn main() -> SimResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let config = load_config()?;

    println!("Perpetual Ledger Simulation");
    println!("Single Account, Isolated Positions, Hourly Funding\n");

    scenario_1_open_and_close(&config)?;
    scenario_2_funding_liquidation(&config)?;
    let engine = scenario_3_live_scheduler(&config).await?;

    println!("Final snapshot:");
    println!("{}", serde_json::to_string_pretty(&engine.snapshot())?);
    Ok(())
}

fn load_config() -> SimResult<LedgerConfig> {
    match std::env::args().nth(1) {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)?;
            let config = LedgerConfig::from_json(&raw)?;
            tracing::info!(%path, "loaded ledger config");
            Ok(config)
        }
        None => Ok(LedgerConfig::default()),
    }
}

/// Deposit, open a 3x long, mark it up, close it.
fn scenario_1_open_and_close(config: &LedgerConfig) -> SimResult<()> {
    println!("Scenario 1: Open, Mark, Close\n");

    let start = Timestamp::now();
    let frictionless = LedgerConfig {
        max_slippage: Decimal::ZERO,
        ..config.clone()
    };
    let mut engine = Engine::new(frictionless, Box::new(SeededRandom::seeded(7)), start)?;

    engine.deposit(Quote::new(dec!(1000)))?;
    let id = engine.open_position(Side::Long, Quote::new(dec!(100)), leverage(dec!(3))?)?;

    if let Some(pos) = engine.position(id) {
        println!("  {} {} {} @ ${}", pos.id, pos.side, pos.leverage, pos.entry_price);
        println!("  Notional: ${}, MM: ${}", pos.notional, pos.maintenance_margin);
        println!("  Liquidation price: ${:.2}", pos.liquidation_price);
    }

    engine.push_price(PriceUpdate::new(dec!(110), start));
    engine.tick(start.plus_millis(2_000));

    if let Some(pos) = engine.position(id) {
        println!("  Oracle at $110, uPnL ${} ({:.2}%)", pos.unrealized_pnl, pos.unrealized_pnl_percent);
    }

    if let Some(record) = engine.close_position(id) {
        println!(
            "  Closed @ ${}, gross ${}, fees ${}, net ${}",
            record.exit_price, record.gross_pnl, record.fees, record.net_pnl
        );
    }

    let metrics = engine.metrics();
    println!("  Equity ${}, free margin ${}\n", metrics.equity, metrics.free_margin);
    Ok(())
}

/// A 5x long sitting just above maintenance is pushed under by funding.
fn scenario_2_funding_liquidation(config: &LedgerConfig) -> SimResult<()> {
    println!("Scenario 2: Funding Tips a Position Into Liquidation\n");

    let start = Timestamp::now();
    let tuned = LedgerConfig {
        max_slippage: Decimal::ZERO,
        initial_funding_rate: config.max_funding_rate,
        ..config.clone()
    };
    // 0.5 keeps the funding rate where it starts
    let mut engine = Engine::new(tuned, Box::new(FixedRandom(dec!(0.5))), start)?;

    engine.deposit(Quote::new(dec!(1000)))?;
    let id = engine.open_position(Side::Long, Quote::new(dec!(100)), leverage(dec!(5))?)?;

    let steps = [dec!(96), dec!(93), dec!(91), dec!(90.05)];
    for (i, price) in steps.into_iter().enumerate() {
        let at = start.plus_millis((i as i64 + 1) * 60_000);
        engine.push_price(PriceUpdate::new(price, at));
        let report = engine.tick(at);
        if let Some(pos) = engine.position(id) {
            println!("  ${}: equity ${}, MM ${}", price, pos.equity(), pos.maintenance_margin);
        }
        if !report.liquidations.is_empty() {
            println!("  liquidated before funding at ${}", price);
        }
    }

    let funding_time = engine.next_funding_time();
    engine.push_price(PriceUpdate::new(dec!(90.05), funding_time));
    let report = engine.tick(funding_time);

    for tick in &report.funding {
        println!("  Funding {} rate {} paid ${}", tick.position_id, tick.rate, tick.payment);
    }
    for line in engine.liquidation_log() {
        println!("  {}", line);
    }

    let account = engine.account();
    println!(
        "  Realized PnL ${}, fees ${}, funding ${}\n",
        account.realized_pnl, account.total_fees_paid, account.total_funding_paid
    );
    Ok(())
}

/// Runs the scheduler on a short interval with a shared oracle cell.
async fn scenario_3_live_scheduler(config: &LedgerConfig) -> SimResult<Engine> {
    println!("Scenario 3: Live Scheduler\n");

    let engine = Engine::with_entropy(config.clone(), Timestamp::now())?;
    let oracle = LatestPrice::new();
    let schedule = SchedulerConfig {
        tick_interval: Duration::from_millis(100),
        ..SchedulerConfig::default()
    };

    let (handle, task) = Scheduler::spawn(engine, schedule, Some(Box::new(oracle.subscribe())));

    handle.deposit(Quote::new(dec!(2000))).await?;
    let long = handle.open(Side::Long, Quote::new(dec!(200)), leverage(dec!(4))?).await?;
    let short = handle.open(Side::Short, Quote::new(dec!(150)), leverage(dec!(2))?).await?;
    println!("  Opened {} and {}", long, short);

    match handle.open(Side::Long, Quote::new(dec!(5)), leverage(dec!(2))?).await {
        Err(SchedulerError::Rejected(reason)) => println!("  $5 order rejected: {}", reason),
        other => println!("  $5 order: {:?}", other),
    }

    for price in [dec!(100.4), dec!(101.2), dec!(99.7)] {
        oracle.publish(PriceUpdate::new(price, Timestamp::now()));
        tokio::time::sleep(Duration::from_millis(250)).await;
    }

    let snapshot = handle.snapshot().await?;
    println!(
        "  Mark ${}, uPnL ${}, margin ratio {:.4}",
        snapshot.reference_price.map(|p| p.value()).unwrap_or_default(),
        snapshot.metrics.total_unrealized_pnl,
        snapshot.metrics.margin_ratio
    );

    if let Some(record) = handle.close(short).await? {
        println!("  Closed {} net ${}", record.id, record.net_pnl);
    }

    handle.shutdown().await?;
    let engine = task.await?;
    println!("  Scheduler stopped with {} open position(s)\n", engine.positions().len());
    Ok(engine)
}

fn leverage(value: Decimal) -> SimResult<Leverage> {
    Leverage::new(value).ok_or_else(|| format!("invalid leverage {}", value).into())
}
