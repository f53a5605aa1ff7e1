//! Tick scheduler and command actor.
//!
//! One tokio task owns the `Engine`. Commands arrive over an mpsc channel and
//! are answered on a oneshot; ticks come from a fixed interval. A due tick wins
//! the select, then commands already queued are drained ahead of it, at most
//! one buffer's worth, so a command flood can delay a tick by a bounded amount
//! but never starve it. Each tick is synchronous, so a tick in flight is never
//! interrupted.
//!
//! A polled price source only feeds the engine when its update is newer than
//! the one held, so an explicit `push_price` with a later timestamp wins.

use crate::engine::{Engine, LedgerSnapshot, RejectReason};
use crate::history::TradeRecord;
use crate::price_feed::{PriceSource, PriceUpdate};
use crate::types::{Leverage, PositionId, Quote, Side, Timestamp};
use std::time::Duration;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub tick_interval: Duration,
    pub command_buffer: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(2),
            command_buffer: 256,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerError {
    #[error("command rejected: {0}")]
    Rejected(#[from] RejectReason),

    #[error("ledger actor has stopped")]
    Closed,
}

enum Command {
    Deposit {
        amount: Quote,
        reply: oneshot::Sender<Result<(), RejectReason>>,
    },
    Withdraw {
        amount: Quote,
        reply: oneshot::Sender<Result<(), RejectReason>>,
    },
    Open {
        side: Side,
        collateral: Quote,
        leverage: Leverage,
        reply: oneshot::Sender<Result<PositionId, RejectReason>>,
    },
    Close {
        id: PositionId,
        reply: oneshot::Sender<Option<TradeRecord>>,
    },
    PushPrice(PriceUpdate),
    Snapshot {
        reply: oneshot::Sender<LedgerSnapshot>,
    },
    Reset {
        reply: oneshot::Sender<()>,
    },
    Shutdown,
}

/// Cloneable front door to the ledger actor.
#[derive(Debug, Clone)]
pub struct LedgerHandle {
    tx: mpsc::Sender<Command>,
}

impl LedgerHandle {
    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T, SchedulerError> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(build(reply)).await.map_err(|_| SchedulerError::Closed)?;
        rx.await.map_err(|_| SchedulerError::Closed)
    }

    pub async fn deposit(&self, amount: Quote) -> Result<(), SchedulerError> {
        self.request(|reply| Command::Deposit { amount, reply }).await??;
        Ok(())
    }

    pub async fn withdraw(&self, amount: Quote) -> Result<(), SchedulerError> {
        self.request(|reply| Command::Withdraw { amount, reply }).await??;
        Ok(())
    }

    pub async fn open(&self, side: Side, collateral: Quote, leverage: Leverage) -> Result<PositionId, SchedulerError> {
        let id = self
            .request(|reply| Command::Open {
                side,
                collateral,
                leverage,
                reply,
            })
            .await??;
        Ok(id)
    }

    /// `Ok(None)` when the position is already gone.
    pub async fn close(&self, id: PositionId) -> Result<Option<TradeRecord>, SchedulerError> {
        self.request(|reply| Command::Close { id, reply }).await
    }

    pub async fn push_price(&self, update: PriceUpdate) -> Result<(), SchedulerError> {
        self.tx
            .send(Command::PushPrice(update))
            .await
            .map_err(|_| SchedulerError::Closed)
    }

    pub async fn snapshot(&self) -> Result<LedgerSnapshot, SchedulerError> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    pub async fn reset(&self) -> Result<(), SchedulerError> {
        self.request(|reply| Command::Reset { reply }).await
    }

    /// Stops future ticks. The actor's join handle then yields the engine.
    pub async fn shutdown(&self) -> Result<(), SchedulerError> {
        self.tx.send(Command::Shutdown).await.map_err(|_| SchedulerError::Closed)
    }
}

pub struct Scheduler {
    engine: Engine,
    commands: mpsc::Receiver<Command>,
    price_source: Option<Box<dyn PriceSource>>,
    config: SchedulerConfig,
    origin: Timestamp,
    started: Instant,
}

impl Scheduler {
    /// Moves the engine into a new task. The clock starts at the engine's current time.
    pub fn spawn(
        engine: Engine,
        config: SchedulerConfig,
        price_source: Option<Box<dyn PriceSource>>,
    ) -> (LedgerHandle, JoinHandle<Engine>) {
        let (tx, rx) = mpsc::channel(config.command_buffer.max(1));
        let scheduler = Scheduler {
            origin: engine.time(),
            started: Instant::now(),
            engine,
            commands: rx,
            price_source,
            config,
        };
        let task = tokio::spawn(scheduler.run());
        (LedgerHandle { tx }, task)
    }

    fn now(&self) -> Timestamp {
        let elapsed = i64::try_from(self.started.elapsed().as_millis()).unwrap_or(i64::MAX);
        self.origin.plus_millis(elapsed)
    }

    async fn run(mut self) -> Engine {
        let mut ticker = tokio::time::interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // the first interval tick fires immediately
        ticker.tick().await;

        info!(
            interval_ms = self.config.tick_interval.as_millis() as u64,
            source = ?self.price_source.as_ref().map(|s| s.name()),
            "scheduler started"
        );

        loop {
            tokio::select! {
                biased;
                _ = ticker.tick() => {
                    if !self.drain_queued() {
                        break;
                    }
                    self.on_tick();
                }
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle(command),
                },
            }
        }

        info!(time = %self.engine.time(), "scheduler stopped");
        self.engine
    }

    /// Applies commands queued before the tick, up to one buffer's worth.
    /// Returns false when the actor should stop.
    fn drain_queued(&mut self) -> bool {
        for _ in 0..self.config.command_buffer.max(1) {
            match self.commands.try_recv() {
                Ok(Command::Shutdown) | Err(TryRecvError::Disconnected) => return false,
                Ok(command) => self.handle(command),
                Err(TryRecvError::Empty) => break,
            }
        }
        true
    }

    fn on_tick(&mut self) {
        if let Some(update) = self.price_source.as_ref().and_then(|s| s.latest()) {
            self.engine.offer_price(update);
        }
        let now = self.now();
        self.engine.tick(now);
    }

    // a dropped reply receiver means the caller gave up; the command still applied
    fn handle(&mut self, command: Command) {
        let now = self.now();
        self.engine.set_time(now);

        match command {
            Command::Deposit { amount, reply } => {
                let _ = reply.send(self.engine.deposit(amount));
            }
            Command::Withdraw { amount, reply } => {
                let _ = reply.send(self.engine.withdraw(amount));
            }
            Command::Open {
                side,
                collateral,
                leverage,
                reply,
            } => {
                let _ = reply.send(self.engine.open_position(side, collateral, leverage));
            }
            Command::Close { id, reply } => {
                let _ = reply.send(self.engine.close_position(id));
            }
            Command::PushPrice(update) => self.engine.push_price(update),
            Command::Snapshot { reply } => {
                let _ = reply.send(self.engine.snapshot());
            }
            Command::Reset { reply } => {
                self.engine.reset(now);
                let _ = reply.send(());
            }
            Command::Shutdown => debug!("shutdown handled by run loop"),
        }
    }
}
