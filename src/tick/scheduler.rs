//! The scheduler that drives `TickPipeline::run_tick` (spec.md §4.7): either
//! on a real-time interval (`Driven`) or on an explicit advance command
//! (`Stepped`, for tests/replays/operator-controlled demos).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::info;

use super::pipeline::{TickOutcome, TickPipeline};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerMode {
    Driven,
    Stepped,
}

/// One entry in the `Stepped`-mode advance channel: fire the next tick, then
/// report its outcome back to whoever asked for the advance (an operator
/// endpoint, a test harness).
struct AdvanceRequest {
    reply: oneshot::Sender<TickOutcome>,
}

/// Owns the current tick counter and, in `Stepped` mode, the channel an
/// operator uses to advance the clock by hand.
pub struct TickScheduler {
    pipeline: Arc<TickPipeline>,
    mode: SchedulerMode,
    tick: Arc<AtomicU64>,
    advance_tx: mpsc::Sender<AdvanceRequest>,
    advance_rx: parking_lot::Mutex<Option<mpsc::Receiver<AdvanceRequest>>>,
}

impl TickScheduler {
    pub fn new(pipeline: Arc<TickPipeline>, mode: SchedulerMode) -> Self {
        let (advance_tx, advance_rx) = mpsc::channel(8);
        Self {
            pipeline,
            mode,
            tick: Arc::new(AtomicU64::new(0)),
            advance_tx,
            advance_rx: parking_lot::Mutex::new(Some(advance_rx)),
        }
    }

    pub fn current_tick(&self) -> u64 {
        self.tick.load(Ordering::SeqCst)
    }

    /// Runs the scheduler loop to completion (it never returns in `Driven`
    /// mode short of the process shutting down; in `Stepped` mode it runs
    /// until the advance channel is closed). Intended to be spawned as its
    /// own `tokio::task`.
    pub async fn run(&self, tick_interval: std::time::Duration) {
        match self.mode {
            SchedulerMode::Driven => self.run_driven(tick_interval).await,
            SchedulerMode::Stepped => self.run_stepped().await,
        }
    }

    async fn run_driven(&self, tick_interval: std::time::Duration) {
        let mut interval = tokio::time::interval(tick_interval);
        loop {
            interval.tick().await;
            self.advance_once().await;
        }
    }

    async fn run_stepped(&self) {
        let mut rx = match self.advance_rx.lock().take() {
            Some(rx) => rx,
            None => {
                info!("stepped scheduler already consumed its advance channel");
                return;
            }
        };
        while let Some(request) = rx.recv().await {
            let outcome = self.advance_once().await;
            let _ = request.reply.send(outcome);
        }
    }

    /// In `Stepped` mode, requests one tick and waits for its outcome. Used
    /// by the operator-facing `/world/tick` endpoint.
    pub async fn advance(&self) -> TickOutcome {
        if self.mode == SchedulerMode::Driven {
            return self.advance_once().await;
        }
        let (reply, rx) = oneshot::channel();
        if self.advance_tx.send(AdvanceRequest { reply }).await.is_err() {
            return self.advance_once().await;
        }
        rx.await.unwrap_or_default()
    }

    async fn advance_once(&self) -> TickOutcome {
        let tick = self.tick.fetch_add(1, Ordering::SeqCst) + 1;
        self.pipeline.run_tick(tick).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::PendingFillQueue;
    use crate::domain::NullNewsSource;
    use crate::matching::MatchingEngine;
    use crate::persistence::memory::MemoryGateway;
    use crate::realtime::EventBus;
    use crate::webhook::WebhookDispatcher;
    use crate::world::DefaultRegimePolicy;
    use rust_decimal_macros::dec;

    fn test_pipeline() -> Arc<TickPipeline> {
        let gateway: Arc<dyn crate::persistence::PersistenceGateway> = Arc::new(MemoryGateway::new());
        let engine = MatchingEngine::new();
        let pending_fills: PendingFillQueue = Arc::new(parking_lot::Mutex::new(Vec::new()));
        Arc::new(TickPipeline::new(
            gateway,
            engine,
            EventBus::new(),
            pending_fills,
            Arc::new(DefaultRegimePolicy),
            Arc::new(WebhookDispatcher::new(4)),
            Arc::new(NullNewsSource),
            Arc::new(crate::config::Config {
                database_url: ":memory:".to_string(),
                jwt_secret: "x".repeat(32),
                api_secret: "x".repeat(32),
                bind_addr: "0.0.0.0:0".to_string(),
                tick_interval_ms: 1000,
                ticks_per_trading_day: 390,
                ticks_after_hours: 60,
                market_open_tick: 0,
                market_close_tick: 390,
                max_order_quantity: 1_000_000,
                min_order_quantity: 1,
                min_price: dec!(0.01),
                max_price: dec!(1000000),
                max_leverage: 10,
                default_margin_requirement: dec!(0.5),
                tick_event_retention: 10_000,
                webhook_concurrency: 4,
                regime_window_ticks: 50,
                starting_cash: dec!(100000),
            }),
        ))
    }

    #[tokio::test]
    async fn stepped_mode_advances_one_tick_per_request() {
        let scheduler = TickScheduler::new(test_pipeline(), SchedulerMode::Stepped);
        let scheduler = Arc::new(scheduler);
        let driver = scheduler.clone();
        tokio::spawn(async move { driver.run_stepped().await });

        let outcome = scheduler.advance().await;
        assert_eq!(outcome.tick, 1);
        let outcome = scheduler.advance().await;
        assert_eq!(outcome.tick, 2);
    }

    #[tokio::test]
    async fn current_tick_reflects_the_last_completed_advance() {
        let scheduler = TickScheduler::new(test_pipeline(), SchedulerMode::Stepped);
        let scheduler = Arc::new(scheduler);
        let driver = scheduler.clone();
        tokio::spawn(async move { driver.run_stepped().await });

        scheduler.advance().await;
        scheduler.advance().await;
        assert_eq!(scheduler.current_tick(), 2);
    }
}
