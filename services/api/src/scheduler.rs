use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

use crate::engine::WithdrawEngine;

pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// Sweeps due withdrawals forever. The first sweep runs immediately; a sweep
/// that overruns the interval delays the next tick instead of queueing
/// catch-up runs.
pub async fn run(engine: WithdrawEngine, every: Duration) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(interval_secs = every.as_secs(), "withdraw scheduler started");

    loop {
        ticker.tick().await;
        match engine.sweep_due().await {
            Ok(processed) => info!(processed, "scheduled withdraw sweep finished"),
            Err(err) => error!(error = %err, "scheduled withdraw sweep failed"),
        }
    }
}
