//! The withdrawal processing engine.
//!
//! The engine owns no state of its own. It validates requests, drives the
//! withdrawal state machine through `Storage` units of work, and publishes
//! `WithdrawEvent`s once the state they describe has been committed.
//!
//! Every section that holds a row lock runs on its own spawned task: if the
//! caller's future is dropped (client disconnect, timeout) the transaction
//! still runs to commit or rollback instead of being abandoned with the lock
//! held.

mod error;
mod execute;
mod submit;
mod sweep;

pub use error::{EngineError, EngineResult};
pub use execute::Execution;
pub use submit::SubmitWithdraw;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::domain::{Account, SchedulePolicy, WithdrawEvent, Withdrawal};
use crate::store::{Storage, StorageTx, StoreError};

pub const DEFAULT_HISTORY_LIMIT: i64 = 50;
pub const MAX_HISTORY_LIMIT: i64 = 100;

#[derive(Debug, Clone, Copy)]
pub struct EngineSettings {
    pub policy: SchedulePolicy,
    /// Budget for everything before the locked section of a submission.
    pub submit_deadline: Duration,
}

#[derive(Clone)]
pub struct WithdrawEngine {
    storage: Arc<dyn Storage>,
    clock: Arc<dyn Clock>,
    events: mpsc::Sender<WithdrawEvent>,
    settings: EngineSettings,
}

impl WithdrawEngine {
    pub fn new(
        storage: Arc<dyn Storage>,
        clock: Arc<dyn Clock>,
        events: mpsc::Sender<WithdrawEvent>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            storage,
            clock,
            events,
            settings,
        }
    }

    pub fn policy(&self) -> &SchedulePolicy {
        &self.settings.policy
    }

    pub async fn account(&self, id: Uuid) -> EngineResult<Account> {
        self.storage
            .find_account(id)
            .await?
            .ok_or(EngineError::AccountNotFound(id))
    }

    /// A withdrawal is only visible through the account that owns it.
    pub async fn withdraw(&self, account_id: Uuid, withdraw_id: Uuid) -> EngineResult<Withdrawal> {
        self.storage
            .find_withdraw(withdraw_id)
            .await?
            .filter(|withdrawal| withdrawal.account_id == account_id)
            .ok_or(EngineError::WithdrawNotFound(withdraw_id))
    }

    /// Newest first. `limit` is clamped to `1..=100` and defaults to 50.
    pub async fn history(&self, account_id: Uuid, limit: Option<i64>) -> EngineResult<(Vec<Withdrawal>, i64)> {
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT).clamp(1, MAX_HISTORY_LIMIT);
        let withdrawals = self.storage.withdraw_history(account_id, limit).await?;
        Ok((withdrawals, limit))
    }

    async fn publish(&self, event: WithdrawEvent) {
        let withdraw_id = event.withdrawal().id;
        if self.events.send(event).await.is_err() {
            warn!(%withdraw_id, "notification channel closed, event dropped");
        }
    }

    async fn abort(&self, tx: Box<dyn StorageTx>, cause: &StoreError) {
        if let Err(rollback_err) = tx.rollback().await {
            error!(error = %rollback_err, cause = %cause, "rollback failed");
        }
    }
}
