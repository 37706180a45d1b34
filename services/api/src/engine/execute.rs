use tracing::{debug, info};
use uuid::Uuid;

use super::{EngineResult, WithdrawEngine};
use crate::domain::{
    Settlement, WithdrawEvent, Withdrawal, ACCOUNT_NOT_FOUND_REASON, INSUFFICIENT_BALANCE_REASON,
};
use crate::store::{DebitOutcome, StorageTx, StoreError};

#[derive(Debug, Clone, PartialEq)]
pub enum Execution {
    /// This call moved the withdrawal to a terminal state.
    Settled(Withdrawal),
    /// Already terminal, or being settled by another transaction right now.
    AlreadySettled,
    /// Scheduled for later than "now".
    NotDue,
}

/// Locks the owning account, debits it and settles the withdrawal, all
/// inside `tx`. Nothing here is visible until the caller commits.
pub(super) async fn settle_locked(tx: &mut dyn StorageTx, withdrawal: Withdrawal) -> Result<Withdrawal, StoreError> {
    let settlement = match tx.find_account_for_update(withdrawal.account_id).await? {
        None => {
            info!(withdraw_id = %withdrawal.id, account_id = %withdrawal.account_id, "account missing at execution");
            Settlement::Failed(ACCOUNT_NOT_FOUND_REASON.to_string())
        }
        Some(account) => match tx.debit_locked(account.id, withdrawal.amount).await? {
            DebitOutcome::Applied { balance } => {
                debug!(withdraw_id = %withdrawal.id, %balance, "balance debited");
                Settlement::Succeeded
            }
            DebitOutcome::InsufficientFunds { balance } => {
                info!(
                    withdraw_id = %withdrawal.id,
                    amount = %withdrawal.amount,
                    %balance,
                    "insufficient balance"
                );
                Settlement::Failed(INSUFFICIENT_BALANCE_REASON.to_string())
            }
        },
    };

    tx.settle_withdraw(withdrawal.id, &settlement).await
}

impl WithdrawEngine {
    /// Settles one pending withdrawal in a fresh transaction. Safe to call
    /// for a withdrawal another caller is settling concurrently: exactly one
    /// of them gets `Execution::Settled`.
    pub async fn execute_one(&self, withdrawal: &Withdrawal) -> EngineResult<Execution> {
        let engine = self.clone();
        let id = withdrawal.id;
        tokio::spawn(async move { engine.execute_locked(id, None).await }).await?
    }

    /// Marks a still-pending withdrawal as `DONE_ERROR` with an internal
    /// error reason, without touching the balance.
    pub(super) async fn fail_internal(&self, id: Uuid, detail: String) -> EngineResult<Execution> {
        let engine = self.clone();
        let settlement = Settlement::internal_error(detail);
        tokio::spawn(async move { engine.execute_locked(id, Some(settlement)).await }).await?
    }

    async fn execute_locked(&self, id: Uuid, forced: Option<Settlement>) -> EngineResult<Execution> {
        let mut tx = self.storage.begin().await?;

        let staged = match forced {
            Some(settlement) => force_settle(tx.as_mut(), id, &settlement).await,
            None => self.claim_and_settle(tx.as_mut(), id).await,
        };

        match staged {
            Ok(Execution::Settled(withdrawal)) => {
                tx.commit().await?;
                info!(
                    withdraw_id = %withdrawal.id,
                    account_id = %withdrawal.account_id,
                    success = withdrawal.succeeded(),
                    reason = withdrawal.error_reason().unwrap_or_default(),
                    "withdraw settled"
                );
                self.publish(WithdrawEvent::processed(withdrawal.clone())).await;
                Ok(Execution::Settled(withdrawal))
            }
            Ok(other) => {
                tx.rollback().await?;
                Ok(other)
            }
            Err(err) => {
                self.abort(tx, &err).await;
                Err(err.into())
            }
        }
    }

    async fn claim_and_settle(&self, tx: &mut dyn StorageTx, id: Uuid) -> Result<Execution, StoreError> {
        let Some(withdrawal) = tx.lock_pending_withdraw(id).await? else {
            debug!(withdraw_id = %id, "withdraw already settled or in progress elsewhere");
            return Ok(Execution::AlreadySettled);
        };
        if !withdrawal.is_due(self.clock.now()) {
            return Ok(Execution::NotDue);
        }
        settle_locked(tx, withdrawal).await.map(Execution::Settled)
    }
}

async fn force_settle(tx: &mut dyn StorageTx, id: Uuid, settlement: &Settlement) -> Result<Execution, StoreError> {
    if tx.lock_pending_withdraw(id).await?.is_none() {
        return Ok(Execution::AlreadySettled);
    }
    tx.settle_withdraw(id, settlement).await.map(Execution::Settled)
}
