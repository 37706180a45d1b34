use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info};
use uuid::Uuid;

use super::execute::settle_locked;
use super::{EngineError, EngineResult, WithdrawEngine};
use crate::domain::{validate_amount, PaymentKey, ValidationErrors, WithdrawEvent, WithdrawMethod, Withdrawal};
use crate::store::{NewWithdrawal, StorageTx, StoreError};

/// A withdrawal request as accepted by the engine.
#[derive(Debug, Clone)]
pub struct SubmitWithdraw {
    pub account_id: Uuid,
    pub method: WithdrawMethod,
    pub amount: Decimal,
    pub payment_key: PaymentKey,
    pub scheduled_for: Option<DateTime<Utc>>,
}

impl WithdrawEngine {
    /// Creates a withdrawal and, when it is immediate, settles it before
    /// returning. Insufficient funds is not an error here: the returned
    /// withdrawal is simply `DONE_ERROR`.
    pub async fn submit(&self, request: SubmitWithdraw) -> EngineResult<Withdrawal> {
        self.submit_before(request, Instant::now() + self.settings.submit_deadline)
            .await
    }

    /// Like [`submit`](Self::submit), but gives up with
    /// `DeadlineExceeded` if the locked section has not been entered by
    /// `deadline`. Once entered, it always runs to completion.
    pub async fn submit_before(&self, request: SubmitWithdraw, deadline: Instant) -> EngineResult<Withdrawal> {
        let now = self.clock.now();
        self.validate(&request, now)?;

        let prepare = async {
            let account = self
                .storage
                .find_account(request.account_id)
                .await?
                .ok_or(EngineError::AccountNotFound(request.account_id))?;
            let tx = self.storage.begin().await?;
            Ok::<_, EngineError>((account, tx))
        };
        let (account, tx) = timeout_at(deadline, prepare)
            .await
            .map_err(|_| EngineError::DeadlineExceeded)??;

        let new = NewWithdrawal {
            id: Uuid::new_v4(),
            account_id: account.id,
            method: request.method,
            amount: request.amount,
            scheduled_for: request.scheduled_for,
            payment_key: request.payment_key,
            created_at: now,
        };

        let engine = self.clone();
        tokio::spawn(async move { engine.create(tx, new).await }).await?
    }

    fn validate(&self, request: &SubmitWithdraw, now: DateTime<Utc>) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Err(amount_errors) = validate_amount(request.amount) {
            errors.extend(amount_errors);
        }
        if let Err(key_errors) = request.payment_key.validate() {
            errors.extend(key_errors);
        }
        if let Some(scheduled_for) = request.scheduled_for {
            if let Err(schedule_errors) = self.settings.policy.check(scheduled_for, now) {
                errors.extend(schedule_errors);
            }
        }
        errors.into_result()
    }

    async fn create(&self, mut tx: Box<dyn StorageTx>, new: NewWithdrawal) -> EngineResult<Withdrawal> {
        let withdrawal = match stage_new(tx.as_mut(), new).await {
            Ok(withdrawal) => withdrawal,
            Err(err) => {
                self.abort(tx, &err).await;
                return Err(err.into());
            }
        };
        tx.commit().await?;

        info!(
            withdraw_id = %withdrawal.id,
            account_id = %withdrawal.account_id,
            amount = %withdrawal.amount,
            scheduled = withdrawal.is_scheduled(),
            done = withdrawal.is_done(),
            error = withdrawal.is_error(),
            "withdraw created"
        );

        let event = if withdrawal.is_scheduled() {
            WithdrawEvent::Scheduled(withdrawal.clone())
        } else {
            WithdrawEvent::processed(withdrawal.clone())
        };
        self.publish(event).await;

        Ok(withdrawal)
    }
}

async fn stage_new(tx: &mut dyn StorageTx, new: NewWithdrawal) -> Result<Withdrawal, StoreError> {
    // The account lock must come before the insert. The insert's foreign key
    // check takes a share lock on the account row, and two submitters each
    // holding that share lock would deadlock upgrading to FOR UPDATE.
    if new.scheduled_for.is_none() {
        tx.find_account_for_update(new.account_id).await?;
    }
    let withdrawal = tx.insert_withdraw(new).await?;
    if let Some(scheduled_for) = withdrawal.scheduled_for {
        debug!(withdraw_id = %withdrawal.id, %scheduled_for, "withdraw deferred to sweep");
        return Ok(withdrawal);
    }
    settle_locked(tx, withdrawal).await
}
