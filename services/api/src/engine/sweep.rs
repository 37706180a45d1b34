use tracing::{debug, error, info};

use super::{EngineResult, Execution, WithdrawEngine};

impl WithdrawEngine {
    /// Settles every scheduled withdrawal whose time has come and returns
    /// how many this call moved to a terminal state.
    ///
    /// Rows settled by an overlapping sweep are skipped, so invoking this
    /// concurrently or back to back never debits twice. A fault on one row
    /// marks that row `DONE_ERROR` and the sweep carries on.
    pub async fn sweep_due(&self) -> EngineResult<usize> {
        let now = self.clock.now();
        let due = self.storage.find_due(now).await?;
        if due.is_empty() {
            debug!(%now, "no scheduled withdraws due");
            return Ok(0);
        }

        info!(due = due.len(), %now, "processing scheduled withdraws");

        let mut processed = 0;
        for withdrawal in &due {
            match self.execute_one(withdrawal).await {
                Ok(Execution::Settled(_)) => processed += 1,
                Ok(Execution::AlreadySettled | Execution::NotDue) => {}
                Err(err) => {
                    error!(
                        withdraw_id = %withdrawal.id,
                        error = %err,
                        "error processing scheduled withdraw"
                    );
                    match self.fail_internal(withdrawal.id, err.to_string()).await {
                        Ok(Execution::Settled(_)) => processed += 1,
                        Ok(_) => {}
                        Err(mark_err) => error!(
                            withdraw_id = %withdrawal.id,
                            error = %mark_err,
                            "could not mark withdraw as failed, leaving it for the next sweep"
                        ),
                    }
                }
            }
        }

        info!(processed, due = due.len(), "scheduled withdraws processed");
        Ok(processed)
    }
}
