//! Customer e-mails for withdrawal events.
//!
//! Each (withdrawal, outcome) pair is delivered at most once per dedup
//! window: the key is claimed before sending and released only when the
//! send fails, so a redelivered event can retry.

mod dedup;
mod mailer;
mod templates;

pub use dedup::{DedupStore, InMemoryDedup};
pub use mailer::{EmailMessage, HttpMailer, LogMailer, MailError, Mailer, Sender};
pub use templates::EmailTemplates;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::domain::WithdrawEvent;

pub const DEFAULT_DEDUP_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Dedup store error: {0}")]
    Dedup(#[from] redis_cache::RedisError),

    #[error(transparent)]
    Mail(#[from] MailError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Sent,
    /// Another delivery already claimed this key.
    Duplicate,
    /// No deliverable recipient.
    Skipped,
    Failed,
}

#[derive(Clone)]
pub struct NotificationDispatcher {
    dedup: Arc<dyn DedupStore>,
    mailer: Arc<dyn Mailer>,
    templates: EmailTemplates,
    ttl: Duration,
}

impl NotificationDispatcher {
    pub fn new(dedup: Arc<dyn DedupStore>, mailer: Arc<dyn Mailer>, templates: EmailTemplates, ttl: Duration) -> Self {
        Self {
            dedup,
            mailer,
            templates,
            ttl,
        }
    }

    /// Consumes events until every sender is dropped.
    pub async fn run(self, mut events: mpsc::Receiver<WithdrawEvent>) {
        info!("notification dispatcher started");
        while let Some(event) = events.recv().await {
            self.dispatch(&event).await;
        }
        info!("notification channel closed, dispatcher stopped");
    }

    /// Never fails: delivery problems are logged and reported in the outcome.
    pub async fn dispatch(&self, event: &WithdrawEvent) -> DispatchOutcome {
        let withdrawal = event.withdrawal();
        let event_key = event.dedup_key();

        if !withdrawal.payment_key.is_deliverable_email() {
            warn!(
                withdraw_id = %withdrawal.id,
                pix_key = %withdrawal.payment_key.value,
                "invalid PIX email for notification"
            );
            return DispatchOutcome::Skipped;
        }

        match self.claim(&event_key).await {
            Ok(true) => {}
            Ok(false) => {
                info!(withdraw_id = %withdrawal.id, %event_key, "notification already sent, skipping duplicate");
                return DispatchOutcome::Duplicate;
            }
            Err(err) => {
                error!(withdraw_id = %withdrawal.id, %event_key, error = %err, "could not claim notification");
                return DispatchOutcome::Failed;
            }
        }

        match self.deliver(event).await {
            Ok(()) => {
                info!(
                    withdraw_id = %withdrawal.id,
                    %event_key,
                    amount = %withdrawal.amount,
                    "notification sent"
                );
                DispatchOutcome::Sent
            }
            Err(err) => {
                error!(withdraw_id = %withdrawal.id, %event_key, error = %err, "failed to send notification");
                if let Err(release_err) = self.dedup.release(&event_key).await {
                    error!(%event_key, error = %release_err, "could not release notification claim");
                }
                DispatchOutcome::Failed
            }
        }
    }

    async fn claim(&self, event_key: &str) -> Result<bool, NotifyError> {
        Ok(self.dedup.claim(event_key, self.ttl).await?)
    }

    async fn deliver(&self, event: &WithdrawEvent) -> Result<(), NotifyError> {
        let withdrawal = event.withdrawal();
        let to = withdrawal.payment_key.value.as_str();
        let message = match event {
            WithdrawEvent::Scheduled(_) => self.templates.scheduled(withdrawal, to),
            WithdrawEvent::Processed { success: true, .. } => self.templates.success(withdrawal, to),
            WithdrawEvent::Processed { reason, .. } => self.templates.denied(withdrawal, to, reason.as_deref()),
        };
        debug!(withdraw_id = %withdrawal.id, subject = %message.subject, "sending notification");
        self.mailer.send(&message).await?;
        Ok(())
    }
}
