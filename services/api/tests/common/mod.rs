#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, TimeZone, Utc};
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use uuid::Uuid;

use withdraw_api::{
    clock::ManualClock,
    domain::{Account, PaymentKey, SchedulePolicy, WithdrawEvent, WithdrawMethod},
    engine::{EngineSettings, SubmitWithdraw, WithdrawEngine},
    notifications::{EmailMessage, EmailTemplates, InMemoryDedup, MailError, Mailer, NotificationDispatcher},
    store::{InMemoryStorage, Storage},
};

pub const DEDUP_TTL: std::time::Duration = std::time::Duration::from_secs(3600);

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 9, 9, 12, 0, 0).unwrap()
}

pub fn brt() -> FixedOffset {
    FixedOffset::west_opt(3 * 3600).unwrap()
}

pub fn settings() -> EngineSettings {
    EngineSettings {
        policy: SchedulePolicy::new(brt(), 7),
        submit_deadline: std::time::Duration::from_secs(5),
    }
}

/// An engine over in-memory storage with a clock that only moves when told.
pub struct Harness {
    pub storage: InMemoryStorage,
    pub clock: ManualClock,
    pub engine: WithdrawEngine,
    pub events: mpsc::Receiver<WithdrawEvent>,
}

impl Harness {
    pub fn new() -> Self {
        let storage = InMemoryStorage::new();
        Self::with_storage(storage.clone(), Arc::new(storage))
    }

    /// `backend` is what the engine talks to; `storage` is kept for seeding
    /// and inspection.
    pub fn with_storage(storage: InMemoryStorage, backend: Arc<dyn Storage>) -> Self {
        let clock = ManualClock::new(start_time());
        let (tx, events) = mpsc::channel(1024);
        let engine = WithdrawEngine::new(backend, Arc::new(clock.clone()), tx, settings());
        Self {
            storage,
            clock,
            engine,
            events,
        }
    }

    pub async fn account(&self, balance: Decimal) -> Account {
        self.storage.insert_account("Test account", balance).await
    }

    pub async fn balance(&self, account: &Account) -> Decimal {
        self.storage.balance(account.id).await.expect("account exists")
    }

    pub fn now(&self) -> DateTime<Utc> {
        use withdraw_api::clock::Clock;
        self.clock.now()
    }

    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }

    pub fn drain_events(&mut self) -> Vec<WithdrawEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

pub fn immediate(account_id: Uuid, amount: Decimal) -> SubmitWithdraw {
    SubmitWithdraw {
        account_id,
        method: WithdrawMethod::Pix,
        amount,
        payment_key: PaymentKey::email("client@example.com").unwrap(),
        scheduled_for: None,
    }
}

pub fn scheduled(account_id: Uuid, amount: Decimal, at: DateTime<Utc>) -> SubmitWithdraw {
    SubmitWithdraw {
        scheduled_for: Some(at),
        ..immediate(account_id, amount)
    }
}

/// Records every message and fails the first `failures` sends.
#[derive(Clone, Default)]
pub struct RecordingMailer {
    sent: Arc<Mutex<Vec<EmailMessage>>>,
    failures: Arc<AtomicUsize>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(times: usize) -> Self {
        let mailer = Self::default();
        mailer.failures.store(times, Ordering::SeqCst);
        mailer
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        let should_fail = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(MailError::Rejected {
                status: 503,
                body: "mail relay unavailable".to_string(),
            });
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

pub fn dispatcher(dedup: InMemoryDedup, mailer: RecordingMailer) -> NotificationDispatcher {
    NotificationDispatcher::new(
        Arc::new(dedup),
        Arc::new(mailer),
        EmailTemplates::new(brt(), "PIX Withdrawals"),
        DEDUP_TTL,
    )
}
