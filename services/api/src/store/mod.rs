//! Storage ports for accounts and withdrawals.
//!
//! `Storage` serves pool-level reads and opens units of work. Everything that
//! mutates money or withdrawal state goes through a `StorageTx`, which owns
//! its row locks until `commit` or `rollback`.

mod in_memory;
mod postgres;

pub use in_memory::InMemoryStorage;
pub use postgres::PgStorage;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::{Account, PaymentKey, Settlement, WithdrawMethod, Withdrawal};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] postgres_models::DbError),

    #[error("account {0} is not locked by this transaction")]
    NotLocked(Uuid),

    #[error("withdraw {0} is already settled")]
    AlreadySettled(Uuid),

    #[error("withdraw {0} not found")]
    WithdrawMissing(Uuid),

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("storage failure: {0}")]
    Backend(String),
}

impl From<diesel::result::Error> for StoreError {
    fn from(err: diesel::result::Error) -> Self {
        Self::Database(postgres_models::DbError::Query(err))
    }
}

/// Result of a balance check-and-subtract under lock. Insufficient funds is
/// an expected outcome, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebitOutcome {
    Applied { balance: Decimal },
    InsufficientFunds { balance: Decimal },
}

#[derive(Debug, Clone)]
pub struct NewWithdrawal {
    pub id: Uuid,
    pub account_id: Uuid,
    pub method: WithdrawMethod,
    pub amount: Decimal,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub payment_key: PaymentKey,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait Storage: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StorageTx>, StoreError>;

    async fn find_account(&self, id: Uuid) -> Result<Option<Account>, StoreError>;

    async fn find_withdraw(&self, id: Uuid) -> Result<Option<Withdrawal>, StoreError>;

    /// Scheduled, not yet done, and `scheduled_for <= now`.
    async fn find_due(&self, now: DateTime<Utc>) -> Result<Vec<Withdrawal>, StoreError>;

    /// Newest first.
    async fn withdraw_history(&self, account_id: Uuid, limit: i64) -> Result<Vec<Withdrawal>, StoreError>;
}

#[async_trait]
pub trait StorageTx: Send {
    /// Blocks until no other transaction holds the account's lock.
    async fn find_account_for_update(&mut self, id: Uuid) -> Result<Option<Account>, StoreError>;

    /// Requires the lock from `find_account_for_update`. Re-reads the balance
    /// before subtracting and leaves it untouched when it does not cover
    /// `amount`.
    async fn debit_locked(&mut self, id: Uuid, amount: Decimal) -> Result<DebitOutcome, StoreError>;

    /// Writes the withdrawal and its payment key together.
    async fn insert_withdraw(&mut self, new: NewWithdrawal) -> Result<Withdrawal, StoreError>;

    /// Locks a withdrawal that is not done yet. `None` when it is already
    /// settled or another transaction is working on it right now.
    async fn lock_pending_withdraw(&mut self, id: Uuid) -> Result<Option<Withdrawal>, StoreError>;

    async fn settle_withdraw(&mut self, id: Uuid, settlement: &Settlement) -> Result<Withdrawal, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
