use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{DebitOutcome, NewWithdrawal, Storage, StorageTx, StoreError};
use crate::domain::{Account, Settlement, WithdrawStatus, Withdrawal};

/// A thread-safe in-memory store for accounts and withdrawals.
///
/// Row locks are real `tokio` mutexes held by the transaction until it
/// commits or rolls back, so concurrent callers serialize exactly as they
/// would against Postgres. Writes are staged per transaction and only become
/// visible on commit.
#[derive(Default, Clone)]
pub struct InMemoryStorage {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    state: Mutex<State>,
    account_locks: LockTable,
    withdraw_locks: LockTable,
    faulty_accounts: Mutex<HashSet<Uuid>>,
}

#[derive(Default)]
struct State {
    accounts: HashMap<Uuid, Account>,
    withdraws: HashMap<Uuid, (u64, Withdrawal)>,
    next_seq: u64,
}

#[derive(Default)]
struct LockTable(Mutex<HashMap<Uuid, Arc<Mutex<()>>>>);

impl LockTable {
    async fn handle(&self, id: Uuid) -> Arc<Mutex<()>> {
        self.0.lock().await.entry(id).or_default().clone()
    }

    async fn acquire(&self, id: Uuid) -> OwnedMutexGuard<()> {
        self.handle(id).await.lock_owned().await
    }

    async fn try_acquire(&self, id: Uuid) -> Option<OwnedMutexGuard<()>> {
        self.handle(id).await.try_lock_owned().ok()
    }
}

impl InMemoryStorage {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an account, the way accounts are created out-of-band in
    /// production.
    pub async fn insert_account(&self, name: &str, balance: Decimal) -> Account {
        let now = Utc::now();
        let account = Account {
            id: Uuid::new_v4(),
            name: name.to_string(),
            balance,
            created_at: now,
            updated_at: now,
        };
        self.inner
            .state
            .lock()
            .await
            .accounts
            .insert(account.id, account.clone());
        account
    }

    pub async fn remove_account(&self, id: Uuid) -> Option<Account> {
        self.inner.state.lock().await.accounts.remove(&id)
    }

    pub async fn balance(&self, id: Uuid) -> Option<Decimal> {
        self.inner
            .state
            .lock()
            .await
            .accounts
            .get(&id)
            .map(|account| account.balance)
    }

    /// Makes every debit against `account_id` fail with a storage fault.
    pub async fn fail_debits_for(&self, account_id: Uuid) {
        self.inner.faulty_accounts.lock().await.insert(account_id);
    }

    pub async fn withdraw_count(&self) -> usize {
        self.inner.state.lock().await.withdraws.len()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn begin(&self) -> Result<Box<dyn StorageTx>, StoreError> {
        Ok(Box::new(InMemoryTx {
            inner: self.inner.clone(),
            account_guards: HashMap::new(),
            withdraw_guards: HashMap::new(),
            accounts: HashMap::new(),
            withdraws: HashMap::new(),
        }))
    }

    async fn find_account(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        Ok(self.inner.state.lock().await.accounts.get(&id).cloned())
    }

    async fn find_withdraw(&self, id: Uuid) -> Result<Option<Withdrawal>, StoreError> {
        Ok(self
            .inner
            .state
            .lock()
            .await
            .withdraws
            .get(&id)
            .map(|(_, withdrawal)| withdrawal.clone()))
    }

    async fn find_due(&self, now: DateTime<Utc>) -> Result<Vec<Withdrawal>, StoreError> {
        let state = self.inner.state.lock().await;
        let mut due: Vec<Withdrawal> = state
            .withdraws
            .values()
            .map(|(_, withdrawal)| withdrawal)
            .filter(|w| w.is_scheduled() && !w.is_done() && w.is_due(now))
            .cloned()
            .collect();
        due.sort_by_key(|w| w.scheduled_for);
        Ok(due)
    }

    async fn withdraw_history(&self, account_id: Uuid, limit: i64) -> Result<Vec<Withdrawal>, StoreError> {
        let state = self.inner.state.lock().await;
        let mut rows: Vec<&(u64, Withdrawal)> = state
            .withdraws
            .values()
            .filter(|(_, w)| w.account_id == account_id)
            .collect();
        rows.sort_by(|(a_seq, a), (b_seq, b)| (b.created_at, b_seq).cmp(&(a.created_at, a_seq)));
        Ok(rows
            .into_iter()
            .take(usize::try_from(limit).unwrap_or(0))
            .map(|(_, w)| w.clone())
            .collect())
    }
}

struct InMemoryTx {
    inner: Arc<Inner>,
    account_guards: HashMap<Uuid, OwnedMutexGuard<()>>,
    withdraw_guards: HashMap<Uuid, OwnedMutexGuard<()>>,
    accounts: HashMap<Uuid, Account>,
    withdraws: HashMap<Uuid, Withdrawal>,
}

impl InMemoryTx {
    async fn account(&self, id: Uuid) -> Option<Account> {
        match self.accounts.get(&id) {
            Some(staged) => Some(staged.clone()),
            None => self.inner.state.lock().await.accounts.get(&id).cloned(),
        }
    }

    async fn withdraw(&self, id: Uuid) -> Option<Withdrawal> {
        match self.withdraws.get(&id) {
            Some(staged) => Some(staged.clone()),
            None => self
                .inner
                .state
                .lock()
                .await
                .withdraws
                .get(&id)
                .map(|(_, w)| w.clone()),
        }
    }
}

#[async_trait]
impl StorageTx for InMemoryTx {
    async fn find_account_for_update(&mut self, id: Uuid) -> Result<Option<Account>, StoreError> {
        if !self.account_guards.contains_key(&id) {
            let guard = self.inner.account_locks.acquire(id).await;
            self.account_guards.insert(id, guard);
        }
        let account = self.account(id).await;
        if account.is_none() {
            self.account_guards.remove(&id);
        }
        Ok(account)
    }

    async fn debit_locked(&mut self, id: Uuid, amount: Decimal) -> Result<DebitOutcome, StoreError> {
        if !self.account_guards.contains_key(&id) {
            return Err(StoreError::NotLocked(id));
        }
        if self.inner.faulty_accounts.lock().await.contains(&id) {
            return Err(StoreError::Backend(format!("debit on account {id} failed")));
        }

        let mut account = self
            .account(id)
            .await
            .ok_or_else(|| StoreError::Backend(format!("account {id} vanished while locked")))?;

        if account.balance < amount {
            return Ok(DebitOutcome::InsufficientFunds {
                balance: account.balance,
            });
        }

        account.balance -= amount;
        account.updated_at = Utc::now();
        let balance = account.balance;
        self.accounts.insert(id, account);
        Ok(DebitOutcome::Applied { balance })
    }

    async fn insert_withdraw(&mut self, new: NewWithdrawal) -> Result<Withdrawal, StoreError> {
        if self.account(new.account_id).await.is_none() {
            return Err(StoreError::Backend(format!(
                "account {} does not exist",
                new.account_id
            )));
        }
        if self.withdraw(new.id).await.is_some() {
            return Err(StoreError::Backend(format!("duplicate withdraw id {}", new.id)));
        }

        let withdrawal = Withdrawal {
            id: new.id,
            account_id: new.account_id,
            method: new.method,
            amount: new.amount,
            scheduled_for: new.scheduled_for,
            status: WithdrawStatus::Pending,
            payment_key: new.payment_key,
            created_at: new.created_at,
        };
        self.withdraws.insert(withdrawal.id, withdrawal.clone());
        Ok(withdrawal)
    }

    async fn lock_pending_withdraw(&mut self, id: Uuid) -> Result<Option<Withdrawal>, StoreError> {
        if !self.withdraw_guards.contains_key(&id) {
            // SKIP LOCKED: someone else is already settling it.
            let Some(guard) = self.inner.withdraw_locks.try_acquire(id).await else {
                return Ok(None);
            };
            self.withdraw_guards.insert(id, guard);
        }

        match self.withdraw(id).await {
            Some(withdrawal) if !withdrawal.is_done() => Ok(Some(withdrawal)),
            _ => {
                self.withdraw_guards.remove(&id);
                Ok(None)
            }
        }
    }

    async fn settle_withdraw(&mut self, id: Uuid, settlement: &Settlement) -> Result<Withdrawal, StoreError> {
        let current = self.withdraw(id).await.ok_or(StoreError::WithdrawMissing(id))?;
        let settled = current
            .settle(settlement)
            .map_err(|_| StoreError::AlreadySettled(id))?;
        self.withdraws.insert(id, settled.clone());
        Ok(settled)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let InMemoryTx {
            inner,
            account_guards,
            withdraw_guards,
            accounts,
            withdraws,
        } = *self;

        {
            let mut state = inner.state.lock().await;
            for (id, account) in accounts {
                state.accounts.insert(id, account);
            }
            for (id, withdrawal) in withdraws {
                let seq = match state.withdraws.get(&id) {
                    Some((seq, _)) => *seq,
                    None => {
                        state.next_seq += 1;
                        state.next_seq
                    }
                };
                state.withdraws.insert(id, (seq, withdrawal));
            }
        }

        drop(withdraw_guards);
        drop(account_guards);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}
