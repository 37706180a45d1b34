use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper};
use diesel_async::{AnsiTransactionManager, AsyncPgConnection, RunQueryDsl, TransactionManager};
use postgres_models::models::{
    Account as AccountRow, NewWithdraw, NewWithdrawPix, Withdraw as WithdrawRow, WithdrawPix as WithdrawPixRow,
    WithdrawSettlement,
};
use postgres_models::schema::{account, account_withdraw, account_withdraw_pix};
use postgres_models::{DbConnection, DbError, DbPool};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use super::{DebitOutcome, NewWithdrawal, Storage, StorageTx, StoreError};
use crate::domain::{Account, PaymentKey, Settlement, WithdrawStatus, Withdrawal};

/// Diesel-backed storage. Account rows are locked with `SELECT ... FOR UPDATE`;
/// the sweep claims withdrawals with `FOR UPDATE SKIP LOCKED`.
#[derive(Clone)]
pub struct PgStorage {
    pool: DbPool,
}

impl PgStorage {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Storage for PgStorage {
    async fn begin(&self) -> Result<Box<dyn StorageTx>, StoreError> {
        let mut conn = self.pool.get_owned().await.map_err(DbError::from)?;
        AnsiTransactionManager::begin_transaction(&mut *conn).await?;
        Ok(Box::new(PgTx {
            conn,
            locked_accounts: HashSet::new(),
        }))
    }

    async fn find_account(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        let mut conn = self.pool.get().await.map_err(DbError::from)?;
        let row = account::table
            .find(id)
            .select(AccountRow::as_select())
            .first(&mut *conn)
            .await
            .optional()?;
        Ok(row.map(to_account))
    }

    async fn find_withdraw(&self, id: Uuid) -> Result<Option<Withdrawal>, StoreError> {
        let mut conn = self.pool.get().await.map_err(DbError::from)?;
        let row = account_withdraw::table
            .find(id)
            .select(WithdrawRow::as_select())
            .first(&mut *conn)
            .await
            .optional()?;
        match row {
            Some(row) => Ok(attach_pix(&mut *conn, vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn find_due(&self, now: DateTime<Utc>) -> Result<Vec<Withdrawal>, StoreError> {
        let mut conn = self.pool.get().await.map_err(DbError::from)?;
        let rows = account_withdraw::table
            .filter(account_withdraw::scheduled.eq(true))
            .filter(account_withdraw::done.eq(false))
            .filter(account_withdraw::scheduled_for.le(now))
            .order(account_withdraw::scheduled_for.asc())
            .select(WithdrawRow::as_select())
            .load(&mut *conn)
            .await?;
        attach_pix(&mut *conn, rows).await
    }

    async fn withdraw_history(&self, account_id: Uuid, limit: i64) -> Result<Vec<Withdrawal>, StoreError> {
        let mut conn = self.pool.get().await.map_err(DbError::from)?;
        let rows = account_withdraw::table
            .filter(account_withdraw::account_id.eq(account_id))
            .order(account_withdraw::created_at.desc())
            .limit(limit)
            .select(WithdrawRow::as_select())
            .load(&mut *conn)
            .await?;
        attach_pix(&mut *conn, rows).await
    }
}

/// A pooled connection with an open transaction. Dropping it unfinished
/// hands the pool a connection whose transaction manager reports it broken,
/// so bb8 discards it instead of reusing it.
struct PgTx {
    conn: DbConnection,
    locked_accounts: HashSet<Uuid>,
}

#[async_trait]
impl StorageTx for PgTx {
    async fn find_account_for_update(&mut self, id: Uuid) -> Result<Option<Account>, StoreError> {
        let row = account::table
            .find(id)
            .select(AccountRow::as_select())
            .for_update()
            .first(&mut *self.conn)
            .await
            .optional()?;
        if row.is_some() {
            self.locked_accounts.insert(id);
        }
        Ok(row.map(to_account))
    }

    async fn debit_locked(&mut self, id: Uuid, amount: Decimal) -> Result<DebitOutcome, StoreError> {
        if !self.locked_accounts.contains(&id) {
            return Err(StoreError::NotLocked(id));
        }

        let balance: Decimal = account::table
            .find(id)
            .select(account::balance)
            .for_update()
            .first(&mut *self.conn)
            .await?;

        if balance < amount {
            return Ok(DebitOutcome::InsufficientFunds { balance });
        }

        let remaining = balance - amount;
        diesel::update(account::table.find(id))
            .set((account::balance.eq(remaining), account::updated_at.eq(Utc::now())))
            .execute(&mut *self.conn)
            .await?;

        Ok(DebitOutcome::Applied { balance: remaining })
    }

    async fn insert_withdraw(&mut self, new: NewWithdrawal) -> Result<Withdrawal, StoreError> {
        let row = diesel::insert_into(account_withdraw::table)
            .values(NewWithdraw::new(
                new.id,
                new.account_id,
                new.method.as_str().to_string(),
                new.amount,
                new.scheduled_for,
                new.created_at,
            ))
            .returning(WithdrawRow::as_returning())
            .get_result(&mut *self.conn)
            .await?;

        let pix = diesel::insert_into(account_withdraw_pix::table)
            .values(NewWithdrawPix::new(
                new.id,
                new.payment_key.key_type.as_str().to_string(),
                new.payment_key.value.clone(),
                new.created_at,
            ))
            .returning(WithdrawPixRow::as_returning())
            .get_result(&mut *self.conn)
            .await?;

        to_withdrawal(row, pix)
    }

    async fn lock_pending_withdraw(&mut self, id: Uuid) -> Result<Option<Withdrawal>, StoreError> {
        let row = account_withdraw::table
            .find(id)
            .filter(account_withdraw::done.eq(false))
            .select(WithdrawRow::as_select())
            .for_update()
            .skip_locked()
            .first(&mut *self.conn)
            .await
            .optional()?;
        match row {
            Some(row) => Ok(attach_pix(&mut *self.conn, vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn settle_withdraw(&mut self, id: Uuid, settlement: &Settlement) -> Result<Withdrawal, StoreError> {
        let now = Utc::now();
        let changes = match settlement {
            Settlement::Succeeded => WithdrawSettlement::succeeded(now),
            Settlement::Failed(reason) => WithdrawSettlement::failed(reason.clone(), now),
        };

        let row = diesel::update(
            account_withdraw::table
                .find(id)
                .filter(account_withdraw::done.eq(false)),
        )
        .set(&changes)
        .returning(WithdrawRow::as_returning())
        .get_result(&mut *self.conn)
        .await
        .optional()?;

        match row {
            Some(row) => attach_pix(&mut *self.conn, vec![row])
                .await?
                .pop()
                .ok_or(StoreError::WithdrawMissing(id)),
            None => {
                let exists: i64 = account_withdraw::table
                    .find(id)
                    .count()
                    .get_result(&mut *self.conn)
                    .await?;
                if exists > 0 {
                    Err(StoreError::AlreadySettled(id))
                } else {
                    Err(StoreError::WithdrawMissing(id))
                }
            }
        }
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let mut tx = self;
        AnsiTransactionManager::commit_transaction(&mut *tx.conn).await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        let mut tx = self;
        AnsiTransactionManager::rollback_transaction(&mut *tx.conn).await?;
        Ok(())
    }
}

async fn attach_pix(conn: &mut AsyncPgConnection, rows: Vec<WithdrawRow>) -> Result<Vec<Withdrawal>, StoreError> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
    let mut keys: HashMap<Uuid, WithdrawPixRow> = account_withdraw_pix::table
        .filter(account_withdraw_pix::account_withdraw_id.eq_any(ids))
        .select(WithdrawPixRow::as_select())
        .load(conn)
        .await?
        .into_iter()
        .map(|pix| (pix.account_withdraw_id, pix))
        .collect();

    rows.into_iter()
        .map(|row| {
            let pix = keys
                .remove(&row.id)
                .ok_or_else(|| StoreError::Corrupt(format!("withdraw {} has no PIX key", row.id)))?;
            to_withdrawal(row, pix)
        })
        .collect()
}

fn to_account(row: AccountRow) -> Account {
    Account {
        id: row.id,
        name: row.name,
        balance: row.balance,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

fn to_withdrawal(row: WithdrawRow, pix: WithdrawPixRow) -> Result<Withdrawal, StoreError> {
    let corrupt = |what: &str| StoreError::Corrupt(format!("withdraw {}: {what}", row.id));

    if row.scheduled != row.scheduled_for.is_some() {
        return Err(corrupt("scheduled flag disagrees with scheduled_for"));
    }

    let status = match (row.done, row.error) {
        (false, false) => WithdrawStatus::Pending,
        (true, false) => WithdrawStatus::Succeeded,
        (true, true) => WithdrawStatus::Failed {
            reason: row.error_reason.clone().unwrap_or_default(),
        },
        (false, true) => return Err(corrupt("error flag set on a pending withdraw")),
    };

    let method = row.method.parse().map_err(|_| corrupt("unknown method"))?;
    let key_type = pix.key_type.parse().map_err(|_| corrupt("unknown PIX key type"))?;

    Ok(Withdrawal {
        id: row.id,
        account_id: row.account_id,
        method,
        amount: row.amount,
        scheduled_for: row.scheduled_for,
        status,
        payment_key: PaymentKey {
            key_type,
            value: pix.key_value,
        },
        created_at: row.created_at,
    })
}
