use crate::schema::account_withdraw;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = account_withdraw)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Withdraw {
    pub id: Uuid,
    pub account_id: Uuid,
    pub method: String,
    pub amount: Decimal,
    pub scheduled: bool,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub done: bool,
    pub error: bool,
    pub error_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Insertable)]
#[diesel(table_name = account_withdraw)]
pub struct NewWithdraw {
    pub id: Uuid,
    pub account_id: Uuid,
    pub method: String,
    pub amount: Decimal,
    pub scheduled: bool,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub done: bool,
    pub error: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NewWithdraw {
    pub fn new(
        id: Uuid,
        account_id: Uuid,
        method: String,
        amount: Decimal,
        scheduled_for: Option<DateTime<Utc>>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            account_id,
            method,
            amount,
            scheduled: scheduled_for.is_some(),
            scheduled_for,
            done: false,
            error: false,
            created_at,
            updated_at: created_at,
        }
    }
}

/// Terminal flags written when a withdrawal is settled.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = account_withdraw)]
#[diesel(treat_none_as_null = true)]
pub struct WithdrawSettlement {
    pub done: bool,
    pub error: bool,
    pub error_reason: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl WithdrawSettlement {
    pub fn succeeded(at: DateTime<Utc>) -> Self {
        Self {
            done: true,
            error: false,
            error_reason: None,
            updated_at: at,
        }
    }

    pub fn failed(reason: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            done: true,
            error: true,
            error_reason: Some(reason.into()),
            updated_at: at,
        }
    }
}
