use crate::schema::account_withdraw_pix;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = account_withdraw_pix)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct WithdrawPix {
    pub account_withdraw_id: Uuid,
    pub key_type: String,
    pub key_value: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Insertable)]
#[diesel(table_name = account_withdraw_pix)]
pub struct NewWithdrawPix {
    pub account_withdraw_id: Uuid,
    pub key_type: String,
    pub key_value: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NewWithdrawPix {
    pub fn new(account_withdraw_id: Uuid, key_type: String, key_value: String, created_at: DateTime<Utc>) -> Self {
        Self {
            account_withdraw_id,
            key_type,
            key_value,
            created_at,
            updated_at: created_at,
        }
    }
}
