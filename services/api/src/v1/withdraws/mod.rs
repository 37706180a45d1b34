use axum::{
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{PaymentKeyType, WithdrawMethod, Withdrawal};

mod history;
mod show;
mod submit;

pub fn router() -> Router<crate::AppState> {
    Router::new()
        .route("/balance/withdraw", post(submit::handler))
        .route("/withdraws", get(history::handler))
        .route("/withdraws/:withdraw_id", get(show::handler))
}

#[derive(Debug, Serialize)]
pub struct Data<T> {
    pub data: T,
}

#[derive(Debug, Clone, Serialize)]
pub struct PixResponse {
    #[serde(rename = "type")]
    pub key_type: PaymentKeyType,
    pub key: String,
}

/// Public view of a withdrawal. The flags are derived from its state.
#[derive(Debug, Clone, Serialize)]
pub struct WithdrawResponse {
    pub id: Uuid,
    pub account_id: Uuid,
    pub method: WithdrawMethod,
    pub amount: Decimal,
    pub scheduled: bool,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub done: bool,
    pub error: bool,
    pub error_reason: Option<String>,
    pub pix: PixResponse,
    pub created_at: DateTime<Utc>,
}

impl From<Withdrawal> for WithdrawResponse {
    fn from(withdrawal: Withdrawal) -> Self {
        Self {
            id: withdrawal.id,
            account_id: withdrawal.account_id,
            method: withdrawal.method,
            amount: withdrawal.amount,
            scheduled: withdrawal.is_scheduled(),
            scheduled_for: withdrawal.scheduled_for,
            done: withdrawal.is_done(),
            error: withdrawal.is_error(),
            error_reason: withdrawal.error_reason().map(str::to_string),
            pix: PixResponse {
                key_type: withdrawal.payment_key.key_type,
                key: withdrawal.payment_key.value.clone(),
            },
            created_at: withdrawal.created_at,
        }
    }
}
