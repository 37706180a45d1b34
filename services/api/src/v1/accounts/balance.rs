use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::{errors::AppResult, extractors::AccountId, v1::withdraws::Data, AppState};

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub account_id: Uuid,
    pub balance: Decimal,
    pub updated_at: DateTime<Utc>,
}

pub async fn handler(
    State(state): State<AppState>,
    AccountId(account_id): AccountId,
) -> AppResult<Json<Data<BalanceResponse>>> {
    let account = state.engine.account(account_id).await?;

    Ok(Json(Data {
        data: BalanceResponse {
            account_id: account.id,
            balance: account.balance,
            updated_at: account.updated_at,
        },
    }))
}
