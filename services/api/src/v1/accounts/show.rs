use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::{errors::AppResult, extractors::AccountId, v1::withdraws::Data, AppState};

#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub id: Uuid,
    pub name: String,
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub async fn handler(
    State(state): State<AppState>,
    AccountId(account_id): AccountId,
) -> AppResult<Json<Data<AccountResponse>>> {
    let account = state.engine.account(account_id).await?;

    Ok(Json(Data {
        data: AccountResponse {
            id: account.id,
            name: account.name,
            balance: account.balance,
            created_at: account.created_at,
            updated_at: account.updated_at,
        },
    }))
}
