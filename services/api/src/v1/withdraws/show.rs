use axum::{extract::State, Json};

use super::{Data, WithdrawResponse};
use crate::{
    errors::AppResult,
    extractors::{AccountId, WithdrawId},
    AppState,
};

pub async fn handler(
    State(state): State<AppState>,
    AccountId(account_id): AccountId,
    WithdrawId(withdraw_id): WithdrawId,
) -> AppResult<Json<Data<WithdrawResponse>>> {
    let withdrawal = state.engine.withdraw(account_id, withdraw_id).await?;
    Ok(Json(Data {
        data: withdrawal.into(),
    }))
}
