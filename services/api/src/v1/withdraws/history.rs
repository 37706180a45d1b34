use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use super::WithdrawResponse;
use crate::{errors::AppResult, extractors::AccountId, AppState};

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct HistoryMeta {
    pub total: usize,
    pub limit: i64,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub data: Vec<WithdrawResponse>,
    pub meta: HistoryMeta,
}

pub async fn handler(
    State(state): State<AppState>,
    AccountId(account_id): AccountId,
    Query(query): Query<HistoryQuery>,
) -> AppResult<Json<HistoryResponse>> {
    let (withdrawals, limit) = state.engine.history(account_id, query.limit).await?;
    let data: Vec<WithdrawResponse> = withdrawals.into_iter().map(Into::into).collect();

    Ok(Json(HistoryResponse {
        meta: HistoryMeta {
            total: data.len(),
            limit,
        },
        data,
    }))
}
