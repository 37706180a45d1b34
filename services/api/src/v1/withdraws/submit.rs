use axum::{extract::State, http::StatusCode, Json};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::WithdrawResponse;
use crate::{
    domain::{parse_schedule, validate_amount, PaymentKey, ValidationErrors, WithdrawMethod},
    engine::SubmitWithdraw,
    errors::{AppError, AppResult},
    extractors::{AccountId, ApiJson},
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct PixRequest {
    #[serde(rename = "type")]
    pub key_type: String,
    pub key: String,
}

#[derive(Debug, Deserialize)]
pub struct SubmitWithdrawRequest {
    pub method: String,
    pub pix: PixRequest,
    pub amount: Decimal,
    pub schedule: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SubmitWithdrawResponse {
    pub data: WithdrawResponse,
    pub message: &'static str,
}

/// Creates a withdrawal. Immediate withdrawals are settled before the
/// response is written; an insufficient balance is reported in the body
/// (`done=true, error=true`), not as a request failure.
pub async fn handler(
    State(state): State<AppState>,
    AccountId(account_id): AccountId,
    ApiJson(request): ApiJson<SubmitWithdrawRequest>,
) -> AppResult<(StatusCode, Json<SubmitWithdrawResponse>)> {
    let offset = state.engine.policy().offset;
    let scheduled_for = match request.schedule.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(parse_schedule(raw, offset).map_err(|errors| {
            AppError::invalid_request(errors.messages().join(", "))
        })?),
    };

    let mut errors = ValidationErrors::new();
    let method = request
        .method
        .parse::<WithdrawMethod>()
        .map_err(|e| errors.extend(e))
        .ok();
    let payment_key = PaymentKey::parse(&request.pix.key_type, &request.pix.key)
        .map_err(|e| errors.extend(e))
        .ok();
    if let Err(e) = validate_amount(request.amount) {
        errors.extend(e);
    }

    let (Some(method), Some(payment_key)) = (method, payment_key) else {
        return Err(AppError::validation(&errors));
    };
    errors.into_result()?;

    let withdrawal = state
        .engine
        .submit(SubmitWithdraw {
            account_id,
            method,
            amount: request.amount,
            payment_key,
            scheduled_for,
        })
        .await?;

    let message = if withdrawal.is_scheduled() {
        "Withdraw scheduled successfully"
    } else {
        "Withdraw processed successfully"
    };
    info!(
        withdraw_id = %withdrawal.id,
        %account_id,
        scheduled = withdrawal.is_scheduled(),
        error = withdrawal.is_error(),
        "withdraw request handled"
    );

    Ok((
        StatusCode::CREATED,
        Json(SubmitWithdrawResponse {
            data: withdrawal.into(),
            message,
        }),
    ))
}
