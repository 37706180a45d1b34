use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, FromRequestParts, Path, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use uuid::Uuid;

use crate::errors::AppError;

/// `:account_id` path segment. Anything that is not a UUID cannot name an
/// account, so it is reported as not found.
pub struct AccountId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for AccountId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        uuid_param(parts, state, "account_id")
            .await
            .map(AccountId)
            .ok_or_else(|| AppError::not_found("ACCOUNT_NOT_FOUND", "Account not found"))
    }
}

/// `:withdraw_id` path segment.
pub struct WithdrawId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for WithdrawId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        uuid_param(parts, state, "withdraw_id")
            .await
            .map(WithdrawId)
            .ok_or_else(|| AppError::not_found("WITHDRAW_NOT_FOUND", "Withdraw not found"))
    }
}

async fn uuid_param<S: Send + Sync>(parts: &mut Parts, state: &S, name: &str) -> Option<Uuid> {
    let Path(params) = Path::<HashMap<String, String>>::from_request_parts(parts, state)
        .await
        .ok()?;
    params.get(name).and_then(|raw| Uuid::parse_str(raw).ok())
}

/// `Json<T>` whose rejections use the service's error body.
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(json_rejection(rejection)),
        }
    }
}

fn json_rejection(rejection: JsonRejection) -> AppError {
    AppError::invalid_request(rejection.body_text())
}
