use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;
use tracing::error;

use crate::domain::ValidationErrors;
use crate::engine::EngineError;

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub details: Option<Vec<String>>,
}

impl AppError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn validation(errors: &ValidationErrors) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR", "Validation failed")
            .with_details(errors.messages().to_vec())
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, "INVALID_REQUEST", message)
    }

    pub fn not_found(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, code, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", message)
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }

    pub fn with_details(mut self, details: Vec<String>) -> Self {
        self.details = Some(details);
        self
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.status, self.code, self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut error = json!({
            "message": self.message,
            "code": self.code,
            "status": self.status.as_u16(),
        });
        if let Some(details) = self.details {
            error["details"] = json!(details);
        }

        (self.status, Json(json!({ "error": error }))).into_response()
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        AppError::validation(&errors)
    }
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::InvalidRequest(errors) => AppError::validation(&errors),
            EngineError::AccountNotFound(_) => AppError::not_found("ACCOUNT_NOT_FOUND", "Account not found"),
            EngineError::WithdrawNotFound(_) => AppError::not_found("WITHDRAW_NOT_FOUND", "Withdraw not found"),
            EngineError::DeadlineExceeded => {
                AppError::service_unavailable("The withdraw could not be started in time, please retry")
            }
            // Internals stay in the logs.
            err @ (EngineError::Storage(_) | EngineError::Task(_)) => {
                error!(error = %err, "request failed");
                AppError::internal_server_error("Internal server error")
            }
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
