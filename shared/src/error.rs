use lambda_http::{http::StatusCode, Body, Response};
use serde::Serialize;

use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("missing caller identity")]
    Unauthorized,
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    PaymentRequired(String),
    #[error("payment gateway error: {0}")]
    Gateway(String),
    #[error("identity provider error: {0}")]
    Identity(String),
    #[error("{0}")]
    Unavailable(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("invalid request body: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl AppError {
    pub fn not_found(what: &str) -> Self {
        AppError::NotFound(format!("{} not found", what))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) | AppError::Json(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::PaymentRequired(_) => StatusCode::PAYMENT_REQUIRED,
            AppError::Gateway(_) | AppError::Identity(_) => StatusCode::BAD_GATEWAY,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Store(StoreError::TransactionCancelled(_)) => StatusCode::CONFLICT,
            AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "InvalidRequest",
            AppError::Json(_) => "InvalidRequestBody",
            AppError::Unauthorized => "Unauthorized",
            AppError::Forbidden(_) => "Forbidden",
            AppError::NotFound(_) => "NotFound",
            AppError::Conflict(_) => "Conflict",
            AppError::PaymentRequired(_) => "PaymentRequired",
            AppError::Gateway(_) => "PaymentGatewayError",
            AppError::Identity(_) => "IdentityProviderError",
            AppError::Unavailable(_) => "Maintenance",
            AppError::Store(StoreError::TransactionCancelled(_)) => "TransactionCancelled",
            AppError::Store(_) => "InternalError",
        }
    }

    /// Render as the JSON error body every endpoint returns.
    pub fn into_response(self) -> Response<Body> {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::warn!("Request rejected ({}): {}", status.as_u16(), self);
        }

        // Internal details stay in the logs.
        let message = match &self {
            AppError::Store(StoreError::TransactionCancelled(_)) => {
                "The operation conflicted with a concurrent change".to_string()
            }
            AppError::Store(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };
        let body = ErrorResponse {
            error: self.code().to_string(),
            message,
        };
        let payload = serde_json::to_string(&body)
            .unwrap_or_else(|_| r#"{"error":"InternalError"}"#.to_string());

        crate::response::with_headers(status, payload.into())
    }
}
