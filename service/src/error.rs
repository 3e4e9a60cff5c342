//! API error types and responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use fundsflow_core::{AccountId, LedgerError};

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Bad request - invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Resource not found.
    #[error("{message}")]
    NotFound {
        /// Machine-readable error code.
        code: &'static str,
        /// Human-readable message.
        message: String,
    },

    /// The paying account cannot cover the amount.
    #[error("insufficient funds in {account_id}: balance={balance}, required={required}")]
    InsufficientFunds {
        /// Account that would have gone negative.
        account_id: AccountId,
        /// Current balance.
        balance: i64,
        /// Required amount.
        required: i64,
    },

    /// Conflict - key already claimed or invalid state transition.
    #[error("{message}")]
    Conflict {
        /// Machine-readable error code.
        code: &'static str,
        /// Human-readable message.
        message: String,
    },

    /// Lock contention; the request may be retried.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            Self::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "validation_error",
                msg.clone(),
                None,
            ),
            Self::NotFound { code, message } => (StatusCode::NOT_FOUND, *code, message.clone(), None),
            Self::InsufficientFunds {
                account_id,
                balance,
                required,
            } => (
                StatusCode::PAYMENT_REQUIRED,
                "insufficient_funds",
                self.to_string(),
                Some(serde_json::json!({
                    "account_id": account_id,
                    "balance": balance,
                    "required": required
                })),
            ),
            Self::Conflict { code, message } => (StatusCode::CONFLICT, *code, message.clone(), None),
            Self::Unavailable(msg) => {
                tracing::warn!(error = %msg, "Request hit lock contention");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "contention_timeout",
                    msg.clone(),
                    Some(serde_json::json!({ "retryable": true })),
                )
            }
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        let code = err.code();
        let message = err.to_string();
        match err {
            LedgerError::Validation(msg) => Self::BadRequest(msg),
            LedgerError::InvalidId(_) => Self::BadRequest(message),
            LedgerError::AccountNotFound { .. } | LedgerError::TransferNotFound { .. } => {
                Self::NotFound { code, message }
            }
            LedgerError::InsufficientFunds {
                account_id,
                balance,
                required,
            } => Self::InsufficientFunds {
                account_id,
                balance,
                required,
            },
            LedgerError::DuplicateIdempotencyKey { .. }
            | LedgerError::InvalidStatusTransition { .. } => Self::Conflict { code, message },
            LedgerError::ContentionTimeout(_) => Self::Unavailable(message),
            LedgerError::Persistence(_) | LedgerError::UnbalancedTransaction { .. } => {
                Self::Internal(message)
            }
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal(format!("blocking task failed: {err}"))
    }
}
