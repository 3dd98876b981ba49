//! Crate-wide error type.
//!
//! Mirrors the taxonomy in spec §7: validation, authorization, state,
//! resource, conflict, transient-storage and fatal errors all surface
//! through this single enum so handlers can map them to the right
//! `error`/`matchmakingError` payload or HTTP status without re-deriving
//! the classification at each call site.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed event payload or request body. No state change.
    #[error("validation error: {0}")]
    Validation(String),

    /// Connection's user is not a participant of the referenced room/entity.
    #[error("not authorized: {0}")]
    Authorization(String),

    /// Action attempted in the wrong room/ledger state.
    #[error("invalid state: {0}")]
    State(String),

    /// Amount must be strictly positive.
    #[error("invalid amount")]
    InvalidAmount,

    /// Wallet balance insufficient for the requested debit.
    #[error("insufficient balance")]
    InsufficientBalance,

    /// Gateway HMAC signature did not match.
    #[error("signature invalid")]
    SignatureInvalid,

    /// Entity not found (user, room, queue entry, ledger entry).
    #[error("not found: {0}")]
    NotFound(String),

    /// A duplicate idempotent operation; caller should treat as success.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Storage layer failed; safe to retry reads, not writes.
    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),

    /// Invariant violation that must never be auto-recovered from.
    #[error("fatal invariant violation: {0}")]
    Fatal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Authorization(_) => StatusCode::FORBIDDEN,
            AppError::State(_) => StatusCode::CONFLICT,
            AppError::InvalidAmount => StatusCode::BAD_REQUEST,
            AppError::InsufficientBalance => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::SignatureInvalid => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::OK,
            AppError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Fatal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if matches!(self, AppError::Fatal(_) | AppError::Storage(_)) {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }
        let status = self.status_code();
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
