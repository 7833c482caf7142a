use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::models::request::SwapStatus;
use crate::store::StoreError;

pub type Result<T> = std::result::Result<T, SwapError>;

#[derive(Debug, Error)]
pub enum SwapError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("a pending request already exists between these users")]
    DuplicatePending,

    #[error("cannot {action} a request that is {status}")]
    InvalidTransition {
        status: SwapStatus,
        action: &'static str,
    },

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("store error: {0}")]
    Store(#[source] anyhow::Error),
}

impl SwapError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        SwapError::InvalidArgument(msg.into())
    }

    /// Stable machine-readable code, also used as a metrics label.
    pub fn code(&self) -> &'static str {
        match self {
            SwapError::InvalidArgument(_) => "invalid_argument",
            SwapError::NotFound(_) => "not_found",
            SwapError::DuplicatePending => "duplicate_pending",
            SwapError::InvalidTransition { .. } => "invalid_transition",
            SwapError::Forbidden(_) => "forbidden",
            SwapError::Unauthorized(_) => "unauthorized",
            SwapError::Conflict(_) => "conflict",
            SwapError::Store(_) => "internal_server_error",
        }
    }
}

impl StoreError {
    /// Convert, naming the missing entity on `NotFound`.
    pub fn entity(self, entity: &'static str) -> SwapError {
        match self {
            StoreError::NotFound => SwapError::NotFound(entity),
            other => other.into(),
        }
    }
}

impl From<StoreError> for SwapError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => SwapError::NotFound("record"),
            StoreError::DuplicatePending => SwapError::DuplicatePending,
            StoreError::StatusMismatch(status) => SwapError::InvalidTransition {
                status,
                action: "update",
            },
            StoreError::DuplicateContact => {
                SwapError::Conflict("a user with this contact already exists".into())
            }
            StoreError::Backend(e) => SwapError::Store(e),
        }
    }
}

impl IntoResponse for SwapError {
    fn into_response(self) -> Response {
        let (status, error_type, msg) = match &self {
            SwapError::InvalidArgument(_) => (
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                self.to_string(),
            ),
            SwapError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found_error", self.to_string()),
            SwapError::DuplicatePending | SwapError::InvalidTransition { .. } => {
                (StatusCode::CONFLICT, "state_error", self.to_string())
            }
            SwapError::Conflict(_) => (StatusCode::CONFLICT, "conflict_error", self.to_string()),
            SwapError::Forbidden(_) => (
                StatusCode::FORBIDDEN,
                "permission_error",
                self.to_string(),
            ),
            SwapError::Unauthorized(_) => (
                StatusCode::UNAUTHORIZED,
                "authentication_error",
                self.to_string(),
            ),
            SwapError::Store(e) => {
                tracing::error!("Store error: {:#}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal server error".to_string(),
                )
            }
        };

        crate::metrics::record_error(self.code());

        let body = Json(json!({
            "error": {
                "message": msg,
                "type": error_type,
                "code": self.code(),
            }
        }));

        (status, body).into_response()
    }
}
