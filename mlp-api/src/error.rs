//! API error type
//!
//! Every failure leaves the service as
//! `{"error": {"code": "<local code>", "message": "<user message>"}}`.
//! Client errors also carry `detail` with the specific reason; server
//! errors are logged and never echo internal messages.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Fallback message for codes with no entry in [`MESSAGES`]
pub const DEFAULT_MESSAGE: &str =
    "An unexpected error occurred. Please contact the administrator.";

/// User-facing messages by local error code
const MESSAGES: &[(&str, &str)] = &[
    ("login", "Authentication failed. Please check your email and password."),
    ("restrict", "You do not have permission to perform this action."),
    ("nouser", "No account is registered with that email address."),
    ("session", "Your session has expired or you are not signed in."),
    ("notfound", "The requested item could not be found."),
    ("invalid", "The submitted data is not valid."),
    ("unknown_field", "The submitted data contains a field this item does not have."),
    ("owner", "The item cannot be attached to that owner."),
    ("schema", "The database schema does not match the service. Please contact the administrator."),
    ("fkey", "The item is still referenced by other items and cannot be changed or removed."),
    ("unique", "An item with the same unique value already exists."),
    ("database", "The database could not complete the request."),
];

/// Message for a local error code
pub fn message_for(code: &str) -> &'static str {
    MESSAGES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, message)| *message)
        .unwrap_or(DEFAULT_MESSAGE)
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Role lacks the permission (403)
    #[error("Permission denied: {0}")]
    Forbidden(String),

    /// Wrong password (401)
    #[error("Login failed")]
    Login,

    /// Unknown account (401)
    #[error("No such user")]
    NoUser,

    /// No valid session (401)
    #[error("No active session")]
    Session,

    /// Route or resource not found (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Library error
    #[error(transparent)]
    Common(#[from] mlp_common::Error),
}

impl ApiError {
    /// Local error code
    pub fn code(&self) -> &'static str {
        use mlp_common::Error as E;
        match self {
            ApiError::Forbidden(_) => "restrict",
            ApiError::Login => "login",
            ApiError::NoUser => "nouser",
            ApiError::Session => "session",
            ApiError::NotFound(_) => "notfound",
            ApiError::BadRequest(_) => "invalid",
            ApiError::Common(err) => match err {
                E::NotFound(_) => "notfound",
                E::InvalidInput(_) => "invalid",
                E::UnknownField { .. } => "unknown_field",
                E::InvalidOwner(_) => "owner",
                E::Schema(_) => "schema",
                E::Conflict { constraint, .. } => *constraint,
                E::Database(_) => "database",
                E::Io(_) => "io",
                E::Config(_) | E::Internal(_) => "internal",
            },
        }
    }

    pub fn status(&self) -> StatusCode {
        use mlp_common::Error as E;
        match self {
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Login | ApiError::NoUser | ApiError::Session => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Common(err) => match err {
                E::NotFound(_) => StatusCode::NOT_FOUND,
                E::InvalidInput(_) | E::UnknownField { .. } | E::InvalidOwner(_) => {
                    StatusCode::BAD_REQUEST
                }
                E::Conflict { .. } => StatusCode::CONFLICT,
                E::Schema(_) | E::Database(_) | E::Io(_) | E::Config(_) | E::Internal(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let body = if status.is_server_error() {
            error!("Request failed ({}): {}", code, self);
            json!({
                "error": {
                    "code": code,
                    "message": message_for(code),
                }
            })
        } else {
            json!({
                "error": {
                    "code": code,
                    "message": message_for(code),
                    "detail": self.to_string(),
                }
            })
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
