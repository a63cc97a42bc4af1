use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::error;

use crate::auth::store::StoreError;

/// Domain-level auth outcomes mapped to client-facing responses.
/// Infrastructure failures ride in `Internal` and render as a generic 500.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    InvalidField(String),
    #[error("User already exists")]
    AlreadyExists,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Invalid or expired token")]
    Unauthenticated,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    pub fn invalid_field(message: impl Into<String>) -> Self {
        Self::InvalidField(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::InvalidField(_) | AuthError::AlreadyExists => StatusCode::BAD_REQUEST,
            AuthError::InvalidCredentials | AuthError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to clients. Internal detail stays in the logs.
    pub fn message(&self) -> String {
        match self {
            AuthError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            // An insert losing the check/insert race reads the same as a
            // pre-flight hit from the caller's side.
            StoreError::Duplicate => AuthError::AlreadyExists,
            StoreError::Other(e) => AuthError::Internal(e),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if let AuthError::Internal(e) = &self {
            error!(error = %e, "internal error");
        }
        let body = Json(serde_json::json!({ "message": self.message() }));
        (self.status(), body).into_response()
    }
}
