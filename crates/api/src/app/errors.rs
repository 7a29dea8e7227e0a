//! Error taxonomy and response mapping.
//!
//! Authentication failures collapse to one generic 401 body: the response
//! never says whether the token was expired, revoked or superseded, so a
//! caller cannot probe which check failed. The malformed-header case is the
//! one exception with its own message, matching the documented contract.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use filmgate_auth::{EncodeError, PasswordError};
use filmgate_infra::{RegistryError, StoreError};

pub const ERR_BAD_AUTH_HEADER: &str =
    "Authorization header is wrong. It must be like \"Bearer <token>\".";
pub const ERR_NOT_AUTHENTICATED: &str = "Authentication failed";
pub const ERR_USER_NOT_FOUND: &str = "User not found";
pub const ERR_ROLE_NOT_FOUND: &str = "Role not found";
pub const ERR_WRONG_PASSWORD: &str = "Password is wrong";
pub const ERR_ACTION_NOT_ALLOWED: &str = "You are not allowed to perform this action";

pub const DETAIL_TOKENS_REVOKED: &str = "Access and refresh tokens has been revoked";
pub const DETAIL_PASSWORD_CHANGED: &str = "Password was changed successfully!";
pub const DETAIL_ROLE_PROVIDED: &str = "Role successfully provided";
pub const DETAIL_ROLE_REVOKED: &str = "Role successfully revoked";
pub const DETAIL_DELETED: &str = "Deleted";

/// Request-level error, mapped onto the HTTP taxonomy.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Unauthenticated(&'static str),

    #[error("forbidden")]
    Forbidden,

    #[error("{0}")]
    NotFound(&'static str),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthenticated(_) => "unauthenticated",
            ApiError::Forbidden => "forbidden",
            ApiError::NotFound(_) => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Validation(_) => "validation_error",
            ApiError::Internal(_) => "internal_error",
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Unauthenticated(msg) => (*msg).to_string(),
            ApiError::Forbidden => ERR_ACTION_NOT_ALLOWED.to_string(),
            ApiError::NotFound(msg) => (*msg).to_string(),
            ApiError::Conflict(msg)
            | ApiError::BadRequest(msg)
            | ApiError::Validation(msg) => msg.clone(),
            // Do not leak internals to the client.
            ApiError::Internal(_) => "internal error".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(detail) = &self {
            tracing::error!(error = %detail, "request failed with internal error");
        }
        json_error(self.status(), self.code(), self.message())
    }
}

/// The generic 401 used for every authentication failure past header parsing.
pub fn unauthenticated() -> Response {
    ApiError::Unauthenticated(ERR_NOT_AUTHENTICATED).into_response()
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => ApiError::NotFound("Not found"),
            StoreError::Conflict(msg) => ApiError::Conflict(msg),
            StoreError::Unavailable(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Unavailable(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<EncodeError> for ApiError {
    fn from(err: EncodeError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::Internal(err.to_string())
    }
}
