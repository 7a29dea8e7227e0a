//! Signup, login, logout, refresh, login history and the black-list check.

use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

use filmgate_auth::{self as auth, TokenKind};
use filmgate_infra::{IdentityStore as _, NewUser, TokenRegistry as _};

use crate::app::errors::{self, ApiError};
use crate::app::services::AppServices;
use crate::app::sessions::SessionError;
use crate::app::{dto, dto::user_to_json};
use crate::context::AuthContext;

/// Routes reachable without any credential.
pub fn public_router() -> Router {
    Router::new()
        .route("/auth/signup/", post(sign_up))
        .route("/auth/login/", post(login))
        .route("/auth/tokens/is-in-black-list/", get(is_token_compromised))
}

/// Routes behind the access-token gate (any role).
pub fn session_router() -> Router {
    Router::new()
        .route("/auth/logout/", post(logout))
        .route("/auth/login-history/", get(login_history))
}

/// Routes behind the refresh-token gate.
pub fn refresh_router() -> Router {
    Router::new().route("/auth/refresh-token/", post(refresh_access_token))
}

/// POST /auth/signup/ - register a new user.
pub async fn sign_up(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::SignUpRequest>,
) -> Result<Response, ApiError> {
    dto::validate_email(&body.email)?;
    dto::validate_password(&body.password)?;

    let user = services
        .identities
        .create_user(NewUser {
            email: body.email,
            password_hash: auth::hash_password(&body.password)?,
            full_name: body.full_name,
        })
        .await?;

    Ok((StatusCode::OK, Json(user_to_json(&user))).into_response())
}

/// POST /auth/login/ - verify the credential, return a token pair.
pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
    Json(body): Json<dto::LoginRequest>,
) -> Result<Response, ApiError> {
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    let pair = services
        .sessions
        .login(&body.email, &body.password, user_agent)
        .await
        .map_err(session_error)?;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "access_token": pair.access_token,
            "refresh_token": pair.refresh_token,
        })),
    )
        .into_response())
}

/// POST /auth/refresh-token/ - reissue the access token.
pub async fn refresh_access_token(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
) -> Result<Response, ApiError> {
    let access_token = services
        .sessions
        .refresh(ctx.identity())
        .await
        .map_err(session_error)?;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({ "access_token": access_token })),
    )
        .into_response())
}

/// POST /auth/logout/ - revoke the whole session pair.
pub async fn logout(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
) -> Result<Response, ApiError> {
    services
        .sessions
        .logout(ctx.claims())
        .await
        .map_err(session_error)?;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({ "detail": errors::DETAIL_TOKENS_REVOKED })),
    )
        .into_response())
}

fn session_error(err: SessionError) -> ApiError {
    match err {
        SessionError::UserNotFound => ApiError::NotFound(errors::ERR_USER_NOT_FOUND),
        SessionError::WrongPassword => ApiError::Unauthenticated(errors::ERR_WRONG_PASSWORD),
        SessionError::Registry(e) => e.into(),
        SessionError::Store(e) => e.into(),
        SessionError::Encode(e) => e.into(),
    }
}

/// GET /auth/login-history/ - the caller's paginated login audit trail.
pub async fn login_history(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Query(query): Query<dto::HistoryQuery>,
) -> Result<Response, ApiError> {
    let page = query.page.unwrap_or(1);
    let size = query.size.unwrap_or(20);
    if page == 0 {
        return Err(ApiError::Validation("page must be positive".to_string()));
    }
    if size == 0 || size > 1000 {
        return Err(ApiError::Validation(
            "size must be between 1 and 1000".to_string(),
        ));
    }

    let history = services
        .identities
        .login_history(ctx.user_id(), page, size)
        .await?;

    Ok((StatusCode::OK, Json(dto::history_to_json(&history))).into_response())
}

/// GET /auth/tokens/is-in-black-list/ - is this access token revoked?
pub async fn is_token_compromised(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::BlacklistQuery>,
) -> Result<Response, ApiError> {
    let claims = services
        .codec
        .decode(&query.access_token, TokenKind::Access)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let is_compromised = services.registry.is_revoked(claims.jti).await?;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({ "is_compromised": is_compromised })),
    )
        .into_response())
}
