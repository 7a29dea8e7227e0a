//! User listing, detail, update, deletion and password change.
//!
//! The group runs behind the access gate with GET bypassed: reads are
//! public, mutations need a valid session.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

use filmgate_auth as auth;
use filmgate_core::UserId;
use filmgate_infra::{IdentityStore as _, UserUpdate};

use crate::app::errors::{self, ApiError};
use crate::app::services::AppServices;
use crate::app::{dto, dto::user_to_json, dto::user_with_roles_to_json};
use crate::context::AuthContext;

pub fn router() -> Router {
    Router::new()
        .route("/auth/users/", get(list_users))
        .route(
            "/auth/users/:id/",
            get(get_user).patch(update_user).delete(delete_user),
        )
        .route("/auth/users/change-password/", post(change_password))
}

/// GET /auth/users/ - list users (public).
pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
) -> Result<Response, ApiError> {
    let users = services.identities.list_users().await?;
    let body: Vec<serde_json::Value> = users.iter().map(user_to_json).collect();
    Ok((StatusCode::OK, Json(body)).into_response())
}

/// GET /auth/users/:id/ - user detail with role names (public).
pub async fn get_user(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_user_id(&id)?;
    let user = services
        .identities
        .user_by_id(id)
        .await?
        .ok_or(ApiError::NotFound(errors::ERR_USER_NOT_FOUND))?;

    Ok((StatusCode::OK, Json(user_with_roles_to_json(&user))).into_response())
}

/// PATCH /auth/users/:id/ - full-replace update (authenticated).
pub async fn update_user(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::SignUpRequest>,
) -> Result<Response, ApiError> {
    let id = parse_user_id(&id)?;
    dto::validate_email(&body.email)?;
    dto::validate_password(&body.password)?;

    let user = services
        .identities
        .update_user(
            id,
            UserUpdate {
                email: body.email,
                password_hash: auth::hash_password(&body.password)?,
                full_name: body.full_name,
            },
        )
        .await
        .map_err(user_not_found)?;

    Ok((StatusCode::OK, Json(user_to_json(&user))).into_response())
}

/// DELETE /auth/users/:id/ - delete an account (authenticated).
///
/// Role links and login history go with it via the store cascade.
pub async fn delete_user(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_user_id(&id)?;
    services
        .identities
        .delete_user(id)
        .await
        .map_err(user_not_found)?;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({ "detail": errors::DETAIL_DELETED })),
    )
        .into_response())
}

/// POST /auth/users/change-password/ - re-hash with a fresh salt.
pub async fn change_password(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
    Json(body): Json<dto::ChangePasswordRequest>,
) -> Result<Response, ApiError> {
    dto::validate_password(&body.new_password)?;

    services
        .identities
        .set_password(ctx.user_id(), &auth::hash_password(&body.new_password)?)
        .await?;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({ "detail": errors::DETAIL_PASSWORD_CHANGED })),
    )
        .into_response())
}

fn parse_user_id(raw: &str) -> Result<UserId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest("invalid user id".to_string()))
}

fn user_not_found(err: filmgate_infra::StoreError) -> ApiError {
    match err {
        filmgate_infra::StoreError::NotFound => ApiError::NotFound(errors::ERR_USER_NOT_FOUND),
        other => other.into(),
    }
}
