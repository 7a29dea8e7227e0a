//! Role CRUD plus grant/revoke.
//!
//! The whole group sits behind the superuser gate with GET bypassed, so
//! listing and reading roles stays public while every mutation requires the
//! superuser role. Mutations that change a user's effective role set
//! invalidate that user's sessions; the role snapshot embedded in tokens
//! must not outlive the change.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

use filmgate_core::{RoleId, UserId};
use filmgate_infra::IdentityStore as _;

use crate::app::errors::{self, ApiError};
use crate::app::services::AppServices;
use crate::app::{dto, dto::role_to_json};

pub fn router() -> Router {
    Router::new()
        .route("/auth/roles/", get(list_roles).post(create_role))
        .route(
            "/auth/roles/:id/",
            get(get_role).patch(update_role).delete(delete_role),
        )
        .route("/auth/roles/provide/", post(provide_role))
        .route("/auth/roles/revoke/", post(revoke_role))
}

/// GET /auth/roles/ - list all roles (public).
pub async fn list_roles(
    Extension(services): Extension<Arc<AppServices>>,
) -> Result<Response, ApiError> {
    let roles = services.identities.list_roles().await?;
    let body: Vec<serde_json::Value> = roles.iter().map(role_to_json).collect();
    Ok((StatusCode::OK, Json(body)).into_response())
}

/// GET /auth/roles/:id/ - one role (public).
pub async fn get_role(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_role_id(&id)?;
    let role = services
        .identities
        .role_by_id(id)
        .await?
        .ok_or(ApiError::NotFound(errors::ERR_ROLE_NOT_FOUND))?;

    Ok((StatusCode::OK, Json(role_to_json(&role))).into_response())
}

/// POST /auth/roles/ - create a role (superuser).
pub async fn create_role(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::RoleNameRequest>,
) -> Result<Response, ApiError> {
    dto::validate_role_name(&body.name)?;
    let role = services.identities.create_role(&body.name).await?;
    Ok((StatusCode::CREATED, Json(role_to_json(&role))).into_response())
}

/// PATCH /auth/roles/:id/ - rename a role (superuser).
pub async fn update_role(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::RoleNameRequest>,
) -> Result<Response, ApiError> {
    let id = parse_role_id(&id)?;
    dto::validate_role_name(&body.name)?;

    let role = services
        .identities
        .rename_role(id, &body.name)
        .await
        .map_err(role_not_found)?;

    Ok((StatusCode::OK, Json(role_to_json(&role))).into_response())
}

/// DELETE /auth/roles/:id/ - delete a role (superuser).
///
/// Users holding the role lose it implicitly; their sessions are invalidated
/// so stale snapshots cannot keep granting it.
pub async fn delete_role(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_role_id(&id)?;
    let holders = services
        .identities
        .delete_role(id)
        .await
        .map_err(role_not_found)?;

    for user_id in holders {
        services
            .sessions
            .invalidate_sessions(user_id)
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))?;
    }

    Ok(StatusCode::NO_CONTENT.into_response())
}

/// POST /auth/roles/provide/ - grant a role to a user (superuser).
pub async fn provide_role(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::ProvideRoleRequest>,
) -> Result<Response, ApiError> {
    let (user_id, role_id) = resolve_pair(&services, &body).await?;

    services.identities.grant_role(user_id, role_id).await?;
    services
        .sessions
        .invalidate_sessions(user_id)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({ "detail": errors::DETAIL_ROLE_PROVIDED })),
    )
        .into_response())
}

/// POST /auth/roles/revoke/ - revoke a role from a user (superuser).
pub async fn revoke_role(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::ProvideRoleRequest>,
) -> Result<Response, ApiError> {
    let (user_id, role_id) = resolve_pair(&services, &body).await?;

    services.identities.revoke_role(user_id, role_id).await?;
    services
        .sessions
        .invalidate_sessions(user_id)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({ "detail": errors::DETAIL_ROLE_REVOKED })),
    )
        .into_response())
}

/// Resolve the `{user_id, role_id}` pair, distinguishing which side is
/// missing in the 404 message.
async fn resolve_pair(
    services: &AppServices,
    body: &dto::ProvideRoleRequest,
) -> Result<(UserId, RoleId), ApiError> {
    let user_id = UserId::from_uuid(body.user_id);
    let role_id = RoleId::from_uuid(body.role_id);

    if services.identities.user_by_id(user_id).await?.is_none() {
        return Err(ApiError::NotFound(errors::ERR_USER_NOT_FOUND));
    }
    if services.identities.role_by_id(role_id).await?.is_none() {
        return Err(ApiError::NotFound(errors::ERR_ROLE_NOT_FOUND));
    }
    Ok((user_id, role_id))
}

fn parse_role_id(raw: &str) -> Result<RoleId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest("invalid role id".to_string()))
}

fn role_not_found(err: filmgate_infra::StoreError) -> ApiError {
    match err {
        filmgate_infra::StoreError::NotFound => ApiError::NotFound(errors::ERR_ROLE_NOT_FOUND),
        other => other.into(),
    }
}
