use serde::Deserialize;
use uuid::Uuid;

use filmgate_infra::{HistoryPage, RoleRecord, UserRecord};

use crate::app::errors::ApiError;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct RoleNameRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ProvideRoleRequest {
    pub user_id: Uuid,
    pub role_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub page: Option<u32>,
    pub size: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct BlacklistQuery {
    pub access_token: String,
}

// -------------------------
// Validation
// -------------------------

pub fn validate_email(email: &str) -> Result<(), ApiError> {
    if email.trim().is_empty() || !email.contains('@') {
        return Err(ApiError::Validation("invalid email format".to_string()));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.is_empty() {
        return Err(ApiError::Validation("password must not be empty".to_string()));
    }
    Ok(())
}

pub fn validate_role_name(name: &str) -> Result<(), ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::Validation("role name must not be empty".to_string()));
    }
    if name.len() > 64 {
        return Err(ApiError::Validation(
            "role name must be at most 64 characters".to_string(),
        ));
    }
    Ok(())
}

// -------------------------
// Response mapping
// -------------------------

pub fn user_to_json(user: &UserRecord) -> serde_json::Value {
    serde_json::json!({
        "id": user.id.to_string(),
        "email": user.email,
        "full_name": user.full_name,
        "created_at": user.created_at.to_rfc3339(),
    })
}

pub fn user_with_roles_to_json(user: &UserRecord) -> serde_json::Value {
    let mut value = user_to_json(user);
    value["user_roles"] = serde_json::json!(user.role_names());
    value
}

pub fn role_to_json(role: &RoleRecord) -> serde_json::Value {
    serde_json::json!({
        "id": role.id.to_string(),
        "name": role.name,
    })
}

pub fn history_to_json(page: &HistoryPage) -> serde_json::Value {
    let items: Vec<serde_json::Value> = page
        .items
        .iter()
        .map(|item| {
            serde_json::json!({
                "date": item.date.to_rfc3339(),
                "device_type": item.device.as_str(),
                "user_agent": item.user_agent,
            })
        })
        .collect();

    serde_json::json!({
        "items": items,
        "prev_num": page.prev_num,
        "next_num": page.next_num,
        "total": page.total,
    })
}
