//! Identity store: users, roles and login history.
//!
//! The registry answers "is this token still honored"; this store answers
//! "who is this user and what may they do". Backed by Postgres in
//! production, with an in-memory twin for tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use filmgate_core::{RoleId, UserId};

mod in_memory;
mod postgres;

pub use in_memory::InMemoryIdentityStore;
pub use postgres::PostgresIdentityStore;

/// A named permission group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRecord {
    pub id: RoleId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A user account with its role associations loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: UserId,
    pub email: String,
    pub full_name: Option<String>,
    /// Argon2 PHC string; the salt is embedded.
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub roles: Vec<RoleRecord>,
}

impl UserRecord {
    pub fn role_names(&self) -> Vec<String> {
        self.roles.iter().map(|r| r.name.clone()).collect()
    }
}

/// Device category derived from the user-agent string at login time.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Mobile,
    Desktop,
    Other,
}

impl DeviceKind {
    /// Classify a user-agent string. Phones and tablets collapse into
    /// `Mobile`; recognized desktop platforms map to `Desktop`; everything
    /// else (bots, curl, empty headers) is `Other`.
    pub fn classify(user_agent: &str) -> Self {
        const MOBILE_MARKERS: &[&str] =
            &["Mobile", "Android", "iPhone", "iPad", "iPod", "Tablet"];
        const DESKTOP_MARKERS: &[&str] = &["Windows", "Macintosh", "X11", "CrOS", "Linux"];

        if MOBILE_MARKERS.iter().any(|m| user_agent.contains(m)) {
            DeviceKind::Mobile
        } else if DESKTOP_MARKERS.iter().any(|m| user_agent.contains(m)) {
            DeviceKind::Desktop
        } else {
            DeviceKind::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceKind::Mobile => "mobile",
            DeviceKind::Desktop => "desktop",
            DeviceKind::Other => "other",
        }
    }
}

impl core::fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for DeviceKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mobile" => Ok(DeviceKind::Mobile),
            "desktop" => Ok(DeviceKind::Desktop),
            _ => Ok(DeviceKind::Other),
        }
    }
}

/// Append-only login audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginRecord {
    pub user_id: UserId,
    pub date: DateTime<Utc>,
    pub user_agent: String,
    pub device: DeviceKind,
}

/// One page of login history with navigation fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryPage {
    pub items: Vec<LoginRecord>,
    pub prev_num: Option<u32>,
    pub next_num: Option<u32>,
    pub total: u64,
}

impl HistoryPage {
    pub fn new(items: Vec<LoginRecord>, page: u32, size: u32, total: u64) -> Self {
        let prev_num = (page > 1).then(|| page - 1);
        let next_num = (u64::from(page) * u64::from(size) < total).then(|| page + 1);
        Self {
            items,
            prev_num,
            next_num,
            total,
        }
    }
}

/// Payload for creating a user. The password arrives already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub full_name: Option<String>,
}

/// Full-replace user update (mirrors the signup payload).
#[derive(Debug, Clone)]
pub struct UserUpdate {
    pub email: String,
    pub password_hash: String,
    pub full_name: Option<String>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("identity store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
                StoreError::Conflict(db.message().to_string())
            }
            _ => StoreError::Unavailable(err.to_string()),
        }
    }
}

/// Relational store of users, roles and login history.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn create_user(&self, new_user: NewUser) -> Result<UserRecord, StoreError>;
    async fn user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError>;
    async fn user_by_id(&self, id: UserId) -> Result<Option<UserRecord>, StoreError>;
    async fn list_users(&self) -> Result<Vec<UserRecord>, StoreError>;
    /// Full-replace update; fails with `NotFound` for unknown ids and
    /// `Conflict` when the new email is taken.
    async fn update_user(&self, id: UserId, update: UserUpdate) -> Result<UserRecord, StoreError>;
    /// Deletes the account, cascading role links and login history.
    async fn delete_user(&self, id: UserId) -> Result<(), StoreError>;
    async fn set_password(&self, id: UserId, password_hash: &str) -> Result<(), StoreError>;

    async fn create_role(&self, name: &str) -> Result<RoleRecord, StoreError>;
    async fn role_by_id(&self, id: RoleId) -> Result<Option<RoleRecord>, StoreError>;
    async fn list_roles(&self) -> Result<Vec<RoleRecord>, StoreError>;
    async fn rename_role(&self, id: RoleId, name: &str) -> Result<RoleRecord, StoreError>;
    /// Deletes the role and returns the ids of users that held it, so the
    /// caller can invalidate their sessions.
    async fn delete_role(&self, id: RoleId) -> Result<Vec<UserId>, StoreError>;
    async fn grant_role(&self, user_id: UserId, role_id: RoleId) -> Result<(), StoreError>;
    async fn revoke_role(&self, user_id: UserId, role_id: RoleId) -> Result<(), StoreError>;

    async fn record_login(&self, record: LoginRecord) -> Result<(), StoreError>;
    /// Page of the user's login history, newest first. `page` is 1-based.
    async fn login_history(
        &self,
        user_id: UserId,
        page: u32,
        size: u32,
    ) -> Result<HistoryPage, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_agents_classify_into_device_kinds() {
        let phone = "Mozilla/5.0 (iPhone; CPU iPhone OS 16_0 like Mac OS X) AppleWebKit/605.1.15";
        let tablet = "Mozilla/5.0 (iPad; CPU OS 15_0 like Mac OS X)";
        let android = "Mozilla/5.0 (Linux; Android 13; Pixel 7) Mobile Safari/537.36";
        let desktop = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";
        let mac = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7)";
        let curl = "curl/8.4.0";

        assert_eq!(DeviceKind::classify(phone), DeviceKind::Mobile);
        assert_eq!(DeviceKind::classify(tablet), DeviceKind::Mobile);
        assert_eq!(DeviceKind::classify(android), DeviceKind::Mobile);
        assert_eq!(DeviceKind::classify(desktop), DeviceKind::Desktop);
        assert_eq!(DeviceKind::classify(mac), DeviceKind::Desktop);
        assert_eq!(DeviceKind::classify(curl), DeviceKind::Other);
        assert_eq!(DeviceKind::classify(""), DeviceKind::Other);
    }

    #[test]
    fn history_page_navigation_fields() {
        let page = HistoryPage::new(vec![], 1, 10, 25);
        assert_eq!(page.prev_num, None);
        assert_eq!(page.next_num, Some(2));

        let page = HistoryPage::new(vec![], 3, 10, 25);
        assert_eq!(page.prev_num, Some(2));
        assert_eq!(page.next_num, None);
    }
}
