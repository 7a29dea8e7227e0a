//! Postgres-backed identity store.
//!
//! Runtime queries over a shared `PgPool`. Uniqueness violations (code
//! `23505`) map to `StoreError::Conflict`; role links and login history hang
//! off the user row with `ON DELETE CASCADE`, so account deletion is a single
//! statement.

use std::sync::Arc;

use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use filmgate_core::{RoleId, UserId};

use super::{
    DeviceKind, HistoryPage, IdentityStore, LoginRecord, NewUser, RoleRecord, StoreError,
    UserRecord, UserUpdate,
};

const BOOTSTRAP: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id UUID PRIMARY KEY,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        email TEXT NOT NULL UNIQUE,
        full_name TEXT,
        password_hash TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS user_roles (
        id UUID PRIMARY KEY,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        name VARCHAR(64) NOT NULL UNIQUE
    )",
    "CREATE TABLE IF NOT EXISTS users_user_roles (
        user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        role_id UUID NOT NULL REFERENCES user_roles(id) ON DELETE CASCADE,
        PRIMARY KEY (user_id, role_id)
    )",
    "CREATE TABLE IF NOT EXISTS login_history (
        id UUID PRIMARY KEY,
        date TIMESTAMPTZ NOT NULL DEFAULT now(),
        user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        user_agent TEXT NOT NULL DEFAULT '',
        device_type TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS login_history_user_idx
        ON login_history (user_id, date DESC)",
];

/// Identity store over Postgres.
#[derive(Debug, Clone)]
pub struct PostgresIdentityStore {
    pool: Arc<PgPool>,
}

impl PostgresIdentityStore {
    /// Wrap an existing pool and ensure the schema exists.
    pub async fn new(pool: PgPool) -> Result<Self, StoreError> {
        let store = Self {
            pool: Arc::new(pool),
        };
        for ddl in BOOTSTRAP {
            sqlx::query(ddl).execute(&*store.pool).await?;
        }
        Ok(store)
    }

    fn user_from_row(row: &sqlx::postgres::PgRow, roles: Vec<RoleRecord>) -> UserRecord {
        UserRecord {
            id: UserId::from_uuid(row.get("id")),
            email: row.get("email"),
            full_name: row.get("full_name"),
            password_hash: row.get("password_hash"),
            created_at: row.get("created_at"),
            roles,
        }
    }

    fn role_from_row(row: &sqlx::postgres::PgRow) -> RoleRecord {
        RoleRecord {
            id: RoleId::from_uuid(row.get("id")),
            name: row.get("name"),
            created_at: row.get("created_at"),
        }
    }

    async fn roles_for(&self, user_id: UserId) -> Result<Vec<RoleRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT r.id, r.name, r.created_at
             FROM user_roles r
             JOIN users_user_roles link ON link.role_id = r.id
             WHERE link.user_id = $1
             ORDER BY r.name",
        )
        .bind(user_id.as_uuid())
        .fetch_all(&*self.pool)
        .await?;

        Ok(rows.iter().map(Self::role_from_row).collect())
    }

    async fn exists(&self, table: &str, id: Uuid) -> Result<bool, StoreError> {
        let query = format!("SELECT 1 FROM {table} WHERE id = $1");
        let row = sqlx::query(&query).bind(id).fetch_optional(&*self.pool).await?;
        Ok(row.is_some())
    }
}

#[async_trait::async_trait]
impl IdentityStore for PostgresIdentityStore {
    #[instrument(skip(self, new_user), fields(email = %new_user.email), err)]
    async fn create_user(&self, new_user: NewUser) -> Result<UserRecord, StoreError> {
        let row = sqlx::query(
            "INSERT INTO users (id, email, full_name, password_hash)
             VALUES ($1, $2, $3, $4)
             RETURNING id, created_at, email, full_name, password_hash",
        )
        .bind(UserId::new().as_uuid())
        .bind(&new_user.email)
        .bind(&new_user.full_name)
        .bind(&new_user.password_hash)
        .fetch_one(&*self.pool)
        .await?;

        Ok(Self::user_from_row(&row, Vec::new()))
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT id, created_at, email, full_name, password_hash
             FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&*self.pool)
        .await?;

        match row {
            Some(row) => {
                let id = UserId::from_uuid(row.get("id"));
                let roles = self.roles_for(id).await?;
                Ok(Some(Self::user_from_row(&row, roles)))
            }
            None => Ok(None),
        }
    }

    async fn user_by_id(&self, id: UserId) -> Result<Option<UserRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT id, created_at, email, full_name, password_hash
             FROM users WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await?;

        match row {
            Some(row) => {
                let roles = self.roles_for(id).await?;
                Ok(Some(Self::user_from_row(&row, roles)))
            }
            None => Ok(None),
        }
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, created_at, email, full_name, password_hash
             FROM users ORDER BY created_at",
        )
        .fetch_all(&*self.pool)
        .await?;

        let mut users = Vec::with_capacity(rows.len());
        for row in &rows {
            let id = UserId::from_uuid(row.get("id"));
            let roles = self.roles_for(id).await?;
            users.push(Self::user_from_row(row, roles));
        }
        Ok(users)
    }

    async fn update_user(&self, id: UserId, update: UserUpdate) -> Result<UserRecord, StoreError> {
        let row = sqlx::query(
            "UPDATE users SET email = $2, full_name = $3, password_hash = $4
             WHERE id = $1
             RETURNING id, created_at, email, full_name, password_hash",
        )
        .bind(id.as_uuid())
        .bind(&update.email)
        .bind(&update.full_name)
        .bind(&update.password_hash)
        .fetch_optional(&*self.pool)
        .await?
        .ok_or(StoreError::NotFound)?;

        let roles = self.roles_for(id).await?;
        Ok(Self::user_from_row(&row, roles))
    }

    #[instrument(skip(self), fields(user_id = %id), err)]
    async fn delete_user(&self, id: UserId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn set_password(&self, id: UserId, password_hash: &str) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(password_hash)
            .execute(&*self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn create_role(&self, name: &str) -> Result<RoleRecord, StoreError> {
        let row = sqlx::query(
            "INSERT INTO user_roles (id, name) VALUES ($1, $2)
             RETURNING id, created_at, name",
        )
        .bind(RoleId::new().as_uuid())
        .bind(name)
        .fetch_one(&*self.pool)
        .await?;

        Ok(Self::role_from_row(&row))
    }

    async fn role_by_id(&self, id: RoleId) -> Result<Option<RoleRecord>, StoreError> {
        let row = sqlx::query("SELECT id, created_at, name FROM user_roles WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await?;

        Ok(row.as_ref().map(Self::role_from_row))
    }

    async fn list_roles(&self) -> Result<Vec<RoleRecord>, StoreError> {
        let rows = sqlx::query("SELECT id, created_at, name FROM user_roles ORDER BY name")
            .fetch_all(&*self.pool)
            .await?;

        Ok(rows.iter().map(Self::role_from_row).collect())
    }

    async fn rename_role(&self, id: RoleId, name: &str) -> Result<RoleRecord, StoreError> {
        let row = sqlx::query(
            "UPDATE user_roles SET name = $2 WHERE id = $1
             RETURNING id, created_at, name",
        )
        .bind(id.as_uuid())
        .bind(name)
        .fetch_optional(&*self.pool)
        .await?
        .ok_or(StoreError::NotFound)?;

        Ok(Self::role_from_row(&row))
    }

    #[instrument(skip(self), fields(role_id = %id), err)]
    async fn delete_role(&self, id: RoleId) -> Result<Vec<UserId>, StoreError> {
        let holders = sqlx::query("SELECT user_id FROM users_user_roles WHERE role_id = $1")
            .bind(id.as_uuid())
            .fetch_all(&*self.pool)
            .await?;

        let result = sqlx::query("DELETE FROM user_roles WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        Ok(holders
            .iter()
            .map(|row| UserId::from_uuid(row.get("user_id")))
            .collect())
    }

    async fn grant_role(&self, user_id: UserId, role_id: RoleId) -> Result<(), StoreError> {
        if !self.exists("users", *user_id.as_uuid()).await? {
            return Err(StoreError::NotFound);
        }
        if !self.exists("user_roles", *role_id.as_uuid()).await? {
            return Err(StoreError::NotFound);
        }

        sqlx::query(
            "INSERT INTO users_user_roles (user_id, role_id) VALUES ($1, $2)
             ON CONFLICT DO NOTHING",
        )
        .bind(user_id.as_uuid())
        .bind(role_id.as_uuid())
        .execute(&*self.pool)
        .await?;
        Ok(())
    }

    async fn revoke_role(&self, user_id: UserId, role_id: RoleId) -> Result<(), StoreError> {
        if !self.exists("users", *user_id.as_uuid()).await? {
            return Err(StoreError::NotFound);
        }
        if !self.exists("user_roles", *role_id.as_uuid()).await? {
            return Err(StoreError::NotFound);
        }

        sqlx::query("DELETE FROM users_user_roles WHERE user_id = $1 AND role_id = $2")
            .bind(user_id.as_uuid())
            .bind(role_id.as_uuid())
            .execute(&*self.pool)
            .await?;
        Ok(())
    }

    async fn record_login(&self, record: LoginRecord) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO login_history (id, date, user_id, user_agent, device_type)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(Uuid::now_v7())
        .bind(record.date)
        .bind(record.user_id.as_uuid())
        .bind(&record.user_agent)
        .bind(record.device.as_str())
        .execute(&*self.pool)
        .await?;
        Ok(())
    }

    async fn login_history(
        &self,
        user_id: UserId,
        page: u32,
        size: u32,
    ) -> Result<HistoryPage, StoreError> {
        let total: i64 = sqlx::query("SELECT COUNT(*) AS total FROM login_history WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .fetch_one(&*self.pool)
            .await?
            .get("total");

        let offset = i64::from(page.saturating_sub(1)) * i64::from(size);
        let rows = sqlx::query(
            "SELECT date, user_agent, device_type FROM login_history
             WHERE user_id = $1
             ORDER BY date DESC
             LIMIT $2 OFFSET $3",
        )
        .bind(user_id.as_uuid())
        .bind(i64::from(size))
        .bind(offset)
        .fetch_all(&*self.pool)
        .await?;

        let items = rows
            .iter()
            .map(|row| LoginRecord {
                user_id,
                date: row.get("date"),
                user_agent: row.get("user_agent"),
                device: row.get::<String, _>("device_type").parse().unwrap_or(DeviceKind::Other),
            })
            .collect();

        Ok(HistoryPage::new(items, page, size, total as u64))
    }
}
