//! In-memory identity store (tests and local runs).

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use chrono::Utc;

use filmgate_core::{RoleId, UserId};

use super::{
    HistoryPage, IdentityStore, LoginRecord, NewUser, RoleRecord, StoreError, UserRecord,
    UserUpdate,
};

#[derive(Default)]
struct Inner {
    users: HashMap<UserId, UserRecord>,
    roles: HashMap<RoleId, RoleRecord>,
    links: HashSet<(UserId, RoleId)>,
    history: Vec<LoginRecord>,
}

impl Inner {
    fn with_roles(&self, user: &UserRecord) -> UserRecord {
        let mut roles: Vec<RoleRecord> = self
            .links
            .iter()
            .filter(|(u, _)| *u == user.id)
            .filter_map(|(_, r)| self.roles.get(r).cloned())
            .collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));

        UserRecord {
            roles,
            ..user.clone()
        }
    }

    fn email_taken(&self, email: &str, except: Option<UserId>) -> bool {
        self.users
            .values()
            .any(|u| u.email == email && Some(u.id) != except)
    }
}

#[derive(Default)]
pub struct InMemoryIdentityStore {
    inner: Mutex<Inner>,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl IdentityStore for InMemoryIdentityStore {
    async fn create_user(&self, new_user: NewUser) -> Result<UserRecord, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.email_taken(&new_user.email, None) {
            return Err(StoreError::Conflict(format!(
                "email {} already registered",
                new_user.email
            )));
        }

        let user = UserRecord {
            id: UserId::new(),
            email: new_user.email,
            full_name: new_user.full_name,
            password_hash: new_user.password_hash,
            created_at: Utc::now(),
            roles: Vec::new(),
        };
        inner.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .users
            .values()
            .find(|u| u.email == email)
            .map(|u| inner.with_roles(u)))
    }

    async fn user_by_id(&self, id: UserId) -> Result<Option<UserRecord>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.users.get(&id).map(|u| inner.with_roles(u)))
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut users: Vec<UserRecord> =
            inner.users.values().map(|u| inner.with_roles(u)).collect();
        users.sort_by_key(|u| u.created_at);
        Ok(users)
    }

    async fn update_user(&self, id: UserId, update: UserUpdate) -> Result<UserRecord, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.users.contains_key(&id) {
            return Err(StoreError::NotFound);
        }
        if inner.email_taken(&update.email, Some(id)) {
            return Err(StoreError::Conflict(format!(
                "email {} already registered",
                update.email
            )));
        }

        let user = inner.users.get_mut(&id).unwrap();
        user.email = update.email;
        user.full_name = update.full_name;
        user.password_hash = update.password_hash;
        let updated = user.clone();
        Ok(inner.with_roles(&updated))
    }

    async fn delete_user(&self, id: UserId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.users.remove(&id).is_none() {
            return Err(StoreError::NotFound);
        }
        inner.links.retain(|(u, _)| *u != id);
        inner.history.retain(|h| h.user_id != id);
        Ok(())
    }

    async fn set_password(&self, id: UserId, password_hash: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let user = inner.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        user.password_hash = password_hash.to_string();
        Ok(())
    }

    async fn create_role(&self, name: &str) -> Result<RoleRecord, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.roles.values().any(|r| r.name == name) {
            return Err(StoreError::Conflict(format!("role {name} already exists")));
        }

        let role = RoleRecord {
            id: RoleId::new(),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        inner.roles.insert(role.id, role.clone());
        Ok(role)
    }

    async fn role_by_id(&self, id: RoleId) -> Result<Option<RoleRecord>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.roles.get(&id).cloned())
    }

    async fn list_roles(&self) -> Result<Vec<RoleRecord>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut roles: Vec<RoleRecord> = inner.roles.values().cloned().collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    async fn rename_role(&self, id: RoleId, name: &str) -> Result<RoleRecord, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.roles.contains_key(&id) {
            return Err(StoreError::NotFound);
        }
        if inner.roles.values().any(|r| r.name == name && r.id != id) {
            return Err(StoreError::Conflict(format!("role {name} already exists")));
        }

        let role = inner.roles.get_mut(&id).unwrap();
        role.name = name.to_string();
        Ok(role.clone())
    }

    async fn delete_role(&self, id: RoleId) -> Result<Vec<UserId>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.roles.remove(&id).is_none() {
            return Err(StoreError::NotFound);
        }

        let holders: Vec<UserId> = inner
            .links
            .iter()
            .filter(|(_, r)| *r == id)
            .map(|(u, _)| *u)
            .collect();
        inner.links.retain(|(_, r)| *r != id);
        Ok(holders)
    }

    async fn grant_role(&self, user_id: UserId, role_id: RoleId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.users.contains_key(&user_id) || !inner.roles.contains_key(&role_id) {
            return Err(StoreError::NotFound);
        }
        inner.links.insert((user_id, role_id));
        Ok(())
    }

    async fn revoke_role(&self, user_id: UserId, role_id: RoleId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.users.contains_key(&user_id) || !inner.roles.contains_key(&role_id) {
            return Err(StoreError::NotFound);
        }
        inner.links.remove(&(user_id, role_id));
        Ok(())
    }

    async fn record_login(&self, record: LoginRecord) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.history.push(record);
        Ok(())
    }

    async fn login_history(
        &self,
        user_id: UserId,
        page: u32,
        size: u32,
    ) -> Result<HistoryPage, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut logs: Vec<LoginRecord> = inner
            .history
            .iter()
            .filter(|h| h.user_id == user_id)
            .cloned()
            .collect();
        logs.sort_by(|a, b| b.date.cmp(&a.date));

        let total = logs.len() as u64;
        let start = (page.saturating_sub(1) as usize) * size as usize;
        let items: Vec<LoginRecord> = logs.into_iter().skip(start).take(size as usize).collect();
        Ok(HistoryPage::new(items, page, size, total))
    }
}
