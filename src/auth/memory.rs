use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    repo::{SessionStore, UserStore},
    repo_types::{AppUser, NewUser, UserStatus},
};
use crate::error::StoreError;

#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<String, AppUser>>,
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn add_user(&self, user: NewUser) -> Result<AppUser, StoreError> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.email) {
            return Err(StoreError::DuplicateEmail(user.email));
        }
        let created = AppUser {
            id: Uuid::new_v4(),
            full_name: user.full_name,
            email: user.email.clone(),
            password_hash: user.password_hash,
            status: UserStatus::Pending,
            created_at: OffsetDateTime::now_utc(),
        };
        users.insert(user.email, created.clone());
        Ok(created)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<AppUser>, StoreError> {
        Ok(self.users.read().await.get(email).cloned())
    }

    async fn update_user_status(
        &self,
        email: &str,
        status: UserStatus,
    ) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(email)
            .ok_or_else(|| StoreError::NotFound(format!("user {email}")))?;
        user.status = status;
        Ok(())
    }

    async fn reset_password(&self, email: &str, password_hash: &str) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(email)
            .ok_or_else(|| StoreError::NotFound(format!("user {email}")))?;
        user.password_hash = password_hash.to_string();
        user.status = UserStatus::Pending;
        Ok(())
    }

    async fn set_password(&self, email: &str, password_hash: &str) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(email)
            .ok_or_else(|| StoreError::NotFound(format!("user {email}")))?;
        user.password_hash = password_hash.to_string();
        Ok(())
    }

    async fn list_users(&self, status: Option<UserStatus>) -> Result<Vec<AppUser>, StoreError> {
        let mut out: Vec<AppUser> = self
            .users
            .read()
            .await
            .values()
            .filter(|u| status.map_or(true, |st| u.status == st))
            .cloned()
            .collect();
        out.sort_by_key(|u| u.created_at);
        Ok(out)
    }
}

#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<Uuid, String>>,
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn open(&self, email: &str) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();
        self.sessions.write().await.insert(id, email.to_string());
        Ok(id)
    }

    async fn find(&self, id: Uuid) -> Result<Option<String>, StoreError> {
        Ok(self.sessions.read().await.get(&id).cloned())
    }

    async fn revoke(&self, id: Uuid) -> Result<(), StoreError> {
        self.sessions.write().await.remove(&id);
        Ok(())
    }

    async fn revoke_all(&self, email: &str) -> Result<u64, StoreError> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, owner| owner != email);
        Ok((before - sessions.len()) as u64)
    }
}
