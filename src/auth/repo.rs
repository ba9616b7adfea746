use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    auth::repo_types::{AppUser, AppUserRow, NewUser, UserStatus},
    error::StoreError,
};

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert as `Pending`. A taken email is `DuplicateEmail`.
    async fn add_user(&self, user: NewUser) -> Result<AppUser, StoreError>;
    /// `Ok(None)` when no row matches.
    async fn get_user_by_email(&self, email: &str) -> Result<Option<AppUser>, StoreError>;
    async fn update_user_status(&self, email: &str, status: UserStatus)
        -> Result<(), StoreError>;
    /// Overwrite the credential and force `Pending`. Unknown email is `NotFound`, nothing written.
    async fn reset_password(&self, email: &str, password_hash: &str) -> Result<(), StoreError>;
    /// Overwrite the credential only; status is left as it is.
    async fn set_password(&self, email: &str, password_hash: &str) -> Result<(), StoreError>;
    async fn list_users(&self, status: Option<UserStatus>) -> Result<Vec<AppUser>, StoreError>;
}

/// Server-side record of an open login. Revoking it is logout.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn open(&self, email: &str) -> Result<Uuid, StoreError>;
    /// Email of the session owner, `None` once revoked.
    async fn find(&self, id: Uuid) -> Result<Option<String>, StoreError>;
    async fn revoke(&self, id: Uuid) -> Result<(), StoreError>;
    async fn revoke_all(&self, email: &str) -> Result<u64, StoreError>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn add_user(&self, user: NewUser) -> Result<AppUser, StoreError> {
        let row = sqlx::query_as::<_, AppUserRow>(
            r#"
            INSERT INTO app_users (full_name, email, password_hash, status)
            VALUES ($1, $2, $3, $4)
            RETURNING id, full_name, email, password_hash, status, created_at
            "#,
        )
        .bind(&user.full_name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(UserStatus::Pending.as_str())
        .fetch_one(&self.db)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(d) = &e {
                if d.is_unique_violation() {
                    return StoreError::DuplicateEmail(user.email.clone());
                }
            }
            StoreError::from(e)
        })?;
        AppUser::try_from(row)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<AppUser>, StoreError> {
        let row = sqlx::query_as::<_, AppUserRow>(
            r#"
            SELECT id, full_name, email, password_hash, status, created_at
            FROM app_users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        row.map(AppUser::try_from).transpose()
    }

    async fn update_user_status(
        &self,
        email: &str,
        status: UserStatus,
    ) -> Result<(), StoreError> {
        let done = sqlx::query(r#"UPDATE app_users SET status = $2 WHERE email = $1"#)
            .bind(email)
            .bind(status.as_str())
            .execute(&self.db)
            .await?;
        if done.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("user {email}")));
        }
        Ok(())
    }

    async fn reset_password(&self, email: &str, password_hash: &str) -> Result<(), StoreError> {
        let done = sqlx::query(
            r#"UPDATE app_users SET password_hash = $2, status = $3 WHERE email = $1"#,
        )
        .bind(email)
        .bind(password_hash)
        .bind(UserStatus::Pending.as_str())
        .execute(&self.db)
        .await?;
        if done.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("user {email}")));
        }
        Ok(())
    }

    async fn set_password(&self, email: &str, password_hash: &str) -> Result<(), StoreError> {
        let done = sqlx::query(r#"UPDATE app_users SET password_hash = $2 WHERE email = $1"#)
            .bind(email)
            .bind(password_hash)
            .execute(&self.db)
            .await?;
        if done.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("user {email}")));
        }
        Ok(())
    }

    async fn list_users(&self, status: Option<UserStatus>) -> Result<Vec<AppUser>, StoreError> {
        let rows = sqlx::query_as::<_, AppUserRow>(
            r#"
            SELECT id, full_name, email, password_hash, status, created_at
            FROM app_users
            WHERE $1::text IS NULL OR status = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(status.map(UserStatus::as_str))
        .fetch_all(&self.db)
        .await?;
        rows.into_iter().map(AppUser::try_from).collect()
    }
}

#[derive(Clone)]
pub struct PgSessionStore {
    db: PgPool,
}

impl PgSessionStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn open(&self, email: &str) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();
        sqlx::query(r#"INSERT INTO app_sessions (id, email) VALUES ($1, $2)"#)
            .bind(id)
            .bind(email)
            .execute(&self.db)
            .await?;
        Ok(id)
    }

    async fn find(&self, id: Uuid) -> Result<Option<String>, StoreError> {
        let email = sqlx::query_scalar::<_, String>(
            r#"SELECT email FROM app_sessions WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(email)
    }

    async fn revoke(&self, id: Uuid) -> Result<(), StoreError> {
        sqlx::query(r#"DELETE FROM app_sessions WHERE id = $1"#)
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn revoke_all(&self, email: &str) -> Result<u64, StoreError> {
        let done = sqlx::query(r#"DELETE FROM app_sessions WHERE email = $1"#)
            .bind(email)
            .execute(&self.db)
            .await?;
        Ok(done.rows_affected())
    }
}
