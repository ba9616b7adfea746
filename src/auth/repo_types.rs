use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserStatus {
    Pending,
    Approved,
}

impl UserStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            UserStatus::Pending => "Pending",
            UserStatus::Approved => "Approved",
        }
    }
}

impl FromStr for UserStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(UserStatus::Pending),
            "Approved" => Ok(UserStatus::Approved),
            other => Err(StoreError::Backend(format!("unknown user status {other:?}"))),
        }
    }
}

/// Dashboard account, keyed by email.
#[derive(Debug, Clone, Serialize)]
pub struct AppUser {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 PHC string
    pub status: UserStatus,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, FromRow)]
pub struct AppUserRow {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub password_hash: String,
    pub status: String,
    pub created_at: OffsetDateTime,
}

impl TryFrom<AppUserRow> for AppUser {
    type Error = StoreError;

    fn try_from(r: AppUserRow) -> Result<Self, Self::Error> {
        Ok(Self {
            status: r.status.parse()?,
            id: r.id,
            full_name: r.full_name,
            email: r.email,
            password_hash: r.password_hash,
            created_at: r.created_at,
        })
    }
}

/// Insert payload; the store always sets `Pending`.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub full_name: String,
    pub email: String,
    pub password_hash: String,
}
