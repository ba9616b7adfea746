use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::repo_types::{AppUser, UserStatus};

/// Request body for signup.
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Forgot-password form: new credential set directly, account goes back to Pending.
#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub new_password: String,
    #[serde(default)]
    pub confirm_password: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetLinkRequest {
    pub email: String,
}

/// Password update from a reset link; the link token is the bearer.
#[derive(Debug, Deserialize)]
pub struct UpdatePasswordRequest {
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: UserStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserListQuery {
    pub status: Option<UserStatus>,
}

/// Response returned after login.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub user: PublicUser,
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub email: String,
    pub full_name: String,
    pub status: UserStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<AppUser> for PublicUser {
    fn from(u: AppUser) -> Self {
        Self {
            email: u.email,
            full_name: u.full_name,
            status: u.status,
            created_at: u.created_at,
        }
    }
}
