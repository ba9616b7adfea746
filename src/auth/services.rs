use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};

use super::{
    password::{hash_password, verify_password},
    repo::{SessionStore, UserStore},
    repo_types::{AppUser, NewUser, UserStatus},
};
use crate::error::{AppError, StoreError};

pub const MIN_PASSWORD_LEN: usize = 8;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn require_filled(fields: &[&str]) -> Result<(), AppError> {
    if fields.iter().any(|f| f.trim().is_empty()) {
        return Err(AppError::validation("Please fill in all fields."));
    }
    Ok(())
}

fn require_match(password: &str, confirm: &str) -> Result<(), AppError> {
    if password != confirm {
        return Err(AppError::validation("Passwords do not match."));
    }
    Ok(())
}

pub async fn signup(
    users: &dyn UserStore,
    full_name: &str,
    email: &str,
    password: &str,
    confirm_password: &str,
) -> Result<AppUser, AppError> {
    require_filled(&[full_name, email, password, confirm_password])?;
    let email = normalize_email(email);
    if !is_valid_email(&email) {
        return Err(AppError::validation("Please enter a valid email address."));
    }
    require_match(password, confirm_password)?;

    let user = users
        .add_user(NewUser {
            full_name: full_name.trim().to_string(),
            email,
            password_hash: hash_password(password)?,
        })
        .await?;
    info!(email = %user.email, "user signed up, awaiting approval");
    Ok(user)
}

/// Existence, then password, then approval. Only an approved account with the right
/// password gets through.
pub async fn authenticate(
    users: &dyn UserStore,
    email: &str,
    password: &str,
) -> Result<AppUser, AppError> {
    require_filled(&[email, password])?;
    let email = normalize_email(email);

    let Some(user) = users.get_user_by_email(&email).await? else {
        warn!(%email, "login unknown email");
        return Err(AppError::InvalidCredentials);
    };
    if !verify_password(password, &user.password_hash)? {
        warn!(%email, "login invalid password");
        return Err(AppError::InvalidCredentials);
    }
    if user.status != UserStatus::Approved {
        warn!(%email, "login refused, account pending");
        return Err(AppError::PendingApproval);
    }
    Ok(user)
}

/// Forgot-password form: overwrite the password and send the account back for approval.
pub async fn reset_password(
    users: &dyn UserStore,
    sessions: &dyn SessionStore,
    email: &str,
    new_password: &str,
    confirm_password: &str,
) -> Result<(), AppError> {
    require_filled(&[email, new_password, confirm_password])?;
    require_match(new_password, confirm_password)?;
    let email = normalize_email(email);

    let hash = hash_password(new_password)?;
    match users.reset_password(&email, &hash).await {
        Ok(()) => {}
        Err(StoreError::NotFound(_)) => {
            warn!(%email, "password reset for unknown email");
            return Err(AppError::NotFound("User not found".into()));
        }
        Err(e) => return Err(e.into()),
    }
    let closed = sessions.revoke_all(&email).await?;
    info!(%email, closed, "password reset, account pending re-approval");
    Ok(())
}

/// Password update through a reset link. The link proves ownership, so approval is kept.
pub async fn update_password(
    users: &dyn UserStore,
    sessions: &dyn SessionStore,
    email: &str,
    password: &str,
    confirm_password: &str,
) -> Result<(), AppError> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters long."
        )));
    }
    require_match(password, confirm_password)?;

    match users.set_password(email, &hash_password(password)?).await {
        Ok(()) => {}
        Err(StoreError::NotFound(_)) => return Err(AppError::NotFound("User not found".into())),
        Err(e) => return Err(e.into()),
    }
    let closed = sessions.revoke_all(email).await?;
    info!(%email, closed, "password updated from reset link");
    Ok(())
}
