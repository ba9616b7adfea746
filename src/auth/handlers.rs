use axum::{
    extract::{FromRef, Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tracing::{debug, info, instrument, warn};

use crate::{
    auth::{
        dto::{
            ForgotPasswordRequest, LoginRequest, LoginResponse, PublicUser, ResetLinkRequest,
            SignupRequest, StatusUpdateRequest, UpdatePasswordRequest, UserListQuery,
        },
        extractors::{AdminSession, ResetGrant, Session},
        jwt::JwtKeys,
        services,
    },
    error::AppError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/session", get(current_session))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-link", post(reset_link))
        .route("/auth/update-password", post(update_password))
}

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/:email/status", put(set_user_status))
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> Result<(StatusCode, Json<PublicUser>), AppError> {
    let user = services::signup(
        state.users.as_ref(),
        &payload.full_name,
        &payload.email,
        &payload.password,
        &payload.confirm_password,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let user = services::authenticate(state.users.as_ref(), &payload.email, &payload.password).await?;

    let session_id = state.sessions.open(&user.email).await?;
    let access_token = JwtKeys::from_ref(&state).sign_access(&user.email, session_id)?;

    info!(email = %user.email, %session_id, "user logged in");
    Ok(Json(LoginResponse {
        access_token,
        user: user.into(),
    }))
}

#[instrument(skip(state))]
pub async fn logout(State(state): State<AppState>, session: Session) -> Result<StatusCode, AppError> {
    state.sessions.revoke(session.id).await?;
    info!(email = %session.email, session_id = %session.id, "user logged out");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn current_session(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<PublicUser>, AppError> {
    let user = state
        .users
        .get_user_by_email(&session.email)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<StatusCode, AppError> {
    services::reset_password(
        state.users.as_ref(),
        state.sessions.as_ref(),
        &payload.email,
        &payload.new_password,
        &payload.confirm_password,
    )
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Always 202 so the response does not reveal which emails have accounts.
#[instrument(skip(state, payload))]
pub async fn reset_link(
    State(state): State<AppState>,
    Json(payload): Json<ResetLinkRequest>,
) -> Result<StatusCode, AppError> {
    let email = services::normalize_email(&payload.email);
    if !services::is_valid_email(&email) {
        return Err(AppError::validation("Please enter a valid email address."));
    }
    if state.users.get_user_by_email(&email).await?.is_none() {
        warn!(%email, "reset link requested for unknown email");
        return Ok(StatusCode::ACCEPTED);
    }

    let token = JwtKeys::from_ref(&state).sign_reset(&email)?;
    let link = format!("{}?token={}", state.config.reset_link_base, token);
    // Mail delivery is outside this service. The link carries a credential; debug only.
    info!(%email, "password reset link issued");
    debug!(%email, %link, "password reset link");
    Ok(StatusCode::ACCEPTED)
}

#[instrument(skip(state, payload))]
pub async fn update_password(
    State(state): State<AppState>,
    grant: ResetGrant,
    Json(payload): Json<UpdatePasswordRequest>,
) -> Result<StatusCode, AppError> {
    services::update_password(
        state.users.as_ref(),
        state.sessions.as_ref(),
        &grant.email,
        &payload.password,
        &payload.confirm_password,
    )
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminSession,
    Query(q): Query<UserListQuery>,
) -> Result<Json<Vec<PublicUser>>, AppError> {
    let users = state.users.list_users(q.status).await?;
    Ok(Json(users.into_iter().map(PublicUser::from).collect()))
}

#[instrument(skip(state, payload))]
pub async fn set_user_status(
    State(state): State<AppState>,
    AdminSession(admin): AdminSession,
    Path(email): Path<String>,
    Json(payload): Json<StatusUpdateRequest>,
) -> Result<StatusCode, AppError> {
    let email = services::normalize_email(&email);
    state.users.update_user_status(&email, payload.status).await?;
    info!(%email, status = ?payload.status, by = %admin.email, "user status changed");
    Ok(StatusCode::NO_CONTENT)
}
