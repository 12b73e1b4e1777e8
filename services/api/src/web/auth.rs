//! services/api/src/web/auth.rs
//!
//! Authentication endpoints: signup, login, logout and password management.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use chrono::Duration;
use dangdai_core::domain::{AuthSession, User};
use dangdai_core::ports::{AuthError, PortError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::middleware::{session_id_from_headers, SESSION_COOKIE};
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct PasswordResetRequest {
    pub email: String,
}

#[derive(Deserialize, ToSchema)]
pub struct PasswordResetConfirmRequest {
    pub token: String,
    pub new_password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdatePasswordRequest {
    pub new_password: String,
}

#[derive(Serialize, ToSchema)]
pub struct AuthResponse {
    pub user_id: Uuid,
    pub email: String,
}

impl From<User> for AuthResponse {
    fn from(user: User) -> Self {
        Self {
            user_id: user.user_id,
            email: user.email,
        }
    }
}

//=========================================================================================
// Helpers
//=========================================================================================

/// Maps an auth failure onto the status and message the client sees.
pub(crate) fn auth_error_response(context: &str, e: AuthError) -> (StatusCode, String) {
    let status = match &e {
        AuthError::EmailTaken => StatusCode::CONFLICT,
        AuthError::InvalidEmail
        | AuthError::PasswordTooShort
        | AuthError::SamePassword
        | AuthError::InvalidResetToken => StatusCode::BAD_REQUEST,
        AuthError::InvalidCredentials | AuthError::SessionExpired => StatusCode::UNAUTHORIZED,
        AuthError::Port(PortError::Unauthorized) => StatusCode::UNAUTHORIZED,
        AuthError::Port(PortError::NotFound(_)) => StatusCode::NOT_FOUND,
        AuthError::Port(PortError::Unexpected(_)) => {
            error!("{}: {:?}", context, e);
            return (StatusCode::INTERNAL_SERVER_ERROR, context.to_string());
        }
    };
    warn!("{}: {}", context, e);
    (status, e.to_string())
}

fn session_cookie(session_id: &str, ttl: Duration) -> String {
    format!(
        "{}={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        SESSION_COOKIE,
        session_id,
        ttl.num_seconds()
    )
}

fn signed_in(
    state: &AppState,
    status: StatusCode,
    session: AuthSession,
) -> (StatusCode, [(header::HeaderName, String); 1], Json<AuthResponse>) {
    let cookie = session_cookie(&session.id, Duration::days(state.config.session_ttl_days));
    (status, [(header::SET_COOKIE, cookie)], Json(session.user.into()))
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/signup - Create a new user account
#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "User created successfully", body = AuthResponse),
        (status = 400, description = "Invalid email or password"),
        (status = 409, description = "Email already registered"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let session = state
        .auth
        .sign_up(&req.email, &req.password)
        .await
        .map_err(|e| auth_error_response("Failed to create user", e))?;
    Ok(signed_in(&state, StatusCode::CREATED, session))
}

/// POST /auth/login - Login with existing account
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let session = state
        .auth
        .sign_in(&req.email, &req.password)
        .await
        .map_err(|e| auth_error_response("Failed to log in", e))?;
    Ok(signed_in(&state, StatusCode::OK, session))
}

/// POST /auth/logout - Logout and invalidate session
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logout successful"),
        (status = 401, description = "No active session")
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let auth_session_id = session_id_from_headers(&headers)
        .ok_or((StatusCode::UNAUTHORIZED, "No session found".to_string()))?;

    state
        .auth
        .sign_out(auth_session_id)
        .await
        .map_err(|e| auth_error_response("Failed to logout", e))?;

    let cookie = format!("{}=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0", SESSION_COOKIE);
    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)]))
}

/// POST /auth/password-reset - Request a password reset link
///
/// Always answers 202 for a well-formed request so the endpoint cannot be
/// used to discover which emails are registered.
#[utoipa::path(
    post,
    path = "/auth/password-reset",
    request_body = PasswordResetRequest,
    responses(
        (status = 202, description = "Reset requested"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn password_reset_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PasswordResetRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .auth
        .request_password_reset(&req.email)
        .await
        .map_err(|e| auth_error_response("Failed to request password reset", e))?;
    Ok(StatusCode::ACCEPTED)
}

/// POST /auth/password-reset/confirm - Set a new password with a reset token
#[utoipa::path(
    post,
    path = "/auth/password-reset/confirm",
    request_body = PasswordResetConfirmRequest,
    responses(
        (status = 200, description = "Password reset; signed in", body = AuthResponse),
        (status = 400, description = "Invalid or expired token, or password too short"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn password_reset_confirm_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PasswordResetConfirmRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let session = state
        .auth
        .reset_password(&req.token, &req.new_password)
        .await
        .map_err(|e| auth_error_response("Failed to reset password", e))?;
    Ok(signed_in(&state, StatusCode::OK, session))
}

/// POST /auth/password - Change the signed-in user's password
#[utoipa::path(
    post,
    path = "/auth/password",
    request_body = UpdatePasswordRequest,
    responses(
        (status = 204, description = "Password updated"),
        (status = 400, description = "Password too short or unchanged"),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn update_password_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(req): Json<UpdatePasswordRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .auth
        .update_password(user.user_id, &req.new_password)
        .await
        .map_err(|e| auth_error_response("Failed to update password", e))?;
    Ok(StatusCode::NO_CONTENT)
}
