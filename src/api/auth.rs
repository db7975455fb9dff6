//! Authentication endpoints.

use axum::{extract::State, Extension, Json};

use super::{success, ApiResult};
use crate::backend::AuthAuthority;
use crate::models::{ExchangeSessionRequest, LoginRequest, Session, SignupRequest, User};
use crate::AppState;

/// POST /api/auth/login - Exchange credentials for a session.
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Session> {
    let session = state.backend.login(&request).await?;
    tracing::info!(user_id = %session.user.id, "User logged in");
    success(session)
}

/// POST /api/auth/signup - Create an account and a session.
pub async fn signup(
    State(state): State<AppState>,
    Json(request): Json<SignupRequest>,
) -> ApiResult<Session> {
    let session = state.backend.signup(&request).await?;
    success(session)
}

/// POST /api/auth/session - Redeem a one-time external session identifier.
pub async fn exchange_session(
    State(state): State<AppState>,
    Json(request): Json<ExchangeSessionRequest>,
) -> ApiResult<Session> {
    let session = state
        .backend
        .exchange_external_session(&request.session_id)
        .await?;
    tracing::info!(user_id = %session.user.id, "External session exchanged");
    success(session)
}

/// GET /api/auth/me - The user behind the bearer token.
pub async fn me(Extension(session): Extension<Session>) -> ApiResult<User> {
    success(session.user)
}

/// POST /api/auth/logout - Revoke the bearer token.
pub async fn logout(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<()> {
    state.backend.logout(&session.token).await?;
    tracing::info!(user_id = %session.user.id, "User logged out");
    success(())
}
