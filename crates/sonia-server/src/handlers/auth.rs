//! Account handlers.

use std::sync::Arc;

use axum::{extract::State, Json};
use tracing::info;

use crate::auth::AuthUser;
use crate::dto::{LoginRequest, LoginResponse, MeResponse, MsgResponse, SignupRequest};
use crate::error::AppError;
use crate::extract::AppJson;
use crate::services::account;
use crate::ServerState;

/// POST /api/auth/signup
pub async fn signup(
    State(state): State<Arc<ServerState>>,
    AppJson(req): AppJson<SignupRequest>,
) -> Result<Json<MsgResponse>, AppError> {
    account::signup(&state, req).await?;
    Ok(Json(MsgResponse { msg: "Signup successful" }))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<Arc<ServerState>>,
    AppJson(req): AppJson<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let response = account::login(&state, req).await?;
    info!("User logged in: {}", response.user_id);
    Ok(Json(response))
}

/// GET /api/auth/me
pub async fn me(AuthUser(user): AuthUser) -> Json<MeResponse> {
    Json(MeResponse { user_id: user.id, email: user.email, name: user.name })
}
