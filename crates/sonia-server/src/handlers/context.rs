//! Per-user context: life role and reply language.

use std::sync::Arc;

use axum::{extract::State, Json};
use sonia_core::{UserContext, UserContextPatch};
use tracing::info;

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::extract::AppJson;
use crate::ServerState;

/// GET /api/context
pub async fn get(
    State(state): State<Arc<ServerState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<UserContext>, AppError> {
    Ok(Json(state.store.get_context(&user.id)?))
}

/// PUT /api/context - Merges the provided fields into the saved context.
pub async fn update(
    State(state): State<Arc<ServerState>>,
    AuthUser(user): AuthUser,
    AppJson(patch): AppJson<UserContextPatch>,
) -> Result<Json<UserContext>, AppError> {
    let context = state.store.get_context(&user.id)?.apply(patch);
    state.store.put_context(&user.id, &context)?;
    info!(user = %user.id, role = %context.role, language = %context.language, "Context updated");
    Ok(Json(context))
}
