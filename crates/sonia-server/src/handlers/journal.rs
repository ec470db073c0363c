//! Journal handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use sonia_core::JournalEntry;
use tracing::info;

use crate::auth::AuthUser;
use crate::dto::{JournalRequest, SuccessResponse};
use crate::error::AppError;
use crate::extract::AppJson;
use crate::services::journal as journal_service;
use crate::ServerState;

/// GET /api/journal
pub async fn list(
    State(state): State<Arc<ServerState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<JournalEntry>>, AppError> {
    Ok(Json(state.store.list_journal_entries(&user.id)?))
}

/// POST /api/journal
pub async fn create(
    State(state): State<Arc<ServerState>>,
    AuthUser(user): AuthUser,
    AppJson(req): AppJson<JournalRequest>,
) -> Result<Json<JournalEntry>, AppError> {
    Ok(Json(journal_service::create_entry(&state, &user, req).await?))
}

/// DELETE /api/journal/{id}
pub async fn delete(
    State(state): State<Arc<ServerState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    if !state.store.delete_journal_entry(&user.id, &id)? {
        return Err(AppError::NotFound("Entry not found".into()));
    }
    info!("Deleted journal entry {}", id);
    Ok(Json(SuccessResponse { success: true }))
}
