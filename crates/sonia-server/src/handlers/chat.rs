//! Chat handlers.

use std::sync::Arc;

use axum::{extract::State, Json};
use sonia_core::Message;

use crate::auth::AuthUser;
use crate::dto::{AudioRequest, ChatMessageRequest, ChatTurnResponse, SaveMessageRequest, SuccessResponse};
use crate::error::AppError;
use crate::extract::AppJson;
use crate::services::chat as chat_service;
use crate::ServerState;

/// POST /api/chat/save - Stores a message produced client-side.
pub async fn save(
    State(state): State<Arc<ServerState>>,
    AuthUser(user): AuthUser,
    AppJson(req): AppJson<SaveMessageRequest>,
) -> Result<Json<SuccessResponse>, AppError> {
    chat_service::save_message(&state, &user, req)?;
    Ok(Json(SuccessResponse { success: true }))
}

/// GET /api/chat/history
pub async fn history(
    State(state): State<Arc<ServerState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<Message>>, AppError> {
    Ok(Json(state.store.list_messages(&user.id)?))
}

/// POST /api/chat/message
pub async fn message(
    State(state): State<Arc<ServerState>>,
    AuthUser(user): AuthUser,
    AppJson(req): AppJson<ChatMessageRequest>,
) -> Result<Json<ChatTurnResponse>, AppError> {
    Ok(Json(chat_service::send_text(&state, &user, &req.text).await?))
}

/// POST /api/chat/voice
pub async fn voice(
    State(state): State<Arc<ServerState>>,
    AuthUser(user): AuthUser,
    AppJson(req): AppJson<AudioRequest>,
) -> Result<Json<ChatTurnResponse>, AppError> {
    Ok(Json(chat_service::send_voice(&state, &user, &req.audio, &req.mime_type).await?))
}
