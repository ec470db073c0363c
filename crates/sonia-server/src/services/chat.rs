//! Chat turns: persist the user's message, ask the model, persist the reply.

use sonia_core::{now_millis, EmotionData, Message, MessageKind, MessageRole, User};
use tracing::{info, warn};
use uuid::Uuid;

use crate::dto::{ChatTurnResponse, SaveMessageRequest};
use crate::error::AppError;
use crate::ServerState;

/// Stored in place of an empty voice transcription.
pub const EMPTY_VOICE_CONTENT: &str = "Voice Message";
/// Sent to the model in place of an empty voice transcription.
const EMPTY_VOICE_PROMPT: &str = "...";

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Appends a message recorded by the client as-is.
pub fn save_message(state: &ServerState, user: &User, req: SaveMessageRequest) -> Result<(), AppError> {
    let mut message = Message::new(new_id(), req.role, req.text, now_millis()).with_kind(req.kind);
    message.emotion = req.emotion.map(EmotionData::normalized);
    state.store.append_message(&user.id, &message)?;
    Ok(())
}

pub async fn send_text(state: &ServerState, user: &User, text: &str) -> Result<ChatTurnResponse, AppError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(AppError::bad_request("Message text is required"));
    }
    let message = Message::new(new_id(), MessageRole::User, text, now_millis());
    respond(state, user, message, text).await
}

/// Transcribes a recorded clip, then handles it like a typed message.
pub async fn send_voice(
    state: &ServerState,
    user: &User,
    audio_base64: &str,
    mime_type: &str,
) -> Result<ChatTurnResponse, AppError> {
    if audio_base64.trim().is_empty() {
        return Err(AppError::bad_request("Missing audio"));
    }
    let transcription = state.model.transcribe_voice(audio_base64, mime_type).await?;

    let (content, prompt) = if transcription.is_empty() {
        (EMPTY_VOICE_CONTENT, EMPTY_VOICE_PROMPT)
    } else {
        (transcription.as_str(), transcription.as_str())
    };
    let message = Message::new(new_id(), MessageRole::User, content, now_millis()).with_kind(MessageKind::Voice);
    respond(state, user, message, prompt).await
}

async fn respond(
    state: &ServerState,
    user: &User,
    user_message: Message,
    prompt: &str,
) -> Result<ChatTurnResponse, AppError> {
    let context = state.store.get_context(&user.id)?;
    let history = state.store.list_messages(&user.id)?;
    state.store.append_message(&user.id, &user_message)?;

    let Some(emotion) = state.model.analyze_and_respond(prompt, &context, &history).await? else {
        warn!("No usable reply for user {}", user.id);
        return Ok(ChatTurnResponse { user_message, reply: None });
    };

    let text = emotion.response.clone().unwrap_or_default();
    let reply = Message::new(new_id(), MessageRole::Assistant, text, now_millis()).with_emotion(emotion.without_response());
    state.store.append_message(&user.id, &reply)?;

    if let Some(e) = &reply.emotion {
        info!(user = %user.id, label = %e.label, intensity = e.intensity, "Chat turn analysed");
    }
    Ok(ChatTurnResponse { user_message, reply: Some(reply) })
}
