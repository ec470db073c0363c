//! Voice endpoints: one-shot transcription, speech synthesis and the
//! realtime call relay.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use sonia_core::{User, UserContext};
use sonia_llm::audio::{self, PlaybackTimeline, OUTPUT_SAMPLE_RATE};
use sonia_llm::{LiveConnection, LiveEvent, LiveSender, LiveSetup, SpeechAudio};
use tracing::{debug, error, info, warn};

use crate::auth::{self, AuthUser};
use crate::dto::{AudioRequest, LiveClientFrame, LiveQuery, LiveServerFrame, SpeakRequest, TranscriptionResponse};
use crate::error::AppError;
use crate::extract::AppJson;
use crate::ServerState;

/// POST /api/voice/transcribe
pub async fn transcribe(
    State(state): State<Arc<ServerState>>,
    AuthUser(_user): AuthUser,
    AppJson(req): AppJson<AudioRequest>,
) -> Result<Json<TranscriptionResponse>, AppError> {
    if req.audio.trim().is_empty() {
        return Err(AppError::bad_request("Missing audio"));
    }
    let text = state.model.transcribe_voice(&req.audio, &req.mime_type).await?;
    Ok(Json(TranscriptionResponse { text }))
}

/// POST /api/voice/speak
pub async fn speak(
    State(state): State<Arc<ServerState>>,
    AuthUser(user): AuthUser,
    AppJson(req): AppJson<SpeakRequest>,
) -> Result<Json<SpeechAudio>, AppError> {
    let text = req.text.trim();
    if text.is_empty() {
        return Err(AppError::bad_request("Text is required"));
    }
    let context = state.store.get_context(&user.id)?;
    Ok(Json(state.model.synthesize_speech(text, context.language).await?))
}

/// GET /api/voice/live?token=... - Upgrades to the realtime relay.
///
/// Browsers cannot set headers on a WebSocket handshake, so the token
/// travels in the query string.
pub async fn live(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<LiveQuery>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, AppError> {
    let user = auth::authenticate(&state, auth::bearer_token(&query.token))?;
    let ws = ws.map_err(|e| AppError::bad_request(e.body_text()))?;
    let context = state.store.get_context(&user.id)?;
    Ok(ws.on_upgrade(move |socket| relay(socket, state, user, context)).into_response())
}

async fn send_frame(sender: &mut SplitSink<WebSocket, Message>, frame: &LiveServerFrame) -> bool {
    let Ok(json) = serde_json::to_string(frame) else {
        error!("JSON serialization failed");
        return false;
    };
    sender.send(Message::Text(json.into())).await.is_ok()
}

/// Forwards one browser frame upstream. Returns false once the browser is gone.
async fn forward_client(frame: Option<Result<Message, axum::Error>>, upstream: &mut LiveSender) -> bool {
    let result = match frame {
        Some(Ok(Message::Binary(bytes))) if !bytes.is_empty() => upstream.send_audio(&audio::encode_bytes(&bytes)).await,
        Some(Ok(Message::Text(text))) => match serde_json::from_str::<LiveClientFrame>(text.as_str()) {
            Ok(LiveClientFrame::Audio { data }) => upstream.send_audio(&data).await,
            Ok(LiveClientFrame::End) => upstream.end_audio().await,
            Err(e) => {
                debug!("Ignoring client frame: {}", e);
                Ok(())
            }
        },
        Some(Ok(Message::Close(_))) | None => return false,
        Some(Ok(_)) => Ok(()),
        Some(Err(e)) => {
            debug!("Client socket error: {}", e);
            return false;
        }
    };
    if let Err(e) = result {
        warn!("Upstream send failed: {}", e);
        return false;
    }
    true
}

/// Maps an upstream event to a browser frame, scheduling audio playback.
fn to_client_frame(event: LiveEvent, timeline: &mut PlaybackTimeline, now_ms: u64) -> Option<LiveServerFrame> {
    match event {
        LiveEvent::SetupComplete => Some(LiveServerFrame::Ready),
        LiveEvent::Audio { data, .. } => {
            let bytes = match audio::decode_bytes(&data) {
                Ok(bytes) => bytes.len(),
                Err(e) => {
                    warn!("Dropping undecodable audio chunk: {}", e);
                    return None;
                }
            };
            let duration_ms = audio::pcm16_duration_ms(bytes, OUTPUT_SAMPLE_RATE);
            let start_ms = timeline.schedule(now_ms, duration_ms);
            Some(LiveServerFrame::Audio { data, start_ms, duration_ms })
        }
        LiveEvent::Transcription(text) => Some(LiveServerFrame::Transcription { text }),
        LiveEvent::Interrupted => {
            if timeline.is_playing(now_ms) {
                debug!("Barge-in dropped {} ms of queued audio", timeline.busy_until() - now_ms);
            }
            timeline.interrupt();
            Some(LiveServerFrame::Interrupted)
        }
        LiveEvent::TurnComplete => Some(LiveServerFrame::TurnComplete),
        LiveEvent::GoAway => {
            info!("Live session is being shut down upstream");
            None
        }
    }
}

async fn relay(socket: WebSocket, state: Arc<ServerState>, user: User, context: UserContext) {
    let (mut client_tx, mut client_rx) = socket.split();

    let setup = LiveSetup::new(&state.config.gemini, &context);
    let connection = match LiveConnection::connect(&state.config.gemini, &setup).await {
        Ok(connection) => connection,
        Err(e) => {
            error!("Failed to open live session for {}: {}", user.id, e);
            let _ = send_frame(&mut client_tx, &LiveServerFrame::Error { msg: "Voice session unavailable".into() }).await;
            return;
        }
    };
    let (mut upstream_tx, mut upstream_rx) = connection.split();
    info!(user = %user.id, language = %context.language, "Live relay started");

    let started = Instant::now();
    let mut timeline = PlaybackTimeline::new();

    'relay: loop {
        tokio::select! {
            frame = client_rx.next() => {
                if !forward_client(frame, &mut upstream_tx).await {
                    break 'relay;
                }
            }
            events = upstream_rx.next_events() => {
                let events = match events {
                    Some(Ok(events)) => events,
                    Some(Err(e)) => {
                        error!("Live session error: {}", e);
                        let _ = send_frame(&mut client_tx, &LiveServerFrame::Error { msg: "Voice session error".into() }).await;
                        break 'relay;
                    }
                    None => break 'relay,
                };
                for event in events {
                    let now_ms = started.elapsed().as_millis() as u64;
                    let Some(frame) = to_client_frame(event, &mut timeline, now_ms) else { continue };
                    if !send_frame(&mut client_tx, &frame).await {
                        break 'relay;
                    }
                }
            }
        }
    }

    upstream_tx.close().await;
    let _ = client_tx.close().await;
    info!(user = %user.id, "Live relay ended");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_events_are_scheduled_back_to_back() {
        let mut timeline = PlaybackTimeline::new();
        // 4_800 bytes of PCM16 at 24 kHz is 100 ms.
        let chunk = audio::encode_bytes(&[0u8; 4_800]);

        let first = to_client_frame(LiveEvent::Audio { data: chunk.clone(), mime_type: String::new() }, &mut timeline, 10);
        let second = to_client_frame(LiveEvent::Audio { data: chunk.clone(), mime_type: String::new() }, &mut timeline, 20);
        assert!(matches!(first, Some(LiveServerFrame::Audio { start_ms: 10, duration_ms: 100, .. })));
        assert!(matches!(second, Some(LiveServerFrame::Audio { start_ms: 110, duration_ms: 100, .. })));

        assert!(matches!(to_client_frame(LiveEvent::Interrupted, &mut timeline, 30), Some(LiveServerFrame::Interrupted)));
        let after = to_client_frame(LiveEvent::Audio { data: chunk, mime_type: String::new() }, &mut timeline, 40);
        assert!(matches!(after, Some(LiveServerFrame::Audio { start_ms: 40, .. })));
    }

    #[test]
    fn test_control_events() {
        let mut timeline = PlaybackTimeline::new();
        assert!(matches!(to_client_frame(LiveEvent::SetupComplete, &mut timeline, 0), Some(LiveServerFrame::Ready)));
        assert!(matches!(to_client_frame(LiveEvent::TurnComplete, &mut timeline, 0), Some(LiveServerFrame::TurnComplete)));
        assert!(to_client_frame(LiveEvent::GoAway, &mut timeline, 0).is_none());
        assert!(to_client_frame(
            LiveEvent::Audio { data: "***".into(), mime_type: String::new() },
            &mut timeline,
            0
        )
        .is_none());
    }
}
