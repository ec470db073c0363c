//! Realtime voice session over Gemini's bidirectional WebSocket API.

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use sonia_config::GeminiSettings;
use sonia_core::{SoniaError, UserContext};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::audio::INPUT_MIME;
use crate::gemini::{Content, GenerationConfig};
use crate::prompts;

type LiveSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Session setup sent as the first frame.
#[derive(Debug, Clone)]
pub struct LiveSetup {
    pub model: String,
    pub system_instruction: String,
    pub voice_name: String,
}

impl LiveSetup {
    pub fn new(settings: &GeminiSettings, context: &UserContext) -> Self {
        Self {
            model: settings.live_model.clone(),
            system_instruction: prompts::live_instruction(context),
            voice_name: settings.voice_name.clone(),
        }
    }

    pub fn to_message(&self) -> Value {
        json!({
            "setup": {
                "model": format!("models/{}", self.model),
                "generationConfig": GenerationConfig::audio(&self.voice_name),
                "systemInstruction": Content::instruction(self.system_instruction.clone()),
                "outputAudioTranscription": {}
            }
        })
    }
}

/// Wraps one microphone chunk (base64 PCM16 @ 16 kHz).
pub fn realtime_audio(data: &str) -> Value {
    json!({ "realtimeInput": { "audio": { "data": data, "mimeType": INPUT_MIME } } })
}

pub fn audio_stream_end() -> Value {
    json!({ "realtimeInput": { "audioStreamEnd": true } })
}

/// Something the upstream session told us.
#[derive(Debug, Clone, PartialEq)]
pub enum LiveEvent {
    SetupComplete,
    Audio { data: String, mime_type: String },
    Transcription(String),
    Interrupted,
    TurnComplete,
    GoAway,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerMessage {
    #[serde(default)]
    setup_complete: Option<Value>,
    #[serde(default)]
    server_content: Option<ServerContent>,
    #[serde(default)]
    go_away: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerContent {
    #[serde(default)]
    model_turn: Option<Content>,
    #[serde(default)]
    output_transcription: Option<Transcription>,
    #[serde(default)]
    interrupted: bool,
    #[serde(default)]
    turn_complete: bool,
}

#[derive(Debug, Default, Deserialize)]
struct Transcription {
    #[serde(default)]
    text: String,
}

/// Splits one server frame into events, audio first.
pub fn parse_server_message(raw: &str) -> Result<Vec<LiveEvent>, SoniaError> {
    let msg: ServerMessage = serde_json::from_str(raw)?;
    let mut events = Vec::new();

    if msg.setup_complete.is_some() {
        events.push(LiveEvent::SetupComplete);
    }

    if let Some(content) = msg.server_content {
        let parts = content.model_turn.map(|t| t.parts).unwrap_or_default();
        for inline in parts.into_iter().filter_map(|p| p.inline_data) {
            events.push(LiveEvent::Audio { data: inline.data, mime_type: inline.mime_type });
        }
        if let Some(t) = content.output_transcription.filter(|t| !t.text.is_empty()) {
            events.push(LiveEvent::Transcription(t.text));
        }
        if content.interrupted {
            events.push(LiveEvent::Interrupted);
        }
        if content.turn_complete {
            events.push(LiveEvent::TurnComplete);
        }
    }

    if msg.go_away.is_some() {
        events.push(LiveEvent::GoAway);
    }

    Ok(events)
}

/// Open upstream session.
pub struct LiveConnection {
    socket: LiveSocket,
}

impl LiveConnection {
    /// Connects and sends the setup frame.
    pub async fn connect(settings: &GeminiSettings, setup: &LiveSetup) -> Result<Self, SoniaError> {
        if !settings.is_configured() {
            return Err(SoniaError::NotConfigured("GEMINI_API_KEY".into()));
        }
        let url = format!("{}?key={}", settings.live_url, settings.api_key);
        let (mut socket, _) = connect_async(url)
            .await
            .map_err(|e| SoniaError::Realtime(e.to_string()))?;

        socket
            .send(WsMessage::Text(setup.to_message().to_string().into()))
            .await
            .map_err(|e| SoniaError::Realtime(e.to_string()))?;

        info!("Live session opened: model={}", setup.model);
        Ok(Self { socket })
    }

    pub fn split(self) -> (LiveSender, LiveReceiver) {
        let (sink, stream) = self.socket.split();
        (LiveSender { sink }, LiveReceiver { stream })
    }
}

pub struct LiveSender {
    sink: SplitSink<LiveSocket, WsMessage>,
}

impl LiveSender {
    async fn send_json(&mut self, value: Value) -> Result<(), SoniaError> {
        self.sink
            .send(WsMessage::Text(value.to_string().into()))
            .await
            .map_err(|e| SoniaError::Realtime(e.to_string()))
    }

    pub async fn send_audio(&mut self, data: &str) -> Result<(), SoniaError> {
        self.send_json(realtime_audio(data)).await
    }

    pub async fn end_audio(&mut self) -> Result<(), SoniaError> {
        self.send_json(audio_stream_end()).await
    }

    pub async fn close(&mut self) {
        if let Err(e) = self.sink.close().await {
            debug!("Live session close: {}", e);
        }
    }
}

pub struct LiveReceiver {
    stream: SplitStream<LiveSocket>,
}

impl LiveReceiver {
    /// Next batch of events; `None` once the upstream closes.
    pub async fn next_events(&mut self) -> Option<Result<Vec<LiveEvent>, SoniaError>> {
        loop {
            let frame = match self.stream.next().await? {
                Ok(frame) => frame,
                Err(e) => return Some(Err(SoniaError::Realtime(e.to_string()))),
            };
            let raw = match frame {
                WsMessage::Text(text) => text.as_str().to_string(),
                WsMessage::Binary(bytes) => String::from_utf8_lossy(&bytes).to_string(),
                WsMessage::Close(reason) => {
                    info!("Live session closed upstream: {:?}", reason);
                    return None;
                }
                _ => continue,
            };
            match parse_server_message(&raw) {
                Ok(events) if events.is_empty() => continue,
                Ok(events) => return Some(Ok(events)),
                Err(e) => {
                    warn!("Unparseable live frame: {}", e);
                    continue;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_message() {
        let setup = LiveSetup::new(&GeminiSettings::default(), &UserContext::default());
        let msg = setup.to_message();
        assert_eq!(msg["setup"]["model"], "models/gemini-2.5-flash-native-audio-preview-12-2025");
        assert_eq!(msg["setup"]["generationConfig"]["responseModalities"][0], "AUDIO");
        assert_eq!(
            msg["setup"]["generationConfig"]["speechConfig"]["voiceConfig"]["prebuiltVoiceConfig"]["voiceName"],
            "Kore"
        );
        assert!(msg["setup"]["systemInstruction"]["parts"][0]["text"]
            .as_str()
            .unwrap()
            .contains("Speak in English"));
    }

    #[test]
    fn test_realtime_audio_frame() {
        let frame = realtime_audio("AAAA");
        assert_eq!(frame["realtimeInput"]["audio"]["mimeType"], "audio/pcm;rate=16000");
        assert_eq!(frame["realtimeInput"]["audio"]["data"], "AAAA");
    }

    #[test]
    fn test_parse_model_turn() {
        let raw = r#"{
            "serverContent": {
                "modelTurn": {"parts": [{"inlineData": {"mimeType": "audio/pcm;rate=24000", "data": "AQI="}}]},
                "outputTranscription": {"text": "I hear you"},
                "turnComplete": true
            }
        }"#;
        let events = parse_server_message(raw).unwrap();
        assert_eq!(
            events,
            vec![
                LiveEvent::Audio { data: "AQI=".into(), mime_type: "audio/pcm;rate=24000".into() },
                LiveEvent::Transcription("I hear you".into()),
                LiveEvent::TurnComplete,
            ]
        );
    }

    #[test]
    fn test_parse_control_frames() {
        assert_eq!(parse_server_message(r#"{"setupComplete":{}}"#).unwrap(), vec![LiveEvent::SetupComplete]);
        assert_eq!(
            parse_server_message(r#"{"serverContent":{"interrupted":true}}"#).unwrap(),
            vec![LiveEvent::Interrupted]
        );
        assert!(parse_server_message(r#"{"usageMetadata":{}}"#).unwrap().is_empty());
        assert!(parse_server_message("not json").is_err());
    }
}
