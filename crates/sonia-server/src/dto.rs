use serde::{Deserialize, Serialize};
use sonia_core::{
    AnalyticsSummary, EmotionData, EmotionPoint, HistoryEntry, LabelCount, Message, MessageKind, MessageRole,
    Milestone, PathProgress,
};

// === Auth ===

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub user_id: String,
    pub email: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub user_id: String,
    pub email: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct MsgResponse {
    pub msg: &'static str,
}

// === Chat ===

#[derive(Debug, Deserialize)]
pub struct SaveMessageRequest {
    pub role: MessageRole,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub emotion: Option<EmotionData>,
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Deserialize)]
pub struct ChatMessageRequest {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTurnResponse {
    pub user_message: Message,
    /// `None` when the model's output could not be used.
    pub reply: Option<Message>,
}

fn default_audio_mime() -> String {
    "audio/webm".to_string()
}

/// Recorded audio, base64 encoded.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioRequest {
    #[serde(default)]
    pub audio: String,
    #[serde(default = "default_audio_mime")]
    pub mime_type: String,
}

#[derive(Debug, Serialize)]
pub struct TranscriptionResponse {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct SpeakRequest {
    #[serde(default)]
    pub text: String,
}

// === Journal ===

#[derive(Debug, Deserialize)]
pub struct JournalRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: String,
}

// === Insights ===

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    pub timeline: Vec<EmotionPoint>,
    pub distribution: Vec<LabelCount>,
    pub tracked_emotions: usize,
    pub total_messages: usize,
    pub summary: AnalyticsSummary,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WellnessResponse {
    pub timeline: Vec<EmotionPoint>,
    pub progress: PathProgress,
    pub milestones: Vec<Milestone>,
    pub history: Vec<HistoryEntry>,
    pub summary: AnalyticsSummary,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportScope {
    /// Chat messages only.
    #[default]
    Chat,
    /// Chat messages and journal entries.
    All,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReportRequest {
    #[serde(default)]
    pub scope: ReportScope,
}

// === Live voice ===

#[derive(Debug, Deserialize)]
pub struct LiveQuery {
    #[serde(default)]
    pub token: String,
}

/// Frames the browser may send as text.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum LiveClientFrame {
    Audio { data: String },
    End,
}

/// Frames relayed back to the browser.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum LiveServerFrame {
    Ready,
    #[serde(rename_all = "camelCase")]
    Audio { data: String, start_ms: u64, duration_ms: u64 },
    Transcription { text: String },
    Interrupted,
    TurnComplete,
    Error { msg: String },
}
