//! LLM orchestration for sonia.
//!
//! All emotional analysis is delegated to Gemini using fixed prompts and JSON
//! response schemas. The server talks to the model only through the
//! [`WellnessModel`] trait, so tests can swap in a scripted implementation.
//!
//! - [`gemini`] - REST wire types and the retrying [`GeminiClient`]
//! - [`service`] - [`GeminiService`], the production [`WellnessModel`]
//! - [`prompts`] - prompt templates and response schemas
//! - [`live`] - realtime voice session protocol
//! - [`audio`] - PCM16 helpers and playback scheduling

pub mod audio;
pub mod gemini;
pub mod live;
pub mod prompts;
pub mod service;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sonia_core::{EmotionData, JournalEntry, Language, Message, SoniaError, UserContext, WellnessReport};

pub use gemini::{GeminiClient, LlmMetrics, LlmResponse};
pub use live::{LiveConnection, LiveEvent, LiveReceiver, LiveSender, LiveSetup};
pub use service::GeminiService;

/// Synthesised speech as base64 PCM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechAudio {
    #[serde(rename = "audio")]
    pub data: String,
    pub mime_type: String,
}

/// The model operations the service relies on.
///
/// `Ok(None)` means the provider answered but its output did not match the
/// requested schema; `Err` means the request itself failed.
#[async_trait]
pub trait WellnessModel: Send + Sync {
    /// Detects the emotion in a chat message and writes Sonia's reply.
    async fn analyze_and_respond(
        &self,
        text: &str,
        context: &UserContext,
        history: &[Message],
    ) -> Result<Option<EmotionData>, SoniaError>;

    async fn analyze_journal(
        &self,
        text: &str,
        context: &UserContext,
    ) -> Result<Option<EmotionData>, SoniaError>;

    async fn generate_summary_report(
        &self,
        entries: &[JournalEntry],
        messages: &[Message],
        context: &UserContext,
    ) -> Result<Option<WellnessReport>, SoniaError>;

    async fn transcribe_voice(&self, audio_base64: &str, mime_type: &str) -> Result<String, SoniaError>;

    async fn synthesize_speech(&self, text: &str, language: Language) -> Result<SpeechAudio, SoniaError>;
}
