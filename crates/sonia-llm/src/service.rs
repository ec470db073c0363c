//! Gemini-backed [`WellnessModel`].

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use sonia_config::GeminiSettings;
use sonia_core::{
    analytics, EmotionData, JournalEntry, Language, Message, MessageRole, SoniaError, UserContext,
    WellnessReport,
};
use tracing::{debug, error, info, warn};

use crate::audio::OUTPUT_MIME;
use crate::gemini::{Content, GeminiClient, GenerateContentRequest, GenerationConfig, Part};
use crate::{prompts, SpeechAudio, WellnessModel};

/// Prior turns sent along with a chat message.
pub const HISTORY_TURNS: usize = 10;

pub struct GeminiService {
    client: GeminiClient,
    settings: GeminiSettings,
}

impl GeminiService {
    pub fn new(settings: GeminiSettings) -> Result<Self, SoniaError> {
        let client = GeminiClient::new(&settings)?;
        Ok(Self { client, settings })
    }

    async fn generate_text(&self, request: GenerateContentRequest) -> Result<String, SoniaError> {
        let response = self.client.generate(&self.settings.text_model, &request).await?;
        if response.metrics.attempts > 1 {
            warn!(
                attempts = response.metrics.attempts,
                elapsed_ms = response.metrics.elapsed_ms,
                "Gemini request needed retries"
            );
        }
        Ok(response.text)
    }
}

/// Parses model JSON output, returning `None` when it does not fit `T`.
pub fn parse_json<T: DeserializeOwned>(raw: &str) -> Option<T> {
    let trimmed = raw.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|s| s.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();
    match serde_json::from_str(body) {
        Ok(v) => Some(v),
        Err(e) => {
            error!("Failed to parse AI response: {}", e);
            None
        }
    }
}

/// Maps stored history onto alternating user/model contents.
pub fn history_contents(history: &[Message]) -> Vec<Content> {
    let skip = history.len().saturating_sub(HISTORY_TURNS);
    history[skip..]
        .iter()
        .filter(|m| !m.content.trim().is_empty())
        .map(|m| match m.role {
            MessageRole::User => Content::user(vec![Part::text(m.content.clone())]),
            MessageRole::Assistant => Content::model(m.content.clone()),
        })
        .collect()
}

pub fn chat_request(text: &str, context: &UserContext, history: &[Message]) -> GenerateContentRequest {
    let mut contents = history_contents(history);
    contents.push(Content::user(vec![Part::text(text)]));
    GenerateContentRequest {
        contents,
        system_instruction: Some(Content::instruction(prompts::system_prompt(context))),
        generation_config: Some(GenerationConfig::json(prompts::emotion_schema())),
    }
}

#[async_trait]
impl WellnessModel for GeminiService {
    async fn analyze_and_respond(
        &self,
        text: &str,
        context: &UserContext,
        history: &[Message],
    ) -> Result<Option<EmotionData>, SoniaError> {
        let raw = self.generate_text(chat_request(text, context, history)).await?;
        let Some(emotion) = parse_json::<EmotionData>(&raw) else {
            return Ok(None);
        };
        if emotion.response.as_deref().map_or(true, |r| r.trim().is_empty()) {
            warn!("Chat analysis returned no response text");
            return Ok(None);
        }
        Ok(Some(emotion.normalized()))
    }

    async fn analyze_journal(
        &self,
        text: &str,
        context: &UserContext,
    ) -> Result<Option<EmotionData>, SoniaError> {
        let request = GenerateContentRequest {
            contents: vec![Content::user(vec![Part::text(prompts::journal_prompt(text, context))])],
            system_instruction: Some(Content::instruction(prompts::JOURNAL_ANALYST_INSTRUCTION)),
            generation_config: Some(GenerationConfig::json(prompts::emotion_schema())),
        };
        let raw = self.generate_text(request).await?;
        Ok(parse_json::<EmotionData>(&raw).map(EmotionData::normalized))
    }

    async fn generate_summary_report(
        &self,
        entries: &[JournalEntry],
        messages: &[Message],
        context: &UserContext,
    ) -> Result<Option<WellnessReport>, SoniaError> {
        let trajectory = analytics::report_lines(entries, messages);
        info!(
            "Generating wellness report from {} journal entries and {} messages",
            entries.len(),
            messages.len()
        );
        let request = GenerateContentRequest {
            contents: vec![Content::user(vec![Part::text(prompts::report_prompt(&trajectory, context))])],
            system_instruction: Some(Content::instruction(prompts::REPORT_INSTRUCTION)),
            generation_config: Some(GenerationConfig::json(prompts::report_schema())),
        };
        let raw = self.generate_text(request).await?;
        Ok(parse_json::<WellnessReport>(&raw).map(|mut r| {
            r.stability_score = r.stability_score.clamp(0.0, 100.0);
            r
        }))
    }

    async fn transcribe_voice(&self, audio_base64: &str, mime_type: &str) -> Result<String, SoniaError> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: None,
                parts: vec![Part::inline(mime_type, audio_base64), Part::text(prompts::TRANSCRIBE_PROMPT)],
            }],
            ..Default::default()
        };
        let text = self.generate_text(request).await?;
        Ok(text.trim().to_string())
    }

    async fn synthesize_speech(&self, text: &str, language: Language) -> Result<SpeechAudio, SoniaError> {
        let request = GenerateContentRequest {
            contents: vec![Content::user(vec![Part::text(prompts::speech_prompt(text, language))])],
            generation_config: Some(GenerationConfig::audio(&self.settings.voice_name)),
            ..Default::default()
        };
        let response = self.client.generate(&self.settings.tts_model, &request).await?;
        debug!(output_tokens = response.metrics.output_tokens, "Speech synthesized");
        let inline = response
            .inline_data
            .ok_or_else(|| SoniaError::LlmError("speech response carried no audio".into()))?;
        let mime_type = if inline.mime_type.is_empty() { OUTPUT_MIME.to_string() } else { inline.mime_type };
        Ok(SpeechAudio { data: inline.data, mime_type })
    }
}
