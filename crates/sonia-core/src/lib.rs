//! Core domain types and error definitions for sonia.
//!
//! This crate provides the types shared across the sonia service:
//!
//! - [`SoniaError`] - Error type for LLM and realtime voice operations
//! - [`EmotionLabel`] and [`EmotionData`] - The per-turn emotion schema
//! - [`Message`], [`JournalEntry`] - Persisted session state
//! - [`UserContext`] - Life context and preferred language
//! - [`WellnessReport`] - LLM-synthesised trajectory report
//! - [`analytics`] - Derived dashboard aggregations
//!
//! # Example
//!
//! ```rust
//! use sonia_core::{EmotionData, EmotionLabel, Message, MessageRole};
//!
//! let msg = Message::new("m-1", MessageRole::Assistant, "I hear you.", 1_700_000_000_000)
//!     .with_emotion(EmotionData::new(EmotionLabel::Stress, 0.8, 70.0));
//!
//! assert_eq!(msg.emotion.unwrap().label, EmotionLabel::Stress);
//! ```

pub mod analytics;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use analytics::{
    AnalyticsSummary, EmotionPoint, HistoryEntry, LabelCount, Milestone, PathProgress, PointSource,
};

/// Errors that can occur while talking to the LLM provider.
#[derive(Error, Debug)]
pub enum SoniaError {
    /// LLM API request failed.
    #[error("LLM request failed: {0}")]
    LlmError(String),

    /// Failed to parse structured output from LLM.
    #[error("Failed to parse structured output: {0}")]
    ParseError(String),

    /// No API key configured for the provider.
    #[error("LLM provider is not configured: {0}")]
    NotConfigured(String),

    /// Maximum retry attempts exceeded.
    #[error("Max retries exceeded after {attempts} attempts: {last_error}")]
    MaxRetriesExceeded { attempts: u32, last_error: String },

    /// Realtime voice session error.
    #[error("Realtime session error: {0}")]
    Realtime(String),

    /// Audio payload could not be decoded.
    #[error("Invalid audio payload: {0}")]
    Audio(String),
}

impl From<serde_json::Error> for SoniaError {
    fn from(err: serde_json::Error) -> Self {
        SoniaError::ParseError(err.to_string())
    }
}

/// Returns the current wall-clock time in Unix milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

// ============================================================================
// Emotion schema
// ============================================================================

/// Dominant emotion detected for a turn or a journal entry.
///
/// Labels coming back from the model are matched case-insensitively; anything
/// unrecognised collapses to [`EmotionLabel::Neutral`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String")]
pub enum EmotionLabel {
    Happy,
    Sad,
    Stress,
    Anxiety,
    Anger,
    Burnout,
    Neutral,
    Excited,
}

impl EmotionLabel {
    pub const ALL: [EmotionLabel; 8] = [
        EmotionLabel::Happy,
        EmotionLabel::Sad,
        EmotionLabel::Stress,
        EmotionLabel::Anxiety,
        EmotionLabel::Anger,
        EmotionLabel::Burnout,
        EmotionLabel::Neutral,
        EmotionLabel::Excited,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EmotionLabel::Happy => "Happy",
            EmotionLabel::Sad => "Sad",
            EmotionLabel::Stress => "Stress",
            EmotionLabel::Anxiety => "Anxiety",
            EmotionLabel::Anger => "Anger",
            EmotionLabel::Burnout => "Burnout",
            EmotionLabel::Neutral => "Neutral",
            EmotionLabel::Excited => "Excited",
        }
    }

    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|l| l.as_str().eq_ignore_ascii_case(s))
            .unwrap_or(EmotionLabel::Neutral)
    }

    /// True for labels the dashboard treats as uplifting.
    pub fn is_positive(&self) -> bool {
        matches!(self, EmotionLabel::Happy | EmotionLabel::Excited)
    }
}

impl From<String> for EmotionLabel {
    fn from(s: String) -> Self {
        EmotionLabel::parse(&s)
    }
}

impl fmt::Display for EmotionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Emotion analysis returned by the model for one piece of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmotionData {
    pub label: EmotionLabel,
    /// Confidence score from 0 to 1.
    #[serde(default)]
    pub confidence: f64,
    /// Intensity percentage from 0 to 100.
    #[serde(default)]
    pub intensity: f64,
    /// Empathetic reply text, present for chat turns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    /// Two or three suggested activities.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activities: Option<Vec<String>>,
}

impl EmotionData {
    pub fn new(label: EmotionLabel, confidence: f64, intensity: f64) -> Self {
        Self { label, confidence, intensity, response: None, activities: None }
    }

    /// Fallback used when journal analysis produced nothing usable.
    pub fn neutral() -> Self {
        Self::new(EmotionLabel::Neutral, 1.0, 50.0)
    }

    /// Clamps confidence into 0..=1 and intensity into 0..=100.
    pub fn normalized(mut self) -> Self {
        self.confidence = clamp_finite(self.confidence, 0.0, 1.0);
        self.intensity = clamp_finite(self.intensity, 0.0, 100.0);
        self
    }

    /// Drops the reply text, keeping only what gets attached to a stored message.
    pub fn without_response(mut self) -> Self {
        self.response = None;
        self
    }
}

fn clamp_finite(v: f64, lo: f64, hi: f64) -> f64 {
    if v.is_nan() {
        return lo;
    }
    v.clamp(lo, hi)
}

// ============================================================================
// Session state
// ============================================================================

/// Role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Message from the user.
    User,
    /// Message from Sonia.
    #[serde(alias = "ai")]
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "user" => Some(MessageRole::User),
            "assistant" | "ai" => Some(MessageRole::Assistant),
            _ => None,
        }
    }
}

/// How a message was captured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    Voice,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Voice => "voice",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "voice" => MessageKind::Voice,
            _ => MessageKind::Text,
        }
    }
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub role: MessageRole,
    pub content: String,
    /// Unix milliseconds.
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotion: Option<EmotionData>,
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
}

impl Message {
    pub fn new(id: impl Into<String>, role: MessageRole, content: impl Into<String>, timestamp: i64) -> Self {
        Self {
            id: id.into(),
            role,
            content: content.into(),
            timestamp,
            emotion: None,
            kind: MessageKind::Text,
            audio_url: None,
        }
    }

    pub fn with_emotion(mut self, emotion: EmotionData) -> Self {
        self.emotion = Some(emotion);
        self
    }

    pub fn with_kind(mut self, kind: MessageKind) -> Self {
        self.kind = kind;
        self
    }
}

/// A journal entry with the emotion detected when it was written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    pub id: String,
    pub title: String,
    pub content: String,
    pub timestamp: i64,
    pub emotion: EmotionData,
}

/// The part of life the user is currently journaling about.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifeContext {
    #[serde(rename = "Student")]
    Student,
    #[default]
    #[serde(rename = "Office worker")]
    OfficeWorker,
    #[serde(rename = "Personal life")]
    PersonalLife,
}

impl LifeContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifeContext::Student => "Student",
            LifeContext::OfficeWorker => "Office worker",
            LifeContext::PersonalLife => "Personal life",
        }
    }
}

impl fmt::Display for LifeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Language Sonia replies in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    #[default]
    English,
    Hindi,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Hindi => "Hindi",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-user settings that shape every prompt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContext {
    pub role: LifeContext,
    pub language: Language,
}

/// Partial update to a [`UserContext`].
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct UserContextPatch {
    #[serde(default)]
    pub role: Option<LifeContext>,
    #[serde(default)]
    pub language: Option<Language>,
}

impl UserContext {
    pub fn apply(mut self, patch: UserContextPatch) -> Self {
        if let Some(role) = patch.role {
            self.role = role;
        }
        if let Some(language) = patch.language {
            self.language = language;
        }
        self
    }
}

/// LLM-generated summary of the user's emotional trajectory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WellnessReport {
    pub summary: String,
    pub stability_score: f64,
    #[serde(default)]
    pub key_themes: Vec<String>,
    pub recommendation: String,
}

/// A registered account.
#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_parse_is_case_insensitive() {
        assert_eq!(EmotionLabel::parse("anxiety"), EmotionLabel::Anxiety);
        assert_eq!(EmotionLabel::parse(" BURNOUT "), EmotionLabel::Burnout);
        assert_eq!(EmotionLabel::parse("melancholy"), EmotionLabel::Neutral);
    }

    #[test]
    fn test_emotion_from_model_json() {
        let raw = r#"{"label":"stress","confidence":1.4,"intensity":120,"response":"Breathe.","activities":["walk","journal"]}"#;
        let emotion: EmotionData = serde_json::from_str(raw).unwrap();
        let emotion = emotion.normalized();
        assert_eq!(emotion.label, EmotionLabel::Stress);
        assert_eq!(emotion.confidence, 1.0);
        assert_eq!(emotion.intensity, 100.0);
        assert_eq!(emotion.activities.as_deref().map(|a| a.len()), Some(2));
    }

    #[test]
    fn test_emotion_without_label_is_rejected() {
        assert!(serde_json::from_str::<EmotionData>("{}").is_err());
    }

    #[test]
    fn test_message_wire_format() {
        let msg = Message::new("1", MessageRole::User, "hi", 5).with_kind(MessageKind::Voice);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "voice");
        assert_eq!(json["role"], "user");
        assert!(json.get("emotion").is_none());

        let legacy: Message =
            serde_json::from_str(r#"{"id":"2","role":"ai","content":"hey","timestamp":6}"#).unwrap();
        assert_eq!(legacy.role, MessageRole::Assistant);
        assert_eq!(legacy.kind, MessageKind::Text);
    }

    #[test]
    fn test_context_defaults_and_patch() {
        let ctx = UserContext::default();
        assert_eq!(ctx.role, LifeContext::OfficeWorker);
        assert_eq!(ctx.language, Language::English);

        let patch: UserContextPatch = serde_json::from_str(r#"{"language":"Hindi"}"#).unwrap();
        let ctx = ctx.apply(patch);
        assert_eq!(ctx.language, Language::Hindi);
        assert_eq!(ctx.role, LifeContext::OfficeWorker);
        assert_eq!(serde_json::to_value(ctx).unwrap()["role"], "Office worker");
    }

    #[test]
    fn test_report_parses_camel_case() {
        let raw = r#"{"summary":"s","stabilityScore":72,"keyThemes":["work"],"recommendation":"rest"}"#;
        let report: WellnessReport = serde_json::from_str(raw).unwrap();
        assert_eq!(report.stability_score, 72.0);
        assert_eq!(report.key_themes, vec!["work".to_string()]);
    }
}
