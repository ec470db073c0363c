//! Gemini `generateContent` REST client with retries.

use std::time::{Duration, Instant};

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sonia_config::GeminiSettings;
use sonia_core::SoniaError;
use tracing::{info, warn};

const API_VERSION: &str = "v1beta";
const BACKOFF_STEP_MS: u64 = 500;

// === Wire types ===

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user(parts: Vec<Part>) -> Self {
        Self { role: Some("user".into()), parts }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self { role: Some("model".into()), parts: vec![Part::text(text)] }
    }

    pub fn instruction(text: impl Into<String>) -> Self {
        Self { role: None, parts: vec![Part::text(text)] }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: Some(text.into()), inline_data: None }
    }

    pub fn inline(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData { mime_type: mime_type.into(), data: data.into() }),
        }
    }
}

/// Base64 payload with its MIME type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_modalities: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speech_config: Option<SpeechConfig>,
}

impl GenerationConfig {
    /// JSON output constrained by `schema`.
    pub fn json(schema: Value) -> Self {
        Self {
            response_mime_type: Some("application/json".into()),
            response_schema: Some(schema),
            ..Default::default()
        }
    }

    /// Spoken audio output using a prebuilt voice.
    pub fn audio(voice_name: &str) -> Self {
        Self {
            response_modalities: Some(vec!["AUDIO".into()]),
            speech_config: Some(SpeechConfig::prebuilt(voice_name)),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfig {
    pub voice_config: VoiceConfig,
}

impl SpeechConfig {
    pub fn prebuilt(voice_name: &str) -> Self {
        Self {
            voice_config: VoiceConfig {
                prebuilt_voice_config: PrebuiltVoiceConfig { voice_name: voice_name.to_string() },
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    pub prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrebuiltVoiceConfig {
    pub voice_name: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(default)]
    pub prompt_token_count: u32,
    #[serde(default)]
    pub candidates_token_count: u32,
}

impl GenerateContentResponse {
    fn first_parts(&self) -> &[Part] {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.as_slice())
            .unwrap_or(&[])
    }

    /// Concatenated text of the first candidate.
    pub fn text(&self) -> String {
        self.first_parts().iter().filter_map(|p| p.text.as_deref()).collect()
    }

    /// First inline payload of the first candidate.
    pub fn inline_data(&self) -> Option<InlineData> {
        self.first_parts().iter().find_map(|p| p.inline_data.clone())
    }
}

// === Client ===

/// Token usage and latency for a completed request.
#[derive(Debug, Clone, Copy, Default)]
pub struct LlmMetrics {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub elapsed_ms: u64,
    pub attempts: u32,
}

#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub text: String,
    pub inline_data: Option<InlineData>,
    pub metrics: LlmMetrics,
}

/// Client for Google's Generative Language API.
pub struct GeminiClient {
    client: Client,
    api_key: String,
    api_base: String,
    max_attempts: u32,
}

impl GeminiClient {
    pub fn new(settings: &GeminiSettings) -> Result<Self, SoniaError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| SoniaError::LlmError(e.to_string()))?;
        info!(
            "GeminiClient: api_base={}, api_key_len={}, max_attempts={}",
            settings.api_base,
            settings.api_key.len(),
            settings.max_attempts
        );
        Ok(Self {
            client,
            api_key: settings.api_key.clone(),
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            max_attempts: settings.max_attempts.max(1),
        })
    }

    pub fn endpoint(&self, model: &str) -> String {
        format!("{}/{}/models/{}:generateContent", self.api_base, API_VERSION, model)
    }

    /// Sends a `generateContent` request, retrying transport errors, 429 and 5xx.
    pub async fn generate(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<LlmResponse, SoniaError> {
        if self.api_key.is_empty() {
            return Err(SoniaError::NotConfigured("GEMINI_API_KEY".into()));
        }

        let url = self.endpoint(model);
        let start = Instant::now();
        let mut last_error = String::new();

        for attempt in 1..=self.max_attempts {
            if attempt > 1 {
                tokio::time::sleep(backoff(attempt)).await;
            }

            let response = match self
                .client
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(request)
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    warn!(attempt, model, "Gemini request failed: {}", e);
                    last_error = e.to_string();
                    continue;
                }
            };

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = format!("Gemini API error {}: {}", status, body);
                if !is_retryable(status) {
                    return Err(SoniaError::LlmError(message));
                }
                warn!(attempt, model, "{}", message);
                last_error = message;
                continue;
            }

            let resp: GenerateContentResponse = response
                .json()
                .await
                .map_err(|e| SoniaError::LlmError(e.to_string()))?;

            let usage = resp.usage_metadata.as_ref();
            let metrics = LlmMetrics {
                input_tokens: usage.map(|u| u.prompt_token_count).unwrap_or(0),
                output_tokens: usage.map(|u| u.candidates_token_count).unwrap_or(0),
                elapsed_ms: start.elapsed().as_millis() as u64,
                attempts: attempt,
            };
            info!(
                model,
                input_tokens = metrics.input_tokens,
                output_tokens = metrics.output_tokens,
                elapsed_ms = metrics.elapsed_ms,
                "Gemini request complete"
            );

            return Ok(LlmResponse {
                text: resp.text(),
                inline_data: resp.inline_data(),
                metrics,
            });
        }

        Err(SoniaError::MaxRetriesExceeded { attempts: self.max_attempts, last_error })
    }
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(BACKOFF_STEP_MS * u64::from(attempt - 1))
}

pub fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_wire_shape() {
        let request = GenerateContentRequest {
            contents: vec![Content::user(vec![Part::text("hello")])],
            system_instruction: Some(Content::instruction("be kind")),
            generation_config: Some(GenerationConfig::json(json!({"type": "OBJECT"}))),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["contents"][0]["role"], "user");
        assert_eq!(value["contents"][0]["parts"][0]["text"], "hello");
        assert!(value["systemInstruction"].get("role").is_none());
        assert_eq!(value["generationConfig"]["responseMimeType"], "application/json");
        assert!(value["generationConfig"].get("speechConfig").is_none());
    }

    #[test]
    fn test_audio_config_shape() {
        let value = serde_json::to_value(GenerationConfig::audio("Kore")).unwrap();
        assert_eq!(value["responseModalities"][0], "AUDIO");
        assert_eq!(value["speechConfig"]["voiceConfig"]["prebuiltVoiceConfig"]["voiceName"], "Kore");
    }

    #[test]
    fn test_response_text_and_audio() {
        let raw = json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        {"text": "{\"label\":"},
                        {"text": "\"Happy\"}"},
                        {"inlineData": {"mimeType": "audio/pcm;rate=24000", "data": "AAA="}}
                    ]
                }
            }],
            "usageMetadata": {"promptTokenCount": 12, "candidatesTokenCount": 4}
        });
        let resp: GenerateContentResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(resp.text(), "{\"label\":\"Happy\"}");
        assert_eq!(resp.inline_data().unwrap().data, "AAA=");
        assert_eq!(resp.usage_metadata.unwrap().prompt_token_count, 12);
    }

    #[test]
    fn test_empty_response() {
        let resp: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(resp.text(), "");
        assert!(resp.inline_data().is_none());
    }

    #[test]
    fn test_retry_policy() {
        assert!(is_retryable(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!is_retryable(StatusCode::BAD_REQUEST));
        assert_eq!(backoff(1), Duration::ZERO);
        assert_eq!(backoff(3), Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn test_missing_key_fails_fast() {
        let client = GeminiClient::new(&GeminiSettings::default()).unwrap();
        let err = client.generate("m", &GenerateContentRequest::default()).await.unwrap_err();
        assert!(matches!(err, SoniaError::NotConfigured(_)));
    }

    #[test]
    fn test_endpoint() {
        let settings = GeminiSettings { api_base: "http://localhost:9/".into(), ..Default::default() };
        let client = GeminiClient::new(&settings).unwrap();
        assert_eq!(client.endpoint("gemini-x"), "http://localhost:9/v1beta/models/gemini-x:generateContent");
    }
}
