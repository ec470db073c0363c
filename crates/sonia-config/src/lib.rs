//! Environment-driven configuration for the sonia server.
//!
//! All settings come from process environment variables (a `.env` file is
//! loaded by the binary before this runs). [`AppConfig::from_lookup`] takes
//! an arbitrary lookup function so tests never touch the real environment.

use std::path::PathBuf;

// ─────────────────────────────────────────────────────────────────────────────
// Error
// ─────────────────────────────────────────────────────────────────────────────

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

// ─────────────────────────────────────────────────────────────────────────────
// Defaults
// ─────────────────────────────────────────────────────────────────────────────

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5000";
pub const DEFAULT_DATABASE_PATH: &str = "data/sonia.db";
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_LIVE_URL: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";
pub const TEXT_MODEL: &str = "gemini-3-flash-preview";
pub const LIVE_MODEL: &str = "gemini-2.5-flash-native-audio-preview-12-2025";
pub const TTS_MODEL: &str = "gemini-2.5-flash-preview-tts";
pub const DEFAULT_VOICE: &str = "Kore";
/// Upper bound on token lifetime; keeps `exp` arithmetic far from overflow.
pub const MAX_TOKEN_TTL_DAYS: i64 = 3650;

// ─────────────────────────────────────────────────────────────────────────────
// Config Structs
// ─────────────────────────────────────────────────────────────────────────────

/// Settings for the Gemini REST and realtime endpoints.
#[derive(Debug, Clone)]
pub struct GeminiSettings {
    /// Empty when no key is configured.
    pub api_key: String,
    pub api_base: String,
    pub live_url: String,
    pub text_model: String,
    pub live_model: String,
    pub tts_model: String,
    pub voice_name: String,
    pub max_attempts: u32,
    pub timeout_secs: u64,
}

impl GeminiSettings {
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: DEFAULT_API_BASE.to_string(),
            live_url: DEFAULT_LIVE_URL.to_string(),
            text_model: TEXT_MODEL.to_string(),
            live_model: LIVE_MODEL.to_string(),
            tts_model: TTS_MODEL.to_string(),
            voice_name: DEFAULT_VOICE.to_string(),
            max_attempts: 3,
            timeout_secs: 60,
        }
    }
}

/// Signing secret and hashing cost for accounts.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub jwt_secret: String,
    pub token_ttl_days: i64,
    pub bcrypt_cost: u32,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub database_path: String,
    pub static_dir: Option<PathBuf>,
    pub auth: AuthSettings,
    pub gemini: GeminiSettings,
}

impl AppConfig {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let jwt_secret = get("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let defaults = GeminiSettings::default();
        let gemini = GeminiSettings {
            api_key: get("GEMINI_API_KEY").or_else(|| get("API_KEY")).unwrap_or_default(),
            api_base: get("GEMINI_API_BASE").unwrap_or(defaults.api_base),
            live_url: get("GEMINI_LIVE_URL").unwrap_or(defaults.live_url),
            text_model: get("TEXT_MODEL").unwrap_or(defaults.text_model),
            live_model: get("LIVE_MODEL").unwrap_or(defaults.live_model),
            tts_model: get("TTS_MODEL").unwrap_or(defaults.tts_model),
            voice_name: get("VOICE_NAME").unwrap_or(defaults.voice_name),
            max_attempts: parse_or("LLM_MAX_ATTEMPTS", get("LLM_MAX_ATTEMPTS"), defaults.max_attempts)?,
            timeout_secs: parse_or("LLM_TIMEOUT_SECS", get("LLM_TIMEOUT_SECS"), defaults.timeout_secs)?,
        };
        if gemini.max_attempts == 0 {
            return Err(ConfigError::Invalid { key: "LLM_MAX_ATTEMPTS", value: "0".into() });
        }
        if gemini.timeout_secs == 0 {
            return Err(ConfigError::Invalid { key: "LLM_TIMEOUT_SECS", value: "0".into() });
        }

        let auth = AuthSettings {
            jwt_secret,
            token_ttl_days: parse_or("TOKEN_TTL_DAYS", get("TOKEN_TTL_DAYS"), 7)?,
            bcrypt_cost: parse_or("BCRYPT_COST", get("BCRYPT_COST"), 10)?,
        };
        if !(1..=MAX_TOKEN_TTL_DAYS).contains(&auth.token_ttl_days) {
            return Err(ConfigError::Invalid { key: "TOKEN_TTL_DAYS", value: auth.token_ttl_days.to_string() });
        }
        if !(4..=31).contains(&auth.bcrypt_cost) {
            return Err(ConfigError::Invalid { key: "BCRYPT_COST", value: auth.bcrypt_cost.to_string() });
        }

        Ok(Self {
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            database_path: get("DATABASE_PATH").unwrap_or_else(|| DEFAULT_DATABASE_PATH.to_string()),
            static_dir: get("STATIC_DIR").map(PathBuf::from),
            auth,
            gemini,
        })
    }
}

fn parse_or<T: std::str::FromStr>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid { key, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup(&[("JWT_SECRET", "s3cret")])).unwrap();
        assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR);
        assert_eq!(config.database_path, DEFAULT_DATABASE_PATH);
        assert_eq!(config.auth.token_ttl_days, 7);
        assert_eq!(config.auth.bcrypt_cost, 10);
        assert_eq!(config.gemini.text_model, TEXT_MODEL);
        assert_eq!(config.gemini.voice_name, "Kore");
        assert!(!config.gemini.is_configured());
        assert!(config.static_dir.is_none());
    }

    #[test]
    fn test_missing_secret() {
        let err = AppConfig::from_lookup(lookup(&[("JWT_SECRET", "  ")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("JWT_SECRET"));
    }

    #[test]
    fn test_overrides_and_key_fallback() {
        let config = AppConfig::from_lookup(lookup(&[
            ("JWT_SECRET", "x"),
            ("API_KEY", "legacy-key"),
            ("TOKEN_TTL_DAYS", "1"),
            ("LLM_MAX_ATTEMPTS", "5"),
            ("STATIC_DIR", "dist"),
        ]))
        .unwrap();
        assert_eq!(config.gemini.api_key, "legacy-key");
        assert_eq!(config.auth.token_ttl_days, 1);
        assert_eq!(config.gemini.max_attempts, 5);
        assert_eq!(config.static_dir, Some(PathBuf::from("dist")));
    }

    #[test]
    fn test_invalid_numbers() {
        let err = AppConfig::from_lookup(lookup(&[("JWT_SECRET", "x"), ("BCRYPT_COST", "ten")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "BCRYPT_COST", .. }));

        let err = AppConfig::from_lookup(lookup(&[("JWT_SECRET", "x"), ("BCRYPT_COST", "2")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "BCRYPT_COST", .. }));
    }

    #[test]
    fn test_token_ttl_bounds() {
        for bad in ["0", "-3", "1000000000000000"] {
            let err = AppConfig::from_lookup(lookup(&[("JWT_SECRET", "x"), ("TOKEN_TTL_DAYS", bad)])).unwrap_err();
            assert_eq!(err, ConfigError::Invalid { key: "TOKEN_TTL_DAYS", value: bad.to_string() });
        }
        let config = AppConfig::from_lookup(lookup(&[("JWT_SECRET", "x"), ("TOKEN_TTL_DAYS", "3650")])).unwrap();
        assert_eq!(config.auth.token_ttl_days, MAX_TOKEN_TTL_DAYS);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = AppConfig::from_lookup(lookup(&[("JWT_SECRET", "x"), ("LLM_TIMEOUT_SECS", "0")])).unwrap_err();
        assert_eq!(err, ConfigError::Invalid { key: "LLM_TIMEOUT_SECS", value: "0".into() });
    }
}
