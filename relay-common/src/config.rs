//! Configuration management for deepseek-relay.
//!
//! The relay reads an optional JSON file at `~/.deepseek-relay/config.json`
//! (or the path in `RELAY_CONFIG`), then applies environment overrides.
//!
//! # Configuration Priority
//!
//! 1. Environment variables
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `BOT_TOKEN` → telegram.bot_token (required)
//! - `DEEPSEEK_API_KEY` → llm.api_key (required)
//! - `DEEPSEEK_API_URL` → llm.endpoint
//! - `DEEPSEEK_MODEL` → llm.model
//! - `RELAY_LOG_LEVEL` → observability.log_level
//! - `RELAY_LOG_FORMAT` → observability.log_format

use crate::error::{Error, Result, ResultExt};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable holding the Telegram bot token.
pub const BOT_TOKEN_ENV: &str = "BOT_TOKEN";

/// Environment variable holding the DeepSeek API key.
pub const API_KEY_ENV: &str = "DEEPSEEK_API_KEY";

/// Environment variable pointing at an alternative config file.
pub const CONFIG_PATH_ENV: &str = "RELAY_CONFIG";

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".deepseek-relay"),
        |dirs| dirs.home_dir().join(".deepseek-relay"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    std::env::var(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| config_dir().join("config.json"))
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration for the relay.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Telegram transport settings
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Completion endpoint settings
    #[serde(default)]
    pub llm: LlmConfig,

    /// Per-user history bounds
    #[serde(default)]
    pub session: SessionConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .context(format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .context(format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration, apply environment overrides and validate.
    ///
    /// This is the startup entry point: an error here means the process
    /// must not start.
    pub fn load_with_env() -> Result<Self> {
        Self::load_with_overrides(&config_path(), |key| std::env::var(key).ok())
    }

    /// Load `path` if it exists, apply overrides from `lookup` and validate.
    ///
    /// A missing file is not an error; defaults are used instead.
    pub fn load_with_overrides<F>(path: &Path, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = if path.exists() {
            Self::load_from(path)?
        } else {
            Self::default()
        };
        config.apply_overrides_with(lookup);
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn apply_overrides_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        // Secrets mounted from files usually end with a newline.
        if let Some(token) = lookup(BOT_TOKEN_ENV) {
            self.telegram.bot_token = token.trim().to_string();
        }
        if let Some(key) = lookup(API_KEY_ENV) {
            self.llm.api_key = key.trim().to_string();
        }
        if let Some(url) = lookup("DEEPSEEK_API_URL") {
            self.llm.endpoint = url;
        }
        if let Some(model) = lookup("DEEPSEEK_MODEL") {
            self.llm.model = model;
        }
        if let Some(level) = lookup("RELAY_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Some(format) = lookup("RELAY_LOG_FORMAT") {
            self.observability.log_format = format;
        }
    }

    /// Validate the configuration.
    ///
    /// Both secrets are required; the relay cannot do anything without them.
    pub fn validate(&self) -> Result<()> {
        validate_secret(BOT_TOKEN_ENV, &self.telegram.bot_token)?;
        validate_secret(API_KEY_ENV, &self.llm.api_key)?;
        if self.telegram.max_message_len == 0 {
            return Err(Error::Config(
                "telegram.max_message_len must be greater than 0".into(),
            ));
        }
        if self.session.max_stored_turns == 0 || self.session.context_turns == 0 {
            return Err(Error::Config(
                "session bounds must be greater than 0".into(),
            ));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(Error::Config(format!(
                "llm.temperature must be within 0.0..=2.0, got {}",
                self.llm.temperature
            )));
        }
        Ok(())
    }
}

/// A secret ends up in a URL path or an `Authorization` header, so it must be
/// non-empty printable ASCII without spaces.
fn validate_secret(name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::Config(format!("{name} is not set")));
    }
    if !value.chars().all(|c| c.is_ascii_graphic()) {
        return Err(Error::Config(format!(
            "{name} contains whitespace or non-printable characters"
        )));
    }
    Ok(())
}

// ============================================================================
// Telegram
// ============================================================================

/// Telegram Bot API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot token issued by BotFather
    #[serde(default)]
    pub bot_token: String,

    /// Bot API base URL (overridable for tests and local Bot API servers)
    #[serde(default = "default_telegram_api_base")]
    pub api_base: String,

    /// Long-poll timeout passed to `getUpdates`
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,

    /// Maximum characters per outgoing message
    #[serde(default = "default_max_message_len")]
    pub max_message_len: usize,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            api_base: default_telegram_api_base(),
            poll_timeout_secs: default_poll_timeout(),
            max_message_len: default_max_message_len(),
        }
    }
}

// ============================================================================
// LLM
// ============================================================================

/// Completion endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Bearer credential for the completion endpoint
    #[serde(default)]
    pub api_key: String,

    /// Full URL of the chat completions endpoint
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,

    /// Model identifier
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Maximum output tokens
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Upper bound on the wait for a completion, in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    /// System instruction sent first in every request
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: default_llm_endpoint(),
            model: default_llm_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_llm_timeout(),
            system_prompt: default_system_prompt(),
        }
    }
}

// ============================================================================
// Session
// ============================================================================

/// Per-user history bounds.
///
/// The stored bound and the context bound are independent: more turns are
/// kept than are sent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Maximum turns kept per user (default: 20, i.e. 10 exchanges)
    #[serde(default = "default_max_stored_turns")]
    pub max_stored_turns: usize,

    /// Maximum prior turns sent as context (default: 10, i.e. 5 exchanges)
    #[serde(default = "default_context_turns")]
    pub context_turns: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_stored_turns: default_max_stored_turns(),
            context_turns: default_context_turns(),
        }
    }
}

// ============================================================================
// Observability
// ============================================================================

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

fn default_telegram_api_base() -> String {
    "https://api.telegram.org".into()
}
fn default_poll_timeout() -> u64 {
    30
}
fn default_max_message_len() -> usize {
    4000
}
fn default_llm_endpoint() -> String {
    "https://api.deepseek.com/chat/completions".into()
}
fn default_llm_model() -> String {
    "deepseek-chat".into()
}
fn default_temperature() -> f64 {
    0.7
}
fn default_max_tokens() -> u32 {
    2000
}
fn default_llm_timeout() -> u64 {
    30
}
fn default_system_prompt() -> String {
    "Ты полезный AI-ассистент. Отвечай на русском языке.".into()
}
fn default_max_stored_turns() -> usize {
    20
}
fn default_context_turns() -> usize {
    10
}
fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "pretty".into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn with_secrets() -> Config {
        let mut config = Config::default();
        config.telegram.bot_token = "123:ABC".into();
        config.llm.api_key = "sk-test".into();
        config
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.telegram.max_message_len, 4000);
        assert_eq!(config.llm.model, "deepseek-chat");
        assert_eq!(config.llm.max_tokens, 2000);
        assert_eq!(config.llm.timeout_secs, 30);
        assert!((config.llm.temperature - 0.7).abs() < f64::EPSILON);
        assert_eq!(config.session.max_stored_turns, 20);
        assert_eq!(config.session.context_turns, 10);
        assert_eq!(config.observability.log_format, "pretty");
    }

    #[test]
    fn test_missing_bot_token_rejected() {
        let mut config = with_secrets();
        config.telegram.bot_token.clear();
        let err = config.validate().unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("BOT_TOKEN"));
    }

    #[test]
    fn test_missing_api_key_rejected() {
        let mut config = with_secrets();
        config.llm.api_key = "   ".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("DEEPSEEK_API_KEY"));
    }

    #[test]
    fn test_zero_bounds_rejected() {
        let mut config = with_secrets();
        config.session.context_turns = 0;
        assert!(config.validate().is_err());

        let mut config = with_secrets();
        config.telegram.max_message_len = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_valid_config() {
        assert!(with_secrets().validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("BOT_TOKEN", "env-token"),
            ("DEEPSEEK_API_KEY", "env-key"),
            ("RELAY_LOG_LEVEL", "debug"),
            ("DEEPSEEK_MODEL", "deepseek-reasoner"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.telegram.bot_token = "file-token".into();
        config.apply_overrides_with(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.telegram.bot_token, "env-token");
        assert_eq!(config.llm.api_key, "env-key");
        assert_eq!(config.llm.model, "deepseek-reasoner");
        assert_eq!(config.observability.log_level, "debug");
        assert_eq!(config.observability.log_format, "pretty");
    }

    #[test]
    fn test_env_secrets_are_trimmed() {
        let env: HashMap<&str, &str> = [
            ("BOT_TOKEN", "123:ABC\n"),
            ("DEEPSEEK_API_KEY", "  sk-real-key\r\n"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides_with(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.telegram.bot_token, "123:ABC");
        assert_eq!(config.llm.api_key, "sk-real-key");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_secret_unusable_as_header_rejected() {
        let mut config = with_secrets();
        config.llm.api_key = "sk-real-key\n".into();
        let err = config.validate().unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("DEEPSEEK_API_KEY"));

        let mut config = with_secrets();
        config.telegram.bot_token = "123 ABC".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("BOT_TOKEN"));

        let mut config = with_secrets();
        config.llm.api_key = "sk-ключ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_with_overrides_aborts_without_bot_token() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("config.json");
        let env: HashMap<&str, &str> = [("DEEPSEEK_API_KEY", "sk-test")].into_iter().collect();

        let err = Config::load_with_overrides(&missing, |k| env.get(k).map(|v| v.to_string()))
            .unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("BOT_TOKEN"));

        let err = Config::load_with_overrides(&missing, |_| None).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_load_with_overrides_env_beats_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "telegram": {{ "bot_token": "file-token" }},
                "llm": {{ "api_key": "file-key" }}
            }}"#
        )
        .unwrap();
        let env: HashMap<&str, &str> = [("DEEPSEEK_API_KEY", "env-key")].into_iter().collect();

        let config =
            Config::load_with_overrides(file.path(), |k| env.get(k).map(|v| v.to_string()))
                .unwrap();
        assert_eq!(config.telegram.bot_token, "file-token");
        assert_eq!(config.llm.api_key, "env-key");
    }

    #[test]
    fn test_load_from_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "telegram": {{ "max_message_len": 1000 }},
                "session": {{ "context_turns": 4 }},
                "observability": {{ "level": "warn" }}
            }}"#
        )
        .unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.telegram.max_message_len, 1000);
        assert_eq!(config.telegram.api_base, "https://api.telegram.org");
        assert_eq!(config.session.context_turns, 4);
        assert_eq!(config.session.max_stored_turns, 20);
        assert_eq!(config.observability.log_level, "warn");
    }

    #[test]
    fn test_load_from_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let err = Config::load_from(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
    }
}
