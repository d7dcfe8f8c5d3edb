use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{MentorError, Result};

/// Top-level configuration for the Mentor assistant.
///
/// Loaded from `~/.mentor/config.toml` by default. Secrets never live in this
/// file: sections name the environment variables that hold them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MentorConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub calendar: CalendarConfig,
}

impl MentorConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: MentorConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory for the memory database and OAuth token.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// HTTP port for `mentor serve`.
    pub port: u16,
    /// IANA zone used to interpret "today", "tomorrow", weekdays.
    pub timezone: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.mentor/data".to_string(),
            log_level: "info".to_string(),
            port: 3040,
            timezone: "UTC".to_string(),
        }
    }
}

impl GeneralConfig {
    /// Parse the configured time zone.
    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| MentorError::Config(format!("invalid timezone '{}': {}", self.timezone, e)))
    }

    /// Data directory with a leading `~` expanded to the home directory.
    pub fn data_path(&self) -> PathBuf {
        expand_home(&self.data_dir)
    }

    /// Resolve a file name relative to the data directory. Absolute paths
    /// are returned unchanged.
    pub fn resolve(&self, file: &str) -> PathBuf {
        let path = expand_home(file);
        if path.is_absolute() {
            path
        } else {
            self.data_path().join(path)
        }
    }
}

/// Orchestrator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Whether the chat entry point accepts messages.
    pub enabled: bool,
    /// Number of most recent turns sent to the model (sliding window).
    pub history_window: usize,
    /// Facts retrieved per memory query.
    pub top_k: usize,
    /// Maximum utterance length in characters.
    pub max_message_length: usize,
    /// Ask the model to pick an intent when keywords are inconclusive.
    pub model_fallback: bool,
    /// Phrase calendar listings through the model instead of the template.
    pub phrase_calendar: bool,
    /// Delay before the single retry of a transient failure.
    pub retry_backoff_ms: u64,
    /// Upper bound for any single gateway call.
    pub gateway_timeout_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            history_window: 10,
            top_k: 5,
            max_message_length: 2000,
            model_fallback: true,
            phrase_calendar: false,
            retry_backoff_ms: 250,
            gateway_timeout_secs: 30,
        }
    }
}

/// Text-completion provider settings (OpenAI-compatible API).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    /// Environment variable holding the API key.
    pub api_key_env: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            temperature: 0.7,
            max_tokens: 500,
            timeout_secs: 30,
            api_key_env: "OPENAI_API_KEY".to_string(),
        }
    }
}

impl LlmConfig {
    /// Read the API key from the configured environment variable.
    pub fn api_key(&self) -> Option<String> {
        read_env(&self.api_key_env)
    }
}

/// Memory store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// SQLite file, relative to `general.data_dir` unless absolute.
    pub db_file: String,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            db_file: "memories.db".to_string(),
        }
    }
}

/// Google Calendar settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    pub calendar_id: String,
    /// Upper bound on events fetched per query.
    pub max_results: u32,
    pub api_base: String,
    pub auth_url: String,
    pub token_url: String,
    pub redirect_uri: String,
    /// OAuth token file, relative to `general.data_dir` unless absolute.
    pub token_file: String,
    pub client_id_env: String,
    pub client_secret_env: String,
    pub timeout_secs: u64,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            calendar_id: "primary".to_string(),
            max_results: 50,
            api_base: "https://www.googleapis.com/calendar/v3".to_string(),
            auth_url: "https://accounts.google.com/o/oauth2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            redirect_uri: "http://localhost".to_string(),
            token_file: "google_token.json".to_string(),
            client_id_env: "GOOGLE_CLIENT_ID".to_string(),
            client_secret_env: "GOOGLE_CLIENT_SECRET".to_string(),
            timeout_secs: 30,
        }
    }
}

impl CalendarConfig {
    /// OAuth client id and secret from the environment, if both are set.
    pub fn client_credentials(&self) -> Option<(String, String)> {
        Some((read_env(&self.client_id_env)?, read_env(&self.client_secret_env)?))
    }
}

fn read_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn expand_home(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/") {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE");
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME");
        if let Ok(home) = home {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(raw)
}
