//! Configuration for the discussion engine.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (COLLOQ_STORE_URL, COLLOQ_COMPLETION_URL, ...)
//! 2. Config file (.colloq/config.yaml)
//! 3. Defaults
//!
//! Config file discovery searches the current directory and parents for
//! `.colloq/config.yaml`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Default bounded history window handed to the completion backend
pub const DEFAULT_HISTORY_WINDOW: usize = 10;

/// Default system prompt; `{topic}` is replaced with the channel topic
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant participating in a \
    course-project discussion about \"{topic}\". Keep answers concise and on topic.";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub store: Option<StoreConfig>,
    #[serde(default)]
    pub completion: Option<CompletionConfig>,
    #[serde(default)]
    pub transcription: Option<TranscriptionConfig>,
    #[serde(default)]
    pub identity: Option<IdentityConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreConfig {
    /// Base URL of the persistence/query surface
    pub url: Option<String>,
    /// Base URL of the realtime feed (defaults to the store URL)
    pub feed_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompletionConfig {
    pub url: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub system_prompt: Option<String>,
    pub history_window: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TranscriptionConfig {
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdentityConfig {
    /// Path to the local identity store file
    pub path: Option<String>,
}

/// Resolved engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Base URL of the persistence/query surface
    pub store_url: String,

    /// Base URL of the realtime feed
    pub feed_url: String,

    /// Chat-completions endpoint of the AI backend
    pub completion_url: String,

    /// Model name passed to the completion backend
    pub model: String,

    /// Bearer token for the completion backend (may be empty for local backends)
    pub api_key: String,

    /// System prompt template; `{topic}` is substituted per channel
    pub system_prompt: String,

    /// How many prior messages accompany an AI trigger
    pub history_window: usize,

    /// Speech-to-text endpoint
    pub transcription_url: String,

    /// Local identity store file
    pub identity_path: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            store_url: "http://localhost:8080".to_string(),
            feed_url: "http://localhost:8080".to_string(),
            completion_url: "http://localhost:11434/v1/chat/completions".to_string(),
            model: "llama3".to_string(),
            api_key: String::new(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            history_window: DEFAULT_HISTORY_WINDOW,
            transcription_url: "http://localhost:8081/transcribe".to_string(),
            identity_path: default_identity_path(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from all sources (env > file > defaults)
    pub fn load() -> Result<Self> {
        let file = match find_config_file() {
            Some(path) => Some(load_config_file(&path)?),
            None => None,
        };
        Ok(Self::resolve(file.unwrap_or_default()))
    }

    /// Resolve a parsed config file against env overrides and defaults
    pub fn resolve(file: ConfigFile) -> Self {
        let defaults = Self::default();
        let store = file.store.unwrap_or_default();
        let completion = file.completion.unwrap_or_default();
        let transcription = file.transcription.unwrap_or_default();
        let identity = file.identity.unwrap_or_default();

        let store_url = env_or("COLLOQ_STORE_URL", store.url, &defaults.store_url);
        let feed_url = std::env::var("COLLOQ_FEED_URL")
            .ok()
            .or(store.feed_url)
            .unwrap_or_else(|| store_url.clone());

        Self {
            feed_url,
            completion_url: env_or(
                "COLLOQ_COMPLETION_URL",
                completion.url,
                &defaults.completion_url,
            ),
            model: env_or("COLLOQ_MODEL", completion.model, &defaults.model),
            api_key: env_or("COLLOQ_API_KEY", completion.api_key, &defaults.api_key),
            system_prompt: completion
                .system_prompt
                .unwrap_or_else(|| defaults.system_prompt.clone()),
            history_window: completion.history_window.unwrap_or(DEFAULT_HISTORY_WINDOW),
            transcription_url: env_or(
                "COLLOQ_TRANSCRIPTION_URL",
                transcription.url,
                &defaults.transcription_url,
            ),
            identity_path: identity
                .path
                .map(PathBuf::from)
                .unwrap_or_else(default_identity_path),
            store_url,
        }
    }

    /// Render the system prompt for a channel topic
    pub fn system_prompt_for(&self, topic: &str) -> String {
        self.system_prompt.replace("{topic}", topic)
    }
}

/// Default identity store location (~/.colloq/identities.json)
fn default_identity_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".colloq")
        .join("identities.json")
}

fn env_or(var: &str, file_value: Option<String>, default: &str) -> String {
    std::env::var(var)
        .ok()
        .or(file_value)
        .unwrap_or_else(|| default.to_string())
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".colloq").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse a config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}
