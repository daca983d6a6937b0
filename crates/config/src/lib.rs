//! Configuration loading, validation, and management for Clonechat.
//!
//! Loads configuration from `~/.clonechat/config.toml` with environment
//! variable overrides. Validates all settings at startup. Credentials and
//! endpoints are passed explicitly to the generation client and log store
//! from here; nothing reads ambient globals after startup.

use clonechat_core::knowledge::{KnowledgeBase, KnowledgeItem};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Providers `generation.provider` may name.
pub const KNOWN_PROVIDERS: &[&str] = &["gemini", "static"];

/// Backends `log.backend` may name.
pub const KNOWN_LOG_BACKENDS: &[&str] = &["memory", "file", "sqlite"];

/// The root configuration structure.
///
/// Maps directly to `~/.clonechat/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Generation endpoint settings
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Conversation log store settings
    #[serde(default)]
    pub log: LogConfig,

    /// Session identity settings
    #[serde(default)]
    pub session: SessionConfig,

    /// Prompt composition settings
    #[serde(default)]
    pub prompt: PromptConfig,

    /// User-facing fallback texts
    #[serde(default)]
    pub chat: ChatConfig,

    /// HTTP gateway settings
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Overrides the built-in knowledge corpus when non-empty
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub knowledge_base: Vec<KnowledgeItem>,
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("generation", &self.generation)
            .field("log", &self.log)
            .field("session", &self.session)
            .field("prompt", &self.prompt)
            .field("chat", &self.chat)
            .field("gateway", &self.gateway)
            .field("logging", &self.logging)
            .field("knowledge_base", &self.knowledge_base.len())
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// "gemini" or "static"
    #[serde(default = "default_provider")]
    pub provider: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Abort the call and surface a transport failure after this long
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Reply used by the "static" provider
    #[serde(default = "default_static_reply")]
    pub static_reply: String,
}

fn default_provider() -> String {
    "gemini".into()
}
fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".into()
}
fn default_model() -> String {
    "gemini-2.0-flash".into()
}
fn default_timeout_ms() -> u64 {
    30_000
}
fn default_static_reply() -> String {
    "The assistant is running in offline mode.".into()
}

impl std::fmt::Debug for GenerationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationConfig")
            .field("provider", &self.provider)
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            timeout_ms: default_timeout_ms(),
            static_reply: default_static_reply(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// "memory", "file" or "sqlite"
    #[serde(default = "default_log_backend")]
    pub backend: String,

    /// Store location; defaults under the config directory per backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default = "default_app_id")]
    pub app_id: String,

    /// Explicit collection name; derived from `app_id` when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,

    /// How often durable stores look for commits from other processes.
    /// 0 disables the watcher; reads still pick up new commits.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_log_backend() -> String {
    "file".into()
}
fn default_app_id() -> String {
    "default-app-id".into()
}
fn default_poll_interval_ms() -> u64 {
    500
}

impl LogConfig {
    /// The collection every session reads and writes.
    pub fn collection_path(&self) -> String {
        self.collection
            .clone()
            .unwrap_or_else(|| format!("artifacts/{}/public/data/chat_history", self.app_id))
    }

    /// The watcher period, or `None` when disabled.
    pub fn poll_interval(&self) -> Option<std::time::Duration> {
        (self.poll_interval_ms > 0).then(|| std::time::Duration::from_millis(self.poll_interval_ms))
    }

    /// Where the file or SQLite store lives.
    pub fn resolved_path(&self) -> PathBuf {
        match &self.path {
            Some(p) => PathBuf::from(p),
            None if self.backend == "sqlite" => AppConfig::config_dir().join("chat_history.sqlite"),
            None => AppConfig::config_dir().join("chat_history.jsonl"),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            backend: default_log_backend(),
            path: None,
            app_id: default_app_id(),
            collection: None,
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Fixed session identity; anonymous (random) when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptConfig {
    /// Replaces the built-in persona/scope preamble
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preamble: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Entry text written when the generation call fails in transport
    #[serde(default = "default_error_text")]
    pub error_text: String,

    /// Entry text written when the endpoint returns no usable text
    #[serde(default = "default_malformed_text")]
    pub malformed_text: String,
}

fn default_error_text() -> String {
    "An error occurred while processing your request. Please try again.".into()
}
fn default_malformed_text() -> String {
    "Sorry, I couldn't get a response from the AI.".into()
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            error_text: default_error_text(),
            malformed_text: default_malformed_text(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,
}

fn default_port() -> u16 {
    42718
}
fn default_host() -> String {
    "127.0.0.1".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Emit JSON log lines instead of human-readable ones
    #[serde(default)]
    pub json: bool,
}

impl AppConfig {
    /// Load configuration from the default path (~/.clonechat/config.toml).
    ///
    /// Environment overrides:
    /// - `CLONECHAT_API_KEY`, then `GEMINI_API_KEY`, then `GOOGLE_API_KEY`
    ///   (only when the file sets no key)
    /// - `CLONECHAT_MODEL`
    /// - `CLONECHAT_APP_ID`
    /// - `CLONECHAT_LOG_BACKEND`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup` (injectable for tests).
    fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.generation.api_key.is_none() {
            self.generation.api_key = lookup("CLONECHAT_API_KEY")
                .or_else(|| lookup("GEMINI_API_KEY"))
                .or_else(|| lookup("GOOGLE_API_KEY"));
        }
        if let Some(model) = lookup("CLONECHAT_MODEL") {
            self.generation.model = model;
        }
        if let Some(app_id) = lookup("CLONECHAT_APP_ID") {
            self.log.app_id = app_id;
        }
        if let Some(backend) = lookup("CLONECHAT_LOG_BACKEND") {
            self.log.backend = backend;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".clonechat")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.generation.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "generation.timeout_ms must be greater than 0".into(),
            ));
        }

        if !KNOWN_PROVIDERS.contains(&self.generation.provider.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "unknown generation.provider '{}' (expected one of: {})",
                self.generation.provider,
                KNOWN_PROVIDERS.join(", ")
            )));
        }

        if !KNOWN_LOG_BACKENDS.contains(&self.log.backend.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "unknown log.backend '{}' (expected one of: {})",
                self.log.backend,
                KNOWN_LOG_BACKENDS.join(", ")
            )));
        }

        if self.log.app_id.trim().is_empty() {
            return Err(ConfigError::ValidationError("log.app_id must not be empty".into()));
        }

        if !self.knowledge_base.is_empty() {
            KnowledgeBase::new(self.knowledge_base.clone())
                .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.generation.api_key.is_some()
    }

    /// The knowledge base to serve: the configured override, else built-in.
    pub fn knowledge_base(&self) -> Result<KnowledgeBase, ConfigError> {
        if self.knowledge_base.is_empty() {
            return Ok(KnowledgeBase::builtin());
        }
        KnowledgeBase::new(self.knowledge_base.clone())
            .map_err(|e| ConfigError::ValidationError(e.to_string()))
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            generation: GenerationConfig::default(),
            log: LogConfig::default(),
            session: SessionConfig::default(),
            prompt: PromptConfig::default(),
            chat: ChatConfig::default(),
            gateway: GatewayConfig::default(),
            logging: LoggingConfig::default(),
            knowledge_base: vec![],
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
