//! Configuration loading, validation, and management for vitalbot.
//!
//! Loads configuration from `~/.vitalbot/config.toml` with environment
//! variable overrides. The variable names are the ones existing
//! deployments already set (`DINGTALK_APP_KEY`, `DASHSCOPE_API_KEY`, `DB_TYPE`, ...).
//! Required secrets are checked at startup; a missing one is fatal.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// The root configuration structure.
///
/// Maps directly to `~/.vitalbot/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// DingTalk robot credentials and endpoints
    #[serde(default)]
    pub dingtalk: DingTalkConfig,

    /// Vision model settings
    #[serde(default)]
    pub vision: VisionConfig,

    /// Record store settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// HTTP callback listener
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Conversational behaviour
    #[serde(default)]
    pub bot: BotConfig,
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Serialize, Deserialize)]
pub struct DingTalkConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_secret: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,

    /// Robot code used by the robot APIs. Defaults to the app key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub robot_code: Option<String>,

    /// Legacy API host (access tokens)
    #[serde(default = "default_oapi_base_url")]
    pub oapi_base_url: String,

    /// v1.0 API host (messages, files)
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Check the `timestamp`/`sign` headers on inbound callbacks
    #[serde(default = "default_true")]
    pub verify_signature: bool,
}

fn default_oapi_base_url() -> String {
    "https://oapi.dingtalk.com".into()
}
fn default_api_base_url() -> String {
    "https://api.dingtalk.com".into()
}

impl DingTalkConfig {
    /// The robot code, falling back to the app key.
    pub fn robot_code(&self) -> Option<&str> {
        self.robot_code.as_deref().or(self.app_key.as_deref())
    }
}

impl Default for DingTalkConfig {
    fn default() -> Self {
        Self {
            app_key: None,
            app_secret: None,
            agent_id: None,
            robot_code: None,
            oapi_base_url: default_oapi_base_url(),
            api_base_url: default_api_base_url(),
            verify_signature: true,
        }
    }
}

impl std::fmt::Debug for DingTalkConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DingTalkConfig")
            .field("app_key", &self.app_key)
            .field("app_secret", &redact(&self.app_secret))
            .field("agent_id", &self.agent_id)
            .field("robot_code", &self.robot_code)
            .field("oapi_base_url", &self.oapi_base_url)
            .field("api_base_url", &self.api_base_url)
            .field("verify_signature", &self.verify_signature)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct VisionConfig {
    /// "dashscope" (native API) or "openai_compat"
    #[serde(default = "default_vision_provider")]
    pub provider: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_vision_model")]
    pub model: String,

    /// Override the provider's default endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_vision_provider() -> String {
    "dashscope".into()
}
fn default_vision_model() -> String {
    "qwen-vl-max".into()
}
fn default_timeout_secs() -> u64 {
    120
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            provider: default_vision_provider(),
            api_key: None,
            model: default_vision_model(),
            base_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl std::fmt::Debug for VisionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisionConfig")
            .field("provider", &self.provider)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Which record store backend to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Embedded single-file database
    #[default]
    Sqlite,
    /// Networked relational database
    Postgres,
}

impl FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            other => Err(ConfigError::ValidationError(format!(
                "unknown storage backend '{other}' (expected sqlite or postgres)"
            ))),
        }
    }
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite => f.write_str("sqlite"),
            Self::Postgres => f.write_str("postgres"),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: String,

    /// Connection URL for the networked backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_sqlite_path() -> String {
    "bp_data.db".into()
}
fn default_max_connections() -> u32 {
    5
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            sqlite_path: default_sqlite_path(),
            database_url: None,
            max_connections: default_max_connections(),
        }
    }
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("backend", &self.backend)
            .field("sqlite_path", &self.sqlite_path)
            .field("database_url", &redact(&self.database_url))
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8088
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Exact text that asks for the subject's history
    #[serde(default = "default_history_keyword")]
    pub history_keyword: String,

    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Offset applied to stored UTC timestamps before display
    #[serde(default = "default_display_offset")]
    pub display_utc_offset_hours: i32,
}

fn default_history_keyword() -> String {
    "历史".into()
}
fn default_history_limit() -> usize {
    10
}
fn default_display_offset() -> i32 {
    8
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            history_keyword: default_history_keyword(),
            history_limit: default_history_limit(),
            display_utc_offset_hours: default_display_offset(),
        }
    }
}

/// A group of settings a command cannot run without.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// DingTalk app key and secret
    Platform,
    /// Vision API key
    Vision,
    /// Connection settings of the selected storage backend
    Storage,
}

impl AppConfig {
    /// Load configuration from the default path (~/.vitalbot/config.toml),
    /// then apply environment variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        Self::load_with_env(&config_path)
    }

    /// Load a specific file, then apply environment variable overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
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

    /// Override settings from environment variables (highest priority).
    ///
    /// `lookup` is `std::env::var` in production and a map in tests.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = non_empty("DINGTALK_APP_KEY") {
            self.dingtalk.app_key = Some(v);
        }
        if let Some(v) = non_empty("DINGTALK_APP_SECRET") {
            self.dingtalk.app_secret = Some(v);
        }
        if let Some(v) = non_empty("DINGTALK_AGENT_ID") {
            self.dingtalk.agent_id = Some(v);
        }
        if let Some(v) = non_empty("DASHSCOPE_API_KEY") {
            self.vision.api_key = Some(v);
        }
        if let Some(v) = non_empty("VITALBOT_VISION_MODEL") {
            self.vision.model = v;
        }
        if let Some(v) = non_empty("DB_TYPE") {
            self.storage.backend = v.parse()?;
        }
        if let Some(v) = non_empty("DB_PATH") {
            self.storage.sqlite_path = v;
        }
        if let Some(v) = non_empty("DATABASE_URL") {
            self.storage.database_url = Some(v);
        }
        if let Some(v) = non_empty("VITALBOT_PORT") {
            self.gateway.port = v.parse().map_err(|_| {
                ConfigError::ValidationError(format!("VITALBOT_PORT is not a port number: {v}"))
            })?;
        }

        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".vitalbot")
    }

    /// Validate value ranges. Presence of secrets is checked by [`Self::require`].
    fn validate(&self) -> Result<(), ConfigError> {
        if self.bot.history_limit == 0 {
            return Err(ConfigError::ValidationError(
                "bot.history_limit must be at least 1".into(),
            ));
        }

        if !(-14..=14).contains(&self.bot.display_utc_offset_hours) {
            return Err(ConfigError::ValidationError(
                "bot.display_utc_offset_hours must be between -14 and 14".into(),
            ));
        }

        if self.bot.history_keyword.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "bot.history_keyword must not be empty".into(),
            ));
        }

        if self.vision.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "vision.timeout_secs must be > 0".into(),
            ));
        }

        if self.storage.max_connections == 0 {
            return Err(ConfigError::ValidationError(
                "storage.max_connections must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// Names of the required settings that are missing for `needs`.
    pub fn missing_settings(&self, needs: &[Requirement]) -> Vec<&'static str> {
        let mut missing = Vec::new();

        for need in needs {
            match need {
                Requirement::Platform => {
                    if self.dingtalk.app_key.is_none() {
                        missing.push("DINGTALK_APP_KEY");
                    }
                    if self.dingtalk.app_secret.is_none() {
                        missing.push("DINGTALK_APP_SECRET");
                    }
                }
                Requirement::Vision => {
                    if self.vision.api_key.is_none() {
                        missing.push("DASHSCOPE_API_KEY");
                    }
                }
                Requirement::Storage => {
                    if self.storage.backend == StorageBackend::Postgres
                        && self.storage.database_url.is_none()
                    {
                        missing.push("DATABASE_URL");
                    }
                }
            }
        }

        missing
    }

    /// Fail with every missing setting listed at once.
    pub fn require(&self, needs: &[Requirement]) -> Result<(), ConfigError> {
        let missing = self.missing_settings(needs);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::MissingSettings(missing.join(", ")))
        }
    }

    /// Everything `serve` needs: platform credentials, vision key, storage.
    pub fn validate_for_serve(&self) -> Result<(), ConfigError> {
        self.require(&[Requirement::Platform, Requirement::Vision, Requirement::Storage])
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
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

    #[error("Missing required settings: {0}")]
    MissingSettings(String),
}
