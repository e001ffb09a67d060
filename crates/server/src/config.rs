//! # Application Configuration
//!
//! This module defines the configuration structure for the `trialsage-server`
//! and loads it from a YAML file and environment variables.

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use regex::Regex;
use serde::Deserialize;
use std::env;
use std::fs;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::info;
use trialsage::{
    providers::factory::ProviderConfig,
    types::{DEFAULT_MAX_INPUT_CHARS, DEFAULT_TIMEOUT_SECS},
    ExtractionConfig,
};

/// A custom error type for configuration issues.
#[derive(Debug)]
pub enum ConfigError {
    /// Indicates an error from the underlying `config` crate.
    General(String),
    /// Indicates a required configuration file was not found.
    NotFound(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::General(msg) => write!(f, "Configuration error: {msg}"),
            ConfigError::NotFound(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::General(err.to_string())
    }
}

/// The root configuration structure, mapping directly to `config.yml`.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// The port for the server to listen on. Loaded from `PORT` env var.
    #[serde(default = "default_port")]
    pub port: u16,
    /// The largest accepted upload, in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    /// The AI provider used for extraction.
    pub provider: ProviderConfig,
    #[serde(default)]
    pub extraction: ExtractionSettings,
}

/// Tuning for the extraction call.
#[derive(Debug, Deserialize, Clone)]
pub struct ExtractionSettings {
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Replaces the built-in extraction instruction.
    #[serde(default)]
    pub system_prompt: Option<String>,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            max_input_chars: default_max_input_chars(),
            timeout_secs: default_timeout_secs(),
            system_prompt: None,
        }
    }
}

impl ExtractionSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn to_extraction_config(&self) -> ExtractionConfig {
        ExtractionConfig {
            max_input_chars: self.max_input_chars,
            timeout: self.timeout(),
            system_prompt: self
                .system_prompt
                .clone()
                .filter(|prompt| !prompt.trim().is_empty()),
        }
    }
}

fn default_port() -> u16 {
    9090
}

fn default_max_upload_bytes() -> usize {
    20 * 1024 * 1024
}

fn default_max_input_chars() -> usize {
    DEFAULT_MAX_INPUT_CHARS
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

static ENV_VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{(?P<var>[A-Z0-9_]+)\}").expect("valid placeholder regex"));

// Helper to read a file, substitute env vars, and return its content.
// Returns Ok(None) if the file does not exist, or an error if it fails to read.
fn read_and_substitute(path: &str) -> Result<Option<String>, ConfigError> {
    if !std::path::Path::new(path).exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path)
        .map_err(|e| ConfigError::General(format!("Failed to read config file '{path}': {e}")))?;

    let expanded_content = ENV_VAR_RE.replace_all(&content, |caps: &regex::Captures| {
        let var_name = &caps["var"];
        env::var(var_name).unwrap_or_default()
    });

    Ok(Some(expanded_content.to_string()))
}

/// Finds the main config file: the override, then `config.yml`, then the
/// `config.{AI_PROVIDER}.yml` template.
fn resolve_main_config_path(config_path_override: Option<&str>) -> String {
    if let Some(override_path) = config_path_override {
        return override_path.to_string();
    }

    let base_path = env!("CARGO_MANIFEST_DIR");
    let user_config_path = format!("{base_path}/config.yml");
    if std::path::Path::new(&user_config_path).exists() {
        info!("Loading user-defined configuration from '{user_config_path}'.");
        return user_config_path;
    }

    let provider = env::var("AI_PROVIDER").unwrap_or_else(|_| "gemini".to_string());
    let fallback_path = format!("{base_path}/config.{provider}.yml");
    info!("'{user_config_path}' not found. Falling back to '{fallback_path}' based on AI_PROVIDER='{provider}'.");
    fallback_path
}

/// Returns the first non-empty value among the given environment variables.
fn first_env_value(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| env::var(name).ok())
        .find(|value| !value.trim().is_empty())
}

/// Loads the application configuration from a file and environment variables.
///
/// - Top-level keys like `port` are overridden by `PORT`.
/// - Nested keys are overridden by `TRIALSAGE_...` variables
///   (e.g., `TRIALSAGE_EXTRACTION__MAX_INPUT_CHARS`).
/// - A missing `provider.api_key` falls back to `AI_API_KEY`, then `GOOGLE_API_KEY`.
pub fn get_config(config_path_override: Option<&str>) -> Result<AppConfig, ConfigError> {
    // Layer 1: Programmatic defaults.
    let mut builder = ConfigBuilder::builder()
        .set_default("provider.provider", "gemini")?
        .set_default("provider.model_name", "gemini-2.0-flash")?;

    // Layer 2: Main config file.
    let main_config_path = resolve_main_config_path(config_path_override);
    let main_content = read_and_substitute(&main_config_path)?
        .ok_or_else(|| ConfigError::NotFound(format!("Main config file not found at '{main_config_path}'. Please ensure 'config.yml' exists or your AI_PROVIDER is set to load a valid template ('local' or 'gemini').")))?;
    builder = builder.add_source(File::from_str(&main_content, FileFormat::Yaml));

    let settings = builder
        // Layer 3: Load environment variables for top-level keys like PORT.
        .add_source(Environment::default())
        // Layer 4: Load prefixed environment variables for deeper overrides.
        .add_source(
            Environment::with_prefix("TRIALSAGE")
                .prefix_separator("_")
                .try_parsing(true)
                .separator("__"),
        )
        .build()?;

    let mut config: AppConfig = settings.try_deserialize()?;

    // Empty substitutions such as `api_key: "${AI_API_KEY}"` mean "not set".
    config.provider.api_key = config
        .provider
        .api_key
        .filter(|key| !key.trim().is_empty())
        .or_else(|| first_env_value(&["AI_API_KEY", "GOOGLE_API_KEY"]));
    config.provider.api_url = config
        .provider
        .api_url
        .filter(|url| !url.trim().is_empty());

    Ok(config)
}
