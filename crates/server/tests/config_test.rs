//! # Configuration Tests
//!
//! Loading of the layered configuration: the YAML file with `${VAR}`
//! substitution, the `TRIALSAGE_` overrides and the API key fallbacks.
//! Environment variables are process-global, so every test is `#[serial]`.

use serial_test::serial;
use std::{env, fs};
use tempfile::{tempdir, TempDir};
use trialsage::types::{DEFAULT_MAX_INPUT_CHARS, DEFAULT_TIMEOUT_SECS};
use trialsage_server::config::{get_config, ConfigError};

const ENV_VARS: &[&str] = &[
    "PORT",
    "AI_PROVIDER",
    "AI_API_KEY",
    "AI_MODEL",
    "GOOGLE_API_KEY",
    "LOCAL_AI_API_URL",
    "TRIALSAGE_TEST_KEY",
    "TRIALSAGE_EXTRACTION__MAX_INPUT_CHARS",
    "TRIALSAGE_PROVIDER__MODEL_NAME",
];

fn clear_env_vars() {
    for name in ENV_VARS {
        env::remove_var(name);
    }
}

/// Writes `content` to a `config.yml` in a fresh temp dir.
fn write_config(content: &str) -> (TempDir, String) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.yml");
    fs::write(&path, content).unwrap();
    let path = path.to_str().unwrap().to_string();
    (dir, path)
}

#[test]
#[serial]
fn test_minimal_file_uses_defaults() {
    // Arrange
    clear_env_vars();
    let (_dir, path) = write_config(
        r#"
provider:
  provider: "local"
  api_url: "http://localhost:11434/v1/chat/completions"
  model_name: "llama3"
"#,
    );

    // Act
    let config = get_config(Some(&path)).expect("config should load");

    // Assert
    assert_eq!(config.port, 9090);
    assert_eq!(config.max_upload_bytes, 20 * 1024 * 1024);
    assert_eq!(config.provider.provider, "local");
    assert_eq!(config.provider.model_name, "llama3");
    assert!(config.provider.api_key.is_none());
    assert_eq!(config.extraction.max_input_chars, DEFAULT_MAX_INPUT_CHARS);
    assert_eq!(config.extraction.timeout_secs, DEFAULT_TIMEOUT_SECS);
    assert!(config.extraction.system_prompt.is_none());
}

#[test]
#[serial]
fn test_placeholders_are_substituted_from_env() {
    // Arrange
    clear_env_vars();
    env::set_var("TRIALSAGE_TEST_KEY", "secret-from-env");
    let (_dir, path) = write_config(
        r#"
provider:
  provider: "gemini"
  api_key: "${TRIALSAGE_TEST_KEY}"
  model_name: "gemini-2.0-flash"
"#,
    );

    // Act
    let config = get_config(Some(&path)).expect("config should load");

    // Assert
    assert_eq!(
        config.provider.api_key.as_deref(),
        Some("secret-from-env")
    );
    // An omitted URL stays unset; the factory derives it from the model.
    assert!(config.provider.api_url.is_none());
    clear_env_vars();
}

#[test]
#[serial]
fn test_empty_api_key_falls_back_to_env() {
    // Arrange
    clear_env_vars();
    env::set_var("GOOGLE_API_KEY", "google-key");
    let (_dir, path) = write_config(
        r#"
provider:
  provider: "gemini"
  api_url: ""
  api_key: "${TRIALSAGE_TEST_KEY}"
  model_name: "gemini-2.0-flash"
"#,
    );

    // Act
    let config = get_config(Some(&path)).expect("config should load");

    // Assert
    assert_eq!(config.provider.api_key.as_deref(), Some("google-key"));
    assert!(config.provider.api_url.is_none());

    // AI_API_KEY takes precedence over GOOGLE_API_KEY.
    env::set_var("AI_API_KEY", "ai-key");
    let config = get_config(Some(&path)).expect("config should load");
    assert_eq!(config.provider.api_key.as_deref(), Some("ai-key"));
    clear_env_vars();
}

#[test]
#[serial]
fn test_prefixed_env_vars_override_nested_keys() {
    // Arrange
    clear_env_vars();
    env::set_var("TRIALSAGE_EXTRACTION__MAX_INPUT_CHARS", "5000");
    env::set_var("TRIALSAGE_PROVIDER__MODEL_NAME", "gemini-2.5-pro");
    env::set_var("PORT", "8181");
    let (_dir, path) = write_config(
        r#"
port: 9000
provider:
  provider: "gemini"
  api_key: "file-key"
  model_name: "gemini-2.0-flash"
extraction:
  max_input_chars: 100000
  timeout_secs: 30
"#,
    );

    // Act
    let config = get_config(Some(&path)).expect("config should load");

    // Assert
    assert_eq!(config.port, 8181);
    assert_eq!(config.extraction.max_input_chars, 5000);
    assert_eq!(config.extraction.timeout_secs, 30);
    assert_eq!(config.provider.model_name, "gemini-2.5-pro");
    assert_eq!(config.provider.api_key.as_deref(), Some("file-key"));
    clear_env_vars();
}

#[test]
#[serial]
fn test_extraction_settings_convert_to_client_config() {
    // Arrange
    clear_env_vars();
    let (_dir, path) = write_config(
        r#"
provider:
  provider: "local"
  api_url: "http://localhost:1234/v1/chat/completions"
  model_name: "mock"
extraction:
  max_input_chars: 32000
  timeout_secs: 300
  system_prompt: "   "
"#,
    );

    // Act
    let config = get_config(Some(&path)).expect("config should load");
    let extraction = config.extraction.to_extraction_config();

    // Assert
    assert_eq!(extraction.max_input_chars, 32000);
    assert_eq!(extraction.timeout.as_secs(), 300);
    // A blank prompt means "use the built-in instruction".
    assert!(extraction.system_prompt.is_none());
}

#[test]
#[serial]
fn test_shipped_local_template_loads() {
    // Arrange
    clear_env_vars();
    env::set_var("LOCAL_AI_API_URL", "http://localhost:11434/v1/chat/completions");
    env::set_var("AI_MODEL", "llama3");
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config.local.yml");

    // Act
    let config = get_config(Some(path)).expect("template should load");

    // Assert
    assert_eq!(config.provider.provider, "local");
    assert_eq!(
        config.provider.api_url.as_deref(),
        Some("http://localhost:11434/v1/chat/completions")
    );
    assert_eq!(config.provider.model_name, "llama3");
    assert!(config.provider.api_key.is_none());
    assert_eq!(config.extraction.max_input_chars, 32000);
    clear_env_vars();
}

#[test]
#[serial]
fn test_missing_file_is_reported() {
    // Arrange
    clear_env_vars();

    // Act
    let result = get_config(Some("/definitely/not/here/config.yml"));

    // Assert
    assert!(matches!(result, Err(ConfigError::NotFound(_))));
}
