//! # AI Provider Factory
//!
//! Builds a boxed `AiProvider` from a `ProviderConfig`. The server and the CLI
//! both go through here so that they resolve URLs and keys the same way.

use crate::{
    errors::PromptError,
    providers::ai::{gemini::GeminiProvider, local::LocalAiProvider, AiProvider},
};
use serde::Deserialize;
use std::time::Duration;
use tracing::info;

/// The settings for one AI provider instance.
#[derive(Debug, Deserialize, Clone)]
pub struct ProviderConfig {
    /// The type of provider ("gemini" or "local").
    pub provider: String,
    /// The API URL. Optional for Gemini, where it is derived from the model name.
    #[serde(default)]
    pub api_url: Option<String>,
    /// The API key, which can be null for local providers.
    #[serde(default)]
    pub api_key: Option<String>,
    pub model_name: String,
}

/// Creates an AI provider instance from its configuration.
///
/// `timeout` is applied to the underlying HTTP client.
pub fn create_provider(
    config: &ProviderConfig,
    timeout: Option<Duration>,
) -> Result<Box<dyn AiProvider>, PromptError> {
    let api_key = config.api_key.clone().filter(|k| !k.trim().is_empty());

    let provider: Box<dyn AiProvider> = match config.provider.as_str() {
        "gemini" => {
            let api_key = api_key.ok_or_else(|| PromptError::MissingApiKey("gemini".into()))?;
            let api_url = config
                .api_url
                .clone()
                .filter(|u| !u.trim().is_empty())
                .unwrap_or_else(|| GeminiProvider::default_url(&config.model_name));
            info!("Configuring Gemini provider with URL: {}", api_url);
            Box::new(GeminiProvider::new(api_url, api_key, timeout)?)
        }
        "local" => {
            let api_url = config
                .api_url
                .clone()
                .filter(|u| !u.trim().is_empty())
                .ok_or_else(|| PromptError::MissingApiUrl("local".into()))?;
            info!("Configuring Local AI provider with URL: {}", api_url);
            Box::new(LocalAiProvider::new(
                api_url,
                api_key,
                Some(config.model_name.clone()),
                timeout,
            )?)
        }
        other => return Err(PromptError::UnsupportedProvider(other.to_string())),
    };

    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(provider: &str, api_key: Option<&str>) -> ProviderConfig {
        ProviderConfig {
            provider: provider.to_string(),
            api_url: None,
            api_key: api_key.map(String::from),
            model_name: "gemini-2.0-flash".to_string(),
        }
    }

    #[test]
    fn test_gemini_requires_api_key() {
        let result = create_provider(&config("gemini", None), None);
        assert!(matches!(result, Err(PromptError::MissingApiKey(_))));

        let result = create_provider(&config("gemini", Some("  ")), None);
        assert!(matches!(result, Err(PromptError::MissingApiKey(_))));
    }

    #[test]
    fn test_local_requires_url() {
        let result = create_provider(&config("local", None), None);
        assert!(matches!(
            result,
            Err(PromptError::MissingApiUrl(name)) if name == "local"
        ));

        let mut blank_url = config("local", None);
        blank_url.api_url = Some("   ".to_string());
        let result = create_provider(&blank_url, None);
        assert!(matches!(result, Err(PromptError::MissingApiUrl(_))));
    }

    #[test]
    fn test_unknown_provider_is_rejected() {
        let result = create_provider(&config("openai-magic", Some("k")), None);
        assert!(matches!(
            result,
            Err(PromptError::UnsupportedProvider(name)) if name == "openai-magic"
        ));
    }

    #[test]
    fn test_gemini_default_url_uses_model_name() {
        assert_eq!(
            GeminiProvider::default_url("gemini-2.0-flash"),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent"
        );
        assert!(create_provider(&config("gemini", Some("key")), None).is_ok());
    }
}
