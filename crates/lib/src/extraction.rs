//! # Extraction Client
//!
//! Sends one protocol to the configured `AiProvider` and parses the reply into
//! an [`ExtractionResult`]. Every call is an independent round trip: the only
//! state is the immutable provider and [`ExtractionConfig`] held by the client.

use crate::{
    errors::{ExtractionError, PromptError},
    parse::parse_extraction,
    prompts::extraction::{EXTRACTION_SYSTEM_PROMPT, EXTRACTION_USER_PROMPT, TRUNCATION_NOTICE},
    providers::ai::AiProvider,
    types::{ExtractionConfig, ExtractionResult, RequestContext},
};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// A client that extracts trial fields from protocol text.
#[derive(Debug, Clone)]
pub struct ExtractionClient {
    pub ai_provider: Box<dyn AiProvider>,
    pub config: ExtractionConfig,
}

/// A builder for creating an `ExtractionClient`.
#[derive(Default)]
pub struct ExtractionClientBuilder {
    ai_provider: Option<Box<dyn AiProvider>>,
    config: ExtractionConfig,
}

impl ExtractionClientBuilder {
    /// Creates a new `ExtractionClientBuilder` with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the AI provider for the client.
    pub fn ai_provider(mut self, ai_provider: Box<dyn AiProvider>) -> Self {
        self.ai_provider = Some(ai_provider);
        self
    }

    /// Replaces the whole extraction configuration.
    pub fn config(mut self, config: ExtractionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn max_input_chars(mut self, max_input_chars: usize) -> Self {
        self.config.max_input_chars = max_input_chars;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Builds the `ExtractionClient`.
    ///
    /// Fails with `PromptError::MissingAiProvider` if no provider was set, and
    /// with `PromptError::InvalidConfig` for a zero character budget or timeout.
    pub fn build(self) -> Result<ExtractionClient, PromptError> {
        let ai_provider = self.ai_provider.ok_or(PromptError::MissingAiProvider)?;
        if self.config.max_input_chars == 0 {
            return Err(PromptError::InvalidConfig(
                "max_input_chars must be at least 1".to_string(),
            ));
        }
        if self.config.timeout.is_zero() {
            return Err(PromptError::InvalidConfig(
                "timeout must be greater than zero".to_string(),
            ));
        }
        Ok(ExtractionClient {
            ai_provider,
            config: self.config,
        })
    }
}

/// The two prompts for one protocol, plus what truncation did to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionPrompt {
    pub system: String,
    pub user: String,
    pub truncated: bool,
    /// Length of the protocol before truncation, in characters.
    pub original_chars: usize,
    /// Length of the protocol actually sent, in characters.
    pub kept_chars: usize,
}

/// A parsed result together with the details a debug view reports.
#[derive(Debug, Clone)]
pub struct ExtractionOutcome {
    pub result: ExtractionResult,
    pub request_id: Uuid,
    pub input_chars: usize,
    pub truncated: bool,
}

/// Keeps at most `max_chars` characters from the start of `text`.
///
/// The cut always falls on a character boundary. Returns the kept prefix and
/// whether anything was dropped.
pub fn truncate_to_budget(text: &str, max_chars: usize) -> (&str, bool) {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => (&text[..byte_idx], true),
        None => (text, false),
    }
}

impl ExtractionClient {
    /// Builds the system and user prompts for a protocol.
    pub fn build_prompt(&self, protocol_text: &str) -> ExtractionPrompt {
        let system = self
            .config
            .system_prompt
            .clone()
            .unwrap_or_else(|| EXTRACTION_SYSTEM_PROMPT.to_string());

        let original_chars = protocol_text.chars().count();
        let (kept, truncated) = truncate_to_budget(protocol_text, self.config.max_input_chars);
        let kept_chars = if truncated {
            self.config.max_input_chars
        } else {
            original_chars
        };

        let mut user = EXTRACTION_USER_PROMPT.replace("{protocol_text}", kept);
        if truncated {
            user.push_str(
                &TRUNCATION_NOTICE
                    .replace("{kept_chars}", &kept_chars.to_string())
                    .replace("{total_chars}", &original_chars.to_string()),
            );
        }

        ExtractionPrompt {
            system,
            user,
            truncated,
            original_chars,
            kept_chars,
        }
    }

    /// Extracts the trial fields from a protocol.
    pub async fn extract(
        &self,
        protocol_text: &str,
        ctx: &RequestContext,
    ) -> Result<ExtractionResult, ExtractionError> {
        self.extract_with_details(protocol_text, ctx)
            .await
            .map(|outcome| outcome.result)
    }

    /// Extracts the trial fields and reports how the input was handled.
    ///
    /// The provider call races the context's timeout (or the configured
    /// default) and its cancellation signal. Blank input is rejected before
    /// the provider is contacted.
    #[instrument(skip(self, protocol_text, ctx), fields(request_id = %ctx.request_id))]
    pub async fn extract_with_details(
        &self,
        protocol_text: &str,
        ctx: &RequestContext,
    ) -> Result<ExtractionOutcome, ExtractionError> {
        if protocol_text.trim().is_empty() {
            return Err(ExtractionError::EmptyInput);
        }
        if ctx.is_cancelled() {
            return Err(ExtractionError::Cancelled);
        }

        let prompt = self.build_prompt(protocol_text);
        if prompt.truncated {
            warn!(
                "Protocol truncated from {} to {} characters.",
                prompt.original_chars, prompt.kept_chars
            );
        }
        info!(
            "Requesting extraction for {} characters of protocol text.",
            prompt.kept_chars
        );
        debug!(system_prompt = %prompt.system, user_prompt = %prompt.user, "--> Sending prompts to AI Provider");

        let timeout = ctx.timeout.unwrap_or(self.config.timeout);
        let raw_response = tokio::select! {
            biased;
            _ = ctx.cancelled() => {
                info!("Extraction cancelled before the provider answered.");
                return Err(ExtractionError::Cancelled);
            }
            response = tokio::time::timeout(
                timeout,
                self.ai_provider.generate(&prompt.system, &prompt.user),
            ) => match response {
                Ok(result) => result?,
                Err(_) => {
                    warn!("AI provider did not answer within {:?}.", timeout);
                    return Err(ExtractionError::Timeout(timeout));
                }
            },
        };

        debug!("<-- Raw extraction response: {}", raw_response);
        let result = parse_extraction(&raw_response);
        let missing = result.missing_fields();
        if !missing.is_empty() {
            info!("Model did not find: {}", missing.join(", "));
        }

        Ok(ExtractionOutcome {
            result,
            request_id: ctx.request_id,
            input_chars: prompt.original_chars,
            truncated: prompt.truncated,
        })
    }
}
