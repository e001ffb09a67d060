use std::time::Duration;
use thiserror::Error;

/// Errors raised while talking to an AI provider.
#[derive(Error, Debug)]
pub enum PromptError {
    #[error("Failed to build Reqwest client: {0}")]
    ReqwestClientBuild(reqwest::Error),
    #[error("Failed to send request to AI provider: {0}")]
    AiRequest(reqwest::Error),
    #[error("Failed to deserialize AI provider response: {0}")]
    AiDeserialization(reqwest::Error),
    #[error("AI provider returned an error (status {status}): {body}")]
    AiApi { status: u16, body: String },
    #[error("AI provider rejected the credentials: {0}")]
    Unauthorized(String),
    #[error("AI provider rate limit exceeded: {0}")]
    RateLimited(String),
    #[error("API key is missing for provider '{0}'")]
    MissingApiKey(String),
    #[error("API URL is missing for provider '{0}'")]
    MissingApiUrl(String),
    #[error("Unsupported AI provider type: {0}")]
    UnsupportedProvider(String),
    #[error("An AI provider is required to build the extraction client")]
    MissingAiProvider,
    #[error("Invalid extraction client setting: {0}")]
    InvalidConfig(String),
}

/// Errors raised while turning an upload or pasted text into plain text.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Unsupported file type '{0}'. Please upload a .pdf, .txt, or .md file.")]
    UnsupportedFormat(String),
    #[error("Please enter some protocol text or upload a file.")]
    EmptyInput,
    #[error("The file could not be read: {0}")]
    Unreadable(String),
}

/// Errors raised by a single extraction round trip.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Please enter some protocol text or upload a file.")]
    EmptyInput,
    #[error(transparent)]
    Provider(#[from] PromptError),
    #[error("The AI provider did not answer within {0:?}.")]
    Timeout(Duration),
    #[error("The extraction request was cancelled.")]
    Cancelled,
}
