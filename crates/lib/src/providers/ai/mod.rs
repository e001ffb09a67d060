pub mod gemini;
pub mod local;

use crate::errors::PromptError;
use async_trait::async_trait;
use dyn_clone::DynClone;
use reqwest::{Response, StatusCode};
use std::fmt::Debug;

/// A trait for interacting with an AI provider.
///
/// This trait defines a common interface for sending a system instruction and
/// a user prompt to different Large Language Models (e.g., Gemini, local models).
#[async_trait]
pub trait AiProvider: Send + Sync + Debug + DynClone {
    /// Generates a response from a given system and user prompt.
    ///
    /// The result should be a string containing the AI's response.
    async fn generate(&self, system_prompt: &str, user_prompt: &str)
        -> Result<String, PromptError>;
}

dyn_clone::clone_trait_object!(AiProvider);

/// Maps a non-success HTTP response to the matching `PromptError`.
pub(crate) async fn error_from_response(response: Response) -> PromptError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PromptError::Unauthorized(body),
        StatusCode::TOO_MANY_REQUESTS => PromptError::RateLimited(body),
        _ => PromptError::AiApi {
            status: status.as_u16(),
            body,
        },
    }
}
