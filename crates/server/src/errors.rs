use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{error, warn};
use trialsage::{ExtractionError, LoadError, PromptError};
use trialsage_pdf::PdfLoadError;

/// A custom error type for the server application.
///
/// This enum encapsulates different kinds of errors that can occur within the server,
/// allowing them to be converted into appropriate HTTP responses. The HTML routes
/// render the same message on the form page.
#[derive(Debug)]
pub enum AppError {
    /// The upload or pasted text could not be turned into text.
    Load(LoadError),
    /// The extraction round trip failed.
    Extraction(ExtractionError),
    /// A PDF could not be converted to text.
    Convert(PdfLoadError),
    /// The request itself was malformed.
    BadRequest(String),
    /// Generic internal server errors.
    Internal(anyhow::Error),
}

impl From<LoadError> for AppError {
    fn from(err: LoadError) -> Self {
        AppError::Load(err)
    }
}

impl From<ExtractionError> for AppError {
    fn from(err: ExtractionError) -> Self {
        AppError::Extraction(err)
    }
}

impl From<PdfLoadError> for AppError {
    fn from(err: PdfLoadError) -> Self {
        AppError::Convert(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

fn prompt_error_status(err: &PromptError) -> (StatusCode, String) {
    match err {
        PromptError::Unauthorized(_) => (
            StatusCode::BAD_GATEWAY,
            "The AI provider rejected the API key (authentication failed). Check AI_API_KEY."
                .to_string(),
        ),
        PromptError::RateLimited(_) => (
            StatusCode::TOO_MANY_REQUESTS,
            "The AI provider's rate limit was reached. Please wait a moment and try again."
                .to_string(),
        ),
        PromptError::AiRequest(e) => (
            StatusCode::BAD_GATEWAY,
            format!("Request to AI provider failed: {e}"),
        ),
        PromptError::AiDeserialization(e) => (
            StatusCode::BAD_GATEWAY,
            format!("Failed to deserialize AI provider response: {e}"),
        ),
        PromptError::AiApi { status, .. } => (
            StatusCode::BAD_GATEWAY,
            format!("AI provider error (status {status})."),
        ),
        PromptError::MissingApiKey(_)
        | PromptError::MissingApiUrl(_)
        | PromptError::UnsupportedProvider(_)
        | PromptError::MissingAiProvider
        | PromptError::InvalidConfig(_)
        | PromptError::ReqwestClientBuild(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Server is not configured correctly.".to_string(),
        ),
    }
}

impl AppError {
    /// The HTTP status and the human-readable message for this error.
    pub fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            AppError::Load(err @ LoadError::UnsupportedFormat(_)) => {
                (StatusCode::UNSUPPORTED_MEDIA_TYPE, err.to_string())
            }
            AppError::Load(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            AppError::Extraction(ExtractionError::EmptyInput) => (
                StatusCode::BAD_REQUEST,
                ExtractionError::EmptyInput.to_string(),
            ),
            AppError::Extraction(ExtractionError::Provider(err)) => prompt_error_status(err),
            AppError::Extraction(err @ ExtractionError::Timeout(_)) => {
                (StatusCode::GATEWAY_TIMEOUT, err.to_string())
            }
            AppError::Extraction(err @ ExtractionError::Cancelled) => {
                (StatusCode::SERVICE_UNAVAILABLE, err.to_string())
            }
            AppError::Convert(err @ PdfLoadError::TooManyCidCodes(_)) => {
                (StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
            }
            AppError::Convert(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "An internal server error occurred.".to_string(),
            ),
        }
    }

    /// Logs the underlying error at a level matching its status.
    pub fn log(&self) {
        match self {
            AppError::Internal(err) => error!("Internal server error: {:?}", err),
            AppError::Extraction(ExtractionError::Provider(err)) => {
                error!("PromptError: {:?}", err)
            }
            other => warn!("Request failed: {:?}", other),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.log();
        let (status_code, error_message) = self.status_and_message();

        let body = Json(json!({
            "error": error_message,
        }));

        (status_code, body).into_response()
    }
}
