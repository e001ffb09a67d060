//! # Route Handlers
//!
//! This module organizes the Axum route handlers for the `trialsage-server`.
//! `pages` serves the HTML form and result views, `api` the JSON endpoints.
//! The helpers below are shared by both.

pub mod api;
pub mod general;
pub mod pages;

pub use api::*;
pub use general::*;
pub use pages::*;

// Shared items used by multiple handler modules.
use super::{
    errors::AppError,
    state::AppState,
    types::{ApiResponse, DebugParams},
};
use axum::{
    extract::Query,
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::Multipart;
use serde_json::{json, Value};
use tracing::{info, warn};
use trialsage::{
    cleanup::{detect_text_issues, TextIssue},
    DocumentSource, ExtractionOutcome,
};

/// A shared helper function to wrap a successful result in the standard `ApiResponse`
/// format, optionally including debug information if requested.
pub(crate) fn wrap_response<T>(
    result: T,
    debug_params: Query<DebugParams>,
    debug_info: Option<Value>,
) -> Json<ApiResponse<T>> {
    let debug = if debug_params.debug.unwrap_or(false) {
        debug_info
    } else {
        None
    };
    Json(ApiResponse { debug, result })
}

/// A file download with the given content type and file name.
pub(crate) fn attachment(content_type: &str, file_name: &str, body: String) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        body,
    )
        .into_response()
}

/// The fields of a submitted upload form.
#[derive(Debug, Default)]
pub(crate) struct Submission {
    pub file: Option<DocumentSource>,
    pub text: String,
}

impl Submission {
    /// The uploaded file if it has content, otherwise the pasted text.
    pub fn into_source(self) -> DocumentSource {
        match self.file {
            Some(DocumentSource::File {
                name,
                content_type,
                bytes,
            }) if !bytes.is_empty() => DocumentSource::File {
                name,
                content_type,
                bytes,
            },
            _ => DocumentSource::Pasted(self.text),
        }
    }
}

/// Reads the `file` and `text` parts of a multipart form.
pub(crate) async fn read_submission(mut multipart: Multipart) -> Result<Submission, AppError> {
    let mut submission = Submission::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid form data: {e}")))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("").to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Failed to read upload: {e}")))?;
                if !file_name.is_empty() {
                    info!("Received upload '{}' ({} bytes).", file_name, bytes.len());
                    submission.file = Some(DocumentSource::File {
                        name: file_name,
                        content_type,
                        bytes: bytes.to_vec(),
                    });
                }
            }
            "text" => {
                submission.text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Failed to read text: {e}")))?;
            }
            _ => warn!("Ignoring unknown multipart field: {}", name),
        }
    }

    Ok(submission)
}

/// Loads a document off the async runtime; PDF parsing is CPU bound.
pub(crate) async fn load_document(
    app_state: &AppState,
    source: DocumentSource,
) -> Result<String, AppError> {
    let loaders = app_state.loaders.clone();
    let text = tokio::task::spawn_blocking(move || loaders.load(&source))
        .await
        .map_err(anyhow::Error::from)??;
    Ok(text)
}

/// A finished extraction plus what was noticed about its input.
pub(crate) struct Extracted {
    pub outcome: ExtractionOutcome,
    pub issues: Vec<TextIssue>,
}

impl Extracted {
    pub fn debug_info(&self) -> Value {
        json!({
            "request_id": self.outcome.request_id.to_string(),
            "input_chars": self.outcome.input_chars,
            "truncated": self.outcome.truncated,
            "missing_fields": self.outcome.result.missing_fields(),
            "text_issues": self.issues,
        })
    }
}

/// Loads a document and runs one extraction on it. Server shutdown cancels
/// the extraction.
pub(crate) async fn extract_document(
    app_state: &AppState,
    source: DocumentSource,
) -> Result<Extracted, AppError> {
    let text = load_document(app_state, source).await?;
    let issues = detect_text_issues(&text);
    let ctx = app_state.shutdown.context();
    let outcome = app_state.client.extract_with_details(&text, &ctx).await?;
    Ok(Extracted { outcome, issues })
}
