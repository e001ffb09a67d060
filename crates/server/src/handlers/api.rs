//! # JSON API Handlers
//!
//! Machine-facing counterparts of the HTML routes. Every success is wrapped in
//! `ApiResponse`, and `?debug=true` adds the request details.

use super::{
    attachment, extract_document, read_submission, wrap_response, ApiResponse, AppError, AppState,
    DebugParams,
};
use crate::types::{RepairResponse, TextRequest};
use axum::{
    extract::{Path, Query, State},
    response::Response,
    Json,
};
use axum_extra::extract::Multipart;
use tracing::info;
use trialsage::{
    cleanup::{detect_text_issues, repair_text},
    DocumentSource, ExportFormat, ExtractionResult,
};

pub(crate) const EXPORT_FILE_STEM: &str = "trial_summary";

/// Parses the `{format}` path segment of the export routes.
pub(crate) fn parse_export_format(format: &str) -> Result<ExportFormat, AppError> {
    format.parse::<ExportFormat>().map_err(AppError::BadRequest)
}

/// Renders an export as a download.
pub(crate) fn export_attachment(
    format: ExportFormat,
    result: &ExtractionResult,
) -> Result<Response, AppError> {
    let body = format
        .render(result)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to serialize result: {e}")))?;
    Ok(attachment(
        format.content_type(),
        &format.file_name(EXPORT_FILE_STEM),
        body,
    ))
}

/// The handler for `POST /api/extract`, which takes pasted protocol text.
pub async fn api_extract_handler(
    State(app_state): State<AppState>,
    debug_params: Query<DebugParams>,
    Json(payload): Json<TextRequest>,
) -> Result<Json<ApiResponse<ExtractionResult>>, AppError> {
    info!(
        "Received extraction request with {} characters of text.",
        payload.text.chars().count()
    );
    let extracted = extract_document(&app_state, DocumentSource::Pasted(payload.text)).await?;
    let debug_info = extracted.debug_info();
    Ok(wrap_response(
        extracted.outcome.result,
        debug_params,
        Some(debug_info),
    ))
}

/// The handler for `POST /api/extract/file`, which takes a multipart upload.
pub async fn api_extract_file_handler(
    State(app_state): State<AppState>,
    debug_params: Query<DebugParams>,
    multipart: Multipart,
) -> Result<Json<ApiResponse<ExtractionResult>>, AppError> {
    let source = read_submission(multipart).await?.into_source();
    info!("Received file extraction request for '{}'.", source.label());
    let extracted = extract_document(&app_state, source).await?;
    let debug_info = extracted.debug_info();
    Ok(wrap_response(
        extracted.outcome.result,
        debug_params,
        Some(debug_info),
    ))
}

/// The handler for `POST /api/export/{format}`.
pub async fn api_export_handler(
    Path(format): Path<String>,
    Json(result): Json<ExtractionResult>,
) -> Result<Response, AppError> {
    let format = parse_export_format(&format)?;
    export_attachment(format, &result.normalized())
}

/// The handler for `POST /api/text/repair`, which applies the repair filters.
pub async fn api_repair_handler(
    Json(payload): Json<TextRequest>,
) -> Result<Json<RepairResponse>, AppError> {
    let issues_fixed = detect_text_issues(&payload.text);
    let text = repair_text(&payload.text);
    info!("Repaired text; issues found: {:?}", issues_fixed);
    Ok(Json(RepairResponse { text, issues_fixed }))
}
