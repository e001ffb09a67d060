//! # HTML Page Handlers
//!
//! The upload form, the result view, the download routes and the PDF
//! conversion route. Errors are shown on the form page instead of as JSON.

use super::{
    api::{export_attachment, parse_export_format},
    attachment, extract_document, read_submission, AppError, AppState, Extracted,
};
use crate::types::{ExportForm, TextRequest};
use askama::Template;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Form,
};
use axum_extra::extract::Multipart;
use std::path::Path as FsPath;
use tracing::{error, info};
use trialsage::{
    cleanup::{detect_text_issues, repair_text},
    export::{from_json, to_json, to_text},
    DocumentFormat, DocumentSource, ExtractionResult,
};

// ============================================================
// TEMPLATES
// ============================================================

#[derive(Template, Default)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub text: String,
    pub error: Option<String>,
    pub notice: Option<String>,
}

#[derive(Template)]
#[template(path = "result.html")]
pub struct ResultTemplate {
    pub result: ExtractionResult,
    pub plain_text: String,
    pub result_json: String,
    pub missing: Vec<&'static str>,
    pub issues: Vec<String>,
    pub truncated: bool,
    pub source_label: String,
}

/// The label shown to users for a field's JSON name.
fn field_label(name: &str) -> &'static str {
    match name {
        "officialTitle" => "Official Title",
        "phase" => "Phase",
        "sponsor" => "Sponsor",
        "objective" => "Objective",
        "inclusionCriteria" => "Inclusion Criteria",
        "exclusionCriteria" => "Exclusion Criteria",
        "primaryEndpoints" => "Primary Endpoints",
        "secondaryEndpoints" => "Secondary Endpoints",
        _ => "Unknown field",
    }
}

impl ResultTemplate {
    fn from_extracted(extracted: Extracted, source_label: String) -> Result<Self, AppError> {
        let result = extracted.outcome.result;
        let result_json = to_json(&result)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to serialize result: {e}")))?;
        Ok(Self {
            plain_text: to_text(&result),
            missing: result
                .missing_fields()
                .into_iter()
                .map(field_label)
                .collect(),
            issues: extracted.issues.iter().map(ToString::to_string).collect(),
            truncated: extracted.outcome.truncated,
            result_json,
            result,
            source_label,
        })
    }
}

/// Renders a template, falling back to a plain error page if rendering fails.
fn render<T: Template>(status: StatusCode, template: &T) -> Response {
    match template.render() {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            error!("Template error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(format!("Template error: {e}")),
            )
                .into_response()
        }
    }
}

/// Shows an error on the form page, keeping any pasted text.
fn render_form_error(err: AppError, text: String) -> Response {
    err.log();
    let (status, message) = err.status_and_message();
    render(
        status,
        &IndexTemplate {
            text,
            error: Some(message),
            notice: None,
        },
    )
}

// ============================================================
// HANDLERS
// ============================================================

/// The handler for `GET /`, the upload form.
pub async fn index_page() -> Response {
    render(StatusCode::OK, &IndexTemplate::default())
}

/// The handler for `POST /extract`, which renders the result page.
pub async fn extract_page(State(app_state): State<AppState>, multipart: Multipart) -> Response {
    let submission = match read_submission(multipart).await {
        Ok(submission) => submission,
        Err(e) => return render_form_error(e, String::new()),
    };
    let pasted = submission.text.clone();
    let source = submission.into_source();
    let source_label = source.label().to_string();

    let page = match extract_document(&app_state, source).await {
        Ok(extracted) => ResultTemplate::from_extracted(extracted, source_label),
        Err(e) => Err(e),
    };
    match page {
        Ok(page) => render(StatusCode::OK, &page),
        Err(e) => render_form_error(e, pasted),
    }
}

/// The handler for `POST /export/{format}`. The result arrives as JSON in a form field.
pub async fn export_page(
    Path(format): Path<String>,
    Form(form): Form<ExportForm>,
) -> Result<Response, AppError> {
    let format = parse_export_format(&format)?;
    let result = from_json(&form.result)
        .map_err(|e| AppError::BadRequest(format!("Invalid result data: {e}")))?
        .normalized();
    info!("Exporting result as {:?}.", format);
    export_attachment(format, &result)
}

/// The handler for `POST /convert`, which downloads a PDF's repaired text.
pub async fn convert_page(multipart: Multipart) -> Response {
    match convert_upload(multipart).await {
        Ok(response) => response,
        Err(e) => render_form_error(e, String::new()),
    }
}

async fn convert_upload(multipart: Multipart) -> Result<Response, AppError> {
    let submission = read_submission(multipart).await?;
    let Some(DocumentSource::File { name, bytes, .. }) = submission.file else {
        return Err(AppError::BadRequest(
            "Please upload a PDF file to convert.".to_string(),
        ));
    };
    if DocumentFormat::from_file_name(&name) != Some(DocumentFormat::Pdf) {
        return Err(AppError::BadRequest(format!(
            "'{name}' is not a PDF file. Only PDF files can be converted."
        )));
    }

    let text = tokio::task::spawn_blocking(move || trialsage_pdf::convert_pdf_to_text(&bytes))
        .await
        .map_err(anyhow::Error::from)??;

    let stem = FsPath::new(&name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("converted");
    info!("Converted '{}' to {} characters of text.", name, text.len());
    Ok(attachment(
        "text/plain; charset=utf-8",
        &format!("{stem}.txt"),
        text,
    ))
}

/// The handler for `POST /repair`, the form's "Fix text issues" button.
pub async fn repair_page(Form(form): Form<TextRequest>) -> Response {
    let issues = detect_text_issues(&form.text);
    let notice = if issues.is_empty() {
        "No text issues found.".to_string()
    } else {
        let labels: Vec<String> = issues.iter().map(ToString::to_string).collect();
        format!("Fixed: {}", labels.join(", "))
    };
    render(
        StatusCode::OK,
        &IndexTemplate {
            text: repair_text(&form.text),
            error: None,
            notice: Some(notice),
        },
    )
}
