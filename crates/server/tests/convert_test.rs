//! # PDF Conversion Tests
//!
//! `/convert` downloads the repaired text of an uploaded PDF, and PDF uploads
//! to the extraction routes go through the same text layer.

mod common;

use anyhow::Result;
use common::{TestApp, COMPLETE_RESPONSE};
use reqwest::{
    header,
    multipart::{Form, Part},
    StatusCode,
};
use trialsage_test_utils::helpers::{generate_test_pdf, generate_test_pdf_pages};

fn pdf_form(name: &str, bytes: Vec<u8>) -> Result<Form> {
    let part = Part::bytes(bytes)
        .file_name(name.to_string())
        .mime_str("application/pdf")?;
    Ok(Form::new().part("file", part))
}

#[tokio::test]
async fn test_convert_downloads_page_text() -> Result<()> {
    // Arrange
    let app = TestApp::spawn().await?;
    let pdf = generate_test_pdf_pages(&["Study Synopsis", "Eligibility Criteria"])?;

    // Act
    let response = app
        .client
        .post(app.url("/convert"))
        .multipart(pdf_form("TS-001 protocol.pdf", pdf)?)
        .send()
        .await?;

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"TS-001 protocol.txt\""
    );
    let text = response.text().await?;
    assert!(text.contains("--- Page 1 ---"));
    assert!(text.contains("--- Page 2 ---"));
    Ok(())
}

#[tokio::test]
async fn test_convert_rejects_non_pdf() -> Result<()> {
    // Arrange
    let app = TestApp::spawn().await?;
    let part = Part::bytes(b"plain text".to_vec()).file_name("notes.txt");
    let form = Form::new().part("file", part);

    // Act
    let response = app
        .client
        .post(app.url("/convert"))
        .multipart(form)
        .send()
        .await?;

    // Assert
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let html = response.text().await?;
    assert!(html.contains("is not a PDF file"));
    Ok(())
}

#[tokio::test]
async fn test_convert_without_file_asks_for_upload() -> Result<()> {
    // Arrange
    let app = TestApp::spawn().await?;
    let form = Form::new().text("text", "some pasted text");

    // Act
    let response = app
        .client
        .post(app.url("/convert"))
        .multipart(form)
        .send()
        .await?;

    // Assert
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let html = response.text().await?;
    assert!(html.contains("Please upload a PDF file to convert."));
    Ok(())
}

#[tokio::test]
async fn test_convert_rejects_corrupt_pdf() -> Result<()> {
    // Arrange
    let app = TestApp::spawn().await?;

    // Act
    let response = app
        .client
        .post(app.url("/convert"))
        .multipart(pdf_form("broken.pdf", b"%PDF-1.4 truncated".to_vec())?)
        .send()
        .await?;

    // Assert
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn test_pdf_upload_is_extracted() -> Result<()> {
    // Arrange
    let app = TestApp::spawn().await?;
    let mock = app.mock_server.mock(|when, then| {
        when.method(httpmock::Method::POST)
            .path(common::CHAT_PATH)
            .body_contains("--- Page 1 ---");
        then.status(200).json_body(serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": COMPLETE_RESPONSE}}]
        }));
    });
    let pdf = generate_test_pdf("A Phase 3 Study of Drug X")?;

    // Act
    let response = app
        .client
        .post(app.url("/api/extract/file"))
        .multipart(pdf_form("protocol.pdf", pdf)?)
        .send()
        .await?;

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    mock.assert();
    Ok(())
}

#[tokio::test]
async fn test_convert_undecodable_font_is_unprocessable() -> Result<()> {
    // Arrange
    let app = TestApp::spawn().await?;
    let glyphs = "(cid:9999)".repeat(4);
    let page = format!("Dose {glyphs}\nVisit {glyphs}\nWeek {glyphs}");
    let pdf = generate_test_pdf(&page)?;

    // Act
    let response = app
        .client
        .post(app.url("/convert"))
        .multipart(pdf_form("encoded.pdf", pdf)?)
        .send()
        .await?;

    // Assert
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let html = response.text().await?;
    assert!(html.contains("could not be decoded"));
    assert!(html.contains("Suggestions:"));
    Ok(())
}

