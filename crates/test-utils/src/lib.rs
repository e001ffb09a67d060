use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use trialsage::errors::PromptError;
use trialsage::providers::ai::AiProvider;

// --- Mock AI Provider ---

#[derive(Clone, Debug)]
pub struct MockAiProvider {
    responses: Arc<Mutex<HashMap<String, String>>>,
    default_response: Arc<Mutex<Option<String>>>,
    error_status: Arc<Mutex<Option<u16>>>,
    delay: Arc<Mutex<Option<Duration>>>,
    calls: Arc<Mutex<Vec<(String, String)>>>,
}

impl MockAiProvider {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(HashMap::new())),
            default_response: Arc::new(Mutex::new(None)),
            error_status: Arc::new(Mutex::new(None)),
            delay: Arc::new(Mutex::new(None)),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A mock that answers every prompt with the same response.
    pub fn with_response(response: &str) -> Self {
        let mock = Self::new();
        mock.set_default_response(response);
        mock
    }

    /// Pre-programs a response for a specific prompt.
    /// The key should be a unique substring of the system prompt.
    pub fn add_response(&self, key: &str, response: &str) {
        let mut responses = self.responses.lock().unwrap();
        responses.insert(key.to_string(), response.to_string());
    }

    /// The response used when no keyed response matches.
    pub fn set_default_response(&self, response: &str) {
        *self.default_response.lock().unwrap() = Some(response.to_string());
    }

    /// Makes every call fail as if the provider answered with this HTTP status.
    pub fn set_error_status(&self, status: u16) {
        *self.error_status.lock().unwrap() = Some(status);
    }

    /// Delays every response, for timeout and cancellation tests.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Retrieves the recorded calls for assertion.
    pub fn get_calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for MockAiProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AiProvider for MockAiProvider {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, PromptError> {
        self.calls
            .lock()
            .unwrap()
            .push((system_prompt.to_string(), user_prompt.to_string()));

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let error_status = *self.error_status.lock().unwrap();
        if let Some(status) = error_status {
            let body = format!("MockAiProvider: programmed failure with status {status}");
            return Err(match status {
                401 | 403 => PromptError::Unauthorized(body),
                429 => PromptError::RateLimited(body),
                _ => PromptError::AiApi { status, body },
            });
        }

        {
            let responses = self.responses.lock().unwrap();
            for (key, response) in responses.iter() {
                if system_prompt.contains(key) {
                    return Ok(response.clone());
                }
            }
        }

        if let Some(response) = self.default_response.lock().unwrap().clone() {
            return Ok(response);
        }

        Err(PromptError::AiApi {
            status: 500,
            body: format!(
                "MockAiProvider: No response programmed for system prompt. Got: '{system_prompt}'"
            ),
        })
    }
}

// --- Test-Specific Helpers ---
#[cfg(feature = "pdf")]
pub mod helpers {
    use anyhow::Result;
    use printpdf::{
        BuiltinFont, Layer, Mm, Op, ParsedFont, PdfDocument, PdfPage, PdfSaveOptions, Pt, TextItem,
        TextMatrix, TextRenderingMode,
    };

    /// Generates a simple, single-page PDF with the given text content, compatible with printpdf v0.8.2.
    pub fn generate_test_pdf(text: &str) -> Result<Vec<u8>> {
        generate_test_pdf_pages(&[text])
    }

    /// Generates a PDF with one page per entry. Each line of an entry is
    /// written as its own text run.
    pub fn generate_test_pdf_pages(pages: &[&str]) -> Result<Vec<u8>> {
        let mut doc = PdfDocument::new("Test Protocol");
        let layer_def = Layer::new("Layer 1");
        let layer_id = doc.add_layer(&layer_def);

        // Get the font bytes for a built-in font and parse it.
        let font_bytes = BuiltinFont::Helvetica.get_subset_font().bytes;
        let font = ParsedFont::from_bytes(&font_bytes, 0, &mut Vec::new())
            .ok_or_else(|| anyhow::anyhow!("Failed to parse built-in font"))?;
        let font_id = doc.add_font(&font);

        for text in pages {
            let mut ops = vec![Op::BeginLayer {
                layer_id: layer_id.clone(),
            }];
            for (index, line) in text.lines().enumerate() {
                let y = 280.0 - 7.0 * index as f32;
                ops.extend([
                    Op::StartTextSection,
                    Op::SetFontSize {
                        size: Pt(12.0),
                        font: font_id.clone(),
                    },
                    Op::SetTextMatrix {
                        matrix: TextMatrix::Translate(Mm(10.0).into(), Mm(y).into()),
                    },
                    Op::SetTextRenderingMode {
                        mode: TextRenderingMode::Fill,
                    },
                    Op::WriteText {
                        items: vec![TextItem::Text(line.to_string())],
                        font: font_id.clone(),
                    },
                    Op::EndTextSection,
                ]);
            }
            ops.push(Op::EndLayer {
                layer_id: layer_id.clone(),
            });

            let mut page = PdfPage::new(Mm(210.0), Mm(297.0), vec![]);
            page.ops = ops;
            doc.pages.push(page);
        }

        let mut warnings = Vec::new();
        let bytes = doc.save(&PdfSaveOptions::default(), &mut warnings);
        if !warnings.is_empty() {
            // In a test context, it's fine to just print warnings.
            eprintln!("PDF generation warnings: {warnings:?}");
        }

        Ok(bytes)
    }
}
