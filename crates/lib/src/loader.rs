//! # Document Loader
//!
//! Turns an uploaded file or pasted text into one UTF-8 string. Plain text
//! and Markdown are handled here; binary formats are provided by plugin crates
//! (e.g. `trialsage-pdf`) that implement [`DocumentLoader`] and are registered
//! in a [`DocumentLoaders`] set.

use crate::errors::LoadError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, instrument};

/// The file formats a protocol can be uploaded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    Pdf,
    Text,
    Markdown,
}

impl DocumentFormat {
    /// Detects the format from a file name's extension, ignoring case.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let extension = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "pdf" => Some(Self::Pdf),
            "txt" => Some(Self::Text),
            "md" | "markdown" => Some(Self::Markdown),
            _ => None,
        }
    }

    /// Detects the format from a MIME type such as `application/pdf`.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or("").trim();
        match essence.to_ascii_lowercase().as_str() {
            "application/pdf" => Some(Self::Pdf),
            "text/plain" => Some(Self::Text),
            "text/markdown" | "text/x-markdown" => Some(Self::Markdown),
            _ => None,
        }
    }
}

/// The input a user submitted: an uploaded file or pasted text.
#[derive(Debug, Clone)]
pub enum DocumentSource {
    File {
        name: String,
        content_type: Option<String>,
        bytes: Vec<u8>,
    },
    Pasted(String),
}

impl DocumentSource {
    /// A short label for logs and debug output.
    pub fn label(&self) -> &str {
        match self {
            DocumentSource::File { name, .. } => name,
            DocumentSource::Pasted(_) => "pasted text",
        }
    }

    /// The detected format, or an `UnsupportedFormat` error naming the file.
    pub fn format(&self) -> Result<DocumentFormat, LoadError> {
        match self {
            DocumentSource::Pasted(_) => Ok(DocumentFormat::Text),
            DocumentSource::File {
                name, content_type, ..
            } => DocumentFormat::from_file_name(name)
                .or_else(|| content_type.as_deref().and_then(DocumentFormat::from_mime))
                .ok_or_else(|| LoadError::UnsupportedFormat(name.clone())),
        }
    }
}

/// A loader for one binary or text format.
pub trait DocumentLoader: Send + Sync {
    /// The format this loader reads.
    fn format(&self) -> DocumentFormat;

    /// Extracts the text of a document.
    fn load(&self, bytes: &[u8]) -> Result<String, LoadError>;
}

/// Loads `.txt` and `.md` files as strict UTF-8.
#[derive(Debug, Clone, Copy)]
pub struct TextLoader {
    format: DocumentFormat,
}

impl TextLoader {
    pub fn plain() -> Self {
        Self {
            format: DocumentFormat::Text,
        }
    }

    pub fn markdown() -> Self {
        Self {
            format: DocumentFormat::Markdown,
        }
    }
}

impl DocumentLoader for TextLoader {
    fn format(&self) -> DocumentFormat {
        self.format
    }

    fn load(&self, bytes: &[u8]) -> Result<String, LoadError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| LoadError::Unreadable(format!("the file is not valid UTF-8 ({e})")))?;
        Ok(strip_bom(text).to_string())
    }
}

fn strip_bom(text: &str) -> &str {
    text.strip_prefix('\u{feff}').unwrap_or(text)
}

/// The set of loaders available to a front end, keyed by format.
pub struct DocumentLoaders {
    loaders: HashMap<DocumentFormat, Box<dyn DocumentLoader>>,
}

impl Default for DocumentLoaders {
    /// A set with the built-in text and Markdown loaders.
    fn default() -> Self {
        Self::empty()
            .with_loader(Box::new(TextLoader::plain()))
            .with_loader(Box::new(TextLoader::markdown()))
    }
}

impl std::fmt::Debug for DocumentLoaders {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentLoaders")
            .field("formats", &self.formats())
            .finish()
    }
}

impl DocumentLoaders {
    /// A set with no loaders registered.
    pub fn empty() -> Self {
        Self {
            loaders: HashMap::new(),
        }
    }

    /// Registers a loader, replacing any previous loader for the same format.
    pub fn with_loader(mut self, loader: Box<dyn DocumentLoader>) -> Self {
        self.loaders.insert(loader.format(), loader);
        self
    }

    pub fn formats(&self) -> Vec<DocumentFormat> {
        self.loaders.keys().copied().collect()
    }

    pub fn supports(&self, format: DocumentFormat) -> bool {
        self.loaders.contains_key(&format)
    }

    /// Produces the text of a document.
    ///
    /// Fails with `UnsupportedFormat` for unknown or unregistered formats and
    /// with `EmptyInput` when the document contains no visible text.
    #[instrument(skip(self, source), fields(source = %source.label()))]
    pub fn load(&self, source: &DocumentSource) -> Result<String, LoadError> {
        let text = match source {
            DocumentSource::Pasted(text) => strip_bom(text).to_string(),
            DocumentSource::File { name, bytes, .. } => {
                let format = source.format()?;
                let loader = self
                    .loaders
                    .get(&format)
                    .ok_or_else(|| LoadError::UnsupportedFormat(name.clone()))?;
                if bytes.is_empty() {
                    return Err(LoadError::EmptyInput);
                }
                loader.load(bytes)?
            }
        };

        if text.trim().is_empty() {
            return Err(LoadError::EmptyInput);
        }
        info!("Loaded {} characters.", text.chars().count());
        Ok(text)
    }
}
