//! # Export Formats
//!
//! Serializes an `ExtractionResult` for download: a labeled plain-text summary
//! or pretty JSON with the exact field names.

use crate::types::ExtractionResult;
use std::fmt::Write;
use std::str::FromStr;

/// The download formats offered after an extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Text,
    Json,
}

impl ExportFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Text => "text/plain; charset=utf-8",
            ExportFormat::Json => "application/json",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Text => "txt",
            ExportFormat::Json => "json",
        }
    }

    /// The download file name for a given stem, e.g. `trial_summary.json`.
    pub fn file_name(&self, stem: &str) -> String {
        format!("{stem}.{}", self.extension())
    }

    /// Renders a result in this format.
    pub fn render(&self, result: &ExtractionResult) -> Result<String, serde_json::Error> {
        match self {
            ExportFormat::Text => Ok(to_text(result)),
            ExportFormat::Json => to_json(result),
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "txt" | "text" => Ok(ExportFormat::Text),
            "json" => Ok(ExportFormat::Json),
            other => Err(format!(
                "Unsupported export format '{other}'. Use 'txt' or 'json'."
            )),
        }
    }
}

fn write_list(out: &mut String, label: &str, items: &[String]) {
    let _ = writeln!(out, "{label}:");
    for item in items {
        let _ = writeln!(out, "- {item}");
    }
}

/// Formats a result as a labeled plain-text summary.
pub fn to_text(result: &ExtractionResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Official Title: {}", result.official_title);
    let _ = writeln!(out, "Phase: {}", result.phase);
    let _ = writeln!(out, "Sponsor: {}", result.sponsor);
    let _ = writeln!(out, "Objective: {}", result.objective);
    out.push('\n');
    write_list(&mut out, "Inclusion Criteria", &result.inclusion_criteria);
    out.push('\n');
    write_list(&mut out, "Exclusion Criteria", &result.exclusion_criteria);
    out.push('\n');
    write_list(&mut out, "Primary Endpoints", &result.primary_endpoints);
    out.push('\n');
    write_list(&mut out, "Secondary Endpoints", &result.secondary_endpoints);
    out
}

/// Formats a result as pretty-printed JSON.
pub fn to_json(result: &ExtractionResult) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(result)
}

/// Reads a result back from JSON. Absent fields take the marker; present
/// values are kept as written, so callers handling outside input should
/// follow up with [`ExtractionResult::normalized`].
pub fn from_json(json: &str) -> Result<ExtractionResult, serde_json::Error> {
    serde_json::from_str(json)
}
