//! # Protocol Extraction Prompts
//!
//! The fixed instruction sent with every protocol. The field names listed here
//! are the contract the response parser in `crate::parse` is written against.

/// The system prompt that defines the exact output shape expected from the model.
pub const EXTRACTION_SYSTEM_PROMPT: &str = r#"You are an expert AI assistant for analyzing clinical trial protocols. Your task is to extract key information from the provided protocol text and return it as a single structured JSON object.

The JSON object MUST have exactly these eight keys: "officialTitle", "phase", "sponsor", "objective", "inclusionCriteria", "exclusionCriteria", "primaryEndpoints", and "secondaryEndpoints".

- officialTitle: the official title of the study, as a string.
- phase: the trial phase (e.g., "Phase 1", "Phase 2/3", "Not Applicable"), as a string.
- sponsor: the primary sponsor of the trial, as a string.
- objective: the study's primary goal or purpose, as a string.
- inclusionCriteria: every inclusion criterion, in document order, as an array of strings.
- exclusionCriteria: every exclusion criterion, in document order, as an array of strings.
- primaryEndpoints: every primary outcome measure, as an array of strings.
- secondaryEndpoints: every secondary outcome measure, as an array of strings.

If a scalar value is missing from the text, use the string "Not specified". If a list is missing, use an array containing only "Not specified".

Your output must be ONLY the valid JSON object. Do not include any other text, explanations, or markdown formatting."#;

/// The user prompt that carries the protocol text.
///
/// Placeholders: `{protocol_text}`
pub const EXTRACTION_USER_PROMPT: &str = r#"# Clinical Trial Protocol
{protocol_text}"#;

/// Appended to the user prompt when the protocol was cut to fit the context budget.
///
/// Placeholders: `{kept_chars}`, `{total_chars}`
pub const TRUNCATION_NOTICE: &str = "\n\n[Protocol truncated: only the first {kept_chars} of {total_chars} characters are shown.]";
