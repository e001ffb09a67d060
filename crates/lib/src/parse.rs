//! # Extraction Response Parser
//!
//! Maps a model's free-text or near-JSON completion onto the typed
//! [`ExtractionResult`]. Parsing never fails: anything that cannot be matched
//! to a known field is ignored, and any field left unfilled holds the
//! not-found marker.
//!
//! Two strategies are tried in order:
//!
//! 1.  **JSON:** the first JSON object in the response (code fences are
//!     stripped, trailing prose is ignored, and an object cut off mid-value
//!     is closed at its last complete value). Keys are matched case-insensitively, ignoring `_`, `-` and
//!     spaces. The combined `eligibility` and `endpoints` keys used by older
//!     prompts are split into their inclusion/exclusion and primary/secondary
//!     parts when the dedicated keys are absent.
//! 2.  **Labels:** `Label: value` lines and labelled sections followed by
//!     bullet lists, for responses that are not JSON at all. Quotes, commas
//!     and brackets left over from broken JSON are dropped.

use crate::types::ExtractionResult;
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// The schema fields, plus the two legacy combined sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    OfficialTitle,
    Phase,
    Sponsor,
    Objective,
    InclusionCriteria,
    ExclusionCriteria,
    PrimaryEndpoints,
    SecondaryEndpoints,
    Eligibility,
    Endpoints,
}

impl Field {
    fn is_scalar(self) -> bool {
        matches!(
            self,
            Field::OfficialTitle | Field::Phase | Field::Sponsor | Field::Objective
        )
    }

    fn is_legacy(self) -> bool {
        matches!(self, Field::Eligibility | Field::Endpoints)
    }
}

/// Lowercases and drops everything but letters and digits.
fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

fn field_for_key(key: &str) -> Option<Field> {
    let field = match normalize_key(key).as_str() {
        "officialtitle" | "title" | "studytitle" | "protocoltitle" => Field::OfficialTitle,
        "phase" | "trialphase" | "studyphase" => Field::Phase,
        "sponsor" | "primarysponsor" | "studysponsor" => Field::Sponsor,
        "objective" | "objectives" | "primaryobjective" | "studyobjective" => Field::Objective,
        "inclusioncriteria" | "inclusion" => Field::InclusionCriteria,
        "exclusioncriteria" | "exclusion" => Field::ExclusionCriteria,
        "primaryendpoints" | "primaryendpoint" | "primaryoutcomes" | "primaryoutcome"
        | "primaryoutcomemeasures" | "primary" => Field::PrimaryEndpoints,
        "secondaryendpoints" | "secondaryendpoint" | "secondaryoutcomes"
        | "secondaryoutcome" | "secondaryoutcomemeasures" | "secondary" => {
            Field::SecondaryEndpoints
        }
        "eligibility" | "eligibilitycriteria" => Field::Eligibility,
        "endpoints" | "outcomes" | "outcomemeasures" => Field::Endpoints,
        _ => return None,
    };
    Some(field)
}

/// Values collected so far; `None` means the field has not been seen.
#[derive(Debug, Default)]
struct Draft {
    official_title: Option<String>,
    phase: Option<String>,
    sponsor: Option<String>,
    objective: Option<String>,
    inclusion_criteria: Option<Vec<String>>,
    exclusion_criteria: Option<Vec<String>>,
    primary_endpoints: Option<Vec<String>>,
    secondary_endpoints: Option<Vec<String>>,
}

impl Draft {
    fn scalar_mut(&mut self, field: Field) -> Option<&mut Option<String>> {
        match field {
            Field::OfficialTitle => Some(&mut self.official_title),
            Field::Phase => Some(&mut self.phase),
            Field::Sponsor => Some(&mut self.sponsor),
            Field::Objective => Some(&mut self.objective),
            _ => None,
        }
    }

    fn list_mut(&mut self, field: Field) -> Option<&mut Option<Vec<String>>> {
        match field {
            Field::InclusionCriteria => Some(&mut self.inclusion_criteria),
            Field::ExclusionCriteria => Some(&mut self.exclusion_criteria),
            Field::PrimaryEndpoints | Field::Endpoints => Some(&mut self.primary_endpoints),
            Field::SecondaryEndpoints => Some(&mut self.secondary_endpoints),
            _ => None,
        }
    }

    fn set_scalar(&mut self, field: Field, value: String) {
        if let Some(slot) = self.scalar_mut(field) {
            *slot = Some(value);
        }
    }

    fn append_scalar_line(&mut self, field: Field, line: &str) {
        if let Some(slot) = self.scalar_mut(field) {
            match slot {
                Some(existing) if !existing.is_empty() => {
                    existing.push('\n');
                    existing.push_str(line);
                }
                _ => *slot = Some(line.to_string()),
            }
        }
    }

    fn set_list(&mut self, field: Field, items: Vec<String>) {
        if let Some(slot) = self.list_mut(field) {
            *slot = Some(items);
        }
    }

    fn push_items(&mut self, field: Field, items: impl IntoIterator<Item = String>) {
        if let Some(slot) = self.list_mut(field) {
            slot.get_or_insert_with(Vec::new).extend(items);
        }
    }

    fn has_any_list(&self) -> bool {
        self.inclusion_criteria.is_some()
            || self.exclusion_criteria.is_some()
            || self.primary_endpoints.is_some()
            || self.secondary_endpoints.is_some()
    }

    /// Copies over every field that is still unset in `self`.
    fn merge_missing(&mut self, other: Draft) {
        fn fill<T>(slot: &mut Option<T>, value: Option<T>) {
            if slot.is_none() {
                *slot = value;
            }
        }
        fill(&mut self.official_title, other.official_title);
        fill(&mut self.phase, other.phase);
        fill(&mut self.sponsor, other.sponsor);
        fill(&mut self.objective, other.objective);
        fill(&mut self.inclusion_criteria, other.inclusion_criteria);
        fill(&mut self.exclusion_criteria, other.exclusion_criteria);
        fill(&mut self.primary_endpoints, other.primary_endpoints);
        fill(&mut self.secondary_endpoints, other.secondary_endpoints);
    }

    fn finish(self) -> ExtractionResult {
        let defaults = ExtractionResult::default();
        ExtractionResult {
            official_title: self.official_title.unwrap_or(defaults.official_title),
            phase: self.phase.unwrap_or(defaults.phase),
            sponsor: self.sponsor.unwrap_or(defaults.sponsor),
            objective: self.objective.unwrap_or(defaults.objective),
            inclusion_criteria: self
                .inclusion_criteria
                .unwrap_or(defaults.inclusion_criteria),
            exclusion_criteria: self
                .exclusion_criteria
                .unwrap_or(defaults.exclusion_criteria),
            primary_endpoints: self.primary_endpoints.unwrap_or(defaults.primary_endpoints),
            secondary_endpoints: self
                .secondary_endpoints
                .unwrap_or(defaults.secondary_endpoints),
        }
        .normalized()
    }
}

/// Parses a model completion into an `ExtractionResult`. Never fails.
pub fn parse_extraction(raw: &str) -> ExtractionResult {
    let body = strip_code_fences(raw);
    if body.is_empty() {
        warn!("Model returned an empty response; every field is marked as not found.");
        return ExtractionResult::default();
    }

    let draft = match find_json_object(body) {
        Some(object) => {
            debug!("Parsing model response as JSON ({} keys).", object.len());
            draft_from_object(&object, 0)
        }
        None => {
            debug!("Model response is not JSON; falling back to label parsing.");
            draft_from_labels(body, None)
        }
    };
    draft.finish()
}

/// Removes a surrounding Markdown code fence such as ```` ```json ````.
fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. `json`) on the opening fence line.
    let rest = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    rest.trim_end()
        .strip_suffix("```")
        .unwrap_or(rest)
        .trim()
}

/// Finds the first JSON object in a response.
///
/// The object may be followed by prose, and an object cut off by the model's
/// output limit is closed at its last complete value.
fn find_json_object(text: &str) -> Option<Map<String, Value>> {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(text) {
        return Some(map);
    }
    for (start, _) in text.match_indices('{').take(MAX_OBJECT_STARTS) {
        let candidate = &text[start..];
        let mut stream = serde_json::Deserializer::from_str(candidate).into_iter::<Value>();
        match stream.next() {
            Some(Ok(Value::Object(map))) => return Some(map),
            Some(Err(e)) if e.is_eof() => {
                if let Some(map) = close_truncated_object(candidate) {
                    warn!("Model response was cut off; keeping its complete fields.");
                    return Some(map);
                }
            }
            _ => {}
        }
    }
    None
}

const MAX_OBJECT_STARTS: usize = 16;
const MAX_REPAIR_ATTEMPTS: usize = 16;

/// Closes an object that ends mid-value by cutting back to the last point
/// where every open string, array and object can be terminated.
fn close_truncated_object(text: &str) -> Option<Map<String, Value>> {
    let mut closers: Vec<char> = Vec::new();
    // (byte offset to cut at, closers still open at that offset)
    let mut cuts: Vec<(usize, Vec<char>)> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (idx, ch) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
                cuts.push((idx + 1, closers.clone()));
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => closers.push('}'),
            '[' => {
                closers.push(']');
                cuts.push((idx + 1, closers.clone()));
            }
            '}' | ']' => {
                if closers.pop() != Some(ch) || closers.is_empty() {
                    return None;
                }
                cuts.push((idx + 1, closers.clone()));
            }
            ',' => cuts.push((idx, closers.clone())),
            _ => {}
        }
    }

    cuts.iter()
        .rev()
        .take(MAX_REPAIR_ATTEMPTS)
        .find_map(|(end, open)| {
            let mut candidate = text[..*end].trim_end().to_string();
            candidate.extend(open.iter().rev());
            match serde_json::from_str::<Value>(&candidate) {
                Ok(Value::Object(map)) => Some(map),
                _ => None,
            }
        })
}

const MAX_NESTING: usize = 3;

fn draft_from_object(object: &Map<String, Value>, depth: usize) -> Draft {
    let mut draft = Draft::default();
    let mut legacy = Vec::new();
    let mut nested = Vec::new();

    for (key, value) in object {
        match field_for_key(key) {
            Some(field) if field.is_legacy() => legacy.push((field, value)),
            Some(field) if field.is_scalar() => {
                if let Some(text) = value_to_scalar(value) {
                    draft.set_scalar(field, text);
                }
            }
            Some(field) => {
                if let Some(items) = value_to_list(value) {
                    draft.set_list(field, items);
                }
            }
            None => match value {
                Value::Object(inner) if depth < MAX_NESTING => nested.push(inner),
                _ => debug!("Ignoring unknown key in model response: '{}'", key),
            },
        }
    }

    for (field, value) in legacy {
        draft.merge_missing(draft_from_legacy(field, value, depth));
    }
    for inner in nested {
        draft.merge_missing(draft_from_object(inner, depth + 1));
    }
    draft
}

/// Splits a combined `eligibility` or `endpoints` value into its sub-lists.
fn draft_from_legacy(field: Field, value: &Value, depth: usize) -> Draft {
    match value {
        Value::Object(inner) if depth < MAX_NESTING => draft_from_object(inner, depth + 1),
        Value::String(text) => draft_from_labels(text, legacy_default_target(field)),
        Value::Array(items) => {
            let joined = items
                .iter()
                .filter_map(value_to_scalar)
                .collect::<Vec<_>>()
                .join("\n");
            draft_from_labels(&joined, legacy_default_target(field))
        }
        _ => Draft::default(),
    }
}

/// Where lines go before any sub-heading appears in a legacy section.
fn legacy_default_target(field: Field) -> Option<Field> {
    match field {
        Field::Endpoints => Some(Field::PrimaryEndpoints),
        _ => None,
    }
}

fn value_to_scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(value_to_scalar).collect();
            (!parts.is_empty()).then(|| parts.join("; "))
        }
        Value::Null | Value::Object(_) => None,
    }
}

fn value_to_list(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(value_to_scalar)
                .map(|item| clean_item(&item))
                .filter(|item| !item.is_empty())
                .collect(),
        ),
        Value::String(text) => Some(split_list_text(text)),
        Value::Number(_) | Value::Bool(_) => value_to_scalar(value).map(|v| vec![v]),
        Value::Null | Value::Object(_) => None,
    }
}

/// Splits a bulleted or multi-line string into list items.
fn split_list_text(text: &str) -> Vec<String> {
    text.lines()
        .map(clean_item)
        .filter(|item| !item.is_empty())
        .collect()
}

/// Strips a leading bullet or enumeration marker (`-`, `*`, `•`, `1.`, `2)`, `(a)`).
fn strip_bullet(line: &str) -> &str {
    let line = line.trim();
    for marker in ["- ", "* ", "• ", "+ ", "· "] {
        if let Some(rest) = line.strip_prefix(marker) {
            return rest.trim_start();
        }
    }
    if let Some(rest) = line.strip_prefix('(') {
        if let Some(close) = rest.find(')') {
            if close > 0 && close <= 3 && rest[..close].chars().all(|c| c.is_alphanumeric()) {
                return rest[close + 1..].trim_start();
            }
        }
    }
    let marker_len = line
        .char_indices()
        .take_while(|(_, c)| c.is_ascii_digit())
        .count();
    if marker_len > 0 && marker_len <= 3 {
        let rest = &line[marker_len..];
        if let Some(rest) = rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") ")) {
            return rest.trim_start();
        }
    }
    line
}

fn clean_item(line: &str) -> String {
    let item = strip_bullet(line).replace("**", "");
    strip_json_punctuation(&item).to_string()
}

/// Drops the quotes and trailing comma a line keeps when it was cut out of
/// a JSON document.
fn strip_json_punctuation(text: &str) -> &str {
    let text = text.trim().trim_end_matches(',').trim_end();
    text.strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(text)
        .trim()
}

/// True for lines such as `],` or `}` that carry no value.
fn is_json_punctuation(line: &str) -> bool {
    line.chars()
        .all(|c| c.is_whitespace() || matches!(c, '{' | '}' | '[' | ']' | ','))
}

/// The complete string literals in a JSON array fragment such as
/// `["Adults", "Consent"` (an unterminated last literal is dropped).
fn quoted_strings(fragment: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current: Option<String> = None;
    let mut escaped = false;

    for ch in fragment.chars() {
        match current.as_mut() {
            None if ch == '"' => current = Some(String::from('"')),
            None => {}
            Some(literal) => {
                literal.push(ch);
                if escaped {
                    escaped = false;
                } else if ch == '\\' {
                    escaped = true;
                } else if ch == '"' {
                    if let Some(literal) = current.take() {
                        let decoded = serde_json::from_str::<String>(&literal)
                            .unwrap_or_else(|_| literal.trim_matches('"').to_string());
                        items.push(decoded.trim().to_string());
                    }
                }
            }
        }
    }
    items.retain(|item| !item.is_empty());
    items
}

/// Recognises a `Label: value` line or a bare section heading for a known field.
fn split_label(line: &str) -> Option<(Field, String)> {
    let trimmed = line.trim();
    let is_heading = trimmed.starts_with('#');
    let without_bullet = strip_bullet(trimmed.trim_start_matches('#'));
    let is_bold = without_bullet.starts_with("**");
    let plain = without_bullet.replace("**", "").replace("__", "");
    let plain = plain.trim();

    let (label, value) = match plain.find(':') {
        Some(idx) => (&plain[..idx], plain[idx + 1..].trim()),
        None if is_heading || is_bold => (plain, ""),
        None => return None,
    };

    let label = label.trim_matches(|c: char| c.is_whitespace() || matches!(c, '"' | '\'' | '{'));
    let words = label.split_whitespace().count();
    if words == 0 || words > 5 {
        return None;
    }
    let field = field_for_key(label)?;
    Some((field, label_value(field, value)))
}

/// Cleans the text after a label, which may be a JSON value cut out of a
/// malformed object (`"Study X",` or `["Adults", "Consent"`).
fn label_value(field: Field, value: &str) -> String {
    let value = value.trim();
    if value.starts_with('[') {
        let items = quoted_strings(value);
        let separator = if field.is_scalar() { "; " } else { "\n" };
        return items.join(separator);
    }
    if value.starts_with('{') || is_json_punctuation(value) {
        return String::new();
    }
    strip_json_punctuation(value).to_string()
}

fn draft_from_labels(text: &str, default_target: Option<Field>) -> Draft {
    let mut draft = Draft::default();
    let mut target = default_target;

    for line in text.lines() {
        if line.trim().is_empty() {
            // A blank line ends an inline scalar value.
            if let Some(field) = target.filter(|f| f.is_scalar()) {
                if draft.scalar_mut(field).is_some_and(|slot| slot.is_some()) {
                    target = None;
                }
            }
            continue;
        }

        if let Some((field, value)) = split_label(line) {
            if field.is_legacy() {
                // A container heading; its sub-headings pick the real target.
                target = legacy_default_target(field);
                if let Some(field) = target {
                    if !value.is_empty() {
                        draft.push_items(field, split_list_text(&value));
                    }
                }
            } else if field.is_scalar() {
                // Wrapped lines that follow continue the value.
                target = Some(field);
                if !value.is_empty() {
                    draft.set_scalar(field, value);
                }
            } else {
                target = Some(field);
                let items = if value.is_empty() {
                    Vec::new()
                } else {
                    split_list_text(&value)
                };
                draft.push_items(field, items);
            }
            continue;
        }

        if is_json_punctuation(line) {
            continue;
        }
        match target {
            Some(field) if field.is_scalar() => {
                let text = strip_json_punctuation(line);
                if !text.is_empty() {
                    draft.append_scalar_line(field, text);
                }
            }
            Some(field) => {
                let item = clean_item(line);
                if !item.is_empty() {
                    draft.push_items(field, [item]);
                }
            }
            None => {}
        }
    }

    if !draft.has_any_list() && default_target.is_none() {
        debug!("No labelled sections found in the model response.");
    }
    draft
}
