//! # Core Types
//!
//! The request-scoped data model shared by the loader, the extraction client,
//! the exporters and every front end.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::watch;
use uuid::Uuid;

/// The marker written into any field the model did not provide.
pub const NOT_FOUND: &str = "Not specified";

fn not_found() -> String {
    NOT_FOUND.to_string()
}

fn not_found_list() -> Vec<String> {
    vec![not_found()]
}

/// The structured fields extracted from one clinical trial protocol.
///
/// No field is ever absent: anything the model did not return holds
/// [`NOT_FOUND`] (scalars) or a one-element list containing it (lists).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    #[serde(default = "not_found")]
    pub official_title: String,
    #[serde(default = "not_found")]
    pub phase: String,
    #[serde(default = "not_found")]
    pub sponsor: String,
    #[serde(default = "not_found")]
    pub objective: String,
    #[serde(default = "not_found_list")]
    pub inclusion_criteria: Vec<String>,
    #[serde(default = "not_found_list")]
    pub exclusion_criteria: Vec<String>,
    #[serde(default = "not_found_list")]
    pub primary_endpoints: Vec<String>,
    #[serde(default = "not_found_list")]
    pub secondary_endpoints: Vec<String>,
}

impl Default for ExtractionResult {
    fn default() -> Self {
        Self {
            official_title: not_found(),
            phase: not_found(),
            sponsor: not_found(),
            objective: not_found(),
            inclusion_criteria: not_found_list(),
            exclusion_criteria: not_found_list(),
            primary_endpoints: not_found_list(),
            secondary_endpoints: not_found_list(),
        }
    }
}

/// Returns true if a scalar value carries the not-found marker.
pub fn is_not_found(value: &str) -> bool {
    value.trim().is_empty() || value.trim() == NOT_FOUND
}

fn list_is_not_found(values: &[String]) -> bool {
    values.iter().all(|v| is_not_found(v))
}

impl ExtractionResult {
    /// The JSON names of every field that still holds the not-found marker.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let scalars = [
            ("officialTitle", &self.official_title),
            ("phase", &self.phase),
            ("sponsor", &self.sponsor),
            ("objective", &self.objective),
        ];
        let lists = [
            ("inclusionCriteria", &self.inclusion_criteria),
            ("exclusionCriteria", &self.exclusion_criteria),
            ("primaryEndpoints", &self.primary_endpoints),
            ("secondaryEndpoints", &self.secondary_endpoints),
        ];

        scalars
            .into_iter()
            .filter(|(_, v)| is_not_found(v))
            .map(|(name, _)| name)
            .chain(
                lists
                    .into_iter()
                    .filter(|(_, v)| list_is_not_found(v))
                    .map(|(name, _)| name),
            )
            .collect()
    }

    /// Whether the model supplied every field.
    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }

    /// Restores the marker invariant after deserializing or parsing:
    /// blank scalars become the marker, blank list entries are dropped and
    /// empty lists become the one-element marker list.
    pub fn normalized(mut self) -> Self {
        for scalar in [
            &mut self.official_title,
            &mut self.phase,
            &mut self.sponsor,
            &mut self.objective,
        ] {
            let trimmed = scalar.trim();
            *scalar = if trimmed.is_empty() {
                not_found()
            } else {
                trimmed.to_string()
            };
        }
        for list in [
            &mut self.inclusion_criteria,
            &mut self.exclusion_criteria,
            &mut self.primary_endpoints,
            &mut self.secondary_endpoints,
        ] {
            let cleaned: Vec<String> = list
                .iter()
                .map(|item| item.trim())
                .filter(|item| !item.is_empty() && *item != NOT_FOUND)
                .map(str::to_string)
                .collect();
            *list = if cleaned.is_empty() {
                not_found_list()
            } else {
                cleaned
            };
        }
        self
    }
}

/// Explicit configuration handed to the `ExtractionClient` at construction.
#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    /// The context budget, in characters, for the protocol text.
    pub max_input_chars: usize,
    /// The default time allowed for one LLM call.
    pub timeout: Duration,
    /// Replaces the built-in extraction instruction when set.
    pub system_prompt: Option<String>,
}

pub const DEFAULT_MAX_INPUT_CHARS: usize = 120_000;
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            system_prompt: None,
        }
    }
}

/// The owning side of a request's cancellation signal.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// A handle with no contexts yet; see [`CancelHandle::context`].
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// Signals cancellation to every context created from this handle.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// A fresh context that this handle cancels. Contexts created after
    /// [`CancelHandle::cancel`] start out cancelled.
    pub fn context(&self) -> RequestContext {
        RequestContext {
            request_id: Uuid::new_v4(),
            timeout: None,
            cancel_rx: self.tx.subscribe(),
        }
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-request state passed to the extraction client in place of ambient
/// session state.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: Uuid,
    /// Overrides the client's default timeout when set.
    pub timeout: Option<Duration>,
    cancel_rx: watch::Receiver<bool>,
}

impl RequestContext {
    /// Creates a context together with the handle that can cancel it.
    pub fn new() -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        (
            Self {
                request_id: Uuid::new_v4(),
                timeout: None,
                cancel_rx: rx,
            },
            CancelHandle { tx },
        )
    }

    /// Creates a context that can never be cancelled.
    pub fn detached() -> Self {
        Self::new().0
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel_rx.borrow()
    }

    /// Resolves once cancellation has been signalled.
    ///
    /// If the handle is dropped without cancelling, this never resolves.
    pub async fn cancelled(&self) {
        let mut rx = self.cancel_rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::detached()
    }
}
