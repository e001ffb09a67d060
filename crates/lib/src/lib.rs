//! # TrialSage
//!
//! Extracts the key fields of a clinical trial protocol (title, phase,
//! sponsor, objective, eligibility criteria and endpoints) with a hosted LLM.
//!
//! The flow for one submission is: a [`loader::DocumentLoaders`] set turns the
//! upload into text, an [`ExtractionClient`] sends it to the configured
//! [`providers::ai::AiProvider`], and the reply is parsed into an
//! [`ExtractionResult`] that can be exported with [`export`].

pub mod cleanup;
pub mod errors;
pub mod export;
pub mod extraction;
pub mod loader;
pub mod parse;
pub mod prompts;
pub mod providers;
pub mod types;

pub use errors::{ExtractionError, LoadError, PromptError};
pub use export::ExportFormat;
pub use extraction::{ExtractionClient, ExtractionClientBuilder, ExtractionOutcome};
pub use loader::{DocumentFormat, DocumentLoader, DocumentLoaders, DocumentSource};
pub use types::{CancelHandle, ExtractionConfig, ExtractionResult, RequestContext, NOT_FOUND};
