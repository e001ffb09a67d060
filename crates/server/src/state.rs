//! # Application State
//!
//! This module defines the shared application state (`AppState`) and the logic
//! for building it at startup. Everything in it is immutable and shared through
//! `Arc`; each request is an independent round trip.

use crate::config::AppConfig;
use std::sync::Arc;
use tracing::info;
use trialsage::{
    providers::{ai::AiProvider, factory::create_provider},
    CancelHandle, DocumentLoaders, ExtractionClient, ExtractionClientBuilder,
};
use trialsage_pdf::PdfLoader;

/// The shared application state, accessible from all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// The application's configuration, loaded from `config.yml`.
    pub config: Arc<AppConfig>,
    /// The extraction client wrapping the configured AI provider.
    pub client: Arc<ExtractionClient>,
    /// The loaders for every accepted upload format.
    pub loaders: Arc<DocumentLoaders>,
    /// Cancels every in-flight extraction when the server shuts down.
    pub shutdown: Arc<CancelHandle>,
}

/// The loader set used by the server: text, Markdown and PDF.
pub fn default_loaders() -> DocumentLoaders {
    DocumentLoaders::default().with_loader(Box::new(PdfLoader::new()))
}

/// Builds the application state around an already constructed provider.
pub fn build_app_state_with_provider(
    config: AppConfig,
    ai_provider: Box<dyn AiProvider>,
) -> anyhow::Result<AppState> {
    let client = ExtractionClientBuilder::new()
        .ai_provider(ai_provider)
        .config(config.extraction.to_extraction_config())
        .build()?;

    Ok(AppState {
        config: Arc::new(config),
        client: Arc::new(client),
        loaders: Arc::new(default_loaders()),
        shutdown: Arc::new(CancelHandle::new()),
    })
}

/// Builds the shared application state from the configuration.
///
/// The provider's HTTP client gets the extraction timeout as its request timeout.
pub fn build_app_state(config: AppConfig) -> anyhow::Result<AppState> {
    let ai_provider = create_provider(&config.provider, Some(config.extraction.timeout()))?;
    info!(
        provider = %config.provider.provider,
        model = %config.provider.model_name,
        "Initialized AI provider."
    );
    build_app_state_with_provider(config, ai_provider)
}
