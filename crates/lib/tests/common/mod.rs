#![allow(dead_code)]
//! # Common Test Utilities
//!
//! Shared setup for the library's integration tests.

use dotenvy::dotenv;
use std::sync::Once;
use trialsage::providers::ai::AiProvider;
use trialsage::ExtractionClient;
use trialsage::ExtractionClientBuilder;

static INIT: Once = Once::new();

/// Initializes the tracing subscriber and loads .env for tests.
pub fn setup_tracing() {
    INIT.call_once(|| {
        dotenv().ok();
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    });
}

/// A client around the given provider with the default configuration.
pub fn client_with(provider: Box<dyn AiProvider>) -> ExtractionClient {
    ExtractionClientBuilder::new()
        .ai_provider(provider)
        .build()
        .expect("client builds with a provider")
}

/// A complete, well-formed model response.
pub const COMPLETE_RESPONSE: &str = r#"{
  "officialTitle": "A Phase 3 Study of Drug X in Adults with Condition Y",
  "phase": "Phase 3",
  "sponsor": "Acme Pharma",
  "objective": "To evaluate the efficacy of Drug X compared to placebo.",
  "inclusionCriteria": ["Age 18 years or older", "Confirmed diagnosis of Condition Y"],
  "exclusionCriteria": ["Pregnancy", "Prior treatment with Drug X"],
  "primaryEndpoints": ["Change in symptom score at week 12"],
  "secondaryEndpoints": ["Time to relapse", "Incidence of adverse events"]
}"#;
