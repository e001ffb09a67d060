//! # Common Test Utilities
//!
//! `TestApp` spawns the real router on a random port. The AI provider is a
//! `local` provider pointed at an `httpmock::MockServer`, so every test
//! controls exactly what the "model" answers. Tests that need to control
//! timing swap in a `MockAiProvider` instead.

// Not every test file uses every helper.
#![allow(unused)]

use anyhow::Result;
use axum::serve;
use httpmock::{Method, Mock, MockServer};
use reqwest::Client;
use serde_json::json;
use std::{fs::File, io::Write, net::SocketAddr};
use tempfile::{tempdir, TempDir};
use tokio::{net::TcpListener, task::JoinHandle};
use trialsage::providers::ai::AiProvider;
use trialsage_server::{
    config, router,
    state::{build_app_state, build_app_state_with_provider, AppState},
};

pub const CHAT_PATH: &str = "/v1/chat/completions";

/// A complete, well-formed model answer.
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

pub const SAMPLE_PROTOCOL: &str = "Protocol TS-001. A Phase 3 Study of Drug X in Adults \
with Condition Y. Sponsor: Acme Pharma. Primary endpoint: change in symptom score at week 12.";

/// A harness for end-to-end testing of the Axum server.
pub struct TestApp {
    pub address: String,
    pub client: Client,
    pub mock_server: MockServer,
    pub app_state: AppState,
    _config_dir: TempDir,
    _server_handle: JoinHandle<()>,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestApp {
    /// Spawns the server with the default test limits.
    pub async fn spawn() -> Result<Self> {
        Self::spawn_with_limits(2_000, 5).await
    }

    /// Spawns the server with a custom input budget and timeout.
    pub async fn spawn_with_limits(max_input_chars: usize, timeout_secs: u64) -> Result<Self> {
        Self::spawn_inner(max_input_chars, timeout_secs, None).await
    }

    /// Spawns the server around `provider` instead of the HTTP mock.
    pub async fn spawn_with_provider(
        provider: Box<dyn AiProvider>,
        timeout_secs: u64,
    ) -> Result<Self> {
        Self::spawn_inner(2_000, timeout_secs, Some(provider)).await
    }

    async fn spawn_inner(
        max_input_chars: usize,
        timeout_secs: u64,
        provider: Option<Box<dyn AiProvider>>,
    ) -> Result<Self> {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .compact()
            .with_test_writer()
            .try_init();

        let mock_server = MockServer::start();

        let config_dir = tempdir()?;
        let config_path = config_dir.path().join("config.yml");
        let config_content = format!(
            r#"
port: 0
max_upload_bytes: 1048576
provider:
  provider: "local"
  api_url: "{}"
  api_key: null
  model_name: "mock-chat-model"
extraction:
  max_input_chars: {max_input_chars}
  timeout_secs: {timeout_secs}
"#,
            mock_server.url(CHAT_PATH),
        );
        let mut file = File::create(&config_path)?;
        file.write_all(config_content.as_bytes())?;

        let config = config::get_config(Some(config_path.to_str().unwrap()))?;
        let app_state = match provider {
            Some(provider) => build_app_state_with_provider(config, provider)?,
            None => build_app_state(config)?,
        };
        let app_state_for_harness = app_state.clone();

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr: SocketAddr = listener.local_addr()?;
        let address = format!("http://{addr}");

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
        let server_handle = tokio::spawn(async move {
            let app = router::create_router(app_state);
            let server = serve(listener, app).with_graceful_shutdown(async {
                shutdown_rx.await.ok();
            });
            if let Err(e) = server.await {
                tracing::error!("[TestApp] Server error: {}", e);
            }
        });

        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        Ok(Self {
            address,
            client: Client::new(),
            mock_server,
            app_state: app_state_for_harness,
            _config_dir: config_dir,
            _server_handle: server_handle,
            shutdown_tx: Some(shutdown_tx),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    /// Makes the mock model answer every chat completion with `content`.
    pub fn mock_completion(&self, content: &str) -> Mock<'_> {
        let content = content.to_string();
        self.mock_server.mock(|when, then| {
            when.method(Method::POST).path(CHAT_PATH);
            then.status(200).json_body(json!({
                "choices": [{"message": {"role": "assistant", "content": content}}]
            }));
        })
    }

    /// Makes the mock model fail every chat completion with `status`.
    pub fn mock_failure(&self, status: u16) -> Mock<'_> {
        self.mock_server.mock(|when, then| {
            when.method(Method::POST).path(CHAT_PATH);
            then.status(status)
                .json_body(json!({"error": {"message": "mock failure"}}));
        })
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
