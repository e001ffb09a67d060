//! # trialsage: Protocol Summaries from the Command Line
//!
//! A thin entrypoint. Logs go to stderr so that stdout carries only the
//! summary or converted text.

use anyhow::Result;
use clap::Parser;
use trialsage_cli::{run, Cli};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("[trialsage error] {e:#}");
        std::process::exit(1);
    }

    Ok(())
}
