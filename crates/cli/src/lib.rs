//! # `trialsage-cli` Library Crate
//!
//! The command handlers behind the `trialsage` binary: one-shot protocol
//! extraction, PDF-to-text conversion and text repair.

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::{
    fs,
    io::{self, Read, Write},
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::{info, warn};
use trialsage::{
    cleanup::{detect_text_issues, repair_text},
    providers::factory::{create_provider, ProviderConfig},
    types::{DEFAULT_MAX_INPUT_CHARS, DEFAULT_TIMEOUT_SECS},
    DocumentFormat, DocumentLoaders, DocumentSource, ExportFormat, ExtractionClientBuilder,
    ExtractionConfig, ExtractionError, RequestContext,
};
use trialsage_pdf::{convert_pdf_to_text, PdfLoader};

// --- CLI Argument Structs ---

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Extract a structured summary from a protocol (.pdf, .txt, .md or `-` for stdin)
    Extract(ExtractArgs),
    /// Convert a PDF protocol to repaired plain text
    Convert(ConvertArgs),
    /// Repair extraction damage (CID codes, reversed words, artifacts) in a text file
    Repair(RepairArgs),
}

/// Which AI provider to call, resolved from flags or the environment.
#[derive(Args, Debug, Clone)]
pub struct ProviderArgs {
    /// The provider type ("gemini" or "local").
    #[arg(long, env = "AI_PROVIDER", default_value = "gemini")]
    pub provider: String,
    /// The provider's endpoint. Derived from the model for Gemini when omitted.
    #[arg(long, env = "AI_API_URL")]
    pub api_url: Option<String>,
    /// The API key. Falls back to `GOOGLE_API_KEY`.
    #[arg(long, env = "AI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,
    /// The model name.
    #[arg(long, env = "AI_MODEL", default_value = "gemini-2.0-flash")]
    pub model: String,
}

impl ProviderArgs {
    pub fn to_provider_config(&self) -> ProviderConfig {
        let api_key = self
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| {
                std::env::var("GOOGLE_API_KEY")
                    .ok()
                    .filter(|key| !key.trim().is_empty())
            });
        ProviderConfig {
            provider: self.provider.clone(),
            api_url: self.api_url.clone().filter(|url| !url.trim().is_empty()),
            api_key,
            model_name: self.model.clone(),
        }
    }
}

#[derive(Parser, Debug)]
pub struct ExtractArgs {
    /// The protocol file, or `-` to read pasted text from stdin.
    pub input: String,
    /// The output format.
    #[arg(long, default_value = "text")]
    pub format: ExportFormat,
    /// Write the summary to this file instead of stdout.
    #[arg(long, short)]
    pub output: Option<PathBuf>,
    /// Seconds to wait for the model before giving up.
    #[arg(
        long,
        env = "TRIALSAGE_EXTRACTION__TIMEOUT_SECS",
        default_value_t = DEFAULT_TIMEOUT_SECS
    )]
    pub timeout: u64,
    /// Characters of protocol text sent to the model; the rest is dropped.
    #[arg(
        long,
        env = "TRIALSAGE_EXTRACTION__MAX_INPUT_CHARS",
        default_value_t = DEFAULT_MAX_INPUT_CHARS
    )]
    pub max_input_chars: usize,
    /// Replaces the built-in extraction instruction.
    #[arg(long, env = "TRIALSAGE_EXTRACTION__SYSTEM_PROMPT")]
    pub system_prompt: Option<String>,
    #[command(flatten)]
    pub provider: ProviderArgs,
}

impl ExtractArgs {
    /// The extraction settings, using the server's names for the same knobs.
    pub fn to_extraction_config(&self) -> ExtractionConfig {
        ExtractionConfig {
            max_input_chars: self.max_input_chars,
            timeout: Duration::from_secs(self.timeout),
            system_prompt: self
                .system_prompt
                .clone()
                .filter(|prompt| !prompt.trim().is_empty()),
        }
    }
}

#[derive(Parser, Debug)]
pub struct ConvertArgs {
    /// The PDF file to convert.
    pub input: PathBuf,
    /// Write the text to this file instead of stdout.
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct RepairArgs {
    /// The text file to repair, or `-` for stdin.
    pub input: String,
    /// Write the repaired text to this file instead of stdout.
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

// --- Public Entrypoint ---

/// The main entry point for the `trialsage-cli` library.
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Extract(args) => handle_extract(args).await,
        Commands::Convert(args) => handle_convert(args).await,
        Commands::Repair(args) => handle_repair(args),
    }
}

// --- Helpers ---

/// The loader set used by the CLI: text, Markdown and PDF.
pub fn loaders() -> DocumentLoaders {
    DocumentLoaders::default().with_loader(Box::new(PdfLoader::new()))
}

/// Turns the `input` argument into a document source.
pub fn read_source(input: &str) -> Result<DocumentSource> {
    if input == "-" {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read protocol text from stdin")?;
        return Ok(DocumentSource::Pasted(text));
    }

    let path = Path::new(input);
    let bytes = fs::read(path).with_context(|| format!("Failed to read '{}'", path.display()))?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(input)
        .to_string();
    Ok(DocumentSource::File {
        name,
        content_type: None,
        bytes,
    })
}

/// Writes `content` to the output file, or to stdout.
fn write_output(output: Option<&Path>, content: &str) -> Result<()> {
    match output {
        Some(path) => {
            fs::write(path, content)
                .with_context(|| format!("Failed to write '{}'", path.display()))?;
            eprintln!("Wrote {}", path.display());
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(content.as_bytes())?;
            if !content.ends_with('\n') {
                stdout.write_all(b"\n")?;
            }
        }
    }
    Ok(())
}

// --- Command Handlers ---

/// Handles `trialsage extract`. Ctrl-C cancels the in-flight model call.
async fn handle_extract(args: ExtractArgs) -> Result<()> {
    info!("Starting 'extract' command for '{}'.", args.input);

    let source = read_source(&args.input)?;
    let label = source.label().to_string();
    let text = tokio::task::spawn_blocking(move || loaders().load(&source)).await??;

    let issues = detect_text_issues(&text);
    if !issues.is_empty() {
        warn!(
            "'{}' shows signs of extraction damage: {:?}. Try `trialsage repair` first.",
            label, issues
        );
    }

    let config = args.to_extraction_config();
    let provider = create_provider(&args.provider.to_provider_config(), Some(config.timeout))?;
    let client = ExtractionClientBuilder::new()
        .ai_provider(provider)
        .config(config)
        .build()?;

    let (ctx, cancel) = RequestContext::new();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; cancelling the extraction.");
            cancel.cancel();
        }
    });

    let outcome = client.extract_with_details(&text, &ctx).await;
    ctrl_c.abort();
    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(ExtractionError::Cancelled) => bail!("Extraction cancelled."),
        Err(e) => return Err(e.into()),
    };

    if outcome.truncated {
        eprintln!(
            "Note: only the first {} of {} characters were analyzed.",
            args.max_input_chars, outcome.input_chars
        );
    }
    let missing = outcome.result.missing_fields();
    if !missing.is_empty() {
        eprintln!("Not found in the protocol: {}", missing.join(", "));
    }

    let rendered = args
        .format
        .render(&outcome.result)
        .map_err(|e| anyhow!("Failed to render the summary: {e}"))?;
    write_output(args.output.as_deref(), &rendered)
}

/// Handles `trialsage convert`.
async fn handle_convert(args: ConvertArgs) -> Result<()> {
    let name = args.input.display().to_string();
    if DocumentFormat::from_file_name(&name) != Some(DocumentFormat::Pdf) {
        bail!("'{name}' is not a PDF file. Only PDF files can be converted.");
    }
    let bytes = fs::read(&args.input).with_context(|| format!("Failed to read '{name}'"))?;

    info!("Converting '{}' ({} bytes).", name, bytes.len());
    let text = tokio::task::spawn_blocking(move || convert_pdf_to_text(&bytes)).await??;
    write_output(args.output.as_deref(), &text)
}

/// Handles `trialsage repair`.
fn handle_repair(args: RepairArgs) -> Result<()> {
    let text = match read_source(&args.input)? {
        DocumentSource::Pasted(text) => text,
        DocumentSource::File { name, bytes, .. } => String::from_utf8(bytes)
            .map_err(|_| anyhow!("'{name}' is not a UTF-8 text file."))?,
    };

    let issues = detect_text_issues(&text);
    if issues.is_empty() {
        eprintln!("No text issues found.");
    } else {
        let labels: Vec<String> = issues.iter().map(ToString::to_string).collect();
        eprintln!("Fixed: {}", labels.join(", "));
    }
    write_output(args.output.as_deref(), &repair_text(&text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_extract_flags() {
        let cli = Cli::try_parse_from([
            "trialsage",
            "extract",
            "protocol.pdf",
            "--format",
            "json",
            "--timeout",
            "30",
            "--provider",
            "local",
            "--api-url",
            "http://localhost:11434/v1/chat/completions",
        ])
        .unwrap();

        let Commands::Extract(args) = cli.command else {
            panic!("expected the extract command");
        };
        assert_eq!(args.input, "protocol.pdf");
        assert_eq!(args.format, ExportFormat::Json);
        assert_eq!(args.timeout, 30);
        assert_eq!(args.max_input_chars, DEFAULT_MAX_INPUT_CHARS);
        let config = args.provider.to_provider_config();
        assert_eq!(config.provider, "local");
        assert_eq!(
            config.api_url.as_deref(),
            Some("http://localhost:11434/v1/chat/completions")
        );
    }

    #[test]
    fn test_extract_args_build_extraction_config() {
        let cli = Cli::try_parse_from([
            "trialsage",
            "extract",
            "-",
            "--timeout",
            "15",
            "--max-input-chars",
            "500",
            "--system-prompt",
            "Summarize the protocol.",
        ])
        .unwrap();

        let Commands::Extract(args) = cli.command else {
            panic!("expected the extract command");
        };
        let config = args.to_extraction_config();
        assert_eq!(config.timeout, Duration::from_secs(15));
        assert_eq!(config.max_input_chars, 500);
        assert_eq!(config.system_prompt.as_deref(), Some("Summarize the protocol."));
    }

    #[test]
    fn test_blank_system_prompt_keeps_default() {
        let cli =
            Cli::try_parse_from(["trialsage", "extract", "-", "--system-prompt", "  "]).unwrap();

        let Commands::Extract(args) = cli.command else {
            panic!("expected the extract command");
        };
        assert!(args.to_extraction_config().system_prompt.is_none());
    }

    #[test]
    fn test_cli_rejects_unknown_format() {
        let result = Cli::try_parse_from(["trialsage", "extract", "p.txt", "--format", "xml"]);
        assert!(result.is_err());
    }
}
