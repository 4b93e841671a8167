//! CLI binary for edgequake-pdf2md-studio.
//!
//! The command-line rendition of the conversion form: flags are the form
//! fields, one invocation is one "Process PDF" press.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdf2md_studio::normalize::{DOWNLOAD_FILE_NAME, MARKDOWN_MEDIA_TYPE};
use edgequake_pdf2md_studio::upload::{read_upload, DEFAULT_DOWNLOAD_TIMEOUT_SECS};
use edgequake_pdf2md_studio::{
    ConversionForm, ConversionReport, Credentials, EngineSettings, Phase, PhaseObserver,
    ProviderKind, Session, SharedObserver, StudioError, VlmEngine,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── Spinner observer ─────────────────────────────────────────────────────────

/// Shows one spinner line that follows the flow's phases.
struct SpinnerObserver {
    bar: ProgressBar,
}

impl SpinnerObserver {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        Arc::new(Self { bar })
    }
}

impl PhaseObserver for SpinnerObserver {
    fn on_phase(&self, phase: Phase) {
        match phase {
            Phase::Idle => {}
            _ if phase.is_terminal() => self.bar.finish_and_clear(),
            Phase::Validating => {
                self.bar.enable_steady_tick(Duration::from_millis(80));
                self.bar.set_message(format!("{phase}…"));
            }
            _ => self.bar.set_message(format!("{phase}…")),
        }
    }

    fn on_error(&self, error: &StudioError) {
        self.bar.println(format!("{} {}", red("✗"), error));
    }

    fn on_warning(&self, warning: &StudioError) {
        self.bar.println(format!("{} {}", yellow("!"), warning));
    }
}

// ── CLI definition ───────────────────────────────────────────────────────────

const AFTER_HELP: &str = r#"EXAMPLES:
  # OpenAI (key from OPENAI_API_KEY or .env)
  pdf2md-studio report.pdf

  # Selected pages, custom prompt, save the Markdown
  pdf2md-studio --pages 1,3,5 --system-prompt prompt.txt report.pdf --download report.md

  # Azure OpenAI deployment
  pdf2md-studio --provider azure --model prod-gpt4o --api-base https://x.openai.azure.com report.pdf

  # Vertex AI with a service-account file
  pdf2md-studio --provider vertex-ai --vertex-credentials sa.json --project p --location us-central1 doc.pdf

  # Convert from URL, JSON output
  pdf2md-studio --json https://arxiv.org/pdf/1706.03762

PROVIDERS & REQUIRED SETTINGS:
  openai      OPENAI_API_KEY
  azure       AZURE_API_KEY, AZURE_API_BASE, AZURE_API_VERSION
  gemini      GEMINI_API_KEY
  anthropic   ANTHROPIC_API_KEY
  vertex-ai   VERTEX_CREDENTIALS, VERTEXAI_PROJECT, VERTEXAI_LOCATION
              (GOOGLE_ACCESS_TOKEN optional; otherwise minted with gcloud)

  Values are read from the environment and a .env file; non-empty flags
  override them for this run only.

PAGE SELECTION:
  (empty)     all pages
  5           a single page
  1,3,5       a list of pages (1-indexed)

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH   Path to an existing libpdfium
  RUST_LOG          Override log filtering
"#;

/// Convert a PDF to Markdown with a vision model, form-style.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2md-studio",
    version,
    about = "Convert a PDF to Markdown using a vision LLM provider of your choice",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: Option<String>,

    /// Model provider.
    #[arg(long, env = "PDF2MD_PROVIDER", value_enum, default_value = "openai")]
    provider: ProviderArg,

    /// Model name (deployment name for Azure). Defaults per provider.
    #[arg(long, env = "PDF2MD_MODEL")]
    model: Option<String>,

    /// API key for the selected provider (overrides the environment).
    #[arg(long, hide_env_values = true)]
    api_key: Option<String>,

    /// Azure API base URL.
    #[arg(long)]
    api_base: Option<String>,

    /// Azure API version.
    #[arg(long, default_value = "2023-05-15")]
    api_version: String,

    /// Vertex AI service-account JSON file.
    #[arg(long)]
    vertex_credentials: Option<PathBuf>,

    /// Vertex AI project ID.
    #[arg(long)]
    project: Option<String>,

    /// Vertex AI location.
    #[arg(long)]
    location: Option<String>,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "PDF2MD_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Page selection: empty for all, 5, or 1,3,5.
    #[arg(long, env = "PDF2MD_PAGES", default_value = "")]
    pages: String,

    /// Directory the engine writes its Markdown file into.
    #[arg(long, env = "PDF2MD_OUTPUT_DIR", default_value = "./output")]
    output_dir: PathBuf,

    /// Also save the normalised Markdown here (a directory gets output.md).
    #[arg(long)]
    download: Option<PathBuf>,

    /// Print { "markdown", "stats" } as JSON instead of Markdown.
    #[arg(long)]
    json: bool,

    /// Number of concurrent VLM calls.
    #[arg(short, long, env = "PDF2MD_CONCURRENCY", default_value_t = 10)]
    concurrency: usize,

    /// Sequential mode: pass the previous page as formatting context.
    #[arg(long, env = "PDF2MD_MAINTAIN_FORMAT")]
    maintain_format: bool,

    /// Max LLM output tokens per page.
    #[arg(long, env = "PDF2MD_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "PDF2MD_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Retries per page on LLM failure.
    #[arg(long, env = "PDF2MD_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2MD_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// HTTP download timeout in seconds (URL inputs).
    #[arg(long, default_value_t = DEFAULT_DOWNLOAD_TIMEOUT_SECS)]
    download_timeout: u64,

    /// Disable the spinner.
    #[arg(long)]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ProviderArg {
    Openai,
    Azure,
    Gemini,
    Anthropic,
    VertexAi,
}

impl From<ProviderArg> for ProviderKind {
    fn from(v: ProviderArg) -> Self {
        match v {
            ProviderArg::Openai => ProviderKind::OpenAi,
            ProviderArg::Azure => ProviderKind::AzureOpenAi,
            ProviderArg::Gemini => ProviderKind::Gemini,
            ProviderArg::Anthropic => ProviderKind::Anthropic,
            ProviderArg::VertexAi => ProviderKind::VertexAi,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build session and form ───────────────────────────────────────────
    let engine = VlmEngine::new(engine_settings(&cli));
    let mut session = Session::new(Arc::new(engine), Credentials::from_env());
    if show_progress {
        session = session.with_observer(SpinnerObserver::new() as SharedObserver);
    }

    let mut form = build_form(&cli).await?;

    // Provider settings are checked before a remote PDF is fetched.
    session.preflight(&form).context("An error occurred")?;
    if let Some(ref input) = cli.input {
        form.upload = Some(
            read_upload(input, cli.download_timeout)
                .await
                .context("Failed to read input PDF")?,
        );
    }

    // ── Process ──────────────────────────────────────────────────────────
    let report = session.run(&form).await.context("An error occurred")?;
    display(&cli, &report).await
}

fn engine_settings(cli: &Cli) -> EngineSettings {
    EngineSettings {
        concurrency: cli.concurrency.max(1),
        temperature: cli.temperature.clamp(0.0, 2.0),
        max_tokens: cli.max_tokens,
        max_retries: cli.max_retries,
        maintain_format: cli.maintain_format,
        password: cli.password.clone(),
        ..EngineSettings::default()
    }
}

/// Map CLI args to the conversion form, reading the credential and prompt
/// files. The upload itself is attached by the caller.
async fn build_form(cli: &Cli) -> Result<ConversionForm> {
    let mut form = ConversionForm::new(cli.provider.into());

    if let Some(ref model) = cli.model {
        form.model_name = Some(model.clone());
    }
    form.api_key = cli.api_key.clone();
    form.api_base = cli.api_base.clone();
    form.api_version = Some(cli.api_version.clone());
    form.project = cli.project.clone();
    form.location = cli.location.clone();
    form.page_selection = cli.pages.clone();
    form.output_dir = cli.output_dir.clone();

    if let Some(ref path) = cli.vertex_credentials {
        form.vertex_credentials = Some(
            tokio::fs::read(path)
                .await
                .with_context(|| format!("Failed to read Vertex credentials from {path:?}"))?,
        );
    }

    if let Some(ref path) = cli.system_prompt {
        form.system_prompt = Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read system prompt from {path:?}"))?,
        );
    }

    Ok(form)
}

/// Print the document and the statistics; optionally save the download.
async fn display(cli: &Cli, report: &ConversionReport) -> Result<()> {
    if cli.json {
        let json = serde_json::json!({
            "markdown": report.document,
            "stats": report.stats,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&json).context("Failed to serialise output")?
        );
    } else if let Some(doc) = report.displayable() {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(doc.as_str().as_bytes())
            .context("Failed to write to stdout")?;
        if !doc.as_str().ends_with('\n') {
            handle.write_all(b"\n").ok();
        }
    }

    if !cli.quiet && !cli.json {
        eprintln!("{}", bold("Processing Statistics"));
        for (label, value) in report.stats.entries() {
            eprintln!("  {:<22} {}", dim(label), value);
        }
    }

    if report.document.is_none() {
        anyhow::bail!("No Markdown was produced: the engine output could not be normalised");
    }
    let Some(doc) = report.displayable() else {
        if !cli.quiet {
            eprintln!("{} No content was extracted; nothing to save", yellow("!"));
        }
        return Ok(());
    };

    if let Some(ref target) = cli.download {
        let path = if target.is_dir() {
            target.join(DOWNLOAD_FILE_NAME)
        } else {
            target.clone()
        };
        doc.save(&path).await.context("Failed to save Markdown")?;
        if !cli.quiet {
            eprintln!(
                "{} Saved {} ({})",
                green("✔"),
                bold(&path.display().to_string()),
                MARKDOWN_MEDIA_TYPE
            );
        }
    }

    Ok(())
}
