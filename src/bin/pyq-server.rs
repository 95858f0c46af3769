//! HTTP server binary for pyq-extract.
//!
//! A thin shim over the library crate: maps flags and `PYQ_*` environment
//! variables to `ServiceConfig`, builds the model once and serves the router.

use anyhow::{Context, Result};
use clap::Parser;
use pyq_extract::pipeline::render::bind_pdfium;
use pyq_extract::{credential_from_env, router, AppState, ProviderModel, ServiceConfig, SolutionStyle};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"CREDENTIALS:
  The provider key is read once at startup:
    gemini     GEMINI_API_KEY (or GOOGLE_API_KEY)
    openai     OPENAI_API_KEY
    anthropic  ANTHROPIC_API_KEY
    mistral    MISTRAL_API_KEY
    ollama     (none)
  Without a key the server still starts; /extract, /solve, /fork-template
  and /resume-diff then answer 500 with a missing-credential message.

PDFIUM:
  pdfium is bound from the system library path, or from PDFIUM_LIB_PATH.

EXAMPLES:
  pyq-server
  PYQ_ALLOWED_ORIGINS=https://pyq.example.org pyq-server --bind 127.0.0.1:8080
  curl -F file=@paper.pdf http://localhost:8000/extract
"#;

/// Serve exam-paper question extraction over HTTP.
#[derive(Parser, Debug)]
#[command(
    name = "pyq-server",
    version,
    about = "Extract structured questions from exam-paper PDFs with a vision LLM",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Socket address to listen on.
    #[arg(long, env = "PYQ_BIND", default_value = "0.0.0.0:8000")]
    bind: String,

    /// LLM provider: gemini, openai, anthropic, mistral, ollama.
    #[arg(long, env = "PYQ_PROVIDER", default_value = pyq_extract::config::DEFAULT_PROVIDER)]
    provider: String,

    /// Model ID.
    #[arg(long, env = "PYQ_MODEL", default_value = pyq_extract::config::DEFAULT_MODEL)]
    model: String,

    /// Pages rasterised per paper (1–50).
    #[arg(long, env = "PYQ_MAX_PAGES", default_value_t = 10)]
    max_pages: usize,

    /// Render scale relative to 72 DPI (0.5–4.0).
    #[arg(long, env = "PYQ_RENDER_SCALE", default_value_t = 2.0)]
    render_scale: f32,

    /// Answer format for /solve.
    #[arg(long, env = "PYQ_SOLVE_STYLE", value_enum, default_value = "html-latex")]
    solve_style: SolveStyleArg,

    /// Comma-separated CORS origins; "*" allows any.
    #[arg(
        long,
        env = "PYQ_ALLOWED_ORIGINS",
        value_delimiter = ',',
        default_value = "http://localhost:3000"
    )]
    allowed_origins: Vec<String>,

    /// Maximum request body in MiB.
    #[arg(long, env = "PYQ_MAX_UPLOAD_MB", default_value_t = 25)]
    max_upload_mb: usize,

    /// URL download timeout in seconds.
    #[arg(long, env = "PYQ_DOWNLOAD_TIMEOUT", default_value_t = 60)]
    download_timeout: u64,

    /// Model call timeout in seconds.
    #[arg(long, env = "PYQ_API_TIMEOUT", default_value_t = 180)]
    api_timeout: u64,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "PYQ_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Max tokens per model reply.
    #[arg(long, env = "PYQ_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: usize,

    /// Explicit pdfium shared library.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PYQ_VERBOSE")]
    verbose: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum SolveStyleArg {
    HtmlLatex,
    LatexOnly,
}

impl From<SolveStyleArg> for SolutionStyle {
    fn from(v: SolveStyleArg) -> Self {
        match v {
            SolveStyleArg::HtmlLatex => SolutionStyle::HtmlLatex,
            SolveStyleArg::LatexOnly => SolutionStyle::LatexOnly,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else {
        "info,tower_http=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Credential ───────────────────────────────────────────────────────
    let credential = credential_from_env(&cli.provider);
    if let Some((var, _)) = &credential {
        info!("Using credential from {}", var);
    }

    // ── Config ───────────────────────────────────────────────────────────
    let config = ServiceConfig::builder()
        .provider_name(&cli.provider)
        .model(&cli.model)
        .api_key(credential.map(|(_, key)| key))
        .max_pages(cli.max_pages)
        .render_scale(cli.render_scale)
        .solve_style(cli.solve_style.into())
        .allowed_origins(cli.allowed_origins)
        .max_upload_bytes(cli.max_upload_mb.saturating_mul(1024 * 1024))
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout)
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .pdfium_lib_path(cli.pdfium_lib)
        .build()
        .context("Invalid configuration")?;
    info!("{:?}", config);

    // pdfium is bound per request; probing it here surfaces a missing
    // library in the startup log instead of on the first upload.
    if let Err(e) = bind_pdfium(config.pdfium_lib_path.as_deref()) {
        warn!("{}", e);
    }

    // ── Serve ────────────────────────────────────────────────────────────
    let model = Arc::new(ProviderModel::from_config(&config));
    let state = AppState::new(config, model).context("Failed to initialise server state")?;
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&cli.bind)
        .await
        .with_context(|| format!("Failed to bind {}", cli.bind))?;
    info!("pyq-server listening on http://{}", cli.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
