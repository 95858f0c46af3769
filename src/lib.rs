//! # pyq-extract
//!
//! Turn exam-paper PDFs into structured question lists using a Vision
//! Language Model, and serve the result over HTTP.
//!
//! ## Why a vision model?
//!
//! Past papers are often scans, or typeset with equations, tables and
//! diagrams that text extractors flatten into noise. Rasterising each page
//! and letting a VLM read it the way a student would recovers question
//! boundaries, marks and LaTeX. The model also reports where each diagram
//! sits, so the service can crop it out and hand it back as an image.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF (upload or URL)
//!  │
//!  ├─ 1. Stage      random temp file, removed on drop
//!  ├─ 2. Render     first N pages via pdfium (spawn_blocking)
//!  ├─ 3. Encode     PNG → base64 ImageData
//!  ├─ 4. VLM        one request: extraction prompt + every page
//!  ├─ 5. Normalize  strip fences, parse JSON, repair LaTeX backslashes
//!  ├─ 6. Crop       0–1000 bounding box → JPEG data URL per diagram
//!  └─ 7. Format     ids, defaults → { questions, total }
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pyq_extract::{router, AppState, ProviderModel, ServiceConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServiceConfig::builder()
//!         .api_key(std::env::var("GEMINI_API_KEY").ok())
//!         .build()?;
//!     let model = Arc::new(ProviderModel::from_config(&config));
//!     let app = router(AppState::new(config, model)?);
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8000").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `server` | on      | Enables the `pyq-server` binary (clap + anyhow + tracing-subscriber + dotenvy) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod prompts;
pub mod resume;
pub mod server;
pub mod solve;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{credential_from_env, ServiceConfig, ServiceConfigBuilder, SolutionStyle};
pub use error::{CropError, ErrorKind, ServiceError};
pub use extract::{extract_from_pages, extract_questions};
pub use output::{ExtractionResult, Question, QuestionType};
pub use pipeline::input::PdfSource;
pub use pipeline::llm::{ModelRequest, ProviderModel, VisionModel};
pub use server::{router, AppState};
pub use solve::solve_question;
