//! The axum HTTP surface.
//!
//! ```text
//! GET  /health            liveness
//! POST /extract           PDF (upload or URL) → questions
//! POST /solve             one question (+ optional image) → solution
//! POST /extract-pdf-text  PDF → plain text
//! POST /fork-template     two resume texts → rewritten resume
//! POST /resume-diff       two resume PDFs → comparison
//! POST /generate-html     text → printable HTML
//! ```
//!
//! [`AppState`] is the only shared value. It is immutable after startup, so
//! requests never coordinate with each other.

pub mod form;
pub mod handlers;

use crate::config::ServiceConfig;
use crate::error::ServiceError;
use crate::pipeline::llm::VisionModel;
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Shared, read-only request context.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    pub model: Arc<dyn VisionModel>,
    /// Connection pool for URL downloads.
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(config: ServiceConfig, model: Arc<dyn VisionModel>) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("pyq-extract/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(config.download_timeout_secs))
            .build()
            .map_err(|e| ServiceError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            config: Arc::new(config),
            model,
            http,
        })
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.allowed_origins);
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/health", get(handlers::health))
        .route("/extract", post(handlers::extract))
        .route("/solve", post(handlers::solve))
        .route("/extract-pdf-text", post(handlers::extract_pdf_text))
        .route("/fork-template", post(handlers::fork))
        .route("/resume-diff", post(handlers::diff))
        .route("/generate-html", post(handlers::html))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// CORS for the configured origins; `*` allows any origin.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    if origins.iter().any(|o| o == "*") {
        info!("CORS: allowing any origin");
        return layer.allow_origin(AllowOrigin::any());
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!("Ignoring invalid CORS origin '{}'", o);
                None
            }
        })
        .collect();
    info!("CORS: allowing {:?}", origins);
    layer.allow_origin(AllowOrigin::list(allowed))
}
