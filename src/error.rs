//! Error types for the pyq-extract service.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ServiceError`]: **Fatal** for the request. The paper cannot be
//!   extracted at all (bad upload, missing credential, model failure, model
//!   output that is not JSON even after repair). Returned as
//!   `Err(ServiceError)` and mapped to an HTTP status by [`ErrorKind`].
//!
//! * [`CropError`]: **Non-fatal**. A single question's diagram could not be
//!   cropped. Carried inside [`crate::pipeline::crop::CropOutcome`]; the
//!   question is still returned, just without its image.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::path::PathBuf;
use thiserror::Error;

/// Message returned when the model reply cannot be parsed as JSON.
pub const INVALID_MODEL_OUTPUT: &str = "AI returned invalid JSON. Try again.";

/// Coarse classification used for status mapping and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller sent something unusable. Not retried.
    Input,
    /// Operator must fix the deployment (credential, pdfium library).
    Config,
    /// The model provider or a remote URL failed.
    Upstream,
    /// The PDF could not be opened or rendered.
    Document,
    /// The model replied, but not with parseable JSON.
    Format,
    Internal,
}

impl ErrorKind {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::Input => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// All fatal errors returned by the extraction pipeline and HTTP handlers.
#[derive(Debug, Error)]
pub enum ServiceError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Neither an upload nor a URL was supplied.
    #[error("Missing input: {0}")]
    MissingInput(String),

    /// Upload name or content does not look like a PDF.
    #[error("File must be a PDF")]
    NotAPdf { name: String, magic: Option<[u8; 4]> },

    /// Multipart body could not be read.
    #[error("Invalid upload: {0}")]
    InvalidUpload(String),

    /// JSON body is well-formed but semantically unusable.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A remote document is larger than the upload limit.
    #[error("Document at '{url}' is larger than the {limit}-byte limit")]
    DownloadTooLarge { url: String, limit: usize },

    /// The document is encrypted; the service never asks for passwords.
    #[error("PDF '{name}' is password protected. Upload an unprotected copy.")]
    PasswordRequired { name: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// The provider credential was absent at startup.
    #[error("Server missing API key: set {var} (missing credential for provider '{provider}')")]
    MissingCredential { provider: String, var: String },

    /// A credential exists but the provider could not be constructed.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium on the library search path."
    )]
    PdfiumBindingFailed(String),

    // ── Upstream errors ───────────────────────────────────────────────────
    /// URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    /// The model provider returned an error.
    #[error("AI Processing Failed: {message}")]
    LlmApiError { message: String },

    /// The model call exceeded `api_timeout_secs`.
    #[error("AI Processing Failed: model call timed out after {secs}s")]
    ApiTimeout { secs: u64 },

    // ── Document errors ───────────────────────────────────────────────────
    /// pdfium could not load the document.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// pdfium returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// The document has no pages to render.
    #[error("PDF has no pages")]
    EmptyDocument,

    // ── Format errors ─────────────────────────────────────────────────────
    /// Model output is not JSON even after the repair pass.
    #[error("{}", INVALID_MODEL_OUTPUT)]
    InvalidModelOutput { detail: String },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::MissingInput(_)
            | ServiceError::NotAPdf { .. }
            | ServiceError::InvalidUpload(_)
            | ServiceError::InvalidRequest(_)
            | ServiceError::DownloadTooLarge { .. }
            | ServiceError::PasswordRequired { .. } => ErrorKind::Input,
            ServiceError::MissingCredential { .. }
            | ServiceError::ProviderNotConfigured { .. }
            | ServiceError::InvalidConfig(_)
            | ServiceError::PdfiumBindingFailed(_) => ErrorKind::Config,
            ServiceError::DownloadFailed { .. }
            | ServiceError::DownloadTimeout { .. }
            | ServiceError::LlmApiError { .. }
            | ServiceError::ApiTimeout { .. } => ErrorKind::Upstream,
            ServiceError::CorruptPdf { .. }
            | ServiceError::RasterisationFailed { .. }
            | ServiceError::EmptyDocument => ErrorKind::Document,
            ServiceError::InvalidModelOutput { .. } => ErrorKind::Format,
            ServiceError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.kind().status()
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self.kind() {
            ErrorKind::Input => tracing::debug!("Rejected request: {}", self),
            ErrorKind::Format => tracing::warn!("{}", self),
            _ => tracing::error!("Request failed: {}", self),
        }

        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

impl From<JsonRejection> for ServiceError {
    fn from(rejection: JsonRejection) -> Self {
        ServiceError::InvalidRequest(rejection.body_text())
    }
}

/// A non-fatal error for a single question's diagram crop.
///
/// Logged and dropped: the question is returned with `image_base64: null`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CropError {
    /// `page_number` does not resolve to a rendered page.
    #[error("page {page} is out of range ({rendered} pages rendered)")]
    PageOutOfRange { page: i64, rendered: usize },

    /// `visual_bbox` is not four numbers.
    #[error("invalid bounding box: {0}")]
    InvalidBox(String),

    /// The box has no area after clamping to the 0–1000 scale.
    #[error("degenerate bounding box [{ymin}, {xmin}, {ymax}, {xmax}]")]
    DegenerateBox {
        ymin: i64,
        xmin: i64,
        ymax: i64,
        xmax: i64,
    },

    /// JPEG encoding of the cropped region failed.
    #[error("image encoding failed: {0}")]
    Encode(String),
}
