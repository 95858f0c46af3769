//! Input staging: turn an upload or a URL into a PDF file on disk.
//!
//! pdfium opens documents by path, so every source ends up in a
//! [`tempfile::NamedTempFile`] with a random `pyq-*.pdf` name. Concurrent
//! requests never collide, and the file is removed when [`StagedPdf`] is
//! dropped, on success, on error and on panic alike.

use crate::config::ServiceConfig;
use crate::error::ServiceError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Where a document comes from.
#[derive(Debug, Clone)]
pub enum PdfSource {
    /// Multipart upload: original file name plus raw bytes.
    Upload { filename: String, bytes: Vec<u8> },
    /// Remote document fetched over HTTP(S).
    Url(String),
}

impl PdfSource {
    /// Short human-readable label for logs and error messages.
    pub fn label(&self) -> String {
        match self {
            PdfSource::Upload { filename, .. } => filename.clone(),
            PdfSource::Url(url) => display_name_from_url(url),
        }
    }
}

/// Bounds applied to every remote fetch.
#[derive(Debug, Clone, Copy)]
pub struct FetchLimits {
    pub timeout_secs: u64,
    /// Same cap as a multipart upload.
    pub max_bytes: usize,
}

impl FetchLimits {
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self {
            timeout_secs: config.download_timeout_secs,
            max_bytes: config.max_upload_bytes,
        }
    }
}

/// A PDF written to a request-scoped temp file.
#[derive(Debug)]
pub struct StagedPdf {
    file: NamedTempFile,
    name: String,
}

impl StagedPdf {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Original file name (upload) or last URL segment.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    let lower = input.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// True when `bytes` carry the `%PDF` header.
///
/// pdfium tolerates up to 1 KiB of junk before the header, so the search
/// window matches that.
pub fn has_pdf_magic(bytes: &[u8]) -> bool {
    let window = &bytes[..bytes.len().min(1024)];
    window.windows(4).any(|w| w == b"%PDF")
}

fn first_four(bytes: &[u8]) -> Option<[u8; 4]> {
    bytes.get(..4).map(|b| [b[0], b[1], b[2], b[3]])
}

/// Stage `source` as a temp PDF, downloading it first when it is a URL.
pub async fn stage_pdf(
    source: PdfSource,
    client: &reqwest::Client,
    limits: FetchLimits,
) -> Result<StagedPdf, ServiceError> {
    match source {
        PdfSource::Upload { filename, bytes } => {
            if !filename.to_ascii_lowercase().ends_with(".pdf") {
                return Err(ServiceError::NotAPdf {
                    magic: first_four(&bytes),
                    name: filename,
                });
            }
            write_staged(filename, &bytes)
        }
        PdfSource::Url(url) => {
            if !is_url(&url) {
                return Err(ServiceError::InvalidRequest(format!(
                    "'{url}' is not an HTTP/HTTPS URL"
                )));
            }
            info!("Downloading PDF from: {}", url);
            let bytes = fetch_bytes(client, &url, limits).await?;
            write_staged(display_name_from_url(&url), &bytes)
        }
    }
}

fn write_staged(name: String, bytes: &[u8]) -> Result<StagedPdf, ServiceError> {
    if bytes.is_empty() {
        return Err(ServiceError::MissingInput(format!("'{name}' is empty")));
    }
    if !has_pdf_magic(bytes) {
        return Err(ServiceError::NotAPdf {
            magic: first_four(bytes),
            name,
        });
    }

    let mut file = tempfile::Builder::new()
        .prefix("pyq-")
        .suffix(".pdf")
        .tempfile()
        .map_err(|e| ServiceError::Internal(format!("tempfile: {e}")))?;
    file.write_all(bytes)
        .and_then(|_| file.flush())
        .map_err(|e| ServiceError::Internal(format!("tempfile write: {e}")))?;

    debug!(
        "Staged '{}' ({} bytes) at {}",
        name,
        bytes.len(),
        file.path().display()
    );

    Ok(StagedPdf { file, name })
}

/// GET `url` and return the body, mapping transport failures to upstream errors.
///
/// The body is read chunk by chunk and the fetch is abandoned as soon as it
/// passes `limits.max_bytes`.
pub async fn fetch_bytes(
    client: &reqwest::Client,
    url: &str,
    limits: FetchLimits,
) -> Result<Vec<u8>, ServiceError> {
    let too_large = || ServiceError::DownloadTooLarge {
        url: url.to_string(),
        limit: limits.max_bytes,
    };
    let map_err = |e: reqwest::Error| {
        if e.is_timeout() {
            ServiceError::DownloadTimeout {
                url: url.to_string(),
                secs: limits.timeout_secs,
            }
        } else {
            ServiceError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    };

    let mut response = client
        .get(url)
        .timeout(Duration::from_secs(limits.timeout_secs))
        .send()
        .await
        .map_err(map_err)?;

    if !response.status().is_success() {
        return Err(ServiceError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    if let Some(len) = response.content_length() {
        if len > limits.max_bytes as u64 {
            warn!("Refusing {}: Content-Length {} over limit", url, len);
            return Err(too_large());
        }
    }

    let mut bytes = Vec::new();
    while let Some(chunk) = response.chunk().await.map_err(map_err)? {
        if bytes.len() + chunk.len() > limits.max_bytes {
            warn!("Aborting {}: body passed {} bytes", url, limits.max_bytes);
            return Err(too_large());
        }
        bytes.extend_from_slice(&chunk);
    }

    debug!("Fetched {} bytes from {}", bytes.len(), url);
    Ok(bytes)
}

/// Load the optional reference image of a `/solve` request.
///
/// Accepts `data:<mime>;base64,<payload>` (what `/extract` hands out) as
/// well as plain HTTP(S) URLs.
pub async fn load_reference_image(
    client: &reqwest::Client,
    image_url: &str,
    limits: FetchLimits,
) -> Result<Vec<u8>, ServiceError> {
    let trimmed = image_url.trim();
    if let Some(rest) = trimmed.strip_prefix("data:") {
        return decode_data_url(rest);
    }
    if !is_url(trimmed) {
        return Err(ServiceError::InvalidRequest(format!(
            "unsupported image_url scheme: '{}'",
            truncate(trimmed, 40)
        )));
    }
    fetch_bytes(client, trimmed, limits).await
}

fn decode_data_url(rest: &str) -> Result<Vec<u8>, ServiceError> {
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| ServiceError::InvalidRequest("malformed data URL".into()))?;
    if !meta.ends_with(";base64") {
        return Err(ServiceError::InvalidRequest(
            "data URL must be base64-encoded".into(),
        ));
    }
    STANDARD
        .decode(payload.trim())
        .map_err(|e| ServiceError::InvalidRequest(format!("invalid base64 in data URL: {e}")))
}

/// Extract a reasonable file name from the URL path.
pub fn display_name_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() {
                    return last.to_string();
                }
            }
        }
    }
    "downloaded.pdf".to_string()
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}\u{2026}", &s[..idx]),
        None => s.to_string(),
    }
}
