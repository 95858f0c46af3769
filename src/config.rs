//! Service configuration.
//!
//! Everything the handlers need is loaded once at startup into an immutable
//! [`ServiceConfig`] and shared through [`crate::server::AppState`]. Nothing
//! below reads the environment on its own except [`credential_from_env`],
//! which the binary calls exactly once.

use crate::error::ServiceError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Default provider: the original deployment ran on Gemini.
pub const DEFAULT_PROVIDER: &str = "gemini";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Configuration for the extraction service.
///
/// Built via [`ServiceConfig::builder()`] or [`ServiceConfig::default()`].
///
/// # Example
/// ```rust
/// use pyq_extract::ServiceConfig;
///
/// let config = ServiceConfig::builder()
///     .max_pages(5)
///     .allowed_origins(["https://example.org"])
///     .build()
///     .unwrap();
/// assert_eq!(config.max_pages, 5);
/// ```
#[derive(Clone)]
pub struct ServiceConfig {
    /// LLM provider name passed to `edgequake_llm::ProviderFactory`.
    pub provider_name: String,

    /// Model identifier. Default: `gemini-2.5-flash`.
    pub model: String,

    /// Provider credential captured at startup. `None` means every
    /// model-dependent endpoint fails with a missing-credential error.
    pub api_key: Option<String>,

    /// Maximum pages rasterised per paper. Range 1–50. Default: 10.
    ///
    /// Every page is one image in a single model request, so this bounds
    /// both request size and latency.
    pub max_pages: usize,

    /// Page magnification relative to 72 DPI. Range 0.5–4.0. Default: 2.0.
    pub render_scale: f32,

    /// Longest-edge cap in pixels for a rendered page. Default: 4000.
    pub max_rendered_pixels: u32,

    /// Maximum pages read by the plain-text extractor. Default: 20.
    pub max_text_pages: usize,

    /// Sampling temperature for the model. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens the model may generate. Default: 8192.
    ///
    /// A full paper is one response; 8 192 tokens covers roughly forty
    /// questions with LaTeX.
    pub max_tokens: usize,

    /// Formatting style of `/solve` answers.
    pub solve_style: SolutionStyle,

    /// Origins allowed by CORS. `"*"` allows any origin.
    pub allowed_origins: Vec<String>,

    /// Maximum accepted request body in bytes. Default: 25 MiB.
    pub max_upload_bytes: usize,

    /// Download timeout for URL inputs in seconds. Default: 60.
    pub download_timeout_secs: u64,

    /// Per-model-call timeout in seconds. Default: 180.
    pub api_timeout_secs: u64,

    /// Explicit pdfium library file. `None` binds the system library.
    pub pdfium_lib_path: Option<PathBuf>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            provider_name: DEFAULT_PROVIDER.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            max_pages: 10,
            render_scale: 2.0,
            max_rendered_pixels: 4000,
            max_text_pages: 20,
            temperature: 0.1,
            max_tokens: 8192,
            solve_style: SolutionStyle::default(),
            allowed_origins: vec!["http://localhost:3000".to_string()],
            max_upload_bytes: 25 * 1024 * 1024,
            download_timeout_secs: 60,
            api_timeout_secs: 180,
            pdfium_lib_path: None,
        }
    }
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("provider_name", &self.provider_name)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("max_pages", &self.max_pages)
            .field("render_scale", &self.render_scale)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("solve_style", &self.solve_style)
            .field("allowed_origins", &self.allowed_origins)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .finish()
    }
}

impl ServiceConfig {
    /// Create a new builder for `ServiceConfig`.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder {
            config: Self::default(),
        }
    }

    /// Environment variable holding the credential for the configured provider.
    pub fn credential_var(&self) -> Option<&'static str> {
        credential_var(&self.provider_name)
    }

    /// True when the provider needs a credential and none was captured.
    pub fn is_missing_credential(&self) -> bool {
        self.credential_var().is_some() && self.api_key.as_deref().is_none_or(str::is_empty)
    }
}

/// Builder for [`ServiceConfig`].
#[derive(Debug)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = name.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn api_key(mut self, key: Option<String>) -> Self {
        self.config.api_key = key.filter(|k| !k.trim().is_empty());
        self
    }

    pub fn max_pages(mut self, n: usize) -> Self {
        self.config.max_pages = n.clamp(1, 50);
        self
    }

    pub fn render_scale(mut self, scale: f32) -> Self {
        self.config.render_scale = scale.clamp(0.5, 4.0);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(256);
        self
    }

    pub fn max_text_pages(mut self, n: usize) -> Self {
        self.config.max_text_pages = n.max(1);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn solve_style(mut self, style: SolutionStyle) -> Self {
        self.config.solve_style = style;
        self
    }

    pub fn allowed_origins<I, S>(mut self, origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.allowed_origins = origins
            .into_iter()
            .map(Into::into)
            .map(|o| o.trim().trim_end_matches('/').to_string())
            .filter(|o| !o.is_empty())
            .collect();
        self
    }

    pub fn max_upload_bytes(mut self, bytes: usize) -> Self {
        self.config.max_upload_bytes = bytes;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn pdfium_lib_path(mut self, path: Option<PathBuf>) -> Self {
        self.config.pdfium_lib_path = path;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServiceConfig, ServiceError> {
        let c = &self.config;
        if c.provider_name.trim().is_empty() {
            return Err(ServiceError::InvalidConfig("provider name is empty".into()));
        }
        if c.model.trim().is_empty() {
            return Err(ServiceError::InvalidConfig("model is empty".into()));
        }
        if c.max_tokens == 0 {
            return Err(ServiceError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if c.max_upload_bytes < 1024 {
            return Err(ServiceError::InvalidConfig(format!(
                "max_upload_bytes must be at least 1 KiB, got {}",
                c.max_upload_bytes
            )));
        }
        if c.download_timeout_secs == 0 || c.api_timeout_secs == 0 {
            return Err(ServiceError::InvalidConfig("timeouts must be ≥ 1s".into()));
        }
        if c.allowed_origins.is_empty() {
            return Err(ServiceError::InvalidConfig(
                "at least one allowed origin is required (use \"*\" for any)".into(),
            ));
        }
        Ok(self.config)
    }
}

/// How `/solve` formats its answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolutionStyle {
    /// HTML markup with `$…$` / `$$…$$` LaTeX, rendered directly by the web client.
    #[default]
    HtmlLatex,
    /// Plain text with LaTeX only, for clients that render Markdown+KaTeX.
    LatexOnly,
}

/// Environment variable holding the API key for `provider`.
///
/// Local providers (`ollama`, `lmstudio`) need none.
pub fn credential_var(provider: &str) -> Option<&'static str> {
    match provider.to_ascii_lowercase().as_str() {
        "gemini" | "google" => Some("GEMINI_API_KEY"),
        "openai" => Some("OPENAI_API_KEY"),
        "anthropic" => Some("ANTHROPIC_API_KEY"),
        "mistral" => Some("MISTRAL_API_KEY"),
        "ollama" | "lmstudio" => None,
        _ => Some("LLM_API_KEY"),
    }
}

/// Read the credential for `provider` from the process environment.
///
/// Gemini keys are also accepted under the older `GOOGLE_API_KEY` name.
/// Returns the variable that supplied the value alongside it.
pub fn credential_from_env(provider: &str) -> Option<(&'static str, String)> {
    let var = credential_var(provider)?;
    let lookup = |name: &'static str| {
        std::env::var(name)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(|v| (name, v))
    };
    lookup(var).or_else(|| {
        if var == "GEMINI_API_KEY" {
            lookup("GOOGLE_API_KEY")
        } else {
            None
        }
    })
}
