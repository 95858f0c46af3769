//! The model capability: "given a prompt and zero or more images, return
//! generated text".
//!
//! Pipelines depend on [`VisionModel`] only, so tests can substitute a fake
//! that returns canned text. [`ProviderModel`] is the production
//! implementation on top of an `edgequake_llm` provider. It sends one
//! request per call and never retries: a failure reaches the caller
//! immediately and resubmitting is the caller's decision.

use crate::config::ServiceConfig;
use crate::error::ServiceError;
use async_trait::async_trait;
use edgequake_llm::{
    AnthropicProvider, ChatMessage, CompletionOptions, GeminiProvider, ImageData, LLMProvider,
    OpenAIProvider, ProviderFactory,
};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};

/// One model request: instruction text plus ordered images.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub prompt: String,
    pub images: Vec<ImageData>,
}

impl ModelRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            images: Vec::new(),
        }
    }

    pub fn with_images(mut self, images: Vec<ImageData>) -> Self {
        self.images = images;
        self
    }

    pub fn with_image(mut self, image: ImageData) -> Self {
        self.images.push(image);
        self
    }
}

/// Abstract text-generation capability.
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Generate text for `request`.
    async fn generate(&self, request: ModelRequest) -> Result<String, ServiceError>;

    /// Fail fast when the model cannot possibly be called (missing
    /// credential), before any expensive preparation work.
    fn check_ready(&self) -> Result<(), ServiceError> {
        Ok(())
    }
}

enum ProviderSlot {
    Ready(Arc<dyn LLMProvider>),
    Unavailable(ServiceError),
}

/// [`VisionModel`] backed by an `edgequake_llm` provider.
pub struct ProviderModel {
    slot: ProviderSlot,
    provider_name: String,
    temperature: f32,
    max_tokens: usize,
    api_timeout_secs: u64,
}

impl ProviderModel {
    /// Construct the provider once, at startup.
    ///
    /// A missing credential or a provider that cannot be built is logged
    /// here and reported again on every call; it never aborts startup.
    pub fn from_config(config: &ServiceConfig) -> Self {
        let slot = if config.is_missing_credential() {
            let var = config.credential_var().unwrap_or("LLM_API_KEY");
            warn!(
                "{} not found in environment; model-dependent endpoints will fail until it is set",
                var
            );
            ProviderSlot::Unavailable(ServiceError::MissingCredential {
                provider: config.provider_name.clone(),
                var: var.to_string(),
            })
        } else {
            match build_provider(config) {
                Ok(provider) => {
                    info!(
                        "LLM provider ready: {} / {}",
                        config.provider_name, config.model
                    );
                    ProviderSlot::Ready(provider)
                }
                Err(e) => {
                    warn!("LLM provider '{}' unavailable: {}", config.provider_name, e);
                    ProviderSlot::Unavailable(ServiceError::ProviderNotConfigured {
                        provider: config.provider_name.clone(),
                        hint: format!("{e}"),
                    })
                }
            }
        };
        Self::with_slot(slot, config)
    }

    /// The model actually behind this capability, when one was built.
    pub fn provider_model(&self) -> Option<&str> {
        match &self.slot {
            ProviderSlot::Ready(p) => Some(p.model()),
            ProviderSlot::Unavailable(_) => None,
        }
    }

    /// Wrap an already-constructed provider.
    pub fn from_provider(provider: Arc<dyn LLMProvider>, config: &ServiceConfig) -> Self {
        Self::with_slot(ProviderSlot::Ready(provider), config)
    }

    fn with_slot(slot: ProviderSlot, config: &ServiceConfig) -> Self {
        Self {
            slot,
            provider_name: config.provider_name.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            api_timeout_secs: config.api_timeout_secs,
        }
    }

    fn provider(&self) -> Result<&Arc<dyn LLMProvider>, ServiceError> {
        match &self.slot {
            ProviderSlot::Ready(p) => Ok(p),
            ProviderSlot::Unavailable(e) => Err(replay(e)),
        }
    }

    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }
}

/// `ServiceError` is not `Clone`; rebuild the stored startup error per call.
fn replay(e: &ServiceError) -> ServiceError {
    match e {
        ServiceError::MissingCredential { provider, var } => ServiceError::MissingCredential {
            provider: provider.clone(),
            var: var.clone(),
        },
        ServiceError::ProviderNotConfigured { provider, hint } => {
            ServiceError::ProviderNotConfigured {
                provider: provider.clone(),
                hint: hint.clone(),
            }
        }
        other => ServiceError::Internal(other.to_string()),
    }
}

#[async_trait]
impl VisionModel for ProviderModel {
    async fn generate(&self, request: ModelRequest) -> Result<String, ServiceError> {
        let provider = self.provider()?;
        let start = Instant::now();
        let image_count = request.images.len();

        let messages = vec![ChatMessage::user_with_images(
            request.prompt.as_str(),
            request.images,
        )];
        let options = self.options();

        let response = timeout(
            Duration::from_secs(self.api_timeout_secs),
            provider.chat(&messages, Some(&options)),
        )
        .await
        .map_err(|_| ServiceError::ApiTimeout {
            secs: self.api_timeout_secs,
        })?
        .map_err(|e| ServiceError::LlmApiError {
            message: format!("{}", e),
        })?;

        debug!(
            "{}: {} image(s), {} input tokens, {} output tokens, {:?}",
            self.provider_name,
            image_count,
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );

        Ok(response.content)
    }

    fn check_ready(&self) -> Result<(), ServiceError> {
        self.provider().map(|_| ())
    }
}

/// Build the provider from the configured credential.
///
/// Hosted providers get `config.api_key` directly, so the key never has to
/// be re-exported into the environment. Anything else goes through
/// [`ProviderFactory`].
fn build_provider(config: &ServiceConfig) -> edgequake_llm::Result<Arc<dyn LLMProvider>> {
    let model = config.model.as_str();
    let Some(key) = config.api_key.clone() else {
        return ProviderFactory::create_llm_provider(&config.provider_name, model);
    };
    let provider: Arc<dyn LLMProvider> = match config.provider_name.to_ascii_lowercase().as_str() {
        "gemini" | "google" => Arc::new(GeminiProvider::new(key).with_model(model)),
        "openai" => Arc::new(OpenAIProvider::new(key).with_model(model)),
        "anthropic" => Arc::new(AnthropicProvider::new(key).with_model(model)),
        _ => ProviderFactory::create_llm_provider(&config.provider_name, model)?,
    };
    Ok(provider)
}
