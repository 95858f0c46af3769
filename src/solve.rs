//! `/solve`: ask the model for a worked solution to one question.

use crate::config::ServiceConfig;
use crate::error::ServiceError;
use crate::output::{SolveRequest, SolveResponse};
use crate::pipeline::encode::image_data_from_bytes;
use crate::pipeline::input::{load_reference_image, FetchLimits};
use crate::pipeline::llm::{ModelRequest, VisionModel};
use crate::prompts::solve_prompt;
use edgequake_llm::ImageData;
use tracing::{debug, warn};

/// Solve a single question, optionally with its diagram.
///
/// A reference image that cannot be loaded or decoded is logged and
/// skipped; the question is then solved from its text alone. The model's
/// reply is returned verbatim.
pub async fn solve_question(
    request: SolveRequest,
    model: &dyn VisionModel,
    client: &reqwest::Client,
    config: &ServiceConfig,
) -> Result<SolveResponse, ServiceError> {
    if request.content.trim().is_empty() {
        return Err(ServiceError::InvalidRequest(
            "question content is empty".into(),
        ));
    }
    model.check_ready()?;

    let image = match request.image_url.as_deref().map(str::trim) {
        Some(url) if !url.is_empty() => reference_image(url, client, config).await,
        _ => None,
    };

    let prompt = solve_prompt(config.solve_style, &request.content, image.is_some());
    let mut model_request = ModelRequest::new(prompt);
    if let Some(img) = image {
        model_request = model_request.with_image(img);
    }

    let solution = model.generate(model_request).await?;
    debug!("Solution: {} chars", solution.len());
    Ok(SolveResponse { solution })
}

async fn reference_image(
    url: &str,
    client: &reqwest::Client,
    config: &ServiceConfig,
) -> Option<ImageData> {
    let bytes = match load_reference_image(client, url, FetchLimits::from_config(config)).await {
        Ok(b) => b,
        Err(e) => {
            warn!("Reference image unavailable, solving text-only: {}", e);
            return None;
        }
    };
    match image_data_from_bytes(&bytes) {
        Ok(data) => Some(data),
        Err(e) => {
            warn!("Reference image is not a readable image, solving text-only: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        last: Mutex<Option<ModelRequest>>,
    }

    #[async_trait]
    impl VisionModel for Recorder {
        async fn generate(&self, request: ModelRequest) -> Result<String, ServiceError> {
            *self.last.lock().unwrap() = Some(request);
            Ok("  **Answer:** $x = 2$\n".into())
        }
    }

    fn config() -> ServiceConfig {
        ServiceConfig::builder()
            .api_key(Some("test".into()))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn reply_is_returned_unchanged() {
        let model = Recorder::default();
        let resp = solve_question(
            SolveRequest {
                content: "Solve x + 2 = 4".into(),
                image_url: None,
            },
            &model,
            &reqwest::Client::new(),
            &config(),
        )
        .await
        .unwrap();
        assert_eq!(resp.solution, "  **Answer:** $x = 2$\n");

        let sent = model.last.lock().unwrap().take().unwrap();
        assert!(sent.prompt.contains("Solve x + 2 = 4"));
        assert!(sent.images.is_empty());
    }

    #[tokio::test]
    async fn unreadable_image_falls_back_to_text() {
        let model = Recorder::default();
        solve_question(
            SolveRequest {
                content: "Describe the circuit.".into(),
                image_url: Some("data:image/png;base64,bm90IGFuIGltYWdl".into()),
            },
            &model,
            &reqwest::Client::new(),
            &config(),
        )
        .await
        .unwrap();
        let sent = model.last.lock().unwrap().take().unwrap();
        assert!(sent.images.is_empty());
    }

    #[tokio::test]
    async fn empty_content_is_rejected() {
        let err = solve_question(
            SolveRequest {
                content: "   ".into(),
                image_url: None,
            },
            &Recorder::default(),
            &reqwest::Client::new(),
            &config(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidRequest(_)));
    }
}
