//! `/extract`: turn an exam paper into a structured question list.
//!
//! The flow is linear and request-scoped:
//!
//! ```text
//! check_ready → stage → render → encode → model → normalize → crop → format
//! ```
//!
//! The model is checked first so a missing credential costs nothing: no
//! download, no temp file, no rasterisation. Everything after staging lives
//! in memory and the staged PDF is removed when this function returns.

use crate::config::ServiceConfig;
use crate::error::ServiceError;
use crate::output::ExtractionResult;
use crate::pipeline::crop::crop_question_image;
use crate::pipeline::encode::encode_page;
use crate::pipeline::format::format_questions;
use crate::pipeline::input::{stage_pdf, FetchLimits, PdfSource};
use crate::pipeline::llm::{ModelRequest, VisionModel};
use crate::pipeline::normalize::{parse_model_json, question_list};
use crate::pipeline::render::{render_pages, RenderedPage};
use crate::prompts::EXTRACTION_PROMPT;
use std::time::Instant;
use tracing::{debug, info};

/// Extract questions from an uploaded or remote exam paper.
pub async fn extract_questions(
    source: PdfSource,
    model: &dyn VisionModel,
    client: &reqwest::Client,
    config: &ServiceConfig,
) -> Result<ExtractionResult, ServiceError> {
    model.check_ready()?;

    let start = Instant::now();
    info!("Extracting questions from {}", source.label());

    // ── Stage + render ───────────────────────────────────────────────────
    let staged = stage_pdf(source, client, FetchLimits::from_config(config)).await?;
    let pages = render_pages(staged.path(), config).await?;
    debug!(
        "Rendered {} page(s) of '{}' in {:?}",
        pages.len(),
        staged.name(),
        start.elapsed()
    );

    let result = extract_from_pages(&pages, model).await?;
    info!(
        "Extracted {} question(s) from '{}' in {:?}",
        result.total,
        staged.name(),
        start.elapsed()
    );
    Ok(result)
}

/// Run the model half of extraction over already-rendered pages.
pub async fn extract_from_pages(
    pages: &[RenderedPage],
    model: &dyn VisionModel,
) -> Result<ExtractionResult, ServiceError> {
    // ── Encode ───────────────────────────────────────────────────────────
    let images = pages
        .iter()
        .map(|p| {
            encode_page(&p.image).map_err(|e| ServiceError::RasterisationFailed {
                page: p.page_number,
                detail: format!("encode: {e}"),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    // ── Model ────────────────────────────────────────────────────────────
    let request = ModelRequest::new(EXTRACTION_PROMPT).with_images(images);
    let reply = model.generate(request).await?;

    // ── Normalize + crop + format ────────────────────────────────────────
    let raw_questions = question_list(parse_model_json(&reply)?)?;
    let result = format_questions(raw_questions.into_iter().map(|q| {
        let crop = crop_question_image(&q, pages);
        (q, crop)
    }));

    let with_images = result
        .questions
        .iter()
        .filter(|q| q.image_base64.is_some())
        .count();
    debug!(
        "{} question(s), {} with cropped diagrams",
        result.total, with_images
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use image::{DynamicImage, Rgb, RgbImage};
    use std::sync::Mutex;

    struct Canned {
        reply: String,
        seen_images: Mutex<usize>,
    }

    #[async_trait]
    impl VisionModel for Canned {
        async fn generate(&self, request: ModelRequest) -> Result<String, ServiceError> {
            *self.seen_images.lock().unwrap() = request.images.len();
            Ok(self.reply.clone())
        }
    }

    fn pages(n: usize) -> Vec<RenderedPage> {
        (1..=n)
            .map(|i| {
                RenderedPage::new(
                    i,
                    DynamicImage::ImageRgb8(RgbImage::from_pixel(60, 80, Rgb([255, 255, 255]))),
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn every_page_is_sent_in_one_request() {
        let model = Canned {
            reply: "[]".into(),
            seen_images: Mutex::new(0),
        };
        let result = extract_from_pages(&pages(3), &model).await.unwrap();
        assert_eq!(result.total, 0);
        assert_eq!(*model.seen_images.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn non_json_reply_is_a_format_error() {
        let model = Canned {
            reply: "Sorry, the scan is unreadable.".into(),
            seen_images: Mutex::new(0),
        };
        let err = extract_from_pages(&pages(1), &model).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidModelOutput { .. }));
    }

    #[tokio::test]
    async fn bad_box_does_not_fail_the_request() {
        let model = Canned {
            reply: r#"[{"number": "1", "hasImage": true, "page_number": 1, "visual_bbox": [500, 500, 100, 100]}]"#.into(),
            seen_images: Mutex::new(0),
        };
        let result = extract_from_pages(&pages(1), &model).await.unwrap();
        assert_eq!(result.total, 1);
        assert!(result.questions[0].has_image);
        assert!(result.questions[0].image_base64.is_none());
    }
}
