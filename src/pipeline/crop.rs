//! Diagram cropping.
//!
//! The model reports a diagram's position as `[ymin, xmin, ymax, xmax]` on a
//! 0–1000 scale relative to the page it saw. Mapping back to pixels rounds
//! outward (floor for the top-left corner, ceil for the bottom-right) so a
//! thin diagram never loses its edge row.
//!
//! Every failure here is per-question and non-fatal: the question is still
//! returned, just with `image_base64: null`.

use super::encode::encode_jpeg_data_url;
use super::render::RenderedPage;
use crate::error::CropError;
use crate::output::{value_as_i64, RawQuestion};
use serde_json::Value;
use tracing::{debug, warn};

/// Upper bound of the normalised coordinate scale.
pub const BOX_SCALE: i64 = 1000;

/// A box on the 0–1000 scale, already clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub ymin: i64,
    pub xmin: i64,
    pub ymax: i64,
    pub xmax: i64,
}

/// Pixel rectangle, right/bottom exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl PixelRect {
    pub fn width(&self) -> u32 {
        self.right - self.left
    }

    pub fn height(&self) -> u32 {
        self.bottom - self.top
    }
}

impl BoundingBox {
    /// Build a box from raw coordinates, clamping each into 0–1000.
    pub fn new(ymin: i64, xmin: i64, ymax: i64, xmax: i64) -> Result<Self, CropError> {
        let c = |v: i64| v.clamp(0, BOX_SCALE);
        let (ymin, xmin, ymax, xmax) = (c(ymin), c(xmin), c(ymax), c(xmax));
        if ymin >= ymax || xmin >= xmax {
            return Err(CropError::DegenerateBox {
                ymin,
                xmin,
                ymax,
                xmax,
            });
        }
        Ok(Self {
            ymin,
            xmin,
            ymax,
            xmax,
        })
    }

    /// Parse the model's `visual_bbox`: exactly four numbers.
    pub fn from_value(value: &Value) -> Result<Self, CropError> {
        let items = value
            .as_array()
            .ok_or_else(|| CropError::InvalidBox(format!("expected an array, got {value}")))?;
        if items.len() != 4 {
            return Err(CropError::InvalidBox(format!(
                "expected 4 coordinates, got {}",
                items.len()
            )));
        }

        let mut coords = [0i64; 4];
        for (slot, item) in coords.iter_mut().zip(items) {
            *slot = value_as_i64(item)
                .ok_or_else(|| CropError::InvalidBox(format!("non-numeric coordinate {item}")))?;
        }
        Self::new(coords[0], coords[1], coords[2], coords[3])
    }

    /// Map onto a `width` × `height` image.
    ///
    /// The result always lies inside the image and has non-zero area.
    pub fn to_pixels(&self, width: u32, height: u32) -> Result<PixelRect, CropError> {
        if width == 0 || height == 0 {
            return Err(CropError::InvalidBox(format!(
                "page image is {width}x{height}"
            )));
        }

        let (w, h) = (width as u64, height as u64);
        let scale = BOX_SCALE as u64;
        let floor = |v: i64, dim: u64| (v as u64 * dim) / scale;
        let ceil = |v: i64, dim: u64| (v as u64 * dim).div_ceil(scale);

        Ok(PixelRect {
            left: floor(self.xmin, w) as u32,
            top: floor(self.ymin, h) as u32,
            right: ceil(self.xmax, w).min(w) as u32,
            bottom: ceil(self.ymax, h).min(h) as u32,
        })
    }
}

/// Result of trying to crop one question's diagram.
#[derive(Debug, Clone, PartialEq)]
pub enum CropOutcome {
    /// JPEG data URL of the cropped region.
    Image(String),
    /// The question carries no usable diagram reference.
    NoImage,
    Failed(CropError),
}

impl CropOutcome {
    pub fn into_data_url(self) -> Option<String> {
        match self {
            CropOutcome::Image(url) => Some(url),
            _ => None,
        }
    }
}

/// Crop the diagram referenced by `question`, if any.
pub fn crop_question_image(question: &RawQuestion, pages: &[RenderedPage]) -> CropOutcome {
    if !question.has_image() {
        return CropOutcome::NoImage;
    }
    let (Some(page_number), Some(bbox)) = (question.page_number(), question.visual_bbox()) else {
        debug!(
            "Question {} flagged hasImage without page_number/visual_bbox",
            question.number()
        );
        return CropOutcome::NoImage;
    };

    let outcome = resolve_page(page_number, pages).and_then(|page| {
        let bbox = BoundingBox::from_value(bbox)?;
        crop_page(page, &bbox)
    });

    match outcome {
        Ok(url) => CropOutcome::Image(url),
        Err(e @ CropError::PageOutOfRange { .. }) => {
            debug!("Question {}: {}", question.number(), e);
            CropOutcome::Failed(e)
        }
        Err(e) => {
            warn!("Question {}: crop skipped, {}", question.number(), e);
            CropOutcome::Failed(e)
        }
    }
}

fn resolve_page(page_number: i64, pages: &[RenderedPage]) -> Result<&RenderedPage, CropError> {
    usize::try_from(page_number)
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|idx| pages.get(idx))
        .ok_or(CropError::PageOutOfRange {
            page: page_number,
            rendered: pages.len(),
        })
}

/// Crop `bbox` out of `page` and encode it as a JPEG data URL.
pub fn crop_page(page: &RenderedPage, bbox: &BoundingBox) -> Result<String, CropError> {
    let rect = bbox.to_pixels(page.width(), page.height())?;
    let region = page
        .image
        .crop_imm(rect.left, rect.top, rect.width(), rect.height());

    debug!(
        "Cropped page {} [{}, {}, {}, {}] → {}x{} px",
        page.page_number,
        bbox.ymin,
        bbox.xmin,
        bbox.ymax,
        bbox.xmax,
        region.width(),
        region.height()
    );

    encode_jpeg_data_url(&region).map_err(|e| CropError::Encode(e.to_string()))
}
