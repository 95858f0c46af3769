//! PDF rasterisation and text extraction via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which is blocking and keeps
//! thread-local state. `tokio::task::spawn_blocking` moves the work onto the
//! blocking pool so Tokio worker threads keep serving other requests while a
//! paper is rendered.
//!
//! ## Why a fixed scale and a page cap?
//!
//! Exam pages are A4/Letter, so a 2× scale (144 DPI) gives the model legible
//! subscripts without multi-megabyte images. All rendered pages go into one
//! model request; the cap keeps that request bounded.

use crate::config::ServiceConfig;
use crate::error::ServiceError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One rasterised page, owned by the request that rendered it.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// 1-indexed page number in the source document.
    pub page_number: usize,
    pub image: DynamicImage,
}

impl RenderedPage {
    pub fn new(page_number: usize, image: DynamicImage) -> Self {
        Self { page_number, image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Render the first `config.max_pages` pages of the staged PDF.
pub async fn render_pages(
    pdf_path: &Path,
    config: &ServiceConfig,
) -> Result<Vec<RenderedPage>, ServiceError> {
    let path = pdf_path.to_path_buf();
    let lib_path = config.pdfium_lib_path.clone();
    let max_pages = config.max_pages;
    let scale = config.render_scale;
    let max_pixels = config.max_rendered_pixels;

    tokio::task::spawn_blocking(move || {
        render_pages_blocking(&path, lib_path.as_deref(), max_pages, scale, max_pixels)
    })
    .await
    .map_err(|e| ServiceError::Internal(format!("Render task panicked: {}", e)))?
}

/// Extract the plain text of the first `config.max_text_pages` pages.
///
/// Returns the text (pages separated by a blank line) and the number of
/// pages read.
pub async fn extract_text(
    pdf_path: &Path,
    config: &ServiceConfig,
) -> Result<(String, usize), ServiceError> {
    let path = pdf_path.to_path_buf();
    let lib_path = config.pdfium_lib_path.clone();
    let max_pages = config.max_text_pages;

    tokio::task::spawn_blocking(move || extract_text_blocking(&path, lib_path.as_deref(), max_pages))
        .await
        .map_err(|e| ServiceError::Internal(format!("Text task panicked: {}", e)))?
}

/// Bind pdfium from an explicit library file, or from the system search path.
pub fn bind_pdfium(lib_path: Option<&Path>) -> Result<Pdfium, ServiceError> {
    let bindings = match lib_path {
        Some(path) => Pdfium::bind_to_library(path),
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| ServiceError::PdfiumBindingFailed(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

fn open_document<'a>(
    pdfium: &'a Pdfium,
    pdf_path: &Path,
) -> Result<PdfDocument<'a>, ServiceError> {
    pdfium.load_pdf_from_file(pdf_path, None).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            ServiceError::PasswordRequired {
                name: file_label(pdf_path),
            }
        } else {
            ServiceError::CorruptPdf {
                path: PathBuf::from(file_label(pdf_path)),
                detail: err_str,
            }
        }
    })
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Blocking implementation of page rendering.
fn render_pages_blocking(
    pdf_path: &Path,
    lib_path: Option<&Path>,
    max_pages: usize,
    scale: f32,
    max_pixels: u32,
) -> Result<Vec<RenderedPage>, ServiceError> {
    let pdfium = bind_pdfium(lib_path)?;
    let document = open_document(&pdfium, pdf_path)?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    if total_pages == 0 {
        return Err(ServiceError::EmptyDocument);
    }

    let selected = total_pages.min(max_pages);
    if selected < total_pages {
        info!(
            "PDF has {} pages; rendering the first {}",
            total_pages, selected
        );
    } else {
        info!("PDF loaded: {} pages", total_pages);
    }

    let render_config = PdfRenderConfig::new()
        .scale_page_by_factor(scale)
        .set_maximum_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let mut results = Vec::with_capacity(selected);

    for idx in 0..selected {
        let page = pages
            .get(idx as u16)
            .map_err(|e| ServiceError::RasterisationFailed {
                page: idx + 1,
                detail: format!("{:?}", e),
            })?;

        let bitmap = page.render_with_config(&render_config).map_err(|e| {
            ServiceError::RasterisationFailed {
                page: idx + 1,
                detail: format!("{:?}", e),
            }
        })?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            idx + 1,
            image.width(),
            image.height()
        );

        results.push(RenderedPage::new(idx + 1, image));
    }

    Ok(results)
}

/// Blocking implementation of text extraction.
fn extract_text_blocking(
    pdf_path: &Path,
    lib_path: Option<&Path>,
    max_pages: usize,
) -> Result<(String, usize), ServiceError> {
    let pdfium = bind_pdfium(lib_path)?;
    let document = open_document(&pdfium, pdf_path)?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    let selected = total_pages.min(max_pages);

    let mut chunks = Vec::with_capacity(selected);
    for idx in 0..selected {
        let page = pages
            .get(idx as u16)
            .map_err(|e| ServiceError::RasterisationFailed {
                page: idx + 1,
                detail: format!("{:?}", e),
            })?;
        let text = page
            .text()
            .map_err(|e| ServiceError::RasterisationFailed {
                page: idx + 1,
                detail: format!("text layer unavailable: {:?}", e),
            })?
            .all();
        chunks.push(text.trim().to_string());
    }

    debug!("Extracted text from {} of {} pages", selected, total_pages);
    Ok((join_page_text(&chunks), selected))
}

/// Join per-page text with blank lines, dropping empty pages.
fn join_page_text(chunks: &[String]) -> String {
    chunks
        .iter()
        .filter(|c| !c.is_empty())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn rendered_page_reports_dimensions() {
        let page = RenderedPage::new(
            1,
            DynamicImage::ImageRgb8(RgbImage::from_pixel(120, 80, Rgb([255, 255, 255]))),
        );
        assert_eq!((page.width(), page.height()), (120, 80));
        assert_eq!(page.page_number, 1);
    }

    #[test]
    fn page_text_skips_blank_pages() {
        let chunks = vec!["Page one".to_string(), String::new(), "Page three".to_string()];
        assert_eq!(join_page_text(&chunks), "Page one\n\nPage three");
    }

    #[test]
    fn missing_library_is_a_binding_error() {
        let err = bind_pdfium(Some(Path::new("/definitely/not/libpdfium.so"))).unwrap_err();
        assert!(matches!(err, ServiceError::PdfiumBindingFailed(_)));
    }
}
