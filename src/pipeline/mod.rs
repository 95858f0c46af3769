//! Pipeline stages for question extraction.
//!
//! Each submodule implements exactly one transformation step, so each can be
//! tested without the others and without a live model.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ encode ──▶ llm ──▶ normalize ──▶ crop ──▶ format
//! (temp file) (pdfium) (base64)  (VLM)   (JSON repair) (bbox)  (Question)
//! ```
//!
//! 1. [`input`]:    stage an upload or downloaded URL in a random temp file
//! 2. [`render`]:   rasterise the first pages; runs in `spawn_blocking`
//!    because pdfium is blocking
//! 3. [`encode`]:   PNG+base64 for the model, JPEG data URLs for crops
//! 4. [`llm`]:      the [`llm::VisionModel`] capability and its
//!    provider-backed implementation; the only stage talking to the model
//! 5. [`normalize`]: fence stripping and the two-stage JSON parse
//! 6. [`crop`]:     bounding box → pixel rectangle → cropped data URL
//! 7. [`format`]:   raw objects → [`crate::output::Question`]

pub mod crop;
pub mod encode;
pub mod format;
pub mod input;
pub mod llm;
pub mod normalize;
pub mod render;
