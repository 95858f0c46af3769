//! Shape the model's raw objects into the client-facing [`Question`] list.

use super::crop::CropOutcome;
use crate::output::{ExtractionResult, Question, RawQuestion};
use uuid::Uuid;

/// Build one client question from its raw object and crop outcome.
pub fn format_question(raw: &RawQuestion, crop: CropOutcome) -> Question {
    Question {
        id: Uuid::new_v4().to_string(),
        number: raw.number(),
        kind: raw.kind(),
        content: raw.content(),
        marks: raw.marks(),
        is_math: raw.is_math(),
        has_image: raw.has_image(),
        image_base64: crop.into_data_url(),
    }
}

/// Pair raw questions with their crop outcomes, preserving model order.
pub fn format_questions<I>(items: I) -> ExtractionResult
where
    I: IntoIterator<Item = (RawQuestion, CropOutcome)>,
{
    let questions = items
        .into_iter()
        .map(|(raw, crop)| format_question(&raw, crop))
        .collect();
    ExtractionResult::new(questions)
}
