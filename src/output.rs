//! Request and response payloads, plus the lenient view of the model's
//! per-question JSON.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ── Extraction ───────────────────────────────────────────────────────────

/// Question category reported to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    #[default]
    Text,
    Math,
    Image,
}

impl QuestionType {
    /// Parse a model label; unknown labels fall back to `Text`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "math" => QuestionType::Math,
            "image" | "diagram" | "figure" => QuestionType::Image,
            _ => QuestionType::Text,
        }
    }
}

/// One extracted question, as returned by `POST /extract`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub number: String,
    #[serde(rename = "type")]
    pub kind: QuestionType,
    pub content: String,
    pub marks: u32,
    #[serde(rename = "isMath")]
    pub is_math: bool,
    #[serde(rename = "hasImage")]
    pub has_image: bool,
    /// `data:image/jpeg;base64,…`, or `null` when no diagram was cropped.
    pub image_base64: Option<String>,
}

/// Response body of `POST /extract`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub questions: Vec<Question>,
    pub total: usize,
}

impl ExtractionResult {
    pub fn new(questions: Vec<Question>) -> Self {
        let total = questions.len();
        Self { questions, total }
    }
}

/// One object of the model's JSON array.
///
/// Models drift on types (`"marks": "2"`, `"page_number": "3"`,
/// `"hasImage": "true"`), so the object is kept as-is and read through
/// tolerant accessors instead of a strict `Deserialize`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawQuestion {
    fields: Map<String, Value>,
}

impl RawQuestion {
    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    fn get(&self, keys: &[&str]) -> Option<&Value> {
        keys.iter()
            .filter_map(|k| self.fields.get(*k))
            .find(|v| !v.is_null())
    }

    /// Question label; absent → `"?"`.
    pub fn number(&self) -> String {
        match self.get(&["number", "question_number"]) {
            Some(Value::String(s)) => s.trim().to_string(),
            Some(other) => other.to_string(),
            None => "?".to_string(),
        }
    }

    pub fn kind(&self) -> QuestionType {
        self.get(&["type"])
            .and_then(Value::as_str)
            .map(QuestionType::from_label)
            .unwrap_or_default()
    }

    pub fn content(&self) -> String {
        match self.get(&["content", "text"]) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        }
    }

    /// Marks; absent or unreadable → 0.
    pub fn marks(&self) -> u32 {
        self.get(&["marks"]).and_then(value_as_marks).unwrap_or(0)
    }

    pub fn is_math(&self) -> bool {
        self.get(&["isMath", "is_math"])
            .and_then(value_as_bool)
            .unwrap_or(false)
    }

    pub fn has_image(&self) -> bool {
        self.get(&["hasImage", "has_image"])
            .and_then(value_as_bool)
            .unwrap_or(false)
    }

    /// 1-indexed page holding the diagram, if declared.
    pub fn page_number(&self) -> Option<i64> {
        self.get(&["page_number", "page"]).and_then(value_as_i64)
    }

    /// Raw `visual_bbox` value, validated later by the cropper.
    pub fn visual_bbox(&self) -> Option<&Value> {
        self.get(&["visual_bbox", "bbox"])
    }
}

fn value_as_bool(v: &Value) -> Option<bool> {
    match v {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        },
        Value::Number(n) => n.as_i64().map(|i| i != 0),
        _ => None,
    }
}

pub(crate) fn value_as_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Value::String(s) => s.trim().parse::<f64>().ok().map(|f| f.round() as i64),
        _ => None,
    }
}

/// Accepts `2`, `2.5`, `"2"`, `"2 marks"`, `"[5]"`.
fn value_as_marks(v: &Value) -> Option<u32> {
    match v {
        Value::String(s) => {
            let digits: String = s
                .trim_start_matches(|c: char| !c.is_ascii_digit() && c != '-')
                .chars()
                .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                .collect();
            digits.parse::<f64>().ok().map(clamp_marks)
        }
        Value::Number(n) => n.as_f64().map(clamp_marks),
        _ => None,
    }
}

fn clamp_marks(f: f64) -> u32 {
    if f.is_finite() && f > 0.0 {
        f.round().min(u32::MAX as f64) as u32
    } else {
        0
    }
}

// ── Solve ────────────────────────────────────────────────────────────────

/// Body of `POST /solve`.
#[derive(Debug, Clone, Deserialize)]
pub struct SolveRequest {
    pub content: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolveResponse {
    pub solution: String,
}

// ── Auxiliary endpoints ──────────────────────────────────────────────────

/// Response of `POST /extract-pdf-text`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextResponse {
    pub text: String,
    pub pages: usize,
}

/// Body of `POST /fork-template`.
#[derive(Debug, Clone, Deserialize)]
pub struct ForkRequest {
    pub template_text: String,
    pub child_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForkResponse {
    #[serde(rename = "rewrittenContent")]
    pub rewritten_content: String,
}

/// Response of `POST /resume-diff`; missing lists default to empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResumeDiff {
    pub resume1_strengths: Vec<String>,
    pub resume2_strengths: Vec<String>,
    pub suggestions: Vec<String>,
    pub overall_comparison: String,
}

/// Body of `POST /generate-html`.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateHtmlRequest {
    pub content: String,
    #[serde(default)]
    pub title: Option<String>,
}
