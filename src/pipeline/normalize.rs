//! Normalisation of the model's reply into JSON.
//!
//! Even with "return ONLY a JSON array" in the prompt, models sometimes wrap
//! the array in a fenced block, surround it with commentary, or emit LaTeX
//! with bare backslashes (`\frac`, `\sqrt`) that are not valid JSON escapes.
//! The parse is therefore two-stage:
//!
//! 1. strip fences, parse as-is;
//! 2. on failure, double every backslash that does not start a valid JSON
//!    escape and parse again.
//!
//! A bare `\frac` or `\beta` is a special case: `\f` and `\b` *are* valid
//! escapes, so stage 1 succeeds and silently yields form-feed/backspace
//! characters. Those never occur in exam text, so their presence after a
//! successful parse also triggers the repair pass.
//!
//! The repair is a heuristic. It can miss (`\theta` decodes as a tab plus
//! `heta`) and, for strings that really contain form feeds, over-repair.

use crate::error::ServiceError;
use crate::output::RawQuestion;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

static RE_FENCED_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```[ \t]*([A-Za-z0-9_+-]*)[ \t]*(?:\r?\n)?(.*?)```").unwrap());

static RE_OPEN_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```[ \t]*[A-Za-z0-9_+-]*[ \t]*(?:\r?\n)?").unwrap());

/// Return the payload of the first fenced block, preferring one tagged `json`.
///
/// Text without fences is returned trimmed. A fence may sit on one line with
/// its payload (```` ```json [..] ``` ````). An opening fence that is never
/// closed yields everything after its tag.
pub fn strip_code_fences(text: &str) -> &str {
    if !text.contains("```") {
        return text.trim();
    }

    let mut first: Option<&str> = None;
    for caps in RE_FENCED_BLOCK.captures_iter(text) {
        let body = caps.get(2).map_or("", |m| m.as_str());
        if caps[1].eq_ignore_ascii_case("json") {
            return body.trim();
        }
        first.get_or_insert(body);
    }
    if let Some(body) = first {
        return body.trim();
    }

    match RE_OPEN_FENCE.find(text) {
        Some(m) => text[m.end()..].trim(),
        None => text.trim(),
    }
}

/// Double every backslash that does not start a valid JSON escape.
///
/// Valid escapes (`\"`, `\\`, `\/`, `\n`, `\r`, `\t`, `\uXXXX`) are copied
/// unchanged, so running this on valid JSON leaves it as it was. `\b` and
/// `\f` followed by an ASCII letter are read as LaTeX commands (`\beta`,
/// `\frac`) and doubled.
pub fn repair_backslashes(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 16);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c != '\\' {
            out.push(c);
            i += 1;
            continue;
        }

        let next = chars.get(i + 1).copied();
        let after = chars.get(i + 2).copied();
        let keep = match next {
            Some('"' | '\\' | '/' | 'n' | 'r' | 't') => true,
            Some('b' | 'f') => !after.is_some_and(|a| a.is_ascii_alphabetic()),
            Some('u') => chars
                .get(i + 2..i + 6)
                .is_some_and(|hex| hex.iter().all(char::is_ascii_hexdigit)),
            _ => false,
        };

        if keep {
            out.push('\\');
            if let Some(n) = next {
                out.push(n);
            }
            i += 2;
        } else {
            out.push_str("\\\\");
            i += 1;
        }
    }

    out
}

/// True when any string in `value` holds a backspace or form feed.
fn has_stray_control_chars(value: &Value) -> bool {
    match value {
        Value::String(s) => s.contains(['\u{0008}', '\u{000C}']),
        Value::Array(items) => items.iter().any(has_stray_control_chars),
        Value::Object(map) => map.values().any(has_stray_control_chars),
        _ => false,
    }
}

/// Parse the model's reply into JSON, repairing it when needed.
pub fn parse_model_json(raw: &str) -> Result<Value, ServiceError> {
    let body = strip_code_fences(raw);

    match serde_json::from_str::<Value>(body) {
        Ok(value) if !has_stray_control_chars(&value) => Ok(value),
        Ok(value) => {
            debug!("Direct parse produced control characters; retrying with LaTeX repair");
            Ok(serde_json::from_str::<Value>(&repair_backslashes(body)).unwrap_or(value))
        }
        Err(first) => {
            debug!("Direct JSON parse failed ({}); retrying after repair", first);
            serde_json::from_str::<Value>(&repair_backslashes(body)).map_err(|e| {
                warn!("Model output is not JSON even after repair: {}", e);
                debug!("Raw model output: {}", raw);
                ServiceError::InvalidModelOutput {
                    detail: e.to_string(),
                }
            })
        }
    }
}

/// Pull the list of question objects out of the parsed reply.
///
/// Accepts a bare array or an object with a `questions` array. Array items
/// that are not objects are skipped.
pub fn question_list(value: Value) -> Result<Vec<RawQuestion>, ServiceError> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("questions") {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(ServiceError::InvalidModelOutput {
                    detail: "expected a JSON array of questions".into(),
                })
            }
        },
        other => {
            return Err(ServiceError::InvalidModelOutput {
                detail: format!("expected a JSON array of questions, got {}", type_name(&other)),
            })
        }
    };

    let total = items.len();
    let questions: Vec<RawQuestion> = items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(map) => Some(RawQuestion::from_map(map)),
            other => {
                warn!("Skipping non-object question entry: {}", type_name(&other));
                None
            }
        })
        .collect();

    if questions.len() < total {
        debug!("Kept {}/{} question entries", questions.len(), total);
    }
    Ok(questions)
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn no_fences_passthrough() {
        assert_eq!(strip_code_fences("  [1, 2]\n"), "[1, 2]");
    }

    #[test]
    fn json_fence_preferred_over_earlier_fence() {
        let input = "Here is some code:\n```python\nprint(1)\n```\nand the data:\n```json\n[{\"a\": 1}]\n```\nDone.";
        assert_eq!(strip_code_fences(input), "[{\"a\": 1}]");
    }

    #[test]
    fn json_fence_tag_is_case_insensitive() {
        assert_eq!(strip_code_fences("```JSON\n[]\n```"), "[]");
    }

    #[test]
    fn untagged_fence_is_used() {
        assert_eq!(strip_code_fences("Sure!\n```\n{\"x\": 2}\n```\nBye"), "{\"x\": 2}");
    }

    #[test]
    fn unterminated_fence_takes_rest() {
        assert_eq!(strip_code_fences("```json\n[1, 2, 3]"), "[1, 2, 3]");
    }

    #[test]
    fn one_line_fence_keeps_payload() {
        let raw = "```json [{\"number\": \"1\", \"content\": \"Define entropy.\"}] ```";
        assert_eq!(
            strip_code_fences(raw),
            "[{\"number\": \"1\", \"content\": \"Define entropy.\"}]"
        );
        let v = parse_model_json(raw).unwrap();
        assert_eq!(v[0]["content"], "Define entropy.");
    }

    #[test]
    fn one_line_unterminated_fence_keeps_payload() {
        assert_eq!(strip_code_fences("```json [1, 2]"), "[1, 2]");
    }

    #[test]
    fn crlf_fence_is_stripped() {
        assert_eq!(strip_code_fences("```json\r\n[3]\r\n```"), "[3]");
    }

    #[test]
    fn surrounding_commentary_is_ignored() {
        let raw = "I found these questions:\n```json\n[{\"number\": \"1\", \"content\": \"Define entropy.\"}]\n```\nLet me know if you need more.";
        let v = parse_model_json(raw).unwrap();
        assert_eq!(v[0]["content"], "Define entropy.");
    }

    #[test]
    fn repair_doubles_invalid_escapes() {
        assert_eq!(repair_backslashes(r#""\sqrt{2}""#), r#""\\sqrt{2}""#);
        assert_eq!(repair_backslashes(r#""\alpha""#), r#""\\alpha""#);
        assert_eq!(repair_backslashes(r#""\underline{x}""#), r#""\\underline{x}""#);
    }

    #[test]
    fn repair_keeps_valid_escapes() {
        let valid = r#"{"a": "line\nnext \"q\" \\frac \/ é tab\t"}"#;
        assert_eq!(repair_backslashes(valid), valid);
    }

    #[test]
    fn repair_treats_frac_and_beta_as_latex() {
        assert_eq!(repair_backslashes(r#""\frac{1}{2}""#), r#""\\frac{1}{2}""#);
        assert_eq!(repair_backslashes(r#""\beta""#), r#""\\beta""#);
        assert_eq!(repair_backslashes(r#""a\f""#), r#""a\f""#);
    }

    #[test]
    fn trailing_backslash_is_doubled() {
        assert_eq!(repair_backslashes("abc\\"), "abc\\\\");
    }

    #[test]
    fn double_escaped_latex_parses_directly() {
        let raw = r#"[{"content": "E = \\frac{1}{2}mv^2"}]"#;
        let v = parse_model_json(raw).unwrap();
        assert_eq!(v[0]["content"], "E = \\frac{1}{2}mv^2");
    }

    #[test]
    fn single_escaped_frac_is_recovered() {
        let raw = r#"[{"content": "E = \frac{1}{2}mv^2"}]"#;
        let v = parse_model_json(raw).unwrap();
        assert_eq!(v[0]["content"], "E = \\frac{1}{2}mv^2");
    }

    #[test]
    fn invalid_escape_is_recovered() {
        let raw = r#"[{"content": "$\sqrt{x} + \alpha$"}]"#;
        let v = parse_model_json(raw).unwrap();
        assert_eq!(v[0]["content"], "$\\sqrt{x} + \\alpha$");
    }

    #[test]
    fn unrecoverable_output_is_format_error() {
        let err = parse_model_json("I could not read this paper, sorry.").unwrap_err();
        assert!(matches!(err, ServiceError::InvalidModelOutput { .. }));
    }

    #[test]
    fn question_list_accepts_array_and_wrapped_object() {
        let arr = question_list(json!([{"number": "1"}, {"number": "2"}])).unwrap();
        assert_eq!(arr.len(), 2);

        let wrapped = question_list(json!({"questions": [{"number": "1"}]})).unwrap();
        assert_eq!(wrapped.len(), 1);
        assert_eq!(wrapped[0].number(), "1");
    }

    #[test]
    fn question_list_skips_non_objects() {
        let list = question_list(json!([{"number": "1"}, "stray", 42])).unwrap();
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn question_list_rejects_scalars() {
        assert!(question_list(json!("nope")).is_err());
        assert!(question_list(json!({"items": []})).is_err());
    }
}
