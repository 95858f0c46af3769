//! Property-based tests for the bounding-box mapping and JSON normalisation.

use proptest::prelude::*;
use pyq_extract::pipeline::crop::BoundingBox;
use pyq_extract::pipeline::normalize::{parse_model_json, repair_backslashes};
use pyq_extract::CropError;
use serde_json::json;

// ============================================================
// Strategies
// ============================================================

/// LaTeX commands whose first letter is not a JSON escape other than `b`/`f`.
const COMMANDS: &[&str] = &[
    "frac", "sqrt", "alpha", "beta", "int", "sum", "cdot", "pi", "left", "mathbb", "lambda",
    "sigma", "infty", "partial", "gamma", "delta", "forall", "bar",
];

fn latex_expression() -> impl Strategy<Value = String> {
    prop::collection::vec(
        (prop::sample::select(COMMANDS), "[a-z0-9]{1,5}"),
        1..6,
    )
    .prop_map(|parts| {
        parts
            .into_iter()
            .map(|(cmd, arg)| format!("\\{cmd}{{{arg}}}"))
            .collect::<Vec<_>>()
            .join(" + ")
    })
}

/// Text without the control characters JSON encodes as `\b` / `\f`.
fn plain_text() -> impl Strategy<Value = String> {
    "[ -~\n\t\u{e9}\u{3c0}]{0,60}"
}

fn commentary() -> impl Strategy<Value = String> {
    "[A-Za-z ,.!]{0,40}"
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    // ============================================================
    // Bounding box → pixels
    // ============================================================

    #[test]
    fn pixel_rect_stays_inside_image(
        y0 in -200i64..1200, x0 in -200i64..1200,
        y1 in -200i64..1200, x1 in -200i64..1200,
        w in 1u32..5000, h in 1u32..5000,
    ) {
        match BoundingBox::new(y0, x0, y1, x1) {
            Ok(b) => {
                let r = b.to_pixels(w, h).unwrap();
                prop_assert!(r.left < r.right && r.right <= w);
                prop_assert!(r.top < r.bottom && r.bottom <= h);
                prop_assert!(r.width() >= 1 && r.height() >= 1);
                prop_assert!(u64::from(r.left) * 1000 <= b.xmin as u64 * u64::from(w));
                prop_assert!(u64::from(r.right) * 1000 >= b.xmax as u64 * u64::from(w));
            }
            Err(e) => {
                let degenerate = matches!(e, CropError::DegenerateBox { .. });
                prop_assert!(degenerate);
                let c = |v: i64| v.clamp(0, 1000);
                prop_assert!(c(y0) >= c(y1) || c(x0) >= c(x1));
            }
        }
    }

    // ============================================================
    // JSON repair
    // ============================================================

    #[test]
    fn repair_leaves_valid_json_untouched(text in plain_text()) {
        let valid = json!([{ "content": text }]).to_string();
        prop_assert_eq!(repair_backslashes(&valid), valid);
    }

    #[test]
    fn repair_is_idempotent_after_one_pass(text in plain_text(), latex in latex_expression()) {
        let raw = format!("[{{\"content\": \"{} {}\"}}]", text.replace(['"', '\\'], ""), latex);
        let once = repair_backslashes(&raw);
        prop_assert_eq!(repair_backslashes(&once), once.clone());
    }

    #[test]
    fn single_escaped_latex_round_trips(latex in latex_expression()) {
        let raw = format!("[{{\"content\": \"${latex}$\", \"isMath\": true}}]");
        let value = parse_model_json(&raw).unwrap();
        prop_assert_eq!(value[0]["content"].as_str().unwrap(), format!("${latex}$"));
    }

    #[test]
    fn double_escaped_latex_round_trips(latex in latex_expression()) {
        let raw = json!([{ "content": latex }]).to_string();
        let value = parse_model_json(&raw).unwrap();
        prop_assert_eq!(value[0]["content"].as_str().unwrap(), latex.as_str());
    }

    #[test]
    fn fences_and_commentary_are_ignored(
        before in commentary(),
        after in commentary(),
        text in plain_text(),
    ) {
        let text = text.replace('`', "");
        let payload = json!([{ "number": "1", "content": text }]).to_string();
        let reply = format!("{before}\n```json\n{payload}\n```\n{after}");
        let value = parse_model_json(&reply).unwrap();
        prop_assert_eq!(&value[0]["content"], &json!(text));
    }
}
