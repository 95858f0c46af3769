//! Auxiliary document flows used by the resume tools.
//!
//! * [`extract_document_text`]: plain text of a PDF, no model involved.
//! * [`fork_template`]: rewrite one resume in another's style.
//! * [`resume_diff`]: compare two resumes, reply normalised like `/extract`.
//! * [`generate_html`]: deterministic printable HTML from plain text.

use crate::config::ServiceConfig;
use crate::error::ServiceError;
use crate::output::{ForkRequest, ForkResponse, GenerateHtmlRequest, ResumeDiff, TextResponse};
use crate::pipeline::input::{stage_pdf, FetchLimits, PdfSource};
use crate::pipeline::llm::{ModelRequest, VisionModel};
use crate::pipeline::normalize::parse_model_json;
use crate::pipeline::render::extract_text;
use crate::prompts::{diff_prompt, fork_prompt};
use tracing::{debug, info};

/// Title used by [`generate_html`] when the request has none.
pub const DEFAULT_HTML_TITLE: &str = "Document";

/// Stage a PDF and read its text layer.
pub async fn extract_document_text(
    source: PdfSource,
    client: &reqwest::Client,
    config: &ServiceConfig,
) -> Result<TextResponse, ServiceError> {
    let staged = stage_pdf(source, client, FetchLimits::from_config(config)).await?;
    let (text, pages) = extract_text(staged.path(), config).await?;
    info!(
        "Read {} chars of text from {} page(s) of '{}'",
        text.len(),
        pages,
        staged.name()
    );
    Ok(TextResponse { text, pages })
}

/// Rewrite `child_text` following the structure and tone of `template_text`.
pub async fn fork_template(
    request: ForkRequest,
    model: &dyn VisionModel,
) -> Result<ForkResponse, ServiceError> {
    if request.template_text.trim().is_empty() {
        return Err(ServiceError::InvalidRequest("template_text is empty".into()));
    }
    if request.child_text.trim().is_empty() {
        return Err(ServiceError::InvalidRequest("child_text is empty".into()));
    }

    let prompt = fork_prompt(&request.template_text, &request.child_text);
    let rewritten = model.generate(ModelRequest::new(prompt)).await?;
    Ok(ForkResponse {
        rewritten_content: rewritten.trim().to_string(),
    })
}

/// Compare two resumes given as uploads or URLs.
pub async fn resume_diff(
    first: PdfSource,
    second: PdfSource,
    model: &dyn VisionModel,
    client: &reqwest::Client,
    config: &ServiceConfig,
) -> Result<ResumeDiff, ServiceError> {
    model.check_ready()?;

    let one = extract_document_text(first, client, config).await?;
    let two = extract_document_text(second, client, config).await?;
    for (label, doc) in [("resume1", &one), ("resume2", &two)] {
        if doc.text.trim().is_empty() {
            return Err(ServiceError::InvalidRequest(format!(
                "{label} has no extractable text (scanned PDFs are not supported)"
            )));
        }
    }

    let reply = model
        .generate(ModelRequest::new(diff_prompt(&one.text, &two.text)))
        .await?;
    parse_diff(&reply)
}

/// Normalise the model's diff reply into [`ResumeDiff`].
pub fn parse_diff(reply: &str) -> Result<ResumeDiff, ServiceError> {
    let value = parse_model_json(reply)?;
    if !value.is_object() {
        return Err(ServiceError::InvalidModelOutput {
            detail: "expected a JSON object".into(),
        });
    }
    serde_json::from_value(value).map_err(|e| {
        debug!("Diff reply has unexpected shape: {}", e);
        ServiceError::InvalidModelOutput {
            detail: e.to_string(),
        }
    })
}

// ── HTML rendering ───────────────────────────────────────────────────────

/// Render plain text as a standalone, print-friendly HTML page.
///
/// Lines starting with `#` become headings (`#` → `h1` … up to `h6`), lines
/// starting with `-`, `*` or `•` become list items, blank lines separate
/// paragraphs. All text is HTML-escaped.
pub fn generate_html(request: &GenerateHtmlRequest) -> String {
    let title = request
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(DEFAULT_HTML_TITLE);

    let mut body = String::new();
    let mut in_list = false;

    for line in request.content.lines() {
        let line = line.trim();

        if let Some(item) = list_item(line) {
            if !in_list {
                body.push_str("<ul>\n");
                in_list = true;
            }
            body.push_str(&format!("  <li>{}</li>\n", escape_html(item)));
            continue;
        }
        if in_list {
            body.push_str("</ul>\n");
            in_list = false;
        }
        if line.is_empty() {
            continue;
        }

        let level = line.chars().take_while(|c| *c == '#').count();
        if level > 0 {
            let level = level.min(6);
            let text = line.trim_start_matches('#').trim();
            body.push_str(&format!("<h{level}>{}</h{level}>\n", escape_html(text)));
        } else {
            body.push_str(&format!("<p>{}</p>\n", escape_html(line)));
        }
    }
    if in_list {
        body.push_str("</ul>\n");
    }

    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
<title>{title}</title>\n<style>\n{HTML_STYLE}</style>\n</head>\n<body>\n{body}</body>\n</html>\n",
        title = escape_html(title),
        body = body,
    )
}

const HTML_STYLE: &str = "body { font-family: Georgia, serif; max-width: 48rem; margin: 2rem auto; line-height: 1.5; }\n\
h1, h2, h3 { margin-bottom: 0.3rem; }\n\
ul { margin-top: 0.2rem; }\n\
@media print { body { margin: 0; } }\n";

fn list_item(line: &str) -> Option<&str> {
    ["- ", "* ", "• "]
        .iter()
        .find_map(|marker| line.strip_prefix(marker))
        .map(str::trim)
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn html(content: &str, title: Option<&str>) -> String {
        generate_html(&GenerateHtmlRequest {
            content: content.into(),
            title: title.map(String::from),
        })
    }

    #[test]
    fn headings_lists_and_paragraphs() {
        let out = html("# Jane Doe\n## Experience\n- Built <things>\n• Led team\n\nPlain & simple", None);
        assert!(out.contains("<title>Document</title>"));
        assert!(out.contains("<h1>Jane Doe</h1>"));
        assert!(out.contains("<h2>Experience</h2>"));
        assert!(out.contains("<ul>\n  <li>Built &lt;things&gt;</li>\n  <li>Led team</li>\n</ul>"));
        assert!(out.contains("<p>Plain &amp; simple</p>"));
    }

    #[test]
    fn output_is_deterministic() {
        assert_eq!(html("a\nb", Some("T")), html("a\nb", Some("T")));
    }

    #[test]
    fn title_is_escaped() {
        let out = html("x", Some("<script>"));
        assert!(out.contains("<title>&lt;script&gt;</title>"));
        assert!(!out.contains("<script>"));
    }

    #[test]
    fn diff_reply_is_normalised() {
        let reply = "```json\n{\"resume1Strengths\": [\"Rust\"], \"overallComparison\": \"Close.\"}\n```";
        let diff = parse_diff(reply).unwrap();
        assert_eq!(diff.resume1_strengths, vec!["Rust"]);
        assert!(diff.resume2_strengths.is_empty());
        assert_eq!(diff.overall_comparison, "Close.");
    }

    #[test]
    fn diff_reply_must_be_an_object() {
        assert!(matches!(
            parse_diff("[1, 2]"),
            Err(ServiceError::InvalidModelOutput { .. })
        ));
    }
}
