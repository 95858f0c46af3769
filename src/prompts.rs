//! Prompts sent to the vision model.
//!
//! Every instruction the service gives the model lives here so a prompt
//! change never touches pipeline code. The text is configuration, not logic:
//! what matters is the output contract each prompt asks for (a JSON array for
//! extraction, free text for solving and forking, a JSON object for diffing).

use crate::config::SolutionStyle;

/// Instruction for turning page images into a JSON array of questions.
pub const EXTRACTION_PROMPT: &str = r#"You are an expert exam digitizer.
Analyze the provided images of a question paper. The images are the pages of the paper, in order.
Extract every single question individually.

Rules:
1. If a question spans multiple pages, merge it into one.
2. Identify if the question is primarily text, math (contains equations), or image-based (relies on a diagram).
3. For Math: Convert all mathematical expressions to valid LaTeX enclosed in single $...$ for inline or $$...$$ for block.
   IMPORTANT: You must ESCAPE all backslashes in the JSON string (e.g., use "\\frac" instead of "\frac").
4. For Images: If the question has a diagram/figure:
   - Set "hasImage": true.
   - If you encounter tabular data, or graphs, consider them as images as well.
   - Provide "page_number" (integer, 1-indexed) indicating which page contains the image.
   - Provide "visual_bbox": [ymin, xmin, ymax, xmax] (integers, 0-1000 scale) representing the bounding box of the diagram. Leave some space on all 4 directions.
5. Marks: Give the marks for each question as an integer.
   - If the question states its own marks, use them.
   - If a section header states a total such as "10 x 2 = 20" or "(5 x 16 = 80 marks)", every question in that section gets total / count marks (here 2 and 16).
   - If marks cannot be determined, use 0.
6. Return ONLY a valid JSON array of objects. No commentary.

JSON Structure per object:
{
    "number": "Question number (e.g. 1, 2a, 3)",
    "type": "text" | "math" | "image",
    "content": "The full text content with LaTeX",
    "marks": int,
    "isMath": boolean,
    "hasImage": boolean,
    "page_number": int (optional),
    "visual_bbox": [ymin, xmin, ymax, xmax] (optional)
}"#;

/// Solve instruction producing HTML with embedded LaTeX.
pub const SOLVE_PROMPT_HTML: &str = r#"You are an expert university tutor. Solve the exam question below step by step.

Formatting rules:
- Answer in clean HTML fragments only: <h3>, <p>, <ol>, <ul>, <li>, <strong>, <em>, <table>. No <html>, <head> or <body> tags.
- Write all mathematics as LaTeX: $...$ inline, $$...$$ for display equations.
- Start with a one-line summary of the approach, then the worked steps, then a clearly marked final answer.
- If a reference image is attached, use it; if the question is ambiguous, state the assumption you made.
- Do not wrap the answer in markdown code fences."#;

/// Solve instruction producing plain text with LaTeX only.
pub const SOLVE_PROMPT_LATEX: &str = r#"You are an expert university tutor. Solve the exam question below step by step.

Formatting rules:
- Use plain text paragraphs and numbered steps. No HTML and no markdown headings.
- Write all mathematics as LaTeX: $...$ inline, $$...$$ for display equations.
- Finish with a line starting with "Final answer:".
- If a reference image is attached, use it; if the question is ambiguous, state the assumption you made.
- Do not wrap the answer in code fences."#;

/// Rewrite a resume in the style of a template resume.
pub const FORK_TEMPLATE_PROMPT: &str = r##"You are an expert resume writer.
Rewrite the CANDIDATE resume so that it follows the structure, section order, tone and bullet style of the TEMPLATE resume.

Rules:
- Keep every fact from the CANDIDATE resume: names, employers, dates, numbers, links. Never invent experience.
- Borrow only structure and phrasing patterns from the TEMPLATE, never its facts.
- Use strong action verbs and quantify impact where the candidate already gives numbers.
- Output plain text only: section headings on their own line prefixed with "# ", bullets prefixed with "- ".
- No commentary before or after the resume."##;

/// Compare two resumes and reply with a JSON object.
pub const RESUME_DIFF_PROMPT: &str = r#"You are an expert technical recruiter. Compare RESUME 1 and RESUME 2.

Return ONLY a valid JSON object with exactly these keys:
{
    "resume1Strengths": ["strength of resume 1", ...],
    "resume2Strengths": ["strength of resume 2", ...],
    "suggestions": ["concrete improvement for either resume", ...],
    "overallComparison": "two or three sentences comparing them"
}
Give three to six items per list. No commentary outside the JSON."#;

/// Pick the solve instruction for the configured style.
pub fn solve_instruction(style: SolutionStyle) -> &'static str {
    match style {
        SolutionStyle::HtmlLatex => SOLVE_PROMPT_HTML,
        SolutionStyle::LatexOnly => SOLVE_PROMPT_LATEX,
    }
}

/// Build the full solve prompt for one question.
pub fn solve_prompt(style: SolutionStyle, question: &str, has_image: bool) -> String {
    let image_note = if has_image {
        "\n\nA reference image for this question is attached."
    } else {
        ""
    };
    format!(
        "{}\n\nQUESTION:\n\"\"\"{}\"\"\"{}",
        solve_instruction(style),
        question.trim(),
        image_note
    )
}

/// Build the fork prompt from the two resume texts.
pub fn fork_prompt(template_text: &str, child_text: &str) -> String {
    format!(
        "{}\n\nTEMPLATE:\n\"\"\"{}\"\"\"\n\nCANDIDATE:\n\"\"\"{}\"\"\"",
        FORK_TEMPLATE_PROMPT,
        template_text.trim(),
        child_text.trim()
    )
}

/// Build the diff prompt from the two resume texts.
pub fn diff_prompt(resume1: &str, resume2: &str) -> String {
    format!(
        "{}\n\nRESUME 1:\n\"\"\"{}\"\"\"\n\nRESUME 2:\n\"\"\"{}\"\"\"",
        RESUME_DIFF_PROMPT,
        resume1.trim(),
        resume2.trim()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extraction_prompt_describes_output_contract() {
        for key in ["\"number\"", "\"marks\"", "\"isMath\"", "\"hasImage\"", "\"visual_bbox\""] {
            assert!(EXTRACTION_PROMPT.contains(key), "missing {key}");
        }
        assert!(EXTRACTION_PROMPT.contains("0-1000"));
        assert!(EXTRACTION_PROMPT.contains("10 x 2 = 20"));
    }

    #[test]
    fn solve_prompt_embeds_question_and_style() {
        let p = solve_prompt(SolutionStyle::LatexOnly, "  Integrate $x^2$  ", false);
        assert!(p.starts_with(SOLVE_PROMPT_LATEX));
        assert!(p.contains("\"\"\"Integrate $x^2$\"\"\""));
        assert!(!p.contains("reference image for this question"));

        let p = solve_prompt(SolutionStyle::HtmlLatex, "Find R", true);
        assert!(p.contains("HTML"));
        assert!(p.contains("reference image for this question is attached"));
    }

    #[test]
    fn fork_prompt_is_not_truncated() {
        assert!(FORK_TEMPLATE_PROMPT.contains("prefixed with \"# \""));
        assert!(FORK_TEMPLATE_PROMPT.ends_with("No commentary before or after the resume."));
    }

    #[test]
    fn fork_and_diff_prompts_keep_both_texts() {
        let p = fork_prompt("TEMPLATE BODY", "CHILD BODY");
        assert!(p.contains("TEMPLATE BODY") && p.contains("CHILD BODY"));
        let p = diff_prompt("ONE", "TWO");
        assert!(p.contains("\"\"\"ONE\"\"\"") && p.contains("\"\"\"TWO\"\"\""));
        assert!(p.contains("overallComparison"));
    }
}
