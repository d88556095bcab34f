//! Stage 5: the Markdown explanation report.
//!
//! The model only sees structured data from earlier stages (title, abstract,
//! claims, method, experiments), never raw page text, so the report cannot
//! draw on anything the extraction stages did not surface.

use super::llm::JsonGenerator;
use super::{or_empty, to_pretty_json};
use crate::document::{write_atomic, PaperDocument, ReportRef};
use crate::error::PaperError;
use crate::prompts::{compose_context, REPORT_RESPONSE_FORMAT, REPORT_SYSTEM_PROMPT};
use serde_json::Value;
use std::path::Path;
use tracing::info;

/// File name of the Markdown report inside the output directory.
pub const REPORT_FILE: &str = "explanation_report.md";

pub fn build_context(doc: &PaperDocument) -> String {
    let title = doc.display_title();
    let abstract_text = doc
        .outline
        .as_ref()
        .and_then(|o| o.abstract_text.as_deref())
        .unwrap_or("");
    let claims = to_pretty_json(&or_empty(&doc.claims));
    let method = to_pretty_json(&or_empty(&doc.method));
    let experiments = to_pretty_json(&or_empty(&doc.experiments));
    let format = REPORT_RESPONSE_FORMAT.replace("{title}", &title);

    let mut context = String::from("You are given extracted structured data from a research paper.\n\n");
    context.push_str(&compose_context(
        &[
            ("PAPER_TITLE", &title),
            ("ABSTRACT", abstract_text),
            ("CLAIMS_JSON", &claims),
            ("METHOD_JSON", &method),
            ("EXPERIMENTS_JSON", &experiments),
        ],
        &format,
    ));
    context
}

/// Generate the report, write it to `<output_dir>/explanation_report.md` and
/// record it under `explanation_report`.
///
/// An empty or missing `markdown_report` is [`PaperError::EmptyReport`]; in
/// that case nothing is written.
pub async fn run(
    doc: &mut PaperDocument,
    generator: &dyn JsonGenerator,
    output_dir: &Path,
) -> Result<(), PaperError> {
    let context = build_context(doc);
    let response = generator
        .generate_json(REPORT_SYSTEM_PROMPT, &context)
        .await?;

    let markdown = match response.get("markdown_report") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        _ => return Err(PaperError::EmptyReport),
    };

    let path = output_dir.join(REPORT_FILE);
    write_atomic(&path, markdown.as_bytes())?;
    info!("Report: {} chars written to {}", markdown.chars().count(), path.display());

    doc.explanation_report = Some(ReportRef {
        format: "markdown".to_string(),
        path: path.to_string_lossy().into_owned(),
        content: markdown,
    });
    Ok(())
}
