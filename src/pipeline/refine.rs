//! Stage 2.3: model refinement of the heuristic outline.
//!
//! The model sees the first page, the heuristic abstract and the detected
//! heading candidates, and returns a cleaned outline. The response is
//! validated before it replaces anything: under
//! [`RefinementPolicy::Strict`] a range, ordering or missing-trace problem
//! rejects the whole refinement and the heuristic outline stays in place; under
//! [`RefinementPolicy::Trust`] problems are logged and the merge goes ahead.
//! Unknown section names are only ever logged.

use super::llm::JsonGenerator;
use crate::document::PaperDocument;
use crate::error::{LlmError, PaperError};
use crate::outline::{
    apply_refinement, validate_refinement, OutlineRefinement, RefinementIssue, RefinementPolicy,
};
use crate::prompts::{
    compose_context, truncate_chars, REFINE_ABSTRACT_CHARS, REFINE_FIRST_PAGE_CHARS,
    REFINE_RESPONSE_FORMAT, REFINE_SYSTEM_PROMPT,
};
use serde_json::Value;
use tracing::{info, warn};

/// User message for the refinement call.
pub fn build_context(doc: &PaperDocument) -> Result<String, PaperError> {
    let outline = doc.outline()?;

    let first_page = doc.pages.first().map(|p| p.text.as_str()).unwrap_or("");
    let abstract_text = outline.abstract_text.as_deref().unwrap_or("");
    let candidates = super::to_pretty_json(&outline.section_candidates);
    let page_count = doc.page_count().to_string();

    Ok(compose_context(
        &[
            (
                "FIRST_PAGE_TEXT",
                truncate_chars(first_page, REFINE_FIRST_PAGE_CHARS),
            ),
            (
                "ABSTRACT_EXTRACTED",
                truncate_chars(abstract_text, REFINE_ABSTRACT_CHARS),
            ),
            ("SECTION_CANDIDATES_EXTRACTED", &candidates),
            ("PAGE_COUNT", &page_count),
        ],
        REFINE_RESPONSE_FORMAT,
    ))
}

/// Refine `doc.outline` in place.
///
/// Returns every validation issue found (all non-structural under `Strict`).
/// On error `doc` is left untouched.
pub async fn run(
    doc: &mut PaperDocument,
    generator: &dyn JsonGenerator,
    policy: RefinementPolicy,
) -> Result<Vec<RefinementIssue>, PaperError> {
    let context = build_context(doc)?;
    let response = generator
        .generate_json(REFINE_SYSTEM_PROMPT, &context)
        .await?;

    let value = Value::Object(response);
    let refinement: OutlineRefinement =
        serde_json::from_value(value.clone()).map_err(|e| LlmError::MalformedResponse {
            detail: format!("refinement does not match the outline schema: {e}"),
            raw: value.to_string(),
        })?;

    let prior = doc.outline()?;
    let names: Vec<&str> = prior
        .section_candidates
        .iter()
        .map(|c| c.normalized_heading.as_str())
        .collect();
    let issues = validate_refinement(&refinement, &names, doc.page_count());

    let structural: Vec<String> = issues
        .iter()
        .filter(|i| i.is_structural())
        .map(ToString::to_string)
        .collect();

    match policy {
        RefinementPolicy::Strict if !structural.is_empty() => {
            return Err(PaperError::InvalidRefinement { issues: structural });
        }
        _ => {
            for issue in &issues {
                warn!("Refinement: {}", issue);
            }
        }
    }

    let merged = apply_refinement(prior, refinement);
    info!(
        "Refined outline: {} sections (was {})",
        merged.sections.len(),
        prior.sections.len()
    );
    doc.outline = Some(merged);
    Ok(issues)
}
