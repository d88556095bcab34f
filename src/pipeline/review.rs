//! Stage 6: critique of the generated report against the extracted data.

use super::llm::JsonGenerator;
use super::{or_empty, to_pretty_json};
use crate::document::PaperDocument;
use crate::error::PaperError;
use crate::prompts::{compose_context, REVIEW_RESPONSE_FORMAT, REVIEW_SYSTEM_PROMPT};
use serde_json::Value;
use tracing::info;

/// User message for the review call. Requires the report stage to have run.
pub fn build_context(doc: &PaperDocument) -> Result<String, PaperError> {
    let report = doc
        .explanation_report
        .as_ref()
        .ok_or(PaperError::MissingField {
            field: "explanation_report",
        })?;

    let outline = to_pretty_json(&doc.outline);
    let claims = to_pretty_json(&or_empty(&doc.claims));
    let method = to_pretty_json(&or_empty(&doc.method));
    let experiments = to_pretty_json(&or_empty(&doc.experiments));

    let mut context = String::from("GROUND_TRUTH_EXTRACTED_DATA:\n\n");
    context.push_str(&compose_context(
        &[
            ("OUTLINE_JSON", &outline),
            ("CLAIMS_JSON", &claims),
            ("METHOD_JSON", &method),
            ("EXPERIMENTS_JSON", &experiments),
            ("GENERATED_MARKDOWN_REPORT", &report.content),
        ],
        REVIEW_RESPONSE_FORMAT,
    ));
    Ok(context)
}

/// Review the report and store the critique under `review`.
pub async fn run(doc: &mut PaperDocument, generator: &dyn JsonGenerator) -> Result<(), PaperError> {
    let context = build_context(doc)?;
    let response = generator
        .generate_json(REVIEW_SYSTEM_PROMPT, &context)
        .await?;

    if let Some(score) = response.get("overall_score").and_then(Value::as_f64) {
        info!("Review: overall score {}", score);
    }

    doc.review = Some(Value::Object(response));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::ReportRef;
    use crate::pipeline::testing::ScriptedGenerator;
    use serde_json::json;

    fn reported() -> PaperDocument {
        PaperDocument {
            method: Some(json!({"core_idea": {"text": "sparsify"}})),
            explanation_report: Some(ReportRef {
                format: "markdown".into(),
                path: "out/explanation_report.md".into(),
                content: "# Title\n\nThe report body.".into(),
            }),
            ..Default::default()
        }
    }

    #[test]
    fn context_embeds_report_content() {
        let ctx = build_context(&reported()).unwrap();
        assert!(ctx.starts_with("GROUND_TRUTH_EXTRACTED_DATA:"));
        assert!(ctx.contains("GENERATED_MARKDOWN_REPORT:\n# Title\n\nThe report body."));
        assert!(ctx.contains("\"text\": \"sparsify\""));
        assert!(ctx.contains("OUTLINE_JSON:\nnull"));
    }

    #[test]
    fn requires_report() {
        let err = build_context(&PaperDocument::default()).unwrap_err();
        assert!(matches!(
            err,
            PaperError::MissingField {
                field: "explanation_report"
            }
        ));
    }

    #[tokio::test]
    async fn stores_review() {
        let mut d = reported();
        let gen = ScriptedGenerator::new(vec![json!({"overall_score": 72, "missing_sections": []})]);
        run(&mut d, &gen).await.unwrap();
        assert_eq!(d.review.as_ref().unwrap()["overall_score"], 72);
        assert!(gen.calls()[0].1.contains("The report body."));
    }
}
