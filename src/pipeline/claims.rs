//! Stage 3: problem statement, motivation, contributions and key claims.

use super::llm::JsonGenerator;
use super::scope::{gather_text, ScopedText, TextStrategy};
use crate::document::PaperDocument;
use crate::error::PaperError;
use crate::prompts::{
    compose_context, CLAIMS_CONCLUSION_CHARS, CLAIMS_CONCLUSION_KEYWORDS,
    CLAIMS_INTRO_CHARS, CLAIMS_INTRO_FALLBACK_PAGES, CLAIMS_INTRO_KEYWORDS,
    CLAIMS_RESPONSE_FORMAT, CLAIMS_SYSTEM_PROMPT,
};
use serde_json::Value;
use tracing::info;

/// The user message plus the scoped text blocks that went into it.
pub struct ClaimsContext {
    pub context: String,
    pub introduction: ScopedText,
    pub conclusion: ScopedText,
}

pub fn build_context(doc: &PaperDocument) -> Result<ClaimsContext, PaperError> {
    let outline = doc.outline()?;

    let introduction = gather_text(
        &doc.pages,
        &outline.sections,
        &[
            TextStrategy::Sections(CLAIMS_INTRO_KEYWORDS),
            TextStrategy::LeadingPages(CLAIMS_INTRO_FALLBACK_PAGES),
        ],
        CLAIMS_INTRO_CHARS,
    );
    let conclusion = gather_text(
        &doc.pages,
        &outline.sections,
        &[TextStrategy::Sections(CLAIMS_CONCLUSION_KEYWORDS)],
        CLAIMS_CONCLUSION_CHARS,
    );

    let context = compose_context(
        &[
            ("ABSTRACT", outline.abstract_text.as_deref().unwrap_or("")),
            ("INTRODUCTION_TEXT", &introduction.text),
            ("CONCLUSION_DISCUSSION_LIMITATIONS_TEXT", &conclusion.text),
        ],
        CLAIMS_RESPONSE_FORMAT,
    );

    Ok(ClaimsContext {
        context,
        introduction,
        conclusion,
    })
}

/// Extract claims and store the response verbatim under `claims`.
pub async fn run(doc: &mut PaperDocument, generator: &dyn JsonGenerator) -> Result<(), PaperError> {
    let ctx = build_context(doc)?;
    let response = generator
        .generate_json(CLAIMS_SYSTEM_PROMPT, &ctx.context)
        .await?;

    info!(
        "Claims: intro via {}, conclusion via {}, {} top-level keys",
        ctx.introduction.strategy,
        ctx.conclusion.strategy,
        response.len()
    );

    doc.text_scopes
        .insert("claims.introduction".into(), ctx.introduction.strategy);
    doc.text_scopes
        .insert("claims.conclusion".into(), ctx.conclusion.strategy);
    doc.claims = Some(Value::Object(response));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Page;
    use crate::outline::HeadingCatalog;
    use crate::pipeline::testing::ScriptedGenerator;
    use serde_json::json;

    fn structured() -> PaperDocument {
        let mut doc = PaperDocument {
            pages: vec![
                Page::new(1, "Title Of The Paper\nAbstract\nShort abstract."),
                Page::new(2, "1 Introduction\nWe motivate."),
                Page::new(3, "2 Method\nWe do."),
                Page::new(4, "5 Conclusion\nWe conclude.\nLimitations\nSome."),
            ],
            ..Default::default()
        };
        crate::pipeline::outline::run(&mut doc, HeadingCatalog::default_catalog());
        doc
    }

    #[test]
    fn context_uses_matched_sections() {
        let ctx = build_context(&structured()).unwrap();
        assert_eq!(ctx.introduction.strategy, "sections[introduction]");
        assert_eq!(ctx.introduction.text, "[PAGE 2]\n1 Introduction\nWe motivate.");
        assert!(ctx.context.contains("ABSTRACT:\nShort abstract."));

        // Conclusion and Limitations share page 4: one section each, so the
        // page appears once per matched section.
        assert_eq!(ctx.conclusion.strategy, "sections[conclusion,discussion,limitations]");
        assert_eq!(ctx.conclusion.text.matches("[PAGE 4]").count(), 2);
    }

    #[test]
    fn unstructured_intro_falls_back_to_leading_pages() {
        let mut doc = PaperDocument {
            pages: vec![
                Page::new(1, "plain memo text"),
                Page::new(2, "more"),
                Page::new(3, "last"),
            ],
            ..Default::default()
        };
        crate::pipeline::outline::run(&mut doc, HeadingCatalog::default_catalog());

        let ctx = build_context(&doc).unwrap();
        assert_eq!(ctx.introduction.strategy, "leading_pages(2)");
        assert!(!ctx.introduction.text.contains("[PAGE 3]"));
        assert_eq!(ctx.conclusion.strategy, "none");
        assert!(ctx.context.contains("CONCLUSION_DISCUSSION_LIMITATIONS_TEXT:\n\n"));
    }

    #[tokio::test]
    async fn stores_response_and_scopes() {
        let mut doc = structured();
        let gen = ScriptedGenerator::new(vec![json!({
            "problem_statement": {"text": "p", "trace": {"page": 2, "snippet": "We motivate."}},
            "key_claims": []
        })]);

        run(&mut doc, &gen).await.unwrap();

        let claims = doc.claims.as_ref().unwrap();
        assert_eq!(claims["problem_statement"]["text"], "p");
        assert_eq!(doc.text_scopes["claims.introduction"], "sections[introduction]");
        assert_eq!(gen.calls()[0].0, CLAIMS_SYSTEM_PROMPT);
    }
}
