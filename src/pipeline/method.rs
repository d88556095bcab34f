//! Stage 4: method description and experimental results.

use super::llm::JsonGenerator;
use super::scope::{gather_text, ScopedText, TextStrategy};
use crate::document::PaperDocument;
use crate::error::PaperError;
use crate::prompts::{
    compose_context, EXPERIMENT_KEYWORDS, EXPERIMENT_TEXT_CHARS, LIMITATION_KEYWORDS,
    LIMITATION_TEXT_CHARS, METHOD_FALLBACK_PAGES, METHOD_KEYWORDS, METHOD_RESPONSE_FORMAT,
    METHOD_SYSTEM_PROMPT, METHOD_TEXT_CHARS,
};
use serde_json::{Map, Value};
use tracing::{info, warn};

pub struct MethodContext {
    pub context: String,
    pub method: ScopedText,
    pub experiments: ScopedText,
    pub limitations: ScopedText,
}

pub fn build_context(doc: &PaperDocument) -> Result<MethodContext, PaperError> {
    let outline = doc.outline()?;
    let sections = &outline.sections;

    let method = gather_text(
        &doc.pages,
        sections,
        &[
            TextStrategy::Sections(METHOD_KEYWORDS),
            TextStrategy::LeadingPages(METHOD_FALLBACK_PAGES),
        ],
        METHOD_TEXT_CHARS,
    );
    let experiments = gather_text(
        &doc.pages,
        sections,
        &[
            TextStrategy::Sections(EXPERIMENT_KEYWORDS),
            TextStrategy::TrailingPages(METHOD_FALLBACK_PAGES),
        ],
        EXPERIMENT_TEXT_CHARS,
    );
    let limitations = gather_text(
        &doc.pages,
        sections,
        &[TextStrategy::Sections(LIMITATION_KEYWORDS)],
        LIMITATION_TEXT_CHARS,
    );

    let context = compose_context(
        &[
            ("METHOD_SECTION_TEXT", &method.text),
            ("EXPERIMENTS_RESULTS_TEXT", &experiments.text),
            ("LIMITATIONS_CONCLUSION_TEXT", &limitations.text),
        ],
        METHOD_RESPONSE_FORMAT,
    );

    Ok(MethodContext {
        context,
        method,
        experiments,
        limitations,
    })
}

/// Take `key` from the response, defaulting to `{}` when absent.
fn take_object(response: &mut Map<String, Value>, key: &str) -> Value {
    match response.remove(key) {
        Some(v) => v,
        None => {
            warn!("Method/results response has no '{}' key; storing {{}}", key);
            Value::Object(Map::new())
        }
    }
}

/// Extract method and results into `method` and `experiments`.
pub async fn run(doc: &mut PaperDocument, generator: &dyn JsonGenerator) -> Result<(), PaperError> {
    let ctx = build_context(doc)?;
    let mut response = generator
        .generate_json(METHOD_SYSTEM_PROMPT, &ctx.context)
        .await?;

    info!(
        "Method: method via {}, experiments via {}, limitations via {}",
        ctx.method.strategy, ctx.experiments.strategy, ctx.limitations.strategy
    );

    doc.method = Some(take_object(&mut response, "method"));
    doc.experiments = Some(take_object(&mut response, "experiments"));
    doc.text_scopes.insert("method.method".into(), ctx.method.strategy);
    doc.text_scopes
        .insert("method.experiments".into(), ctx.experiments.strategy);
    doc.text_scopes
        .insert("method.limitations".into(), ctx.limitations.strategy);
    Ok(())
}
