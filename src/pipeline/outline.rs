//! Stage 2: heuristic outline inference over the extracted pages.

use crate::document::PaperDocument;
use crate::outline::{infer_outline, HeadingCatalog};
use tracing::{debug, info};

/// Infer the outline and store it under `outline`, replacing any prior one.
pub fn run(doc: &mut PaperDocument, catalog: &HeadingCatalog) {
    let outline = infer_outline(&doc.pages, doc.page_count(), catalog);

    info!(
        "Outline: {} heading candidates, {} sections",
        outline.section_candidates.len(),
        outline.sections.len()
    );
    if outline.is_unstructured() {
        debug!("No catalog headings found; later stages will use page windows");
    }

    doc.outline = Some(outline);
}
