//! Pipeline stages for paper-to-report processing.
//!
//! Each submodule implements exactly one stage (or one seam the stages share).
//! Stages take the cumulative [`crate::document::PaperDocument`] by mutable
//! reference, add their own key, and leave persistence to the driver in
//! [`crate::run`].
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ outline ──▶ refine ──▶ claims ──▶ method ──▶ report ──▶ review
//! (URL/path) (pdfium)  (heuristic)  (model)    (model)    (model)    (model)    (model)
//! ```
//!
//! 1. [`input`] - canonicalise the user-supplied path or URL to a local file
//! 2. [`extract`] - page text, captions, figures; runs in `spawn_blocking`
//!    because pdfium is not async-safe
//! 3. [`outline`] - heuristic outline from [`crate::outline`]
//! 4. [`refine`] - model-refined outline, validated before it is merged
//! 5. [`claims`], [`method`] - section-scoped extraction prompts; [`scope`]
//!    picks the pages each prompt block sees
//! 6. [`report`], [`review`] - explanation report and its critique
//!
//! Every model call goes through [`llm::JsonGenerator`].

pub mod claims;
pub mod extract;
pub mod input;
pub mod llm;
pub mod method;
pub mod outline;
pub mod refine;
pub mod report;
pub mod review;
pub mod scope;

use serde::Serialize;
use serde_json::Value;

/// Pretty JSON for prompt context. Values that cannot be serialised render
/// as `{}`.
pub(crate) fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

/// A stored stage result, or an empty object when the stage has not run.
pub(crate) fn or_empty(value: &Option<Value>) -> Value {
    value
        .clone()
        .unwrap_or_else(|| Value::Object(Default::default()))
}
