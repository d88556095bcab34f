//! Progress-callback trait for per-stage pipeline events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to observe a
//! run as it moves from stage to stage.
//!
//! # Why callbacks instead of channels?
//!
//! The library does not know whether the host renders a terminal spinner,
//! writes to a job table or forwards events to a web client. A `Send + Sync`
//! trait with no-op defaults lets each host override only the events it needs.
//! In batch runs the same callback is shared by every document, so
//! implementations must synchronise their own state.

use crate::stage::Stage;
use std::sync::Arc;

/// Called by the pipeline driver around each stage.
pub trait PipelineProgressCallback: Send + Sync {
    /// Called once per document before the first stage runs.
    ///
    /// # Arguments
    /// * `input` : the input path or URL as given
    /// * `stages`: the stages that will run, in order
    fn on_pipeline_start(&self, input: &str, stages: &[Stage]) {
        let _ = (input, stages);
    }

    /// Called just before a stage starts.
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called after a stage's output has been persisted.
    fn on_stage_complete(&self, stage: Stage, elapsed_ms: u64) {
        let _ = (stage, elapsed_ms);
    }

    /// Called when a stage fails. No further stages run for this document.
    fn on_stage_error(&self, stage: Stage, error: &str) {
        let _ = (stage, error);
    }

    /// Called once per document after the last stage succeeded.
    fn on_pipeline_complete(&self, input: &str, total_ms: u64) {
        let _ = (input, total_ms);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;
