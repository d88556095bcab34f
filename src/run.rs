//! Pipeline driver: run the stages in order and persist after each one.
//!
//! ## Why persist every stage?
//!
//! Every model-backed stage costs money and time. Writing the cumulative
//! document after each stage (`output_s1.json` … `output_s6.json`) means a
//! failure in stage 5 leaves stages 1–4 on disk for inspection, and a rerun
//! can resume from `output_s1.json` without touching the PDF again. All
//! writes go through [`crate::document::write_atomic`], so a file is either
//! the previous version or the complete new one.
//!
//! Stages never retry. Transient model failures are retried inside the
//! [`JsonGenerator`]; anything that escapes is wrapped in
//! [`PaperError::StageFailed`] and ends the run.

use crate::config::PipelineConfig;
use crate::document::PaperDocument;
use crate::error::PaperError;
use crate::outline::{HeadingCatalog, Outline};
use crate::pipeline::input::{resolve_input, InputKind, ResolvedInput};
use crate::pipeline::llm::{resolve_generator, JsonGenerator};
use crate::pipeline::{claims, extract, method, outline, refine, report, review};
use crate::stage::Stage;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::HashSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Wall-clock time spent in one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StageTiming {
    pub stage: Stage,
    pub duration_ms: u64,
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// The final cumulative document (as persisted by the last stage).
    pub document: PaperDocument,
    pub output_dir: PathBuf,
    /// Stages that ran, in order.
    pub stages: Vec<StageTiming>,
    /// Refinement issues that were logged but did not block the merge.
    pub refinement_issues: Vec<String>,
    pub total_duration_ms: u64,
}

impl PipelineOutput {
    /// Path of the last persisted stage document.
    pub fn last_document_path(&self) -> Option<PathBuf> {
        self.stages
            .last()
            .map(|t| self.output_dir.join(t.stage.output_file()))
    }
}

/// Stages `config` will run, in order.
pub fn planned_stages(config: &PipelineConfig) -> Vec<Stage> {
    Stage::ALL.into_iter().filter(|s| config.runs(*s)).collect()
}

/// Run the pipeline on one PDF path, URL, or stage-1 JSON document.
///
/// The model backend is resolved from `config` before anything else runs,
/// so a missing API key fails immediately rather than after extraction.
pub async fn run_pipeline(
    input: &str,
    config: &PipelineConfig,
) -> Result<PipelineOutput, PaperError> {
    let generator = generator_for(config)?;
    run_with_generator(input, config, generator).await
}

/// Blocking wrapper around [`run_pipeline`] for non-async callers.
///
/// Creates its own tokio runtime; do not call from inside one.
pub fn run_pipeline_sync(
    input: &str,
    config: &PipelineConfig,
) -> Result<PipelineOutput, PaperError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| PaperError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(run_pipeline(input, config))
}

/// Like [`run_pipeline`], with a caller-supplied model backend.
///
/// `generator` may be `None` when `config.until` stops before any
/// model-backed stage.
pub async fn run_with_generator(
    input: &str,
    config: &PipelineConfig,
    generator: Option<Arc<dyn JsonGenerator>>,
) -> Result<PipelineOutput, PaperError> {
    let total_start = Instant::now();
    let plan = planned_stages(config);
    info!("Starting pipeline: {} ({} stages)", input, plan.len());
    if let Some(cb) = &config.progress_callback {
        cb.on_pipeline_start(input, &plan);
    }

    let resolved = resolve_input(input, config.download_timeout_secs)
        .await
        .map_err(|e| fail(config, Stage::Extract, e))?;

    let mut driver = Driver {
        config,
        generator: generator.as_deref(),
        timings: Vec::new(),
    };
    let mut doc = driver.extract(&resolved).await?;
    let mut refinement_issues = Vec::new();

    for stage in plan.into_iter().skip(1) {
        let issues = driver.run_stage(stage, &mut doc).await?;
        refinement_issues.extend(issues);
    }

    let total_duration_ms = total_start.elapsed().as_millis() as u64;
    info!("Pipeline complete: {} in {}ms", input, total_duration_ms);
    if let Some(cb) = &config.progress_callback {
        cb.on_pipeline_complete(input, total_duration_ms);
    }

    Ok(PipelineOutput {
        document: doc,
        output_dir: config.output_dir.clone(),
        stages: driver.timings,
        refinement_issues,
        total_duration_ms,
    })
}

/// Run stages 1–2 only and return the heuristic outline. Needs no model.
pub async fn outline_only(input: &str, config: &PipelineConfig) -> Result<Outline, PaperError> {
    let mut config = config.clone();
    config.until = Some(Stage::Outline);
    let output = run_with_generator(input, &config, None).await?;
    output
        .document
        .outline
        .ok_or(PaperError::MissingField { field: "outline" })
        .map_err(|e| e.in_stage(Stage::Outline))
}

/// One input's outcome in a batch.
#[derive(Debug)]
pub struct BatchItem {
    pub input: String,
    pub output_dir: PathBuf,
    pub result: Result<PipelineOutput, PaperError>,
}

/// Run several inputs concurrently, each into its own subdirectory of
/// `config.output_dir` named after the input file.
///
/// At most `config.concurrency` documents are in flight. One document
/// failing does not stop the others. Results are returned in input order.
pub async fn run_batch(inputs: &[String], config: &PipelineConfig) -> Result<Vec<BatchItem>, PaperError> {
    let generator = generator_for(config)?;
    let dirs = batch_dir_names(inputs);

    let mut items: Vec<(usize, BatchItem)> = stream::iter(inputs.iter().zip(dirs).enumerate().map(
        |(index, (input, dir))| {
            let mut doc_config = config.clone();
            doc_config.output_dir = config.output_dir.join(dir);
            let generator = generator.clone();
            let input = input.clone();
            async move {
                let result = run_with_generator(&input, &doc_config, generator).await;
                (
                    index,
                    BatchItem {
                        input,
                        output_dir: doc_config.output_dir,
                        result,
                    },
                )
            }
        },
    ))
    .buffer_unordered(config.concurrency.max(1))
    .collect()
    .await;

    items.sort_by_key(|(index, _)| *index);
    Ok(items.into_iter().map(|(_, item)| item).collect())
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Resolve the model backend when any planned stage needs one.
fn generator_for(config: &PipelineConfig) -> Result<Option<Arc<dyn JsonGenerator>>, PaperError> {
    match planned_stages(config).into_iter().find(|s| s.needs_llm()) {
        Some(first_llm_stage) => resolve_generator(config)
            .map(Some)
            .map_err(|e| e.in_stage(first_llm_stage)),
        None => Ok(None),
    }
}

/// Output subdirectory per input: the file stem, suffixed on collision.
fn batch_dir_names(inputs: &[String]) -> Vec<String> {
    let mut used = HashSet::new();
    inputs
        .iter()
        .enumerate()
        .map(|(index, input)| {
            let stem = input
                .trim_end_matches('/')
                .rsplit('/')
                .next()
                .map(|last| {
                    Path::new(last)
                        .file_stem()
                        .map(|s| s.to_string_lossy().into_owned())
                        .unwrap_or_default()
                })
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| format!("paper-{}", index + 1));
            let mut name = stem.clone();
            let mut n = 2;
            while !used.insert(name.clone()) {
                name = format!("{stem}-{n}");
                n += 1;
            }
            name
        })
        .collect()
}

/// Report a stage failure to the callback and wrap it.
fn fail(config: &PipelineConfig, stage: Stage, err: PaperError) -> PaperError {
    error!("Stage{} failed: {}", stage, err);
    if let Some(cb) = &config.progress_callback {
        cb.on_stage_error(stage, &err.to_string());
    }
    err.in_stage(stage)
}

struct Driver<'a> {
    config: &'a PipelineConfig,
    generator: Option<&'a dyn JsonGenerator>,
    timings: Vec<StageTiming>,
}

impl<'a> Driver<'a> {
    /// Time `work`, fire callbacks, and wrap its error in `StageFailed`.
    async fn timed<T, Fut>(&mut self, stage: Stage, work: Fut) -> Result<T, PaperError>
    where
        Fut: Future<Output = Result<T, PaperError>>,
    {
        info!("Stage{} started", stage);
        if let Some(cb) = &self.config.progress_callback {
            cb.on_stage_start(stage);
        }
        let start = Instant::now();

        let value = work.await.map_err(|e| fail(self.config, stage, e))?;

        let duration_ms = start.elapsed().as_millis() as u64;
        info!("Stage{} completed in {}ms", stage, duration_ms);
        if let Some(cb) = &self.config.progress_callback {
            cb.on_stage_complete(stage, duration_ms);
        }
        self.timings.push(StageTiming { stage, duration_ms });
        Ok(value)
    }

    fn save_path(&self, stage: Stage) -> PathBuf {
        self.config.output_dir.join(stage.output_file())
    }

    fn generator(&self) -> Result<&'a dyn JsonGenerator, PaperError> {
        self.generator.ok_or_else(|| PaperError::ProviderNotConfigured {
            provider: "none".into(),
            hint: "This stage needs a model backend.".into(),
        })
    }

    /// Stage 1: extract the PDF, or load a stage-1 document to resume from.
    async fn extract(&mut self, resolved: &ResolvedInput) -> Result<PaperDocument, PaperError> {
        let config = self.config;
        let path = self.save_path(Stage::Extract);
        self.timed(Stage::Extract, async move {
            let doc = match resolved.kind() {
                InputKind::Pdf => {
                    extract::extract_pdf(resolved.path(), &resolved.file_name(), config).await?
                }
                InputKind::StageDocument => {
                    info!("Resuming from {}", resolved.path().display());
                    let mut doc = PaperDocument::load(resolved.path())?;
                    doc.clear_derived();
                    doc
                }
            };
            doc.save(&path)?;
            Ok(doc)
        })
        .await
    }

    /// Run one post-extraction stage against `doc` and persist it.
    ///
    /// Returns refinement issues that were tolerated (empty for other stages).
    async fn run_stage(
        &mut self,
        stage: Stage,
        doc: &mut PaperDocument,
    ) -> Result<Vec<String>, PaperError> {
        let config = self.config;
        let path = self.save_path(stage);
        let generator = if stage.needs_llm() {
            Some(self.generator().map_err(|e| fail(config, stage, e))?)
        } else {
            None
        };

        self.timed(stage, async move {
            let mut issues = Vec::new();
            match (stage, generator) {
                (Stage::Outline, _) => outline::run(doc, HeadingCatalog::default_catalog()),
                (Stage::Refine, Some(g)) => {
                    issues = refine::run(doc, g, config.refinement_policy)
                        .await?
                        .iter()
                        .map(ToString::to_string)
                        .collect();
                }
                (Stage::Claims, Some(g)) => claims::run(doc, g).await?,
                (Stage::Method, Some(g)) => method::run(doc, g).await?,
                (Stage::Report, Some(g)) => report::run(doc, g, &config.output_dir).await?,
                (Stage::Review, Some(g)) => review::run(doc, g).await?,
                (other, _) => {
                    return Err(PaperError::Internal(format!(
                        "stage {other} cannot run after extraction"
                    )))
                }
            }
            doc.save(&path)?;
            Ok(issues)
        })
        .await
    }
}
