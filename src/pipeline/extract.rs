//! Stage 1: pull page text, captions, embedded images and metadata out of a PDF.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which keeps thread-local
//! state and blocks on I/O. The whole extraction runs on Tokio's blocking
//! pool so worker threads never stall, and the pdfium handle never crosses
//! an `.await`.
//!
//! Everything that does not need pdfium (page statistics, caption
//! detection, extraction notes) lives in [`assemble_document`] so it can be
//! tested without a PDF.

use crate::config::PipelineConfig;
use crate::document::{
    Caption, CaptionKind, ExtractionNotes, Figure, Page, PaperDocument, PdfMetadata, SourceInfo,
    SCHEMA_VERSION,
};
use crate::error::PaperError;
use chrono::{SecondsFormat, Utc};
use image::ImageFormat;
use once_cell::sync::Lazy;
use pdfium_render::prelude::*;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Warning recorded when no page yields any text (scanned PDFs).
pub const NO_TEXT_WARNING: &str = "No extractable text found in PDF.";

/// Directory (relative to the output directory) receiving figure images.
pub const ASSETS_DIR: &str = "assets";

static RE_CAPTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(Figure|Fig\.|Table)\s+\d+[:.]?\s+.*").unwrap());

/// Page text and figures pulled out by pdfium, before assembly.
#[derive(Debug, Default)]
pub struct RawExtraction {
    pub page_texts: Vec<String>,
    pub figures: Vec<Figure>,
    pub metadata: PdfMetadata,
    pub warnings: Vec<String>,
}

/// Extract `pdf_path` into a stage-1 [`PaperDocument`].
///
/// Figures are written to `<output_dir>/assets/` as a side effect.
pub async fn extract_pdf(
    pdf_path: &Path,
    file_name: &str,
    config: &PipelineConfig,
) -> Result<PaperDocument, PaperError> {
    let path = pdf_path.to_path_buf();
    let assets_dir = config.output_dir.join(ASSETS_DIR);
    let password = config.password.clone();
    let lib_path = config.pdfium_lib_path.clone();

    let raw = tokio::task::spawn_blocking(move || {
        extract_blocking(&path, &assets_dir, password.as_deref(), lib_path.as_deref())
    })
    .await
    .map_err(|e| PaperError::Internal(format!("Extraction task panicked: {e}")))??;

    info!(
        "Extracted {} pages, {} figures",
        raw.page_texts.len(),
        raw.figures.len()
    );

    Ok(assemble_document(
        file_name,
        &pdf_path.to_string_lossy(),
        raw,
        Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    ))
}

/// Bind pdfium from an explicit location, or the system library.
///
/// `lib_path` may name the shared library itself or a directory containing it.
fn bind_pdfium(lib_path: Option<&Path>) -> Result<Pdfium, PaperError> {
    let bindings = match lib_path {
        Some(p) if p.is_dir() => {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(p))
        }
        Some(p) => Pdfium::bind_to_library(p),
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| PaperError::PdfiumBindingFailed(format!("{e:?}")))?;
    Ok(Pdfium::new(bindings))
}

fn extract_blocking(
    pdf_path: &Path,
    assets_dir: &Path,
    password: Option<&str>,
    lib_path: Option<&Path>,
) -> Result<RawExtraction, PaperError> {
    let pdfium = bind_pdfium(lib_path)?;

    let document = pdfium.load_pdf_from_file(pdf_path, password).map_err(|e| {
        let err_str = format!("{e:?}");
        if err_str.to_lowercase().contains("password") {
            if password.is_some() {
                PaperError::WrongPassword {
                    path: pdf_path.to_path_buf(),
                }
            } else {
                PaperError::PasswordRequired {
                    path: pdf_path.to_path_buf(),
                }
            }
        } else {
            PaperError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: err_str,
            }
        }
    })?;

    let mut raw = RawExtraction {
        metadata: read_metadata(&document),
        ..Default::default()
    };

    for (index, page) in document.pages().iter().enumerate() {
        let page_number = index + 1;

        let text = page
            .text()
            .map_err(|e| PaperError::ExtractionFailed {
                page: page_number,
                detail: format!("{e:?}"),
            })?
            .all();
        raw.page_texts.push(text);

        for object in page.objects().iter() {
            let Some(image_object) = object.as_image_object() else {
                continue;
            };
            let figure_number = raw.figures.len() + 1;
            match image_object.get_raw_image() {
                Ok(image) => {
                    match save_figure(assets_dir, page_number, figure_number, &image) {
                        Ok(figure) => raw.figures.push(figure),
                        Err(e) => {
                            warn!("Page {}: could not save image: {}", page_number, e);
                            raw.warnings
                                .push(format!("Page {page_number}: image not saved: {e}"));
                        }
                    }
                }
                Err(e) => {
                    debug!("Page {}: unreadable image object: {:?}", page_number, e);
                    raw.warnings
                        .push(format!("Page {page_number}: unreadable embedded image"));
                }
            }
        }
    }

    Ok(raw)
}

fn read_metadata(document: &PdfDocument<'_>) -> PdfMetadata {
    let metadata = document.metadata();
    let get = |tag: PdfDocumentMetadataTagType| -> Option<String> {
        metadata
            .get(tag)
            .map(|t| t.value().trim().to_string())
            .filter(|v| !v.is_empty())
    };
    PdfMetadata {
        title_guess: get(PdfDocumentMetadataTagType::Title),
        author_guess: get(PdfDocumentMetadataTagType::Author),
        creation_date: get(PdfDocumentMetadataTagType::CreationDate),
    }
}

fn save_figure(
    assets_dir: &Path,
    page_number: usize,
    figure_number: usize,
    image: &image::DynamicImage,
) -> Result<Figure, PaperError> {
    std::fs::create_dir_all(assets_dir).map_err(|e| PaperError::OutputWriteFailed {
        path: assets_dir.to_path_buf(),
        source: e,
    })?;

    let file_name = format!("fig_page{page_number}_{figure_number}.png");
    let path: PathBuf = assets_dir.join(&file_name);
    image
        .save_with_format(&path, ImageFormat::Png)
        .map_err(|e| PaperError::OutputWriteFailed {
            path: path.clone(),
            source: std::io::Error::other(e),
        })?;

    Ok(Figure {
        figure_id: format!("FIG{figure_number}"),
        page_number,
        image_path: format!("{ASSETS_DIR}/{file_name}"),
        width: Some(image.width()),
        height: Some(image.height()),
    })
}

/// Caption lines on one page, numbered `CAP_P{page}_{k}` from 1.
pub fn find_captions(text: &str, page_number: usize) -> Vec<Caption> {
    text.split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty() && RE_CAPTION.is_match(line))
        .enumerate()
        .map(|(k, line)| Caption {
            caption_id: format!("CAP_P{page_number}_{}", k + 1),
            page_number,
            kind: if line.to_lowercase().starts_with("fig") {
                CaptionKind::Figure
            } else {
                CaptionKind::Table
            },
            text: line.to_string(),
        })
        .collect()
}

/// Build the stage-1 document from raw extraction output.
pub fn assemble_document(
    file_name: &str,
    file_path: &str,
    raw: RawExtraction,
    extracted_at: String,
) -> PaperDocument {
    let pages: Vec<Page> = raw
        .page_texts
        .iter()
        .enumerate()
        .map(|(i, text)| Page::new(i + 1, text.trim()))
        .collect();

    let captions: Vec<Caption> = pages
        .iter()
        .flat_map(|p| find_captions(&p.text, p.page_number))
        .collect();

    let mut warnings = raw.warnings;
    if pages.iter().all(|p| p.text.is_empty()) {
        warnings.push(NO_TEXT_WARNING.to_string());
    }

    PaperDocument {
        schema_version: SCHEMA_VERSION.to_string(),
        source: SourceInfo {
            file_name: file_name.to_string(),
            file_path: file_path.to_string(),
            file_type: "pdf".to_string(),
            page_count: pages.len(),
            extracted_at: Some(extracted_at),
        },
        metadata: raw.metadata,
        extraction_notes: ExtractionNotes {
            has_images: !raw.figures.is_empty(),
            has_captions: !captions.is_empty(),
            warnings,
        },
        pages,
        figures: raw.figures,
        captions,
        ..Default::default()
    }
}
