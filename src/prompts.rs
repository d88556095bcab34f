//! System prompts and response schemas for every model-backed stage.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth**: tightening a rule (say, "never invent
//!    numbers") means editing exactly one place, not hunting through stage code.
//!
//! 2. **Testability**: stage tests assert on the context blocks they build,
//!    and prompt regressions show up as plain string diffs.
//!
//! Each stage sends the `*_SYSTEM_PROMPT` as the system message and a user
//! message built from labelled context blocks followed by the stage's
//! `*_RESPONSE_FORMAT`. Every stage demands a bare JSON object.

// ── Outline refinement (stage 2.3) ───────────────────────────────────────

pub const REFINE_SYSTEM_PROMPT: &str = r#"You are an expert academic research paper parser.

Your task is to refine and normalize a research paper outline.

You must ONLY output valid JSON. No markdown. No commentary.

Rules:
- Normalize section names to Title Case.
- Remove non-section noise (copyright, arXiv, preprint info).
- Do NOT invent new sections.
- Use ONLY the extracted section candidates provided.
- Keep correct ordering.
- Ensure start_page <= end_page.
- Page ranges must be non-overlapping.
- trace.snippet should resemble one of the candidate snippets."#;

pub const REFINE_RESPONSE_FORMAT: &str = r#"Return ONLY JSON in this format:
{
  "title": string | null,
  "authors": [string],
  "keywords": [string],
  "sections": [
    {
      "name": string,
      "start_page": number,
      "end_page": number,
      "trace": { "page": number, "snippet": string }
    }
  ]
}

IMPORTANT:
- Sections MUST be derived from candidates.
- Do not add fake sections.
- Use correct page ranges."#;

/// Characters of first-page text sent for refinement.
pub const REFINE_FIRST_PAGE_CHARS: usize = 4000;
/// Characters of the heuristic abstract sent for refinement.
pub const REFINE_ABSTRACT_CHARS: usize = 2000;

// ── Claims (stage 3) ─────────────────────────────────────────────────────

pub const CLAIMS_SYSTEM_PROMPT: &str = r#"You are an expert research paper analyst.

Your task is to extract:
- the main problem statement
- the motivation (why this matters)
- the claimed contributions
- key claims made by the authors

Rules:
- Only use content from the provided text.
- Do NOT invent claims.
- Every extracted item MUST have a trace with page number and a direct snippet from the text.
- Contributions must be short and atomic.
- Key claims must be atomic and specific.
- Output must be valid JSON only. No markdown."#;

pub const CLAIMS_RESPONSE_FORMAT: &str = r#"Return ONLY JSON in this format:
{
  "problem_statement": { "text": string, "trace": { "page": number, "snippet": string } },
  "motivation": { "text": string, "trace": { "page": number, "snippet": string } },
  "contributions": [
    { "contribution_id": "CON1", "text": string, "trace": { "page": number, "snippet": string } }
  ],
  "key_claims": [
    {
      "claim_id": "C1",
      "type": "performance|novelty|efficiency|theory|other",
      "text": string,
      "evidence_hint": string,
      "trace": { "page": number, "snippet": string },
      "confidence": "high|medium|low"
    }
  ]
}

Constraints:
- Every item MUST include trace.page and trace.snippet.
- trace.snippet MUST be a direct quote fragment from the provided text.
- If evidence_hint is unknown, use "".
- Do not hallucinate."#;

pub const CLAIMS_INTRO_CHARS: usize = 8000;
pub const CLAIMS_CONCLUSION_CHARS: usize = 6000;
pub const CLAIMS_INTRO_KEYWORDS: &[&str] = &["introduction"];
pub const CLAIMS_CONCLUSION_KEYWORDS: &[&str] = &["conclusion", "discussion", "limitations"];
/// Leading pages used when no introduction section is known.
pub const CLAIMS_INTRO_FALLBACK_PAGES: usize = 2;

// ── Method and results (stage 4) ─────────────────────────────────────────

pub const METHOD_SYSTEM_PROMPT: &str = r#"You are an expert research paper technical extractor.

Your job is to extract the method and experimental results from a research paper.

Rules:
- Only use information explicitly present in the provided text.
- Do NOT hallucinate numbers.
- If a number is not explicitly present, leave it null.
- Every extracted item must include trace.page and trace.snippet.
- trace.snippet must be a direct quote fragment from the input text.
- Output must be valid JSON only."#;

pub const METHOD_RESPONSE_FORMAT: &str = r#"Return ONLY JSON in this format:
{
  "method": {
    "high_level_summary": { "text": string, "trace": { "page": number, "snippet": string } },
    "core_idea": { "text": string, "trace": { "page": number, "snippet": string } },
    "step_by_step": [
      { "step": number, "text": string, "trace": { "page": number, "snippet": string } }
    ],
    "architecture_components": [
      { "name": string, "purpose": string, "trace": { "page": number, "snippet": string } }
    ],
    "equations": [
      { "equation": string, "meaning": string, "trace": { "page": number, "snippet": string } }
    ]
  },
  "experiments": {
    "datasets": [ { "name": string, "trace": { "page": number, "snippet": string } } ],
    "metrics": [ { "name": string, "trace": { "page": number, "snippet": string } } ],
    "baselines": [ { "name": string, "trace": { "page": number, "snippet": string } } ],
    "results": [
      {
        "dataset": string,
        "metric": string,
        "baseline": string,
        "baseline_value": number | null,
        "proposed_value": number | null,
        "delta": number | null,
        "trace": { "page": number, "snippet": string }
      }
    ],
    "limitations": [ { "text": string, "trace": { "page": number, "snippet": string } } ]
  }
}

Constraints:
- Do not fabricate baselines, datasets, or numbers.
- If you cannot find exact numeric values, use null.
- Ensure every list item has trace.page and trace.snippet."#;

pub const METHOD_KEYWORDS: &[&str] = &[
    "method",
    "methodology",
    "approach",
    "model",
    "architecture",
    "self-attention",
    "training",
    "attention",
];
pub const EXPERIMENT_KEYWORDS: &[&str] = &["experiment", "results", "evaluation", "benchmark"];
pub const LIMITATION_KEYWORDS: &[&str] = &["limitation", "discussion", "conclusion"];
pub const METHOD_TEXT_CHARS: usize = 12000;
pub const EXPERIMENT_TEXT_CHARS: usize = 12000;
pub const LIMITATION_TEXT_CHARS: usize = 6000;
/// Page window used when no method or experiment section is known.
pub const METHOD_FALLBACK_PAGES: usize = 4;

// ── Report (stage 5) ─────────────────────────────────────────────────────

pub const REPORT_SYSTEM_PROMPT: &str = r#"You are a senior research mentor and technical educator.

Your job is to explain a research paper clearly and deeply.

Rules:
- You MUST explain, not summarize.
- Write like teaching an engineer who knows programming but not the paper topic.
- Use simple language.
- Avoid academic fluff.
- Use analogies where helpful.
- Do NOT invent numbers, datasets, or claims.
- Use only the extracted structured data provided.
- Output must be valid JSON only."#;

/// Report layout. `{title}` is substituted before sending.
pub const REPORT_RESPONSE_FORMAT: &str = r#"Generate an explanation report in Markdown.

Return ONLY JSON in this format:
{
  "markdown_report": "string"
}

Markdown must follow this exact structure:
# {title}
## TL;DR (max 5 lines)
## 1. What problem does this paper solve?
## 2. Why is this problem hard?
## 3. What is the main contribution?
## 4. Core idea (intuitive explanation)
## 5. How the method works (step-by-step)
## 6. Architecture / Components
## 7. Experiments and Results (What matters)
## 8. What do the results actually prove?
## 9. Limitations / Assumptions
## 10. Practical takeaways (for engineers)
## Glossary (simple definitions)
## Skeptical reviewer notes

Constraints:
- If results are missing, say "Not clearly extracted".
- If limitations are missing, say "Not explicitly stated".
- Keep it clear and concise."#;

// ── Review (stage 6) ─────────────────────────────────────────────────────

pub const REVIEW_SYSTEM_PROMPT: &str = r#"You are a strict research paper reviewer.

You are given:
- extracted ground-truth structured data from a paper
- a generated markdown explanation report

Your job is to critique the report.

Rules:
- Do NOT rewrite the report.
- Only evaluate it.
- Identify missing content, unclear explanations, and hallucinations.
- Hallucination means: any claim not supported by the extracted structured data.
- Be strict and skeptical.
- Output must be valid JSON only."#;

pub const REVIEW_RESPONSE_FORMAT: &str = r#"Now critique the report.

Return ONLY JSON in this format:
{
  "overall_score": number,
  "section_scores": {
    "problem_explanation": number,
    "core_idea_explanation": number,
    "method_explanation": number,
    "results_explanation": number,
    "limitations": number,
    "clarity": number,
    "structure": number,
    "hallucination_risk": number
  },
  "missing_sections": [string],
  "hallucinated_statements": [
    { "statement": string, "reason": string, "severity": "high|medium|low" }
  ],
  "weak_explanations": [
    { "section": string, "problem": string, "fix_suggestion": string }
  ],
  "rewrite_instructions": [string]
}

Constraints:
- overall_score must be 0 to 100.
- Each section score must be 0 to 10.
- hallucination_risk: 10 means extremely risky, 0 means fully grounded.
- Be strict."#;

// ── Helpers ──────────────────────────────────────────────────────────────

/// First `max_chars` characters of `text`, never splitting a UTF-8 sequence.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Join labelled context blocks (`LABEL:\n<body>`) and a trailing response
/// format into one user message.
pub fn compose_context(blocks: &[(&str, &str)], response_format: &str) -> String {
    let mut out = String::new();
    for (label, body) in blocks {
        out.push_str(label);
        out.push_str(":\n");
        out.push_str(body);
        out.push_str("\n\n");
    }
    out.push_str(response_format);
    out
}
