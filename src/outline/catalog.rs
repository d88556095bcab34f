//! The table of section titles the heading detector recognises.
//!
//! The catalog is data, not control flow: each [`CatalogEntry`] names a
//! canonical section and the spellings that count as that section. The line
//! matcher is compiled from the table once, so extending the catalog never
//! touches the detection logic.

use crate::error::PaperError;
use once_cell::sync::Lazy;
use regex::Regex;

/// One recognised section title and its accepted spellings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Canonical display name, e.g. `"Related Work"`.
    pub canonical: String,
    /// Lower-case spellings matched against a heading line. Words are
    /// separated by single spaces; the matcher accepts any run of whitespace.
    pub synonyms: Vec<String>,
}

impl CatalogEntry {
    pub fn new(canonical: impl Into<String>, synonyms: &[&str]) -> Self {
        Self {
            canonical: canonical.into(),
            synonyms: synonyms.iter().map(|s| s.to_lowercase()).collect(),
        }
    }
}

/// Default research-paper section titles.
const DEFAULT_ENTRIES: &[(&str, &[&str])] = &[
    ("Abstract", &["abstract"]),
    ("Introduction", &["introduction"]),
    ("Related Work", &["related work"]),
    ("Background", &["background"]),
    ("Method", &["method"]),
    ("Methodology", &["methodology"]),
    ("Approach", &["approach"]),
    ("Model", &["model"]),
    ("Architecture", &["architecture"]),
    ("Experiments", &["experiments"]),
    ("Experimental Setup", &["experimental setup"]),
    ("Results", &["results"]),
    ("Discussion", &["discussion"]),
    ("Conclusion", &["conclusion"]),
    ("Limitations", &["limitations"]),
    ("Future Work", &["future work"]),
    ("References", &["references"]),
    ("Acknowledgements", &["acknowledgements", "acknowledgement"]),
    ("Appendix", &["appendix"]),
];

static DEFAULT_CATALOG: Lazy<HeadingCatalog> = Lazy::new(|| {
    let entries = DEFAULT_ENTRIES
        .iter()
        .map(|(canonical, synonyms)| CatalogEntry::new(*canonical, synonyms))
        .collect();
    HeadingCatalog::new(entries).expect("default heading catalog compiles")
});

/// Compiled heading catalog.
#[derive(Debug, Clone)]
pub struct HeadingCatalog {
    line_re: Regex,
}

impl HeadingCatalog {
    /// Compile a catalog. Fails only if `entries` is empty or a synonym is blank.
    pub fn new(entries: Vec<CatalogEntry>) -> Result<Self, PaperError> {
        if entries.is_empty() {
            return Err(PaperError::InvalidConfig(
                "heading catalog must contain at least one entry".into(),
            ));
        }

        let mut groups = Vec::with_capacity(entries.len());
        for entry in &entries {
            if entry.synonyms.iter().any(|s| s.trim().is_empty()) {
                return Err(PaperError::InvalidConfig(format!(
                    "heading catalog entry '{}' has a blank synonym",
                    entry.canonical
                )));
            }
            let alternatives = entry
                .synonyms
                .iter()
                .map(|s| {
                    s.split_whitespace()
                        .map(regex::escape)
                        .collect::<Vec<_>>()
                        .join(r"\s+")
                })
                .collect::<Vec<_>>()
                .join("|");
            groups.push(format!("(?:{alternatives})"));
        }

        // Optional "3" / "3.2" prefix, exactly one catalog name, nothing else.
        let pattern = format!(r"(?i)^(?:\d+(?:\.\d+)*)?\s*(?:{})\s*$", groups.join("|"));
        let line_re = Regex::new(&pattern)
            .map_err(|e| PaperError::InvalidConfig(format!("heading catalog: {e}")))?;

        Ok(Self { line_re })
    }

    /// The built-in research-paper catalog.
    pub fn default_catalog() -> &'static HeadingCatalog {
        &DEFAULT_CATALOG
    }

    /// Whether the line is a catalog heading at all.
    pub fn is_heading(&self, line: &str) -> bool {
        self.line_re.is_match(line.trim())
    }
}

impl Default for HeadingCatalog {
    fn default() -> Self {
        DEFAULT_CATALOG.clone()
    }
}
