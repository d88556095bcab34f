//! Pipeline stage identifiers.
//!
//! Stages run strictly in declaration order. Each one persists the cumulative
//! [`crate::document::PaperDocument`] to its own file so a later run (or a
//! human) can inspect or resume from any point.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One step of the paper-to-report pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Pull page text, captions and embedded images out of the PDF.
    Extract,
    /// Heuristic outline inference.
    Outline,
    /// Model refinement of the heuristic outline, reconciled back in.
    Refine,
    /// Problem statement, motivation, contributions and key claims.
    Claims,
    /// Method description and experimental results.
    Method,
    /// Markdown explanation report.
    Report,
    /// Critique of the generated report.
    Review,
}

impl Stage {
    /// All stages in execution order.
    pub const ALL: [Stage; 7] = [
        Stage::Extract,
        Stage::Outline,
        Stage::Refine,
        Stage::Claims,
        Stage::Method,
        Stage::Report,
        Stage::Review,
    ];

    /// Short machine name, also accepted by [`FromStr`].
    pub fn name(self) -> &'static str {
        match self {
            Stage::Extract => "extract",
            Stage::Outline => "outline",
            Stage::Refine => "refine",
            Stage::Claims => "claims",
            Stage::Method => "method",
            Stage::Report => "report",
            Stage::Review => "review",
        }
    }

    /// Human-facing stage number used in log lines ("Stage#2.3").
    pub fn number(self) -> &'static str {
        match self {
            Stage::Extract => "01",
            Stage::Outline => "02",
            Stage::Refine => "2.3",
            Stage::Claims => "03",
            Stage::Method => "04",
            Stage::Report => "05",
            Stage::Review => "06",
        }
    }

    /// File the cumulative document is written to after this stage.
    ///
    /// Refinement rewrites the outline stage's file: the refined outline
    /// atomically replaces the heuristic one, or the heuristic one stays.
    pub fn output_file(self) -> &'static str {
        match self {
            Stage::Extract => "output_s1.json",
            Stage::Outline | Stage::Refine => "output_s2.json",
            Stage::Claims => "output_s3.json",
            Stage::Method => "output_s4.json",
            Stage::Report => "output_s5.json",
            Stage::Review => "output_s6.json",
        }
    }

    /// Whether the stage issues a model call.
    pub fn needs_llm(self) -> bool {
        !matches!(self, Stage::Extract | Stage::Outline)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}", self.number(), self.name())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Stage::ALL
            .into_iter()
            .find(|st| st.name() == wanted)
            .ok_or_else(|| {
                format!(
                    "unknown stage '{s}' (expected one of: {})",
                    Stage::ALL.map(Stage::name).join(", ")
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_matches_execution() {
        let mut sorted = Stage::ALL;
        sorted.sort();
        assert_eq!(sorted, Stage::ALL);
        assert!(Stage::Outline < Stage::Refine);
    }

    #[test]
    fn refine_shares_outline_file() {
        assert_eq!(Stage::Refine.output_file(), Stage::Outline.output_file());
    }

    #[test]
    fn parse_round_trips_names() {
        for st in Stage::ALL {
            assert_eq!(st.name().parse::<Stage>().unwrap(), st);
        }
        assert!("Claims".parse::<Stage>().is_ok());
        assert!("nope".parse::<Stage>().is_err());
    }

    #[test]
    fn display_includes_number_and_name() {
        assert_eq!(Stage::Refine.to_string(), "#2.3 refine");
    }
}
