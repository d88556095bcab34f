//! Page-range construction from heading candidates.

use super::{HeadingCandidate, Section, Trace};

/// Turn heading candidates into ordered, non-overlapping sections.
///
/// Candidates are stably sorted by page. Each section starts on its heading's
/// page and ends the page before the next heading, clamped so it never ends
/// before it starts; the last section runs to `page_count`.
///
/// Two headings on the same page therefore yield a one-page section followed
/// by a section starting on that same page: the second heading's first page
/// is shared, not split. No candidates yields no sections.
pub fn build_sections(candidates: &[HeadingCandidate], page_count: usize) -> Vec<Section> {
    let mut ordered: Vec<&HeadingCandidate> = candidates.iter().collect();
    ordered.sort_by_key(|c| c.page);

    ordered
        .iter()
        .enumerate()
        .map(|(idx, c)| {
            let start_page = c.page;
            let end_page = match ordered.get(idx + 1) {
                Some(next) => start_page.max(next.page.saturating_sub(1)),
                // A heading past the reported page count means inconsistent
                // input; keep start ≤ end rather than emit an inverted range.
                None => page_count.max(start_page),
            };

            Section {
                section_id: Some(format!("S{}", idx + 1)),
                name: c.normalized_heading.clone(),
                start_page,
                end_page,
                trace: Some(Trace {
                    page: c.page,
                    snippet: c.snippet.clone(),
                }),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cand(page: usize, name: &str) -> HeadingCandidate {
        HeadingCandidate {
            page,
            raw_heading: name.to_string(),
            normalized_heading: name.to_string(),
            snippet: name.to_string(),
        }
    }

    #[test]
    fn empty_candidates_yield_no_sections() {
        assert!(build_sections(&[], 10).is_empty());
    }

    #[test]
    fn single_page_single_candidate() {
        let sections = build_sections(&[cand(1, "Introduction")], 1);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].start_page, 1);
        assert_eq!(sections[0].end_page, 1);
        assert_eq!(sections[0].section_id.as_deref(), Some("S1"));
    }

    #[test]
    fn ranges_end_before_next_heading() {
        let sections = build_sections(
            &[cand(1, "Introduction"), cand(3, "Method"), cand(7, "Results")],
            9,
        );
        let ranges: Vec<(usize, usize)> =
            sections.iter().map(|s| (s.start_page, s.end_page)).collect();
        assert_eq!(ranges, vec![(1, 2), (3, 6), (7, 9)]);
        assert_eq!(sections[1].trace.as_ref().unwrap().page, 3);
        assert_eq!(sections[1].trace.as_ref().unwrap().snippet, "Method");
    }

    #[test]
    fn unsorted_input_is_sorted_stably() {
        let sections = build_sections(
            &[cand(5, "Results"), cand(2, "Abstract"), cand(2, "Introduction")],
            6,
        );
        let names: Vec<&str> = sections.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Abstract", "Introduction", "Results"]);
        let ids: Vec<&str> = sections.iter().filter_map(|s| s.section_id.as_deref()).collect();
        assert_eq!(ids, vec!["S1", "S2", "S3"]);
    }

    #[test]
    fn same_page_headings_clamp_to_start() {
        let sections = build_sections(&[cand(2, "Abstract"), cand(2, "Introduction")], 4);
        assert_eq!((sections[0].start_page, sections[0].end_page), (2, 2));
        assert_eq!((sections[1].start_page, sections[1].end_page), (2, 4));
    }

    #[test]
    fn ordering_and_range_invariants_hold() {
        let cands = [
            cand(1, "Abstract"),
            cand(1, "Introduction"),
            cand(4, "Method"),
            cand(4, "Model"),
            cand(5, "Results"),
            cand(12, "References"),
        ];
        let sections = build_sections(&cands, 14);
        for s in &sections {
            assert!(s.start_page <= s.end_page, "{s:?}");
        }
        for pair in sections.windows(2) {
            assert!(pair[0].start_page <= pair[1].start_page);
        }
        assert_eq!(sections.last().unwrap().end_page, 14);
    }

    #[test]
    fn heading_past_page_count_keeps_valid_range() {
        let sections = build_sections(&[cand(1, "Introduction"), cand(6, "References")], 5);
        assert_eq!((sections[1].start_page, sections[1].end_page), (6, 6));
    }
}
