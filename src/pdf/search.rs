// src/pdf/search.rs

use crate::pdf::DocumentPages;
use crate::utils::error::PdfError;

/// How matched pages are selected from the scanned window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    /// Only pages that sit in a run of two or more adjacent matches.
    /// TOC pages come in contiguous blocks, so lone hits (a "contents"
    /// cross-reference deep in a chapter, say) are noise.
    ConsecutivePages,
    /// The single first matching page in ascending index order.
    EarliestPageFirst,
}

/// The window of pages to scan.
#[derive(Debug, Clone)]
pub enum SearchWindow {
    /// The first `n` pages, clamped to the document length.
    FirstPages(usize),
    /// An explicit list of page indices; out-of-bounds entries are dropped.
    Pages(Vec<usize>),
}

/// Per-page match flags for one search call, in scan order.
/// Produced fresh per call and not mutated afterwards.
#[derive(Debug, Clone)]
pub struct PageMatchSet {
    matches: Vec<(usize, bool)>,
}

impl PageMatchSet {
    fn new(matches: Vec<(usize, bool)>) -> Self {
        Self { matches }
    }

    fn has_match(&self, page: usize) -> bool {
        self.matches
            .iter()
            .any(|&(idx, matched)| idx == page && matched)
    }

    /// Pages that belong to a run of >= 2 adjacent matched indices:
    /// page i qualifies when it matched and page i-1 or i+1 also matched
    /// within the scanned window. Returned deduplicated, ascending.
    fn consecutive_pages(&self) -> Vec<usize> {
        let mut runs: Vec<usize> = self
            .matches
            .iter()
            .filter(|&&(idx, matched)| {
                matched
                    && ((idx > 0 && self.has_match(idx - 1)) || self.has_match(idx + 1))
            })
            .map(|&(idx, _)| idx)
            .collect();
        runs.sort_unstable();
        runs.dedup();
        runs
    }

    /// The first matched page in scan order, if any.
    fn earliest_page(&self) -> Option<usize> {
        self.matches
            .iter()
            .find(|&&(_, matched)| matched)
            .map(|&(idx, _)| idx)
    }
}

/// Scans a window of document pages for a literal text and returns the
/// matching page indices per the selection mode, or `None` if the text
/// appears nowhere in the window.
///
/// Every returned index is strictly below the document length.
pub fn find_pages_with_text<D: DocumentPages>(
    document: &D,
    search_text: &str,
    window: &SearchWindow,
    mode: SearchMode,
) -> Result<Option<Vec<usize>>, PdfError> {
    let len = document.page_count();

    let candidates: Vec<usize> = match window {
        SearchWindow::FirstPages(n) => {
            if *n > len {
                tracing::info!(
                    "Pages to search ({}) exceeds the document length ({}), searching all pages",
                    n,
                    len
                );
            }
            (0..(*n).min(len)).collect()
        }
        SearchWindow::Pages(pages) => {
            let (valid, dropped): (Vec<usize>, Vec<usize>) =
                pages.iter().copied().partition(|&p| p < len);
            if !dropped.is_empty() {
                tracing::warn!(
                    "Dropping out-of-bounds pages {:?} from search window (document length {})",
                    dropped,
                    len
                );
            }
            valid
        }
    };

    let mut flags = Vec::with_capacity(candidates.len());
    for page in candidates {
        flags.push((page, document.page_has_text(page, search_text)?));
    }
    let match_set = PageMatchSet::new(flags);
    tracing::debug!("Page matches for '{}': {:?}", search_text, match_set);

    let pages = match mode {
        SearchMode::EarliestPageFirst => {
            match_set.earliest_page().map(|p| vec![p]).unwrap_or_default()
        }
        SearchMode::ConsecutivePages => match_set.consecutive_pages(),
    };

    if pages.is_empty() {
        tracing::error!("Could not find '{}' in the document", search_text);
        return Ok(None);
    }
    tracing::info!(
        "The search content '{}' is most likely on page(s) {:?}",
        search_text,
        pages
    );
    Ok(Some(pages))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// In-memory stand-in for an open PDF: one string per page.
    struct FakeDocument {
        pages: Vec<String>,
    }

    impl FakeDocument {
        fn from_flags(flags: &[bool], needle: &str) -> Self {
            Self {
                pages: flags
                    .iter()
                    .map(|&m| {
                        if m {
                            format!("... {} ...", needle)
                        } else {
                            "unrelated page text".to_string()
                        }
                    })
                    .collect(),
            }
        }
    }

    impl DocumentPages for FakeDocument {
        fn page_count(&self) -> usize {
            self.pages.len()
        }

        fn page_has_text(&self, page: usize, needle: &str) -> Result<bool, PdfError> {
            Ok(self.pages[page].contains(needle))
        }

        fn page_text(&self, page: usize) -> Result<String, PdfError> {
            Ok(self.pages[page].clone())
        }

        fn render_page_png(&self, _page: usize) -> Result<Vec<u8>, PdfError> {
            Ok(vec![])
        }
    }

    #[test]
    fn test_consecutive_pages_keeps_only_runs() {
        // Pattern F,F,T,T,F,T: pages 2-3 form a run, page 5 is a lone match.
        let doc = FakeDocument::from_flags(
            &[false, false, true, true, false, true],
            "contents",
        );
        let found = find_pages_with_text(
            &doc,
            "contents",
            &SearchWindow::FirstPages(6),
            SearchMode::ConsecutivePages,
        )
        .unwrap();
        assert_eq!(found, Some(vec![2, 3]));
    }

    #[test]
    fn test_earliest_page_first_returns_single_page() {
        let doc = FakeDocument::from_flags(
            &[false, false, true, true, false, true],
            "contents",
        );
        let found = find_pages_with_text(
            &doc,
            "contents",
            &SearchWindow::FirstPages(6),
            SearchMode::EarliestPageFirst,
        )
        .unwrap();
        assert_eq!(found, Some(vec![2]));
    }

    #[test]
    fn test_run_starting_at_page_zero_is_kept() {
        let doc = FakeDocument::from_flags(&[true, true, false], "contents");
        let found = find_pages_with_text(
            &doc,
            "contents",
            &SearchWindow::FirstPages(3),
            SearchMode::ConsecutivePages,
        )
        .unwrap();
        assert_eq!(found, Some(vec![0, 1]));
    }

    #[test]
    fn test_no_match_returns_none() {
        let doc = FakeDocument::from_flags(&[false, false, false], "contents");
        let found = find_pages_with_text(
            &doc,
            "contents",
            &SearchWindow::FirstPages(3),
            SearchMode::ConsecutivePages,
        )
        .unwrap();
        assert_eq!(found, None);
    }

    #[test]
    fn test_lone_match_is_dropped_in_consecutive_mode() {
        let doc = FakeDocument::from_flags(&[false, true, false], "contents");
        let found = find_pages_with_text(
            &doc,
            "contents",
            &SearchWindow::FirstPages(3),
            SearchMode::ConsecutivePages,
        )
        .unwrap();
        assert_eq!(found, None);
    }

    #[test]
    fn test_window_clamped_to_document_length() {
        // Asking for 100 pages of a 4-page document scans all 4 and never
        // yields an index >= the document length.
        let doc = FakeDocument::from_flags(&[false, false, true, true], "contents");
        let found = find_pages_with_text(
            &doc,
            "contents",
            &SearchWindow::FirstPages(100),
            SearchMode::ConsecutivePages,
        )
        .unwrap()
        .unwrap();
        assert!(found.iter().all(|&p| p < doc.page_count()));
        assert_eq!(found, vec![2, 3]);
    }

    #[test]
    fn test_explicit_window_drops_out_of_bounds_pages() {
        let doc = FakeDocument::from_flags(&[true, true], "contents");
        let found = find_pages_with_text(
            &doc,
            "contents",
            &SearchWindow::Pages(vec![0, 1, 7]),
            SearchMode::ConsecutivePages,
        )
        .unwrap();
        assert_eq!(found, Some(vec![0, 1]));
    }
}
