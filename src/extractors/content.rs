// src/extractors/content.rs

use serde::Serialize;

use crate::extractors::spans::{Span, SpanMap};
use crate::pdf::DocumentPages;
use crate::storage::{ContentType, ObjectStore, OutputLayout};
use crate::utils::error::ExtractError;

/// Identity metadata stamped onto every extracted section.
#[derive(Debug, Clone)]
pub struct DocumentIdentity {
    pub document_hash: String,
    pub model_number: String,
    pub brand: String,
    pub device: String,
}

/// One materialized section: resolved page range, concatenated page text
/// and the identity of the source document. Written once, never mutated.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractedContent {
    pub section_name: String,
    pub page_start: usize,
    pub page_end: usize,
    pub content: String,
    pub document_hash: String,
    pub model_number: String,
    pub brand: String,
    pub device: String,
}

/// Slices the document pages covered by one span into a text blob.
///
/// An open-ended span runs through the last page. The end page is clamped
/// into the document; a start page outside it fails this section only.
/// Ranges are inclusive: `end = start + 1` covers the subsection's page
/// and its successor.
pub fn extract_section<D: DocumentPages>(
    document: &D,
    section_name: &str,
    span: Span,
    identity: &DocumentIdentity,
) -> Result<ExtractedContent, ExtractError> {
    let len = document.page_count();
    if len == 0 || span.start < 0 || span.start >= len as i64 {
        return Err(ExtractError::PageOutOfRange {
            section: section_name.to_string(),
            page: span.start,
            len,
        });
    }
    let page_start = span.start as usize;
    let last = len - 1;

    let page_end = match span.end {
        None => last,
        Some(end) => {
            let clamped = end.clamp(span.start, last as i64) as usize;
            if clamped as i64 != end {
                tracing::debug!(
                    "Clamped end page of '{}' from {} to {}",
                    section_name,
                    end,
                    clamped
                );
            }
            clamped
        }
    };

    let mut pages = Vec::with_capacity(page_end - page_start + 1);
    for page in page_start..=page_end {
        let text = document
            .page_text(page)
            .map_err(|e| ExtractError::ContentFailed {
                section: section_name.to_string(),
                reason: e.to_string(),
            })?;
        pages.push(text);
    }

    Ok(ExtractedContent {
        section_name: section_name.to_string(),
        page_start,
        page_end,
        content: pages.join("\n\n"),
        document_hash: identity.document_hash.clone(),
        model_number: identity.model_number.clone(),
        brand: identity.brand.clone(),
        device: identity.device.clone(),
    })
}

/// Drives [`extract_section`] over every entry of the span mapping.
///
/// Per-section failures are logged and kept as error markers; sibling
/// sections are unaffected. Successes are persisted under the sections
/// namespace, keyed by name, content-hash prefix and model number; a
/// storage failure is logged and does not discard the section. Result
/// order is span-mapping order.
pub async fn extract_all_sections<D, S>(
    document: &D,
    spans: &SpanMap,
    identity: &DocumentIdentity,
    store: &S,
    layout: &OutputLayout,
) -> Vec<Result<ExtractedContent, ExtractError>>
where
    D: DocumentPages,
    S: ObjectStore,
{
    let hash_prefix: String = identity.document_hash.chars().take(8).collect();
    let mut results = Vec::with_capacity(spans.len());

    for (name, span) in spans.iter() {
        match extract_section(document, name, *span, identity) {
            Ok(section) => {
                tracing::info!(
                    "Extracted '{}' (pages {}..={}, {} bytes)",
                    name,
                    section.page_start,
                    section.page_end,
                    section.content.len()
                );

                let key = layout.section_key(&format!(
                    "{}_{}_{}.json",
                    name, hash_prefix, identity.model_number
                ));
                match serde_json::to_vec_pretty(&section) {
                    Ok(bytes) => {
                        if let Err(e) = store.put(&key, &bytes, ContentType::Json).await {
                            tracing::error!("Failed to store section {}: {}", key, e);
                        }
                    }
                    Err(e) => tracing::error!("Failed to serialize section '{}': {}", name, e),
                }

                results.push(Ok(section));
            }
            Err(e) => {
                tracing::error!("Failed to extract section '{}': {}", name, e);
                results.push(Err(e));
            }
        }
    }
    results
}

// --- Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalStore;
    use crate::utils::error::PdfError;

    /// In-memory document: one text per page; a `None` page fails to read.
    struct FakeDocument {
        pages: Vec<Option<String>>,
    }

    impl FakeDocument {
        fn numbered(count: usize) -> Self {
            Self {
                pages: (0..count).map(|i| Some(format!("page {} text", i))).collect(),
            }
        }
    }

    impl DocumentPages for FakeDocument {
        fn page_count(&self) -> usize {
            self.pages.len()
        }

        fn page_has_text(&self, page: usize, needle: &str) -> Result<bool, PdfError> {
            Ok(self.pages[page]
                .as_ref()
                .map(|text| text.contains(needle))
                .unwrap_or(false))
        }

        fn page_text(&self, page: usize) -> Result<String, PdfError> {
            self.pages[page]
                .clone()
                .ok_or_else(|| PdfError::Text(page, "unreadable page".into()))
        }

        fn render_page_png(&self, _page: usize) -> Result<Vec<u8>, PdfError> {
            Ok(vec![])
        }
    }

    fn identity() -> DocumentIdentity {
        DocumentIdentity {
            document_hash: "0123456789abcdef".to_string(),
            model_number: "DF243".to_string(),
            brand: "LG".to_string(),
            device: "Dishwasher".to_string(),
        }
    }

    #[test]
    fn test_open_span_runs_through_end_of_document() {
        let doc = FakeDocument::numbered(20);
        let section = extract_section(
            &doc,
            "error_codes",
            Span {
                start: 12,
                end: None,
            },
            &identity(),
        )
        .unwrap();

        assert_eq!(section.page_start, 12);
        assert_eq!(section.page_end, 19);
        assert!(!section.content.is_empty());
        assert!(section.content.contains("page 12 text"));
        assert!(section.content.contains("page 19 text"));
        assert!(!section.content.contains("page 11 text"));
    }

    #[test]
    fn test_closed_span_is_inclusive() {
        let doc = FakeDocument::numbered(20);
        let section = extract_section(
            &doc,
            "getting_started",
            Span {
                start: 2,
                end: Some(3),
            },
            &identity(),
        )
        .unwrap();

        assert_eq!((section.page_start, section.page_end), (2, 3));
        assert!(section.content.contains("page 2 text"));
        assert!(section.content.contains("page 3 text"));
        assert!(!section.content.contains("page 4 text"));
    }

    #[test]
    fn test_end_is_clamped_into_document() {
        let doc = FakeDocument::numbered(10);
        let section = extract_section(
            &doc,
            "care",
            Span {
                start: 8,
                end: Some(50),
            },
            &identity(),
        )
        .unwrap();
        assert_eq!(section.page_end, 9);
    }

    #[test]
    fn test_start_out_of_range_fails_the_section() {
        let doc = FakeDocument::numbered(10);
        let err = extract_section(
            &doc,
            "phantom",
            Span {
                start: 25,
                end: None,
            },
            &identity(),
        )
        .unwrap_err();
        assert!(matches!(err, ExtractError::PageOutOfRange { .. }));
    }

    #[test]
    fn test_repeated_extraction_is_byte_identical() {
        let doc = FakeDocument::numbered(20);
        let span = Span {
            start: 5,
            end: Some(9),
        };
        let first = extract_section(&doc, "usage", span, &identity()).unwrap();
        let second = extract_section(&doc, "usage", span, &identity()).unwrap();
        assert_eq!(first.content, second.content);
    }

    #[tokio::test]
    async fn test_extract_all_isolates_per_section_failures() {
        let mut doc = FakeDocument::numbered(10);
        doc.pages[4] = None; // section covering page 4 will fail

        let toc = crate::extractors::toc::TocMapping::from_oracle_value(&serde_json::json!({
            "intro": {"page_number": 1, "subsections": {"safety": 2, "broken": 4}},
            "care": {"page_number": 6, "subsections": {"cleaning": 7}}
        }))
        .unwrap();
        let spans = crate::extractors::spans::resolve_spans(&toc);

        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path()).unwrap();
        let layout = OutputLayout::with_date("LG", "DF243", "manual", "2026-08-05");

        let results = extract_all_sections(&doc, &spans, &identity(), &store, &layout).await;

        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok(), "safety should extract");
        assert!(results[1].is_err(), "broken should fail alone");
        assert!(results[2].is_ok(), "cleaning should extract");

        // Successes were persisted under the sections namespace.
        let stored = store
            .get("brand=LG/model=DF243/date=2026-08-05/manual/sections/safety_01234567_DF243.json")
            .await;
        assert!(stored.is_ok());
    }
}
