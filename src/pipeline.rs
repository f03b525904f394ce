// src/pipeline.rs

use crate::extractors::content::{extract_all_sections, DocumentIdentity, ExtractedContent};
use crate::extractors::spans::{resolve_spans, SpanMap};
use crate::extractors::toc::{extract_toc_mapping, SourceType, TocSection};
use crate::oracle::prompts::subject_prompt;
use crate::oracle::{OraclePayload, SectionOracle};
use crate::pdf::search::{find_pages_with_text, SearchMode, SearchWindow};
use crate::pdf::DocumentPages;
use crate::storage::{ContentType, ObjectStore, OutputLayout};
use crate::utils::error::{AppError, ExtractError};

// The literal text located in the page window to find the TOC. Appliance
// manuals title the page "Contents" or "Table of contents"; the page text
// layer delivers the lowercase body form searched here.
pub const TOC_SEARCH_TEXT: &str = "contents";
// TOCs sit at the front of a manual; scanning past the first few pages
// only picks up cross-references.
const TOC_PAGES_TO_SEARCH: usize = 5;

/// One parsing session over one open manual.
///
/// Owns the document handle for its lifetime; the oracle and store are
/// injected so tests can substitute fakes. All stages run strictly in
/// sequence, one oracle call at a time.
pub struct ManualParser<'a, D, O, S> {
    document: D,
    identity: DocumentIdentity,
    layout: OutputLayout,
    oracle: &'a O,
    store: &'a S,
}

impl<'a, D, O, S> ManualParser<'a, D, O, S>
where
    D: DocumentPages,
    O: SectionOracle,
    S: ObjectStore,
{
    pub fn new(
        document: D,
        identity: DocumentIdentity,
        file_stem: &str,
        oracle: &'a O,
        store: &'a S,
    ) -> Self {
        let layout = OutputLayout::new(&identity.brand, &identity.model_number, file_stem);
        Self {
            document,
            identity,
            layout,
            oracle,
            store,
        }
    }

    /// Locates the TOC pages, extracts and merges the mapping through the
    /// oracle, and resolves the subsection spans.
    ///
    /// Returns `Ok(None)` when no TOC pages are found; downstream stages
    /// are short-circuited, but the run is not failed.
    pub async fn extract_toc(&self) -> Result<Option<TocSection>, AppError> {
        let Some(pages) = find_pages_with_text(
            &self.document,
            TOC_SEARCH_TEXT,
            &SearchWindow::FirstPages(TOC_PAGES_TO_SEARCH),
            SearchMode::ConsecutivePages,
        )?
        else {
            tracing::warn!("No table of contents located, skipping extraction");
            return Ok(None);
        };

        let (mapping, page_start, page_end) = extract_toc_mapping(
            &self.document,
            &pages,
            &self.identity.device,
            self.oracle,
            self.store,
            &self.layout,
        )
        .await?;

        let spans = resolve_spans(&mapping);
        tracing::info!(
            "Table of contents extracted: {} section(s), {} subsection span(s)",
            mapping.len(),
            spans.len()
        );

        self.put_document_map_json("toc_mapping.json", &mapping.to_value())
            .await;
        self.put_document_map_json("section_spans.json", &spans.to_value())
            .await;

        Ok(Some(TocSection {
            title: "toc".to_string(),
            page_start,
            page_end,
            source_type: SourceType::Pdf,
            extraction_type: SourceType::Image,
            destination_type: SourceType::Json,
            mapping,
            spans,
        }))
    }

    /// Materializes every resolved span as section content, persisting
    /// successes and keeping per-section failures as markers.
    pub async fn extract_sections(
        &self,
        toc: &TocSection,
    ) -> Vec<Result<ExtractedContent, ExtractError>> {
        extract_all_sections(
            &self.document,
            &toc.spans,
            &self.identity,
            self.store,
            &self.layout,
        )
        .await
    }

    /// Asks the oracle which subsections of the resolved span mapping are
    /// relevant to a free-text subject ("troubleshooting", "parts", ...).
    ///
    /// Oracle or schema failures here are recoverable: logged and `None`.
    pub async fn estimate_subject_sections(
        &self,
        toc: &TocSection,
        subject: &str,
    ) -> Option<SpanMap> {
        // Prefer the span-mapping artifact already written to the store;
        // fall back to rendering the in-memory copy.
        let spans_key = self.layout.document_map_key("section_spans.json");
        let stored = match self.store.get(&spans_key).await {
            Ok(path) => std::fs::read_to_string(&path).ok(),
            Err(e) => {
                tracing::debug!("Span mapping not readable from store: {}", e);
                None
            }
        };
        let spans_json = match stored {
            Some(json) => json,
            None => match serde_json::to_string_pretty(&toc.spans.to_value()) {
                Ok(json) => json,
                Err(e) => {
                    tracing::error!("Failed to serialize span mapping: {}", e);
                    return None;
                }
            },
        };

        let prompt = subject_prompt(&self.identity.device, "json", "JSON", subject);
        let reply = match self
            .oracle
            .extract_json(&OraclePayload::json_text(spans_json), &prompt)
            .await
        {
            Ok(value) => value,
            Err(e) => {
                tracing::error!("Oracle failed for subject '{}': {}", subject, e);
                return None;
            }
        };

        match SpanMap::from_oracle_value(&reply) {
            Ok(estimate) => {
                let artifact = format!(
                    "{}_pages.json",
                    crate::extractors::toc::normalize_section_name(subject)
                );
                self.put_document_map_json(&artifact, &estimate.to_value())
                    .await;
                Some(estimate)
            }
            Err(e) => {
                tracing::error!("Quarantining subject reply for '{}': {}", subject, e);
                None
            }
        }
    }

    async fn put_document_map_json(&self, name: &str, value: &serde_json::Value) {
        let key = self.layout.document_map_key(name);
        match serde_json::to_vec_pretty(value) {
            Ok(bytes) => {
                if let Err(e) = self.store.put(&key, &bytes, ContentType::Json).await {
                    tracing::warn!("Failed to store {}: {}", key, e);
                }
            }
            Err(e) => tracing::warn!("Failed to serialize {}: {}", key, e),
        }
    }
}
