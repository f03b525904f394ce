// src/extractors/toc.rs

// --- Imports ---
use once_cell::sync::Lazy;
use regex::Regex;

use crate::extractors::spans::SpanMap;
use crate::oracle::prompts::toc_prompt;
use crate::oracle::{OraclePayload, SectionOracle};
use crate::pdf::DocumentPages;
use crate::storage::{ContentType, ObjectStore, OutputLayout};
use crate::utils::error::{ExtractError, OracleError};

// --- Key normalization ---
// The oracle is asked for lowercase snake_case names, but replies drift;
// normalization keeps merged keys comparable across pages.
static NON_SNAKE_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("Failed to compile NON_SNAKE_RUN"));

pub fn normalize_section_name(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    NON_SNAKE_RUN
        .replace_all(&lowered, "_")
        .trim_matches('_')
        .to_string()
}

// --- Data Structures ---

/// Where a section's bytes came from or are headed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceType {
    Image,
    Pdf,
    Json,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Image => "img",
            SourceType::Pdf => "pdf",
            SourceType::Json => "json",
        }
    }
}

/// One top-level TOC section as reported by the oracle.
#[derive(Debug, Clone, PartialEq)]
pub struct TocEntry {
    pub page_number: i64,
    /// Subsection name -> page number, in reply order.
    pub subsections: Vec<(String, i64)>,
}

/// Validated section -> entry mapping, in insertion order.
///
/// Built only at the oracle boundary via [`TocMapping::from_oracle_value`];
/// raw JSON never travels deeper into the pipeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TocMapping {
    sections: Vec<(String, TocEntry)>,
}

impl TocMapping {
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, TocEntry)> {
        self.sections.iter()
    }

    pub fn get(&self, name: &str) -> Option<&TocEntry> {
        self.sections
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, entry)| entry)
    }

    /// Validates an oracle reply against the expected TOC schema.
    ///
    /// Rejects non-object replies, entries without an integer
    /// `page_number`, and non-integer subsection pages. Section and
    /// subsection names are normalized to snake_case.
    pub fn from_oracle_value(value: &serde_json::Value) -> Result<Self, OracleError> {
        let object = value
            .as_object()
            .ok_or_else(|| OracleError::InvalidSchema("reply is not a JSON object".into()))?;

        let mut mapping = TocMapping::default();
        for (name, entry_value) in object {
            let entry_object = entry_value.as_object().ok_or_else(|| {
                OracleError::InvalidSchema(format!("section '{}' is not an object", name))
            })?;

            let page_number = entry_object
                .get("page_number")
                .and_then(serde_json::Value::as_i64)
                .ok_or_else(|| {
                    OracleError::InvalidSchema(format!(
                        "section '{}' has no integer page_number",
                        name
                    ))
                })?;

            let mut subsections = Vec::new();
            if let Some(subs_value) = entry_object.get("subsections") {
                let subs_object = subs_value.as_object().ok_or_else(|| {
                    OracleError::InvalidSchema(format!(
                        "subsections of '{}' is not an object",
                        name
                    ))
                })?;
                for (sub_name, page_value) in subs_object {
                    let page = page_value.as_i64().ok_or_else(|| {
                        OracleError::InvalidSchema(format!(
                            "subsection '{}' of '{}' has a non-integer page",
                            sub_name, name
                        ))
                    })?;
                    upsert(&mut subsections, normalize_section_name(sub_name), page);
                }
            }

            let key = normalize_section_name(name);
            let entry = TocEntry {
                page_number,
                subsections,
            };
            match mapping.sections.iter_mut().find(|(k, _)| *k == key) {
                Some((_, existing)) => *existing = entry,
                None => mapping.sections.push((key, entry)),
            }
        }
        Ok(mapping)
    }

    /// Merge policy for combining per-page partial mappings: duplicate
    /// top-level keys are overwritten by the later page, keeping the
    /// position of the first insertion.
    pub fn merge_last_write_wins(&mut self, other: TocMapping) {
        for (key, entry) in other.sections {
            match self.sections.iter_mut().find(|(k, _)| *k == key) {
                Some((_, existing)) => {
                    tracing::debug!("Merge overwrites duplicate TOC section '{}'", key);
                    *existing = entry;
                }
                None => self.sections.push((key, entry)),
            }
        }
    }

    /// Ordered JSON rendering matching the oracle schema, for artifacts.
    pub fn to_value(&self) -> serde_json::Value {
        let mut root = serde_json::Map::new();
        for (name, entry) in &self.sections {
            let mut subs = serde_json::Map::new();
            for (sub_name, page) in &entry.subsections {
                subs.insert(sub_name.clone(), serde_json::Value::from(*page));
            }
            let mut object = serde_json::Map::new();
            object.insert(
                "page_number".to_string(),
                serde_json::Value::from(entry.page_number),
            );
            object.insert("subsections".to_string(), serde_json::Value::Object(subs));
            root.insert(name.clone(), serde_json::Value::Object(object));
        }
        serde_json::Value::Object(root)
    }
}

fn upsert(entries: &mut Vec<(String, i64)>, key: String, page: i64) {
    match entries.iter_mut().find(|(k, _)| *k == key) {
        Some((_, existing)) => *existing = page,
        None => entries.push((key, page)),
    }
}

/// The located table of contents of one manual: its own page span, the
/// merged mapping, and the resolved per-subsection spans. Content is
/// copied out of the document; no page handles are retained.
#[derive(Debug, Clone)]
pub struct TocSection {
    pub title: String,
    pub page_start: usize,
    pub page_end: usize,
    pub source_type: SourceType,
    pub extraction_type: SourceType,
    pub destination_type: SourceType,
    pub mapping: TocMapping,
    pub spans: SpanMap,
}

impl std::fmt::Display for TocSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Manual section '{}' spanning pages {} to {}, extraction process {} -> {} -> {}",
            self.title,
            self.page_start,
            self.page_end,
            self.source_type.as_str(),
            self.extraction_type.as_str(),
            self.destination_type.as_str()
        )
    }
}

// --- Oracle adapter ---

/// Renders each candidate TOC page, asks the oracle for its mapping, and
/// merges the per-page partials last-write-wins.
///
/// Per-page failures (render, upload, malformed or schema-invalid reply)
/// are logged and skipped; artifact-store failures never abort a page.
/// Only zero successful pages is an error. Returns the merged mapping
/// together with the first and last candidate page index.
pub async fn extract_toc_mapping<D, O, S>(
    document: &D,
    candidate_pages: &[usize],
    device: &str,
    oracle: &O,
    store: &S,
    layout: &OutputLayout,
) -> Result<(TocMapping, usize, usize), ExtractError>
where
    D: DocumentPages,
    O: SectionOracle,
    S: ObjectStore,
{
    let mut pages = candidate_pages.to_vec();
    pages.sort_unstable();
    pages.dedup();
    let (first, last) = match (pages.first(), pages.last()) {
        (Some(&first), Some(&last)) => (first, last),
        _ => return Err(ExtractError::TocExtractionFailed),
    };

    let prompt = toc_prompt(device, "image", "JSON");
    let mut merged = TocMapping::default();

    for &page in &pages {
        let png = match document.render_page_png(page) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("Skipping TOC page {}: render failed: {}", page, e);
                continue;
            }
        };

        let image_key = layout.document_map_key(&format!("toc_page_{}.png", page));
        if let Err(e) = store.put(&image_key, &png, ContentType::Png).await {
            tracing::warn!("Failed to store TOC image {}: {}", image_key, e);
        }

        let reply = match oracle
            .extract_json(&OraclePayload::png(png), &prompt)
            .await
        {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Oracle failed for TOC page {}: {}", page, e);
                continue;
            }
        };

        let page_mapping = match TocMapping::from_oracle_value(&reply) {
            Ok(mapping) => mapping,
            Err(e) => {
                tracing::warn!("Quarantining oracle reply for TOC page {}: {}", page, e);
                continue;
            }
        };

        let raw_key = layout.document_map_key(&format!("toc_mapping_page_{}.json", page));
        match serde_json::to_vec_pretty(&reply) {
            Ok(bytes) => {
                if let Err(e) = store.put(&raw_key, &bytes, ContentType::Json).await {
                    tracing::warn!("Failed to store raw mapping {}: {}", raw_key, e);
                }
            }
            Err(e) => tracing::warn!("Failed to serialize raw mapping for page {}: {}", page, e),
        }

        tracing::info!(
            "TOC page {} contributed {} section(s)",
            page,
            page_mapping.len()
        );
        merged.merge_last_write_wins(page_mapping);
    }

    if merged.is_empty() {
        tracing::error!("No candidate TOC page produced a mapping");
        return Err(ExtractError::TocExtractionFailed);
    }
    Ok((merged, first, last))
}

// --- Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_reply_is_accepted_in_order() {
        let reply = json!({
            "introduction": {"page_number": 1, "subsections": {"safety": 2}},
            "troubleshooting": {"page_number": 8, "subsections": {"error_codes": 9, "repair": 11}}
        });
        let mapping = TocMapping::from_oracle_value(&reply).unwrap();

        let names: Vec<&str> = mapping.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["introduction", "troubleshooting"]);

        let trouble = mapping.get("troubleshooting").unwrap();
        assert_eq!(trouble.page_number, 8);
        assert_eq!(
            trouble.subsections,
            vec![("error_codes".to_string(), 9), ("repair".to_string(), 11)]
        );
    }

    #[test]
    fn test_non_object_reply_is_rejected() {
        let err = TocMapping::from_oracle_value(&json!([1, 2, 3])).unwrap_err();
        assert!(matches!(err, OracleError::InvalidSchema(_)));
    }

    #[test]
    fn test_missing_page_number_is_rejected() {
        let reply = json!({"intro": {"subsections": {"safety": 2}}});
        let err = TocMapping::from_oracle_value(&reply).unwrap_err();
        assert!(matches!(err, OracleError::InvalidSchema(_)));
    }

    #[test]
    fn test_non_integer_subsection_page_is_rejected() {
        let reply = json!({"intro": {"page_number": 1, "subsections": {"safety": "two"}}});
        let err = TocMapping::from_oracle_value(&reply).unwrap_err();
        assert!(matches!(err, OracleError::InvalidSchema(_)));
    }

    #[test]
    fn test_section_names_are_normalized() {
        let reply = json!({"Error Codes & Fixes": {"page_number": 9, "subsections": {"Drain Pump": 10}}});
        let mapping = TocMapping::from_oracle_value(&reply).unwrap();
        let entry = mapping.get("error_codes_fixes").unwrap();
        assert_eq!(entry.subsections[0].0, "drain_pump");
    }

    #[test]
    fn test_merge_is_last_write_wins_keeping_position() {
        let mut merged = TocMapping::from_oracle_value(&json!({
            "intro": {"page_number": 1, "subsections": {}},
            "care": {"page_number": 5, "subsections": {}}
        }))
        .unwrap();
        let later = TocMapping::from_oracle_value(&json!({
            "intro": {"page_number": 3, "subsections": {"updated": 4}}
        }))
        .unwrap();

        merged.merge_last_write_wins(later);

        assert_eq!(merged.len(), 2);
        let names: Vec<&str> = merged.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["intro", "care"]);
        assert_eq!(merged.get("intro").unwrap().page_number, 3);
        assert_eq!(merged.get("intro").unwrap().subsections.len(), 1);
    }

    #[test]
    fn test_to_value_round_trips_through_validation() {
        let reply = json!({
            "usage": {"page_number": 4, "subsections": {"loading": 5, "programs": 6}}
        });
        let mapping = TocMapping::from_oracle_value(&reply).unwrap();
        assert_eq!(mapping.to_value(), reply);
    }
}
