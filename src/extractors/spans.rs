// src/extractors/spans.rs

use crate::extractors::toc::{normalize_section_name, TocMapping};
use crate::utils::error::OracleError;

/// A page span bounding one subsection's content. `end: None` means
/// "through the end of the document" and is resolved by the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: i64,
    pub end: Option<i64>,
}

/// Ordered subsection -> span mapping. Order is the flattening order of
/// the source [`TocMapping`]; the final entry always has an open end.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpanMap {
    entries: Vec<(String, Span)>,
}

impl SpanMap {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, Span)> {
        self.entries.iter()
    }

    pub fn get(&self, name: &str) -> Option<Span> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|&(_, span)| span)
    }

    /// Ordered JSON rendering: `{"name": [start, end|null], ...}`.
    pub fn to_value(&self) -> serde_json::Value {
        let mut root = serde_json::Map::new();
        for (name, span) in &self.entries {
            let end = match span.end {
                Some(page) => serde_json::Value::from(page),
                None => serde_json::Value::Null,
            };
            root.insert(
                name.clone(),
                serde_json::Value::Array(vec![serde_json::Value::from(span.start), end]),
            );
        }
        serde_json::Value::Object(root)
    }

    /// Validates a `{"name": [start, end|null]}` oracle reply, as returned
    /// by the subject-of-interest prompt.
    pub fn from_oracle_value(value: &serde_json::Value) -> Result<Self, OracleError> {
        let object = value
            .as_object()
            .ok_or_else(|| OracleError::InvalidSchema("reply is not a JSON object".into()))?;

        let mut map = SpanMap::default();
        for (name, pair) in object {
            let array = pair.as_array().ok_or_else(|| {
                OracleError::InvalidSchema(format!("span of '{}' is not an array", name))
            })?;
            let start = array.first().and_then(serde_json::Value::as_i64).ok_or_else(|| {
                OracleError::InvalidSchema(format!("span of '{}' has no integer start", name))
            })?;
            let end = match array.get(1) {
                None | Some(serde_json::Value::Null) => None,
                Some(page) => Some(page.as_i64().ok_or_else(|| {
                    OracleError::InvalidSchema(format!(
                        "span of '{}' has a non-integer end",
                        name
                    ))
                })?),
            };
            map.insert(normalize_section_name(name), Span { start, end });
        }
        Ok(map)
    }

    fn insert(&mut self, key: String, span: Span) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = span,
            None => self.entries.push((key, span)),
        }
    }
}

/// Flattens a TOC mapping into the ordered subsection span mapping.
///
/// Sections are visited in mapping order and their subsections in reply
/// order; each subsection's span ends one page past its own start, except
/// the final entry, which stays open-ended. Top-level section page numbers
/// are not carried over, so a section without subsections contributes
/// nothing.
///
/// Page numbers are taken as reported; bounds are enforced only when
/// content is extracted.
pub fn resolve_spans(mapping: &TocMapping) -> SpanMap {
    let mut flat: Vec<(String, i64)> = Vec::new();
    for (_, entry) in mapping.iter() {
        for (sub_name, page) in &entry.subsections {
            // Duplicate subsection names collapse last-write-wins,
            // keeping the first position.
            match flat.iter_mut().find(|(k, _)| k == sub_name) {
                Some((_, existing)) => *existing = *page,
                None => flat.push((sub_name.clone(), *page)),
            }
        }
    }

    let total = flat.len();
    let mut map = SpanMap::default();
    for (i, (name, page)) in flat.into_iter().enumerate() {
        let end = if i + 1 == total { None } else { Some(page + 1) };
        map.entries.push((name, Span { start: page, end }));
    }
    map
}
