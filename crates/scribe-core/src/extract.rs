//! Content extraction
//!
//! Converts between a live document and the store's exchange text. Export
//! tries, in order:
//!
//! 1. the document body (the engine's text export),
//! 2. a JSON snapshot of the other root fields,
//! 3. a fixed diagnostic placeholder.
//!
//! The order is fixed; a document with nothing to export still writes the
//! placeholder so the store records that a flush happened.
//!
//! Import reverses the chain: the placeholder seeds an empty document, a
//! field snapshot restores the fields, and anything else becomes the body.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::document::{DocumentError, InitialContent, ReplicatedDocument};

/// Written when a document has neither a body nor any other field
pub const EMPTY_PLACEHOLDER: &str = "<p><!-- scribe: document has no exportable content --></p>";

/// Which representation an export came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportSource {
    Body,
    Fields,
    Placeholder,
}

/// Converts documents to and from exchange text
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentExtractor;

impl ContentExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Export a document to exchange text
    pub fn serialize<D: ReplicatedDocument>(&self, document: &D) -> String {
        self.export(document).0
    }

    /// Export a document and report which representation was used
    pub fn export<D: ReplicatedDocument>(&self, document: &D) -> (String, ExportSource) {
        match document.export_text() {
            Ok(text) if !text.is_empty() => return (text, ExportSource::Body),
            Ok(_) => debug!("Document body is empty, trying field snapshot"),
            Err(e) => warn!("Failed to export document body: {}", e),
        }

        match document.export_fields() {
            Ok(fields) if has_content(&fields) => match serde_json::to_string(&fields) {
                Ok(json) => return (json, ExportSource::Fields),
                Err(e) => warn!("Failed to encode field snapshot: {}", e),
            },
            Ok(_) => debug!("Document has no fields either, writing placeholder"),
            Err(e) => warn!("Failed to export document fields: {}", e),
        }

        (EMPTY_PLACEHOLDER.to_string(), ExportSource::Placeholder)
    }

    /// Turn stored exchange text into initial content for a fresh document
    pub fn deserialize(&self, text: &str) -> Result<InitialContent, DocumentError> {
        if self.is_placeholder(text) {
            return InitialContent::seed("");
        }
        if let Some(fields) = field_snapshot(text) {
            debug!("Stored content is a field snapshot, restoring {} fields", fields.len());
            return InitialContent::seed_fields(&fields);
        }
        InitialContent::seed(text)
    }

    /// Whether stored text is the placeholder written for an empty document
    pub fn is_placeholder(&self, text: &str) -> bool {
        text.trim() == EMPTY_PLACEHOLDER
    }
}

/// Parse text written by the field-snapshot export
fn field_snapshot(text: &str) -> Option<Map<String, Value>> {
    let trimmed = text.trim();
    if !trimmed.starts_with('{') {
        return None;
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(fields)) if has_content(&fields) => Some(fields),
        _ => None,
    }
}

fn has_content(fields: &Map<String, Value>) -> bool {
    fields.values().any(is_meaningful)
}

fn is_meaningful(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => items.iter().any(is_meaningful),
        Value::Object(map) => map.values().any(is_meaningful),
        Value::Bool(_) | Value::Number(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::LiveDocument;

    #[test]
    fn test_serialize_body() {
        let extractor = ContentExtractor::new();
        let mut doc = LiveDocument::new();
        doc.splice_content(0, 0, "<p>Hello</p>").unwrap();
        doc.put_field("title", "ignored").unwrap();

        assert_eq!(
            extractor.export(&doc),
            ("<p>Hello</p>".to_string(), ExportSource::Body)
        );
    }

    #[test]
    fn test_serialize_falls_back_to_fields() {
        let extractor = ContentExtractor::new();
        let mut doc = LiveDocument::new();
        doc.put_field("title", "Plan").unwrap();

        let (text, source) = extractor.export(&doc);
        assert_eq!(source, ExportSource::Fields);
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["title"], "Plan");
    }

    #[test]
    fn test_serialize_blank_fields_use_placeholder() {
        let extractor = ContentExtractor::new();
        let mut doc = LiveDocument::new();
        doc.put_field("title", "").unwrap();

        assert_eq!(
            extractor.export(&doc),
            (EMPTY_PLACEHOLDER.to_string(), ExportSource::Placeholder)
        );
    }

    #[test]
    fn test_serialize_empty_document() {
        let extractor = ContentExtractor::new();
        assert_eq!(extractor.serialize(&LiveDocument::new()), EMPTY_PLACEHOLDER);
    }

    #[test]
    fn test_deserialize_then_serialize() {
        let extractor = ContentExtractor::new();
        let initial = extractor.deserialize("<h1>Title</h1><p>Body</p>").unwrap();
        let doc = LiveDocument::from_initial(&initial).unwrap();

        assert_eq!(extractor.serialize(&doc), "<h1>Title</h1><p>Body</p>");
    }

    #[test]
    fn test_placeholder_imports_as_empty_document() {
        let extractor = ContentExtractor::new();
        let initial = extractor.deserialize(EMPTY_PLACEHOLDER).unwrap();
        let doc = LiveDocument::from_initial(&initial).unwrap();

        assert!(doc.is_empty());
        assert!(extractor.is_placeholder(&format!("  {}\n", EMPTY_PLACEHOLDER)));
        assert!(!extractor.is_placeholder("<p>Hello</p>"));
    }

    #[test]
    fn test_field_snapshot_imports_as_fields() {
        let extractor = ContentExtractor::new();
        let mut doc = LiveDocument::new();
        doc.put_field("title", "Plan").unwrap();
        doc.put_field("revision", 3_i64).unwrap();
        let stored = extractor.serialize(&doc);

        let restored = LiveDocument::from_initial(&extractor.deserialize(&stored).unwrap()).unwrap();
        assert_eq!(restored.export_text().unwrap(), "");
        assert_eq!(restored.export_fields().unwrap(), doc.export_fields().unwrap());
        assert_eq!(extractor.serialize(&restored), stored);
    }

    #[test]
    fn test_brace_text_that_is_not_json_stays_body() {
        let extractor = ContentExtractor::new();
        let initial = extractor.deserialize("{not json}").unwrap();
        let doc = LiveDocument::from_initial(&initial).unwrap();

        assert_eq!(doc.export_text().unwrap(), "{not json}");
    }

    #[test]
    fn test_meaningful_values() {
        assert!(!is_meaningful(&Value::Null));
        assert!(!is_meaningful(&serde_json::json!([])));
        assert!(!is_meaningful(&serde_json::json!({"a": ""})));
        assert!(is_meaningful(&serde_json::json!(false)));
        assert!(is_meaningful(&serde_json::json!({"a": ["x"]})));
    }
}
