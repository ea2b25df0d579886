//! Identifiers and store records
//!
//! `DocumentId` is the key shared by the collaboration server and the durable
//! store; `EditorId` identifies a single connection. `StoredDocument` is the
//! store's view of a document as returned by the read endpoint.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur when parsing a document identifier
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentIdError {
    #[error("Document ID is empty")]
    Empty,

    #[error("Document ID contains invalid character {0:?}")]
    InvalidCharacter(char),
}

/// Identifier of a document, matching a record key in the durable store
///
/// Opaque to the coordinator. Only rejected when it could not be used as a
/// single path segment or query value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Result<Self, DocumentIdError> {
        let id = id.into();
        if id.is_empty() {
            return Err(DocumentIdError::Empty);
        }
        if let Some(c) = id
            .chars()
            .find(|c| *c == '/' || *c == '?' || *c == '#' || c.is_whitespace() || c.is_control())
        {
            return Err(DocumentIdError::InvalidCharacter(c));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DocumentId {
    type Err = DocumentIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for DocumentId {
    type Error = DocumentIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DocumentId> for String {
    fn from(id: DocumentId) -> Self {
        id.0
    }
}

/// Opaque identifier of one editor connection
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EditorId(String);

impl EditorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh connection identifier
    pub fn generate() -> Self {
        Self(format!("editor-{}", Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EditorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A document as held by the durable store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredDocument {
    pub id: String,
    #[serde(default)]
    pub title: String,
    /// Content in exchange format (markup string)
    #[serde(default)]
    pub content: String,
    /// Milliseconds since the Unix epoch
    #[serde(default)]
    pub updated_at: Option<f64>,
}

impl StoredDocument {
    /// Last update time reported by the store, if it sent a valid one
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        let millis = self.updated_at?;
        if !millis.is_finite() {
            return None;
        }
        Utc.timestamp_millis_opt(millis as i64).single()
    }

    /// Whether the store holds any content for this document
    pub fn has_content(&self) -> bool {
        !self.content.trim().is_empty()
    }
}
