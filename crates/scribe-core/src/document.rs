//! Replicated document binding
//!
//! The coordinator only needs a narrow slice of the replicated-document
//! engine, captured by [`ReplicatedDocument`]. [`LiveDocument`] binds it to an
//! Automerge document whose editable body is a text object under the
//! `content` key of the root map.

use std::fmt;
use std::sync::Arc;

use automerge::sync::{self, SyncDoc};
use automerge::transaction::{CommitOptions, Transactable};
use automerge::{ActorId, AutoCommit, ChangeHash, ObjId, ObjType, ReadDoc, ScalarValue, Value, ROOT};
use serde_json::{Map, Number, Value as JsonValue};
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Errors that can occur during document operations
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Automerge error: {0}")]
    Automerge(#[from] automerge::AutomergeError),

    #[error("Invalid field type for {0}")]
    InvalidType(String),
}

/// Keys used in the Automerge document structure
mod keys {
    pub const CONTENT: &str = "content";
}

/// Namespace for seed actors; the actor is a v5 uuid of the seeded text
const SEED_NAMESPACE: Uuid = Uuid::from_u128(0x6a1f_52c4_9e0b_4d7a_8c3e_51b2_f0d9_a417);

/// A live document shared between the room that edits it and the coordinator
pub type SharedDocument = Arc<Mutex<LiveDocument>>;

/// The operations the persistence coordinator needs from the engine
pub trait ReplicatedDocument {
    /// Apply an encoded update (changes or a saved document) from a peer
    fn apply_remote_update(&mut self, update: &[u8]) -> Result<(), DocumentError>;

    /// Encode the full document state
    fn encode_snapshot(&mut self) -> Vec<u8>;

    /// Whether the document holds no user content at all
    fn is_empty(&self) -> bool;

    /// Import content produced by the extractor for a freshly loaded document
    fn import_initial_content(&mut self, initial: &InitialContent) -> Result<(), DocumentError>;

    /// Primary export: the editable body as exchange-format text
    fn export_text(&self) -> Result<String, DocumentError>;

    /// Secondary export: every other root field as a key-value snapshot
    fn export_fields(&self) -> Result<Map<String, JsonValue>, DocumentError>;
}

/// Encoded engine state used to seed a new document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitialContent {
    bytes: Vec<u8>,
}

impl InitialContent {
    /// Build the seed change for a document whose body is `text`
    ///
    /// The change uses an actor derived from the text and a fixed timestamp,
    /// so seeding the same text twice yields identical bytes. Seeds of
    /// different revisions come from different actors, so a replica that
    /// still holds an older seed merges with a newer one instead of clashing
    /// on the same actor and sequence number.
    pub fn seed(text: &str) -> Result<Self, DocumentError> {
        Self::build(text, text, &Map::new())
    }

    /// Build the seed change for a document with an empty body and the given
    /// root fields
    pub fn seed_fields(fields: &Map<String, JsonValue>) -> Result<Self, DocumentError> {
        let source = JsonValue::Object(fields.clone()).to_string();
        Self::build(&source, "", fields)
    }

    fn build(
        source: &str,
        body: &str,
        fields: &Map<String, JsonValue>,
    ) -> Result<Self, DocumentError> {
        let actor = Uuid::new_v5(&SEED_NAMESPACE, source.as_bytes());
        let mut doc = AutoCommit::new().with_actor(ActorId::from(actor.as_bytes().as_slice()));

        let content = doc.put_object(ROOT, keys::CONTENT, ObjType::Text)?;
        if !body.is_empty() {
            doc.splice_text(&content, 0, 0, body)?;
        }
        for (key, value) in fields {
            if key != keys::CONTENT {
                put_json(&mut doc, &ROOT, key.as_str(), value)?;
            }
        }
        let _ = doc.commit_with(CommitOptions::default().with_time(0));

        Ok(Self { bytes: doc.save() })
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// An in-memory replica of one collaborative document
pub struct LiveDocument {
    doc: AutoCommit,
}

impl LiveDocument {
    /// Create a document with no content object yet
    pub fn new() -> Self {
        Self {
            doc: AutoCommit::new(),
        }
    }

    /// Create a document from imported initial content
    pub fn from_initial(initial: &InitialContent) -> Result<Self, DocumentError> {
        let mut document = Self::new();
        document.import_initial_content(initial)?;
        Ok(document)
    }

    /// Wrap the document for sharing with the coordinator
    pub fn into_shared(self) -> SharedDocument {
        Arc::new(Mutex::new(self))
    }

    /// Current heads of the change graph
    pub fn heads(&mut self) -> Vec<ChangeHash> {
        self.doc.get_heads()
    }

    /// Fork the document (used by peers that edit a copy)
    pub fn fork(&mut self) -> Self {
        Self {
            doc: self.doc.fork(),
        }
    }

    /// Generate the next sync message for a peer, if there is anything to say
    pub fn generate_sync_message(&mut self, state: &mut sync::State) -> Option<sync::Message> {
        self.doc.sync().generate_sync_message(state)
    }

    /// Apply a sync message received from a peer
    pub fn receive_sync_message(
        &mut self,
        state: &mut sync::State,
        message: sync::Message,
    ) -> Result<(), DocumentError> {
        self.doc.sync().receive_sync_message(state, message)?;
        Ok(())
    }

    /// Replace `delete` characters at `pos` in the body with `text`
    ///
    /// Creates the body text object if the document has none yet.
    pub fn splice_content(
        &mut self,
        pos: usize,
        delete: usize,
        text: &str,
    ) -> Result<(), DocumentError> {
        let content = match self.content_id()? {
            Some(id) => id,
            None => self.doc.put_object(ROOT, keys::CONTENT, ObjType::Text)?,
        };
        self.doc.splice_text(&content, pos, delete as _, text)?;
        Ok(())
    }

    /// Set a scalar root field alongside the body
    pub fn put_field(&mut self, key: &str, value: impl Into<ScalarValue>) -> Result<(), DocumentError> {
        if key == keys::CONTENT {
            return Err(DocumentError::InvalidType(key.to_string()));
        }
        self.doc.put(ROOT, key, value.into())?;
        Ok(())
    }

    /// Drop the body object entirely, leaving other root fields in place
    pub fn clear_content(&mut self) -> Result<(), DocumentError> {
        if self.doc.get(ROOT, keys::CONTENT)?.is_some() {
            self.doc.delete(ROOT, keys::CONTENT)?;
        }
        Ok(())
    }

    fn content_id(&self) -> Result<Option<ObjId>, DocumentError> {
        match self.doc.get(ROOT, keys::CONTENT)? {
            Some((Value::Object(ObjType::Text), id)) => Ok(Some(id)),
            Some(_) => Err(DocumentError::InvalidType(keys::CONTENT.to_string())),
            None => Ok(None),
        }
    }

    fn value_to_json(&self, value: Value<'_>, obj_id: &ObjId) -> Result<JsonValue, DocumentError> {
        match value {
            Value::Scalar(scalar) => Ok(scalar_to_json(&scalar)),
            Value::Object(ObjType::Text) => Ok(JsonValue::String(self.doc.text(obj_id)?)),
            Value::Object(ObjType::Map) | Value::Object(ObjType::Table) => {
                let mut map = Map::new();
                for key in self.doc.keys(obj_id) {
                    if let Some((child, child_id)) = self.doc.get(obj_id, key.as_str())? {
                        map.insert(key.clone(), self.value_to_json(child, &child_id)?);
                    }
                }
                Ok(JsonValue::Object(map))
            }
            Value::Object(ObjType::List) => {
                let mut list = Vec::new();
                for i in 0..self.doc.length(obj_id) {
                    if let Some((child, child_id)) = self.doc.get(obj_id, i)? {
                        list.push(self.value_to_json(child, &child_id)?);
                    }
                }
                Ok(JsonValue::Array(list))
            }
        }
    }
}

impl ReplicatedDocument for LiveDocument {
    fn apply_remote_update(&mut self, update: &[u8]) -> Result<(), DocumentError> {
        self.doc.load_incremental(update)?;
        Ok(())
    }

    fn encode_snapshot(&mut self) -> Vec<u8> {
        self.doc.save()
    }

    fn is_empty(&self) -> bool {
        let text_empty = self.export_text().map(|t| t.is_empty()).unwrap_or(true);
        let fields_empty = self.export_fields().map(|f| f.is_empty()).unwrap_or(true);
        text_empty && fields_empty
    }

    fn import_initial_content(&mut self, initial: &InitialContent) -> Result<(), DocumentError> {
        self.doc.load_incremental(initial.as_bytes())?;
        Ok(())
    }

    fn export_text(&self) -> Result<String, DocumentError> {
        match self.doc.get(ROOT, keys::CONTENT)? {
            Some((Value::Object(ObjType::Text), id)) => Ok(self.doc.text(&id)?),
            Some((value @ Value::Scalar(_), _)) => Ok(value
                .to_str()
                .map(|s| s.to_string())
                .unwrap_or_default()),
            _ => Ok(String::new()),
        }
    }

    fn export_fields(&self) -> Result<Map<String, JsonValue>, DocumentError> {
        let mut fields = Map::new();
        for key in self.doc.keys(ROOT) {
            if key == keys::CONTENT {
                continue;
            }
            if let Some((value, id)) = self.doc.get(ROOT, key.as_str())? {
                fields.insert(key.clone(), self.value_to_json(value, &id)?);
            }
        }
        Ok(fields)
    }
}

impl fmt::Debug for LiveDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveDocument").finish_non_exhaustive()
    }
}

impl Default for LiveDocument {
    fn default() -> Self {
        Self::new()
    }
}

/// Write a JSON value into a map object, creating nested objects as needed
fn put_json(doc: &mut AutoCommit, obj: &ObjId, key: &str, value: &JsonValue) -> Result<(), DocumentError> {
    match value {
        JsonValue::Object(map) => {
            let child = doc.put_object(obj, key, ObjType::Map)?;
            for (k, v) in map {
                put_json(doc, &child, k.as_str(), v)?;
            }
        }
        JsonValue::Array(items) => {
            let child = doc.put_object(obj, key, ObjType::List)?;
            for (i, item) in items.iter().enumerate() {
                insert_json(doc, &child, i, item)?;
            }
        }
        scalar => doc.put(obj, key, json_to_scalar(scalar))?,
    }
    Ok(())
}

fn insert_json(doc: &mut AutoCommit, list: &ObjId, index: usize, value: &JsonValue) -> Result<(), DocumentError> {
    match value {
        JsonValue::Object(map) => {
            let child = doc.insert_object(list, index, ObjType::Map)?;
            for (k, v) in map {
                put_json(doc, &child, k.as_str(), v)?;
            }
        }
        JsonValue::Array(items) => {
            let child = doc.insert_object(list, index, ObjType::List)?;
            for (i, item) in items.iter().enumerate() {
                insert_json(doc, &child, i, item)?;
            }
        }
        scalar => doc.insert(list, index, json_to_scalar(scalar))?,
    }
    Ok(())
}

fn json_to_scalar(value: &JsonValue) -> ScalarValue {
    match value {
        JsonValue::Bool(b) => ScalarValue::Boolean(*b),
        JsonValue::Number(n) => match (n.as_i64(), n.as_u64()) {
            (Some(i), _) => ScalarValue::Int(i),
            (None, Some(u)) => ScalarValue::Uint(u),
            _ => ScalarValue::F64(n.as_f64().unwrap_or_default()),
        },
        JsonValue::String(s) => ScalarValue::Str(s.as_str().into()),
        _ => ScalarValue::Null,
    }
}

fn scalar_to_json(scalar: &ScalarValue) -> JsonValue {
    match scalar {
        ScalarValue::Str(s) => JsonValue::String(s.to_string()),
        ScalarValue::Int(i) => JsonValue::from(*i),
        ScalarValue::Uint(u) => JsonValue::from(*u),
        ScalarValue::Timestamp(t) => JsonValue::from(*t),
        ScalarValue::F64(f) => Number::from_f64(*f)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        ScalarValue::Boolean(b) => JsonValue::Bool(*b),
        ScalarValue::Null => JsonValue::Null,
        other => JsonValue::String(other.to_string()),
    }
}
