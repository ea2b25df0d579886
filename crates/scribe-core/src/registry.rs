//! Session registry
//!
//! One [`DocumentSession`] per actively edited document, keyed by
//! [`DocumentId`]. The map lock covers only insert, lookup and remove; each
//! session has its own short-lived lock for field updates. Neither lock is
//! ever held across an `.await`.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tokio::task::AbortHandle;
use tokio::time::Instant;

use crate::document::SharedDocument;
use crate::models::{DocumentId, EditorId};

/// A pending delayed flush
#[derive(Debug)]
pub struct ScheduledFlush {
    deadline: Instant,
    generation: u64,
    handle: AbortHandle,
}

impl ScheduledFlush {
    pub(crate) fn new(deadline: Instant, generation: u64, handle: AbortHandle) -> Self {
        Self {
            deadline,
            generation,
            handle,
        }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Stop the timer task; it never fires
    pub(crate) fn abort(self) {
        self.handle.abort();
    }
}

/// Bookkeeping for one actively edited document
#[derive(Debug)]
pub struct DocumentSession {
    document_id: DocumentId,
    connected_editors: HashSet<EditorId>,
    last_activity_at: DateTime<Utc>,
    scheduled_flush: Option<ScheduledFlush>,
    flush_in_flight: bool,
    /// Latest live handle seen in a callback
    document: Option<SharedDocument>,
    /// Held for the duration of every flush of this document
    flush_gate: Arc<tokio::sync::Mutex<()>>,
    next_generation: u64,
}

impl DocumentSession {
    pub fn new(document_id: DocumentId) -> Self {
        Self {
            document_id,
            connected_editors: HashSet::new(),
            last_activity_at: Utc::now(),
            scheduled_flush: None,
            flush_in_flight: false,
            document: None,
            flush_gate: Arc::new(tokio::sync::Mutex::new(())),
            next_generation: 0,
        }
    }

    pub fn document_id(&self) -> &DocumentId {
        &self.document_id
    }

    /// Add an editor; returns false if it was already connected
    pub fn add_editor(&mut self, editor_id: EditorId) -> bool {
        self.touch();
        self.connected_editors.insert(editor_id)
    }

    /// Remove an editor; returns false if it was not connected
    pub fn remove_editor(&mut self, editor_id: &EditorId) -> bool {
        self.connected_editors.remove(editor_id)
    }

    pub fn has_editors(&self) -> bool {
        !self.connected_editors.is_empty()
    }

    pub fn editor_count(&self) -> usize {
        self.connected_editors.len()
    }

    pub fn is_connected(&self, editor_id: &EditorId) -> bool {
        self.connected_editors.contains(editor_id)
    }

    /// Record activity now
    pub fn touch(&mut self) {
        self.last_activity_at = Utc::now();
    }

    pub fn last_activity_at(&self) -> DateTime<Utc> {
        self.last_activity_at
    }

    pub fn set_document(&mut self, document: SharedDocument) {
        self.document = Some(document);
    }

    pub fn document(&self) -> Option<SharedDocument> {
        self.document.clone()
    }

    pub fn is_flush_in_flight(&self) -> bool {
        self.flush_in_flight
    }

    pub(crate) fn set_flush_in_flight(&mut self, in_flight: bool) {
        self.flush_in_flight = in_flight;
    }

    pub fn scheduled_flush(&self) -> Option<&ScheduledFlush> {
        self.scheduled_flush.as_ref()
    }

    pub fn has_scheduled_flush(&self) -> bool {
        self.scheduled_flush.is_some()
    }

    pub(crate) fn flush_gate(&self) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(&self.flush_gate)
    }

    pub(crate) fn next_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    /// Install a new pending flush, returning the one it replaces
    pub(crate) fn replace_scheduled_flush(
        &mut self,
        flush: ScheduledFlush,
    ) -> Option<ScheduledFlush> {
        self.scheduled_flush.replace(flush)
    }

    pub(crate) fn take_scheduled_flush(&mut self) -> Option<ScheduledFlush> {
        self.scheduled_flush.take()
    }

    /// Claim the pending flush if it is still the one armed as `generation`
    pub(crate) fn claim_scheduled_flush(&mut self, generation: u64) -> bool {
        match &self.scheduled_flush {
            Some(flush) if flush.generation == generation => {
                self.scheduled_flush = None;
                true
            }
            _ => false,
        }
    }
}

/// Shared handle to a session
#[derive(Debug, Clone)]
pub struct SessionHandle(Arc<Mutex<DocumentSession>>);

impl SessionHandle {
    fn new(session: DocumentSession) -> Self {
        Self(Arc::new(Mutex::new(session)))
    }

    /// Lock the session for a short, synchronous update
    pub fn lock(&self) -> MutexGuard<'_, DocumentSession> {
        self.0.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn ptr_eq(&self, other: &SessionHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// All live sessions, keyed by document
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<DocumentId, SessionHandle>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self) -> MutexGuard<'_, HashMap<DocumentId, SessionHandle>> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Get the session for a document, creating an empty one if absent
    pub fn get_or_create(&self, document_id: &DocumentId) -> SessionHandle {
        self.map()
            .entry(document_id.clone())
            .or_insert_with(|| SessionHandle::new(DocumentSession::new(document_id.clone())))
            .clone()
    }

    pub fn get(&self, document_id: &DocumentId) -> Option<SessionHandle> {
        self.map().get(document_id).cloned()
    }

    pub fn remove(&self, document_id: &DocumentId) -> Option<SessionHandle> {
        self.map().remove(document_id)
    }

    pub fn contains(&self, document_id: &DocumentId) -> bool {
        self.map().contains_key(document_id)
    }

    pub fn len(&self) -> usize {
        self.map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map().is_empty()
    }

    /// Ids of every registered document, sorted
    pub fn document_ids(&self) -> Vec<DocumentId> {
        let mut ids: Vec<_> = self.map().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Visit every session
    ///
    /// Works on a snapshot of the map, so `f` may call back into the registry.
    pub fn for_each_session<F>(&self, mut f: F)
    where
        F: FnMut(&mut DocumentSession),
    {
        let sessions: Vec<SessionHandle> = self.map().values().cloned().collect();
        for session in sessions {
            f(&mut session.lock());
        }
    }
}
