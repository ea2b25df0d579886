//! Connection lifecycle handling
//!
//! [`PersistenceCoordinator`] is what the collaboration host calls from its
//! hooks. It decides when stored content seeds a fresh document and when live
//! edits go back to the store:
//!
//! - `on_load` seeds a new document from the store, or starts it empty
//! - `on_connect` admits an editor after the origin check
//! - `on_change` (re)arms the debounced flush
//! - `on_disconnect` flushes right away when the last editor leaves
//! - `shutdown` flushes everything still live
//!
//! The host must serialize hook calls per document. Calls for different
//! documents may run concurrently.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::document::{InitialContent, SharedDocument};
use crate::error::ConnectError;
use crate::extract::ContentExtractor;
use crate::gateway::DocumentStore;
use crate::models::{DocumentId, EditorId};
use crate::origin::{OriginPolicy, RequestDecision};
use crate::registry::{SessionHandle, SessionRegistry};
use crate::scheduler::{DebounceScheduler, ScheduleOutcome};

/// Coordinates loading and flushing of live documents
pub struct PersistenceCoordinator<S> {
    inner: Arc<Inner<S>>,
}

struct Inner<S> {
    registry: Arc<SessionRegistry>,
    scheduler: DebounceScheduler,
    store: S,
    extractor: ContentExtractor,
    origins: OriginPolicy,
}

impl<S> Clone for PersistenceCoordinator<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: DocumentStore> PersistenceCoordinator<S> {
    pub fn new(
        registry: Arc<SessionRegistry>,
        store: S,
        origins: OriginPolicy,
        debounce_window: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry,
                scheduler: DebounceScheduler::new(debounce_window),
                store,
                extractor: ContentExtractor::new(),
                origins,
            }),
        }
    }

    /// Coordinator with a fresh registry, configured window and origins
    pub fn from_config(store: S, config: &Config) -> Self {
        Self::new(
            Arc::new(SessionRegistry::new()),
            store,
            OriginPolicy::from_config(config),
            config.debounce_window(),
        )
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.inner.registry
    }

    pub fn store(&self) -> &S {
        &self.inner.store
    }

    pub fn origins(&self) -> &OriginPolicy {
        &self.inner.origins
    }

    /// CORS decision for a plain HTTP request
    pub fn on_request(&self, origin: Option<&str>, method: &str) -> RequestDecision {
        let decision = self.inner.origins.on_request(origin, method);
        if !decision.allowed {
            warn!("Rejected {} request from origin {:?}", method, origin);
        }
        decision
    }

    /// Initial content for a document that is not yet in memory
    ///
    /// `None` means the host should start with an empty document: nothing is
    /// stored, the store is unreachable, or the stored text is blank or the
    /// placeholder an empty document was flushed as.
    pub async fn on_load(&self, document_id: &DocumentId) -> Option<InitialContent> {
        let content = self.inner.store.load(document_id).await?;
        if content.trim().is_empty() {
            debug!("Stored content for {} is blank, starting empty", document_id);
            return None;
        }
        if self.inner.extractor.is_placeholder(&content) {
            debug!("{} was saved empty, starting empty", document_id);
            return None;
        }

        match self.inner.extractor.deserialize(&content) {
            Ok(initial) => {
                info!("Loaded {} from store ({} bytes)", document_id, content.len());
                Some(initial)
            }
            Err(e) => {
                warn!("Failed to import stored content for {}: {}", document_id, e);
                None
            }
        }
    }

    /// Admit an editor
    ///
    /// A rejected origin creates no session.
    pub fn on_connect(
        &self,
        document_id: &DocumentId,
        editor_id: EditorId,
        origin: Option<&str>,
    ) -> Result<(), ConnectError> {
        if let Err(e) = self.inner.origins.check(origin) {
            warn!("Refused {} on {}: {}", editor_id, document_id, e);
            return Err(e);
        }

        let handle = self.inner.registry.get_or_create(document_id);
        let mut session = handle.lock();
        if !session.add_editor(editor_id.clone()) {
            debug!("{} was already connected to {}", editor_id, document_id);
        }
        info!(
            "{} connected to {} ({} editors)",
            editor_id,
            document_id,
            session.editor_count()
        );
        Ok(())
    }

    /// Record a content change and (re)arm the debounced flush
    pub fn on_change(&self, document_id: &DocumentId, document: SharedDocument) -> ScheduleOutcome {
        let handle = self.inner.registry.get_or_create(document_id);
        let mut session = handle.lock();
        session.touch();
        session.set_document(document);

        let inner = Arc::clone(&self.inner);
        let id = document_id.clone();
        self.inner
            .scheduler
            .schedule(&mut session, move |generation| {
                inner.fire_scheduled(id, generation)
            })
    }

    /// Drop an editor; the last one out triggers an immediate flush
    ///
    /// Returns once that flush has been attempted and the session removed.
    pub async fn on_disconnect(
        &self,
        document_id: &DocumentId,
        editor_id: &EditorId,
        document: SharedDocument,
    ) {
        let Some(handle) = self.inner.registry.get(document_id) else {
            warn!("{} left {}, which has no session", editor_id, document_id);
            return;
        };

        {
            let mut session = handle.lock();
            session.remove_editor(editor_id);
            if session.has_editors() {
                info!(
                    "{} left {} ({} editors remain)",
                    editor_id,
                    document_id,
                    session.editor_count()
                );
                return;
            }
            self.inner.scheduler.cancel(&mut session);
            session.set_document(Arc::clone(&document));
        }

        info!("Last editor left {}, flushing", document_id);
        self.inner.flush(document_id, &handle, &document).await;

        self.inner.registry.remove(document_id);
        debug!("Removed session for {}", document_id);
    }

    /// Flush every live document and clear the registry
    pub async fn shutdown(&self) {
        let mut pending = Vec::new();
        self.inner.registry.for_each_session(|session| {
            self.inner.scheduler.cancel(session);
            if let Some(document) = session.document() {
                pending.push((session.document_id().clone(), document));
            }
        });

        info!("Shutting down, flushing {} documents", pending.len());

        let mut flushes = JoinSet::new();
        for (document_id, document) in pending {
            let inner = Arc::clone(&self.inner);
            flushes.spawn(async move {
                match inner.registry.get(&document_id) {
                    Some(handle) => inner.flush(&document_id, &handle, &document).await,
                    None => true,
                }
            });
        }

        let mut failed = 0;
        while let Some(result) = flushes.join_next().await {
            match result {
                Ok(true) => {}
                Ok(false) => failed += 1,
                Err(e) => {
                    error!("Shutdown flush task failed: {}", e);
                    failed += 1;
                }
            }
        }

        for document_id in self.inner.registry.document_ids() {
            self.inner.registry.remove(&document_id);
        }

        if failed > 0 {
            warn!("{} documents could not be saved during shutdown", failed);
        }
    }
}

impl<S: DocumentStore> Inner<S> {
    /// Serialize the live document and write it to the store
    ///
    /// Flushes of one document never overlap; a second flush waits for the
    /// first to finish before taking its snapshot.
    async fn flush(
        &self,
        document_id: &DocumentId,
        session: &SessionHandle,
        document: &SharedDocument,
    ) -> bool {
        let gate = session.lock().flush_gate();
        let _flushing = gate.lock().await;
        session.lock().set_flush_in_flight(true);

        let content = {
            let document = document.lock().await;
            self.extractor.serialize(&*document)
        };
        let saved = self.store.save(document_id, &content).await;

        session.lock().set_flush_in_flight(false);
        if saved {
            debug!("Flushed {} ({} bytes)", document_id, content.len());
        } else {
            warn!(
                "Flush of {} failed, changes stay in memory until the next flush",
                document_id
            );
        }
        saved
    }

    /// Timer callback: flush if this timer is still the armed one
    async fn fire_scheduled(self: Arc<Self>, document_id: DocumentId, generation: u64) {
        let Some(handle) = self.registry.get(&document_id) else {
            debug!("Timer fired for {} after its session ended", document_id);
            return;
        };

        let document = {
            let mut session = handle.lock();
            if !session.claim_scheduled_flush(generation) {
                debug!("Stale timer for {} (generation {})", document_id, generation);
                return;
            }
            if session.is_flush_in_flight() {
                debug!("Flush already running for {}, timer defused", document_id);
                return;
            }
            session.document()
        };

        match document {
            Some(document) => {
                self.flush(&document_id, &handle, &document).await;
            }
            None => debug!("No live document recorded for {}", document_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{LiveDocument, ReplicatedDocument};
    use crate::extract::EMPTY_PLACEHOLDER;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Store fake that records every save
    #[derive(Default)]
    struct RecordingStore {
        documents: Mutex<HashMap<DocumentId, String>>,
        saves: Mutex<Vec<(DocumentId, String, Instant)>>,
        delay: Duration,
        failing: AtomicBool,
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    impl RecordingStore {
        fn with_delay(delay: Duration) -> Self {
            Self {
                delay,
                ..Self::default()
            }
        }

        fn seed(&self, document_id: &DocumentId, content: &str) {
            self.documents
                .lock()
                .unwrap()
                .insert(document_id.clone(), content.to_string());
        }

        fn saves(&self) -> Vec<(DocumentId, String, Instant)> {
            self.saves.lock().unwrap().clone()
        }

        fn saved_contents(&self) -> Vec<String> {
            self.saves().into_iter().map(|(_, content, _)| content).collect()
        }
    }

    impl DocumentStore for RecordingStore {
        async fn load(&self, document_id: &DocumentId) -> Option<String> {
            self.documents.lock().unwrap().get(document_id).cloned()
        }

        async fn save(&self, document_id: &DocumentId, content: &str) -> bool {
            let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(active, Ordering::SeqCst);
            self.saves
                .lock()
                .unwrap()
                .push((document_id.clone(), content.to_string(), Instant::now()));

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.active.fetch_sub(1, Ordering::SeqCst);

            if self.failing.load(Ordering::SeqCst) {
                return false;
            }
            self.seed(document_id, content);
            true
        }
    }

    fn id(s: &str) -> DocumentId {
        DocumentId::new(s).unwrap()
    }

    fn editor(s: &str) -> EditorId {
        EditorId::new(s)
    }

    fn coordinator(store: RecordingStore) -> PersistenceCoordinator<RecordingStore> {
        PersistenceCoordinator::new(
            Arc::new(SessionRegistry::new()),
            store,
            OriginPolicy::new(["*"]),
            Duration::from_secs(5),
        )
    }

    fn live(text: &str) -> SharedDocument {
        let initial = InitialContent::seed(text).unwrap();
        LiveDocument::from_initial(&initial).unwrap().into_shared()
    }

    async fn append(document: &SharedDocument, text: &str) {
        let mut document = document.lock().await;
        let len = document.export_text().unwrap().chars().count();
        document.splice_content(len, 0, text).unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_unknown_document_starts_empty() {
        let coordinator = coordinator(RecordingStore::default());
        let doc1 = id("doc1");

        assert!(coordinator.on_load(&doc1).await.is_none());
        coordinator.on_connect(&doc1, editor("a"), None).unwrap();
        assert!(coordinator.registry().contains(&doc1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_known_document() {
        let store = RecordingStore::default();
        store.seed(&id("known-id"), "<p>Saved</p>");
        let coordinator = coordinator(store);

        let initial = coordinator.on_load(&id("known-id")).await.unwrap();
        let document = LiveDocument::from_initial(&initial).unwrap();
        assert_eq!(document.export_text().unwrap(), "<p>Saved</p>");
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_blank_content_starts_empty() {
        let store = RecordingStore::default();
        store.seed(&id("doc1"), "   \n");
        let coordinator = coordinator(store);

        assert!(coordinator.on_load(&id("doc1")).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_disconnect_flushes_and_removes() {
        let coordinator = coordinator(RecordingStore::default());
        let doc1 = id("doc1");
        let document = live("");

        coordinator.on_connect(&doc1, editor("a"), None).unwrap();
        append(&document, "X").await;
        coordinator.on_change(&doc1, Arc::clone(&document));
        coordinator
            .on_disconnect(&doc1, &editor("a"), Arc::clone(&document))
            .await;

        assert_eq!(coordinator.store().saved_contents(), vec!["X".to_string()]);
        assert!(!coordinator.registry().contains(&doc1));

        // The pending timer was cancelled, not left to fire later
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(coordinator.store().saves().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_edits_in_one_window_coalesce() {
        let coordinator = coordinator(RecordingStore::default());
        let doc2 = id("doc2");
        let document = live("");
        let start = Instant::now();

        coordinator.on_connect(&doc2, editor("a"), None).unwrap();
        coordinator.on_connect(&doc2, editor("b"), None).unwrap();

        append(&document, "A").await;
        assert_eq!(
            coordinator.on_change(&doc2, Arc::clone(&document)),
            ScheduleOutcome::Armed
        );

        tokio::time::sleep(Duration::from_secs(3)).await;
        append(&document, "B").await;
        assert_eq!(
            coordinator.on_change(&doc2, Arc::clone(&document)),
            ScheduleOutcome::Rearmed
        );

        tokio::time::sleep(Duration::from_millis(4_500)).await;
        assert!(coordinator.store().saves().is_empty());

        tokio::time::sleep(Duration::from_secs(1)).await;
        let saves = coordinator.store().saves();
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0].1, "AB");
        let fired_after = saves[0].2 - start;
        assert!(fired_after >= Duration::from_secs(8));
        assert!(fired_after < Duration::from_millis(8_500));
        assert!(coordinator.registry().contains(&doc2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_uses_snapshot_at_fire_time() {
        let coordinator = coordinator(RecordingStore::default());
        let doc1 = id("doc1");
        let document = live("");

        coordinator.on_connect(&doc1, editor("a"), None).unwrap();
        append(&document, "one").await;
        coordinator.on_change(&doc1, Arc::clone(&document));

        // Applied to the live document without a change callback
        tokio::time::sleep(Duration::from_secs(2)).await;
        append(&document, " two").await;

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(
            coordinator.store().saved_contents(),
            vec!["one two".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_change_during_flush_arms_nothing() {
        let coordinator = coordinator(RecordingStore::with_delay(Duration::from_secs(2)));
        let doc3 = id("doc3");
        let document = live("");

        coordinator.on_connect(&doc3, editor("a"), None).unwrap();
        append(&document, "first").await;
        coordinator.on_change(&doc3, Arc::clone(&document));

        // Timer fires at 5s; the save runs until 7s
        tokio::time::sleep(Duration::from_millis(5_500)).await;
        {
            let handle = coordinator.registry().get(&doc3).unwrap();
            assert!(handle.lock().is_flush_in_flight());
        }

        append(&document, " second").await;
        assert_eq!(
            coordinator.on_change(&doc3, Arc::clone(&document)),
            ScheduleOutcome::SkippedInFlight
        );
        {
            let handle = coordinator.registry().get(&doc3).unwrap();
            assert!(!handle.lock().has_scheduled_flush());
        }

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(coordinator.store().saves().len(), 1);

        // Only a change after the flush completes schedules the next one
        append(&document, " third").await;
        assert_eq!(
            coordinator.on_change(&doc3, Arc::clone(&document)),
            ScheduleOutcome::Armed
        );
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(
            coordinator.store().saved_contents(),
            vec!["first".to_string(), "first second third".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_forced_flush_waits_for_scheduled_flush() {
        let coordinator = coordinator(RecordingStore::with_delay(Duration::from_secs(2)));
        let doc1 = id("doc1");
        let document = live("");

        coordinator.on_connect(&doc1, editor("a"), None).unwrap();
        append(&document, "draft").await;
        coordinator.on_change(&doc1, Arc::clone(&document));

        tokio::time::sleep(Duration::from_millis(5_500)).await;
        append(&document, " final").await;
        coordinator
            .on_disconnect(&doc1, &editor("a"), Arc::clone(&document))
            .await;

        let store = coordinator.store();
        assert_eq!(store.peak.load(Ordering::SeqCst), 1);
        assert_eq!(
            store.saved_contents(),
            vec!["draft".to_string(), "draft final".to_string()]
        );
        assert!(!coordinator.registry().contains(&doc1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_kept_while_disconnect_flush_runs() {
        let coordinator = coordinator(RecordingStore::with_delay(Duration::from_secs(2)));
        let doc1 = id("doc1");
        let document = live("");

        coordinator.on_connect(&doc1, editor("a"), None).unwrap();
        append(&document, "X").await;

        let task = {
            let coordinator = coordinator.clone();
            let document = Arc::clone(&document);
            let doc1 = doc1.clone();
            tokio::spawn(async move {
                coordinator
                    .on_disconnect(&doc1, &editor("a"), document)
                    .await
            })
        };

        tokio::time::sleep(Duration::from_secs(1)).await;
        {
            let handle = coordinator.registry().get(&doc1).unwrap();
            let session = handle.lock();
            assert!(!session.has_editors());
            assert!(session.is_flush_in_flight());
        }

        task.await.unwrap();
        assert!(!coordinator.registry().contains(&doc1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_flush_still_removes_session() {
        let store = RecordingStore::default();
        store.failing.store(true, Ordering::SeqCst);
        let coordinator = coordinator(store);
        let doc1 = id("doc1");
        let document = live("");

        coordinator.on_connect(&doc1, editor("a"), None).unwrap();
        append(&document, "X").await;
        coordinator.on_change(&doc1, Arc::clone(&document));
        coordinator
            .on_disconnect(&doc1, &editor("a"), Arc::clone(&document))
            .await;

        assert_eq!(coordinator.store().saves().len(), 1);
        assert!(!coordinator.registry().contains(&doc1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_with_editors_remaining() {
        let coordinator = coordinator(RecordingStore::default());
        let doc1 = id("doc1");
        let document = live("text");

        coordinator.on_connect(&doc1, editor("a"), None).unwrap();
        coordinator.on_connect(&doc1, editor("b"), None).unwrap();
        coordinator
            .on_disconnect(&doc1, &editor("a"), Arc::clone(&document))
            .await;

        assert!(coordinator.store().saves().is_empty());
        let handle = coordinator.registry().get(&doc1).unwrap();
        assert_eq!(handle.lock().editor_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_document_flushes_placeholder() {
        let coordinator = coordinator(RecordingStore::default());
        let doc1 = id("doc1");

        coordinator.on_connect(&doc1, editor("a"), None).unwrap();
        coordinator.on_disconnect(&doc1, &editor("a"), live("")).await;

        assert_eq!(
            coordinator.store().saved_contents(),
            vec![EMPTY_PLACEHOLDER.to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_document_reloads_empty() {
        let coordinator = coordinator(RecordingStore::default());
        let doc1 = id("doc1");

        coordinator.on_connect(&doc1, editor("a"), None).unwrap();
        coordinator.on_disconnect(&doc1, &editor("a"), live("")).await;
        assert_eq!(coordinator.store().saves().len(), 1);

        assert!(coordinator.on_load(&doc1).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_field_snapshot_reloads_as_fields() {
        let coordinator = coordinator(RecordingStore::default());
        let doc1 = id("doc1");
        let document = LiveDocument::new().into_shared();
        document.lock().await.put_field("title", "Plan").unwrap();

        coordinator.on_connect(&doc1, editor("a"), None).unwrap();
        coordinator
            .on_disconnect(&doc1, &editor("a"), Arc::clone(&document))
            .await;

        let initial = coordinator.on_load(&doc1).await.unwrap();
        let reloaded = LiveDocument::from_initial(&initial).unwrap();
        assert_eq!(reloaded.export_text().unwrap(), "");
        assert_eq!(reloaded.export_fields().unwrap()["title"], "Plan");
    }

    #[tokio::test(start_paused = true)]
    async fn test_change_without_connect_creates_session() {
        let coordinator = coordinator(RecordingStore::default());
        let doc1 = id("doc1");

        coordinator.on_change(&doc1, live("X"));
        assert!(coordinator.registry().contains(&doc1));

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(coordinator.store().saved_contents(), vec!["X".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_origin_creates_no_session() {
        let coordinator = PersistenceCoordinator::new(
            Arc::new(SessionRegistry::new()),
            RecordingStore::default(),
            OriginPolicy::new(["https://docs.example.com"]),
            Duration::from_secs(5),
        );
        let doc1 = id("doc1");

        let err = coordinator
            .on_connect(&doc1, editor("a"), Some("https://evil.example.com"))
            .unwrap_err();
        assert!(matches!(err, ConnectError::OriginRejected { .. }));
        assert!(!coordinator.registry().contains(&doc1));

        coordinator
            .on_connect(&doc1, editor("b"), Some("https://docs.example.com"))
            .unwrap();
        assert!(coordinator.registry().contains(&doc1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_flushes_live_documents() {
        let coordinator = coordinator(RecordingStore::default());
        let doc1 = id("doc1");
        let doc2 = id("doc2");
        let idle = id("idle");

        coordinator.on_connect(&doc1, editor("a"), None).unwrap();
        coordinator.on_connect(&doc2, editor("b"), None).unwrap();
        coordinator.on_connect(&idle, editor("c"), None).unwrap();
        coordinator.on_change(&doc1, live("one"));
        coordinator.on_change(&doc2, live("two"));

        coordinator.shutdown().await;

        let mut saved: Vec<_> = coordinator
            .store()
            .saves()
            .into_iter()
            .map(|(document_id, content, _)| (document_id.to_string(), content))
            .collect();
        saved.sort();
        assert_eq!(
            saved,
            vec![
                ("doc1".to_string(), "one".to_string()),
                ("doc2".to_string(), "two".to_string())
            ]
        );
        assert!(coordinator.registry().is_empty());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(coordinator.store().saves().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_documents_flush_independently() {
        let coordinator = coordinator(RecordingStore::with_delay(Duration::from_secs(1)));
        let doc1 = id("doc1");
        let doc2 = id("doc2");

        coordinator.on_change(&doc1, live("one"));
        tokio::time::sleep(Duration::from_millis(500)).await;
        coordinator.on_change(&doc2, live("two"));

        tokio::time::sleep(Duration::from_secs(10)).await;
        let mut contents = coordinator.store().saved_contents();
        contents.sort();
        assert_eq!(contents, vec!["one".to_string(), "two".to_string()]);
        assert_eq!(coordinator.store().peak.load(Ordering::SeqCst), 2);
    }
}
