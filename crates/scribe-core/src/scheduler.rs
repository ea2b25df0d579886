//! Debounce scheduler
//!
//! Each document has at most one pending flush. Scheduling again before it
//! fires replaces it, so a burst of edits collapses into one write issued one
//! window after the last edit.
//!
//! Timers are plain tokio tasks sleeping until a monotonic deadline. A timer
//! carries only a generation number; the fire callback resolves everything
//! else from the registry when it wakes and gives up if its generation is no
//! longer the armed one.
//!
//! While a flush is in flight, scheduling is refused outright. Edits made
//! during that flush get persisted only if another change arrives after it
//! completes, or when the last editor leaves.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::registry::{DocumentSession, ScheduledFlush};

/// Result of a `schedule` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// No timer was pending; one is now armed
    Armed,
    /// A pending timer was replaced with a later one
    Rearmed,
    /// A flush is running, nothing was armed
    SkippedInFlight,
}

/// Arms and cancels per-document flush timers
#[derive(Debug, Clone)]
pub struct DebounceScheduler {
    window: Duration,
}

impl DebounceScheduler {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Arm a flush `window` from now, replacing any pending one
    ///
    /// `fire` receives the generation of the new timer and builds the future
    /// that runs at the deadline. Must be called from within a tokio runtime.
    pub fn schedule<F, Fut>(&self, session: &mut DocumentSession, fire: F) -> ScheduleOutcome
    where
        F: FnOnce(u64) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if session.is_flush_in_flight() {
            debug!(
                "Flush in flight for {}, change not scheduled",
                session.document_id()
            );
            return ScheduleOutcome::SkippedInFlight;
        }

        let generation = session.next_generation();
        let deadline = Instant::now() + self.window;
        let on_fire = fire(generation);
        let task = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            on_fire.await;
        });

        let flush = ScheduledFlush::new(deadline, generation, task.abort_handle());
        match session.replace_scheduled_flush(flush) {
            Some(previous) => {
                previous.abort();
                debug!(
                    "Re-armed flush for {} (generation {})",
                    session.document_id(),
                    generation
                );
                ScheduleOutcome::Rearmed
            }
            None => {
                debug!(
                    "Armed flush for {} in {:?} (generation {})",
                    session.document_id(),
                    self.window,
                    generation
                );
                ScheduleOutcome::Armed
            }
        }
    }

    /// Defuse the pending flush, if any, without running it
    pub fn cancel(&self, session: &mut DocumentSession) -> bool {
        match session.take_scheduled_flush() {
            Some(flush) => {
                flush.abort();
                debug!("Cancelled pending flush for {}", session.document_id());
                true
            }
            None => false,
        }
    }
}

impl Default for DebounceScheduler {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocumentId;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn session() -> DocumentSession {
        DocumentSession::new(DocumentId::new("doc1").unwrap())
    }

    type FireFuture = std::pin::Pin<Box<dyn Future<Output = ()> + Send>>;

    fn counter_fire(count: &Arc<AtomicUsize>) -> impl FnOnce(u64) -> FireFuture {
        let count = Arc::clone(count);
        move |_| {
            Box::pin(async move {
                count.fetch_add(1, Ordering::SeqCst);
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_fires_after_window() {
        let scheduler = DebounceScheduler::new(Duration::from_secs(5));
        let mut session = session();
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_in_task = Arc::clone(&fired);

        let outcome = scheduler.schedule(&mut session, move |_| async move {
            fired_in_task.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(outcome, ScheduleOutcome::Armed);

        tokio::time::sleep(Duration::from_millis(4_900)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reschedule_replaces_pending_timer() {
        let scheduler = DebounceScheduler::new(Duration::from_secs(5));
        let mut session = session();
        let fired = Arc::new(AtomicUsize::new(0));
        let generations = Arc::new(std::sync::Mutex::new(Vec::new()));

        for _ in 0..3 {
            let fired = Arc::clone(&fired);
            let generations = Arc::clone(&generations);
            scheduler.schedule(&mut session, move |generation| async move {
                fired.fetch_add(1, Ordering::SeqCst);
                generations.lock().unwrap().push(generation);
            });
            tokio::time::sleep(Duration::from_secs(1)).await;
        }

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(*generations.lock().unwrap(), vec![3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_reports_outcome_and_deadline() {
        let scheduler = DebounceScheduler::new(Duration::from_secs(5));
        let mut session = session();
        let fired = Arc::new(AtomicUsize::new(0));
        let start = Instant::now();

        scheduler.schedule(&mut session, counter_fire(&fired));
        tokio::time::sleep(Duration::from_secs(3)).await;
        let outcome = scheduler.schedule(&mut session, counter_fire(&fired));

        assert_eq!(outcome, ScheduleOutcome::Rearmed);
        let deadline = session.scheduled_flush().unwrap().deadline();
        assert!(deadline - start >= Duration::from_secs(8));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_defuses_timer() {
        let scheduler = DebounceScheduler::new(Duration::from_secs(5));
        let mut session = session();
        let fired = Arc::new(AtomicUsize::new(0));

        scheduler.schedule(&mut session, counter_fire(&fired));
        assert!(scheduler.cancel(&mut session));
        assert!(!scheduler.cancel(&mut session));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(!session.has_scheduled_flush());
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_skipped_while_in_flight() {
        let scheduler = DebounceScheduler::new(Duration::from_secs(5));
        let mut session = session();
        let fired = Arc::new(AtomicUsize::new(0));
        session.set_flush_in_flight(true);

        let outcome = scheduler.schedule(&mut session, counter_fire(&fired));
        assert_eq!(outcome, ScheduleOutcome::SkippedInFlight);
        assert!(!session.has_scheduled_flush());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
