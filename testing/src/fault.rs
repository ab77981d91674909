//! Fault injection for exercising the ledger's retry path.

use chrono::{DateTime, Utc};
use rsvp_core::{Reservation, ReservationError, ReservationStore, ResourceId, Result, SubjectId};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Wraps a [`ReservationStore`] and fails the first `n` create attempts with
/// `ConcurrencyConflict`, as a contended database would.
///
/// Clones share the counters.
#[derive(Debug, Clone)]
pub struct ConflictInjector<S> {
    inner: S,
    remaining: Arc<AtomicUsize>,
    attempts: Arc<AtomicUsize>,
}

impl<S> ConflictInjector<S> {
    /// Inject `conflicts` conflicts before delegating to `inner`.
    #[must_use]
    pub fn new(inner: S, conflicts: usize) -> Self {
        Self {
            inner,
            remaining: Arc::new(AtomicUsize::new(conflicts)),
            attempts: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Create attempts seen so far, injected failures included.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl<S: ReservationStore> ReservationStore for ConflictInjector<S> {
    fn try_create_reservation(
        &self,
        subject_id: SubjectId,
        resource_id: ResourceId,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Reservation>> + Send {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let inject = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        let attempt = self.inner.try_create_reservation(subject_id, resource_id, now);

        async move {
            if inject {
                return Err(ReservationError::ConcurrencyConflict { resource_id });
            }
            attempt.await
        }
    }

    fn cancel_reservation(
        &self,
        subject_id: SubjectId,
        resource_id: ResourceId,
    ) -> impl Future<Output = Result<Reservation>> + Send {
        self.inner.cancel_reservation(subject_id, resource_id)
    }
}
