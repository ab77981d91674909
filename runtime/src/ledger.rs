//! The reservation ledger: atomic create and cancel.
//!
//! The ledger owns no state. Each call borrows the store for the duration of
//! one atomic unit; the store enforces the uniqueness, capacity and temporal
//! invariants inside that unit. The ledger adds what sits around it: the
//! clock reading, bounded retries on contention, tracing and metrics.
//!
//! # State machine
//!
//! Per (subject, resource) pair:
//!
//! ```text
//!          create              cancel
//! Absent ─────────▶ Reserved ─────────▶ Absent
//!   │                  │
//!   │ cancel           │ create
//!   ▼                  ▼
//! ReservationNotFound  DuplicateReservation
//! ```

use crate::metrics::LedgerMetrics;
use crate::retry::{RetryPolicy, retry_if};
use rsvp_core::environment::Clock;
use rsvp_core::{Reservation, ReservationError, ReservationStore, ResourceId, Result, SubjectId};
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

/// Creates and cancels reservations against a [`ReservationStore`].
pub struct ReservationLedger<S> {
    store: S,
    clock: Arc<dyn Clock>,
    retry_policy: RetryPolicy,
}

impl<S: ReservationStore> ReservationLedger<S> {
    /// Create a ledger with the default retry policy.
    #[must_use]
    pub fn new(store: S, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Replace the retry policy used for contended creates.
    #[must_use]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// The retry policy in effect.
    #[must_use]
    pub const fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Reserve one unit of `resource_id`'s capacity for `subject_id`.
    ///
    /// Each attempt reads the clock afresh, so a resource whose date passes
    /// between retries is reported as expired.
    ///
    /// # Errors
    ///
    /// - `ResourceNotFound`, `ResourceExpired`, `SubjectNotFound`,
    ///   `DuplicateReservation`, `CapacityExceeded` as checked by the store
    /// - `ConcurrencyConflict` once the retry budget is spent
    /// - `Unavailable` or `Storage` if the store fails
    pub async fn create(&self, subject_id: SubjectId, resource_id: ResourceId) -> Result<Reservation> {
        let span = tracing::info_span!(
            "reservation.create",
            subject_id = %subject_id,
            resource_id = %resource_id,
        );

        async {
            let started = Instant::now();
            let mut attempts = 0u64;

            let result = retry_if(
                &self.retry_policy,
                || {
                    attempts += 1;
                    self.store
                        .try_create_reservation(subject_id, resource_id, self.clock.now())
                },
                ReservationError::is_retryable,
            )
            .await;

            let retries = attempts.saturating_sub(1);
            LedgerMetrics::record_retries(retries);

            match &result {
                Ok(reservation) => {
                    LedgerMetrics::record_created(started.elapsed());
                    tracing::info!(
                        reservation_id = %reservation.id,
                        retries,
                        "Reservation created"
                    );
                }
                Err(err) => {
                    LedgerMetrics::record_rejected(err);
                    log_rejection(err, retries);
                }
            }

            result
        }
        .instrument(span)
        .await
    }

    /// Cancel `subject_id`'s reservation on `resource_id` and return it.
    ///
    /// Cancellation is not time-gated and is never retried: a delete can only
    /// relax capacity pressure.
    ///
    /// # Errors
    ///
    /// - `ReservationNotFound` if the pair holds no live reservation
    /// - `Unavailable` or `Storage` if the store fails
    pub async fn cancel(&self, subject_id: SubjectId, resource_id: ResourceId) -> Result<Reservation> {
        let span = tracing::info_span!(
            "reservation.cancel",
            subject_id = %subject_id,
            resource_id = %resource_id,
        );

        async {
            let result = self.store.cancel_reservation(subject_id, resource_id).await;

            match &result {
                Ok(reservation) => {
                    LedgerMetrics::record_cancelled();
                    tracing::info!(reservation_id = %reservation.id, "Reservation cancelled");
                }
                Err(err) => {
                    LedgerMetrics::record_rejected(err);
                    log_rejection(err, 0);
                }
            }

            result
        }
        .instrument(span)
        .await
    }
}

fn log_rejection(err: &ReservationError, retries: u64) {
    match err.class() {
        rsvp_core::ErrorClass::Unavailable | rsvp_core::ErrorClass::Internal => {
            tracing::error!(error = %err, "Reservation store failure");
        }
        rsvp_core::ErrorClass::Conflict => {
            tracing::warn!(error = %err, retries, "Reservation contention unresolved");
        }
        rsvp_core::ErrorClass::NotFound | rsvp_core::ErrorClass::InvariantViolation => {
            tracing::debug!(reason = err.reason(), "Reservation rejected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rsvp_testing::{ConflictInjector, InMemoryStore, fixtures, test_clock};
    use std::time::Duration as StdDuration;

    fn fast_retry(max_retries: usize) -> RetryPolicy {
        RetryPolicy::builder()
            .max_retries(max_retries)
            .initial_delay(StdDuration::from_millis(1))
            .jitter(false)
            .build()
    }

    #[tokio::test]
    async fn test_create_then_duplicate_then_cancel() {
        let clock = test_clock();
        let store = InMemoryStore::new();
        let resource = store.insert_resource(fixtures::resource(clock.now() + Duration::days(1), 10));
        let subject = store.insert_subject(fixtures::subject("Jane Smith"));
        let ledger = ReservationLedger::new(store.clone(), Arc::new(clock));

        let created = ledger.create(subject.id, resource.id).await.unwrap();
        assert_eq!(created.created_at, test_clock().now());

        let duplicate = ledger.create(subject.id, resource.id).await.unwrap_err();
        assert_eq!(
            duplicate,
            ReservationError::DuplicateReservation {
                subject_id: subject.id,
                resource_id: resource.id
            }
        );

        let cancelled = ledger.cancel(subject.id, resource.id).await.unwrap();
        assert_eq!(cancelled, created);
        assert_eq!(store.live_count(resource.id), 0);
    }

    #[tokio::test]
    async fn test_conflicts_are_retried_within_budget() {
        let clock = test_clock();
        let store = InMemoryStore::new();
        let resource = store.insert_resource(fixtures::resource(clock.now() + Duration::days(1), 1));
        let subject = store.insert_subject(fixtures::subject("Bob Johnson"));

        let flaky = ConflictInjector::new(store.clone(), 2);
        let ledger = ReservationLedger::new(flaky.clone(), Arc::new(clock)).with_retry_policy(fast_retry(3));

        let created = ledger.create(subject.id, resource.id).await;
        assert!(created.is_ok());
        assert_eq!(flaky.attempts(), 3);
    }

    #[tokio::test]
    async fn test_conflicts_surface_after_budget() {
        let clock = test_clock();
        let store = InMemoryStore::new();
        let resource = store.insert_resource(fixtures::resource(clock.now() + Duration::days(1), 1));
        let subject = store.insert_subject(fixtures::subject("Bob Johnson"));

        let flaky = ConflictInjector::new(store.clone(), 10);
        let ledger = ReservationLedger::new(flaky.clone(), Arc::new(clock)).with_retry_policy(fast_retry(2));

        let err = ledger.create(subject.id, resource.id).await.unwrap_err();
        assert_eq!(err, ReservationError::ConcurrencyConflict { resource_id: resource.id });
        assert_eq!(flaky.attempts(), 3);
        assert_eq!(store.live_count(resource.id), 0);
    }

    #[tokio::test]
    async fn test_domain_failures_are_not_retried() {
        let clock = test_clock();
        let store = InMemoryStore::new();
        let resource = store.insert_resource(fixtures::resource(clock.now() - Duration::days(1), 5));
        let subject = store.insert_subject(fixtures::subject("Jane Smith"));

        let flaky = ConflictInjector::new(store, 0);
        let ledger = ReservationLedger::new(flaky.clone(), Arc::new(clock)).with_retry_policy(fast_retry(5));

        let err = ledger.create(subject.id, resource.id).await.unwrap_err();
        assert!(matches!(err, ReservationError::ResourceExpired { .. }));
        assert_eq!(flaky.attempts(), 1);
    }

    #[tokio::test]
    async fn test_create_future_is_send() {
        fn assert_send<T: Send>(value: T) -> T {
            value
        }

        let clock = test_clock();
        let store = InMemoryStore::new();
        let resource = store.insert_resource(fixtures::resource(clock.now() + Duration::days(1), 1));
        let subject = store.insert_subject(fixtures::subject("Jane Smith"));
        let ledger = ReservationLedger::new(store, Arc::new(clock));

        let created = assert_send(ledger.create(subject.id, resource.id)).await;
        assert!(created.is_ok());
    }
}
