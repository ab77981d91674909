//! Application state for Axum handlers.

use rsvp_core::Backend;
use rsvp_core::environment::Clock;
use rsvp_runtime::{CatalogService, QueryService, ReservationLedger, RetryPolicy};
use std::sync::Arc;

/// Application state shared across all HTTP handlers.
///
/// Holds one instance of each service, all built over the same store. Cloned
/// (cheaply via `Arc`) for each request.
pub struct AppState<S> {
    /// Reservation create and cancel
    pub ledger: Arc<ReservationLedger<S>>,
    /// Read-side queries and readiness
    pub queries: Arc<QueryService<S>>,
    /// Event and user management
    pub catalog: Arc<CatalogService<S>>,
}

// Manual impl: `S` itself need not be `Clone` for the state to be.
impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            ledger: Arc::clone(&self.ledger),
            queries: Arc::clone(&self.queries),
            catalog: Arc::clone(&self.catalog),
        }
    }
}

impl<S: Backend> AppState<S> {
    /// Build every service over `store`.
    #[must_use]
    pub fn new(store: S, clock: Arc<dyn Clock>, retry_policy: RetryPolicy) -> Self {
        Self {
            ledger: Arc::new(
                ReservationLedger::new(store.clone(), Arc::clone(&clock)).with_retry_policy(retry_policy),
            ),
            queries: Arc::new(QueryService::new(store.clone(), Arc::clone(&clock))),
            catalog: Arc::new(CatalogService::new(store, clock)),
        }
    }
}
