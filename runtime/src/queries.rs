//! Read-only views over the ledger.
//!
//! Snapshot reads with whatever consistency the store provides by default.
//! Staleness here is cosmetic: no invariant depends on these results.

use rsvp_core::environment::Clock;
use rsvp_core::{
    ReservationError, ReservationReadModel, ResourceCatalog, ResourceDetail, ResourceId, ResourceSummary, Result,
    StoreHealth, UtilizationStats,
};
use std::sync::Arc;

/// Serves resource detail, upcoming listings and utilization statistics.
pub struct QueryService<S> {
    store: S,
    clock: Arc<dyn Clock>,
}

impl<S> QueryService<S>
where
    S: ResourceCatalog + ReservationReadModel + StoreHealth,
{
    /// Create a query service.
    #[must_use]
    pub fn new(store: S, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// A resource, its live count and the subjects holding reservations.
    ///
    /// # Errors
    ///
    /// - `ResourceNotFound` if the resource does not exist
    /// - `Unavailable` or `Storage` if the store fails
    pub async fn detail(&self, resource_id: ResourceId) -> Result<ResourceDetail> {
        self.store
            .resource_detail(resource_id)
            .await?
            .ok_or(ReservationError::ResourceNotFound(resource_id))
    }

    /// Resources dated in the future, soonest first, ties by location.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` or `Storage` if the store fails.
    pub async fn upcoming(&self) -> Result<Vec<ResourceSummary>> {
        self.store.upcoming_resources(self.clock.now()).await
    }

    /// Capacity usage of a resource.
    ///
    /// # Errors
    ///
    /// - `ResourceNotFound` if the resource does not exist
    /// - `Unavailable` or `Storage` if the store fails
    pub async fn utilization(&self, resource_id: ResourceId) -> Result<UtilizationStats> {
        let resource = self
            .store
            .get_resource(resource_id)
            .await?
            .ok_or(ReservationError::ResourceNotFound(resource_id))?;

        let live = self.store.count_live_reservations(resource_id).await?;

        Ok(UtilizationStats::compute(resource.capacity, live))
    }

    /// Check that the backing store answers.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if the store cannot be reached.
    pub async fn ping(&self) -> Result<()> {
        self.store.ping().await
    }
}
