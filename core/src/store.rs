//! Store traits implemented by the backing stores.
//!
//! The ledger and query services are generic over these traits so the same
//! logic runs against `PostgresStore` in production and `InMemoryStore` in
//! tests.
//!
//! # Implementations
//!
//! - `PostgresStore` (in `rsvp-postgres`): production implementation
//! - `InMemoryStore` (in `rsvp-testing`): fast, deterministic testing
//!
//! All methods return `Send` futures so services can be driven from
//! `tokio::spawn` and axum handlers.

use crate::error::Result;
use crate::types::{
    NewResource, NewSubject, Reservation, Resource, ResourceDetail, ResourceId, ResourceSummary,
    Subject, SubjectId,
};
use chrono::{DateTime, Utc};
use std::future::Future;

/// Read access to resources, plus resource creation.
pub trait ResourceCatalog: Send + Sync {
    /// Look up a resource by identifier.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` or `Storage` if the store fails. A missing
    /// resource is `Ok(None)`, not an error.
    fn get_resource(&self, id: ResourceId) -> impl Future<Output = Result<Option<Resource>>> + Send;

    /// Count the live reservations held on a resource.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` or `Storage` if the store fails.
    fn count_live_reservations(&self, id: ResourceId) -> impl Future<Output = Result<u32>> + Send;

    /// Persist a new resource. Input is assumed validated.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` or `Storage` if the store fails.
    fn create_resource(
        &self,
        resource: NewResource,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Resource>> + Send;
}

/// Read access to subjects, plus subject creation.
pub trait SubjectDirectory: Send + Sync {
    /// Look up a subject by identifier.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` or `Storage` if the store fails.
    fn get_subject(&self, id: SubjectId) -> impl Future<Output = Result<Option<Subject>>> + Send;

    /// Persist a new subject. Input is assumed validated.
    ///
    /// # Errors
    ///
    /// - `DuplicateSubject` if the email is already registered
    /// - `Unavailable` or `Storage` if the store fails
    fn create_subject(
        &self,
        subject: NewSubject,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Subject>> + Send;

    /// All subjects, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` or `Storage` if the store fails.
    fn list_subjects(&self) -> impl Future<Output = Result<Vec<Subject>>> + Send;
}

/// The mutable half of the ledger: atomic create and cancel.
pub trait ReservationStore: Send + Sync {
    /// Attempt to create a reservation in one atomic unit.
    ///
    /// Implementations check, in order and serialized against every other
    /// create or cancel on the same resource:
    ///
    /// 1. the resource exists (`ResourceNotFound`)
    /// 2. its availability instant is strictly after `now` (`ResourceExpired`)
    /// 3. the subject exists (`SubjectNotFound`)
    /// 4. the pair holds no live reservation (`DuplicateReservation`)
    /// 5. the live count is below capacity (`CapacityExceeded`)
    ///
    /// and only then insert a reservation stamped with `now`. This is a
    /// single attempt: transient contention is reported as
    /// `ConcurrencyConflict` and retrying is the caller's job.
    ///
    /// # Errors
    ///
    /// Any of the variants above, or `Unavailable`/`Storage`.
    fn try_create_reservation(
        &self,
        subject_id: SubjectId,
        resource_id: ResourceId,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Reservation>> + Send;

    /// Delete the live reservation for the pair and return it.
    ///
    /// The delete and the returned record come from one atomic statement.
    ///
    /// # Errors
    ///
    /// - `ReservationNotFound` if the pair holds no live reservation
    /// - `Unavailable` or `Storage` if the store fails
    fn cancel_reservation(
        &self,
        subject_id: SubjectId,
        resource_id: ResourceId,
    ) -> impl Future<Output = Result<Reservation>> + Send;
}

/// Read-only projections joining reservations with resources and subjects.
pub trait ReservationReadModel: Send + Sync {
    /// A resource with its reserved subjects, oldest reservation first.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` or `Storage` if the store fails.
    fn resource_detail(&self, id: ResourceId) -> impl Future<Output = Result<Option<ResourceDetail>>> + Send;

    /// Resources dated strictly after `now`, ordered by date then location.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` or `Storage` if the store fails.
    fn upcoming_resources(&self, now: DateTime<Utc>) -> impl Future<Output = Result<Vec<ResourceSummary>>> + Send;
}

/// Connectivity check used by readiness.
pub trait StoreHealth: Send + Sync {
    /// Round-trip to the store.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if the store cannot be reached.
    fn ping(&self) -> impl Future<Output = Result<()>> + Send;
}

/// Everything a complete backing store provides.
///
/// Blanket-implemented for any cloneable type implementing all store traits.
pub trait Backend:
    ResourceCatalog + SubjectDirectory + ReservationStore + ReservationReadModel + StoreHealth + Clone + 'static
{
}

impl<T> Backend for T where
    T: ResourceCatalog + SubjectDirectory + ReservationStore + ReservationReadModel + StoreHealth + Clone + 'static
{
}
