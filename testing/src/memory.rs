//! In-memory implementation of every store trait.
//!
//! Each resource gets its own reservation slot behind a mutex. A create or
//! cancel holds that slot's lock for its whole check-and-write, so operations
//! on one resource are serialized while different resources never contend.

use chrono::{DateTime, Utc};
use rsvp_core::{
    NewResource, NewSubject, Reservation, ReservationError, ReservationId, ReservationReadModel,
    ReservationStore, ReservedSubject, Resource, ResourceCatalog, ResourceDetail, ResourceId, ResourceSummary,
    Result, StoreHealth, Subject, SubjectDirectory, SubjectId,
};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

type Slot = Arc<Mutex<Vec<Reservation>>>;

#[derive(Debug, Default)]
struct Inner {
    resources: RwLock<HashMap<ResourceId, Resource>>,
    subjects: RwLock<HashMap<SubjectId, Subject>>,
    slots: RwLock<HashMap<ResourceId, Slot>>,
    unavailable: AtomicBool,
}

fn poisoned<T>(_: PoisonError<T>) -> ReservationError {
    ReservationError::Storage("in-memory store lock poisoned".to_string())
}

fn count(reservations: &[Reservation]) -> u32 {
    u32::try_from(reservations.len()).unwrap_or(u32::MAX)
}

impl Inner {
    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(ReservationError::Unavailable("in-memory store marked unavailable".to_string()))
        } else {
            Ok(())
        }
    }

    fn existing_slot(&self, resource_id: ResourceId) -> Result<Option<Slot>> {
        Ok(self.slots.read().map_err(poisoned)?.get(&resource_id).map(Arc::clone))
    }

    /// Only creates allocate a slot.
    fn slot_for_create(&self, resource_id: ResourceId) -> Result<Slot> {
        if let Some(slot) = self.existing_slot(resource_id)? {
            return Ok(slot);
        }
        let mut slots = self.slots.write().map_err(poisoned)?;
        Ok(Arc::clone(slots.entry(resource_id).or_default()))
    }

    fn resource(&self, id: ResourceId) -> Result<Option<Resource>> {
        Ok(self.resources.read().map_err(poisoned)?.get(&id).cloned())
    }

    fn live(&self, id: ResourceId) -> Result<Vec<Reservation>> {
        let Some(slot) = self.existing_slot(id)? else {
            return Ok(Vec::new());
        };
        let reservations = slot.lock().map_err(poisoned)?;
        Ok(reservations.clone())
    }

    fn try_create(&self, subject_id: SubjectId, resource_id: ResourceId, now: DateTime<Utc>) -> Result<Reservation> {
        self.check_available()?;

        let resource = self
            .resource(resource_id)?
            .ok_or(ReservationError::ResourceNotFound(resource_id))?;

        let slot = self.slot_for_create(resource_id)?;
        let mut reservations = slot.lock().map_err(poisoned)?;

        if !resource.is_open_at(now) {
            return Err(ReservationError::ResourceExpired {
                resource_id,
                available_at: resource.available_at,
            });
        }

        if !self.subjects.read().map_err(poisoned)?.contains_key(&subject_id) {
            return Err(ReservationError::SubjectNotFound(subject_id));
        }

        if reservations.iter().any(|r| r.subject_id == subject_id) {
            return Err(ReservationError::DuplicateReservation {
                subject_id,
                resource_id,
            });
        }

        if count(&reservations) >= resource.capacity {
            return Err(ReservationError::CapacityExceeded {
                resource_id,
                capacity: resource.capacity,
            });
        }

        let reservation = Reservation {
            id: ReservationId::new(),
            subject_id,
            resource_id,
            created_at: now,
        };
        reservations.push(reservation.clone());
        Ok(reservation)
    }

    fn cancel(&self, subject_id: SubjectId, resource_id: ResourceId) -> Result<Reservation> {
        self.check_available()?;

        let not_found = ReservationError::ReservationNotFound {
            subject_id,
            resource_id,
        };
        let slot = self.existing_slot(resource_id)?.ok_or_else(|| not_found.clone())?;
        let mut reservations = slot.lock().map_err(poisoned)?;

        let position = reservations
            .iter()
            .position(|r| r.subject_id == subject_id)
            .ok_or(not_found)?;

        Ok(reservations.remove(position))
    }

    fn detail(&self, id: ResourceId) -> Result<Option<ResourceDetail>> {
        let Some(resource) = self.resource(id)? else {
            return Ok(None);
        };

        let mut live = self.live(id)?;
        live.sort_by_key(|r| r.created_at);

        let subjects = self.subjects.read().map_err(poisoned)?;
        let reserved_subjects = live
            .iter()
            .filter_map(|r| {
                subjects.get(&r.subject_id).map(|s| ReservedSubject {
                    subject_id: s.id,
                    name: s.name.clone(),
                    email: s.email.clone(),
                    reserved_at: r.created_at,
                })
            })
            .collect();

        Ok(Some(ResourceDetail {
            resource,
            reservation_count: count(&live),
            reserved_subjects,
        }))
    }

    fn upcoming(&self, now: DateTime<Utc>) -> Result<Vec<ResourceSummary>> {
        let mut open: Vec<Resource> = self
            .resources
            .read()
            .map_err(poisoned)?
            .values()
            .filter(|r| r.is_open_at(now))
            .cloned()
            .collect();
        open.sort_by(|a, b| {
            a.available_at
                .cmp(&b.available_at)
                .then_with(|| a.location.cmp(&b.location))
        });

        open.into_iter()
            .map(|resource| {
                let live = count(&self.live(resource.id)?);
                Ok(ResourceSummary::new(resource, live))
            })
            .collect()
    }
}

/// In-memory store for tests and local development.
///
/// Cloning shares the underlying state.
///
/// # Example
///
/// ```
/// use rsvp_testing::{InMemoryStore, fixtures, test_clock};
/// use rsvp_core::environment::Clock;
///
/// let store = InMemoryStore::new();
/// let resource = store.insert_resource(fixtures::resource(test_clock().now(), 10));
/// assert_eq!(store.live_count(resource.id), 0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<Inner>,
}

impl InMemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a resource as-is, bypassing validation.
    pub fn insert_resource(&self, resource: Resource) -> Resource {
        self.inner
            .resources
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(resource.id, resource.clone());
        resource
    }

    /// Insert a subject as-is, bypassing validation and email uniqueness.
    pub fn insert_subject(&self, subject: Subject) -> Subject {
        self.inner
            .subjects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(subject.id, subject.clone());
        subject
    }

    /// Number of live reservations on a resource.
    #[must_use]
    pub fn live_count(&self, resource_id: ResourceId) -> u32 {
        self.inner.live(resource_id).map_or(0, |live| count(&live))
    }

    /// Make every subsequent operation fail with `Unavailable`, or recover.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

impl ResourceCatalog for InMemoryStore {
    fn get_resource(&self, id: ResourceId) -> impl Future<Output = Result<Option<Resource>>> + Send {
        let inner = Arc::clone(&self.inner);
        async move {
            inner.check_available()?;
            inner.resource(id)
        }
    }

    fn count_live_reservations(&self, id: ResourceId) -> impl Future<Output = Result<u32>> + Send {
        let inner = Arc::clone(&self.inner);
        async move {
            inner.check_available()?;
            Ok(count(&inner.live(id)?))
        }
    }

    fn create_resource(
        &self,
        resource: NewResource,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Resource>> + Send {
        let inner = Arc::clone(&self.inner);
        async move {
            inner.check_available()?;
            let resource = Resource {
                id: ResourceId::new(),
                title: resource.title,
                location: resource.location,
                available_at: resource.available_at,
                capacity: resource.capacity,
                created_at: now,
            };
            inner
                .resources
                .write()
                .map_err(poisoned)?
                .insert(resource.id, resource.clone());
            Ok(resource)
        }
    }
}

impl SubjectDirectory for InMemoryStore {
    fn get_subject(&self, id: SubjectId) -> impl Future<Output = Result<Option<Subject>>> + Send {
        let inner = Arc::clone(&self.inner);
        async move {
            inner.check_available()?;
            Ok(inner.subjects.read().map_err(poisoned)?.get(&id).cloned())
        }
    }

    fn create_subject(&self, subject: NewSubject, now: DateTime<Utc>) -> impl Future<Output = Result<Subject>> + Send {
        let inner = Arc::clone(&self.inner);
        async move {
            inner.check_available()?;
            let mut subjects = inner.subjects.write().map_err(poisoned)?;

            if subjects.values().any(|s| s.email == subject.email) {
                return Err(ReservationError::DuplicateSubject { email: subject.email });
            }

            let subject = Subject {
                id: SubjectId::new(),
                name: subject.name,
                email: subject.email,
                created_at: now,
            };
            subjects.insert(subject.id, subject.clone());
            Ok(subject)
        }
    }

    fn list_subjects(&self) -> impl Future<Output = Result<Vec<Subject>>> + Send {
        let inner = Arc::clone(&self.inner);
        async move {
            inner.check_available()?;
            let mut subjects: Vec<Subject> = inner.subjects.read().map_err(poisoned)?.values().cloned().collect();
            subjects.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(subjects)
        }
    }
}

impl ReservationStore for InMemoryStore {
    fn try_create_reservation(
        &self,
        subject_id: SubjectId,
        resource_id: ResourceId,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Reservation>> + Send {
        let inner = Arc::clone(&self.inner);
        async move { inner.try_create(subject_id, resource_id, now) }
    }

    fn cancel_reservation(
        &self,
        subject_id: SubjectId,
        resource_id: ResourceId,
    ) -> impl Future<Output = Result<Reservation>> + Send {
        let inner = Arc::clone(&self.inner);
        async move { inner.cancel(subject_id, resource_id) }
    }
}

impl ReservationReadModel for InMemoryStore {
    fn resource_detail(&self, id: ResourceId) -> impl Future<Output = Result<Option<ResourceDetail>>> + Send {
        let inner = Arc::clone(&self.inner);
        async move {
            inner.check_available()?;
            inner.detail(id)
        }
    }

    fn upcoming_resources(&self, now: DateTime<Utc>) -> impl Future<Output = Result<Vec<ResourceSummary>>> + Send {
        let inner = Arc::clone(&self.inner);
        async move {
            inner.check_available()?;
            inner.upcoming(now)
        }
    }
}

impl StoreHealth for InMemoryStore {
    fn ping(&self) -> impl Future<Output = Result<()>> + Send {
        let inner = Arc::clone(&self.inner);
        async move { inner.check_available() }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::{fixtures, test_clock};
    use chrono::Duration;
    use rsvp_core::environment::Clock;

    #[tokio::test]
    async fn test_checks_run_in_order() {
        let now = test_clock().now();
        let store = InMemoryStore::new();
        let expired = store.insert_resource(fixtures::resource(now - Duration::hours(1), 1));
        let missing_subject = SubjectId::new();

        // Expiry is reported before the unknown subject.
        let err = store
            .try_create_reservation(missing_subject, expired.id, now)
            .await
            .unwrap_err();
        assert!(matches!(err, ReservationError::ResourceExpired { .. }));

        let open = store.insert_resource(fixtures::resource(now + Duration::hours(1), 1));
        let err = store
            .try_create_reservation(missing_subject, open.id, now)
            .await
            .unwrap_err();
        assert_eq!(err, ReservationError::SubjectNotFound(missing_subject));
    }

    #[tokio::test]
    async fn test_duplicate_reported_before_capacity() {
        let now = test_clock().now();
        let store = InMemoryStore::new();
        let resource = store.insert_resource(fixtures::resource(now + Duration::hours(1), 1));
        let subject = store.insert_subject(fixtures::subject("Ada"));

        store.try_create_reservation(subject.id, resource.id, now).await.unwrap();
        let err = store
            .try_create_reservation(subject.id, resource.id, now)
            .await
            .unwrap_err();
        assert!(matches!(err, ReservationError::DuplicateReservation { .. }));
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let store = InMemoryStore::new();
        let input = NewSubject {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
        };

        store.create_subject(input.clone(), test_clock().now()).await.unwrap();
        let err = store.create_subject(input, test_clock().now()).await.unwrap_err();
        assert_eq!(
            err,
            ReservationError::DuplicateSubject {
                email: "ada@example.com".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_unavailable_toggle() {
        let store = InMemoryStore::new();
        store.set_unavailable(true);
        assert!(matches!(store.ping().await, Err(ReservationError::Unavailable(_))));
        assert!(matches!(
            store.list_subjects().await,
            Err(ReservationError::Unavailable(_))
        ));

        store.set_unavailable(false);
        assert!(store.ping().await.is_ok());
    }

    #[tokio::test]
    async fn test_detail_lists_oldest_reservation_first() {
        let now = test_clock().now();
        let store = InMemoryStore::new();
        let resource = store.insert_resource(fixtures::resource(now + Duration::days(1), 5));
        let early = store.insert_subject(fixtures::subject("Early"));
        let late = store.insert_subject(fixtures::subject("Late"));

        store
            .try_create_reservation(late.id, resource.id, now + Duration::minutes(5))
            .await
            .unwrap();
        store.try_create_reservation(early.id, resource.id, now).await.unwrap();

        let detail = store.resource_detail(resource.id).await.unwrap().unwrap();
        assert_eq!(detail.reservation_count, 2);
        let order: Vec<_> = detail.reserved_subjects.iter().map(|s| s.subject_id).collect();
        assert_eq!(order, vec![early.id, late.id]);
    }

    #[tokio::test]
    async fn test_reads_and_cancels_do_not_allocate_slots() {
        let now = test_clock().now();
        let store = InMemoryStore::new();
        let resource = store.insert_resource(fixtures::resource(now + Duration::days(1), 5));
        let subject = store.insert_subject(fixtures::subject("Ada"));
        let unknown = ResourceId::new();

        let err = store.cancel_reservation(subject.id, unknown).await.unwrap_err();
        assert_eq!(
            err,
            ReservationError::ReservationNotFound {
                subject_id: subject.id,
                resource_id: unknown,
            }
        );
        assert_eq!(store.count_live_reservations(unknown).await.unwrap(), 0);
        assert_eq!(store.count_live_reservations(resource.id).await.unwrap(), 0);
        assert!(store.resource_detail(resource.id).await.unwrap().is_some());
        assert_eq!(store.upcoming_resources(now).await.unwrap().len(), 1);
        assert!(store.inner.slots.read().unwrap().is_empty());

        store.try_create_reservation(subject.id, resource.id, now).await.unwrap();
        assert_eq!(store.inner.slots.read().unwrap().len(), 1);
        assert!(store.inner.slots.read().unwrap().contains_key(&resource.id));
    }
}
