//! Resource and subject management.
//!
//! Thin validation-then-persist operations. The ledger never calls these; it
//! only reads what they create.

use rsvp_core::environment::Clock;
use rsvp_core::{
    NewResource, NewSubject, ReservationError, Resource, ResourceCatalog, Result, Subject, SubjectDirectory,
    SubjectId, ValidationError,
};
use std::sync::Arc;
use thiserror::Error;

/// Failure of a catalog command: bad input or a store-side rejection.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// Input failed validation
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    /// The store rejected or failed the operation
    #[error(transparent)]
    Store(#[from] ReservationError),
}

/// Creates and lists resources and subjects.
pub struct CatalogService<S> {
    store: S,
    clock: Arc<dyn Clock>,
}

impl<S> CatalogService<S>
where
    S: ResourceCatalog + SubjectDirectory,
{
    /// Create a catalog service.
    #[must_use]
    pub fn new(store: S, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Validate and persist a resource.
    ///
    /// # Errors
    ///
    /// - `CatalogError::Invalid` if a field is malformed or the date is not in the future
    /// - `CatalogError::Store` if the store fails
    pub async fn create_resource(&self, input: NewResource) -> std::result::Result<Resource, CatalogError> {
        let now = self.clock.now();
        input.validate(now)?;

        let resource = self.store.create_resource(input, now).await?;
        tracing::info!(
            resource_id = %resource.id,
            capacity = resource.capacity,
            available_at = %resource.available_at,
            "Resource created"
        );
        Ok(resource)
    }

    /// Validate and persist a subject.
    ///
    /// # Errors
    ///
    /// - `CatalogError::Invalid` if the name or email is malformed
    /// - `CatalogError::Store` with `DuplicateSubject` if the email is taken
    pub async fn create_subject(&self, input: NewSubject) -> std::result::Result<Subject, CatalogError> {
        input.validate()?;

        let subject = self.store.create_subject(input, self.clock.now()).await?;
        tracing::info!(subject_id = %subject.id, "Subject created");
        Ok(subject)
    }

    /// Look up a subject.
    ///
    /// # Errors
    ///
    /// - `SubjectNotFound` if no subject has this identifier
    /// - `Unavailable` or `Storage` if the store fails
    pub async fn subject(&self, id: SubjectId) -> Result<Subject> {
        self.store
            .get_subject(id)
            .await?
            .ok_or(ReservationError::SubjectNotFound(id))
    }

    /// All subjects, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` or `Storage` if the store fails.
    pub async fn subjects(&self) -> Result<Vec<Subject>> {
        self.store.list_subjects().await
    }

    /// Insert subjects whose email is not yet registered; returns how many were added.
    ///
    /// # Errors
    ///
    /// Returns the first validation or store failure other than a duplicate email.
    pub async fn seed_subjects(&self, subjects: Vec<NewSubject>) -> std::result::Result<usize, CatalogError> {
        let mut added = 0;
        for subject in subjects {
            match self.create_subject(subject).await {
                Ok(_) => added += 1,
                Err(CatalogError::Store(ReservationError::DuplicateSubject { email })) => {
                    tracing::debug!(%email, "Sample subject already present");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(added)
    }
}

/// Subjects inserted by `SEED_SAMPLE_SUBJECTS`.
#[must_use]
pub fn sample_subjects() -> Vec<NewSubject> {
    [
        ("John Doe", "john@example.com"),
        ("Jane Smith", "jane@example.com"),
        ("Bob Johnson", "bob@example.com"),
    ]
    .into_iter()
    .map(|(name, email)| NewSubject {
        name: name.to_string(),
        email: email.to_string(),
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rsvp_testing::{InMemoryStore, test_clock};

    fn service(store: InMemoryStore) -> CatalogService<InMemoryStore> {
        CatalogService::new(store, Arc::new(test_clock()))
    }

    #[tokio::test]
    async fn test_create_resource_rejects_past_date() {
        let catalog = service(InMemoryStore::new());
        let input = NewResource {
            title: "Retro".to_string(),
            location: "Online".to_string(),
            available_at: test_clock().now() - Duration::minutes(1),
            capacity: 10,
        };

        let err = catalog.create_resource(input).await.unwrap_err();
        assert!(matches!(err, CatalogError::Invalid(_)));
    }

    #[tokio::test]
    async fn test_create_resource_persists() {
        let store = InMemoryStore::new();
        let catalog = service(store.clone());
        let input = NewResource {
            title: "Launch".to_string(),
            location: "Lisbon".to_string(),
            available_at: test_clock().now() + Duration::days(30),
            capacity: 100,
        };

        let resource = catalog.create_resource(input).await.unwrap();
        assert_eq!(resource.created_at, test_clock().now());
        assert_eq!(store.get_resource(resource.id).await.unwrap(), Some(resource));
    }

    #[tokio::test]
    async fn test_seeding_is_idempotent() {
        let store = InMemoryStore::new();
        let catalog = service(store);

        assert_eq!(catalog.seed_subjects(sample_subjects()).await.unwrap(), 3);
        assert_eq!(catalog.seed_subjects(sample_subjects()).await.unwrap(), 0);

        let names: Vec<_> = catalog
            .subjects()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["Bob Johnson", "Jane Smith", "John Doe"]);
    }

    #[tokio::test]
    async fn test_missing_subject() {
        let catalog = service(InMemoryStore::new());
        let id = SubjectId::new();
        assert_eq!(catalog.subject(id).await.unwrap_err(), ReservationError::SubjectNotFound(id));
    }
}
