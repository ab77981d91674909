//! `PostgreSQL` implementation of the store traits.
//!
//! # Reservation transactions
//!
//! A create runs in one transaction that first takes the resource's row lock
//! (`SELECT ... FOR UPDATE`). Every create on the same resource queues on that
//! lock, so the existence, expiry, duplicate and capacity checks and the
//! insert see a stable live count. Creates on different resources lock
//! different rows and never wait on each other.
//!
//! The wait is bounded by a transaction-local `lock_timeout`. A timeout,
//! deadlock or serialization failure is reported as `ConcurrencyConflict`
//! for the ledger to retry. The `UNIQUE (subject_id, resource_id)` constraint
//! and `CHECK (capacity > 0)` only catch bugs in this path.
//!
//! Dropping the transaction without committing rolls it back, so every early
//! return and every cancelled future leaves no partial write.

use crate::error::{is_unique_violation, ledger_error, storage_error};
use chrono::{DateTime, Utc};
use rsvp_core::{
    NewResource, NewSubject, Reservation, ReservationError, ReservationId, ReservationReadModel,
    ReservationStore, ReservedSubject, Resource, ResourceCatalog, ResourceDetail, ResourceId, ResourceSummary,
    Result, StoreHealth, Subject, SubjectDirectory, SubjectId,
};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;
use std::time::Duration;
use uuid::Uuid;

const RESOURCE_COLUMNS: &str = "id, title, location, available_at, capacity, created_at";
const SUBJECT_COLUMNS: &str = "id, name, email, created_at";
const RESERVATION_COLUMNS: &str = "id, subject_id, resource_id, created_at";

fn decode_count(value: i64) -> Result<u32> {
    u32::try_from(value).map_err(|_| ReservationError::Storage(format!("count {value} out of range")))
}

fn row_to_resource(row: &PgRow) -> Result<Resource> {
    let capacity: i32 = row.try_get("capacity").map_err(storage_error)?;
    Ok(Resource {
        id: ResourceId::from_uuid(row.try_get("id").map_err(storage_error)?),
        title: row.try_get("title").map_err(storage_error)?,
        location: row.try_get("location").map_err(storage_error)?,
        available_at: row.try_get("available_at").map_err(storage_error)?,
        capacity: u32::try_from(capacity)
            .map_err(|_| ReservationError::Storage(format!("negative capacity {capacity}")))?,
        created_at: row.try_get("created_at").map_err(storage_error)?,
    })
}

fn row_to_subject(row: &PgRow) -> Result<Subject> {
    Ok(Subject {
        id: SubjectId::from_uuid(row.try_get("id").map_err(storage_error)?),
        name: row.try_get("name").map_err(storage_error)?,
        email: row.try_get("email").map_err(storage_error)?,
        created_at: row.try_get("created_at").map_err(storage_error)?,
    })
}

fn row_to_reservation(row: &PgRow) -> Result<Reservation> {
    Ok(Reservation {
        id: ReservationId::from_uuid(row.try_get("id").map_err(storage_error)?),
        subject_id: SubjectId::from_uuid(row.try_get("subject_id").map_err(storage_error)?),
        resource_id: ResourceId::from_uuid(row.try_get("resource_id").map_err(storage_error)?),
        created_at: row.try_get("created_at").map_err(storage_error)?,
    })
}

/// `PostgreSQL`-backed store.
///
/// Cloning shares the pool.
#[derive(Clone, Debug)]
pub struct PostgresStore {
    pool: PgPool,
    lock_timeout: Duration,
}

impl PostgresStore {
    /// Default bound on how long a create waits for a resource's row lock.
    pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(2);

    /// Wrap an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self {
            pool,
            lock_timeout: Self::DEFAULT_LOCK_TIMEOUT,
        }
    }

    /// Set how long a create waits for a resource's row lock before
    /// reporting `ConcurrencyConflict`.
    #[must_use]
    pub const fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create or update the schema.
    ///
    /// # Errors
    ///
    /// Returns `Storage` (or `Unavailable`) if a migration fails.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| ReservationError::Storage(format!("Migration failed: {e}")))?;
        tracing::info!("Database migrations applied");
        Ok(())
    }

    /// Close every connection in the pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn locked_create(
        &self,
        subject_id: SubjectId,
        resource_id: ResourceId,
        now: DateTime<Utc>,
    ) -> std::result::Result<Result<Reservation>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT set_config('lock_timeout', $1, true)")
            .bind(format!("{}ms", self.lock_timeout.as_millis()))
            .execute(&mut *tx)
            .await?;

        // 1. Resource exists; the row lock serializes this resource's creates
        let Some(row) = sqlx::query(&format!("SELECT {RESOURCE_COLUMNS} FROM resources WHERE id = $1 FOR UPDATE"))
            .bind(resource_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(Err(ReservationError::ResourceNotFound(resource_id)));
        };
        let resource = match row_to_resource(&row) {
            Ok(resource) => resource,
            Err(err) => return Ok(Err(err)),
        };

        // 2. Still open
        if !resource.is_open_at(now) {
            return Ok(Err(ReservationError::ResourceExpired {
                resource_id,
                available_at: resource.available_at,
            }));
        }

        // 3. Subject exists
        let subject_exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM subjects WHERE id = $1)")
            .bind(subject_id.as_uuid())
            .fetch_one(&mut *tx)
            .await?;
        if !subject_exists {
            return Ok(Err(ReservationError::SubjectNotFound(subject_id)));
        }

        // 4. No live reservation for the pair
        let duplicate: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM reservations WHERE subject_id = $1 AND resource_id = $2)",
        )
        .bind(subject_id.as_uuid())
        .bind(resource_id.as_uuid())
        .fetch_one(&mut *tx)
        .await?;
        if duplicate {
            return Ok(Err(ReservationError::DuplicateReservation {
                subject_id,
                resource_id,
            }));
        }

        // 5. Room left
        let live: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reservations WHERE resource_id = $1")
            .bind(resource_id.as_uuid())
            .fetch_one(&mut *tx)
            .await?;
        if live >= i64::from(resource.capacity) {
            return Ok(Err(ReservationError::CapacityExceeded {
                resource_id,
                capacity: resource.capacity,
            }));
        }

        let inserted = sqlx::query(&format!(
            "INSERT INTO reservations ({RESERVATION_COLUMNS}) VALUES ($1, $2, $3, $4) RETURNING {RESERVATION_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(subject_id.as_uuid())
        .bind(resource_id.as_uuid())
        .bind(now)
        .fetch_one(&mut *tx)
        .await;

        let row = match inserted {
            Ok(row) => row,
            Err(err) if is_unique_violation(&err) => {
                tracing::warn!(%subject_id, %resource_id, "Unique constraint caught a duplicate reservation");
                return Ok(Err(ReservationError::DuplicateReservation {
                    subject_id,
                    resource_id,
                }));
            }
            Err(err) => return Err(err),
        };
        // A row we cannot decode is never committed; dropping `tx` rolls it back
        let reservation = match row_to_reservation(&row) {
            Ok(reservation) => reservation,
            Err(err) => return Ok(Err(err)),
        };

        tx.commit().await?;
        Ok(Ok(reservation))
    }
}

impl ResourceCatalog for PostgresStore {
    async fn get_resource(&self, id: ResourceId) -> Result<Option<Resource>> {
        sqlx::query(&format!("SELECT {RESOURCE_COLUMNS} FROM resources WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?
            .as_ref()
            .map(row_to_resource)
            .transpose()
    }

    async fn count_live_reservations(&self, id: ResourceId) -> Result<u32> {
        let live: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reservations WHERE resource_id = $1")
            .bind(id.as_uuid())
            .fetch_one(&self.pool)
            .await
            .map_err(storage_error)?;
        decode_count(live)
    }

    async fn create_resource(&self, resource: NewResource, now: DateTime<Utc>) -> Result<Resource> {
        let capacity = i32::try_from(resource.capacity)
            .map_err(|_| ReservationError::Storage(format!("capacity {} out of range", resource.capacity)))?;

        let row = sqlx::query(&format!(
            "INSERT INTO resources ({RESOURCE_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6) RETURNING {RESOURCE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&resource.title)
        .bind(&resource.location)
        .bind(resource.available_at)
        .bind(capacity)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(storage_error)?;

        row_to_resource(&row)
    }
}

impl SubjectDirectory for PostgresStore {
    async fn get_subject(&self, id: SubjectId) -> Result<Option<Subject>> {
        sqlx::query(&format!("SELECT {SUBJECT_COLUMNS} FROM subjects WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?
            .as_ref()
            .map(row_to_subject)
            .transpose()
    }

    async fn create_subject(&self, subject: NewSubject, now: DateTime<Utc>) -> Result<Subject> {
        let row = sqlx::query(&format!(
            "INSERT INTO subjects ({SUBJECT_COLUMNS}) VALUES ($1, $2, $3, $4) RETURNING {SUBJECT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&subject.name)
        .bind(&subject.email)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                ReservationError::DuplicateSubject {
                    email: subject.email.clone(),
                }
            } else {
                storage_error(err)
            }
        })?;

        row_to_subject(&row)
    }

    async fn list_subjects(&self) -> Result<Vec<Subject>> {
        sqlx::query(&format!("SELECT {SUBJECT_COLUMNS} FROM subjects ORDER BY name ASC, id ASC"))
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error)?
            .iter()
            .map(row_to_subject)
            .collect()
    }
}

impl ReservationStore for PostgresStore {
    async fn try_create_reservation(
        &self,
        subject_id: SubjectId,
        resource_id: ResourceId,
        now: DateTime<Utc>,
    ) -> Result<Reservation> {
        self.locked_create(subject_id, resource_id, now)
            .await
            .map_err(ledger_error(resource_id))?
    }

    async fn cancel_reservation(&self, subject_id: SubjectId, resource_id: ResourceId) -> Result<Reservation> {
        let row = sqlx::query(&format!(
            "DELETE FROM reservations WHERE subject_id = $1 AND resource_id = $2 RETURNING {RESERVATION_COLUMNS}"
        ))
        .bind(subject_id.as_uuid())
        .bind(resource_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(ledger_error(resource_id))?
        .ok_or(ReservationError::ReservationNotFound {
            subject_id,
            resource_id,
        })?;

        row_to_reservation(&row)
    }
}

impl ReservationReadModel for PostgresStore {
    async fn resource_detail(&self, id: ResourceId) -> Result<Option<ResourceDetail>> {
        let Some(resource) = self.get_resource(id).await? else {
            return Ok(None);
        };

        let rows = sqlx::query(
            r"
            SELECT s.id, s.name, s.email, r.created_at AS reserved_at
            FROM reservations r
            JOIN subjects s ON s.id = r.subject_id
            WHERE r.resource_id = $1
            ORDER BY r.created_at ASC, r.id ASC
            ",
        )
        .bind(id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;

        let reserved_subjects = rows
            .iter()
            .map(|row| {
                Ok(ReservedSubject {
                    subject_id: SubjectId::from_uuid(row.try_get("id").map_err(storage_error)?),
                    name: row.try_get("name").map_err(storage_error)?,
                    email: row.try_get("email").map_err(storage_error)?,
                    reserved_at: row.try_get("reserved_at").map_err(storage_error)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(ResourceDetail {
            resource,
            reservation_count: u32::try_from(reserved_subjects.len()).unwrap_or(u32::MAX),
            reserved_subjects,
        }))
    }

    async fn upcoming_resources(&self, now: DateTime<Utc>) -> Result<Vec<ResourceSummary>> {
        let rows = sqlx::query(
            r"
            SELECT e.id, e.title, e.location, e.available_at, e.capacity, e.created_at,
                   COUNT(r.id) AS reservation_count
            FROM resources e
            LEFT JOIN reservations r ON r.resource_id = e.id
            WHERE e.available_at > $1
            GROUP BY e.id
            ORDER BY e.available_at ASC, e.location ASC
            ",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;

        rows.iter()
            .map(|row| {
                let count: i64 = row.try_get("reservation_count").map_err(storage_error)?;
                Ok(ResourceSummary::new(row_to_resource(row)?, decode_count(count)?))
            })
            .collect()
    }
}

impl StoreHealth for PostgresStore {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|err| ReservationError::Unavailable(err.to_string()))?;
        Ok(())
    }
}
