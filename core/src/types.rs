//! Domain types for the reservation ledger.
//!
//! Identifiers are opaque UUID newtypes. Entities are plain data: the
//! invariants live in the stores, not in these structs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            #[doc = concat!("Creates a new random `", stringify!($name), "`")]
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            #[doc = concat!("Create a `", stringify!($name), "` from a `Uuid`")]
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the inner UUID
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a resource (an event)
    ResourceId
);

uuid_id!(
    /// Unique identifier for a subject (a user)
    SubjectId
);

uuid_id!(
    /// Unique identifier for a reservation
    ReservationId
);

// ============================================================================
// Entities
// ============================================================================

/// A capacity-constrained resource that subjects reserve.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// Resource identity
    pub id: ResourceId,
    /// Human-readable title
    pub title: String,
    /// Where the event takes place; secondary sort key for listings
    pub location: String,
    /// Instant after which no new reservation is accepted
    pub available_at: DateTime<Utc>,
    /// Upper bound on live reservations
    pub capacity: u32,
    /// When the resource was created
    pub created_at: DateTime<Utc>,
}

impl Resource {
    /// Whether a new reservation may be created at `now`.
    ///
    /// The availability instant must be strictly after `now`; a resource whose
    /// date equals the current instant is already closed.
    #[must_use]
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.available_at > now
    }
}

/// A subject that can hold reservations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    /// Subject identity
    pub id: SubjectId,
    /// Display name
    pub name: String,
    /// Contact email, unique across subjects
    pub email: String,
    /// When the subject was created
    pub created_at: DateTime<Utc>,
}

/// A live claim by one subject on one unit of a resource's capacity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    /// Reservation identity
    pub id: ReservationId,
    /// Who holds the reservation
    pub subject_id: SubjectId,
    /// What is reserved
    pub resource_id: ResourceId,
    /// When the reservation was created
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Commands
// ============================================================================

/// Input for creating a resource.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewResource {
    /// Title, 1 to 255 characters
    pub title: String,
    /// Location, 1 to 255 characters
    pub location: String,
    /// Event date, must be in the future
    pub available_at: DateTime<Utc>,
    /// Capacity, 1 to 1000
    pub capacity: u32,
}

/// Input for creating a subject.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSubject {
    /// Name, 1 to 255 characters
    pub name: String,
    /// Email address, unique
    pub email: String,
}

// ============================================================================
// Read projections
// ============================================================================

/// A subject currently holding a reservation, as listed in [`ResourceDetail`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservedSubject {
    /// Subject identity
    pub subject_id: SubjectId,
    /// Display name
    pub name: String,
    /// Contact email
    pub email: String,
    /// When the reservation was created
    pub reserved_at: DateTime<Utc>,
}

/// A resource together with everyone currently reserved on it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDetail {
    /// The resource itself
    #[serde(flatten)]
    pub resource: Resource,
    /// Number of live reservations
    pub reservation_count: u32,
    /// Reserved subjects, oldest reservation first
    pub reserved_subjects: Vec<ReservedSubject>,
}

/// One row of the upcoming-resources listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSummary {
    /// The resource itself
    #[serde(flatten)]
    pub resource: Resource,
    /// Number of live reservations
    pub reservation_count: u32,
    /// Capacity minus live reservations, never negative
    pub remaining_capacity: u32,
}

impl ResourceSummary {
    /// Build a summary from a resource and its live count.
    #[must_use]
    pub fn new(resource: Resource, reservation_count: u32) -> Self {
        let remaining_capacity = resource.capacity.saturating_sub(reservation_count);
        Self {
            resource,
            reservation_count,
            remaining_capacity,
        }
    }
}

/// Capacity usage of a single resource.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UtilizationStats {
    /// Declared capacity
    pub capacity: u32,
    /// Number of live reservations
    pub reservation_count: u32,
    /// Capacity minus live reservations, never negative
    pub remaining_capacity: u32,
    /// Live reservations as a percentage of capacity, two decimals
    pub percentage_used: f64,
}

impl UtilizationStats {
    /// Compute utilization from a capacity and a live count.
    ///
    /// The percentage is rounded half away from zero to two decimal places
    /// and is defined as `0.0` when the capacity is zero.
    #[must_use]
    pub fn compute(capacity: u32, reservation_count: u32) -> Self {
        let percentage_used = if capacity == 0 {
            0.0
        } else {
            let raw = f64::from(reservation_count) / f64::from(capacity) * 100.0;
            (raw * 100.0).round() / 100.0
        };

        Self {
            capacity,
            reservation_count,
            remaining_capacity: capacity.saturating_sub(reservation_count),
            percentage_used,
        }
    }
}
