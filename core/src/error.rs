//! Error taxonomy for ledger, query and catalog operations.
//!
//! Every failure a caller can observe is a variant of [`ReservationError`].
//! Transport layers map variants to responses by matching on them (or on
//! their [`ErrorClass`]), never by inspecting messages.

use crate::types::{ResourceId, SubjectId};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Result type alias for reservation operations.
pub type Result<T> = std::result::Result<T, ReservationError>;

/// Closed set of failures surfaced by the reservation system.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReservationError {
    // ═══════════════════════════════════════════════════════════
    // Not found
    // ═══════════════════════════════════════════════════════════

    /// No resource with this identifier exists.
    #[error("Resource {0} not found")]
    ResourceNotFound(ResourceId),

    /// No subject with this identifier exists.
    #[error("Subject {0} not found")]
    SubjectNotFound(SubjectId),

    /// The subject holds no live reservation on the resource.
    #[error("No reservation for subject {subject_id} on resource {resource_id}")]
    ReservationNotFound {
        /// Subject that was looked up
        subject_id: SubjectId,
        /// Resource that was looked up
        resource_id: ResourceId,
    },

    // ═══════════════════════════════════════════════════════════
    // Invariant violations
    // ═══════════════════════════════════════════════════════════

    /// The resource's date has passed; it no longer accepts reservations.
    #[error("Resource {resource_id} closed for reservations at {available_at}")]
    ResourceExpired {
        /// Resource that was targeted
        resource_id: ResourceId,
        /// The availability instant that has elapsed
        available_at: DateTime<Utc>,
    },

    /// The subject already holds a live reservation on the resource.
    #[error("Subject {subject_id} already holds a reservation on resource {resource_id}")]
    DuplicateReservation {
        /// Subject that already holds the reservation
        subject_id: SubjectId,
        /// Resource that was targeted
        resource_id: ResourceId,
    },

    /// Every unit of the resource's capacity is already reserved.
    #[error("Resource {resource_id} is full (capacity {capacity})")]
    CapacityExceeded {
        /// Resource that was targeted
        resource_id: ResourceId,
        /// Its declared capacity
        capacity: u32,
    },

    /// Another subject already uses this email address.
    #[error("A subject with email {email} already exists")]
    DuplicateSubject {
        /// The conflicting email address
        email: String,
    },

    // ═══════════════════════════════════════════════════════════
    // Contention and infrastructure
    // ═══════════════════════════════════════════════════════════

    /// Contention on the resource could not be resolved.
    ///
    /// Unlike [`ReservationError::CapacityExceeded`] the true outcome is
    /// unknown; the request is safe to retry.
    #[error("Concurrent modification of resource {resource_id}, retry the request")]
    ConcurrencyConflict {
        /// Resource under contention
        resource_id: ResourceId,
    },

    /// The backing store could not be reached.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The backing store failed for a reason other than connectivity.
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Coarse classification of a [`ReservationError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// An identifier did not match a live entity
    NotFound,
    /// The mutation would break a domain invariant
    InvariantViolation,
    /// Contention that the caller may retry
    Conflict,
    /// The backing store is unreachable
    Unavailable,
    /// Any other store failure
    Internal,
}

impl ReservationError {
    /// Classify this error.
    ///
    /// # Examples
    ///
    /// ```
    /// # use rsvp_core::{ErrorClass, ReservationError, ResourceId};
    /// let err = ReservationError::ResourceNotFound(ResourceId::new());
    /// assert_eq!(err.class(), ErrorClass::NotFound);
    /// ```
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::ResourceNotFound(_) | Self::SubjectNotFound(_) | Self::ReservationNotFound { .. } => {
                ErrorClass::NotFound
            }
            Self::ResourceExpired { .. }
            | Self::DuplicateReservation { .. }
            | Self::CapacityExceeded { .. }
            | Self::DuplicateSubject { .. } => ErrorClass::InvariantViolation,
            Self::ConcurrencyConflict { .. } => ErrorClass::Conflict,
            Self::Unavailable(_) => ErrorClass::Unavailable,
            Self::Storage(_) => ErrorClass::Internal,
        }
    }

    /// Returns `true` if the ledger may retry the operation that produced this error.
    ///
    /// # Examples
    ///
    /// ```
    /// # use rsvp_core::{ReservationError, ResourceId};
    /// let id = ResourceId::new();
    /// assert!(ReservationError::ConcurrencyConflict { resource_id: id }.is_retryable());
    /// assert!(!ReservationError::CapacityExceeded { resource_id: id, capacity: 1 }.is_retryable());
    /// ```
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. })
    }

    /// Stable snake-case label, used as a metrics dimension.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::ResourceNotFound(_) => "resource_not_found",
            Self::SubjectNotFound(_) => "subject_not_found",
            Self::ReservationNotFound { .. } => "reservation_not_found",
            Self::ResourceExpired { .. } => "resource_expired",
            Self::DuplicateReservation { .. } => "duplicate_reservation",
            Self::CapacityExceeded { .. } => "capacity_exceeded",
            Self::DuplicateSubject { .. } => "duplicate_subject",
            Self::ConcurrencyConflict { .. } => "concurrency_conflict",
            Self::Unavailable(_) => "unavailable",
            Self::Storage(_) => "storage",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classes() {
        let resource_id = ResourceId::new();
        let subject_id = SubjectId::new();

        assert_eq!(
            ReservationError::ReservationNotFound { subject_id, resource_id }.class(),
            ErrorClass::NotFound
        );
        assert_eq!(
            ReservationError::DuplicateReservation { subject_id, resource_id }.class(),
            ErrorClass::InvariantViolation
        );
        assert_eq!(
            ReservationError::ResourceExpired { resource_id, available_at: Utc::now() }.class(),
            ErrorClass::InvariantViolation
        );
        assert_eq!(
            ReservationError::ConcurrencyConflict { resource_id }.class(),
            ErrorClass::Conflict
        );
        assert_eq!(
            ReservationError::Unavailable("connection refused".into()).class(),
            ErrorClass::Unavailable
        );
        assert_eq!(ReservationError::Storage("bad row".into()).class(), ErrorClass::Internal);
    }

    #[test]
    fn test_only_conflicts_are_retryable() {
        assert!(!ReservationError::Unavailable("down".into()).is_retryable());
        assert!(!ReservationError::SubjectNotFound(SubjectId::new()).is_retryable());
    }

    #[test]
    fn test_display_mentions_capacity() {
        let err = ReservationError::CapacityExceeded {
            resource_id: ResourceId::new(),
            capacity: 50,
        };
        assert!(err.to_string().contains("capacity 50"));
        assert_eq!(err.reason(), "capacity_exceeded");
    }
}
