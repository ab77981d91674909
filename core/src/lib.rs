//! # RSVP Core
//!
//! Domain types, error taxonomy and store traits for the RSVP reservation ledger.
//!
//! This crate has no I/O of its own. It defines:
//!
//! - **Types**: [`Resource`](types::Resource) (an event with a capacity and a date),
//!   [`Subject`](types::Subject) (a user), [`Reservation`](types::Reservation)
//!   (one subject's claim on one resource) and the read projections built from them
//! - **Errors**: the closed [`ReservationError`] enumeration every layer returns
//! - **Stores**: the traits a backing store implements (`PostgresStore` in
//!   `rsvp-postgres`, `InMemoryStore` in `rsvp-testing`)
//! - **Environment**: the [`Clock`](environment::Clock) abstraction used for every
//!   time-dependent decision
//! - **Validation**: shape checks for externally supplied input
//!
//! ## Invariants
//!
//! Every store implementation must guarantee, under concurrent access:
//!
//! 1. A subject holds at most one live reservation per resource
//! 2. The live reservation count of a resource never exceeds its capacity
//! 3. No reservation is created once the resource's date has passed
//!
//! ## Example
//!
//! ```
//! use rsvp_core::types::UtilizationStats;
//!
//! let stats = UtilizationStats::compute(3, 1);
//! assert_eq!(stats.remaining_capacity, 2);
//! assert!((stats.percentage_used - 33.33).abs() < f64::EPSILON);
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};

pub mod error;
pub mod store;
pub mod types;
pub mod validation;

pub use error::{ErrorClass, ReservationError, Result};
pub use store::{Backend, ReservationReadModel, ReservationStore, ResourceCatalog, StoreHealth, SubjectDirectory};
pub use types::{
    NewResource, NewSubject, Reservation, ReservationId, ReservedSubject, Resource, ResourceDetail,
    ResourceId, ResourceSummary, Subject, SubjectId, UtilizationStats,
};
pub use validation::ValidationError;

/// Environment module - abstractions over ambient dependencies.
///
/// Time is the only ambient input the ledger consults: the temporal invariant
/// compares a resource's date against "now", and reservation timestamps are
/// taken from the same source. Injecting the clock keeps those decisions
/// deterministic in tests.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use rsvp_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let before = chrono::Utc::now();
    /// assert!(clock.now() >= before);
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
