//! # RSVP Testing
//!
//! Testing utilities for the RSVP reservation ledger.
//!
//! This crate provides:
//! - [`InMemoryStore`]: every store trait, backed by per-resource locks
//! - [`ConflictInjector`]: a store wrapper that simulates contention
//! - A fixed clock and entity fixtures
//! - proptest strategies for ledger operation sequences
//!
//! ## Example
//!
//! ```
//! use rsvp_core::environment::Clock;
//! use rsvp_testing::{InMemoryStore, fixtures, test_clock};
//! use chrono::Duration;
//!
//! let clock = test_clock();
//! let store = InMemoryStore::new();
//! let event = store.insert_resource(fixtures::resource(clock.now() + Duration::days(7), 50));
//! let guest = store.insert_subject(fixtures::subject("Jane Smith"));
//! assert_eq!(guest.email, "jane.smith@example.com");
//! assert_eq!(store.live_count(event.id), 0);
//! ```

use chrono::{DateTime, Utc};
use rsvp_core::environment::Clock;

mod fault;
mod memory;

pub use fault::ConflictInjector;
pub use memory::InMemoryStore;

/// Mock implementations of environment traits.
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use rsvp_testing::mocks::FixedClock;
    /// use rsvp_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(DateTime::<Utc>::from_timestamp(1_735_689_600, 0).unwrap_or_default())
    }
}

/// Entity builders with sensible defaults.
pub mod fixtures {
    use super::mocks::test_clock;
    use rsvp_core::environment::Clock;
    use rsvp_core::{DateTime, Resource, ResourceId, Subject, SubjectId, Utc};

    /// A resource with the given date and capacity.
    #[must_use]
    pub fn resource(available_at: DateTime<Utc>, capacity: u32) -> Resource {
        Resource {
            id: ResourceId::new(),
            title: "Rust Meetup".to_string(),
            location: "Berlin".to_string(),
            available_at,
            capacity,
            created_at: test_clock().now(),
        }
    }

    /// A subject named `name`, with an email derived from it.
    #[must_use]
    pub fn subject(name: &str) -> Subject {
        let local = name.to_lowercase().split_whitespace().collect::<Vec<_>>().join(".");
        Subject {
            id: SubjectId::new(),
            name: name.to_string(),
            email: format!("{local}@example.com"),
            created_at: test_clock().now(),
        }
    }
}

/// proptest strategies.
pub mod properties {
    use proptest::prelude::*;

    /// One step of a randomized ledger scenario, indexing into fixed pools of
    /// subjects and resources.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum LedgerOp {
        /// Subject `subject` reserves resource `resource`
        Create {
            /// Index into the subject pool
            subject: usize,
            /// Index into the resource pool
            resource: usize,
        },
        /// Subject `subject` cancels on resource `resource`
        Cancel {
            /// Index into the subject pool
            subject: usize,
            /// Index into the resource pool
            resource: usize,
        },
    }

    /// Strategy for a single operation over `subjects` x `resources` pools.
    pub fn ledger_op(subjects: usize, resources: usize) -> impl Strategy<Value = LedgerOp> {
        prop_oneof![
            3 => (0..subjects, 0..resources).prop_map(|(subject, resource)| LedgerOp::Create { subject, resource }),
            1 => (0..subjects, 0..resources).prop_map(|(subject, resource)| LedgerOp::Cancel { subject, resource }),
        ]
    }

    /// Strategy for a sequence of up to `max_len` operations.
    pub fn ledger_ops(subjects: usize, resources: usize, max_len: usize) -> impl Strategy<Value = Vec<LedgerOp>> {
        proptest::collection::vec(ledger_op(subjects, resources), 0..max_len)
    }
}

pub use mocks::{FixedClock, test_clock};
