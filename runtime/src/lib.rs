//! # RSVP Runtime
//!
//! Services that drive the store traits defined in `rsvp-core`.
//!
//! ## Core Components
//!
//! - **[`ReservationLedger`]**: atomic create and cancel, with bounded retry on
//!   contention, tracing spans and metrics
//! - **[`QueryService`]**: resource detail, upcoming listings and utilization
//! - **[`CatalogService`]**: validated creation of resources and subjects
//! - **[`retry`]**: exponential backoff used by the ledger
//! - **[`metrics`]**: Prometheus recorder and ledger counters
//!
//! ## Example
//!
//! ```ignore
//! use rsvp_core::environment::SystemClock;
//! use rsvp_runtime::ReservationLedger;
//! use std::sync::Arc;
//!
//! let ledger = ReservationLedger::new(store, Arc::new(SystemClock));
//! let reservation = ledger.create(subject_id, resource_id).await?;
//! ```

/// Resource and subject management
pub mod catalog;

/// The reservation ledger
pub mod ledger;

/// Prometheus metrics for observability
pub mod metrics;

/// Read-side queries
pub mod queries;

/// Retry logic with exponential backoff
pub mod retry;

pub use catalog::{CatalogError, CatalogService, sample_subjects};
pub use ledger::ReservationLedger;
pub use queries::QueryService;
pub use retry::RetryPolicy;
