//! HTTP surface for the RSVP reservation ledger.
//!
//! Thin axum layer over the services in `rsvp-runtime`: handlers parse and
//! validate input, call one service operation, and map the outcome to a
//! status code and JSON body.
//!
//! # Request Flow
//!
//! 1. **Correlation id** assigned (or taken from `X-Correlation-ID`)
//! 2. **Rate limit** checked against the global token bucket
//! 3. **Extract** path ids and JSON bodies; malformed input becomes 400
//! 4. **Call** the ledger, query or catalog service
//! 5. **Map** the result, or the [`ReservationError`](rsvp_core::ReservationError)
//!    through [`AppError`], to a response
//!
//! # Example
//!
//! ```ignore
//! use rsvp_web::{AppState, RateLimitConfig, build_router};
//!
//! let state = AppState::new(store, Arc::new(SystemClock), RetryPolicy::default());
//! let app = build_router(state, RateLimitConfig::default());
//! axum::serve(listener, app).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod rate_limit;
pub mod router;
pub mod state;

// Re-export key types for convenience
pub use error::AppError;
pub use extractors::{JsonBody, PathId};
pub use middleware::{CORRELATION_ID_HEADER, correlation_id_layer};
pub use rate_limit::{RateLimitConfig, rate_limit_layer};
pub use router::build_router;
pub use state::AppState;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
