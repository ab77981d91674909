//! HTTP request handlers.
//!
//! This module contains all HTTP handlers organized by domain.

pub mod events;
pub mod health;
pub mod users;

pub use health::{health_check, readiness_check};

use crate::error::AppError;

/// Fallback for unmatched routes.
#[allow(clippy::unused_async)]
pub async fn not_found() -> AppError {
    AppError::route_not_found()
}
