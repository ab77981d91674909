//! Error types for web handlers.
//!
//! [`AppError`] is the only error a handler returns. Domain errors convert
//! into it through `From`, which fixes the status code for every
//! [`ReservationError`] variant in one place.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rsvp_core::{ReservationError, ValidationError};
use rsvp_runtime::CatalogError;
use serde::Serialize;
use std::fmt;

/// Application error type for web handlers.
///
/// # Examples
///
/// ```ignore
/// async fn handler() -> Result<Json<Data>, AppError> {
///     let event = queries.detail(id).await?;
///     Ok(Json(event))
/// }
/// ```
#[derive(Debug)]
pub struct AppError {
    /// HTTP status code
    status: StatusCode,
    /// Error message (user-facing)
    message: String,
    /// Error code (for client error handling)
    code: String,
    /// One entry per validation problem
    details: Vec<String>,
    /// Whether the client may safely repeat the request
    retryable: bool,
    /// Internal error (for logging, not exposed to client)
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub const fn new(status: StatusCode, message: String, code: String) -> Self {
        Self {
            status,
            message,
            code,
            details: Vec::new(),
            retryable: false,
            source: None,
        }
    }

    /// Create a new error with a source error.
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// Mark the error as safe to retry.
    #[must_use]
    pub const fn retryable(mut self) -> Self {
        self.retryable = true;
        self
    }

    /// The HTTP status this error renders with.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// The machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Create a 400 Bad Request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message.into(), "BAD_REQUEST".to_string())
    }

    /// Create a 400 validation error listing every problem.
    #[must_use]
    pub fn validation(details: Vec<String>) -> Self {
        let mut err = Self::new(
            StatusCode::BAD_REQUEST,
            "Validation failed".to_string(),
            "VALIDATION_ERROR".to_string(),
        );
        err.details = details;
        err
    }

    /// Create a 404 Not Found error.
    #[must_use]
    pub fn not_found(resource: impl fmt::Display, id: impl fmt::Display) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            format!("{resource} with id {id} not found"),
            "NOT_FOUND".to_string(),
        )
    }

    /// Create a 404 for a path no route matches.
    #[must_use]
    pub fn route_not_found() -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            "The requested resource was not found".to_string(),
            "NOT_FOUND".to_string(),
        )
    }

    /// Create a 409 Conflict error.
    #[must_use]
    pub fn conflict(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message.into(), code.into())
    }

    /// Create a 429 Too Many Requests error.
    #[must_use]
    pub fn rate_limited() -> Self {
        Self::new(
            StatusCode::TOO_MANY_REQUESTS,
            "Too many requests, please try again later".to_string(),
            "RATE_LIMITED".to_string(),
        )
        .retryable()
    }

    /// Create a 500 Internal Server Error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            message.into(),
            "INTERNAL_SERVER_ERROR".to_string(),
        )
    }

    /// Create a 503 Service Unavailable error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            message.into(),
            "SERVICE_UNAVAILABLE".to_string(),
        )
        .retryable()
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Error response body (JSON).
#[derive(Debug, Serialize)]
struct ErrorResponse {
    /// Error code (for client error handling).
    code: String,
    /// Human-readable error message.
    message: String,
    /// Validation problems, when there are any.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    details: Vec<String>,
    /// Present and true when repeating the request may succeed.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    retryable: bool,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log internal errors
        if self.status.is_server_error() {
            if let Some(source) = &self.source {
                tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    message = %self.message,
                    error = %source,
                    "Internal server error"
                );
            } else {
                tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    message = %self.message,
                    "Internal server error"
                );
            }
        }

        let body = ErrorResponse {
            code: self.code,
            message: self.message,
            details: self.details,
            retryable: self.retryable,
        };

        (self.status, Json(body)).into_response()
    }
}

/// Convert `anyhow::Error` to `AppError`.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal("An internal error occurred").with_source(err)
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        Self::validation(err.details)
    }
}

impl From<ReservationError> for AppError {
    fn from(err: ReservationError) -> Self {
        let message = err.to_string();
        match err {
            ReservationError::ResourceNotFound(id) => Self::not_found("Event", id),
            ReservationError::SubjectNotFound(id) => Self::not_found("User", id),
            ReservationError::ReservationNotFound { .. } => {
                Self::new(StatusCode::NOT_FOUND, message, "NOT_FOUND".to_string())
            }
            ReservationError::ResourceExpired { .. } => {
                Self::new(StatusCode::BAD_REQUEST, message, "RESOURCE_EXPIRED".to_string())
            }
            ReservationError::DuplicateReservation { .. } => Self::conflict(message, "DUPLICATE_RESERVATION"),
            ReservationError::CapacityExceeded { .. } => Self::conflict(message, "CAPACITY_EXCEEDED"),
            ReservationError::DuplicateSubject { .. } => Self::conflict(message, "DUPLICATE_SUBJECT"),
            ReservationError::ConcurrencyConflict { .. } => {
                Self::conflict(message, "CONCURRENCY_CONFLICT").retryable()
            }
            ReservationError::Unavailable(_) => {
                Self::unavailable("Database connection failed").with_source(anyhow::Error::new(err))
            }
            ReservationError::Storage(_) => {
                Self::internal("An internal error occurred").with_source(anyhow::Error::new(err))
            }
        }
    }
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Invalid(err) => err.into(),
            CatalogError::Store(err) => err.into(),
        }
    }
}
