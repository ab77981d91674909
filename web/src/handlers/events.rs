//! Event endpoints: creation, listings, statistics and registrations.
//!
//! - POST /api/events - Create an event
//! - GET /api/events - Upcoming events with remaining capacity
//! - GET /api/events/:id - Event detail with registered users
//! - GET /api/events/:id/stats - Utilization statistics
//! - POST /api/events/:id/register - Register a user
//! - DELETE /api/events/:id/register - Cancel a registration

use crate::error::AppError;
use crate::extractors::{JsonBody, PathId};
use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode};
use chrono::{DateTime, Utc};
use rsvp_core::validation::parse_id;
use rsvp_core::{
    Backend, NewResource, Reservation, Resource, ResourceDetail, ResourceId, ResourceSummary, SubjectId,
    UtilizationStats, ValidationError,
};
use serde::{Deserialize, Serialize};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request to create an event.
#[derive(Debug, Deserialize)]
pub struct CreateEventRequest {
    /// Event title
    pub title: String,
    /// Event date; registrations close at this instant
    #[serde(alias = "date_time")]
    pub available_at: DateTime<Utc>,
    /// Venue
    pub location: String,
    /// Maximum number of registrations
    pub capacity: u32,
}

/// Response after creating an event.
#[derive(Debug, Serialize)]
pub struct CreateEventResponse {
    /// Success message
    pub message: &'static str,
    /// Created event ID
    pub event_id: ResourceId,
    /// The created event
    pub event: Resource,
}

/// Event detail response.
#[derive(Debug, Serialize)]
pub struct EventResponse {
    /// Event with its registered users
    pub event: ResourceDetail,
}

/// Upcoming events response.
#[derive(Debug, Serialize)]
pub struct ListEventsResponse {
    /// Events dated in the future, soonest first
    pub events: Vec<ResourceSummary>,
}

/// Utilization response.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    /// Capacity usage
    pub stats: UtilizationStats,
}

/// Body of register and cancel requests.
#[derive(Debug, Deserialize)]
pub struct RegistrationRequest {
    /// The registering user
    pub user_id: Option<String>,
}

impl RegistrationRequest {
    fn subject_id(&self) -> Result<SubjectId, ValidationError> {
        let raw = self
            .user_id
            .as_deref()
            .ok_or_else(|| ValidationError::single("\"user_id\" is required"))?;
        parse_id("user_id", raw)
    }
}

/// Response after registering or cancelling.
#[derive(Debug, Serialize)]
pub struct RegistrationResponse {
    /// Success message
    pub message: &'static str,
    /// The created or removed registration
    pub registration: Reservation,
}

// ============================================================================
// Handlers
// ============================================================================

/// Create an event.
///
/// # Errors
///
/// - 400 `VALIDATION_ERROR` for malformed fields or a date not in the future
/// - 503 when the database is unreachable
pub async fn create_event<S: Backend>(
    State(state): State<AppState<S>>,
    JsonBody(request): JsonBody<CreateEventRequest>,
) -> Result<(StatusCode, Json<CreateEventResponse>), AppError> {
    let event = state
        .catalog
        .create_resource(NewResource {
            title: request.title,
            location: request.location,
            available_at: request.available_at,
            capacity: request.capacity,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateEventResponse {
            message: "Event created successfully",
            event_id: event.id,
            event,
        }),
    ))
}

/// Upcoming events.
///
/// # Errors
///
/// 503 when the database is unreachable.
pub async fn list_events<S: Backend>(State(state): State<AppState<S>>) -> Result<Json<ListEventsResponse>, AppError> {
    let events = state.queries.upcoming().await?;
    Ok(Json(ListEventsResponse { events }))
}

/// Event detail.
///
/// # Errors
///
/// - 400 `VALIDATION_ERROR` for a malformed id
/// - 404 when the event does not exist
pub async fn get_event<S: Backend>(
    State(state): State<AppState<S>>,
    PathId(event_id): PathId<ResourceId>,
) -> Result<Json<EventResponse>, AppError> {
    let event = state.queries.detail(event_id).await?;
    Ok(Json(EventResponse { event }))
}

/// Utilization statistics.
///
/// # Errors
///
/// - 400 `VALIDATION_ERROR` for a malformed id
/// - 404 when the event does not exist
pub async fn get_event_stats<S: Backend>(
    State(state): State<AppState<S>>,
    PathId(event_id): PathId<ResourceId>,
) -> Result<Json<StatsResponse>, AppError> {
    let stats = state.queries.utilization(event_id).await?;
    Ok(Json(StatsResponse { stats }))
}

/// Register a user for an event.
///
/// # Errors
///
/// - 400 `VALIDATION_ERROR` for malformed ids, `RESOURCE_EXPIRED` for past events
/// - 404 when the event or user does not exist
/// - 409 `DUPLICATE_RESERVATION`, `CAPACITY_EXCEEDED` or retryable `CONCURRENCY_CONFLICT`
pub async fn register<S: Backend>(
    State(state): State<AppState<S>>,
    PathId(event_id): PathId<ResourceId>,
    JsonBody(request): JsonBody<RegistrationRequest>,
) -> Result<(StatusCode, Json<RegistrationResponse>), AppError> {
    let subject_id = request.subject_id()?;
    let registration = state.ledger.create(subject_id, event_id).await?;

    Ok((
        StatusCode::CREATED,
        Json(RegistrationResponse {
            message: "Registration successful",
            registration,
        }),
    ))
}

/// Cancel a user's registration.
///
/// # Errors
///
/// - 400 `VALIDATION_ERROR` for malformed ids
/// - 404 when the user holds no registration on the event
pub async fn cancel_registration<S: Backend>(
    State(state): State<AppState<S>>,
    PathId(event_id): PathId<ResourceId>,
    JsonBody(request): JsonBody<RegistrationRequest>,
) -> Result<Json<RegistrationResponse>, AppError> {
    let subject_id = request.subject_id()?;
    let registration = state.ledger.cancel(subject_id, event_id).await?;

    Ok(Json(RegistrationResponse {
        message: "Registration cancelled successfully",
        registration,
    }))
}
