//! Route table and middleware stack.

use crate::handlers::{self, events, users};
use crate::middleware::correlation_id_layer;
use crate::rate_limit::{RateLimitConfig, rate_limit_layer};
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, post},
};
use rsvp_core::Backend;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Routes under `/api`, rate limited per client.
fn api_routes<S: Backend>(rate_limit: RateLimitConfig) -> Router<AppState<S>> {
    Router::new()
        .route("/events", post(events::create_event::<S>).get(events::list_events::<S>))
        .route("/events/:id", get(events::get_event::<S>))
        .route("/events/:id/stats", get(events::get_event_stats::<S>))
        .route(
            "/events/:id/register",
            post(events::register::<S>).delete(events::cancel_registration::<S>),
        )
        .route("/users", post(users::create_user::<S>).get(users::list_users::<S>))
        .route("/users/:id", get(users::get_user::<S>))
        .fallback(handlers::not_found)
        .layer(rate_limit_layer(rate_limit))
}

/// Build the application router.
///
/// ```text
/// GET    /health                      liveness
/// GET    /ready                       readiness (pings the store)
/// POST   /api/events                  create event
/// GET    /api/events                  upcoming events
/// GET    /api/events/:id              event detail
/// GET    /api/events/:id/stats        utilization
/// POST   /api/events/:id/register     register a user
/// DELETE /api/events/:id/register     cancel a registration
/// POST   /api/users                   create user
/// GET    /api/users                   list users
/// GET    /api/users/:id               user detail
/// ```
///
/// Layers, outermost first: correlation id, CORS, request tracing. The
/// per-client rate limit covers `/api` only; health checks are never limited.
///
/// Serve with `into_make_service_with_connect_info::<SocketAddr>()` so the
/// limiter can see peer addresses.
pub fn build_router<S: Backend>(state: AppState<S>, rate_limit: RateLimitConfig) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check::<S>))
        .nest("/api", api_routes::<S>(rate_limit))
        .fallback(handlers::not_found)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(correlation_id_layer())
        .with_state(state)
}
