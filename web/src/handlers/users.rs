//! User endpoints.

use crate::error::AppError;
use crate::extractors::{JsonBody, PathId};
use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode};
use rsvp_core::{Backend, NewSubject, Subject, SubjectId};
use serde::{Deserialize, Serialize};

/// Request to create a user.
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    /// Display name
    pub name: String,
    /// Email address, unique across users
    pub email: String,
}

/// Response after creating a user.
#[derive(Debug, Serialize)]
pub struct CreateUserResponse {
    /// Success message
    pub message: &'static str,
    /// The created user
    pub user: Subject,
}

/// Single user response.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    /// The user
    pub user: Subject,
}

/// User listing response.
#[derive(Debug, Serialize)]
pub struct ListUsersResponse {
    /// All users, ordered by name
    pub users: Vec<Subject>,
}

/// Create a user.
///
/// # Errors
///
/// - 400 `VALIDATION_ERROR` for a missing name or malformed email
/// - 409 `DUPLICATE_SUBJECT` when the email is taken
pub async fn create_user<S: Backend>(
    State(state): State<AppState<S>>,
    JsonBody(request): JsonBody<CreateUserRequest>,
) -> Result<(StatusCode, Json<CreateUserResponse>), AppError> {
    let user = state
        .catalog
        .create_subject(NewSubject {
            name: request.name,
            email: request.email,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateUserResponse {
            message: "User created successfully",
            user,
        }),
    ))
}

/// All users.
///
/// # Errors
///
/// 503 when the database is unreachable.
pub async fn list_users<S: Backend>(State(state): State<AppState<S>>) -> Result<Json<ListUsersResponse>, AppError> {
    let users = state.catalog.subjects().await?;
    Ok(Json(ListUsersResponse { users }))
}

/// One user.
///
/// # Errors
///
/// - 400 `VALIDATION_ERROR` for a malformed id
/// - 404 when the user does not exist
pub async fn get_user<S: Backend>(
    State(state): State<AppState<S>>,
    PathId(user_id): PathId<SubjectId>,
) -> Result<Json<UserResponse>, AppError> {
    let user = state.catalog.subject(user_id).await?;
    Ok(Json(UserResponse { user }))
}
