//! Custom Axum extractors.
//!
//! Both reject malformed input with a 400 `VALIDATION_ERROR` body instead of
//! axum's plain-text rejections:
//! - `JsonBody`: JSON request body
//! - `PathId`: a UUID path segment parsed into a typed identifier
//!
//! # Examples
//!
//! ```ignore
//! async fn handler(
//!     PathId(event_id): PathId<ResourceId>,
//!     JsonBody(body): JsonBody<RegistrationRequest>,
//! ) -> Result<Json<Response>, AppError> {
//!     Ok(Json(response))
//! }
//! ```

use crate::error::AppError;
use axum::{
    Json, async_trait,
    extract::{FromRequest, FromRequestParts, Path, Request},
    http::request::Parts,
};
use rsvp_core::validation::parse_id;
use serde::de::DeserializeOwned;
use std::str::FromStr;

/// JSON body whose rejection renders as a validation error.
#[derive(Debug, Clone)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(AppError::validation(vec![rejection.body_text()])),
        }
    }
}

/// The `:id` path segment, parsed as a UUID identifier.
#[derive(Debug, Clone, Copy)]
pub struct PathId<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for PathId<T>
where
    T: FromStr,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| AppError::bad_request(rejection.body_text()))?;

        Ok(Self(parse_id("id", &raw)?))
    }
}
