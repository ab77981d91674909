//! Shape validation for externally supplied input.
//!
//! Validation collects every problem instead of stopping at the first one, so
//! a client sees all of them in a single response.

use crate::types::{NewResource, NewSubject};
use chrono::{DateTime, Utc};
use std::str::FromStr;
use thiserror::Error;

/// Maximum length of titles, locations, names and emails, in characters.
pub const MAX_TEXT_LEN: usize = 255;

/// Maximum capacity a resource may declare.
pub const MAX_CAPACITY: u32 = 1000;

/// Input failed validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Validation failed: {}", details.join("; "))]
pub struct ValidationError {
    /// One message per problem found
    pub details: Vec<String>,
}

impl ValidationError {
    /// A validation error with a single message.
    #[must_use]
    pub fn single(message: impl Into<String>) -> Self {
        Self {
            details: vec![message.into()],
        }
    }

    fn from_details(details: Vec<String>) -> Result<(), Self> {
        if details.is_empty() {
            Ok(())
        } else {
            Err(Self { details })
        }
    }
}

fn check_text(field: &str, value: &str, details: &mut Vec<String>) {
    let len = value.trim().chars().count();
    if len == 0 {
        details.push(format!("\"{field}\" is required"));
    } else if value.chars().count() > MAX_TEXT_LEN {
        details.push(format!("\"{field}\" must be at most {MAX_TEXT_LEN} characters"));
    }
}

/// Loose syntactic email check: one `@`, non-empty local part, dotted domain,
/// no whitespace.
#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.split('.').count() >= 2
        && domain.split('.').all(|label| !label.is_empty())
}

/// Parse an identifier supplied by a client.
///
/// # Errors
///
/// Returns a [`ValidationError`] naming `field` if `raw` is not a valid UUID.
///
/// # Examples
///
/// ```
/// use rsvp_core::{ResourceId, validation::parse_id};
///
/// let id: ResourceId = parse_id("event_id", "67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap();
/// assert!(parse_id::<ResourceId>("event_id", "42").is_err());
/// ```
pub fn parse_id<T: FromStr>(field: &str, raw: &str) -> Result<T, ValidationError> {
    raw.parse()
        .map_err(|_| ValidationError::single(format!("\"{field}\" must be a valid GUID")))
}

impl NewResource {
    /// Validate field shapes and that the date lies in the future.
    ///
    /// # Errors
    ///
    /// Returns every problem found.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), ValidationError> {
        let mut details = Vec::new();

        check_text("title", &self.title, &mut details);
        check_text("location", &self.location, &mut details);

        if self.capacity == 0 || self.capacity > MAX_CAPACITY {
            details.push(format!("\"capacity\" must be between 1 and {MAX_CAPACITY}"));
        }

        if self.available_at <= now {
            details.push("Event date must be in the future".to_string());
        }

        ValidationError::from_details(details)
    }
}

impl NewSubject {
    /// Validate name and email shape.
    ///
    /// # Errors
    ///
    /// Returns every problem found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut details = Vec::new();

        check_text("name", &self.name, &mut details);

        if self.email.is_empty() {
            details.push("\"email\" is required".to_string());
        } else if self.email.chars().count() > MAX_TEXT_LEN {
            details.push(format!("\"email\" must be at most {MAX_TEXT_LEN} characters"));
        } else if !is_valid_email(&self.email) {
            details.push("\"email\" must be a valid email".to_string());
        }

        ValidationError::from_details(details)
    }
}
