//! Translation of sqlx failures into [`ReservationError`].
//!
//! Connectivity problems become `Unavailable`; transient lock and
//! serialization conflicts inside a reservation transaction become
//! `ConcurrencyConflict`; everything else is `Storage`.

use rsvp_core::{ReservationError, ResourceId};

/// `serialization_failure`
const SERIALIZATION_FAILURE: &str = "40001";
/// `deadlock_detected`
const DEADLOCK_DETECTED: &str = "40P01";
/// `lock_not_available`, raised when `lock_timeout` expires
const LOCK_NOT_AVAILABLE: &str = "55P03";
/// `admin_shutdown`
const ADMIN_SHUTDOWN: &str = "57P01";
/// `cannot_connect_now`
const CANNOT_CONNECT_NOW: &str = "57P03";

fn sqlstate(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db) => db.code().map(|code| code.into_owned()),
        _ => None,
    }
}

/// Whether the error means the database could not be reached or the pool
/// could not hand out a connection.
pub(crate) fn is_connectivity(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => true,
        sqlx::Error::Database(_) => sqlstate(err).is_some_and(|code| {
            code.starts_with("08") || code == ADMIN_SHUTDOWN || code == CANNOT_CONNECT_NOW
        }),
        _ => false,
    }
}

/// Whether retrying the same transaction may succeed.
pub(crate) fn is_transient_conflict(err: &sqlx::Error) -> bool {
    sqlstate(err).is_some_and(|code| {
        code == SERIALIZATION_FAILURE || code == DEADLOCK_DETECTED || code == LOCK_NOT_AVAILABLE
    })
}

/// Whether the error is a violated unique constraint.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// Map a failure outside any reservation transaction.
pub(crate) fn storage_error(err: sqlx::Error) -> ReservationError {
    if is_connectivity(&err) {
        tracing::error!(error = %err, "Database unavailable");
        ReservationError::Unavailable(err.to_string())
    } else {
        ReservationError::Storage(err.to_string())
    }
}

/// Map a failure inside a reservation transaction on `resource_id`.
pub(crate) fn ledger_error(resource_id: ResourceId) -> impl FnOnce(sqlx::Error) -> ReservationError {
    move |err| {
        if is_transient_conflict(&err) {
            tracing::debug!(%resource_id, error = %err, "Reservation transaction contended");
            ReservationError::ConcurrencyConflict { resource_id }
        } else {
            storage_error(err)
        }
    }
}
