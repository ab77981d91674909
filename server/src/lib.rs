//! RSVP reservation ledger server.
//!
//! Wires the `PostgreSQL` store, the reservation services and the HTTP
//! gateway together. Configuration lives in [`config`]; the binary in
//! `main.rs` owns startup and shutdown.

pub mod config;

pub use config::{Config, ConfigError};
