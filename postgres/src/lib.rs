//! `PostgreSQL` store for the RSVP reservation ledger.
//!
//! [`PostgresStore`] implements every store trait from `rsvp-core` with sqlx
//! runtime-checked queries. Reservation creates serialize per resource on the
//! resource's row lock; see [`store`] for the transaction layout.
//!
//! # Example
//!
//! ```no_run
//! use rsvp_postgres::{PoolSettings, PostgresStore, connect};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = connect("postgres://localhost/rsvp", &PoolSettings::default()).await?;
//! let store = PostgresStore::new(pool);
//! store.migrate().await?;
//! # Ok(())
//! # }
//! ```

mod error;
mod pool;
pub mod store;

pub use pool::{PoolSettings, connect};
pub use store::PostgresStore;
