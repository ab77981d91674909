//! Prometheus metrics for the reservation ledger.
//!
//! # Example
//!
//! ```rust,no_run
//! use rsvp_runtime::metrics::MetricsRecorder;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut recorder = MetricsRecorder::new();
//! recorder.install()?;
//!
//! // Later, serve `recorder.render()` from a /metrics endpoint.
//! # Ok(())
//! # }
//! ```

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use rsvp_core::ReservationError;
use std::time::Duration;
use thiserror::Error;

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Installs the global Prometheus recorder and renders its output.
#[derive(Default)]
pub struct MetricsRecorder {
    handle: Option<PrometheusHandle>,
}

impl MetricsRecorder {
    /// Create a recorder that has not been installed yet.
    #[must_use]
    pub const fn new() -> Self {
        Self { handle: None }
    }

    /// Describe all metrics and install the Prometheus recorder globally.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed.
    ///
    /// # Note
    ///
    /// If a recorder is already installed (e.g., in tests), this logs a
    /// warning and leaves `handle()` empty.
    pub fn install(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!("Metrics recorder installed");
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus text format.
    ///
    /// Returns `None` if this recorder was not the one installed.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

fn register_metrics() {
    describe_counter!(
        "reservations_created_total",
        "Total number of reservations created"
    );
    describe_counter!(
        "reservations_rejected_total",
        "Total number of reservation attempts rejected, by reason"
    );
    describe_counter!(
        "reservations_cancelled_total",
        "Total number of reservations cancelled"
    );
    describe_counter!(
        "reservation_conflict_retries_total",
        "Total number of create attempts retried after contention"
    );
    describe_histogram!(
        "reservation_create_duration_seconds",
        "Time taken to create a reservation, retries included"
    );
}

/// Ledger metrics recorder.
pub struct LedgerMetrics;

impl LedgerMetrics {
    /// Record a successful create.
    pub fn record_created(duration: Duration) {
        counter!("reservations_created_total").increment(1);
        histogram!("reservation_create_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record a rejected create or cancel.
    pub fn record_rejected(error: &ReservationError) {
        counter!("reservations_rejected_total", "reason" => error.reason()).increment(1);
    }

    /// Record a successful cancel.
    pub fn record_cancelled() {
        counter!("reservations_cancelled_total").increment(1);
    }

    /// Record retries spent on a single create.
    pub fn record_retries(retries: u64) {
        if retries > 0 {
            counter!("reservation_conflict_retries_total").increment(retries);
        }
    }
}
