//! Prometheus metrics for the booking lifecycle.
//!
//! Counters recorded by the service and stores:
//!
//! - `bookings_created_total`
//! - `payments_initiated_total`
//! - `payments_confirmed_total`
//! - `payment_confirmations_replayed_total`
//! - `booking_store_index_reconciliations_total{outcome}`
//!
//! # Example
//!
//! ```rust,no_run
//! use boxoffice::metrics::MetricsServer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//!
//! // Metrics available at http://localhost:9090/metrics
//! # Ok(())
//! # }
//! ```

use metrics::describe_counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use thiserror::Error;

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build the exporter or bind its listener
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install the global recorder
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus metrics server.
///
/// Exposes metrics on an HTTP endpoint for Prometheus scraping.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server bound to `addr` once started.
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Install the global recorder and spawn the HTTP listener.
    ///
    /// Must be called from within a Tokio runtime. If a recorder is already
    /// installed (e.g. a second server in tests) this logs a warning and
    /// returns `Ok`.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::Build`] if the listener cannot be bound, or
    /// [`MetricsError::Install`] if the recorder cannot be installed.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        let (recorder, exporter) = PrometheusBuilder::new()
            .with_http_listener(self.addr)
            .build()
            .map_err(|e| MetricsError::Build(e.to_string()))?;
        let handle = recorder.handle();

        if let Err(e) = metrics::set_global_recorder(recorder) {
            let err_msg = e.to_string();
            if err_msg.contains("already initialized") {
                tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                return Ok(());
            }
            return Err(MetricsError::Install(err_msg));
        }

        register_metrics();
        tokio::spawn(async move {
            if exporter.await.is_err() {
                tracing::error!("Metrics exporter stopped");
            }
        });

        self.handle = Some(handle);
        tracing::info!(addr = %self.addr, "Metrics server started - available at http://{}/metrics", self.addr);
        Ok(())
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if the server hasn't been started.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register descriptions for every counter this crate records.
pub fn register_metrics() {
    describe_counter!("bookings_created_total", "Total number of bookings created");
    describe_counter!(
        "payments_initiated_total",
        "Payment references attached to unpaid bookings"
    );
    describe_counter!(
        "payments_confirmed_total",
        "Bookings flipped to paid by a confirmation"
    );
    describe_counter!(
        "payment_confirmations_replayed_total",
        "Confirmations for bookings that were already paid"
    );
    describe_counter!(
        "booking_store_index_reconciliations_total",
        "Startup reconciliations of the payment reference index, by outcome"
    );
}
