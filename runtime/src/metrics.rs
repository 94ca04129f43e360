//! Prometheus metrics for the store runtime.
//!
//! Installs the global Prometheus recorder and describes the metrics the
//! [`Store`](crate::Store) emits. Application crates register their own
//! business metrics on top of the same recorder.
//!
//! # Example
//!
//! ```rust,no_run
//! use storefront_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//! let body = server.render();
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use thiserror::Error;

// Re-export metrics macros for use in other modules
pub use metrics::{counter, gauge, histogram};

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

/// Prometheus metrics recorder and renderer.
///
/// The rendered text is served by the application's `/metrics` route.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server for the given advertised address.
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed. A recorder
    /// that is already installed (common in tests) is not an error.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_store_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[
                    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
                ],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!(addr = %self.addr, "Metrics recorder installed");
                Ok(())
            },
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            },
        }
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if this instance did not install the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Describe the metrics emitted by the store.
fn register_store_metrics() {
    describe_counter!("store.commands.total", "Actions sent to a store");
    describe_histogram!(
        "store.reducer.duration_seconds",
        "Time spent inside the reducer per action"
    );
    describe_histogram!("store.effects.count", "Effects returned per action");
    describe_counter!("store.effects.executed", "Effects executed, labelled by type");
    describe_counter!(
        "store.shutdown.rejected_actions",
        "Actions rejected because the store was shutting down"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_server_has_no_handle() {
        let server = MetricsServer::new(SocketAddr::from(([127, 0, 0, 1], 0)));
        assert!(server.handle().is_none());
        assert!(server.render().is_none());
    }

    #[test]
    fn start_is_tolerant_of_existing_recorder() {
        let mut first = MetricsServer::new(SocketAddr::from(([127, 0, 0, 1], 0)));
        let mut second = MetricsServer::new(SocketAddr::from(([127, 0, 0, 1], 0)));
        assert!(first.start().is_ok());
        assert!(second.start().is_ok());
    }
}
