//! Ambient logging and metrics setup, matching the teacher workspace's
//! `cli/src/main.rs` tracing bootstrap and `agent-a2a/src/main.rs`'s Prometheus
//! text handler.

pub mod metrics_names;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Install the global `tracing` subscriber: env-filtered, formatted to
/// stdout. Call once from the `api` binary's `main`.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .try_init();
}

/// Install the process-wide Prometheus recorder and return a handle whose
/// `render()` produces the exposition-format text body for the admin
/// `/metrics` route.
pub fn init_metrics() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("installing the global metrics recorder must succeed exactly once at startup")
}
