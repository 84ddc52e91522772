//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define server metrics (connections, dispatch latency, module roster)
//! - Expose Prometheus-compatible metrics endpoint
//! - Keep metric names and labels in one place
//!
//! # Metrics
//! - `server_connections_total` (counter): connections accepted
//! - `server_connections_closed_total` (counter): connections closed, by outcome
//! - `server_connections_active` (gauge): currently open connections
//! - `server_dispatch_total` (counter): dispatch chains run, by surface and outcome
//! - `server_dispatch_duration_seconds` (histogram): dispatch chain latency
//! - `server_module_installs_total` (counter): install attempts, by outcome
//! - `server_modules_active` (gauge): modules currently installed
//! - `server_pipeline_bytes_total` (counter): payload bytes processed by the line
//!
//! # Design Decisions
//! - Low-overhead metric updates (atomic operations behind the recorder)
//! - Labels carry surface (`line`/`server`) and outcome, never module names,
//!   to keep cardinality bounded regardless of roster size

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter and register metric descriptions.
///
/// Failure to bind the exporter is logged and otherwise ignored so a
/// busy metrics port never takes the server down with it.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => {
            describe();
            tracing::info!(address = %addr, "Metrics exporter listening");
        }
        Err(error) => {
            tracing::error!(address = %addr, error = %error, "Failed to install metrics exporter");
        }
    }
}

fn describe() {
    metrics::describe_counter!("server_connections_total", "Connections accepted");
    metrics::describe_counter!(
        "server_connections_closed_total",
        "Connections closed, by outcome"
    );
    metrics::describe_gauge!("server_connections_active", "Currently open connections");
    metrics::describe_counter!(
        "server_dispatch_total",
        "Dispatch chains run, by surface and outcome"
    );
    metrics::describe_histogram!(
        "server_dispatch_duration_seconds",
        "Latency of a full dispatch chain"
    );
    metrics::describe_counter!("server_module_installs_total", "Install attempts, by outcome");
    metrics::describe_gauge!("server_modules_active", "Modules currently installed");
    metrics::describe_counter!(
        "server_pipeline_bytes_total",
        "Payload bytes processed by the execution line"
    );
}

/// Record one accepted connection.
pub fn record_connection_opened() {
    metrics::counter!("server_connections_total").increment(1);
    metrics::gauge!("server_connections_active").increment(1.0);
}

/// Record one closed connection. `outcome` is `ok` or `aborted`.
pub fn record_connection_closed(outcome: &'static str) {
    metrics::gauge!("server_connections_active").decrement(1.0);
    metrics::counter!("server_connections_closed_total", "outcome" => outcome).increment(1);
}

/// Record a completed dispatch chain on one of the two surfaces.
pub fn record_dispatch(surface: &'static str, outcome: &'static str, started: Instant) {
    let elapsed = started.elapsed().as_secs_f64();
    metrics::counter!("server_dispatch_total", "surface" => surface, "outcome" => outcome)
        .increment(1);
    metrics::histogram!(
        "server_dispatch_duration_seconds",
        "surface" => surface,
        "outcome" => outcome
    )
    .record(elapsed);
}

/// Record one module install attempt.
pub fn record_module_install(outcome: &'static str) {
    metrics::counter!("server_module_installs_total", "outcome" => outcome).increment(1);
}

/// Record the current installed-module count.
pub fn record_modules_active(count: usize) {
    metrics::gauge!("server_modules_active").set(count as f64);
}

/// Record payload bytes flowing through the execution line.
pub fn record_pipeline_bytes(count: u64) {
    metrics::counter!("server_pipeline_bytes_total").increment(count);
}
