//! Metrics collection and exposition.
//!
//! # Metrics
//! - `lb_requests_total` (counter): requests by method, status, backend
//! - `lb_request_duration_seconds` (histogram): latency by method, backend
//! - `lb_no_available_node_total` (counter): selections that found no live node
//! - `lb_affinity_hits_total` (counter): requests routed by the session cookie
//! - `lb_backend_alive` / `lb_backend_unhealthy` (gauge): 1 or 0 per backend
//! - `lb_backend_weight` (gauge): current ordering weight per backend

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Instant;

use crate::load_balancer::Node;

/// Install the Prometheus recorder and its scrape endpoint.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, backend: &str, start_time: Instant) {
    counter!(
        "lb_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "backend" => backend.to_string()
    )
    .increment(1);

    histogram!(
        "lb_request_duration_seconds",
        "method" => method.to_string(),
        "backend" => backend.to_string()
    )
    .record(start_time.elapsed().as_secs_f64());
}

pub fn record_no_available_node() {
    counter!("lb_no_available_node_total").increment(1);
}

pub fn record_affinity_hit() {
    counter!("lb_affinity_hits_total").increment(1);
}

pub fn record_node_health(node: &Node) {
    let backend = node.address().to_string();
    gauge!("lb_backend_alive", "backend" => backend.clone()).set(flag(node.is_alive()));
    gauge!("lb_backend_unhealthy", "backend" => backend.clone()).set(flag(node.is_unhealthy()));
    gauge!("lb_backend_weight", "backend" => backend).set(node.weight());
}

fn flag(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}
