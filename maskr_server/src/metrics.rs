//! Prometheus metrics for monitoring the relay API.
//!
//! Metrics are exposed in Prometheus text format on a dedicated listener for
//! scraping. Without an installed exporter every recording call is a no-op.
//!
//! # Metrics Categories
//!
//! - **HTTP Metrics**: Request counts and duration by route and status
//! - **Auth Metrics**: Sign-in attempts, token refreshes and revocations
//! - **Rate Limiting Metrics**: Rejected requests per route
//! - **Lookup Metrics**: Mask resolutions by operation and outcome
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use maskr_server::metrics;
//! use std::net::SocketAddr;
//!
//! let addr: SocketAddr = "127.0.0.1:9090".parse().unwrap();
//! metrics::init_metrics(addr).unwrap();
//!
//! metrics::http_requests_total("POST", "/auth/signin/email", 200);
//! ```

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Initialize Prometheus metrics exporter.
///
/// Metrics will be available at `http://<addr>/metrics`. Must be called from
/// within a tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {}", e))
}

// ============================================================================
// HTTP Metrics
// ============================================================================

/// Record HTTP request.
pub fn http_requests_total(method: &str, path: &str, status: u16) {
    metrics::counter!("http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record HTTP request duration in milliseconds.
pub fn http_request_duration_ms(method: &str, path: &str, duration_ms: f64) {
    metrics::histogram!("http_request_duration_ms",
        "method" => method.to_string(),
        "path" => path.to_string()
    )
    .record(duration_ms);
}

// ============================================================================
// Auth Metrics
// ============================================================================

/// Increment login attempts counter.
pub fn login_attempts_total(method: &str, success: bool) {
    metrics::counter!("login_attempts_total",
        "method" => method.to_string(),
        "success" => success.to_string()
    )
    .increment(1);
}

/// Increment token refresh counter.
pub fn token_refreshes_total(success: bool) {
    metrics::counter!("token_refreshes_total",
        "success" => success.to_string()
    )
    .increment(1);
}

/// Increment token revocation counter.
pub fn token_revocations_total() {
    metrics::counter!("token_revocations_total").increment(1);
}

// ============================================================================
// Rate Limiting Metrics
// ============================================================================

/// Increment rate limit hits counter.
pub fn rate_limit_hits_total(endpoint: &str) {
    metrics::counter!("rate_limit_hits_total",
        "endpoint" => endpoint.to_string()
    )
    .increment(1);
}

// ============================================================================
// Lookup Metrics
// ============================================================================

/// Record a mask lookup call and its outcome (`ok`, `invalid`, `not_found`, `unavailable`).
pub fn mask_lookups_total(operation: &str, outcome: &str) {
    metrics::counter!("mask_lookups_total",
        "operation" => operation.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Set the number of cached allow-listed domains.
pub fn cached_domains(count: usize) {
    metrics::gauge!("cached_domains").set(count as f64);
}
