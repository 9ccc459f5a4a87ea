//! Structured logging configuration.
//!
//! Request correlation and security event tracking on top of `tracing`. Records
//! emitted by the library through the `log` facade are bridged into the same
//! subscriber.

use maskr::UserId;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize structured logging
///
/// Log levels come from `RUST_LOG` (default `info,sqlx=warn,hyper=warn`).
/// Calling it twice is harmless; the second call leaves the first subscriber in place.
///
/// # Example
///
/// ```no_run
/// use maskr_server::logging;
///
/// #[tokio::main]
/// async fn main() {
///     logging::init();
///     tracing::info!("Server starting");
/// }
/// ```
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,hyper=warn"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    if tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .is_ok()
    {
        tracing::info!("Structured logging initialized");
    }
}

/// Log security event with structured data
///
/// # Arguments
///
/// * `event_type` - Type of security event (`rate_limited`, `token_revoked`, ...)
/// * `user_id` - Optional user ID
/// * `identity` - Optional client identity (IP address or email)
/// * `message` - Event message
///
/// # Example
///
/// ```
/// use maskr_server::logging::log_security_event;
///
/// log_security_event(
///     "rate_limited",
///     None,
///     Some("192.168.1.1"),
///     "Too many sign-in attempts"
/// );
/// ```
pub fn log_security_event(
    event_type: &str,
    user_id: Option<UserId>,
    identity: Option<&str>,
    message: &str,
) {
    tracing::warn!(
        event_type = event_type,
        user_id = user_id.map(|id| id.to_string()),
        identity = identity,
        "SECURITY: {}",
        message
    );
}

/// Log API request/response
///
/// # Arguments
///
/// * `method` - HTTP method
/// * `path` - Request path
/// * `status_code` - Response status code
/// * `duration_ms` - Request duration in milliseconds
pub fn log_api_request(method: &str, path: &str, status_code: u16, duration_ms: u64) {
    if status_code >= 500 {
        tracing::error!(
            http_method = method,
            http_path = path,
            http_status = status_code,
            duration_ms = duration_ms,
            "API request failed"
        );
    } else {
        tracing::info!(
            http_method = method,
            http_path = path,
            http_status = status_code,
            duration_ms = duration_ms,
            "API request completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_security_event() {
        // Just ensure it doesn't panic
        log_security_event(
            "token_revoked",
            Some(uuid::Uuid::new_v4()),
            Some("127.0.0.1"),
            "Revoked token presented",
        );
        log_security_event("rate_limited", None, None, "Blocked");
    }

    #[test]
    fn test_log_api_request() {
        log_api_request("GET", "/masks", 200, 45);
        log_api_request("POST", "/auth/signin/email", 500, 120);
    }

    #[test]
    fn test_init_twice() {
        init();
        init();
    }
}
