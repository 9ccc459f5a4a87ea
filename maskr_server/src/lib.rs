//! HTTP and mask lookup server for the maskr email relay.
//!
//! The binary in `main.rs` wires configuration, the PostgreSQL store and the
//! library managers into two axum listeners: the public API and the internal
//! mask lookup surface.

pub mod api;
pub mod config;
pub mod logging;
pub mod metrics;
