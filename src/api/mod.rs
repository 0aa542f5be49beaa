//! API layer
//!
//! HTTP handlers for:
//! - Application pages behind the auth hook
//! - Metrics (Prometheus)

pub mod metrics;
mod pages;

pub use metrics::metrics_router;
pub use pages::pages_router;
