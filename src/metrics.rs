//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use lazy_static::lazy_static;
use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Auth hook metrics
    pub static ref AUTH_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("auth_hook_requests_total", "Total number of requests served by the auth hook"),
        &["action"]
    ).expect("metric can be created");
    pub static ref AUTH_SIGNINS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("auth_hook_signins_total", "Total number of completed sign-in attempts"),
        &["provider", "status"]
    ).expect("metric can be created");
    pub static ref AUTH_SIGNOUTS_TOTAL: IntCounter = IntCounter::new(
        "auth_hook_signouts_total",
        "Total number of sign-outs"
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("auth_hook_errors_total", "Total number of errors"),
        &["error_type"]
    ).expect("metric can be created");
}

/// Initialize metrics registry.
pub fn init_metrics() {
    REGISTRY
        .register(Box::new(AUTH_REQUESTS_TOTAL.clone()))
        .expect("AUTH_REQUESTS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(AUTH_SIGNINS_TOTAL.clone()))
        .expect("AUTH_SIGNINS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(AUTH_SIGNOUTS_TOTAL.clone()))
        .expect("AUTH_SIGNOUTS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(ERRORS_TOTAL.clone()))
        .expect("ERRORS_TOTAL can be registered");

    tracing::info!("Metrics registry initialized");
}
