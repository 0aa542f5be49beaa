//! github-auth-hook - GitHub OAuth authentication hook for axum
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Auth Hook (middleware)                    │
//! │  - Serves /auth/* (sign in, callback, session, sign out)    │
//! │  - Attaches the verified session to every other request     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      API Layer (Axum)                        │
//! │  - Application pages                                        │
//! │  - Health check, metrics (signed-in only)                   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `hooks`: the process-wide hook, wired to GitHub from the environment
//! - `auth`: provider descriptors, hook factory, sessions, extractors
//! - `api`: HTTP handlers behind the hook
//! - `config`: Configuration management
//! - `error`: Error types

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod hooks;
pub mod metrics;

use std::sync::Arc;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Auth hook in front of every request
    pub auth: auth::AuthHook,
}

impl AppState {
    /// Initialize application state with the process-wide hook
    ///
    /// # Errors
    /// Returns error if the GitHub credentials are missing or the hook
    /// cannot be built
    pub fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        let auth = hooks::init(&config)?.clone();
        Ok(Self::with_hook(config, auth))
    }

    /// Initialize application state around an already built hook
    pub fn with_hook(config: config::AppConfig, auth: auth::AuthHook) -> Self {
        Self {
            config: Arc::new(config),
            auth,
        }
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::{Router, middleware};
    use tower_http::{compression::CompressionLayer, trace::TraceLayer};

    let cors_layer = build_cors_layer(&state.config.server);

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .merge(api::pages_router())
        .merge(
            api::metrics_router::<AppState>()
                .route_layer(middleware::from_fn(auth::require_auth)),
        )
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(
            state.auth.clone(),
            auth::handle_request,
        ))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
}

fn build_cors_layer(server: &config::ServerConfig) -> tower_http::cors::CorsLayer {
    use axum::http::HeaderValue;
    use tower_http::cors::{Any, CorsLayer};

    if !server.protocol.eq_ignore_ascii_case("https") {
        return CorsLayer::permissive();
    }

    let allowed_origin = server.base_url();
    match HeaderValue::from_str(&allowed_origin) {
        Ok(origin) => CorsLayer::new()
            .allow_origin([origin])
            .allow_methods(Any)
            .allow_headers(Any),
        Err(error) => {
            tracing::error!(
                %error,
                origin = %allowed_origin,
                "Failed to parse CORS origin from server base URL; denying cross-origin requests"
            );
            CorsLayer::new().allow_methods(Any).allow_headers(Any)
        }
    }
}

async fn health_check() -> &'static str {
    "OK"
}

async fn not_found() -> error::AppError {
    error::AppError::NotFound
}
