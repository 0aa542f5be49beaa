//! github-auth-hook binary entry point

use github_auth_hook::{AppState, config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application entry point
///
/// # Setup
/// 1. Load configuration from file and environment
/// 2. Initialize tracing/logging from the logging settings
/// 3. Initialize metrics
/// 4. Build the auth hook (fails fast without GitHub credentials)
/// 5. Build Axum router
/// 6. Start HTTP server
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration
    let config = config::AppConfig::load()?;

    // 2. Initialize tracing/logging (RUST_LOG overrides logging.level)
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.log_filter().into());

    if config.logging.format == "json" {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }

    tracing::info!("Starting github-auth-hook...");
    tracing::info!(
        domain = %config.server.domain,
        protocol = %config.server.protocol,
        "Configuration loaded"
    );
    config.log_warnings();

    // 3. Initialize metrics
    github_auth_hook::metrics::init_metrics();

    // 4. Initialize application state (installs the auth hook)
    let state = AppState::new(config.clone()).inspect_err(|error| {
        tracing::error!(%error, "Failed to initialize auth hook");
    })?;
    tracing::info!(
        base_path = %state.auth.base_path(),
        providers = state.auth.providers().count(),
        "Auth hook initialized"
    );

    // 5. Build Axum router
    let app = github_auth_hook::build_router(state);

    // 6. Start HTTP server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);
    tracing::info!("Public URL: {}", config.server.base_url());

    axum::serve(listener, app).await?;

    Ok(())
}
