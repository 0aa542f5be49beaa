//! Configuration management
//!
//! Two sources feed the process at startup:
//!
//! - `AppConfig`: server, auth hook and logging settings, layered from
//!   defaults, `config/default.toml`, `config/local.toml` and `AUTH_HOOK__*`
//!   environment variables.
//! - `GitHubCredentials`: the OAuth client id/secret, read only from the
//!   `GITHUB_ID` and `GITHUB_SECRET` environment variables.

use serde::Deserialize;
use std::{collections::HashMap, fmt, net::IpAddr};

use crate::error::AppError;

/// Upper bound for `auth.session_max_age` and `auth.state_max_age` (10 years)
pub const MAX_AGE_LIMIT_SECS: i64 = 10 * 365 * 24 * 60 * 60;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub auth: AuthSettings,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 8080)
    pub port: u16,
    /// Public domain, optionally with port (e.g., "app.example.com")
    pub domain: String,
    /// Protocol ("http" or "https")
    pub protocol: String,
}

impl ServerConfig {
    /// Get the public base URL
    ///
    /// # Returns
    /// Full URL like "https://app.example.com"
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.protocol, self.domain)
    }
}

/// Auth hook settings
///
/// Provider credentials are deliberately absent: they come from
/// `GitHubCredentials`.
#[derive(Clone, Deserialize)]
pub struct AuthSettings {
    /// Session signing key (32+ bytes)
    pub secret: String,
    /// Session max age in seconds (default: 2592000 = 30 days)
    pub session_max_age: i64,
    /// Lifetime of the OAuth `state` cookie in seconds (default: 900)
    pub state_max_age: i64,
    /// URL prefix the hook serves its own routes under (default: "/auth")
    pub base_path: String,
}

impl fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSettings")
            .field("secret", &"[redacted]")
            .field("session_max_age", &self.session_max_age)
            .field("state_max_age", &self.state_max_age)
            .field("base_path", &self.base_path)
            .finish()
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (AUTH_HOOK__*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.domain", "localhost:8080")?
            .set_default("server.protocol", "http")?
            .set_default("auth.session_max_age", 2_592_000)?
            .set_default("auth.state_max_age", 900)?
            .set_default("auth.base_path", "/auth")?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            // Load from config/default.toml if it exists
            .add_source(File::with_name("config/default").required(false))
            // Load from config/local.toml if it exists (overrides default)
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables (AUTH_HOOK__*)
            .add_source(
                Environment::with_prefix("AUTH_HOOK")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    pub fn should_use_secure_cookies(&self) -> bool {
        self.server.protocol.eq_ignore_ascii_case("https")
            || !is_local_server_domain(&self.server.domain)
    }

    fn validate(&self) -> Result<(), AppError> {
        const MIN_SESSION_SECRET_BYTES: usize = 32;

        if self.auth.secret.as_bytes().len() < MIN_SESSION_SECRET_BYTES {
            return Err(AppError::Config(format!(
                "auth.secret must be at least {} bytes",
                MIN_SESSION_SECRET_BYTES
            )));
        }

        check_max_age("auth.session_max_age", self.auth.session_max_age)?;
        check_max_age("auth.state_max_age", self.auth.state_max_age)?;

        if !matches!(
            self.logging.level.to_ascii_lowercase().as_str(),
            "trace" | "debug" | "info" | "warn" | "error"
        ) {
            return Err(AppError::Config(format!(
                "logging.level must be one of trace, debug, info, warn, error (got {:?})",
                self.logging.level
            )));
        }

        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(AppError::Config(format!(
                "logging.format must be \"pretty\" or \"json\" (got {:?})",
                self.logging.format
            )));
        }

        let base_path = &self.auth.base_path;
        if !base_path.starts_with('/') || base_path.ends_with('/') || base_path.contains("//") {
            return Err(AppError::Config(format!(
                "auth.base_path must start with '/' and must not end with '/' (got {base_path:?})"
            )));
        }

        if self.should_use_secure_cookies() && !self.server.protocol.eq_ignore_ascii_case("https")
        {
            return Err(AppError::Config(
                "server.protocol must be https for non-local server domains".to_string(),
            ));
        }

        Ok(())
    }

    /// Warn about settings that are only acceptable during local development
    pub fn log_warnings(&self) {
        if !self.should_use_secure_cookies() {
            let host = normalized_server_host(&self.server.domain);
            tracing::warn!(
                host = %host,
                protocol = %self.server.protocol,
                "Using insecure session cookies for local development"
            );
        }
    }

    /// Default `EnvFilter` directives when `RUST_LOG` is unset
    pub fn log_filter(&self) -> String {
        format!(
            "github_auth_hook={},tower_http=debug",
            self.logging.level.to_ascii_lowercase()
        )
    }
}

/// Check a lifetime setting is within `1..=MAX_AGE_LIMIT_SECS`
pub(crate) fn check_max_age(name: &str, secs: i64) -> Result<(), AppError> {
    if secs <= 0 {
        return Err(AppError::Config(format!("{name} must be greater than 0")));
    }

    if secs > MAX_AGE_LIMIT_SECS {
        return Err(AppError::Config(format!(
            "{name} must not exceed {MAX_AGE_LIMIT_SECS} seconds"
        )));
    }

    Ok(())
}

/// GitHub OAuth client credentials
///
/// Read from `GITHUB_ID` / `GITHUB_SECRET`. Both are required and must be
/// non-blank; there is no fallback.
#[derive(Clone, PartialEq, Eq)]
pub struct GitHubCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl fmt::Debug for GitHubCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[redacted]")
            .finish()
    }
}

impl GitHubCredentials {
    const ENV_PREFIX: &'static str = "GITHUB";

    /// Read credentials from the process environment.
    ///
    /// # Errors
    /// Returns `AppError::Config` naming the variable that is missing or empty.
    pub fn from_env() -> Result<Self, AppError> {
        Self::load(None)
    }

    /// Read credentials from an explicit variable map instead of the
    /// process environment. Keys are full variable names (`GITHUB_ID`).
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self, AppError> {
        Self::load(Some(vars))
    }

    fn load(vars: Option<HashMap<String, String>>) -> Result<Self, AppError> {
        use config::{Config, Environment};

        let config = Config::builder()
            .add_source(Environment::with_prefix(Self::ENV_PREFIX).source(vars))
            .build()?;

        let client_id = required_var(&config, "id")?;
        let client_secret = required_var(&config, "secret")?;

        tracing::debug!(client_id = %client_id, "GitHub credentials loaded");

        Ok(Self {
            client_id,
            client_secret,
        })
    }
}

fn required_var(config: &config::Config, key: &str) -> Result<String, AppError> {
    let var = format!("{}_{}", GitHubCredentials::ENV_PREFIX, key.to_ascii_uppercase());
    let value = config
        .get_string(key)
        .map_err(|_| AppError::Config(format!("{var} must be set")))?;

    if value.trim().is_empty() {
        return Err(AppError::Config(format!("{var} must not be empty")));
    }

    Ok(value)
}

fn normalized_server_host(domain: &str) -> String {
    let trimmed = domain.trim();
    let parsed_host = url::Url::parse(&format!("http://{trimmed}"))
        .ok()
        .and_then(|url| url.host_str().map(|host| host.to_string()));
    let host = parsed_host.unwrap_or_else(|| trimmed.to_string());
    host.trim_end_matches('.').to_ascii_lowercase()
}

fn is_local_server_domain(domain: &str) -> bool {
    let host = normalized_server_host(domain);
    if host == "localhost" || host.ends_with(".localhost") {
        return true;
    }

    // Url keeps IPv6 hosts bracketed
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if let Ok(ip) = host.parse::<IpAddr>() {
        return ip.is_loopback() || ip.is_unspecified();
    }

    false
}
