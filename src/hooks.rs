//! Process-wide request hook
//!
//! `handle()` is the hook the server installs in front of every request:
//! a single GitHub provider built from `GITHUB_ID` / `GITHUB_SECRET`.
//! It is created once by `init` and never replaced afterwards.

use std::sync::OnceLock;

use crate::auth::{self, AuthConfig, AuthHook};
use crate::config::{AppConfig, GitHubCredentials};
use crate::error::AppError;

static HANDLE: OnceLock<AuthHook> = OnceLock::new();

/// Build the hook from the process environment and install it.
///
/// # Errors
/// Fails if `GITHUB_ID` or `GITHUB_SECRET` is missing or empty, or the hook
/// cannot be built. Nothing is installed in that case.
pub fn init(config: &AppConfig) -> Result<&'static AuthHook, AppError> {
    if let Some(hook) = HANDLE.get() {
        return Ok(hook);
    }

    init_with(config, GitHubCredentials::from_env()?)
}

/// Build the hook from explicit credentials and install it.
///
/// Once a hook is installed later calls return it unchanged.
pub fn init_with(
    config: &AppConfig,
    credentials: GitHubCredentials,
) -> Result<&'static AuthHook, AppError> {
    if let Some(hook) = HANDLE.get() {
        return Ok(hook);
    }

    let hook = build(config, credentials)?;
    Ok(HANDLE.get_or_init(|| hook))
}

/// The installed hook, if `init` has run successfully.
pub fn handle() -> Option<&'static AuthHook> {
    HANDLE.get()
}

/// Wire the GitHub provider into a new hook without installing it.
pub fn build(config: &AppConfig, credentials: GitHubCredentials) -> Result<AuthHook, AppError> {
    let providers = vec![auth::github(credentials.into())];
    AuthHook::new(AuthConfig::new(providers, config))
}
