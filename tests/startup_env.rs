//! Startup refuses to install a hook without GitHub credentials in the
//! process environment. Kept in its own binary since it mutates the
//! environment and relies on no hook being installed yet.

mod common;

use common::test_config;
use github_auth_hook::{AppState, error::AppError, hooks};

#[test]
fn test_startup_without_github_id_installs_no_hook() {
    // SAFETY: this binary runs a single test, so no other thread reads the
    // environment concurrently.
    unsafe {
        std::env::remove_var("GITHUB_ID");
        std::env::set_var("GITHUB_SECRET", "xyz");
    }

    let result = hooks::init(&test_config());
    assert!(matches!(
        result,
        Err(AppError::Config(ref message)) if message == "GITHUB_ID must be set"
    ));
    assert!(hooks::handle().is_none());

    let state = AppState::new(test_config());
    assert!(matches!(state, Err(AppError::Config(_))));
    assert!(hooks::handle().is_none());
}
