//! OAuth authentication hook
//!
//! Handles:
//! - Provider descriptors (GitHub)
//! - The auth hook factory and its request handling
//! - Session management
//! - Authentication extractors and guards

mod cookies;
mod hook;
mod middleware;
pub mod provider;
mod routes;
pub mod session;

pub use hook::{AuthConfig, AuthHook, handle_request};
pub use middleware::{CurrentUser, MaybeUser, require_auth};
pub use provider::{GitHubOptions, Provider, ProviderKind, github};
pub use session::{Session, User, create_session_token, verify_session_token};
