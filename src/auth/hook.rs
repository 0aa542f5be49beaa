//! Authentication hook
//!
//! `AuthHook::new` is the factory: it takes an ordered list of provider
//! descriptors plus hook settings and returns a request hook. Applied as an
//! axum middleware (`handle_request`), the hook serves every request under
//! its base path itself and hands all other requests to the application,
//! after attaching the caller's `Session` to the request extensions.

use std::{collections::HashSet, sync::Arc};

use axum::{
    Router,
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;
use oauth2::{
    AuthUrl, ClientId, ClientSecret, EndpointNotSet, EndpointSet, RedirectUrl, TokenUrl,
    basic::BasicClient,
};
use tower::ServiceExt;
use url::Url;

use super::cookies::AuthCookies;
use super::provider::Provider;
use super::session::{Session, verify_session_token};
use crate::config::{AppConfig, check_max_age};
use crate::error::AppError;

// Avoid oauth2 type madness
pub(crate) type OAuthClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Configuration handed to the hook factory
#[derive(Clone)]
pub struct AuthConfig {
    /// Identity providers, in the order they are offered to users
    pub providers: Vec<Provider>,
    /// Session signing key
    pub secret: String,
    /// Public origin of the application (e.g. "https://app.example.com")
    pub base_url: String,
    /// URL prefix of the hook's own routes (e.g. "/auth")
    pub base_path: String,
    /// Session lifetime in seconds
    pub session_max_age: i64,
    /// OAuth `state` cookie lifetime in seconds
    pub state_max_age: i64,
    /// Mark cookies `Secure` and prefix them with `__Secure-`
    pub secure_cookies: bool,
}

impl AuthConfig {
    /// Combine providers with the hook settings from the application config
    pub fn new(providers: Vec<Provider>, config: &AppConfig) -> Self {
        Self {
            providers,
            secret: config.auth.secret.clone(),
            base_url: config.server.base_url(),
            base_path: config.auth.base_path.clone(),
            session_max_age: config.auth.session_max_age,
            state_max_age: config.auth.state_max_age,
            secure_cookies: config.should_use_secure_cookies(),
        }
    }
}

/// A provider together with its ready-to-use OAuth client
pub(crate) struct ConfiguredProvider {
    pub descriptor: Provider,
    pub client: OAuthClient,
    pub signin_url: String,
    pub callback_url: String,
}

/// Immutable state shared by every request the hook handles
pub(crate) struct HookState {
    pub providers: Vec<ConfiguredProvider>,
    pub secret: String,
    pub base_url: Url,
    pub base_path: String,
    pub session_max_age: i64,
    pub state_max_age: i64,
    pub cookies: AuthCookies,
    pub http_client: reqwest::Client,
}

impl HookState {
    pub fn provider(&self, id: &str) -> Option<&ConfiguredProvider> {
        self.providers.iter().find(|p| p.descriptor.id == id)
    }

    pub fn route(&self, suffix: &str) -> String {
        format!("{}{}", self.base_path, suffix)
    }

    /// Resolve the session carried by a request, if any
    ///
    /// Accepts the session cookie or an `Authorization: Bearer` header
    /// holding a session token. Invalid or expired tokens yield `None`.
    pub fn session_from_headers(&self, headers: &HeaderMap) -> Option<Session> {
        let token = headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(ToOwned::to_owned)
            .or_else(|| {
                let jar = CookieJar::from_headers(headers);
                jar.get(self.cookies.session_name())
                    .map(|cookie| cookie.value().to_owned())
            })?;

        match verify_session_token(&token, &self.secret) {
            Ok(session) => Some(session),
            Err(error) => {
                tracing::debug!(%error, "Ignoring invalid session token");
                None
            }
        }
    }

    /// Accept a post-sign-in redirect target only if it stays on this site
    pub fn sanitize_callback_url(&self, raw: &str) -> Option<String> {
        if raw.starts_with('/') {
            if raw.starts_with("//") || raw.starts_with("/\\") {
                return None;
            }
            return Some(raw.to_string());
        }

        let target = Url::parse(raw).ok()?;
        (target.origin() == self.base_url.origin()).then(|| target.to_string())
    }
}

/// The request hook produced by the factory
///
/// Cheap to clone; clones share one underlying instance.
#[derive(Clone)]
pub struct AuthHook {
    state: Arc<HookState>,
    router: Router,
}

impl std::fmt::Debug for AuthHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthHook")
            .field("base_path", &self.state.base_path)
            .field(
                "providers",
                &self
                    .state
                    .providers
                    .iter()
                    .map(|p| p.descriptor.id.as_str())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl AuthHook {
    /// Build the hook from its configuration
    ///
    /// # Errors
    /// Returns `AppError::Config` if there are no providers, a provider
    /// descriptor is invalid, two providers share an id, a lifetime is out
    /// of range, or the secret or base URL is unusable.
    pub fn new(config: AuthConfig) -> Result<Self, AppError> {
        if config.providers.is_empty() {
            return Err(AppError::Config(
                "at least one auth provider must be configured".to_string(),
            ));
        }

        if config.secret.is_empty() {
            return Err(AppError::Config("auth secret must not be empty".to_string()));
        }

        check_max_age("session max age", config.session_max_age)?;
        check_max_age("state max age", config.state_max_age)?;

        let base_url = Url::parse(&config.base_url).map_err(|e| {
            AppError::Config(format!("invalid base URL {:?}: {e}", config.base_url))
        })?;
        let origin = config.base_url.trim_end_matches('/');

        let mut seen = HashSet::new();
        let mut providers = Vec::with_capacity(config.providers.len());
        for descriptor in config.providers {
            descriptor.validate()?;
            if !seen.insert(descriptor.id.clone()) {
                return Err(AppError::Config(format!(
                    "duplicate auth provider id '{}'",
                    descriptor.id
                )));
            }

            let signin_url = format!("{origin}{}/signin/{}", config.base_path, descriptor.id);
            let callback_url = format!("{origin}{}/callback/{}", config.base_path, descriptor.id);
            let client = oauth_client(&descriptor, &callback_url)?;

            tracing::info!(
                provider = %descriptor.id,
                callback_url = %callback_url,
                "Auth provider configured"
            );

            providers.push(ConfiguredProvider {
                descriptor,
                client,
                signin_url,
                callback_url,
            });
        }

        let http_client = reqwest::Client::builder()
            .user_agent(concat!("github-auth-hook/", env!("CARGO_PKG_VERSION")))
            .redirect(reqwest::redirect::Policy::none())
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        let state = Arc::new(HookState {
            providers,
            secret: config.secret,
            base_url,
            base_path: config.base_path,
            session_max_age: config.session_max_age,
            state_max_age: config.state_max_age,
            cookies: AuthCookies::new(config.secure_cookies),
            http_client,
        });
        let router = super::routes::hook_router(state.clone());

        Ok(Self { state, router })
    }

    /// Descriptors the hook was built with, in configuration order
    pub fn providers(&self) -> impl Iterator<Item = &Provider> {
        self.state.providers.iter().map(|p| &p.descriptor)
    }

    pub fn base_path(&self) -> &str {
        &self.state.base_path
    }

    /// Whether `path` is served by the hook rather than the application
    pub fn owns(&self, path: &str) -> bool {
        path == self.state.base_path
            || path
                .strip_prefix(self.state.base_path.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
    }

    /// Resolve the session carried by a request, if any
    pub fn session(&self, headers: &HeaderMap) -> Option<Session> {
        self.state.session_from_headers(headers)
    }

    /// Whether two handles refer to the same hook instance
    pub fn same_instance(&self, other: &AuthHook) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}

fn oauth_client(provider: &Provider, callback_url: &str) -> Result<OAuthClient, AppError> {
    let invalid = |what: &str, e: url::ParseError| {
        AppError::Config(format!(
            "Invalid {what} URL for provider '{}': {e}",
            provider.id
        ))
    };

    let auth_url =
        AuthUrl::new(provider.authorization_url.clone()).map_err(|e| invalid("authorization", e))?;
    let token_url = TokenUrl::new(provider.token_url.clone()).map_err(|e| invalid("token", e))?;
    let redirect_url =
        RedirectUrl::new(callback_url.to_string()).map_err(|e| invalid("redirect", e))?;

    Ok(BasicClient::new(ClientId::new(provider.client_id.clone()))
        .set_client_secret(ClientSecret::new(provider.client_secret().to_string()))
        .set_auth_uri(auth_url)
        .set_token_uri(token_url)
        .set_redirect_uri(redirect_url))
}

/// Middleware entry point of the hook
///
/// # Usage
/// ```ignore
/// let app = Router::new()
///     .route("/", get(home))
///     .fallback(not_found)
///     .layer(middleware::from_fn_with_state(hook, handle_request));
/// ```
pub async fn handle_request(
    State(hook): State<AuthHook>,
    mut request: Request,
    next: Next,
) -> Response {
    if hook.owns(request.uri().path()) {
        let response = hook.router.clone().oneshot(request).await;
        return match response {
            Ok(response) => response,
            Err(never) => match never {},
        };
    }

    if let Some(session) = hook.session(request.headers()) {
        request.extensions_mut().insert(session);
    }

    next.run(request).await
}
