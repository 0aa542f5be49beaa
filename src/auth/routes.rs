//! Routes served by the auth hook
//!
//! Routes (relative to the hook's base path):
//! - GET /providers - Configured providers as JSON
//! - GET /signin - Sign-in page
//! - GET|POST /signin/:provider - Redirect to the provider
//! - GET /callback/:provider - OAuth callback
//! - GET /session - Current session as JSON (`null` when signed out)
//! - GET /signout - Sign-out confirmation page
//! - POST /signout - Sign out
//! - GET /error - Error page

use std::{collections::BTreeMap, sync::Arc};

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
};
use axum_extra::extract::CookieJar;
use oauth2::{AuthorizationCode, CsrfToken, Scope, TokenResponse};
use serde::{Deserialize, Serialize};

use super::hook::{ConfiguredProvider, HookState};
use super::provider::{ProviderEmail, ProviderKind, select_email};
use super::session::{Session, User, create_session_token};
use crate::error::AppError;
use crate::metrics::{AUTH_REQUESTS_TOTAL, AUTH_SIGNINS_TOTAL, AUTH_SIGNOUTS_TOTAL};

type HookRef = Arc<HookState>;

/// Create the hook's internal router
pub(crate) fn hook_router(state: HookRef) -> Router {
    let base = state.base_path.clone();
    let path = |suffix: &str| format!("{base}{suffix}");

    Router::new()
        .route(&path("/providers"), get(providers))
        .route(&path("/signin"), get(signin_page))
        .route(&path("/signin/:provider"), get(signin).post(signin))
        .route(&path("/callback/:provider"), get(callback))
        .route(&path("/session"), get(session))
        .route(&path("/signout"), get(signout_page).post(signout))
        .route(&path("/error"), get(error_page))
        .fallback(not_found)
        .with_state(state)
}

// =============================================================================
// Providers
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProviderSummary {
    id: String,
    name: String,
    #[serde(rename = "type")]
    kind: ProviderKind,
    signin_url: String,
    callback_url: String,
}

/// GET /providers
async fn providers(State(hook): State<HookRef>) -> Json<BTreeMap<String, ProviderSummary>> {
    AUTH_REQUESTS_TOTAL.with_label_values(&["providers"]).inc();

    let summaries = hook
        .providers
        .iter()
        .map(|p| {
            (
                p.descriptor.id.clone(),
                ProviderSummary {
                    id: p.descriptor.id.clone(),
                    name: p.descriptor.name.clone(),
                    kind: p.descriptor.kind,
                    signin_url: p.signin_url.clone(),
                    callback_url: p.callback_url.clone(),
                },
            )
        })
        .collect();

    Json(summaries)
}

// =============================================================================
// Sign in
// =============================================================================

#[derive(Debug, Deserialize)]
struct SignInQuery {
    #[serde(rename = "callbackUrl")]
    callback_url: Option<String>,
}

/// GET /signin
///
/// Renders one sign-in link per configured provider.
async fn signin_page(
    State(hook): State<HookRef>,
    Query(query): Query<SignInQuery>,
) -> impl IntoResponse {
    AUTH_REQUESTS_TOTAL.with_label_values(&["signin_page"]).inc();

    let suffix = query
        .callback_url
        .as_deref()
        .and_then(|raw| hook.sanitize_callback_url(raw))
        .map(|target| {
            let encoded: String = url::form_urlencoded::byte_serialize(target.as_bytes()).collect();
            format!("?callbackUrl={encoded}")
        })
        .unwrap_or_default();

    let links: String = hook
        .providers
        .iter()
        .map(|p| {
            let href = format!("{}{}", hook.route(&format!("/signin/{}", p.descriptor.id)), suffix);
            format!(
                "<li><a href=\"{}\">Sign in with {}</a></li>",
                html_escape::encode_double_quoted_attribute(&href),
                html_escape::encode_text(&p.descriptor.name),
            )
        })
        .collect();

    Html(format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Sign in</title></head>
<body>
    <h1>Sign in</h1>
    <ul>{links}</ul>
</body>
</html>
"#
    ))
}

/// GET|POST /signin/:provider
///
/// Redirects the user to the provider's authorization page.
///
/// # Steps
/// 1. Generate CSRF state token
/// 2. Store state (and the optional callback URL) in cookies
/// 3. Redirect to the provider with client_id, redirect_uri, scope, state
async fn signin(
    State(hook): State<HookRef>,
    Path(provider_id): Path<String>,
    Query(query): Query<SignInQuery>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    AUTH_REQUESTS_TOTAL.with_label_values(&["signin"]).inc();

    let provider = hook.provider(&provider_id).ok_or(AppError::NotFound)?;

    let (authorize_url, csrf_state) = provider
        .client
        .authorize_url(CsrfToken::new_random)
        .add_scopes(provider.descriptor.scopes.iter().cloned().map(Scope::new))
        .url();

    let mut jar = jar.add(
        hook.cookies
            .state(csrf_state.secret().clone(), hook.state_max_age),
    );
    if let Some(target) = query
        .callback_url
        .as_deref()
        .and_then(|raw| hook.sanitize_callback_url(raw))
    {
        jar = jar.add(hook.cookies.callback_url(target, hook.state_max_age));
    }

    tracing::debug!(provider = %provider_id, "Redirecting to provider authorization page");

    Ok((jar, Redirect::to(authorize_url.as_str())))
}

// =============================================================================
// Callback
// =============================================================================

/// Query parameters from the provider callback
#[derive(Debug, Deserialize)]
struct CallbackQuery {
    /// Authorization code
    code: Option<String>,
    /// CSRF state token
    state: Option<String>,
    /// Error code when the user denied access or the provider failed
    error: Option<String>,
}

/// GET /callback/:provider
///
/// Handles the OAuth callback.
///
/// # Steps
/// 1. Verify CSRF state
/// 2. Exchange code for access token
/// 3. Fetch user info from the provider
/// 4. Create session and set cookie
/// 5. Redirect to the stored callback URL or home
async fn callback(
    State(hook): State<HookRef>,
    Path(provider_id): Path<String>,
    Query(query): Query<CallbackQuery>,
    jar: CookieJar,
) -> Result<Response, AppError> {
    AUTH_REQUESTS_TOTAL.with_label_values(&["callback"]).inc();

    let provider = hook.provider(&provider_id).ok_or(AppError::NotFound)?;

    if let Some(error) = query.error {
        tracing::warn!(provider = %provider_id, %error, "Provider returned an error");
        AUTH_SIGNINS_TOTAL
            .with_label_values(&[provider_id.as_str(), "denied"])
            .inc();
        let encoded: String = url::form_urlencoded::byte_serialize(error.as_bytes()).collect();
        let target = format!("{}?error={encoded}", hook.route("/error"));
        return Ok((clear_flow_cookies(&hook, jar), Redirect::to(&target)).into_response());
    }

    verify_csrf_state(&hook, query.state.as_deref(), &jar)?;
    let code = query
        .code
        .ok_or_else(|| AppError::Validation("Missing authorization code".to_string()))?;

    let user = match fetch_user(&hook, provider, code).await {
        Ok(user) => user,
        Err(error) => {
            AUTH_SIGNINS_TOTAL
                .with_label_values(&[provider_id.as_str(), "failed"])
                .inc();
            return Err(error);
        }
    };

    let session = Session::new(user, provider_id.as_str(), hook.session_max_age)?;
    let token = create_session_token(&session, &hook.secret)?;

    let target = jar
        .get(hook.cookies.callback_url_name())
        .and_then(|cookie| hook.sanitize_callback_url(cookie.value()))
        .unwrap_or_else(|| "/".to_string());

    let jar =
        clear_flow_cookies(&hook, jar).add(hook.cookies.session(token, hook.session_max_age));

    AUTH_SIGNINS_TOTAL
        .with_label_values(&[provider_id.as_str(), "success"])
        .inc();
    tracing::info!(
        provider = %provider_id,
        user_id = %session.user.id,
        "User signed in"
    );

    Ok((jar, Redirect::to(&target)).into_response())
}

/// Drop the cookies that only live for the duration of one sign-in attempt
fn clear_flow_cookies(hook: &HookState, jar: CookieJar) -> CookieJar {
    jar.remove(hook.cookies.removal(hook.cookies.state_name()))
        .remove(hook.cookies.removal(hook.cookies.callback_url_name()))
}

/// Verify CSRF state from cookie matches callback state
fn verify_csrf_state(hook: &HookState, state: Option<&str>, jar: &CookieJar) -> Result<(), AppError> {
    let expected = jar
        .get(hook.cookies.state_name())
        .map(|cookie| cookie.value().to_owned())
        .filter(|value| !value.is_empty())
        .ok_or(AppError::Unauthorized)?;
    let state = state.ok_or(AppError::Unauthorized)?;

    if expected != state {
        tracing::warn!("OAuth state mismatch");
        return Err(AppError::Unauthorized);
    }

    Ok(())
}

/// Exchange the authorization code and load the user's profile
async fn fetch_user(
    hook: &HookState,
    provider: &ConfiguredProvider,
    code: String,
) -> Result<User, AppError> {
    let token = provider
        .client
        .exchange_code(AuthorizationCode::new(code))
        .request_async(&hook.http_client)
        .await
        .map_err(|e| AppError::Provider(format!("Token exchange failed: {e}")))?;
    let access_token = token.access_token().secret();

    let raw: serde_json::Value = hook
        .http_client
        .get(&provider.descriptor.userinfo_url)
        .bearer_auth(access_token)
        .header(header::ACCEPT, "application/json")
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    let mut user = provider.descriptor.map_profile(&raw)?;

    if user.email.is_none() {
        if let Some(emails_url) = &provider.descriptor.emails_url {
            match fetch_emails(hook, emails_url, access_token).await {
                Ok(emails) => user.email = select_email(&emails),
                Err(error) => {
                    tracing::warn!(
                        provider = %provider.descriptor.id,
                        %error,
                        "Failed to fetch user e-mail addresses"
                    );
                }
            }
        }
    }

    Ok(user)
}

async fn fetch_emails(
    hook: &HookState,
    emails_url: &str,
    access_token: &str,
) -> Result<Vec<ProviderEmail>, AppError> {
    let emails = hook
        .http_client
        .get(emails_url)
        .bearer_auth(access_token)
        .header(header::ACCEPT, "application/json")
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    Ok(emails)
}

// =============================================================================
// Session
// =============================================================================

/// GET /session
async fn session(State(hook): State<HookRef>, headers: HeaderMap) -> Json<Option<Session>> {
    AUTH_REQUESTS_TOTAL.with_label_values(&["session"]).inc();
    Json(hook.session_from_headers(&headers))
}

// =============================================================================
// Sign out
// =============================================================================

/// GET /signout
async fn signout_page(State(hook): State<HookRef>) -> impl IntoResponse {
    AUTH_REQUESTS_TOTAL.with_label_values(&["signout_page"]).inc();

    let action = hook.route("/signout");
    Html(format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Sign out</title></head>
<body>
    <h1>Sign out</h1>
    <p>Are you sure you want to sign out?</p>
    <form method="post" action="{}"><button type="submit">Sign out</button></form>
</body>
</html>
"#,
        html_escape::encode_double_quoted_attribute(&action)
    ))
}

/// POST /signout
///
/// Clears the session cookie and redirects home.
async fn signout(State(hook): State<HookRef>, jar: CookieJar) -> impl IntoResponse {
    AUTH_REQUESTS_TOTAL.with_label_values(&["signout"]).inc();
    AUTH_SIGNOUTS_TOTAL.inc();

    let jar = jar.remove(hook.cookies.removal(hook.cookies.session_name()));
    (jar, Redirect::to("/"))
}

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Deserialize)]
struct ErrorQuery {
    error: Option<String>,
}

/// GET /error
async fn error_page(
    State(hook): State<HookRef>,
    Query(query): Query<ErrorQuery>,
) -> impl IntoResponse {
    AUTH_REQUESTS_TOTAL.with_label_values(&["error"]).inc();

    let error = query.error.unwrap_or_else(|| "Unknown".to_string());
    let signin = hook.route("/signin");
    (
        StatusCode::BAD_REQUEST,
        Html(format!(
            r#"<!DOCTYPE html>
<html>
<head><title>Sign-in error</title></head>
<body>
    <h1>Sign-in error</h1>
    <p>Error: <code>{}</code></p>
    <a href="{}">Try again</a>
</body>
</html>
"#,
            html_escape::encode_text(&error),
            html_escape::encode_double_quoted_attribute(&signin),
        )),
    )
}

async fn not_found() -> AppError {
    AppError::NotFound
}
