//! Common test utilities for E2E tests

#![allow(dead_code)]

use axum::{
    Form, Json, Router,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    routing::{get, post},
};
use github_auth_hook::{
    AppState,
    auth::{AuthConfig, AuthHook, GitHubOptions, Session, User, create_session_token, github},
    config, hooks,
};
use serde_json::{Value, json};
use std::collections::HashMap;
use tokio::net::TcpListener;

pub const SESSION_SECRET: &str = "test-secret-key-32-bytes-long!!!";
pub const SESSION_COOKIE: &str = "__Secure-auth.session-token";
pub const STATE_COOKIE: &str = "__Secure-auth.state";
pub const CALLBACK_URL_COOKIE: &str = "__Secure-auth.callback-url";

/// Authorization code and access token understood by the mock GitHub
pub const MOCK_CODE: &str = "mock-code";
pub const MOCK_ACCESS_TOKEN: &str = "mock-access-token";

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub client: reqwest::Client,
}

/// Test configuration
pub fn test_config() -> config::AppConfig {
    config::AppConfig {
        server: config::ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0, // Let OS assign port
            domain: "test.example.com".to_string(),
            protocol: "https".to_string(),
        },
        auth: config::AuthSettings {
            secret: SESSION_SECRET.to_string(),
            session_max_age: 3600,
            state_max_age: 900,
            base_path: "/auth".to_string(),
        },
        logging: config::LoggingConfig {
            level: "info".to_string(),
            format: "pretty".to_string(),
        },
    }
}

pub fn test_credentials() -> config::GitHubCredentials {
    config::GitHubCredentials {
        client_id: "test-client-id".to_string(),
        client_secret: "test-client-secret".to_string(),
    }
}

impl TestServer {
    /// Create a new test server instance
    pub async fn new() -> Self {
        let config = test_config();

        // Build a private hook so tests do not depend on the process environment
        let hook = hooks::build(&config, test_credentials()).unwrap();
        Self::start(config, hook).await
    }

    /// Create a test server whose GitHub provider talks to a local mock
    pub async fn with_mock_github() -> Self {
        let config = test_config();
        let mock = spawn_mock_github().await;

        let credentials = test_credentials();
        let mut provider = github(GitHubOptions {
            client_id: credentials.client_id,
            client_secret: credentials.client_secret,
        });
        provider.token_url = format!("{mock}/login/oauth/access_token");
        provider.userinfo_url = format!("{mock}/user");
        provider.emails_url = Some(format!("{mock}/user/emails"));

        let hook = AuthHook::new(AuthConfig::new(vec![provider], &config)).unwrap();
        Self::start(config, hook).await
    }

    async fn start(config: config::AppConfig, hook: AuthHook) -> Self {
        let state = AppState::with_hook(config, hook);

        // Create HTTP client
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        let app = github_auth_hook::build_router(state.clone());

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait a bit for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        Self {
            addr: addr_str,
            state,
            client,
        }
    }

    /// Get base URL for API requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// Create a signed session token for a test user
    pub fn create_test_token(&self) -> String {
        let session = Session::new(test_user(), "github", 3600).expect("valid max age");
        create_session_token(&session, &self.state.config.auth.secret)
            .expect("Failed to create test token")
    }
}

pub fn test_user() -> User {
    User {
        id: "12345".to_string(),
        name: Some("Test User".to_string()),
        email: Some("testuser@example.com".to_string()),
        image: Some("https://example.com/avatar.png".to_string()),
    }
}

/// Start a stand-in for GitHub's token, user and e-mail endpoints
///
/// Returns its base URL. The profile has no public e-mail; the e-mail
/// listing has an unverified primary address and a verified secondary one.
pub async fn spawn_mock_github() -> String {
    async fn token(Form(form): Form<HashMap<String, String>>) -> (StatusCode, Json<Value>) {
        if form.get("grant_type").map(String::as_str) != Some("authorization_code")
            || form.get("code").map(String::as_str) != Some(MOCK_CODE)
        {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "bad_verification_code" })),
            );
        }

        (
            StatusCode::OK,
            Json(json!({ "access_token": MOCK_ACCESS_TOKEN, "token_type": "bearer" })),
        )
    }

    fn authorized(headers: &HeaderMap) -> bool {
        headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == format!("Bearer {MOCK_ACCESS_TOKEN}"))
    }

    async fn user(headers: HeaderMap) -> Result<Json<Value>, StatusCode> {
        if !authorized(&headers) {
            return Err(StatusCode::UNAUTHORIZED);
        }
        Ok(Json(json!({
            "login": "octocat",
            "id": 583231,
            "avatar_url": "https://avatars.githubusercontent.com/u/583231",
            "name": null,
            "email": null
        })))
    }

    async fn emails(headers: HeaderMap) -> Result<Json<Value>, StatusCode> {
        if !authorized(&headers) {
            return Err(StatusCode::UNAUTHORIZED);
        }
        Ok(Json(json!([
            { "email": "unverified@evil.example", "primary": true, "verified": false },
            { "email": "octocat@example.com", "primary": false, "verified": true }
        ])))
    }

    let app = Router::new()
        .route("/login/oauth/access_token", post(token))
        .route("/user", get(user))
        .route("/user/emails", get(emails));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{addr}")
}

pub fn no_redirect_client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .timeout(std::time::Duration::from_secs(10))
        .build()
        .expect("failed to build no-redirect client")
}

/// All `Set-Cookie` header values of a response
pub fn set_cookies(response: &reqwest::Response) -> Vec<String> {
    response
        .headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok().map(ToString::to_string))
        .collect()
}

/// The `name=value` pair of the cookie `name` set by a response, ready to
/// be sent back in a `Cookie` header
pub fn cookie_pair(response: &reqwest::Response, name: &str) -> Option<String> {
    set_cookies(response)
        .into_iter()
        .filter_map(|c| c.split(';').next().map(ToString::to_string))
        .find(|pair| pair.starts_with(&format!("{name}=")))
}
