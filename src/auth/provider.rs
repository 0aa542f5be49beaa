//! Identity provider descriptors
//!
//! A `Provider` describes how to authenticate against one external identity
//! provider: its endpoints, default scopes, client credentials and how to
//! turn the provider's profile JSON into a `User`. Descriptors are plain
//! data; the OAuth exchange itself is driven by the hook.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::session::User;
use crate::error::AppError;

/// Maps a provider's raw profile response to a `User`.
pub type ProfileMapper = fn(&Value) -> Result<User, AppError>;

/// Authentication protocol spoken by a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OAuth 2.0 authorization code flow
    OAuth,
}

/// Provider descriptor
#[derive(Clone)]
pub struct Provider {
    /// Stable identifier used in routes (e.g. "github")
    pub id: String,
    /// Display name (e.g. "GitHub")
    pub name: String,
    pub kind: ProviderKind,
    pub authorization_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    /// Endpoint listing the user's e-mail addresses, queried when the
    /// profile carries no public address
    pub emails_url: Option<String>,
    pub scopes: Vec<String>,
    pub client_id: String,
    client_secret: String,
    profile: ProfileMapper,
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("authorization_url", &self.authorization_url)
            .field("token_url", &self.token_url)
            .field("userinfo_url", &self.userinfo_url)
            .field("emails_url", &self.emails_url)
            .field("scopes", &self.scopes)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[redacted]")
            .finish()
    }
}

impl Provider {
    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }

    /// Map a raw profile response to a `User`
    pub fn map_profile(&self, raw: &Value) -> Result<User, AppError> {
        (self.profile)(raw)
    }

    /// Check that the descriptor can be used to build an OAuth client
    ///
    /// # Errors
    /// Returns `AppError::Config` if the id or a credential is blank, or an
    /// endpoint is not an absolute URL.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.id.trim().is_empty() {
            return Err(AppError::Config("provider id must not be empty".to_string()));
        }

        if self.client_id.trim().is_empty() {
            return Err(AppError::Config(format!(
                "provider '{}': client id must not be empty",
                self.id
            )));
        }

        if self.client_secret.trim().is_empty() {
            return Err(AppError::Config(format!(
                "provider '{}': client secret must not be empty",
                self.id
            )));
        }

        let endpoints = [
            ("authorization", Some(&self.authorization_url)),
            ("token", Some(&self.token_url)),
            ("userinfo", Some(&self.userinfo_url)),
            ("emails", self.emails_url.as_ref()),
        ];
        for (label, endpoint) in endpoints {
            if let Some(endpoint) = endpoint {
                url::Url::parse(endpoint).map_err(|e| {
                    AppError::Config(format!(
                        "provider '{}': invalid {label} URL {endpoint:?}: {e}",
                        self.id
                    ))
                })?;
            }
        }

        Ok(())
    }
}

/// Options for the GitHub provider
#[derive(Clone)]
pub struct GitHubOptions {
    pub client_id: String,
    pub client_secret: String,
}

impl From<crate::config::GitHubCredentials> for GitHubOptions {
    fn from(credentials: crate::config::GitHubCredentials) -> Self {
        Self {
            client_id: credentials.client_id,
            client_secret: credentials.client_secret,
        }
    }
}

/// Build the GitHub provider descriptor
pub fn github(options: GitHubOptions) -> Provider {
    Provider {
        id: "github".to_string(),
        name: "GitHub".to_string(),
        kind: ProviderKind::OAuth,
        authorization_url: "https://github.com/login/oauth/authorize".to_string(),
        token_url: "https://github.com/login/oauth/access_token".to_string(),
        userinfo_url: "https://api.github.com/user".to_string(),
        emails_url: Some("https://api.github.com/user/emails".to_string()),
        scopes: vec!["read:user".to_string(), "user:email".to_string()],
        client_id: options.client_id,
        client_secret: options.client_secret,
        profile: github_profile,
    }
}

/// GitHub user info
#[derive(Debug, Deserialize)]
struct GitHubUser {
    login: String,
    id: u64,
    avatar_url: Option<String>,
    name: Option<String>,
    email: Option<String>,
}

fn github_profile(raw: &Value) -> Result<User, AppError> {
    let user = GitHubUser::deserialize(raw)
        .map_err(|e| AppError::Provider(format!("Unexpected GitHub profile: {e}")))?;

    Ok(User {
        id: user.id.to_string(),
        name: Some(user.name.unwrap_or(user.login)),
        email: user.email,
        image: user.avatar_url,
    })
}

/// One entry of a provider's e-mail listing
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderEmail {
    pub email: String,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub verified: bool,
}

/// Pick the address to attach to a user: the primary verified one, else any
/// verified one. Unverified addresses are never selected.
pub fn select_email(emails: &[ProviderEmail]) -> Option<String> {
    let verified = || emails.iter().filter(|entry| entry.verified);

    verified()
        .find(|entry| entry.primary)
        .or_else(|| verified().next())
        .map(|entry| entry.email.clone())
}
