//! Cookies owned by the auth hook

use axum_extra::extract::cookie::{Cookie, SameSite};

const SECURE_PREFIX: &str = "__Secure-";

/// Names and attributes of the hook's cookies
///
/// When secure cookies are in effect every name carries the `__Secure-`
/// prefix, which browsers only accept together with the `Secure` flag.
#[derive(Debug, Clone)]
pub struct AuthCookies {
    secure: bool,
    session_name: String,
    state_name: String,
    callback_url_name: String,
}

impl AuthCookies {
    pub fn new(secure: bool) -> Self {
        let name = |base: &str| {
            if secure {
                format!("{SECURE_PREFIX}{base}")
            } else {
                base.to_string()
            }
        };

        Self {
            secure,
            session_name: name("auth.session-token"),
            state_name: name("auth.state"),
            callback_url_name: name("auth.callback-url"),
        }
    }

    pub fn session_name(&self) -> &str {
        &self.session_name
    }

    pub fn state_name(&self) -> &str {
        &self.state_name
    }

    pub fn callback_url_name(&self) -> &str {
        &self.callback_url_name
    }

    pub fn session(&self, token: String, max_age_secs: i64) -> Cookie<'static> {
        self.build(self.session_name.clone(), token, Some(max_age_secs))
    }

    pub fn state(&self, state: String, max_age_secs: i64) -> Cookie<'static> {
        self.build(self.state_name.clone(), state, Some(max_age_secs))
    }

    pub fn callback_url(&self, url: String, max_age_secs: i64) -> Cookie<'static> {
        self.build(self.callback_url_name.clone(), url, Some(max_age_secs))
    }

    /// Cookie that makes the browser drop `name`
    pub fn removal(&self, name: &str) -> Cookie<'static> {
        let mut cookie = self.build(name.to_string(), String::new(), None);
        cookie.make_removal();
        cookie
    }

    fn build(&self, name: String, value: String, max_age_secs: Option<i64>) -> Cookie<'static> {
        let mut cookie = Cookie::build((name, value))
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .build();
        if let Some(secs) = max_age_secs {
            cookie.set_max_age(time::Duration::seconds(secs));
        }
        cookie
    }
}
