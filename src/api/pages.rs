//! Application pages
//!
//! Minimal pages behind the auth hook: a home page that reflects the
//! sign-in state and a page only signed-in users can reach.

use axum::{
    Json, Router,
    extract::State,
    middleware,
    response::{Html, IntoResponse},
    routing::get,
};

use crate::AppState;
use crate::auth::{CurrentUser, MaybeUser, User, require_auth};

/// Create pages router
///
/// Routes:
/// - GET / - Home page
/// - GET /protected - Current user as JSON (requires a session)
pub fn pages_router() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route(
            "/protected",
            get(protected).route_layer(middleware::from_fn(require_auth)),
        )
}

/// GET /
async fn home(State(state): State<AppState>, MaybeUser(session): MaybeUser) -> impl IntoResponse {
    let base = state.auth.base_path();

    let body = match session {
        Some(session) => {
            let display = session
                .user
                .name
                .as_deref()
                .or(session.user.email.as_deref())
                .unwrap_or(&session.user.id);
            format!(
                r#"<p>Signed in as <strong>{}</strong></p>
    <form method="post" action="{}/signout"><button type="submit">Sign out</button></form>"#,
                html_escape::encode_text(display),
                html_escape::encode_double_quoted_attribute(base),
            )
        }
        None => format!(
            r#"<p>You are not signed in.</p>
    <a href="{}/signin">Sign in</a>"#,
            html_escape::encode_double_quoted_attribute(base),
        ),
    };

    Html(format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Home</title></head>
<body>
    {body}
</body>
</html>
"#
    ))
}

/// GET /protected
async fn protected(CurrentUser(session): CurrentUser) -> Json<User> {
    Json(session.user)
}
