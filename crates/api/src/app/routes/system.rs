use axum::body::Bytes;
use axum::extract::{Extension, RawQuery};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use axum::Json;
use tracing::warn;

use turnstile_auth::CsrfToken;
use turnstile_auth::csrf::CSRF_PARAM_NAME;

use crate::app::routes::common;
use crate::context::{ChainContext, PrincipalContext};

const MAX_LOGGED_REPORT: usize = 2048;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(
    chain: Option<Extension<ChainContext>>,
    principal: Option<Extension<PrincipalContext>>,
) -> impl IntoResponse {
    Json(common::caller(chain.as_deref(), principal.as_deref()))
}

/// Login form; `?failed`, `?recaptchaFailed` and `?logout` select a notice.
pub async fn login_page(RawQuery(query): RawQuery, token: Option<Extension<CsrfToken>>) -> Html<String> {
    let notice = match query.as_deref() {
        Some(q) if q.starts_with("failed") => "<p class=\"error\">Invalid username or password.</p>",
        Some(q) if q.starts_with("recaptchaFailed") => "<p class=\"error\">Human verification failed.</p>",
        Some(q) if q.starts_with("logout") => "<p>You have been signed out.</p>",
        _ => "",
    };
    let csrf = token
        .map(|Extension(t)| format!("<input type=\"hidden\" name=\"{CSRF_PARAM_NAME}\" value=\"{}\">", t.value()))
        .unwrap_or_default();

    Html(format!(
        "<!doctype html><title>Sign in</title>{notice}\
         <form method=\"post\" action=\"/authenticate\">\
         <input name=\"username\" autocomplete=\"username\">\
         <input type=\"password\" name=\"password\" autocomplete=\"current-password\">\
         {csrf}<button type=\"submit\">Sign in</button></form>"
    ))
}

pub async fn session_expired() -> Html<&'static str> {
    Html("<!doctype html><title>Session expired</title><p>Your session has expired or you are not allowed to view this page.</p><a href=\"/authentication\">Sign in</a>")
}

pub async fn report_csp_violation(body: Bytes) -> StatusCode {
    let report = String::from_utf8_lossy(&body[..body.len().min(MAX_LOGGED_REPORT)]);
    warn!(%report, "content security policy violation");
    StatusCode::OK
}
