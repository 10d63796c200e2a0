use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::json;

use turnstile_auth::StoreError;
use turnstile_infra::ProvisioningError;

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn store_error_to_response(err: &StoreError) -> Response {
    tracing::error!(error = %err, "credential store failure");
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", "credential store unavailable")
}

pub fn provisioning_error_to_response(err: &ProvisioningError) -> Response {
    match err {
        ProvisioningError::Store(e) => store_error_to_response(e),
    }
}

pub fn unauthorized(realm: &str) -> Response {
    let mut response = json_error(StatusCode::UNAUTHORIZED, "unauthorized", "authentication required");
    if let Ok(value) = HeaderValue::from_str(&format!("Basic realm=\"{realm}\"")) {
        response.headers_mut().insert(header::WWW_AUTHENTICATE, value);
    }
    response
}

pub fn forbidden() -> Response {
    json_error(StatusCode::FORBIDDEN, "forbidden", "access denied")
}

pub fn invalid_csrf_token() -> Response {
    json_error(StatusCode::FORBIDDEN, "invalid_csrf_token", "invalid CSRF token")
}

/// `302 Found` to `location`.
pub fn redirect(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::FOUND, [(header::LOCATION, value)]).into_response(),
        Err(_) => json_error(StatusCode::BAD_REQUEST, "invalid_redirect", "unrepresentable redirect target"),
    }
}
