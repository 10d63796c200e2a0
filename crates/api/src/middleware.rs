//! The security gateway: one axum middleware that runs every request through
//! the security chain selected for it.
//!
//! Pipeline per chain: secure-channel check, caller resolution (Basic
//! credentials or session), CSRF inspection, logout, login processing
//! (verification gate, demo provisioning, authentication), then the chain's
//! access rules.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::{Body, to_bytes};
use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header};
use axum::middleware::Next;
use axum::response::Response;
use tracing::{debug, info, warn};

use turnstile_auth::csrf::CSRF_PARAM_NAME;
use turnstile_auth::{
    AuthenticationMechanism, ChainSelector, CsrfCheck, CsrfError, CsrfToken, CsrfTokenRepository, Decision, FormLogin,
    HttpMethod, Principal, RequestInfo, SecurityChain,
};
use turnstile_core::SessionId;
use turnstile_infra::{AuthenticationError, Authenticator, DemoProvisioner, VerificationGate};

use crate::app::errors::{
    forbidden, invalid_csrf_token, json_error, provisioning_error_to_response, redirect, store_error_to_response,
    unauthorized,
};
use crate::basic::{self, BasicCredentials};
use crate::context::{ChainContext, PrincipalContext};
use crate::session::{SessionStore, expired_session_cookie, session_cookie, session_from_cookies};

const CSRF_HEADER: HeaderName = HeaderName::from_static("x-csrf-token");
const FORWARDED_PROTO: &str = "x-forwarded-proto";
const MAX_FORM_BYTES: usize = 64 * 1024;

const USERNAME_PARAM: &str = "username";
const PASSWORD_PARAM: &str = "password";
const VERIFICATION_RESPONSE_PARAM: &str = "g-recaptcha-response";

#[derive(Clone)]
pub struct GatewayState {
    pub selector: Arc<ChainSelector>,
    pub sessions: Arc<SessionStore>,
    pub authenticator: Authenticator,
    pub verification: VerificationGate,
    pub verification_secret: Option<Arc<str>>,
    /// Present only in the demo profile.
    pub provisioner: Option<DemoProvisioner>,
}

pub async fn security_gateway(State(state): State<GatewayState>, req: Request, next: Next) -> Response {
    let Ok(method) = req.method().as_str().parse::<HttpMethod>() else {
        return json_error(StatusCode::METHOD_NOT_ALLOWED, "method_not_allowed", "unsupported method");
    };
    let info = request_info(method, req.uri().path(), req.headers());
    if info.has_relative_segments() {
        return json_error(StatusCode::BAD_REQUEST, "invalid_path", "relative path segments are not allowed");
    }

    let chain = state.selector.select(&info);
    if chain.requires_secure_channel() && !is_secure(&req) {
        return secure_redirect(&req);
    }

    match chain.authentication() {
        AuthenticationMechanism::HttpBasic { realm } => basic_pipeline(&state, chain, realm, info, req, next).await,
        AuthenticationMechanism::FormLogin(form) => form_pipeline(&state, chain, form, info, req, next).await,
    }
}

async fn basic_pipeline(
    state: &GatewayState,
    chain: &SecurityChain,
    realm: &str,
    info: RequestInfo,
    req: Request,
    next: Next,
) -> Response {
    let caller = match basic::parse(info.header(header::AUTHORIZATION.as_str())) {
        BasicCredentials::None => None,
        BasicCredentials::Malformed => {
            debug!(chain = chain.name(), "malformed basic credentials");
            return unauthorized(realm);
        }
        BasicCredentials::Present { username, password } => {
            match state.authenticator.authenticate(&username, &password).await {
                Ok(principal) => Some(principal),
                Err(AuthenticationError::Store(err)) => return store_error_to_response(&err),
                Err(err) => {
                    info!(chain = chain.name(), reason = %err, "basic authentication failed");
                    return unauthorized(realm);
                }
            }
        }
    };

    match authorize(chain, &info, caller.as_ref()) {
        Decision::Allow => forward(chain, caller, None, req, next).await,
        Decision::Deny(_) if caller.is_none() => unauthorized(realm),
        Decision::Deny(_) => forbidden(),
    }
}

async fn form_pipeline(
    state: &GatewayState,
    chain: &SecurityChain,
    form: &FormLogin,
    info: RequestInfo,
    req: Request,
    next: Next,
) -> Response {
    let secure_cookie = chain.requires_secure_channel();
    let mut session = state.sessions.resolve(session_from_cookies(req.headers()));
    let mut new_cookie = None;
    // Only the login form needs a session before login; other anonymous
    // requests leave nothing behind.
    if session.is_none() && opens_session(form, &info) {
        let id = state.sessions.create();
        new_cookie = Some(session_cookie(id, secure_cookie));
        session = Some(id);
    }

    let needs_body = form.processing.matches(&info)
        || form.logout.matches(&info)
        || chain.csrf().is_some_and(|guard| guard.requires_protection(&info));
    let (req, params) = match read_params(req, needs_body).await {
        Ok(read) => read,
        Err(response) => return finish(response, new_cookie, None),
    };

    let mut token = None;
    if let Some(guard) = chain.csrf() {
        let submitted = info
            .header(CSRF_HEADER.as_str())
            .or_else(|| params.get(CSRF_PARAM_NAME).map(String::as_str));
        let check = match session {
            Some(id) => guard.inspect(&info, id, submitted, state.sessions.as_ref()).map(Some),
            None if guard.requires_protection(&info) => Err(CsrfError::NoSessionToken),
            None => Ok(None),
        };
        match check {
            Ok(Some(CsrfCheck::Skipped(current))) => token = Some(current),
            Ok(_) => {}
            Err(err) => {
                warn!(chain = chain.name(), path = info.path(), error = %err, "rejecting request");
                return finish(invalid_csrf_token(), new_cookie, None);
            }
        }
    }

    if form.logout.matches(&info) {
        if let Some(id) = session {
            state.sessions.destroy(id);
        }
        return finish(
            redirect(&form.logout_success_url),
            Some(expired_session_cookie(secure_cookie)),
            None,
        );
    }

    if form.processing.matches(&info) {
        return login(state, form, session, &params, secure_cookie, new_cookie).await;
    }

    let caller = session.and_then(|id| state.sessions.principal(id));
    let response = match authorize(chain, &info, caller.as_ref()) {
        Decision::Allow => forward(chain, caller, token.clone(), req, next).await,
        Decision::Deny(_) => {
            let ajax = form.ajax.matches(&info);
            match (caller.is_some(), ajax) {
                (false, true) => json_error(StatusCode::UNAUTHORIZED, "unauthorized", "authentication required"),
                (false, false) => redirect(&form.login_page),
                (true, true) => forbidden(),
                (true, false) => redirect(&form.access_denied_page),
            }
        }
    };
    finish(response, new_cookie, token.as_ref())
}

/// A read of the login page, which renders the CSRF-protected form.
fn opens_session(form: &FormLogin, info: &RequestInfo) -> bool {
    matches!(info.method(), HttpMethod::Get | HttpMethod::Head) && info.path() == form.login_page
}

async fn login(
    state: &GatewayState,
    form: &FormLogin,
    session: Option<SessionId>,
    params: &HashMap<String, String>,
    secure_cookie: bool,
    new_cookie: Option<String>,
) -> Response {
    let response_token = params.get(VERIFICATION_RESPONSE_PARAM).map_or("", String::as_str);
    if !state
        .verification
        .verify(state.verification_secret.as_deref(), response_token)
        .await
    {
        info!("login attempt failed human verification");
        return finish(redirect(&form.verification_failure_url), new_cookie, None);
    }

    let (Some(username), Some(password)) = (params.get(USERNAME_PARAM), params.get(PASSWORD_PARAM)) else {
        return finish(redirect(&form.failure_url), new_cookie, None);
    };

    if let Some(provisioner) = &state.provisioner {
        if !username.trim().is_empty() {
            if let Err(err) = provisioner.ensure_account(username).await {
                return finish(provisioning_error_to_response(&err), new_cookie, None);
            }
        }
    }

    match state.authenticator.authenticate(username, password).await {
        Ok(principal) => {
            info!(username = principal.username(), "login succeeded");
            let id = state.sessions.authenticate(session, principal);
            let token = state.sessions.rotate(id);
            finish(
                redirect(&form.success_url),
                Some(session_cookie(id, secure_cookie)),
                Some(&token),
            )
        }
        Err(AuthenticationError::Store(err)) => finish(store_error_to_response(&err), new_cookie, None),
        Err(err) => {
            info!(reason = %err, "login failed");
            finish(redirect(&form.failure_url), new_cookie, None)
        }
    }
}

fn authorize(chain: &SecurityChain, info: &RequestInfo, caller: Option<&Principal>) -> Decision {
    let decision = chain
        .rules()
        .evaluate(info.path(), info.method(), caller.map(Principal::roles));
    if let Decision::Deny(reason) = decision {
        debug!(
            chain = chain.name(),
            method = %info.method(),
            path = info.path(),
            %reason,
            "request denied"
        );
    }
    decision
}

async fn forward(
    chain: &SecurityChain,
    caller: Option<Principal>,
    token: Option<CsrfToken>,
    mut req: Request,
    next: Next,
) -> Response {
    req.extensions_mut().insert(ChainContext::new(chain.name()));
    if let Some(principal) = caller {
        req.extensions_mut().insert(PrincipalContext::new(principal));
    }
    if let Some(token) = token {
        req.extensions_mut().insert(token);
    }
    next.run(req).await
}

/// Attach the session cookie and the session's CSRF token.
fn finish(mut response: Response, cookie: Option<String>, token: Option<&CsrfToken>) -> Response {
    let headers = response.headers_mut();
    if let Some(cookie) = cookie.and_then(|c| HeaderValue::from_str(&c).ok()) {
        headers.append(header::SET_COOKIE, cookie);
    }
    if let Some(value) = token.and_then(|t| HeaderValue::from_str(t.value()).ok()) {
        headers.insert(CSRF_HEADER, value);
    }
    response
}

fn request_info(method: HttpMethod, path: &str, headers: &HeaderMap) -> RequestInfo {
    // Opaque bytes are kept (lossily) so presence checks still see them.
    headers.iter().fold(RequestInfo::new(method, path), |info, (name, value)| {
        info.with_header(name.as_str(), String::from_utf8_lossy(value.as_bytes()))
    })
}

fn is_secure(req: &Request) -> bool {
    req.uri().scheme_str() == Some("https")
        || req
            .headers()
            .get(FORWARDED_PROTO)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("https"))
}

fn secure_redirect(req: &Request) -> Response {
    let Some(host) = req.headers().get(header::HOST).and_then(|v| v.to_str().ok()) else {
        return json_error(StatusCode::BAD_REQUEST, "missing_host", "secure channel required");
    };
    let target = req.uri().path_and_query().map_or("/", |pq| pq.as_str());
    redirect(&format!("https://{host}{target}"))
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/x-www-form-urlencoded"))
}

/// Request parameters: url-encoded form fields, then query-string fields
/// not already present. The form body is read only when `needs_body`, and
/// is put back for the handler.
async fn read_params(req: Request, needs_body: bool) -> Result<(Request, HashMap<String, String>), Response> {
    let mut params = HashMap::new();
    let req = if needs_body && is_form(req.headers()) {
        if declared_length(req.headers()).is_some_and(|len| len > MAX_FORM_BYTES) {
            return Err(json_error(StatusCode::PAYLOAD_TOO_LARGE, "body_too_large", "form body too large"));
        }
        let (parts, body) = req.into_parts();
        let bytes = to_bytes(body, MAX_FORM_BYTES)
            .await
            .map_err(|_| json_error(StatusCode::BAD_REQUEST, "unreadable_body", "form body could not be read"))?;
        collect_params(&bytes, &mut params);
        Request::from_parts(parts, Body::from(bytes))
    } else {
        req
    };
    if let Some(query) = req.uri().query() {
        collect_params(query.as_bytes(), &mut params);
    }
    Ok((req, params))
}

fn declared_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

fn collect_params(input: &[u8], into: &mut HashMap<String, String>) {
    for (name, value) in url::form_urlencoded::parse(input) {
        into.entry(name.into_owned()).or_insert_with(|| value.into_owned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(uri: &str, headers: &[(&str, &str)], body: &'static str) -> Request {
        let mut builder = axum::http::Request::builder().uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(Body::from(body)).unwrap()
    }

    #[tokio::test]
    async fn form_fields_win_over_query_and_body_is_preserved() {
        let req = request(
            "/authenticate?username=query&extra=1",
            &[("content-type", "application/x-www-form-urlencoded; charset=UTF-8")],
            "username=form&password=p%40ss&_csrf=abc",
        );
        let (req, params) = read_params(req, true).await.unwrap();

        assert_eq!(params["username"], "form");
        assert_eq!(params["password"], "p@ss");
        assert_eq!(params["_csrf"], "abc");
        assert_eq!(params["extra"], "1");

        let body = to_bytes(req.into_body(), MAX_FORM_BYTES).await.unwrap();
        assert_eq!(&body[..], b"username=form&password=p%40ss&_csrf=abc");
    }

    #[tokio::test]
    async fn non_form_bodies_are_not_parsed() {
        let req = request("/x", &[("content-type", "application/json")], r#"{"_csrf":"abc"}"#);
        let (_, params) = read_params(req, true).await.unwrap();
        assert!(params.is_empty());
    }

    #[tokio::test]
    async fn bodies_are_left_alone_unless_needed() {
        let req = request(
            "/events/search?page=2",
            &[("content-type", "application/x-www-form-urlencoded")],
            "q=summer",
        );
        let (req, params) = read_params(req, false).await.unwrap();
        assert_eq!(params.get("q"), None);
        assert_eq!(params["page"], "2");
        let body = to_bytes(req.into_body(), MAX_FORM_BYTES).await.unwrap();
        assert_eq!(&body[..], b"q=summer");
    }

    #[tokio::test]
    async fn oversized_forms_are_rejected_only_when_read() {
        let too_big = (MAX_FORM_BYTES + 1).to_string();
        let headers = [
            ("content-type", "application/x-www-form-urlencoded"),
            ("content-length", too_big.as_str()),
        ];

        let Err(response) = read_params(request("/authenticate", &headers, ""), true).await else {
            panic!("oversized form accepted");
        };
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

        assert!(read_params(request("/upload", &headers, ""), false).await.is_ok());
    }

    #[test]
    fn forwarded_proto_marks_request_secure() {
        assert!(!is_secure(&request("/admin", &[], "")));
        assert!(is_secure(&request("/admin", &[("x-forwarded-proto", "HTTPS")], "")));
        assert!(is_secure(&request("https://example.org/admin", &[], "")));
    }

    #[test]
    fn insecure_requests_redirect_to_https_with_query() {
        let response = secure_redirect(&request("/admin/events?page=2", &[("host", "tickets.example.org")], ""));
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers()[header::LOCATION],
            "https://tickets.example.org/admin/events?page=2"
        );
    }

    #[test]
    fn request_info_keeps_utf8_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic eDp5"));
        let info = request_info(HttpMethod::Get, "/admin", &headers);
        assert_eq!(info.header("authorization"), Some("Basic eDp5"));
        assert_eq!(info.path(), "/admin");
    }

    #[test]
    fn opaque_header_values_still_count_as_present() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_bytes(b"Basic \xff\xfe").unwrap());
        let info = request_info(HttpMethod::Get, "/admin/api/events", &headers);
        assert!(info.has_header("Authorization"));
    }

    #[test]
    fn only_reads_of_the_login_page_open_a_session() {
        let form = FormLogin::new("/authentication", "/authenticate").unwrap();
        assert!(opens_session(&form, &RequestInfo::new(HttpMethod::Get, "/authentication")));
        assert!(!opens_session(&form, &RequestInfo::new(HttpMethod::Post, "/authentication")));
        assert!(!opens_session(&form, &RequestInfo::new(HttpMethod::Get, "/health")));
        assert!(!opens_session(&form, &RequestInfo::new(HttpMethod::Get, "/admin")));
    }
}
