//! Server-side sessions for the stateful chain.
//!
//! A session is an opaque id carried in the `TURNSTILE_SESSION` cookie. It
//! holds the authenticated principal (if any) and string attributes, among
//! them the CSRF token. Sessions idle for longer than the configured timeout
//! are dropped on their next access.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use axum::http::{HeaderMap, header};
use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use turnstile_auth::{CsrfToken, CsrfTokenRepository, Principal, csrf::CSRF_SESSION_ATTRIBUTE};
use turnstile_core::SessionId;

pub const SESSION_COOKIE: &str = "TURNSTILE_SESSION";

#[derive(Debug, Clone)]
struct Session {
    principal: Option<Principal>,
    attributes: HashMap<String, String>,
    last_seen: DateTime<Utc>,
}

impl Session {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            principal: None,
            attributes: HashMap::new(),
            last_seen: now,
        }
    }
}

#[derive(Debug)]
struct Sessions {
    live: HashMap<SessionId, Session>,
    next_sweep: DateTime<Utc>,
}

impl Sessions {
    /// Drop every session idle past `idle`, at most once per idle period.
    fn sweep(&mut self, now: DateTime<Utc>, idle: Duration) {
        if now < self.next_sweep {
            return;
        }
        let before = self.live.len();
        self.live.retain(|_, session| now - session.last_seen <= idle);
        self.next_sweep = now + idle;
        debug!(removed = before - self.live.len(), live = self.live.len(), "swept idle sessions");
    }
}

#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<Sessions>,
    idle_timeout: Duration,
}

impl SessionStore {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            sessions: RwLock::new(Sessions {
                live: HashMap::new(),
                next_sweep: Utc::now() + idle_timeout,
            }),
            idle_timeout,
        }
    }

    /// Return the id if it names a live session, refreshing its idle clock.
    pub fn resolve(&self, id: Option<SessionId>) -> Option<SessionId> {
        self.resolve_at(id?, Utc::now())
    }

    fn resolve_at(&self, id: SessionId, now: DateTime<Utc>) -> Option<SessionId> {
        let mut sessions = self.write();
        let session = sessions.live.get_mut(&id)?;
        if now - session.last_seen > self.idle_timeout {
            debug!(session = %id, "session expired");
            sessions.live.remove(&id);
            return None;
        }
        session.last_seen = now;
        Some(id)
    }

    pub fn create(&self) -> SessionId {
        self.create_at(Utc::now())
    }

    fn create_at(&self, now: DateTime<Utc>) -> SessionId {
        let id = SessionId::new();
        let mut sessions = self.write();
        sessions.sweep(now, self.idle_timeout);
        sessions.live.insert(id, Session::new(now));
        id
    }

    pub fn principal(&self, id: SessionId) -> Option<Principal> {
        self.read().live.get(&id).and_then(|s| s.principal.clone())
    }

    /// Bind a principal to a brand-new session, discarding `previous` and
    /// everything stored in it.
    pub fn authenticate(&self, previous: Option<SessionId>, principal: Principal) -> SessionId {
        let now = Utc::now();
        let id = SessionId::new();
        let mut session = Session::new(now);
        session.principal = Some(principal);

        let mut sessions = self.write();
        if let Some(previous) = previous {
            sessions.live.remove(&previous);
        }
        sessions.sweep(now, self.idle_timeout);
        sessions.live.insert(id, session);
        id
    }

    /// Drop the session and everything stored in it.
    pub fn destroy(&self, id: SessionId) {
        self.write().live.remove(&id);
    }

    pub fn len(&self) -> usize {
        self.read().live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().live.is_empty()
    }

    // A poisoned map is still structurally sound; every write is a single
    // insert, remove or retain.
    fn read(&self) -> RwLockReadGuard<'_, Sessions> {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Sessions> {
        self.sessions.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CsrfTokenRepository for SessionStore {
    fn load(&self, session_id: SessionId) -> Option<CsrfToken> {
        self.read()
            .live
            .get(&session_id)
            .and_then(|s| s.attributes.get(CSRF_SESSION_ATTRIBUTE))
            .map(|value| CsrfToken::from_parts(session_id, value.clone()))
    }

    fn load_or_create(&self, session_id: SessionId) -> CsrfToken {
        let mut sessions = self.write();
        let session = sessions
            .live
            .entry(session_id)
            .or_insert_with(|| Session::new(Utc::now()));
        let value = session
            .attributes
            .entry(CSRF_SESSION_ATTRIBUTE.to_string())
            .or_insert_with(|| CsrfToken::generate(session_id).value().to_string());
        CsrfToken::from_parts(session_id, value.clone())
    }

    fn rotate(&self, session_id: SessionId) -> CsrfToken {
        let token = CsrfToken::generate(session_id);
        let mut sessions = self.write();
        let session = sessions
            .live
            .entry(session_id)
            .or_insert_with(|| Session::new(Utc::now()));
        session
            .attributes
            .insert(CSRF_SESSION_ATTRIBUTE.to_string(), token.value().to_string());
        token
    }
}

/// Session id from the request's `Cookie` headers, if well formed.
pub fn session_from_cookies(headers: &HeaderMap) -> Option<SessionId> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| value.trim().parse().ok())
}

pub fn session_cookie(id: SessionId, secure: bool) -> String {
    let mut cookie = format!("{SESSION_COOKIE}={id}; Path=/; HttpOnly; SameSite=Lax");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn expired_session_cookie(secure: bool) -> String {
    let mut cookie = format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use turnstile_auth::Role;

    fn store() -> SessionStore {
        SessionStore::new(Duration::minutes(30))
    }

    #[test]
    fn unknown_and_absent_ids_do_not_resolve() {
        let s = store();
        assert_eq!(s.resolve(None), None);
        assert_eq!(s.resolve(Some(SessionId::new())), None);

        let id = s.create();
        assert_eq!(s.resolve(Some(id)), Some(id));
    }

    #[test]
    fn idle_sessions_expire() {
        let s = store();
        let id = s.create();
        let later = Utc::now() + Duration::minutes(31);
        assert_eq!(s.resolve_at(id, later), None);
        assert!(s.is_empty());
    }

    #[test]
    fn abandoned_sessions_are_swept_when_new_ones_are_created() {
        let s = store();
        let start = Utc::now();
        for _ in 0..100 {
            s.create_at(start);
        }
        assert_eq!(s.len(), 100);

        let later = start + Duration::minutes(31);
        let fresh = s.create_at(later);
        assert_eq!(s.len(), 1);
        assert_eq!(s.resolve_at(fresh, later), Some(fresh));
    }

    #[test]
    fn authenticating_replaces_the_session() {
        let s = store();
        let anonymous = s.create();
        let token = s.load_or_create(anonymous);

        let id = s.authenticate(Some(anonymous), Principal::new("ada", [Role::ADMIN]));
        assert_ne!(id, anonymous);
        assert_eq!(s.resolve(Some(anonymous)), None);
        assert!(s.load(anonymous).is_none());
        assert_eq!(s.principal(id).map(|p| p.username().to_string()), Some("ada".to_string()));

        let fresh = s.rotate(id);
        assert_ne!(fresh.value(), token.value());
        assert_eq!(s.load(id), Some(fresh));
    }

    #[test]
    fn csrf_token_is_stable_within_a_session() {
        let s = store();
        let id = s.create();
        let first = s.load_or_create(id);
        let second = s.load_or_create(id);
        assert_eq!(first, second);

        let other = s.create();
        assert_ne!(s.load_or_create(other).value(), first.value());

        s.destroy(id);
        assert!(s.load(id).is_none());
    }

    #[test]
    fn cookie_header_round_trip() {
        let id = SessionId::new();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("theme=dark; {SESSION_COOKIE}={id}; lang=en")).unwrap(),
        );
        assert_eq!(session_from_cookies(&headers), Some(id));

        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("TURNSTILE_SESSION=garbage"));
        assert_eq!(session_from_cookies(&headers), None);

        assert!(session_cookie(id, true).ends_with("; Secure"));
        assert!(!session_cookie(id, false).contains("Secure"));
        assert!(expired_session_cookie(false).contains("Max-Age=0"));
    }
}
