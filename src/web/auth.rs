//! Admin authentication
//!
//! The admin area is guarded by `ADMIN_TOKEN`. API clients send it as a bearer
//! token; browsers exchange it once on the login form for a session cookie.
//! Without a configured token the admin area is closed.

use axum::http::{header, HeaderMap};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::Config;

pub const SESSION_COOKIE: &str = "gate_admin";
const SESSION_TTL_SECS: i64 = 86400;

/// Session data for an authenticated admin
#[derive(Debug, Clone)]
pub struct AdminSession {
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AdminSession {
    /// Create a new session with 24-hour expiry
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            created_at: now,
            expires_at: now + Duration::seconds(SESSION_TTL_SECS),
        }
    }

    pub fn age(&self) -> Duration {
        Utc::now() - self.created_at
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Maps session tokens to session data
pub struct SessionStore {
    sessions: RwLock<HashMap<String, AdminSession>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Create a new session and return its token
    pub async fn create_session(&self) -> String {
        let token = uuid::Uuid::new_v4().to_string();
        self.sessions
            .write()
            .await
            .insert(token.clone(), AdminSession::new());
        token
    }

    /// Whether the token names a live session
    pub async fn is_valid(&self, token: &str) -> bool {
        self.sessions
            .read()
            .await
            .get(token)
            .map(|s| !s.is_expired())
            .unwrap_or(false)
    }

    pub async fn remove_session(&self, token: &str) -> Option<AdminSession> {
        self.sessions.write().await.remove(token)
    }

    pub async fn cleanup_expired(&self) {
        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, s| !s.is_expired());
    }

    #[cfg(test)]
    pub async fn insert_session(&self, token: &str, session: AdminSession) {
        self.sessions
            .write()
            .await
            .insert(token.to_string(), session);
    }
}

pub type SharedSessionStore = Arc<SessionStore>;

pub fn create_session_store() -> SharedSessionStore {
    Arc::new(SessionStore::new())
}

/// Result of checking a request against the admin credential
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminAccess {
    Granted,
    /// A credential was presented and it was wrong
    Rejected,
    /// No credential at all
    Anonymous,
    /// `ADMIN_TOKEN` is not configured
    Disabled,
}

pub async fn check_admin(
    headers: &HeaderMap,
    config: &Config,
    sessions: &SessionStore,
) -> AdminAccess {
    let Some(admin_token) = config.admin_token.as_deref() else {
        return AdminAccess::Disabled;
    };

    let bearer = bearer_token(headers);
    if bearer.is_some_and(|b| tokens_match(b, admin_token)) {
        return AdminAccess::Granted;
    }

    // A live session still counts when a stale bearer header rides along
    match get_session_token(headers) {
        Some(token) if sessions.is_valid(&token).await => AdminAccess::Granted,
        _ if bearer.is_some() => AdminAccess::Rejected,
        _ => AdminAccess::Anonymous,
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

/// Compare without short-circuiting on the first differing byte
pub fn tokens_match(given: &str, expected: &str) -> bool {
    let (given, expected) = (given.as_bytes(), expected.as_bytes());
    if given.len() != expected.len() {
        return false;
    }
    given
        .iter()
        .zip(expected)
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

/// Extract session token from cookies
pub fn get_session_token(headers: &HeaderMap) -> Option<String> {
    let prefix = format!("{}=", SESSION_COOKIE);
    headers
        .get(header::COOKIE)?
        .to_str()
        .ok()?
        .split(';')
        .map(str::trim)
        .find_map(|cookie| cookie.strip_prefix(prefix.as_str()))
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

pub fn create_session_cookie(token: &str, secure: bool) -> String {
    format!(
        "{}={}; Path=/admin; HttpOnly; SameSite=Lax; Max-Age={}{}",
        SESSION_COOKIE,
        token,
        SESSION_TTL_SECS,
        if secure { "; Secure" } else { "" }
    )
}

/// Cookie that clears the session
pub fn create_logout_cookie() -> String {
    format!(
        "{}=; Path=/admin; HttpOnly; SameSite=Lax; Max-Age=0",
        SESSION_COOKIE
    )
}
