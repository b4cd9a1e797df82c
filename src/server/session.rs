//! Session credential resolution.
//!
//! The session credential is an opaque token owned by the external
//! authentication subsystem. It arrives either as the `idbridge_session`
//! cookie or as a bearer token, and is resolved through a [`SessionStore`].
//! The raw token is kept in a [`SecretString`] and never logged.

use crate::identity::{Claim, Principal};
use anyhow::{Context, Result};
use axum::http::{
    header::{InvalidHeaderValue, AUTHORIZATION, COOKIE},
    HeaderMap, HeaderValue,
};
use parking_lot::RwLock;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::{collections::HashMap, fs, path::Path};

pub const SESSION_COOKIE_NAME: &str = "idbridge_session";

/// Resolves session tokens into principals.
pub trait SessionStore: Send + Sync {
    /// Returns `None` for unknown, expired or revoked tokens.
    fn resolve(&self, token: &SecretString) -> Option<Principal>;

    /// Revoke a session. Returns true when a session was removed.
    fn revoke(&self, token: &SecretString) -> bool;
}

#[derive(Deserialize)]
struct SessionRecord {
    token: String,
    #[serde(default)]
    claims: Vec<Claim>,
}

/// In-memory session store, typically seeded from a JSON file:
///
/// ```json
/// [{"token": "t1", "claims": [{"type": "idbridge/user-id", "value": "u1"}]}]
/// ```
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, Principal>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read sessions file: {}", path.display()))?;
        Self::from_json(&raw)
            .with_context(|| format!("Failed to parse sessions file: {}", path.display()))
    }

    /// # Errors
    /// Returns an error if the JSON is not a list of session records.
    pub fn from_json(raw: &str) -> Result<Self> {
        let records: Vec<SessionRecord> = serde_json::from_str(raw)?;
        let store = Self::new();
        for record in records {
            store.insert(
                SecretString::from(record.token),
                Principal::authenticated(record.claims),
            );
        }
        Ok(store)
    }

    pub fn insert(&self, token: SecretString, principal: Principal) {
        self.sessions
            .write()
            .insert(token.expose_secret().to_string(), principal);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

impl SessionStore for MemorySessionStore {
    fn resolve(&self, token: &SecretString) -> Option<Principal> {
        self.sessions.read().get(token.expose_secret()).cloned()
    }

    fn revoke(&self, token: &SecretString) -> bool {
        self.sessions.write().remove(token.expose_secret()).is_some()
    }
}

/// Resolve the request's session into a principal.
///
/// Missing or unknown credentials yield the anonymous principal.
pub fn resolve_principal(headers: &HeaderMap, store: &dyn SessionStore) -> Principal {
    extract_session_token(headers)
        .and_then(|token| store.resolve(&token))
        .unwrap_or_else(Principal::anonymous)
}

pub(crate) fn extract_session_token(headers: &HeaderMap) -> Option<SecretString> {
    if let Some(token) = extract_bearer_token(headers) {
        return Some(token);
    }
    let value = headers.get(COOKIE)?.to_str().ok()?;
    value
        .split(';')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, val)| key.trim() == SESSION_COOKIE_NAME && !val.trim().is_empty())
        .map(|(_, val)| SecretString::from(val.trim().to_string()))
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<SecretString> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(SecretString::from(token.to_string()))
    }
}

/// Expire the session cookie.
pub(crate) fn clear_session_cookie(secure: bool) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}
