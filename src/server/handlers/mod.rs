pub mod handoff_key;
pub mod health;
pub mod logout;
pub mod me;
pub mod render;

use super::session::{resolve_principal, SessionStore};
use crate::identity::Principal;
use axum::http::{HeaderMap, StatusCode};

/// Resolve the session credential into an authenticated principal, or 401.
pub(crate) fn require_auth(
    headers: &HeaderMap,
    sessions: &dyn SessionStore,
) -> Result<Principal, StatusCode> {
    let principal = resolve_principal(headers, sessions);
    if principal.is_authenticated() {
        Ok(principal)
    } else {
        Err(StatusCode::UNAUTHORIZED)
    }
}
