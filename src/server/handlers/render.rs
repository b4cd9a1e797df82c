//! Server render pass.
//!
//! Each request gets its own render cycle. Contract violations inside the
//! identity bridge never fail the render; the page is still served, only
//! without an identity, so the worst case is an extra login prompt.

use crate::server::{session::resolve_principal, AppState};
use axum::{
    extract::Extension,
    http::{header::CACHE_CONTROL, HeaderMap, HeaderValue},
    response::{Html, IntoResponse},
};
use std::sync::Arc;
use tracing::{error, instrument};

// axum handler for the page shell
#[instrument(skip_all)]
pub async fn render(headers: HeaderMap, state: Extension<Arc<AppState>>) -> impl IntoResponse {
    let principal = resolve_principal(&headers, state.sessions());

    let mut cycle = state.channel().begin();
    if let Err(err) = state.materializer().materialize(&principal, &cycle) {
        error!(render_key = %cycle.key(), "handoff contract violation: {err}");
        // Start over with an empty slot rather than emit anything from the
        // faulty cycle.
        cycle = state.channel().begin();
    }

    let handoff = cycle.seal(state.config().signer()).into_html();

    let mut response_headers = HeaderMap::new();
    response_headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));

    (response_headers, Html(page(&handoff)))
}

fn page(handoff: &str) -> String {
    format!(
        concat!(
            "<!DOCTYPE html>\n",
            "<html lang=\"en\">\n",
            "<head><meta charset=\"utf-8\"><title>{name}</title></head>\n",
            "<body>\n",
            "<div id=\"app\"></div>\n",
            "{handoff}\n",
            "</body>\n",
            "</html>\n"
        ),
        name = env!("CARGO_PKG_NAME"),
        handoff = handoff
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{HandoffSource, PersistedState, SnapshotSchema};
    use crate::identity::{claim_types, Claim, Principal};
    use crate::server::{MemorySessionStore, ServerConfig};
    use anyhow::Result;
    use axum::{body::to_bytes, http::StatusCode};
    use secrecy::SecretString;

    fn state(required: &[&str]) -> Result<Arc<AppState>> {
        let sessions = MemorySessionStore::new();
        sessions.insert(
            SecretString::from("t1"),
            Principal::authenticated([
                Claim::new(claim_types::USER_ID, "u1"),
                Claim::new(claim_types::DISPLAY_NAME, "Alice"),
                Claim::new("employeeID", "1"),
            ]),
        );
        let config = ServerConfig::new().with_schema(SnapshotSchema::new(
            required.iter().copied(),
            Vec::<&str>::new(),
        )?);
        Ok(Arc::new(AppState::new(config, Arc::new(sessions))))
    }

    async fn body(state: Arc<AppState>, cookie: Option<&str>) -> Result<(StatusCode, String)> {
        let mut headers = HeaderMap::new();
        if let Some(cookie) = cookie {
            headers.insert("cookie", HeaderValue::from_str(cookie)?);
        }
        let response = render(headers, Extension(state)).await.into_response();
        let status = response.status();
        assert_eq!(
            response.headers().get(CACHE_CONTROL),
            Some(&HeaderValue::from_static("no-store"))
        );
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        Ok((status, String::from_utf8(bytes.to_vec())?))
    }

    #[tokio::test]
    async fn authenticated_render_embeds_snapshot() -> Result<()> {
        let state = state(&["employeeID"])?;
        let (status, html) = body(Arc::clone(&state), Some("idbridge_session=t1")).await?;
        assert_eq!(status, StatusCode::OK);

        let persisted = PersistedState::from_document(&html, state.config().signer().verifier())?;
        let snapshot = persisted.take(persisted.key())?;
        assert_eq!(snapshot.map(|s| s.display_name().to_string()), Some("Alice".to_string()));
        assert_eq!(state.channel().open_cycles(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn anonymous_render_embeds_empty_handoff() -> Result<()> {
        let state = state(&[])?;
        let (_, html) = body(Arc::clone(&state), None).await?;
        let persisted = PersistedState::from_document(&html, state.config().signer().verifier())?;
        assert_eq!(persisted.take(persisted.key())?, None);
        Ok(())
    }

    #[tokio::test]
    async fn missing_claim_renders_without_identity() -> Result<()> {
        let state = state(&["idbridge/org-id"])?;
        let (status, html) = body(Arc::clone(&state), Some("idbridge_session=t1")).await?;
        assert_eq!(status, StatusCode::OK);
        let persisted = PersistedState::from_document(&html, state.config().signer().verifier())?;
        assert_eq!(persisted.take(persisted.key())?, None);
        Ok(())
    }

    #[tokio::test]
    async fn every_render_uses_a_new_key() -> Result<()> {
        let state = state(&[])?;
        let (_, first) = body(Arc::clone(&state), Some("idbridge_session=t1")).await?;
        let (_, second) = body(Arc::clone(&state), Some("idbridge_session=t1")).await?;
        let verifier = state.config().signer().verifier();
        assert_ne!(
            PersistedState::from_document(&first, Arc::clone(&verifier))?.key(),
            PersistedState::from_document(&second, verifier)?.key()
        );
        Ok(())
    }
}
