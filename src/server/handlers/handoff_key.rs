//! Publishes the key clients use to verify sealed identity snapshots.

use crate::server::AppState;
use axum::{extract::Extension, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

pub const KEY_ALGORITHM: &str = "Ed25519";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct HandoffKey {
    pub alg: String,
    /// base64url (unpadded) public key
    pub key: String,
    pub ttl_seconds: u64,
}

#[utoipa::path(
    get,
    path = "/v1/handoff/key",
    responses(
        (status = 200, description = "Verifying key of sealed identity snapshots.", body = HandoffKey),
    ),
    tag = "handoff"
)]
pub async fn handoff_key(state: Extension<Arc<AppState>>) -> impl IntoResponse {
    let signer = state.config().signer();
    Json(HandoffKey {
        alg: KEY_ALGORITHM.to_string(),
        key: signer.verifying_key_base64(),
        ttl_seconds: signer.ttl().as_secs(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{SnapshotSigner, SnapshotVerifier};
    use crate::server::{MemorySessionStore, ServerConfig};
    use anyhow::Result;
    use axum::body::to_bytes;
    use std::time::Duration;

    #[tokio::test]
    async fn publishes_the_signer_verifying_key() -> Result<()> {
        let signer = SnapshotSigner::generate().with_ttl(Duration::from_secs(30));
        let config = ServerConfig::new().with_signer(signer.clone());
        let state = Arc::new(AppState::new(config, Arc::new(MemorySessionStore::new())));

        let response = handoff_key(Extension(state)).await.into_response();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let key: HandoffKey = serde_json::from_slice(&bytes)?;

        assert_eq!(key.alg, KEY_ALGORITHM);
        assert_eq!(key.ttl_seconds, 30);
        let verifier = SnapshotVerifier::from_base64(&key.key)?;
        assert_eq!(verifier.verifying_key(), &signer.verifying_key());
        Ok(())
    }
}
