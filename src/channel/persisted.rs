//! Render payload that carries a sealed handoff slot inside the document.
//!
//! The server embeds one element per page:
//!
//! ```html
//! <script id="idbridge-handoff" type="application/json" data-key="01J...">eyJ....c2ln</script>
//! ```
//!
//! The element body is empty when the render pass had no authenticated
//! identity. The hydrating client parses the element back into a
//! [`PersistedState`] and takes the snapshot from it exactly once. Parsing the
//! same document again does not help: the verifier remembers the render key.

use super::{
    seal::{SnapshotSigner, SnapshotVerifier},
    snapshot, HandoffSource, IdentitySnapshot, RenderKey,
};
use crate::identity::Error;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use std::sync::Arc;
use time::OffsetDateTime;

pub const HANDOFF_ELEMENT_ID: &str = "idbridge-handoff";

static HANDOFF_ELEMENT: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(&format!(
        r#"<script id="{HANDOFF_ELEMENT_ID}" type="application/json" data-key="([0-9A-Za-z]{{26}})">([A-Za-z0-9_.-]*)</script>"#
    ))
    .ok()
});

#[derive(Debug)]
pub struct PersistedState {
    key: RenderKey,
    payload: Mutex<Option<String>>,
    verifier: Arc<SnapshotVerifier>,
}

impl PersistedState {
    pub(super) fn sealed(
        key: RenderKey,
        snapshot: Option<&IdentitySnapshot>,
        signer: &SnapshotSigner,
    ) -> Self {
        let issued_at = OffsetDateTime::now_utc().unix_timestamp();
        Self {
            key,
            payload: Mutex::new(
                snapshot.map(|snapshot| snapshot::encode(snapshot, &key, signer, issued_at)),
            ),
            verifier: signer.verifier(),
        }
    }

    #[must_use]
    pub fn key(&self) -> &RenderKey {
        &self.key
    }

    /// Render the handoff element. Consumes the state so it is emitted once.
    #[must_use]
    pub fn into_html(self) -> String {
        let payload = self.payload.into_inner().unwrap_or_default();
        format!(
            r#"<script id="{HANDOFF_ELEMENT_ID}" type="application/json" data-key="{}">{payload}</script>"#,
            self.key
        )
    }

    /// Locate and parse the handoff element of a rendered document. The
    /// payload is verified against `verifier` when it is taken.
    ///
    /// # Errors
    /// Returns [`Error::InvalidArgument`] when the document carries no
    /// well-formed handoff element.
    pub fn from_document(document: &str, verifier: Arc<SnapshotVerifier>) -> Result<Self, Error> {
        let re = HANDOFF_ELEMENT
            .as_ref()
            .ok_or_else(|| Error::InvalidArgument("handoff pattern failed to compile".into()))?;
        let captures = re.captures(document).ok_or_else(|| {
            Error::InvalidArgument("document has no handoff element".to_string())
        })?;

        let key = captures
            .get(1)
            .map_or("", |m| m.as_str())
            .parse::<RenderKey>()?;
        let payload = captures
            .get(2)
            .map(|m| m.as_str().to_string())
            .filter(|payload| !payload.is_empty());

        Ok(Self {
            key,
            payload: Mutex::new(payload),
            verifier,
        })
    }
}

impl HandoffSource for PersistedState {
    fn take(&self, key: &RenderKey) -> Result<Option<IdentitySnapshot>, Error> {
        if key != &self.key {
            return Ok(None);
        }
        let Some(payload) = self.payload.lock().take() else {
            return Ok(None);
        };
        let now = OffsetDateTime::now_utc().unix_timestamp();
        snapshot::decode(&payload, &self.key, &self.verifier, now).map(Some)
    }
}
