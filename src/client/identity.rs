use crate::channel::{HandoffSource, RenderKey, SnapshotSchema};
use crate::identity::{Principal, PolicyRegistry};
use tracing::{debug, error, warn};

/// The client-side identity, reconstructed once at startup.
///
/// It never refreshes itself. A revoked session is only discovered when the
/// resource service rejects a call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClientIdentity {
    principal: Principal,
}

impl ClientIdentity {
    /// Take the handed-off snapshot for `key` (exactly one read) and build the
    /// client principal from it.
    ///
    /// An absent snapshot yields the anonymous principal. An undecodable or
    /// non-conforming one is discarded with a diagnostic and also yields the
    /// anonymous principal.
    pub fn materialize(source: &dyn HandoffSource, key: &RenderKey, schema: &SnapshotSchema) -> Self {
        let snapshot = match source.take(key) {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                debug!(render_key = %key, "no identity handed off");
                return Self::default();
            }
            Err(err) => {
                warn!(render_key = %key, "discarding identity handoff: {err}");
                return Self::default();
            }
        };

        match schema.conform(snapshot) {
            Ok(snapshot) => {
                debug!(render_key = %key, user_id = snapshot.user_id(), "identity hydrated");
                Self {
                    principal: snapshot.into_principal(),
                }
            }
            Err(err) => {
                warn!(render_key = %key, "discarding identity handoff: {err}");
                Self::default()
            }
        }
    }

    #[must_use]
    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.principal.is_authenticated()
    }

    /// Whether a view guarded by `policy` may be rendered.
    ///
    /// Unknown policies hide the view and are reported as configuration faults.
    #[must_use]
    pub fn can_view(&self, policies: &PolicyRegistry, policy: &str) -> bool {
        match policies.evaluate(&self.principal, policy) {
            Ok(decision) => decision.is_allowed(),
            Err(err) => {
                error!("{err}");
                false
            }
        }
    }
}
