//! Server-side identity materialization for one render pass.

use crate::channel::{RenderCycle, SnapshotSchema};
use crate::identity::{Error, Principal};
use tracing::{debug, warn};

/// What a render pass handed off.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Materialization {
    /// The session is not authenticated; the slot stays empty.
    Anonymous,
    /// A snapshot was written to the slot.
    Written,
    /// The principal lacked required claims; nothing was written and the
    /// client starts unauthenticated.
    Suppressed,
}

#[derive(Clone, Debug, Default)]
pub struct ServerMaterializer {
    schema: SnapshotSchema,
}

impl ServerMaterializer {
    #[must_use]
    pub fn new(schema: SnapshotSchema) -> Self {
        Self { schema }
    }

    /// Write at most one snapshot of `principal` into the cycle's slot.
    ///
    /// Missing claims fail closed: the fault is logged and the pass proceeds
    /// as unauthenticated. The principal is only read.
    ///
    /// # Errors
    /// Returns [`Error::DuplicateWrite`] when the slot was already written in
    /// this cycle; the earlier snapshot is left untouched.
    pub fn materialize(
        &self,
        principal: &Principal,
        cycle: &RenderCycle,
    ) -> Result<Materialization, Error> {
        if !principal.is_authenticated() {
            debug!(render_key = %cycle.key(), "anonymous render pass, no handoff");
            return Ok(Materialization::Anonymous);
        }

        match self.schema.project(principal) {
            Ok(snapshot) => {
                cycle.put(snapshot)?;
                debug!(render_key = %cycle.key(), "identity snapshot written");
                Ok(Materialization::Written)
            }
            Err(err @ Error::MaterializationFault { .. }) => {
                warn!(render_key = %cycle.key(), "handoff suppressed: {err}");
                Ok(Materialization::Suppressed)
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{HandoffChannel, HandoffSource};
    use crate::identity::{claim_types, Claim};

    fn materializer() -> Result<ServerMaterializer, Error> {
        Ok(ServerMaterializer::new(SnapshotSchema::new(
            ["employeeID"],
            Vec::<&str>::new(),
        )?))
    }

    fn alice(with_employee: bool) -> Principal {
        let mut claims = vec![
            Claim::new(claim_types::USER_ID, "u1"),
            Claim::new(claim_types::DISPLAY_NAME, "Alice"),
        ];
        if with_employee {
            claims.push(Claim::new("employeeID", "1"));
        }
        Principal::authenticated(claims)
    }

    #[test]
    fn anonymous_writes_nothing() -> Result<(), Error> {
        let channel = HandoffChannel::new();
        let cycle = channel.begin();
        assert_eq!(
            materializer()?.materialize(&Principal::anonymous(), &cycle)?,
            Materialization::Anonymous
        );
        assert_eq!(channel.take(cycle.key())?, None);
        Ok(())
    }

    #[test]
    fn authenticated_writes_one_snapshot() -> Result<(), Error> {
        let channel = HandoffChannel::new();
        let cycle = channel.begin();
        let principal = alice(true);
        assert_eq!(
            materializer()?.materialize(&principal, &cycle)?,
            Materialization::Written
        );
        assert_eq!(principal, alice(true));

        let snapshot = channel.take(cycle.key())?;
        assert_eq!(snapshot.map(|s| s.user_id().to_string()), Some("u1".to_string()));
        Ok(())
    }

    #[test]
    fn missing_required_claim_fails_closed() -> Result<(), Error> {
        let channel = HandoffChannel::new();
        let cycle = channel.begin();
        assert_eq!(
            materializer()?.materialize(&alice(false), &cycle)?,
            Materialization::Suppressed
        );
        assert_eq!(channel.take(cycle.key())?, None);
        Ok(())
    }

    #[test]
    fn second_materialization_in_a_pass_is_rejected() -> Result<(), Error> {
        let channel = HandoffChannel::new();
        let cycle = channel.begin();
        let materializer = materializer()?;
        materializer.materialize(&alice(true), &cycle)?;

        assert!(matches!(
            materializer.materialize(&alice(true), &cycle),
            Err(Error::DuplicateWrite(_))
        ));
        Ok(())
    }
}
