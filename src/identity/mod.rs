//! Identity model shared by the server render pass and the client runtime.
//!
//! A [`Principal`] is an ordered list of [`Claim`]s plus an authenticated flag.
//! Principals are immutable; a new principal replaces an old one wholesale.
//! Unauthenticated principals never carry claims, which is enforced by only
//! exposing [`Principal::anonymous`] for that state.

pub mod claims;
mod error;
pub mod policy;

pub use error::Error;
pub use policy::{ClaimRequirement, Decision, Policy, PolicyRegistry, PolicyRegistryBuilder};

use serde::{Deserialize, Serialize};

/// Well-known claim types.
pub mod claim_types {
    /// Stable user identifier.
    pub const USER_ID: &str = "idbridge/user-id";
    /// Human readable display name.
    pub const DISPLAY_NAME: &str = "idbridge/name";
    /// Organizational identifier, a typical deployment-declared domain claim.
    pub const ORGANIZATION_ID: &str = "idbridge/org-id";
}

/// An immutable `(type, value)` fact about a principal.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Claim {
    #[serde(rename = "type")]
    claim_type: String,
    value: String,
}

impl Claim {
    #[must_use]
    pub fn new(claim_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            claim_type: claim_type.into(),
            value: value.into(),
        }
    }

    #[must_use]
    pub fn claim_type(&self) -> &str {
        &self.claim_type
    }

    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Principal {
    authenticated: bool,
    claims: Vec<Claim>,
}

impl Principal {
    /// The unauthenticated principal. It carries no claims.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// An authenticated principal with claims kept in insertion order.
    ///
    /// Whether the claims are sufficient for a handoff is decided at the trust
    /// boundary by the materializers, not here, since the claims come from the
    /// external authentication subsystem.
    #[must_use]
    pub fn authenticated(claims: impl IntoIterator<Item = Claim>) -> Self {
        Self {
            authenticated: true,
            claims: claims.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    #[must_use]
    pub fn claims(&self) -> &[Claim] {
        &self.claims
    }

    /// Returns true when any claim of `claim_type` carries `value`.
    #[must_use]
    pub fn has_claim(&self, claim_type: &str, value: &str) -> bool {
        self.claims
            .iter()
            .any(|claim| claim.claim_type == claim_type && claim.value == value)
    }
}

#[cfg(test)]
mod tests {
    use super::{claim_types, Claim, Principal};

    #[test]
    fn anonymous_principal_has_no_claims() {
        let principal = Principal::anonymous();
        assert!(!principal.is_authenticated());
        assert!(principal.claims().is_empty());
        assert_eq!(principal, Principal::default());
    }

    #[test]
    fn authenticated_principal_keeps_insertion_order() {
        let principal = Principal::authenticated([
            Claim::new(claim_types::USER_ID, "u1"),
            Claim::new("employeeID", "7"),
            Claim::new("employeeID", "8"),
        ]);

        assert!(principal.is_authenticated());
        let values: Vec<&str> = principal.claims().iter().map(Claim::value).collect();
        assert_eq!(values, vec!["u1", "7", "8"]);
        assert!(principal.has_claim("employeeID", "8"));
        assert!(!principal.has_claim("employeeID", "9"));
    }

    #[test]
    fn claim_serializes_type_field() -> serde_json::Result<()> {
        let claim = Claim::new("employeeID", "1");
        let json = serde_json::to_string(&claim)?;
        assert_eq!(json, r#"{"type":"employeeID","value":"1"}"#);
        let decoded: Claim = serde_json::from_str(&json)?;
        assert_eq!(decoded, claim);
        Ok(())
    }
}
