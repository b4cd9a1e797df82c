//! Named authorization policies evaluated against a principal's claims.
//!
//! A policy is a conjunction of [`ClaimRequirement`]s, each one satisfied when
//! any claim of the required type carries one of the allowed values. Every
//! policy also requires an authenticated principal. Policies are declared at
//! startup through [`PolicyRegistryBuilder`]; the built [`PolicyRegistry`] is
//! read-only.
//!
//! Declaration syntax accepted by [`Policy::from_str`]:
//! `NAME=TYPE:V1,V2[;TYPE2:V3]`, or just `NAME` for "any authenticated user".

use super::{Error, Principal};
use once_cell::sync::Lazy;
use regex::Regex;
use std::{
    collections::{BTreeSet, HashMap},
    str::FromStr,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    #[must_use]
    pub fn is_allowed(self) -> bool {
        self == Self::Allow
    }
}

/// Claim of type `claim_type` must have a value in `allowed`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClaimRequirement {
    claim_type: String,
    allowed: BTreeSet<String>,
}

impl ClaimRequirement {
    #[must_use]
    pub fn new<I, S>(claim_type: impl Into<String>, allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            claim_type: claim_type.into(),
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn claim_type(&self) -> &str {
        &self.claim_type
    }

    fn is_satisfied_by(&self, principal: &Principal) -> bool {
        principal.claims().iter().any(|claim| {
            claim.claim_type() == self.claim_type && self.allowed.contains(claim.value())
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Policy {
    name: String,
    requirements: Vec<ClaimRequirement>,
}

impl Policy {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            requirements: Vec::new(),
        }
    }

    #[must_use]
    pub fn require_claim<I, S>(mut self, claim_type: impl Into<String>, allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requirements
            .push(ClaimRequirement::new(claim_type, allowed));
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn requirements(&self) -> &[ClaimRequirement] {
        &self.requirements
    }

    /// Pure evaluation; safe to call on every render.
    #[must_use]
    pub fn evaluate(&self, principal: &Principal) -> Decision {
        if principal.is_authenticated()
            && self
                .requirements
                .iter()
                .all(|requirement| requirement.is_satisfied_by(principal))
        {
            Decision::Allow
        } else {
            Decision::Deny
        }
    }
}

static POLICY_NAME: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.:-]+$").ok());

fn valid_policy_name(name: &str) -> bool {
    POLICY_NAME.as_ref().is_some_and(|re| re.is_match(name))
}

impl FromStr for Policy {
    type Err = Error;

    fn from_str(declaration: &str) -> Result<Self, Self::Err> {
        let (name, body) = match declaration.split_once('=') {
            Some((name, body)) => (name.trim(), Some(body)),
            None => (declaration.trim(), None),
        };

        if !valid_policy_name(name) {
            return Err(Error::InvalidArgument(format!(
                "invalid policy name: '{name}'"
            )));
        }

        let mut policy = Self::new(name);
        for clause in body.into_iter().flat_map(|body| body.split(';')) {
            let clause = clause.trim();
            if clause.is_empty() {
                continue;
            }
            let (claim_type, values) = clause.split_once(':').ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "policy {name}: expected TYPE:V1,V2 but got '{clause}'"
                ))
            })?;
            let claim_type = claim_type.trim();
            let values: Vec<&str> = values
                .split(',')
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .collect();
            if claim_type.is_empty() || values.is_empty() {
                return Err(Error::InvalidArgument(format!(
                    "policy {name}: requirement '{clause}' needs a claim type and at least one value"
                )));
            }
            policy = policy.require_claim(claim_type, values);
        }

        Ok(policy)
    }
}

/// Read-only set of named policies.
#[derive(Clone, Debug, Default)]
pub struct PolicyRegistry {
    policies: HashMap<String, Policy>,
}

impl PolicyRegistry {
    #[must_use]
    pub fn builder() -> PolicyRegistryBuilder {
        PolicyRegistryBuilder::default()
    }

    /// Evaluate the named policy for `principal`.
    ///
    /// # Errors
    /// Returns [`Error::PolicyNotFound`] for unknown names; that is a
    /// configuration fault and never a `Deny`.
    pub fn evaluate(&self, principal: &Principal, policy_name: &str) -> Result<Decision, Error> {
        self.policies
            .get(policy_name)
            .map(|policy| policy.evaluate(principal))
            .ok_or_else(|| Error::PolicyNotFound(policy_name.to_string()))
    }

    #[must_use]
    pub fn contains(&self, policy_name: &str) -> bool {
        self.policies.contains_key(policy_name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct PolicyRegistryBuilder {
    policies: HashMap<String, Policy>,
}

impl PolicyRegistryBuilder {
    /// Register a policy.
    ///
    /// # Errors
    /// Returns [`Error::InvalidArgument`] when a policy with the same name is
    /// already registered.
    pub fn register(mut self, policy: Policy) -> Result<Self, Error> {
        if self.policies.contains_key(policy.name()) {
            return Err(Error::InvalidArgument(format!(
                "policy {} is declared more than once",
                policy.name()
            )));
        }
        self.policies.insert(policy.name().to_string(), policy);
        Ok(self)
    }

    /// Parse and register each declaration.
    ///
    /// # Errors
    /// Returns the first parse or registration error.
    pub fn declare<I, S>(self, declarations: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        declarations
            .into_iter()
            .try_fold(self, |builder, declaration| {
                builder.register(declaration.as_ref().parse()?)
            })
    }

    #[must_use]
    pub fn build(self) -> PolicyRegistry {
        PolicyRegistry {
            policies: self.policies,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Claim;

    fn registry() -> Result<PolicyRegistry, Error> {
        Ok(PolicyRegistry::builder()
            .register(Policy::new("MyPolicy").require_claim("employeeID", ["1", "2", "3"]))?
            .build())
    }

    fn with_employee(id: &str) -> Principal {
        Principal::authenticated([Claim::new("employeeID", id)])
    }

    #[test]
    fn allows_listed_value() -> Result<(), Error> {
        let registry = registry()?;
        assert_eq!(
            registry.evaluate(&with_employee("1"), "MyPolicy")?,
            Decision::Allow
        );
        Ok(())
    }

    #[test]
    fn denies_unlisted_value() -> Result<(), Error> {
        let registry = registry()?;
        assert_eq!(
            registry.evaluate(&with_employee("99"), "MyPolicy")?,
            Decision::Deny
        );
        Ok(())
    }

    #[test]
    fn denies_missing_claim_and_anonymous() -> Result<(), Error> {
        let registry = registry()?;
        let without = Principal::authenticated([Claim::new("department", "ops")]);
        assert_eq!(registry.evaluate(&without, "MyPolicy")?, Decision::Deny);
        assert_eq!(
            registry.evaluate(&Principal::anonymous(), "MyPolicy")?,
            Decision::Deny
        );
        Ok(())
    }

    #[test]
    fn any_claim_of_the_type_can_satisfy() -> Result<(), Error> {
        let registry = registry()?;
        let principal =
            Principal::authenticated([Claim::new("employeeID", "42"), Claim::new("employeeID", "3")]);
        assert!(registry.evaluate(&principal, "MyPolicy")?.is_allowed());
        Ok(())
    }

    #[test]
    fn unknown_policy_is_not_a_deny() -> Result<(), Error> {
        let registry = registry()?;
        assert_eq!(
            registry.evaluate(&with_employee("1"), "Missing"),
            Err(Error::PolicyNotFound("Missing".to_string()))
        );
        Ok(())
    }

    #[test]
    fn conjunction_requires_every_clause() -> Result<(), Error> {
        let policy: Policy = "Ops=employeeID:1,2;idbridge/org-id:acme".parse()?;
        assert_eq!(policy.requirements().len(), 2);

        let both = Principal::authenticated([
            Claim::new("employeeID", "2"),
            Claim::new("idbridge/org-id", "acme"),
        ]);
        let one = Principal::authenticated([Claim::new("employeeID", "2")]);
        assert_eq!(policy.evaluate(&both), Decision::Allow);
        assert_eq!(policy.evaluate(&one), Decision::Deny);
        Ok(())
    }

    #[test]
    fn bare_name_requires_authentication_only() -> Result<(), Error> {
        let policy: Policy = "Members".parse()?;
        assert!(policy.requirements().is_empty());
        assert_eq!(policy.evaluate(&Principal::authenticated([])), Decision::Allow);
        assert_eq!(policy.evaluate(&Principal::anonymous()), Decision::Deny);
        Ok(())
    }

    #[test]
    fn rejects_malformed_declarations() {
        assert!("".parse::<Policy>().is_err());
        assert!("bad name=a:b".parse::<Policy>().is_err());
        assert!("P=employeeID".parse::<Policy>().is_err());
        assert!("P=employeeID:".parse::<Policy>().is_err());
    }

    #[test]
    fn policy_name_pattern_compiles_once() {
        assert!(POLICY_NAME.is_some());
        assert!(valid_policy_name("team.leads:eu-west_1"));
        assert!(!valid_policy_name("team leads"));
        assert!(!valid_policy_name(""));
    }

    #[test]
    fn duplicate_declarations_are_rejected() {
        let result = PolicyRegistry::builder().declare(["A=t:1", "A=t:2"]);
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn declare_builds_read_only_registry() -> Result<(), Error> {
        let registry = PolicyRegistry::builder()
            .declare(["A=t:1", "B"])?
            .build();
        assert_eq!(registry.len(), 2);
        assert!(registry.contains("A"));
        assert!(registry.contains("B"));
        Ok(())
    }
}
