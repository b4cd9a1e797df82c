//! Typed lookups over a principal's claims.
//!
//! Lookups are first-match-wins in insertion order; later claims of the same
//! type are ignored. Absence is returned as `None` and callers decide whether
//! it is fatal.

use super::{claim_types, Error, Principal};

/// Returns the value of the first claim of `claim_type`.
///
/// # Errors
/// Returns [`Error::InvalidArgument`] when `claim_type` is blank, which is a
/// caller bug rather than a missing claim.
pub fn lookup<'a>(principal: &'a Principal, claim_type: &str) -> Result<Option<&'a str>, Error> {
    if claim_type.trim().is_empty() {
        return Err(Error::InvalidArgument(
            "claim type must not be empty".to_string(),
        ));
    }
    Ok(first_match(principal, claim_type))
}

#[must_use]
pub fn user_id(principal: &Principal) -> Option<&str> {
    first_match(principal, claim_types::USER_ID)
}

#[must_use]
pub fn display_name(principal: &Principal) -> Option<&str> {
    first_match(principal, claim_types::DISPLAY_NAME)
}

#[must_use]
pub fn organization_id(principal: &Principal) -> Option<&str> {
    first_match(principal, claim_types::ORGANIZATION_ID)
}

fn first_match<'a>(principal: &'a Principal, claim_type: &str) -> Option<&'a str> {
    principal
        .claims()
        .iter()
        .find(|claim| claim.claim_type() == claim_type)
        .map(super::Claim::value)
}
