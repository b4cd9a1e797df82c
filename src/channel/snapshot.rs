//! Versioned identity snapshot and its wire format.
//!
//! Wire format: a JSON object, base64url encoded without padding and signed
//! (see [`super::seal`]) so it can be embedded in markup verbatim.
//!
//! ```text
//! {"schema":"idbridge.identity-snapshot","version":1,"key":"<render key>",
//!  "iat":1700000000,"exp":1700000060,
//!  "userId":"u1","displayName":"Alice","employeeID":"1"}
//! ```
//!
//! Domain claims are spread at the top level next to the header fields, so
//! their types may not collide with [`RESERVED_FIELDS`].

use super::{
    seal::{SnapshotSigner, SnapshotVerifier, CLOCK_SKEW_SECONDS, MAX_SNAPSHOT_TTL},
    RenderKey,
};
use crate::identity::{claim_types, claims, Claim, Error, Principal};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

pub const SNAPSHOT_SCHEMA: &str = "idbridge.identity-snapshot";
pub const SNAPSHOT_VERSION: u64 = 1;

const FIELD_SCHEMA: &str = "schema";
const FIELD_VERSION: &str = "version";
const FIELD_KEY: &str = "key";
const FIELD_ISSUED_AT: &str = "iat";
const FIELD_EXPIRES_AT: &str = "exp";
const FIELD_USER_ID: &str = "userId";
const FIELD_DISPLAY_NAME: &str = "displayName";

pub const RESERVED_FIELDS: [&str; 7] = [
    FIELD_SCHEMA,
    FIELD_VERSION,
    FIELD_KEY,
    FIELD_ISSUED_AT,
    FIELD_EXPIRES_AT,
    FIELD_USER_ID,
    FIELD_DISPLAY_NAME,
];

/// The projection of a principal that crosses the render boundary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdentitySnapshot {
    user_id: String,
    display_name: String,
    domain_claims: BTreeMap<String, String>,
}

impl IdentitySnapshot {
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    #[must_use]
    pub fn domain_claims(&self) -> &BTreeMap<String, String> {
        &self.domain_claims
    }

    /// Rebuild an authenticated principal from the snapshot.
    #[must_use]
    pub fn into_principal(self) -> Principal {
        let mut claims = vec![
            Claim::new(claim_types::USER_ID, self.user_id),
            Claim::new(claim_types::DISPLAY_NAME, self.display_name),
        ];
        claims.extend(
            self.domain_claims
                .into_iter()
                .map(|(claim_type, value)| Claim::new(claim_type, value)),
        );
        Principal::authenticated(claims)
    }
}

/// Which domain claims a deployment carries in the snapshot.
///
/// The user id and display name are always required.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SnapshotSchema {
    required: BTreeSet<String>,
    optional: BTreeSet<String>,
}

impl SnapshotSchema {
    /// # Errors
    /// Returns [`Error::InvalidArgument`] for blank or reserved claim types and
    /// for a type declared both required and optional.
    pub fn new<R, O, S>(required: R, optional: O) -> Result<Self, Error>
    where
        R: IntoIterator<Item = S>,
        O: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let required: BTreeSet<String> = required.into_iter().map(Into::into).collect();
        let optional: BTreeSet<String> = optional.into_iter().map(Into::into).collect();

        for claim_type in required.iter().chain(optional.iter()) {
            if claim_type.trim().is_empty() {
                return Err(Error::InvalidArgument(
                    "snapshot claim type must not be empty".to_string(),
                ));
            }
            if RESERVED_FIELDS.contains(&claim_type.as_str())
                || claim_type == claim_types::USER_ID
                || claim_type == claim_types::DISPLAY_NAME
            {
                return Err(Error::InvalidArgument(format!(
                    "snapshot claim type '{claim_type}' is reserved"
                )));
            }
        }

        if let Some(both) = required.intersection(&optional).next() {
            return Err(Error::InvalidArgument(format!(
                "snapshot claim type '{both}' is both required and optional"
            )));
        }

        Ok(Self { required, optional })
    }

    #[must_use]
    pub fn required(&self) -> &BTreeSet<String> {
        &self.required
    }

    #[must_use]
    pub fn optional(&self) -> &BTreeSet<String> {
        &self.optional
    }

    /// Project an authenticated principal.
    ///
    /// # Errors
    /// Returns [`Error::MaterializationFault`] naming every missing required
    /// claim, and [`Error::InvalidArgument`] for an unauthenticated principal.
    pub fn project(&self, principal: &Principal) -> Result<IdentitySnapshot, Error> {
        if !principal.is_authenticated() {
            return Err(Error::InvalidArgument(
                "cannot project an unauthenticated principal".to_string(),
            ));
        }

        let mut missing = Vec::new();
        let user_id = non_empty(claims::user_id(principal));
        if user_id.is_none() {
            missing.push(claim_types::USER_ID.to_string());
        }
        let display_name = non_empty(claims::display_name(principal));
        if display_name.is_none() {
            missing.push(claim_types::DISPLAY_NAME.to_string());
        }

        let mut domain_claims = BTreeMap::new();
        for claim_type in &self.required {
            match claims::lookup(principal, claim_type)? {
                Some(value) => {
                    domain_claims.insert(claim_type.clone(), value.to_string());
                }
                None => missing.push(claim_type.clone()),
            }
        }
        for claim_type in &self.optional {
            if let Some(value) = claims::lookup(principal, claim_type)? {
                domain_claims.insert(claim_type.clone(), value.to_string());
            }
        }

        match (user_id, display_name) {
            (Some(user_id), Some(display_name)) if missing.is_empty() => Ok(IdentitySnapshot {
                user_id: user_id.to_string(),
                display_name: display_name.to_string(),
                domain_claims,
            }),
            _ => Err(Error::MaterializationFault { missing }),
        }
    }

    /// Keep only the claims this schema declares and check required ones.
    ///
    /// # Errors
    /// Returns [`Error::SchemaMismatch`] when a required claim is absent.
    pub fn conform(&self, snapshot: IdentitySnapshot) -> Result<IdentitySnapshot, Error> {
        let missing: Vec<&str> = self
            .required
            .iter()
            .filter(|claim_type| !snapshot.domain_claims.contains_key(*claim_type))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(Error::SchemaMismatch(format!(
                "snapshot lacks required claims: {}",
                missing.join(", ")
            )));
        }

        let IdentitySnapshot {
            user_id,
            display_name,
            domain_claims,
        } = snapshot;
        let domain_claims = domain_claims
            .into_iter()
            .filter(|(claim_type, _)| {
                self.required.contains(claim_type) || self.optional.contains(claim_type)
            })
            .collect();

        Ok(IdentitySnapshot {
            user_id,
            display_name,
            domain_claims,
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.trim().is_empty())
}

/// Encode and sign a snapshot bound to `key`, valid from `issued_at` (unix
/// seconds) for the signer's TTL.
#[must_use]
pub fn encode(
    snapshot: &IdentitySnapshot,
    key: &RenderKey,
    signer: &SnapshotSigner,
    issued_at: i64,
) -> String {
    let ttl = i64::try_from(signer.ttl().as_secs()).unwrap_or(1);
    let mut object = Map::new();
    object.insert(FIELD_SCHEMA.to_string(), Value::from(SNAPSHOT_SCHEMA));
    object.insert(FIELD_VERSION.to_string(), Value::from(SNAPSHOT_VERSION));
    object.insert(FIELD_KEY.to_string(), Value::from(key.to_string()));
    object.insert(FIELD_ISSUED_AT.to_string(), Value::from(issued_at));
    object.insert(
        FIELD_EXPIRES_AT.to_string(),
        Value::from(issued_at.saturating_add(ttl)),
    );
    object.insert(
        FIELD_USER_ID.to_string(),
        Value::from(snapshot.user_id.as_str()),
    );
    object.insert(
        FIELD_DISPLAY_NAME.to_string(),
        Value::from(snapshot.display_name.as_str()),
    );
    for (claim_type, value) in &snapshot.domain_claims {
        object.insert(claim_type.clone(), Value::from(value.as_str()));
    }

    signer.sign(Value::Object(object).to_string().as_bytes())
}

/// Verify and decode a snapshot.
///
/// Order: signature, schema tag, version, render key, validity window, then
/// the identity fields. The render key is marked consumed in `verifier` only
/// once everything else has passed.
///
/// # Errors
/// Every failure is reported as [`Error::SchemaMismatch`]; nothing is
/// partially decoded.
pub fn decode(
    sealed: &str,
    expected_key: &RenderKey,
    verifier: &SnapshotVerifier,
    now: i64,
) -> Result<IdentitySnapshot, Error> {
    let bytes = verifier.verify(sealed)?;
    let value: Value = serde_json::from_slice(&bytes)
        .map_err(|err| Error::SchemaMismatch(format!("payload is not JSON: {err}")))?;
    let Value::Object(mut object) = value else {
        return Err(Error::SchemaMismatch(
            "payload is not a JSON object".to_string(),
        ));
    };

    let schema = object.remove(FIELD_SCHEMA);
    if schema.as_ref().and_then(Value::as_str) != Some(SNAPSHOT_SCHEMA) {
        return Err(Error::SchemaMismatch(format!(
            "expected schema {SNAPSHOT_SCHEMA}, found {}",
            schema.map_or_else(|| "none".to_string(), |s| s.to_string())
        )));
    }

    let version = object.remove(FIELD_VERSION).and_then(|v| v.as_u64());
    if version != Some(SNAPSHOT_VERSION) {
        return Err(Error::SchemaMismatch(format!(
            "expected version {SNAPSHOT_VERSION}, found {}",
            version.map_or_else(|| "none".to_string(), |v| v.to_string())
        )));
    }

    let key = take_string(&mut object, FIELD_KEY)?;
    if key != expected_key.to_string() {
        return Err(Error::SchemaMismatch(
            "snapshot is bound to a different render key".to_string(),
        ));
    }

    let issued_at = take_timestamp(&mut object, FIELD_ISSUED_AT)?;
    let expires_at = take_timestamp(&mut object, FIELD_EXPIRES_AT)?;
    check_window(issued_at, expires_at, now)?;

    let user_id = take_string(&mut object, FIELD_USER_ID)?;
    let display_name = take_string(&mut object, FIELD_DISPLAY_NAME)?;

    let mut domain_claims = BTreeMap::new();
    for (claim_type, value) in object {
        match value {
            Value::String(value) => {
                domain_claims.insert(claim_type, value);
            }
            _ => {
                return Err(Error::SchemaMismatch(format!(
                    "claim {claim_type} is not a string"
                )))
            }
        }
    }

    verifier.consume(expected_key, expires_at, now)?;

    Ok(IdentitySnapshot {
        user_id,
        display_name,
        domain_claims,
    })
}

fn check_window(issued_at: i64, expires_at: i64, now: i64) -> Result<(), Error> {
    let max_ttl = i64::try_from(MAX_SNAPSHOT_TTL.as_secs()).unwrap_or(i64::MAX);
    if expires_at <= now {
        return Err(Error::SchemaMismatch("snapshot expired".to_string()));
    }
    if issued_at > now.saturating_add(CLOCK_SKEW_SECONDS) {
        return Err(Error::SchemaMismatch(
            "snapshot issued in the future".to_string(),
        ));
    }
    if expires_at <= issued_at || expires_at - issued_at > max_ttl {
        return Err(Error::SchemaMismatch(
            "snapshot validity window is invalid".to_string(),
        ));
    }
    Ok(())
}

fn take_timestamp(object: &mut Map<String, Value>, field: &str) -> Result<i64, Error> {
    object
        .remove(field)
        .and_then(|value| value.as_i64())
        .ok_or_else(|| Error::SchemaMismatch(format!("required field {field} is missing")))
}

fn take_string(object: &mut Map<String, Value>, field: &str) -> Result<String, Error> {
    match object.remove(field) {
        Some(Value::String(value)) if !value.trim().is_empty() => Ok(value),
        _ => Err(Error::SchemaMismatch(format!(
            "required field {field} is missing"
        ))),
    }
}
