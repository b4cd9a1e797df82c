//! Signing and verification of the handoff envelope.
//!
//! The server signs every encoded snapshot with an Ed25519 key; clients only
//! hold the verifying key. Sealed form:
//!
//! ```text
//! base64url(payload) "." base64url(signature)
//! ```
//!
//! The signature covers [`SIGNING_CONTEXT`] followed by the payload bytes.
//! A verified payload is still subject to its `iat`/`exp` window, and each
//! render key is accepted at most once per [`SnapshotVerifier`].

use super::RenderKey;
use crate::identity::Error;
use base64ct::{Base64UrlUnpadded, Encoding};
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use parking_lot::Mutex;
use rand::{rngs::OsRng, RngCore};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tracing::trace;

pub const DEFAULT_SNAPSHOT_TTL: Duration = Duration::from_secs(60);
pub const MAX_SNAPSHOT_TTL: Duration = Duration::from_secs(600);

/// Accepted clock drift between the signing server and the client.
pub const CLOCK_SKEW_SECONDS: i64 = 30;

const SIGNING_CONTEXT: &[u8] = b"idbridge.identity-snapshot.v1\0";

/// Server side: signs encoded snapshots.
#[derive(Clone, Debug)]
pub struct SnapshotSigner {
    signing_key: SigningKey,
    ttl: Duration,
    verifier: Arc<SnapshotVerifier>,
}

impl SnapshotSigner {
    #[must_use]
    pub fn new(signing_key: SigningKey) -> Self {
        let verifier = Arc::new(SnapshotVerifier::new(signing_key.verifying_key()));
        Self {
            signing_key,
            ttl: DEFAULT_SNAPSHOT_TTL,
            verifier,
        }
    }

    /// Signer with a random key, valid for the life of the process.
    #[must_use]
    pub fn generate() -> Self {
        let mut seed = [0u8; 32];
        OsRng.fill_bytes(&mut seed);
        Self::new(SigningKey::from_bytes(&seed))
    }

    /// Signer from a base64url encoded 32 byte Ed25519 seed.
    ///
    /// # Errors
    /// Returns [`Error::InvalidArgument`] when the seed is not 32 bytes of
    /// base64url.
    pub fn from_base64(seed: &str) -> Result<Self, Error> {
        let seed: [u8; 32] = decode_fixed(seed, "signing key")?;
        Ok(Self::new(SigningKey::from_bytes(&seed)))
    }

    /// Validity window of sealed snapshots, clamped to `1s..=MAX_SNAPSHOT_TTL`.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl.clamp(Duration::from_secs(1), MAX_SNAPSHOT_TTL);
        self
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    #[must_use]
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// The verifying key in the form [`SnapshotVerifier::from_base64`] reads.
    #[must_use]
    pub fn verifying_key_base64(&self) -> String {
        Base64UrlUnpadded::encode_string(&self.verifying_key().to_bytes())
    }

    /// Verifier for payloads sealed in this process.
    #[must_use]
    pub fn verifier(&self) -> Arc<SnapshotVerifier> {
        Arc::clone(&self.verifier)
    }

    pub(super) fn sign(&self, payload: &[u8]) -> String {
        let signature = self.signing_key.sign(&signing_input(payload));
        format!(
            "{}.{}",
            Base64UrlUnpadded::encode_string(payload),
            Base64UrlUnpadded::encode_string(&signature.to_bytes())
        )
    }
}

impl Default for SnapshotSigner {
    fn default() -> Self {
        Self::generate()
    }
}

/// Client side: checks signatures and remembers consumed render keys.
#[derive(Debug)]
pub struct SnapshotVerifier {
    verifying_key: VerifyingKey,
    // render key -> exp (unix seconds); entries are pruned once expired.
    consumed: Mutex<HashMap<RenderKey, i64>>,
}

impl SnapshotVerifier {
    #[must_use]
    pub fn new(verifying_key: VerifyingKey) -> Self {
        Self {
            verifying_key,
            consumed: Mutex::new(HashMap::new()),
        }
    }

    /// # Errors
    /// Returns [`Error::InvalidArgument`] when the value is not a base64url
    /// encoded Ed25519 public key.
    pub fn from_base64(encoded: &str) -> Result<Self, Error> {
        let bytes: [u8; 32] = decode_fixed(encoded, "verifying key")?;
        let verifying_key = VerifyingKey::from_bytes(&bytes)
            .map_err(|_| Error::InvalidArgument("verifying key is not an Ed25519 point".into()))?;
        Ok(Self::new(verifying_key))
    }

    #[must_use]
    pub fn verifying_key(&self) -> &VerifyingKey {
        &self.verifying_key
    }

    /// Check the signature and return the signed payload bytes.
    pub(super) fn verify(&self, sealed: &str) -> Result<Vec<u8>, Error> {
        let (payload, signature) = sealed
            .trim()
            .split_once('.')
            .ok_or_else(|| Error::SchemaMismatch("payload is not signed".to_string()))?;
        let payload = Base64UrlUnpadded::decode_vec(payload)
            .map_err(|_| Error::SchemaMismatch("payload is not base64url".to_string()))?;
        let signature = Base64UrlUnpadded::decode_vec(signature)
            .ok()
            .and_then(|bytes| Signature::from_slice(&bytes).ok())
            .ok_or_else(|| Error::SchemaMismatch("malformed signature".to_string()))?;

        self.verifying_key
            .verify_strict(&signing_input(&payload), &signature)
            .map_err(|_| Error::SchemaMismatch("signature verification failed".to_string()))?;
        Ok(payload)
    }

    /// Record `key` as consumed until `expires_at`.
    pub(super) fn consume(&self, key: &RenderKey, expires_at: i64, now: i64) -> Result<(), Error> {
        let mut consumed = self.consumed.lock();
        consumed.retain(|_, exp| *exp > now);
        if consumed.contains_key(key) {
            return Err(Error::SchemaMismatch(format!(
                "snapshot for render key {key} was already consumed"
            )));
        }
        consumed.insert(*key, expires_at);
        trace!(render_key = %key, "handoff consumed");
        Ok(())
    }
}

fn signing_input(payload: &[u8]) -> Vec<u8> {
    let mut input = Vec::with_capacity(SIGNING_CONTEXT.len() + payload.len());
    input.extend_from_slice(SIGNING_CONTEXT);
    input.extend_from_slice(payload);
    input
}

fn decode_fixed<const N: usize>(encoded: &str, what: &str) -> Result<[u8; N], Error> {
    Base64UrlUnpadded::decode_vec(encoded.trim())
        .ok()
        .and_then(|bytes| <[u8; N]>::try_from(bytes).ok())
        .ok_or_else(|| Error::InvalidArgument(format!("{what} must be {N} bytes of base64url")))
}
