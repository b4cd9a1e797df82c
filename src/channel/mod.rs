//! Single-use, render-scoped handoff of an identity snapshot.
//!
//! Flow Overview: a render pass opens a [`RenderCycle`] which owns one slot
//! in the [`HandoffChannel`], keyed by a fresh [`RenderKey`]. The slot is
//! written at most once and read at most once; it is discarded after the read
//! or when the cycle ends, whichever comes first. A retried render pass opens a
//! new cycle and never sees a partially written slot from an earlier attempt.
//!
//! Sealing signs the slot content for the page; the client verifies the
//! signature and accepts each render key once (see [`seal`]).

mod persisted;
pub mod seal;
pub mod snapshot;

pub use persisted::{PersistedState, HANDOFF_ELEMENT_ID};
pub use seal::{SnapshotSigner, SnapshotVerifier, DEFAULT_SNAPSHOT_TTL};
pub use snapshot::{IdentitySnapshot, SnapshotSchema, SNAPSHOT_SCHEMA, SNAPSHOT_VERSION};

use crate::identity::Error;
use parking_lot::Mutex;
use std::{collections::HashMap, fmt, str::FromStr, sync::Arc};
use tracing::{debug, trace};
use ulid::Ulid;

/// Correlation key of a single render cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RenderKey(Ulid);

impl RenderKey {
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for RenderKey {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RenderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RenderKey {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(value.trim())
            .map(Self)
            .map_err(|_| Error::InvalidArgument(format!("invalid render key: '{value}'")))
    }
}

/// Anything that can hand out the snapshot for a render key exactly once.
pub trait HandoffSource: Send + Sync {
    /// Remove and return the snapshot stored under `key`.
    ///
    /// Any read after the first returns `Ok(None)`.
    ///
    /// # Errors
    /// Returns [`Error::SchemaMismatch`] when a stored payload cannot be
    /// decoded by this schema version.
    fn take(&self, key: &RenderKey) -> Result<Option<IdentitySnapshot>, Error>;
}

#[derive(Debug, Default)]
struct Slot {
    snapshot: Option<IdentitySnapshot>,
    written: bool,
    read: bool,
}

/// Slots of every render cycle currently in flight.
#[derive(Debug, Default)]
pub struct HandoffChannel {
    slots: Mutex<HashMap<RenderKey, Slot>>,
}

impl HandoffChannel {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Open a render cycle with an empty slot under a fresh key.
    #[must_use]
    pub fn begin(self: &Arc<Self>) -> RenderCycle {
        let key = RenderKey::new();
        self.slots.lock().insert(key, Slot::default());
        trace!(render_key = %key, "render cycle opened");
        RenderCycle {
            channel: Arc::clone(self),
            key,
        }
    }

    /// Write the snapshot for `key`.
    ///
    /// # Errors
    /// - [`Error::DuplicateWrite`] when the slot was already written; the first
    ///   snapshot is kept.
    /// - [`Error::InvalidArgument`] when no cycle is open for `key` or the slot
    ///   was already read.
    pub fn put(&self, key: &RenderKey, snapshot: IdentitySnapshot) -> Result<(), Error> {
        let mut slots = self.slots.lock();
        let slot = slots.get_mut(key).ok_or_else(|| {
            Error::InvalidArgument(format!("no open render cycle for key {key}"))
        })?;
        if slot.written {
            return Err(Error::DuplicateWrite(key.to_string()));
        }
        if slot.read {
            return Err(Error::InvalidArgument(format!(
                "handoff slot {key} was already read"
            )));
        }
        slot.written = true;
        slot.snapshot = Some(snapshot);
        Ok(())
    }

    /// Number of render cycles currently open.
    #[must_use]
    pub fn open_cycles(&self) -> usize {
        self.slots.lock().len()
    }

    fn discard(&self, key: &RenderKey) {
        if self.slots.lock().remove(key).is_some() {
            trace!(render_key = %key, "render cycle closed");
        }
    }
}

impl HandoffSource for HandoffChannel {
    fn take(&self, key: &RenderKey) -> Result<Option<IdentitySnapshot>, Error> {
        let mut slots = self.slots.lock();
        Ok(slots.get_mut(key).and_then(|slot| {
            slot.read = true;
            slot.snapshot.take()
        }))
    }
}

/// Ownership of one slot for the duration of a render pass.
///
/// Dropping the cycle discards the slot, so nothing outlives the pass.
#[derive(Debug)]
pub struct RenderCycle {
    channel: Arc<HandoffChannel>,
    key: RenderKey,
}

impl RenderCycle {
    #[must_use]
    pub fn key(&self) -> &RenderKey {
        &self.key
    }

    /// # Errors
    /// See [`HandoffChannel::put`].
    pub fn put(&self, snapshot: IdentitySnapshot) -> Result<(), Error> {
        self.channel.put(&self.key, snapshot)
    }

    /// Move the slot content into the signed render payload and end the
    /// cycle.
    ///
    /// This is the single read on the server side; afterwards the snapshot
    /// only exists inside the returned [`PersistedState`].
    #[must_use]
    pub fn seal(self, signer: &SnapshotSigner) -> PersistedState {
        let snapshot = self
            .channel
            .take(&self.key)
            .ok()
            .flatten();
        debug!(
            render_key = %self.key,
            authenticated = snapshot.is_some(),
            "render cycle sealed"
        );
        PersistedState::sealed(self.key, snapshot.as_ref(), signer)
    }
}

impl Drop for RenderCycle {
    fn drop(&mut self) {
        self.channel.discard(&self.key);
    }
}
