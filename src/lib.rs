//! # idbridge (Identity Handoff)
//!
//! `idbridge` carries an authenticated identity from a server-executed render
//! pass into the client runtime that hydrates the rendered page, without the
//! client re-running the authentication protocol.
//!
//! ## Flow
//!
//! 1. The server resolves the session credential into a [`identity::Principal`].
//! 2. The [`server::ServerMaterializer`] projects the principal into a versioned
//!    [`channel::IdentitySnapshot`] and writes it once into the render cycle's
//!    [`channel::HandoffChannel`] slot.
//! 3. The cycle is sealed into the rendered document as a
//!    [`channel::PersistedState`], bound to the render key.
//! 4. The [`client::ClientIdentity`] takes the snapshot exactly once and becomes
//!    the read-only identity source for the rest of the client session.
//! 5. The [`client::ResourceClient`] gates outbound calls on that identity and
//!    relies on the transport cookie jar to carry the session credential; the
//!    [`client::UnauthorizedHandler`] turns 401s into a login redirect.
//!
//! The snapshot is never a credential. The resource service authorizes every
//! call with the session credential, so a replayed or edited snapshot only
//! affects what the client chooses to render.

pub mod channel;
pub mod cli;
pub mod client;
pub mod identity;
pub mod server;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
