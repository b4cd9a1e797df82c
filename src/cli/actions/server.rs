use crate::{
    channel::{SnapshotSchema, SnapshotSigner},
    identity::PolicyRegistry,
    server::{self, MemorySessionStore, ServerConfig},
};
use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use std::{path::PathBuf, sync::Arc, time::Duration};
use tracing::{info, warn};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub sessions: Option<PathBuf>,
    pub policies: Vec<String>,
    pub required_claims: Vec<String>,
    pub optional_claims: Vec<String>,
    pub secure_cookies: bool,
    pub signing_key: Option<SecretString>,
    pub handoff_ttl: Duration,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the configuration is invalid or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let schema = SnapshotSchema::new(&args.required_claims, &args.optional_claims)
        .context("invalid snapshot schema")?;
    let policies = PolicyRegistry::builder()
        .declare(&args.policies)
        .context("invalid policy declaration")?
        .build();

    let sessions = match &args.sessions {
        Some(path) => MemorySessionStore::from_file(path)?,
        None => {
            warn!("no --sessions file given, every render is anonymous");
            MemorySessionStore::new()
        }
    };

    let signer = match &args.signing_key {
        Some(seed) => SnapshotSigner::from_base64(seed.expose_secret())
            .context("invalid --signing-key")?,
        None => {
            warn!("no --signing-key given, snapshots are signed with a random key");
            SnapshotSigner::generate()
        }
    }
    .with_ttl(args.handoff_ttl);

    info!(
        port = args.port,
        sessions = sessions.len(),
        policies = policies.len(),
        required_claims = ?schema.required(),
        optional_claims = ?schema.optional(),
        secure_cookies = args.secure_cookies,
        handoff_ttl = signer.ttl().as_secs(),
        verifying_key = %signer.verifying_key_base64(),
        "starting server"
    );

    let config = ServerConfig::new()
        .with_schema(schema)
        .with_policies(policies)
        .with_signer(signer)
        .with_secure_cookies(args.secure_cookies);

    server::new(args.port, config, Arc::new(sessions)).await
}
