//! Headless client runtime: hydrate a rendered page, gate views by policy,
//! then call the resource API with the hydrated identity.

use crate::{
    channel::{PersistedState, SnapshotSchema, SnapshotVerifier},
    client::{
        session_jar, ClientConfig, ClientIdentity, Handled, Navigator, ResourceClient,
        UnauthorizedHandler,
    },
    identity::{claims, Policy, PolicyRegistry},
    server::handlers::{
        handoff_key::{HandoffKey, KEY_ALGORITHM},
        me::MeResponse,
    },
    APP_USER_AGENT,
};
use anyhow::{anyhow, Context, Result};
use reqwest::cookie::Jar;
use secrecy::SecretString;
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;

const ME_PATH: &str = "/v1/me";
const HANDOFF_KEY_PATH: &str = "/v1/handoff/key";

#[derive(Debug)]
pub struct Args {
    pub url: Url,
    pub api_url: Option<Url>,
    pub session_token: Option<SecretString>,
    pub policies: Vec<String>,
    pub required_claims: Vec<String>,
    pub optional_claims: Vec<String>,
    pub login_path: String,
    pub timeout: Duration,
    pub verifying_key: Option<String>,
}

/// Prints where the browser would go.
struct ConsoleNavigator;

impl Navigator for ConsoleNavigator {
    fn navigate(&self, location: &str) {
        println!("redirect: {location}");
    }
}

/// Execute the client action.
/// # Errors
/// Returns an error if the page cannot be fetched or carries no handoff
/// element, or if the resource call fails with an application fault.
pub async fn execute(args: Args) -> Result<()> {
    let api_url = match &args.api_url {
        Some(url) => url.clone(),
        None => args.url.join("/").context("invalid --url")?,
    };

    let policies: Vec<Policy> = args
        .policies
        .iter()
        .map(|declaration| declaration.parse::<Policy>())
        .collect::<Result<_, _>>()
        .context("invalid policy declaration")?;
    let names: Vec<String> = policies.iter().map(|p| p.name().to_string()).collect();
    let registry = policies
        .into_iter()
        .try_fold(PolicyRegistry::builder(), |builder, policy| builder.register(policy))?
        .build();

    let config = ClientConfig::new()
        .with_api_base_url(api_url.as_str())
        .with_login_path(&args.login_path)
        .with_timeout(args.timeout)
        .with_schema(
            SnapshotSchema::new(&args.required_claims, &args.optional_claims)
                .context("invalid snapshot schema")?,
        )
        .with_policies(registry);

    let jar = match &args.session_token {
        Some(token) => session_jar(token, [&args.url, &api_url]),
        None => Arc::new(Jar::default()),
    };

    let verifier = match &args.verifying_key {
        Some(key) => SnapshotVerifier::from_base64(key).context("invalid --verifying-key")?,
        None => fetch_verifier(&config.build_url(HANDOFF_KEY_PATH), args.timeout).await?,
    };

    let document = fetch_document(&args.url, Arc::clone(&jar), args.timeout).await?;
    let persisted = PersistedState::from_document(&document, Arc::new(verifier))
        .context("page carries no identity handoff")?;

    let identity = Arc::new(ClientIdentity::materialize(
        &persisted,
        persisted.key(),
        config.schema(),
    ));

    if identity.is_authenticated() {
        println!(
            "identity: {} ({})",
            claims::display_name(identity.principal()).unwrap_or("-"),
            claims::user_id(identity.principal()).unwrap_or("-")
        );
    } else {
        println!("identity: anonymous");
    }
    for name in &names {
        let visible = identity.can_view(config.policies(), name);
        println!("view {name}: {}", if visible { "visible" } else { "hidden" });
    }

    let client = ResourceClient::new(&config, Arc::clone(&identity), jar)?;
    let handler = UnauthorizedHandler::new(config.login_path(), ConsoleNavigator);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let outcome = client
        .get_json_cancellable::<MeResponse>(ME_PATH, &cancel)
        .await;
    match handler.handle(ME_PATH, outcome) {
        Handled::Value(me) => {
            println!("{}", serde_json::to_string_pretty(&me)?);
            Ok(())
        }
        Handled::Redirected(location) => {
            info!(%location, "login required");
            Ok(())
        }
        Handled::Discarded => {
            debug!("cancelled");
            Ok(())
        }
        Handled::Faulted(err) => Err(err).context("resource call failed"),
    }
}

async fn fetch_verifier(url: &str, timeout: Duration) -> Result<SnapshotVerifier> {
    let http = reqwest::Client::builder()
        .user_agent(APP_USER_AGENT)
        .timeout(timeout)
        .build()?;

    let key: HandoffKey = http
        .get(url)
        .send()
        .await
        .with_context(|| format!("Failed to fetch {url}"))?
        .error_for_status()?
        .json()
        .await
        .context("invalid handoff key document")?;
    if key.alg != KEY_ALGORITHM {
        return Err(anyhow!("unsupported handoff key algorithm: {}", key.alg));
    }
    debug!(url, "handoff verifying key fetched");
    Ok(SnapshotVerifier::from_base64(&key.key)?)
}

async fn fetch_document(url: &Url, jar: Arc<Jar>, timeout: Duration) -> Result<String> {
    let http = reqwest::Client::builder()
        .user_agent(APP_USER_AGENT)
        .cookie_provider(jar)
        .timeout(timeout)
        .build()?;

    let response = http
        .get(url.clone())
        .send()
        .await
        .with_context(|| format!("Failed to fetch {url}"))?
        .error_for_status()?;
    Ok(response.text().await?)
}
